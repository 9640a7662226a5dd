//! The English (en-US) lexicon.

use indexmap::IndexMap;
use regex::Regex;
use smol_str::SmolStr;

use super::lexicon::{Canonicalization, Direction, Lexicon, MessageKey, Punctuation, WhitespaceMode};
use super::type_rules::{base_type_rules, sort_rules, InferredType, TypeInferenceRule};
use super::KeywordKind as K;

/// Build a named custom rule, dropping it if the pattern fails to compile.
fn custom_rule(name: &str, pattern: &str, replacement: &str) -> Option<(SmolStr, Regex, SmolStr)> {
    Regex::new(pattern)
        .ok()
        .map(|re| (SmolStr::new(name), re, SmolStr::new(replacement)))
}

/// Build the English lexicon.
pub fn english() -> Lexicon {
    let mut keywords: IndexMap<K, SmolStr> = IndexMap::new();
    let entries: &[(K, &str)] = &[
        (K::ModuleDecl, "module"),
        (K::Import, "import"),
        (K::As, "as"),
        (K::If, "if"),
        (K::Otherwise, "otherwise"),
        (K::Match, "match"),
        (K::When, "when"),
        (K::Return, "return"),
        (K::ForEach, "for each"),
        (K::In, "in"),
        (K::Let, "let"),
        (K::Be, "be"),
        (K::Set, "set"),
        // `to` is shared with the function header; see allowed_duplicates.
        (K::To, "to"),
        (K::And, "and"),
        (K::Or, "or"),
        (K::Not, "not"),
        (K::Io, "io"),
        (K::Cpu, "cpu"),
        (K::Workflow, "workflow"),
        (K::Step, "step"),
        (K::Depends, "depends"),
        (K::On, "on"),
        (K::Compensate, "compensate"),
        (K::Retry, "retry"),
        (K::Timeout, "timeout"),
        (K::MaxAttempts, "max attempts"),
        (K::Backoff, "backoff"),
        (K::Within, "within"),
        (K::Scope, "scope"),
        (K::Start, "start"),
        (K::Async, "async"),
        (K::Await, "await"),
        (K::WaitFor, "wait for"),
        (K::Required, "required"),
        (K::Between, "between"),
        (K::AtLeast, "at least"),
        (K::AtMost, "at most"),
        (K::Matching, "matching"),
        (K::Pattern, "pattern"),
        (K::Maybe, "maybe"),
        (K::OptionOf, "option of"),
        (K::ResultOf, "result of"),
        (K::OkOf, "ok"),
        (K::ErrOf, "err"),
        (K::SomeOf, "some"),
        (K::NoneKw, "none"),
        (K::ListOf, "list of"),
        (K::MapOf, "map"),
        (K::Of, "of"),
        (K::True, "true"),
        (K::False, "false"),
        (K::Null, "null"),
        (K::TextTy, "text"),
        (K::IntTy, "int"),
        (K::FloatTy, "float"),
        (K::BoolTy, "bool"),
        (K::Plus, "plus"),
        (K::Minus, "minus"),
        (K::Times, "times"),
        (K::DividedBy, "divided by"),
        (K::LessThan, "is less than"),
        (K::GreaterThan, "is greater than"),
        (K::EqualsTo, "is equal to"),
        (K::Is, "is"),
        (K::Under, "under"),
        (K::Over, "over"),
        (K::MoreThan, "more than"),
        (K::TypeDef, "define"),
        (K::TypeWith, "with"),
        (K::TypeHas, "has"),
        (K::TypeOneOf, "one of"),
        (K::FuncTo, "to"),
        (K::FuncGiven, "given"),
        (K::FuncProduce, "produce"),
        (K::FuncPerforms, "performs"),
    ];
    for (kind, phrase) in entries {
        keywords.insert(*kind, SmolStr::new(phrase));
    }

    let mut messages = IndexMap::new();
    messages.insert(
        MessageKey::MissingStatementEnd,
        SmolStr::new("expected '.' to end the statement"),
    );
    messages.insert(
        MessageKey::MissingModuleHeader,
        SmolStr::new("file has no module header; expected `module {0}.`"),
    );
    messages.insert(MessageKey::UnexpectedToken, SmolStr::new("unexpected {0}, expected {1}"));
    messages.insert(
        MessageKey::UnterminatedString,
        SmolStr::new("string literal is missing its closing quote"),
    );
    messages.insert(MessageKey::UnknownCapability, SmolStr::new("unknown capability '{0}'"));

    let mut rules = base_type_rules();
    // English overlay: plurals read as collections of text.
    rules.push(TypeInferenceRule::new(
        "en-plural-names",
        r"(?i)(tags|labels|keywords)$",
        InferredType::Text,
        25,
    ));

    Lexicon {
        id: SmolStr::new("en-US"),
        name: SmolStr::new("English"),
        direction: Direction::Ltr,
        keywords,
        punctuation: Punctuation {
            statement_end: SmolStr::new("."),
            list_separator: SmolStr::new(","),
            enum_separator: SmolStr::new(","),
            block_start: SmolStr::new(":"),
            string_open: SmolStr::new("\""),
            string_close: SmolStr::new("\""),
            marker_open: SmolStr::new("["),
            marker_close: SmolStr::new("]"),
        },
        canonicalization: Canonicalization {
            full_width_to_half: false,
            whitespace_mode: WhitespaceMode::English,
            remove_articles: true,
            articles: vec![SmolStr::new("a"), SmolStr::new("an"), SmolStr::new("the")],
            allowed_duplicates: vec![vec![K::To, K::FuncTo]],
            // "It performs IO" reads naturally; strip the dummy subject.
            custom_rules: custom_rule("en-it-performs", r"(?i)\bit performs\b", "performs")
                .into_iter()
                .collect(),
        },
        messages,
        type_inference_rules: sort_rules(rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_all_keyword_kinds() {
        let lex = english();
        for kind in K::all() {
            assert!(lex.keywords.contains_key(kind), "missing phrase for {kind:?}");
        }
    }

    #[test]
    fn test_shared_phrases_are_whitelisted() {
        let lex = english();
        let kinds: Vec<_> = lex.keywords.keys().copied().collect();
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                if lex.keywords[a] == lex.keywords[b] {
                    assert!(
                        lex.duplicates_allowed(*a, *b),
                        "{a:?} and {b:?} share '{}' without an allowance",
                        lex.keywords[a]
                    );
                }
            }
        }
    }
}
