//! Keyword translation between lexicons.
//!
//! Rewrites keyword token values from one language's phrases to
//! another's, so a single canonical surface (and parser fallback) serves
//! every lexicon. Spans are retained; non-keyword identifiers pass
//! through unchanged.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::lexicon::Lexicon;

use super::token::{Token, TokenKind};

/// Phrase maps from source surface to target surface.
struct TranslationIndex {
    /// Source phrase (lower-cased) → target phrase.
    index: FxHashMap<SmolStr, SmolStr>,
    /// Source phrases appearing inside marker brackets.
    marker_index: FxHashMap<SmolStr, SmolStr>,
}

fn build_index(src: &Lexicon, tgt: &Lexicon) -> TranslationIndex {
    let mut index = FxHashMap::default();
    let mut marker_index = FxHashMap::default();
    for (kind, src_phrase) in &src.keywords {
        let Some(tgt_phrase) = tgt.phrase(*kind) else {
            continue;
        };
        if src_phrase == tgt_phrase {
            continue;
        }
        let lowered = SmolStr::new(src_phrase.to_lowercase());
        index.entry(lowered.clone()).or_insert_with(|| tgt_phrase.clone());
        marker_index
            .entry(lowered)
            .or_insert_with(|| tgt_phrase.clone());
    }
    TranslationIndex {
        index,
        marker_index,
    }
}

/// Whether any phrase differs between the two lexicons.
pub fn needs_keyword_translation(src: &Lexicon, tgt: &Lexicon) -> bool {
    if src.id == tgt.id {
        return false;
    }
    !build_index(src, tgt).index.is_empty()
}

/// Rewrite keyword and keyword-phrased identifier tokens from the source
/// lexicon's surface to the target's. A token whose translation begins
/// uppercase is promoted to `TypeIdent`; lowercase translations of
/// `TypeIdent` demote to `Ident`.
pub fn translate_tokens(tokens: &[Token], src: &Lexicon, tgt: &Lexicon) -> Vec<Token> {
    let translation = build_index(src, tgt);
    if translation.index.is_empty() {
        return tokens.to_vec();
    }

    tokens
        .iter()
        .map(|tok| {
            let rewritten = match tok.kind {
                // Keyword tokens translate by kind, which survives even
                // when two kinds share a source phrase.
                TokenKind::Keyword(kind) => tgt.phrase(kind).cloned(),
                TokenKind::Ident | TokenKind::TypeIdent => translation
                    .index
                    .get(tok.value.to_lowercase().as_str())
                    .or_else(|| translation.marker_index.get(tok.value.to_lowercase().as_str()))
                    .cloned(),
                _ => None,
            };
            match rewritten {
                None => tok.clone(),
                Some(value) => {
                    let mut out = tok.clone();
                    if matches!(tok.kind, TokenKind::Ident | TokenKind::TypeIdent) {
                        out.kind = if value.chars().next().is_some_and(char::is_uppercase) {
                            TokenKind::TypeIdent
                        } else {
                            TokenKind::Ident
                        };
                    }
                    out.value = value;
                    out
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::lexer::{lex, TokenKind};
    use crate::lexicon::{chinese, english, KeywordIndex, KeywordKind};

    use super::*;

    #[test]
    fn test_same_lexicon_needs_no_translation() {
        let en = english();
        assert!(!needs_keyword_translation(&en, &en));
    }

    #[test]
    fn test_cross_lexicon_needs_translation() {
        assert!(needs_keyword_translation(&chinese(), &english()));
    }

    #[test]
    fn test_chinese_tokens_translate_to_english() {
        let zh = chinese();
        let en = english();
        let index = KeywordIndex::build(&zh);
        let out = lex("令年龄为30.", &zh, &index);
        let translated = translate_tokens(&out.tokens, &zh, &en);

        assert_eq!(translated[0].kind, TokenKind::Keyword(KeywordKind::Let));
        assert_eq!(translated[0].value, "let");
        // Identifier passes through untouched.
        assert_eq!(translated[1].value, "年龄");
        assert_eq!(translated[2].value, "be");
        // Spans are retained from the source tokens.
        assert_eq!(translated[0].start, out.tokens[0].start);
    }
}
