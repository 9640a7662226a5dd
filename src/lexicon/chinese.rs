//! The Simplified Chinese (zh-CN) lexicon.
//!
//! Chinese source carries full-width punctuation and no inter-word
//! whitespace; the canonicalizer maps digits and ASCII-range punctuation
//! to half-width, and the lexer splits keyword phrases out of CJK runs by
//! longest match.

use indexmap::IndexMap;
use regex::Regex;
use smol_str::SmolStr;

use super::lexicon::{Canonicalization, Direction, Lexicon, MessageKey, Punctuation, WhitespaceMode};
use super::type_rules::{base_type_rules, sort_rules, InferredType, TypeInferenceRule};
use super::KeywordKind as K;

/// Build the Simplified Chinese lexicon.
pub fn chinese() -> Lexicon {
    let mut keywords: IndexMap<K, SmolStr> = IndexMap::new();
    let entries: &[(K, &str)] = &[
        (K::ModuleDecl, "模块"),
        (K::Import, "导入"),
        (K::As, "作为"),
        (K::If, "如果"),
        (K::Otherwise, "否则"),
        (K::Match, "匹配"),
        (K::When, "当"),
        (K::Return, "返回"),
        (K::ForEach, "对每个"),
        (K::In, "在"),
        (K::Let, "令"),
        (K::Be, "为"),
        (K::Set, "设"),
        (K::To, "至"),
        (K::And, "且"),
        (K::Or, "或"),
        (K::Not, "非"),
        (K::Io, "读写"),
        (K::Cpu, "计算"),
        (K::Workflow, "工作流"),
        (K::Step, "步骤"),
        (K::Depends, "依赖"),
        (K::On, "于"),
        (K::Compensate, "补偿"),
        (K::Retry, "重试"),
        (K::Timeout, "超时"),
        (K::MaxAttempts, "最多尝试"),
        (K::Backoff, "退避"),
        (K::Within, "限定"),
        (K::Scope, "范围"),
        (K::Start, "启动"),
        (K::Async, "异步"),
        (K::Await, "等待"),
        (K::WaitFor, "等候"),
        (K::Required, "必填"),
        (K::Between, "介于"),
        (K::AtLeast, "至少"),
        (K::AtMost, "至多"),
        (K::Matching, "符合"),
        (K::Pattern, "模式"),
        (K::Maybe, "可能"),
        (K::OptionOf, "可选"),
        (K::ResultOf, "结果为"),
        (K::OkOf, "成功"),
        (K::ErrOf, "失败"),
        (K::SomeOf, "有值"),
        (K::NoneKw, "无值"),
        (K::ListOf, "列表"),
        (K::MapOf, "映射"),
        (K::Of, "的"),
        (K::True, "真"),
        (K::False, "假"),
        (K::Null, "空"),
        (K::TextTy, "文本"),
        (K::IntTy, "整数"),
        (K::FloatTy, "小数"),
        (K::BoolTy, "布尔"),
        (K::Plus, "加"),
        (K::Minus, "减"),
        (K::Times, "乘"),
        (K::DividedBy, "除以"),
        (K::LessThan, "小于"),
        (K::GreaterThan, "大于"),
        (K::EqualsTo, "等于"),
        (K::Is, "是"),
        (K::Under, "低于"),
        (K::Over, "高于"),
        (K::MoreThan, "多于"),
        (K::TypeDef, "定义"),
        (K::TypeWith, "具有"),
        (K::TypeHas, "有"),
        (K::TypeOneOf, "之一"),
        (K::FuncTo, "要"),
        (K::FuncGiven, "给定"),
        (K::FuncProduce, "产生"),
        (K::FuncPerforms, "执行"),
    ];
    for (kind, phrase) in entries {
        keywords.insert(*kind, SmolStr::new(phrase));
    }

    let mut messages = IndexMap::new();
    messages.insert(MessageKey::MissingStatementEnd, SmolStr::new("语句末尾缺少句号"));
    messages.insert(
        MessageKey::MissingModuleHeader,
        SmolStr::new("文件缺少模块声明；应为「模块 {0}。」"),
    );
    messages.insert(MessageKey::UnexpectedToken, SmolStr::new("意外的 {0}，应为 {1}"));
    messages.insert(MessageKey::UnterminatedString, SmolStr::new("字符串缺少结束引号"));
    messages.insert(MessageKey::UnknownCapability, SmolStr::new("未知能力「{0}」"));

    let mut rules = base_type_rules();
    // Chinese overlay for common field names written in hanzi.
    rules.push(TypeInferenceRule::new("zh-age", "(年龄|岁数)$", InferredType::Int, 45));
    rules.push(TypeInferenceRule::new(
        "zh-money",
        "(价格|金额|余额|费用)$",
        InferredType::Float,
        45,
    ));
    rules.push(TypeInferenceRule::new("zh-name", "(名称|姓名|地址|邮箱)$", InferredType::Text, 45));

    Lexicon {
        id: SmolStr::new("zh-CN"),
        name: SmolStr::new("简体中文"),
        direction: Direction::Ltr,
        keywords,
        punctuation: Punctuation {
            statement_end: SmolStr::new("。"),
            list_separator: SmolStr::new("，"),
            enum_separator: SmolStr::new("、"),
            block_start: SmolStr::new("："),
            string_open: SmolStr::new("「"),
            string_close: SmolStr::new("」"),
            marker_open: SmolStr::new("【"),
            marker_close: SmolStr::new("】"),
        },
        canonicalization: Canonicalization {
            full_width_to_half: true,
            whitespace_mode: WhitespaceMode::Chinese,
            remove_articles: false,
            articles: vec![],
            allowed_duplicates: vec![],
            custom_rules: chinese_custom_rules(),
        },
        messages,
        type_inference_rules: sort_rules(rules),
    }
}

fn chinese_custom_rules() -> Vec<(SmolStr, Regex, SmolStr)> {
    // The spoken "请" (please) prefix is politeness, not syntax.
    Regex::new("^请")
        .ok()
        .map(|re| vec![(SmolStr::new("zh-polite-prefix"), re, SmolStr::new(""))])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_all_keyword_kinds() {
        let lex = chinese();
        for kind in K::all() {
            assert!(lex.keywords.contains_key(kind), "missing phrase for {kind:?}");
        }
    }

    #[test]
    fn test_no_duplicate_phrases() {
        let lex = chinese();
        let kinds: Vec<_> = lex.keywords.keys().copied().collect();
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert!(
                    lex.keywords[a] != lex.keywords[b] || lex.duplicates_allowed(*a, *b),
                    "{a:?} and {b:?} share '{}'",
                    lex.keywords[a]
                );
            }
        }
    }

    #[test]
    fn test_full_width_punctuation() {
        let lex = chinese();
        assert_eq!(lex.punctuation.statement_end, "。");
        assert!(lex.canonicalization.full_width_to_half);
        assert_eq!(lex.canonicalization.whitespace_mode, WhitespaceMode::Chinese);
    }
}
