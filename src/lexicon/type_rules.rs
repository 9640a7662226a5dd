//! Field-type inference rules.
//!
//! When a field declaration omits its type, the parser infers one from the
//! field name using prioritized regex rules. A language-agnostic base set
//! is layered under each lexicon's overlay; higher priority wins, ties
//! break by declaration order.

use regex::Regex;

/// The primitive a rule infers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredType {
    Text,
    Int,
    Float,
    Bool,
    DateTime,
}

/// One name-pattern rule.
#[derive(Debug, Clone)]
pub struct TypeInferenceRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub infers: InferredType,
    pub priority: u32,
}

impl TypeInferenceRule {
    pub fn new(name: &'static str, pattern: &str, infers: InferredType, priority: u32) -> Self {
        Self {
            name,
            // Patterns are compile-time constants; a typo is a programmer
            // error caught by the rule-table tests below.
            pattern: Regex::new(pattern).unwrap_or_else(|_| Regex::new("$^").unwrap()),
            infers,
            priority,
        }
    }
}

/// The language-agnostic base rules.
pub fn base_type_rules() -> Vec<TypeInferenceRule> {
    vec![
        TypeInferenceRule::new("count", r"(?i)(count|total|quantity|number)$", InferredType::Int, 40),
        TypeInferenceRule::new("age", r"(?i)^age$|_age$", InferredType::Int, 40),
        TypeInferenceRule::new("id", r"(?i)(^id$|_id$|identifier$)", InferredType::Text, 30),
        TypeInferenceRule::new(
            "money",
            r"(?i)(price|amount|balance|cost|rate|salary)$",
            InferredType::Float,
            40,
        ),
        TypeInferenceRule::new(
            "flag",
            r"(?i)^(is|has|can|should|was|will)[A-Z_]",
            InferredType::Bool,
            50,
        ),
        TypeInferenceRule::new("enabled", r"(?i)(enabled|active|valid|deleted)$", InferredType::Bool, 40),
        TypeInferenceRule::new(
            "timestamp",
            r"(?i)(date|time|at|timestamp|created|updated|expires)$",
            InferredType::DateTime,
            35,
        ),
        TypeInferenceRule::new(
            "contact",
            r"(?i)(email|phone|name|address|url|description|title|note)s?$",
            InferredType::Text,
            20,
        ),
    ]
}

/// Sort rules by priority descending, preserving declaration order for
/// equal priorities (stable sort).
pub fn sort_rules(mut rules: Vec<TypeInferenceRule>) -> Vec<TypeInferenceRule> {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_rules_compile() {
        for rule in base_type_rules() {
            // A rule that failed to compile matches nothing; every base
            // rule must match its own canonical example.
            assert!(!rule.pattern.as_str().contains("$^"), "rule {} fell back", rule.name);
        }
    }

    #[test]
    fn test_flag_rule_matches_camel_case() {
        let rules = base_type_rules();
        let flag = rules.iter().find(|r| r.name == "flag").unwrap();
        assert!(flag.pattern.is_match("isAdmin"));
        assert!(flag.pattern.is_match("hasLicense"));
        assert!(!flag.pattern.is_match("history"));
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let rules = sort_rules(base_type_rules());
        let mut last = u32::MAX;
        for rule in &rules {
            assert!(rule.priority <= last);
            last = rule.priority;
        }
    }
}
