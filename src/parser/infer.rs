//! Field-type inference from names and constraints.
//!
//! Used when a field declaration omits `as Type`:
//! 1. A Range constraint with a fractional bound infers Float; any other
//!    Range infers Int.
//! 2. A Pattern constraint infers Text.
//! 3. Otherwise the lexicon's prioritized regex rules decide (highest
//!    priority wins, ties break by declaration order).
//! 4. Otherwise Text.
//!
//! A numeric Range refines an earlier name-inferred Text; Int promotes
//! to Float when a fractional bound appears.

use smol_str::SmolStr;

use crate::base::Span;
use crate::lexicon::{InferredType, Lexicon};
use crate::syntax::ast::{Constraint, TypeExpr};

/// Infer the type of an unannotated field.
pub fn infer_field_type(
    name: &str,
    constraints: &[Constraint],
    lexicon: &Lexicon,
    span: Span,
) -> TypeExpr {
    let named = |text: &str| TypeExpr::Name {
        text: SmolStr::new(text),
        span,
    };

    let mut range_seen = false;
    let mut fractional = false;
    let mut pattern_seen = false;
    for c in constraints {
        match c {
            Constraint::Range { min, max, .. } => {
                range_seen = true;
                fractional |= min.is_some_and(|v| v.fract() != 0.0)
                    || max.is_some_and(|v| v.fract() != 0.0);
            }
            Constraint::Pattern { .. } => pattern_seen = true,
            Constraint::Required { .. } => {}
        }
    }

    if range_seen {
        return if fractional { named("Float") } else { named("Int") };
    }
    if pattern_seen {
        return named("Text");
    }

    // Lexicon rules are pre-sorted by priority (stable for ties).
    for rule in &lexicon.type_inference_rules {
        if rule.pattern.is_match(name) {
            let text = match rule.infers {
                InferredType::Text => "Text",
                InferredType::Int => "Int",
                InferredType::Float => "Float",
                InferredType::Bool => "Bool",
                InferredType::DateTime => "DateTime",
            };
            return named(text);
        }
    }

    named("Text")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::lexicon::english;

    use super::*;

    fn infer(name: &str, constraints: &[Constraint]) -> String {
        let lex = english();
        match infer_field_type(name, constraints, &lex, Span::synthesized()) {
            TypeExpr::Name { text, .. } => text.to_string(),
            other => panic!("unexpected inference result {other:?}"),
        }
    }

    fn range(min: Option<f64>, max: Option<f64>) -> Constraint {
        Constraint::Range {
            min,
            max,
            span: Span::synthesized(),
        }
    }

    #[rstest]
    #[case("email", "Text")]
    #[case("count", "Int")]
    #[case("price", "Float")]
    #[case("isAdmin", "Bool")]
    #[case("createdAt", "DateTime")]
    #[case("widget", "Text")] // no rule matches → default
    fn test_name_rules(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(infer(name, &[]), expected);
    }

    #[test]
    fn test_range_beats_name_rule() {
        // "email" would infer Text by name, but a range is numeric.
        assert_eq!(infer("email", &[range(Some(1.0), Some(9.0))]), "Int");
    }

    #[test]
    fn test_fractional_range_promotes_to_float() {
        assert_eq!(infer("count", &[range(Some(0.5), None)]), "Float");
        assert_eq!(infer("count", &[range(None, Some(2.25))]), "Float");
    }

    #[test]
    fn test_pattern_infers_text() {
        let c = Constraint::Pattern {
            regex: "[a-z]+".into(),
            span: Span::synthesized(),
        };
        assert_eq!(infer("count", &[c]), "Text");
    }

    #[test]
    fn test_required_alone_uses_name_rules() {
        let c = Constraint::Required {
            span: Span::synthesized(),
        };
        assert_eq!(infer("count", &[c]), "Int");
    }
}
