//! The type algebra: equality, subtyping, unification, alias expansion,
//! and assignability.
//!
//! Numeric promotion applies only during assignment checks, never during
//! unification. `Workflow<R, E>` unwraps to `R` when compared against a
//! non-workflow type, so async results flow through relaxed checks.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::ir::{EffectAtom, Type};

/// Per-module alias table: alias name → replacement type name.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: FxHashMap<SmolStr, SmolStr>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<SmolStr>, target: impl Into<SmolStr>) {
        self.map.insert(alias.into(), target.into());
    }

    /// Expand a named type through the table, breaking cycles.
    pub fn expand(&self, ty: &Type) -> Type {
        match ty {
            Type::Named(name) => {
                let mut current = name.clone();
                let mut visited = FxHashSet::default();
                while let Some(next) = self.map.get(&current) {
                    if !visited.insert(current.clone()) {
                        break;
                    }
                    current = next.clone();
                }
                Type::Named(current)
            }
            other => other.clone(),
        }
    }
}

/// Structural equality. In non-strict mode `Unknown` equals anything and
/// `Text` equals `DateTime` (natural-language date strings).
pub fn types_equal(a: &Type, b: &Type, strict: bool) -> bool {
    if !strict && (matches!(a, Type::Unknown) || matches!(b, Type::Unknown)) {
        return true;
    }
    if !strict {
        if let (Type::Text, Type::DateTime) | (Type::DateTime, Type::Text) = (a, b) {
            return true;
        }
    }
    // Workflow unwrapping: compare the result type against the other side.
    match (a, b) {
        (Type::Workflow(r, _), other) if !matches!(other, Type::Workflow(..)) => {
            return types_equal(r, other, strict);
        }
        (other, Type::Workflow(r, _)) if !matches!(other, Type::Workflow(..)) => {
            return types_equal(other, r, strict);
        }
        _ => {}
    }

    match (a, b) {
        (Type::Text, Type::Text)
        | (Type::Int, Type::Int)
        | (Type::Long, Type::Long)
        | (Type::Float, Type::Float)
        | (Type::Double, Type::Double)
        | (Type::Bool, Type::Bool)
        | (Type::DateTime, Type::DateTime)
        | (Type::Null, Type::Null)
        | (Type::Unknown, Type::Unknown) => true,
        (Type::Named(x), Type::Named(y)) => x == y,
        (Type::Var(x), Type::Var(y)) => x == y,
        (Type::Maybe(x), Type::Maybe(y)) | (Type::Option(x), Type::Option(y)) => {
            types_equal(x, y, strict)
        }
        (Type::Result(ao, ae), Type::Result(bo, be)) => {
            types_equal(ao, bo, strict) && types_equal(ae, be, strict)
        }
        (Type::List(x), Type::List(y)) => types_equal(x, y, strict),
        (Type::Map(ak, av), Type::Map(bk, bv)) => {
            types_equal(ak, bk, strict) && types_equal(av, bv, strict)
        }
        (Type::Workflow(ar, ae), Type::Workflow(br, be)) => {
            types_equal(ar, br, strict) && types_equal(ae, be, strict)
        }
        (Type::App(an, aa), Type::App(bn, ba)) => {
            an == bn
                && aa.len() == ba.len()
                && aa.iter().zip(ba).all(|(x, y)| types_equal(x, y, strict))
        }
        (
            Type::Func {
                params: ap,
                ret: ar,
                ..
            },
            Type::Func {
                params: bp,
                ret: br,
                ..
            },
        ) => {
            ap.len() == bp.len()
                && ap.iter().zip(bp).all(|(x, y)| types_equal(x, y, strict))
                && types_equal(ar, br, strict)
        }
        (
            Type::Pii {
                base: ab,
                level: al,
                category: ac,
            },
            Type::Pii {
                base: bb,
                level: bl,
                category: bc,
            },
        ) => al == bl && ac == bc && types_equal(ab, bb, strict),
        // A PII-annotated value still carries its base type.
        (Type::Pii { base, .. }, other) | (other, Type::Pii { base, .. }) => {
            types_equal(base, other, strict)
        }
        _ => false,
    }
}

/// Subtyping. Reflexive; `Option`/`Maybe` are mutually compatible;
/// `Result` and `Workflow` are covariant in both arguments.
pub fn is_subtype(sub: &Type, sup: &Type) -> bool {
    if types_equal(sub, sup, false) {
        return true;
    }
    match (sub, sup) {
        (Type::Maybe(x), Type::Option(y))
        | (Type::Option(x), Type::Maybe(y))
        | (Type::Maybe(x), Type::Maybe(y))
        | (Type::Option(x), Type::Option(y)) => is_subtype(x, y),
        (Type::Result(ao, ae), Type::Result(bo, be)) => is_subtype(ao, bo) && is_subtype(ae, be),
        (Type::Workflow(ar, ae), Type::Workflow(br, be)) => {
            is_subtype(ar, br) && is_subtype(ae, be)
        }
        (Type::List(x), Type::List(y)) => is_subtype(x, y),
        // Null flows into optional positions.
        (Type::Null, Type::Maybe(_)) | (Type::Null, Type::Option(_)) => true,
        _ => false,
    }
}

/// Effect-atom ordering as a subtype check: `Pure < Cpu < Io < Workflow`.
pub fn effect_subsumes(stronger: EffectAtom, weaker: EffectAtom) -> bool {
    stronger >= weaker
}

/// Substitution produced by unification.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: FxHashMap<SmolStr, Type>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &str) -> Option<&Type> {
        self.map.get(var)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Apply the substitution to a type.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Var(name) => self.map.get(name).cloned().unwrap_or_else(|| ty.clone()),
            Type::Maybe(t) => Type::Maybe(Box::new(self.apply(t))),
            Type::Option(t) => Type::Option(Box::new(self.apply(t))),
            Type::Result(ok, err) => {
                Type::Result(Box::new(self.apply(ok)), Box::new(self.apply(err)))
            }
            Type::List(t) => Type::List(Box::new(self.apply(t))),
            Type::Map(k, v) => Type::Map(Box::new(self.apply(k)), Box::new(self.apply(v))),
            Type::Workflow(r, e) => {
                Type::Workflow(Box::new(self.apply(r)), Box::new(self.apply(e)))
            }
            Type::App(name, args) => {
                Type::App(name.clone(), args.iter().map(|a| self.apply(a)).collect())
            }
            Type::Func {
                params,
                ret,
                effects,
                caps,
                effect_vars,
            } => Type::Func {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(ret)),
                effects: *effects,
                caps: caps.clone(),
                effect_vars: effect_vars.clone(),
            },
            Type::Pii {
                base,
                level,
                category,
            } => Type::Pii {
                base: Box::new(self.apply(base)),
                level: *level,
                category: *category,
            },
            other => other.clone(),
        }
    }
}

/// Unify two type terms. Type variables bind by most-general unifier; no
/// numeric promotion is applied (that is assignment-only).
pub fn unify(a: &Type, b: &Type, bindings: &mut Bindings) -> bool {
    let a = bindings.apply(a);
    let b = bindings.apply(b);
    match (&a, &b) {
        (Type::Var(name), other) | (other, Type::Var(name)) => {
            if let Type::Var(other_name) = other {
                if other_name == name {
                    return true;
                }
            }
            if occurs(name, other) {
                return false;
            }
            bindings.map.insert(name.clone(), other.clone());
            true
        }
        (Type::Unknown, _) | (_, Type::Unknown) => true,
        (Type::Maybe(x), Type::Maybe(y)) | (Type::Option(x), Type::Option(y)) => {
            unify(x, y, bindings)
        }
        (Type::Result(ao, ae), Type::Result(bo, be)) => {
            unify(ao, bo, bindings) && unify(ae, be, bindings)
        }
        (Type::List(x), Type::List(y)) => unify(x, y, bindings),
        (Type::Map(ak, av), Type::Map(bk, bv)) => {
            unify(ak, bk, bindings) && unify(av, bv, bindings)
        }
        (Type::Workflow(ar, ae), Type::Workflow(br, be)) => {
            unify(ar, br, bindings) && unify(ae, be, bindings)
        }
        (Type::App(an, aa), Type::App(bn, ba)) => {
            an == bn
                && aa.len() == ba.len()
                && aa
                    .iter()
                    .zip(ba)
                    .all(|(x, y)| unify(x, y, bindings))
        }
        (
            Type::Func {
                params: ap,
                ret: ar,
                ..
            },
            Type::Func {
                params: bp,
                ret: br,
                ..
            },
        ) => {
            ap.len() == bp.len()
                && ap
                    .iter()
                    .zip(bp.iter())
                    .all(|(x, y)| unify(x, y, bindings))
                && unify(ar, br, bindings)
        }
        _ => types_equal(&a, &b, true),
    }
}

fn occurs(var: &str, ty: &Type) -> bool {
    match ty {
        Type::Var(name) => name == var,
        Type::Maybe(t) | Type::Option(t) | Type::List(t) => occurs(var, t),
        Type::Result(a, b) | Type::Map(a, b) | Type::Workflow(a, b) => {
            occurs(var, a) || occurs(var, b)
        }
        Type::App(_, args) => args.iter().any(|a| occurs(var, a)),
        Type::Func { params, ret, .. } => {
            params.iter().any(|p| occurs(var, p)) || occurs(var, ret)
        }
        Type::Pii { base, .. } => occurs(var, base),
        _ => false,
    }
}

/// Assignability: relaxed equality, subtyping, and numeric promotion
/// (`Int → Float | Double`, `Long → Double`, `Float ↔ Double`). Strict
/// mode disables promotion; generics and pattern matching use it.
pub fn assignable(value: &Type, target: &Type, strict: bool) -> bool {
    if types_equal(value, target, !strict) || is_subtype(value, target) {
        return true;
    }
    if strict {
        return false;
    }
    matches!(
        (value.strip_pii(), target.strip_pii()),
        (Type::Int, Type::Float)
            | (Type::Int, Type::Double)
            | (Type::Long, Type::Double)
            | (Type::Float, Type::Double)
            | (Type::Double, Type::Float)
    )
}

/// Result type of a numeric binary operation after promotion.
pub fn numeric_join(a: &Type, b: &Type) -> Type {
    match (a.strip_pii(), b.strip_pii()) {
        (Type::Double, _) | (_, Type::Double) => Type::Double,
        (Type::Float, _) | (_, Type::Float) => Type::Float,
        (Type::Long, _) | (_, Type::Long) => Type::Long,
        (Type::Int, Type::Int) => Type::Int,
        _ => Type::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_loose_equality() {
        assert!(types_equal(&Type::Unknown, &Type::Int, false));
        assert!(!types_equal(&Type::Unknown, &Type::Int, true));
    }

    #[test]
    fn test_text_datetime_non_strict_only() {
        assert!(types_equal(&Type::Text, &Type::DateTime, false));
        assert!(!types_equal(&Type::Text, &Type::DateTime, true));
    }

    #[test]
    fn test_workflow_unwrapping() {
        let wf = Type::Workflow(Box::new(Type::Int), Box::new(Type::Text));
        assert!(types_equal(&wf, &Type::Int, false));
        assert!(!types_equal(&wf, &Type::Text, true));
    }

    #[test]
    fn test_option_maybe_mutual_subtype() {
        let opt = Type::Option(Box::new(Type::Int));
        let maybe = Type::Maybe(Box::new(Type::Int));
        assert!(is_subtype(&opt, &maybe));
        assert!(is_subtype(&maybe, &opt));
    }

    #[test]
    fn test_result_covariance() {
        let sub = Type::Result(
            Box::new(Type::Maybe(Box::new(Type::Int))),
            Box::new(Type::Text),
        );
        let sup = Type::Result(
            Box::new(Type::Option(Box::new(Type::Int))),
            Box::new(Type::Text),
        );
        assert!(is_subtype(&sub, &sup));
    }

    #[test]
    fn test_unify_binds_vars() {
        let mut bindings = Bindings::new();
        let var = Type::Var("T".into());
        let list = Type::List(Box::new(Type::Int));
        assert!(unify(&Type::List(Box::new(var)), &list, &mut bindings));
        assert_eq!(bindings.get("T"), Some(&Type::Int));
    }

    #[test]
    fn test_unify_no_numeric_promotion() {
        let mut bindings = Bindings::new();
        assert!(!unify(&Type::Int, &Type::Float, &mut bindings));
    }

    #[test]
    fn test_occurs_check() {
        let mut bindings = Bindings::new();
        let var = Type::Var("T".into());
        let list = Type::List(Box::new(Type::Var("T".into())));
        assert!(!unify(&var, &list, &mut bindings));
    }

    #[test]
    fn test_assignability_promotion() {
        assert!(assignable(&Type::Int, &Type::Float, false));
        assert!(assignable(&Type::Long, &Type::Double, false));
        assert!(assignable(&Type::Float, &Type::Double, false));
        assert!(assignable(&Type::Double, &Type::Float, false));
        assert!(!assignable(&Type::Int, &Type::Float, true));
        assert!(!assignable(&Type::Float, &Type::Int, false));
    }

    #[test]
    fn test_alias_expansion_breaks_cycles() {
        let mut table = AliasTable::new();
        table.insert("A", "B");
        table.insert("B", "C");
        assert_eq!(
            table.expand(&Type::Named("A".into())),
            Type::Named("C".into())
        );
        table.insert("C", "A");
        // Cycle: expansion terminates.
        let expanded = table.expand(&Type::Named("A".into()));
        assert!(matches!(expanded, Type::Named(_)));
    }

    #[test]
    fn test_numeric_join() {
        assert_eq!(numeric_join(&Type::Int, &Type::Int), Type::Int);
        assert_eq!(numeric_join(&Type::Int, &Type::Double), Type::Double);
        assert_eq!(numeric_join(&Type::Long, &Type::Float), Type::Float);
    }
}
