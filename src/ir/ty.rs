//! Semantic types, effect atoms, and capability kinds.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::syntax::ast::{PiiCategory, PiiLevel};

/// Effect atoms, ordered by strength: `Pure < Cpu < Io < Workflow`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EffectAtom {
    Pure,
    Cpu,
    Io,
    Workflow,
}

impl EffectAtom {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectAtom::Pure => "pure",
            EffectAtom::Cpu => "cpu",
            EffectAtom::Io => "io",
            EffectAtom::Workflow => "workflow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pure" => Some(Self::Pure),
            "cpu" => Some(Self::Cpu),
            "io" => Some(Self::Io),
            "workflow" => Some(Self::Workflow),
            _ => None,
        }
    }
}

impl fmt::Display for EffectAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of effect atoms as a small bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EffectSet(u8);

impl EffectSet {
    pub const EMPTY: EffectSet = EffectSet(0);

    fn bit(atom: EffectAtom) -> u8 {
        match atom {
            EffectAtom::Pure => 1,
            EffectAtom::Cpu => 2,
            EffectAtom::Io => 4,
            EffectAtom::Workflow => 8,
        }
    }

    pub fn of(atoms: &[EffectAtom]) -> Self {
        let mut set = Self::EMPTY;
        for atom in atoms {
            set.insert(*atom);
        }
        set
    }

    pub fn insert(&mut self, atom: EffectAtom) {
        self.0 |= Self::bit(atom);
    }

    pub fn contains(&self, atom: EffectAtom) -> bool {
        self.0 & Self::bit(atom) != 0
    }

    pub fn union(&self, other: EffectSet) -> EffectSet {
        EffectSet(self.0 | other.0)
    }

    pub fn remove(&mut self, atom: EffectAtom) {
        self.0 &= !Self::bit(atom);
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_subset(&self, other: EffectSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// The strongest atom in the set, `Pure` when empty.
    pub fn strongest(&self) -> EffectAtom {
        for atom in [EffectAtom::Workflow, EffectAtom::Io, EffectAtom::Cpu, EffectAtom::Pure] {
            if self.contains(atom) {
                return atom;
            }
        }
        EffectAtom::Pure
    }

    pub fn iter(&self) -> impl Iterator<Item = EffectAtom> + '_ {
        [EffectAtom::Pure, EffectAtom::Cpu, EffectAtom::Io, EffectAtom::Workflow]
            .into_iter()
            .filter(|a| self.contains(*a))
    }
}

impl fmt::Display for EffectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|a| a.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// The closed set of capability kinds — the fine partition of the coarse
/// IO effect. Adding a kind touches this enum and its tables only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    Http,
    Sql,
    Files,
    Secrets,
    Time,
    Cpu,
    Random,
    Env,
    Crypto,
}

impl CapabilityKind {
    pub fn all() -> &'static [CapabilityKind] {
        use CapabilityKind::*;
        &[Http, Sql, Files, Secrets, Time, Cpu, Random, Env, Crypto]
    }

    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::Http => "Http",
            CapabilityKind::Sql => "Sql",
            CapabilityKind::Files => "Files",
            CapabilityKind::Secrets => "Secrets",
            CapabilityKind::Time => "Time",
            CapabilityKind::Cpu => "Cpu",
            CapabilityKind::Random => "Random",
            CapabilityKind::Env => "Env",
            CapabilityKind::Crypto => "Crypto",
        }
    }

    /// Manifest keys are lower-cased.
    pub fn manifest_key(&self) -> String {
        self.name().to_lowercase()
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "sql" | "db" | "database" => Some(Self::Sql),
            "files" | "fs" | "file" => Some(Self::Files),
            "secrets" => Some(Self::Secrets),
            "time" => Some(Self::Time),
            "cpu" => Some(Self::Cpu),
            "random" => Some(Self::Random),
            "env" => Some(Self::Env),
            "crypto" => Some(Self::Crypto),
            _ => None,
        }
    }

    /// Infer the capability a dotted call name exercises, by prefix.
    pub fn infer_from_call(name: &str) -> Option<Self> {
        let prefix = name.split('.').next().unwrap_or(name);
        match prefix {
            "Http" => Some(Self::Http),
            "Db" | "Sql" | "Database" => Some(Self::Sql),
            "Fs" | "File" => Some(Self::Files),
            "Secrets" => Some(Self::Secrets),
            "Time" | "Clock" => Some(Self::Time),
            "Cpu" => Some(Self::Cpu),
            "Random" => Some(Self::Random),
            "Env" => Some(Self::Env),
            "Crypto" => Some(Self::Crypto),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic types used by the Core IR and every analysis pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Not yet known; loosely equal to anything in non-strict mode.
    Unknown,
    Text,
    Int,
    Long,
    Float,
    Double,
    Bool,
    DateTime,
    Null,
    /// A user data or enum type.
    Named(SmolStr),
    /// A type variable bound by unification.
    Var(SmolStr),
    Maybe(Box<Type>),
    Option(Box<Type>),
    Result(Box<Type>, Box<Type>),
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// `Workflow<R, E>`.
    Workflow(Box<Type>, Box<Type>),
    App(SmolStr, Vec<Type>),
    Func {
        params: Vec<Type>,
        ret: Box<Type>,
        effects: EffectSet,
        caps: Vec<CapabilityKind>,
        effect_vars: Vec<SmolStr>,
    },
    /// PII-annotated base type.
    Pii {
        base: Box<Type>,
        level: PiiLevel,
        category: PiiCategory,
    },
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Long | Type::Float | Type::Double)
    }

    /// Strip PII annotation, yielding the carrier type.
    pub fn strip_pii(&self) -> &Type {
        match self {
            Type::Pii { base, .. } => base.strip_pii(),
            other => other,
        }
    }

    pub fn is_pii(&self) -> bool {
        matches!(self, Type::Pii { .. })
    }

    /// Human-readable rendering for diagnostics and hovers.
    pub fn display(&self) -> String {
        match self {
            Type::Unknown => "Unknown".into(),
            Type::Text => "Text".into(),
            Type::Int => "Int".into(),
            Type::Long => "Long".into(),
            Type::Float => "Float".into(),
            Type::Double => "Double".into(),
            Type::Bool => "Bool".into(),
            Type::DateTime => "DateTime".into(),
            Type::Null => "Null".into(),
            Type::Named(n) => n.to_string(),
            Type::Var(n) => n.to_string(),
            Type::Maybe(t) => format!("maybe {}", t.display()),
            Type::Option(t) => format!("option of {}", t.display()),
            Type::Result(ok, err) => format!("result of {} or {}", ok.display(), err.display()),
            Type::List(t) => format!("list of {}", t.display()),
            Type::Map(k, v) => format!("map {} to {}", k.display(), v.display()),
            Type::Workflow(r, e) => format!("Workflow of {} and {}", r.display(), e.display()),
            Type::App(base, args) => {
                let args: Vec<String> = args.iter().map(|a| a.display()).collect();
                format!("{} of {}", base, args.join(" and "))
            }
            Type::Func { params, ret, effects, .. } => {
                let params: Vec<String> = params.iter().map(|p| p.display()).collect();
                if effects.is_empty() {
                    format!("(given {}, produce {})", params.join(" and "), ret.display())
                } else {
                    format!(
                        "(given {}, produce {}, performs {})",
                        params.join(" and "),
                        ret.display(),
                        effects
                    )
                }
            }
            Type::Pii { base, level, category } => format!(
                "@pii({}, {}) {}",
                level.as_str(),
                category.as_str(),
                base.display()
            ),
        }
    }
}
