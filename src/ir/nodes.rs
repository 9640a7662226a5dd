//! Core IR node definitions.

use smol_str::SmolStr;

use crate::base::Origin;
use crate::syntax::ast::BackoffKind;

use super::ty::{CapabilityKind, EffectAtom, Type};

/// A lowered module.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreModule {
    pub name: Option<SmolStr>,
    pub imports: Vec<CoreImport>,
    pub datas: Vec<CoreData>,
    pub enums: Vec<CoreEnum>,
    pub funcs: Vec<CoreFunc>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreImport {
    pub name: SmolStr,
    pub alias: Option<SmolStr>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreData {
    pub name: SmolStr,
    pub name_origin: Origin,
    pub fields: Vec<CoreField>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreField {
    pub name: SmolStr,
    pub ty: Type,
    pub required: bool,
    pub range: Option<(Option<f64>, Option<f64>)>,
    pub pattern: Option<SmolStr>,
    pub type_inferred: bool,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreEnum {
    pub name: SmolStr,
    pub name_origin: Origin,
    pub variants: Vec<SmolStr>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreParam {
    pub name: SmolStr,
    pub ty: Type,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreFunc {
    pub name: SmolStr,
    pub name_origin: Origin,
    pub annotations: Vec<SmolStr>,
    pub type_params: Vec<SmolStr>,
    pub params: Vec<CoreParam>,
    /// Effects declared in the performs clause.
    pub declared_effects: Vec<EffectAtom>,
    /// Origin of each declared effect atom, for remove-effect fix-its.
    pub declared_effect_origins: Vec<(EffectAtom, Origin)>,
    /// Effect variables named in the performs clause.
    pub effect_vars: Vec<SmolStr>,
    pub effect_caps: Vec<CapabilityKind>,
    pub effect_caps_explicit: bool,
    pub ret: Type,
    pub ret_inferred: bool,
    pub body: Option<Vec<CoreStmt>>,
    pub header_origin: Origin,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreStmt {
    Let {
        name: SmolStr,
        name_origin: Origin,
        value: CoreExpr,
        origin: Origin,
    },
    Set {
        name: SmolStr,
        name_origin: Origin,
        value: CoreExpr,
        origin: Origin,
    },
    Return {
        value: Option<CoreExpr>,
        origin: Origin,
    },
    If {
        cond: CoreExpr,
        then: Vec<CoreStmt>,
        otherwise: Option<Vec<CoreStmt>>,
        origin: Origin,
    },
    Match {
        expr: CoreExpr,
        cases: Vec<CoreCase>,
        origin: Origin,
    },
    Start {
        name: SmolStr,
        name_origin: Origin,
        expr: CoreExpr,
        origin: Origin,
    },
    Wait {
        names: Vec<SmolStr>,
        origin: Origin,
    },
    Workflow(CoreWorkflow),
    /// Explicit resource scope.
    Scope {
        name: SmolStr,
        body: Vec<CoreStmt>,
        origin: Origin,
    },
    ForEach {
        var: SmolStr,
        var_origin: Origin,
        iter: CoreExpr,
        body: Vec<CoreStmt>,
        origin: Origin,
    },
    Block {
        body: Vec<CoreStmt>,
        origin: Origin,
    },
    Expr {
        expr: CoreExpr,
        origin: Origin,
    },
}

impl CoreStmt {
    pub fn origin(&self) -> &Origin {
        match self {
            CoreStmt::Let { origin, .. }
            | CoreStmt::Set { origin, .. }
            | CoreStmt::Return { origin, .. }
            | CoreStmt::If { origin, .. }
            | CoreStmt::Match { origin, .. }
            | CoreStmt::Start { origin, .. }
            | CoreStmt::Wait { origin, .. }
            | CoreStmt::Scope { origin, .. }
            | CoreStmt::ForEach { origin, .. }
            | CoreStmt::Block { origin, .. }
            | CoreStmt::Expr { origin, .. } => origin,
            CoreStmt::Workflow(w) => &w.origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreCase {
    pub pattern: CorePattern,
    pub body: Vec<CoreStmt>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreWorkflow {
    pub steps: Vec<CoreStep>,
    pub retry: Option<CoreRetry>,
    pub timeout_ms: Option<i64>,
    /// Capabilities observed across all step bodies.
    pub effect_caps: Vec<CapabilityKind>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreStep {
    pub name: SmolStr,
    pub dependencies: Vec<SmolStr>,
    pub body: Vec<CoreStmt>,
    pub compensate: Option<Vec<CoreStmt>>,
    /// Capabilities observed in this step's body.
    pub effect_caps: Vec<CapabilityKind>,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreRetry {
    pub max_attempts: i64,
    pub backoff: BackoffKind,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorePattern {
    Null { origin: Origin },
    Int { value: i64, origin: Origin },
    Name { name: SmolStr, origin: Origin },
    Ctor {
        type_name: SmolStr,
        names: Vec<SmolStr>,
        args: Vec<CorePattern>,
        origin: Origin,
    },
}

impl CorePattern {
    pub fn origin(&self) -> &Origin {
        match self {
            CorePattern::Null { origin }
            | CorePattern::Int { origin, .. }
            | CorePattern::Name { origin, .. }
            | CorePattern::Ctor { origin, .. } => origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreExpr {
    Name { text: SmolStr, origin: Origin },
    Bool { value: bool, origin: Origin },
    Int { value: i64, origin: Origin },
    Long { value: SmolStr, origin: Origin },
    Double { value: f64, origin: Origin },
    Str { value: SmolStr, origin: Origin },
    Null { origin: Origin },
    Call {
        target: Box<CoreExpr>,
        args: Vec<CoreExpr>,
        origin: Origin,
    },
    Construct {
        type_name: SmolStr,
        type_origin: Origin,
        fields: Vec<(SmolStr, CoreExpr)>,
        origin: Origin,
    },
    Ok { expr: Box<CoreExpr>, origin: Origin },
    Err { expr: Box<CoreExpr>, origin: Origin },
    Some { expr: Box<CoreExpr>, origin: Origin },
    None { origin: Origin },
    Lambda {
        params: Vec<CoreParam>,
        ret: Type,
        body: Box<CoreExpr>,
        origin: Origin,
    },
    Await { expr: Box<CoreExpr>, origin: Origin },
}

impl CoreExpr {
    pub fn origin(&self) -> &Origin {
        match self {
            CoreExpr::Name { origin, .. }
            | CoreExpr::Bool { origin, .. }
            | CoreExpr::Int { origin, .. }
            | CoreExpr::Long { origin, .. }
            | CoreExpr::Double { origin, .. }
            | CoreExpr::Str { origin, .. }
            | CoreExpr::Null { origin }
            | CoreExpr::Call { origin, .. }
            | CoreExpr::Construct { origin, .. }
            | CoreExpr::Ok { origin, .. }
            | CoreExpr::Err { origin, .. }
            | CoreExpr::Some { origin, .. }
            | CoreExpr::None { origin }
            | CoreExpr::Lambda { origin, .. }
            | CoreExpr::Await { origin, .. } => origin,
        }
    }

    /// The dotted call-target name, when the target is a plain name.
    pub fn call_target_name(&self) -> Option<&SmolStr> {
        match self {
            CoreExpr::Call { target, .. } => match &**target {
                CoreExpr::Name { text, .. } => Some(text),
                _ => None,
            },
            _ => None,
        }
    }
}
