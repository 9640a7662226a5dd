//! AST node definitions.
//!
//! Every node carries a [`Span`]; nodes without positional info exist
//! only for synthesized constants. The AST keeps surface sugar (wrapped
//! variants, word operators desugared to calls, dotted names as single
//! `Name` nodes); the Core IR tightens the shape during lowering.

use smol_str::SmolStr;

use crate::base::Span;

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Dotted module name from the header, absent when the header is
    /// missing (a recoverable warning).
    pub name: Option<DottedName>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// A dotted name with its span, e.g. `demo.capdemo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedName {
    pub text: SmolStr,
    pub span: Span,
}

/// Top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Import(Import),
    Data(Data),
    Enum(EnumDecl),
    Func(Func),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Import(i) => i.span,
            Decl::Data(d) => d.span,
            Decl::Enum(e) => e.span,
            Decl::Func(f) => f.span,
        }
    }
}

/// `import util.strings as s.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub name: SmolStr,
    pub alias: Option<SmolStr>,
    pub span: Span,
}

/// `define User with name as Text, age as Int required.`
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub name: SmolStr,
    pub name_span: Span,
    pub fields: Vec<Field>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: SmolStr,
    pub name_span: Span,
    pub ty: TypeExpr,
    pub constraints: Vec<Constraint>,
    /// True when the type came from name/constraint inference rather
    /// than an `as Type` annotation.
    pub type_inferred: bool,
    pub span: Span,
}

/// `define Color as one of Red, Green, Blue.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: SmolStr,
    pub name_span: Span,
    pub variants: Vec<(SmolStr, Span)>,
    pub span: Span,
}

/// `to greet, given who as Text, produce Text, performs io with Http:`
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub name: SmolStr,
    pub name_span: Span,
    /// `@`-annotations preceding the header, e.g. `@consent_required`.
    pub annotations: Vec<(SmolStr, Span)>,
    /// Type and effect parameters from the bracket list after the name.
    pub type_params: Vec<SmolStr>,
    pub params: Vec<Parameter>,
    /// Base effects declared in the performs clause.
    pub effects: Vec<EffectName>,
    /// Capability phrases declared in the performs clause.
    pub effect_caps: Vec<(SmolStr, Span)>,
    /// True when the performs clause spelled out capabilities.
    pub effect_caps_explicit: bool,
    pub ret_type: Option<TypeExpr>,
    pub ret_type_inferred: bool,
    pub body: Option<Vec<Statement>>,
    /// Span of the header line, used by effect fix-its.
    pub header_span: Span,
    pub span: Span,
}

/// A declared base effect with its span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectName {
    pub name: SmolStr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: SmolStr,
    pub name_span: Span,
    pub ty: TypeExpr,
    pub span: Span,
}

// ============================================================================
// STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let msg be "hi".`
    Let {
        name: SmolStr,
        name_span: Span,
        value: Expr,
        span: Span,
    },
    /// `set count to 0.`
    Set {
        name: SmolStr,
        name_span: Span,
        value: Expr,
        span: Span,
    },
    /// `return msg.`
    Return { value: Option<Expr>, span: Span },
    If {
        cond: Expr,
        then: Vec<Statement>,
        otherwise: Option<Vec<Statement>>,
        span: Span,
    },
    Match {
        expr: Expr,
        cases: Vec<MatchCase>,
        span: Span,
    },
    /// `start download as Http.get(url).`
    Start {
        name: SmolStr,
        name_span: Span,
        expr: Expr,
        span: Span,
    },
    /// `wait for download and upload.`
    Wait {
        names: Vec<(SmolStr, Span)>,
        span: Span,
    },
    Workflow(WorkflowStmt),
    /// `within scope db:` … explicit resource scope.
    Scope {
        name: SmolStr,
        body: Vec<Statement>,
        span: Span,
    },
    /// `for each item in items:` …
    ForEach {
        var: SmolStr,
        var_span: Span,
        iter: Expr,
        body: Vec<Statement>,
        span: Span,
    },
    Block { body: Vec<Statement>, span: Span },
    /// Expression in statement position.
    Expr { expr: Expr, span: Span },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Let { span, .. }
            | Statement::Set { span, .. }
            | Statement::Return { span, .. }
            | Statement::If { span, .. }
            | Statement::Match { span, .. }
            | Statement::Start { span, .. }
            | Statement::Wait { span, .. }
            | Statement::Scope { span, .. }
            | Statement::ForEach { span, .. }
            | Statement::Block { span, .. }
            | Statement::Expr { span, .. } => *span,
            Statement::Workflow(w) => w.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStmt {
    pub steps: Vec<WorkflowStep>,
    pub retry: Option<RetryPolicy>,
    pub timeout: Option<TimeoutPolicy>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    pub name: SmolStr,
    pub name_span: Span,
    pub depends_on: Vec<(SmolStr, Span)>,
    pub body: Vec<Statement>,
    pub compensate: Option<Vec<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

impl BackoffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackoffKind::Fixed => "fixed",
            BackoffKind::Linear => "linear",
            BackoffKind::Exponential => "exponential",
        }
    }
}

/// `retry max attempts 3 backoff exponential.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i64,
    pub backoff: BackoffKind,
    pub span: Span,
}

/// `timeout within 30000.` (milliseconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub millis: i64,
    pub span: Span,
}

// ============================================================================
// PATTERNS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Null { span: Span },
    Int { value: i64, span: Span },
    /// Binds the scrutinee to a name.
    Name { name: SmolStr, span: Span },
    /// Constructor with destructuring: `Ok value`, `User with name, age`.
    Ctor {
        type_name: SmolStr,
        names: Vec<(SmolStr, Span)>,
        args: Vec<Pattern>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Null { span }
            | Pattern::Int { span, .. }
            | Pattern::Name { span, .. }
            | Pattern::Ctor { span, .. } => *span,
        }
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A possibly-dotted reference, kept whole: `user.address.city`.
    Name { text: SmolStr, span: Span },
    Bool { value: bool, span: Span },
    Int { value: i64, span: Span },
    /// String-valued to avoid precision loss.
    Long { value: SmolStr, span: Span },
    Double { value: f64, span: Span },
    Str { value: SmolStr, span: Span },
    Null { span: Span },
    Call {
        target: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `User with name = "x", age = 30`
    Construct {
        type_name: SmolStr,
        type_span: Span,
        fields: Vec<(SmolStr, Expr)>,
        span: Span,
    },
    Ok { expr: Box<Expr>, span: Span },
    Err { expr: Box<Expr>, span: Span },
    Some { expr: Box<Expr>, span: Span },
    None { span: Span },
    /// `given x as Int -> x plus 1`
    Lambda {
        params: Vec<Parameter>,
        ret_type: Option<TypeExpr>,
        body: Box<Expr>,
        span: Span,
    },
    Await { expr: Box<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Name { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Int { span, .. }
            | Expr::Long { span, .. }
            | Expr::Double { span, .. }
            | Expr::Str { span, .. }
            | Expr::Null { span }
            | Expr::Call { span, .. }
            | Expr::Construct { span, .. }
            | Expr::Ok { span, .. }
            | Expr::Err { span, .. }
            | Expr::Some { span, .. }
            | Expr::None { span }
            | Expr::Lambda { span, .. }
            | Expr::Await { span, .. } => *span,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// PII sensitivity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PiiLevel {
    L1,
    L2,
    L3,
}

impl PiiLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "L1" | "l1" => Some(Self::L1),
            "L2" | "l2" => Some(Self::L2),
            "L3" | "l3" => Some(Self::L3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        }
    }
}

/// PII data category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiCategory {
    Email,
    Phone,
    Ssn,
    Address,
    Financial,
    Health,
    Name,
    Biometric,
}

impl PiiCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "ssn" => Some(Self::Ssn),
            "address" => Some(Self::Address),
            "financial" => Some(Self::Financial),
            "health" => Some(Self::Health),
            "name" => Some(Self::Name),
            "biometric" => Some(Self::Biometric),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ssn => "ssn",
            Self::Address => "address",
            Self::Financial => "financial",
            Self::Health => "health",
            Self::Name => "name",
            Self::Biometric => "biometric",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A named type: `User`, `Text`, `Int`.
    Name { text: SmolStr, span: Span },
    /// A type variable from the enclosing function's parameter list.
    Var { name: SmolStr, span: Span },
    /// An effect variable from the enclosing function's parameter list.
    EffectVar { name: SmolStr, span: Span },
    /// Type application: `Pair of Int and Text`.
    App {
        base: SmolStr,
        args: Vec<TypeExpr>,
        span: Span,
    },
    Maybe { inner: Box<TypeExpr>, span: Span },
    Option { inner: Box<TypeExpr>, span: Span },
    Result {
        ok: Box<TypeExpr>,
        err: Option<Box<TypeExpr>>,
        span: Span,
    },
    List { elem: Box<TypeExpr>, span: Span },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
        span: Span,
    },
    /// `(given Int, produce Text, performs io)`
    Func {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        effects: Vec<SmolStr>,
        caps: Vec<SmolStr>,
        span: Span,
    },
    /// `@pii(L2, email) Text`
    Pii {
        base: Box<TypeExpr>,
        level: PiiLevel,
        category: PiiCategory,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name { span, .. }
            | TypeExpr::Var { span, .. }
            | TypeExpr::EffectVar { span, .. }
            | TypeExpr::App { span, .. }
            | TypeExpr::Maybe { span, .. }
            | TypeExpr::Option { span, .. }
            | TypeExpr::Result { span, .. }
            | TypeExpr::List { span, .. }
            | TypeExpr::Map { span, .. }
            | TypeExpr::Func { span, .. }
            | TypeExpr::Pii { span, .. } => *span,
        }
    }
}

// ============================================================================
// CONSTRAINTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Required { span: Span },
    /// `between 1 and 150`, `at least 0`, `at most 10`.
    Range {
        min: Option<f64>,
        max: Option<f64>,
        span: Span,
    },
    /// `matching pattern "[a-z]+"`.
    Pattern { regex: SmolStr, span: Span },
}

impl Constraint {
    pub fn span(&self) -> Span {
        match self {
            Constraint::Required { span }
            | Constraint::Range { span, .. }
            | Constraint::Pattern { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pii_parsing() {
        assert_eq!(PiiLevel::parse("L2"), Some(PiiLevel::L2));
        assert_eq!(PiiLevel::parse("L9"), None);
        assert_eq!(PiiCategory::parse("Email"), Some(PiiCategory::Email));
        assert_eq!(PiiCategory::parse("unknown"), None);
    }

    #[test]
    fn test_statement_span_accessor() {
        let span = Span::from_coords(1, 1, 1, 10);
        let stmt = Statement::Return { value: None, span };
        assert_eq!(stmt.span(), span);
    }
}
