//! Diagnostic model and the code catalog.
//!
//! Codes follow namespace conventions:
//! - L0xx: lexer, L1xx: lowering
//! - P0xx: parser
//! - S0xx: semantics (type checker)
//! - W0xx: style
//! - M0xx: capability manifest
//! - R0xx: lexicon registry
//! - C0xx: caches
//! - V0xx: module resolver
//! - EFF_* / CAPABILITY_* / PII_* / WORKFLOW_*: effect system, capability
//!   enforcement, PII taint, workflow policy
//!
//! Every code has a stable identifier and a default message template;
//! code-action fix-its consume the structured `data` payload.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::{Position, Span};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A hard error.
    #[default]
    Error,
    /// A warning that doesn't prevent analysis.
    Warning,
    /// Informational.
    Info,
    /// A hint, surfaced unobtrusively.
    Hint,
}

impl Severity {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        }
    }
}

/// The closed catalog of diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagCode {
    // =========================================================================
    // L0xx: lexer
    // =========================================================================
    /// Unexpected character in source
    L001,
    /// Unterminated string literal
    L002,
    /// Indentation is not a multiple of two spaces
    L003,
    /// Dedent does not match any enclosing indentation level
    L004,

    // =========================================================================
    // L1xx: lowering
    // =========================================================================
    /// Statement has no Core IR lowering
    L101,
    /// Expression has no Core IR lowering
    L102,
    /// Pattern has no Core IR lowering
    L103,
    /// Type has no Core IR lowering
    L104,
    /// Internal lowering failure surfaced as a diagnostic
    L105,
    /// Unknown capability phrase in an effect clause
    L106,

    // =========================================================================
    // P0xx: parser
    // =========================================================================
    /// Missing module header
    P001,
    /// Expected a different token
    P002,
    /// Expected a name
    P003,
    /// Expected a type
    P004,
    /// Expected an expression
    P005,
    /// Missing statement-end punctuation
    P006,
    /// Unexpected token at statement level
    P007,
    /// Invalid field constraint
    P010,
    /// Duplicate alias in imports
    P011,
    /// Invalid pattern
    P012,
    /// Function has no body
    P013,
    /// Invalid effect clause
    P014,

    // =========================================================================
    // S0xx: semantics
    // =========================================================================
    /// Unknown name
    S001,
    /// Unknown type
    S002,
    /// Duplicate top-level declaration
    S003,
    /// Return type mismatch
    S004,
    /// Wrong number of arguments
    S005,
    /// Argument type mismatch
    S006,
    /// Condition is not a Bool
    S007,
    /// Assignment to an unbound name
    S008,
    /// Field access on a non-data type
    S009,
    /// Unknown constructor in pattern
    S010,
    /// Pattern arity mismatch
    S011,
    /// Await on a non-awaitable value
    S012,
    /// Generic parameter never reachable from parameters
    S013,
    /// Generic return does not unify with the body
    S014,
    /// `start` without a matching `wait`
    S020,
    /// `wait` for a name never started
    S021,
    /// Internal checker failure surfaced as a diagnostic
    S099,

    /// Construct is missing a required field
    MissingRequiredField,
    /// Construct names a field the data type does not declare
    UnknownField,
    /// Mixed Int/Long/Double literals in an interop call
    AmbiguousInteropNumeric,

    // =========================================================================
    // W0xx: style
    // =========================================================================
    /// Import is never referenced
    W001,

    // =========================================================================
    // M0xx: capability manifest
    // =========================================================================
    /// Manifest file could not be read
    M001,
    /// Manifest file is malformed
    M002,

    // =========================================================================
    // R0xx: lexicon registry
    // =========================================================================
    /// Requested lexicon is not registered
    R001,

    // =========================================================================
    // C0xx: caches
    // =========================================================================
    /// Workspace index cache unreadable or malformed
    C001,

    // =========================================================================
    // V0xx: module resolver
    // =========================================================================
    /// Import does not resolve to any module on the search roots
    V001,
    /// Module name maps to more than one file
    V002,

    // =========================================================================
    // Effect inference
    // =========================================================================
    EffInferMissingIo,
    EffInferMissingCpu,
    EffInferRedundantIo,
    EffInferRedundantCpu,
    EffInferRedundantCpuWithIo,
    EffectVarUnresolved,

    // =========================================================================
    // Capabilities
    // =========================================================================
    EffCapMissing,
    EffCapSuperfluous,
    CapabilityNotAllowed,

    // =========================================================================
    // PII
    // =========================================================================
    PiiHttpUnencrypted,
    PiiSinkUnknown,
    PiiMissingConsentCheck,

    // =========================================================================
    // Workflow policy
    // =========================================================================
    WorkflowMissingIoEffect,
    WorkflowUndeclaredCapability,
    CompensateNewCapability,
    WorkflowInvalidRetry,
    WorkflowExcessiveRetry,
    WorkflowRetryExceedsTimeout,
    WorkflowInvalidTimeout,
}

impl DiagCode {
    /// Stable, protocol-visible identifier.
    pub fn as_str(&self) -> &'static str {
        use DiagCode::*;
        match self {
            L001 => "L001",
            L002 => "L002",
            L003 => "L003",
            L004 => "L004",
            L101 => "L101",
            L102 => "L102",
            L103 => "L103",
            L104 => "L104",
            L105 => "L105",
            L106 => "L106",
            P001 => "P001",
            P002 => "P002",
            P003 => "P003",
            P004 => "P004",
            P005 => "P005",
            P006 => "P006",
            P007 => "P007",
            P010 => "P010",
            P011 => "P011",
            P012 => "P012",
            P013 => "P013",
            P014 => "P014",
            S001 => "S001",
            S002 => "S002",
            S003 => "S003",
            S004 => "S004",
            S005 => "S005",
            S006 => "S006",
            S007 => "S007",
            S008 => "S008",
            S009 => "S009",
            S010 => "S010",
            S011 => "S011",
            S012 => "S012",
            S013 => "S013",
            S014 => "S014",
            S020 => "S020",
            S021 => "S021",
            S099 => "S099",
            MissingRequiredField => "MISSING_REQUIRED_FIELD",
            UnknownField => "UNKNOWN_FIELD",
            AmbiguousInteropNumeric => "AMBIGUOUS_INTEROP_NUMERIC",
            W001 => "W001",
            M001 => "M001",
            M002 => "M002",
            R001 => "R001",
            C001 => "C001",
            V001 => "V001",
            V002 => "V002",
            EffInferMissingIo => "EFF_INFER_MISSING_IO",
            EffInferMissingCpu => "EFF_INFER_MISSING_CPU",
            EffInferRedundantIo => "EFF_INFER_REDUNDANT_IO",
            EffInferRedundantCpu => "EFF_INFER_REDUNDANT_CPU",
            EffInferRedundantCpuWithIo => "EFF_INFER_REDUNDANT_CPU_WITH_IO",
            EffectVarUnresolved => "EFFECT_VAR_UNRESOLVED",
            EffCapMissing => "EFF_CAP_MISSING",
            EffCapSuperfluous => "EFF_CAP_SUPERFLUOUS",
            CapabilityNotAllowed => "CAPABILITY_NOT_ALLOWED",
            PiiHttpUnencrypted => "PII_HTTP_UNENCRYPTED",
            PiiSinkUnknown => "PII_SINK_UNKNOWN",
            PiiMissingConsentCheck => "PII_MISSING_CONSENT_CHECK",
            WorkflowMissingIoEffect => "WORKFLOW_MISSING_IO_EFFECT",
            WorkflowUndeclaredCapability => "WORKFLOW_UNDECLARED_CAPABILITY",
            CompensateNewCapability => "COMPENSATE_NEW_CAPABILITY",
            WorkflowInvalidRetry => "WORKFLOW_INVALID_RETRY",
            WorkflowExcessiveRetry => "WORKFLOW_EXCESSIVE_RETRY",
            WorkflowRetryExceedsTimeout => "WORKFLOW_RETRY_EXCEEDS_TIMEOUT",
            WorkflowInvalidTimeout => "WORKFLOW_INVALID_TIMEOUT",
        }
    }

    /// Default message template, used when the producing pass has nothing
    /// more specific to say.
    pub fn default_message(&self) -> &'static str {
        use DiagCode::*;
        match self {
            L001 => "unexpected character",
            L002 => "unterminated string literal",
            L003 => "indentation must be a multiple of two spaces",
            L004 => "dedent does not match any enclosing indentation level",
            L101 => "statement cannot be lowered to Core IR",
            L102 => "expression cannot be lowered to Core IR",
            L103 => "pattern cannot be lowered to Core IR",
            L104 => "type cannot be lowered to Core IR",
            L105 => "internal error during lowering",
            L106 => "unknown capability",
            P001 => "missing module header",
            P002 => "unexpected token",
            P003 => "expected a name",
            P004 => "expected a type",
            P005 => "expected an expression",
            P006 => "missing statement-end punctuation",
            P007 => "unexpected token at statement level",
            P010 => "invalid field constraint",
            P011 => "duplicate import alias",
            P012 => "invalid pattern",
            P013 => "function has no body",
            P014 => "invalid effect clause",
            S001 => "unknown name",
            S002 => "unknown type",
            S003 => "duplicate declaration",
            S004 => "return type does not match the declared type",
            S005 => "wrong number of arguments",
            S006 => "argument type mismatch",
            S007 => "condition must be a Bool",
            S008 => "assignment to an unbound name",
            S009 => "field access on a value that has no fields",
            S010 => "unknown constructor in pattern",
            S011 => "pattern has the wrong number of bindings",
            S012 => "value is not awaitable",
            S013 => "type parameter is not reachable from any parameter",
            S014 => "generic return type does not unify with the body",
            S020 => "started task is never waited for",
            S021 => "wait names a task that was never started",
            S099 => "internal error while checking this function",
            MissingRequiredField => "required field is missing",
            UnknownField => "unknown field",
            AmbiguousInteropNumeric => "ambiguous numeric literals in interop call",
            W001 => "import is never used",
            M001 => "capability manifest could not be read",
            M002 => "capability manifest is malformed",
            R001 => "unknown lexicon",
            C001 => "workspace index cache is unreadable",
            V001 => "unresolved import",
            V002 => "module name is provided by more than one file",
            EffInferMissingIo => "function performs IO but does not declare it",
            EffInferMissingCpu => "function performs CPU work but does not declare it",
            EffInferRedundantIo => "declared IO effect is never required",
            EffInferRedundantCpu => "declared CPU effect is never required",
            EffInferRedundantCpuWithIo => "declared CPU effect is subsumed by IO",
            EffectVarUnresolved => "effect variable cannot be resolved",
            EffCapMissing => "call requires a capability the function does not declare",
            EffCapSuperfluous => "declared capability is never used",
            CapabilityNotAllowed => "capability is not allowed by the workspace manifest",
            PiiHttpUnencrypted => "PII value reaches an HTTP call",
            PiiSinkUnknown => "PII value reaches a sink",
            PiiMissingConsentCheck => "function processes PII without a consent check",
            WorkflowMissingIoEffect => "workflow requires the io effect",
            WorkflowUndeclaredCapability => "step uses a capability the workflow does not declare",
            CompensateNewCapability => "compensate introduces a capability its step does not use",
            WorkflowInvalidRetry => "retry must allow at least one attempt",
            WorkflowExcessiveRetry => "retry attempts exceed the recommended ceiling",
            WorkflowRetryExceedsTimeout => "estimated retry backoff exceeds the declared timeout",
            WorkflowInvalidTimeout => "timeout must be between 1 second and 1 hour",
        }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single text replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub span: Span,
    pub new_text: String,
}

impl TextEdit {
    pub fn new(span: Span, new_text: impl Into<String>) -> Self {
        Self {
            span,
            new_text: new_text.into(),
        }
    }

    /// An insertion at a position.
    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self::new(Span::empty(at), text)
    }
}

/// A quick-fix attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixIt {
    pub title: String,
    pub edits: Vec<TextEdit>,
}

impl FixIt {
    pub fn new(title: impl Into<String>, edits: Vec<TextEdit>) -> Self {
        Self {
            title: title.into(),
            edits,
        }
    }
}

/// A related source location, e.g. "first declared here".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedInfo {
    pub message: String,
    pub span: Span,
    pub file: Option<String>,
}

impl RelatedInfo {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            file: None,
        }
    }
}

/// A coded diagnostic with a span, optional fix-its, and structured data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagCode,
    pub message: String,
    pub span: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fix_its: Vec<FixIt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<RelatedInfo>,
    /// Structured payload consumed by code-action providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Diagnostic carries serde_json::Value which is not Eq; comparisons in
// caches only need PartialEq.
impl Eq for Diagnostic {}

impl Diagnostic {
    pub fn new(code: DiagCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            source: None,
            fix_its: vec![],
            related_information: vec![],
            data: None,
        }
    }

    /// A diagnostic with the code's default message.
    pub fn coded(code: DiagCode, span: Span) -> Self {
        Self::new(code, code.default_message(), span)
    }

    pub fn error(code: DiagCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, message, span)
    }

    pub fn warning(code: DiagCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, message, span).with_severity(Severity::Warning)
    }

    pub fn info(code: DiagCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(code, message, span).with_severity(Severity::Info)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: &'static str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_fix(mut self, fix: FixIt) -> Self {
        self.fix_its.push(fix);
        self
    }

    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related_information.push(info);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Format for logs and test assertions.
    pub fn format(&self) -> String {
        format!(
            "{}:{} {} [{}] {}",
            self.span.start.line,
            self.span.start.column,
            self.severity.as_str(),
            self.code,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_identifiers_are_stable() {
        assert_eq!(DiagCode::L002.as_str(), "L002");
        assert_eq!(DiagCode::EffInferMissingIo.as_str(), "EFF_INFER_MISSING_IO");
        assert_eq!(DiagCode::PiiHttpUnencrypted.as_str(), "PII_HTTP_UNENCRYPTED");
        assert_eq!(
            DiagCode::MissingRequiredField.as_str(),
            "MISSING_REQUIRED_FIELD"
        );
    }

    #[test]
    fn test_coded_uses_default_message() {
        let d = Diagnostic::coded(DiagCode::P006, Span::from_coords(1, 1, 1, 2));
        assert_eq!(d.message, "missing statement-end punctuation");
        assert!(d.severity.is_error());
    }

    #[test]
    fn test_builder_methods() {
        let span = Span::from_coords(2, 1, 2, 6);
        let d = Diagnostic::warning(DiagCode::W001, "import `util` is never used", span)
            .with_source("check")
            .with_fix(FixIt::new("Remove import", vec![TextEdit::new(span, "")]))
            .with_related(RelatedInfo::new("imported here", span));
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.source, Some("check"));
        assert_eq!(d.fix_its.len(), 1);
        assert_eq!(d.related_information.len(), 1);
    }

    #[test]
    fn test_format_contains_code_and_location() {
        let d = Diagnostic::coded(DiagCode::S003, Span::from_coords(4, 2, 4, 9));
        let s = d.format();
        assert!(s.contains("S003"));
        assert!(s.starts_with("4:2"));
    }
}
