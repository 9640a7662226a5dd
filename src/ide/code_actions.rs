//! Code actions (quick-fixes).
//!
//! Sources, in order:
//! 1. Fix-its attached to diagnostics by the producing pass (effect
//!    add/remove, missing punctuation, module header, PII mitigations).
//! 2. Capability-manifest grants derived from `CAPABILITY_NOT_ALLOWED`
//!    data: allow the fully-qualified function or the module wildcard.
//! 3. Numeric-literal disambiguation for `AMBIGUOUS_INTEROP_NUMERIC`.
//! 4. Replacing `null` with a type-appropriate sentinel.

use serde_json::Value;

use crate::base::{DiagCode, Diagnostic, Span, TextEdit};
use crate::engine::DocumentArtifacts;
use crate::index::Range0;
use crate::lexer::TokenKind;
use crate::lexicon::KeywordKind;

/// A pending edit against the capability manifest: add `entry` to the
/// allow list under `cap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestGrant {
    pub cap: String,
    pub entry: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAction {
    pub title: String,
    /// LSP code-action kind; quick-fixes throughout.
    pub kind: &'static str,
    /// Text edits in the current document.
    pub edits: Vec<(Range0, String)>,
    /// A manifest change instead of (or in addition to) text edits.
    pub manifest: Option<ManifestGrant>,
}

impl CodeAction {
    fn from_edits(title: String, edits: Vec<TextEdit>) -> Self {
        Self {
            title,
            kind: "quickfix",
            edits: edits
                .into_iter()
                .map(|e| (e.span.into(), e.new_text))
                .collect(),
            manifest: None,
        }
    }
}

/// Actions for the diagnostics intersecting `range`.
pub fn code_actions(
    artifacts: &DocumentArtifacts,
    range: Span,
    diagnostics: &[Diagnostic],
) -> Vec<CodeAction> {
    let mut actions = Vec::new();

    for diag in diagnostics {
        if !spans_intersect(diag.span, range) {
            continue;
        }

        // 1. Pass-attached fix-its.
        for fix in &diag.fix_its {
            actions.push(CodeAction::from_edits(fix.title.clone(), fix.edits.clone()));
        }

        match diag.code {
            DiagCode::CapabilityNotAllowed => {
                if let Some(data) = &diag.data {
                    actions.extend(manifest_actions(data));
                }
            }
            DiagCode::AmbiguousInteropNumeric => {
                if let Some(data) = &diag.data {
                    actions.extend(numeric_actions(data));
                }
            }
            _ => {}
        }

        // 4. `null` under a typed diagnostic becomes a sentinel.
        if matches!(diag.code, DiagCode::S004 | DiagCode::S006) {
            if let Some(null_span) = null_token_in(artifacts, diag.span) {
                actions.push(CodeAction {
                    title: "Replace null with none".to_string(),
                    kind: "quickfix",
                    edits: vec![(null_span.into(), "none".to_string())],
                    manifest: None,
                });
            }
        }
    }

    actions
}

/// "Allow IO for demo.capdemo.hello in manifest" plus the
/// module-wildcard variant.
fn manifest_actions(data: &Value) -> Vec<CodeAction> {
    let (Some(func), Some(module), Some(cap)) = (
        data.get("func").and_then(Value::as_str),
        data.get("module").and_then(Value::as_str),
        data.get("cap").and_then(Value::as_str),
    ) else {
        return vec![];
    };
    let cap_upper = cap.to_uppercase();
    vec![
        CodeAction {
            title: format!("Allow {cap_upper} for {func} in manifest"),
            kind: "quickfix",
            edits: vec![],
            manifest: Some(ManifestGrant {
                cap: cap.to_string(),
                entry: func.to_string(),
            }),
        },
        CodeAction {
            title: format!("Allow {cap_upper} for {module}.* in manifest"),
            kind: "quickfix",
            edits: vec![],
            manifest: Some(ManifestGrant {
                cap: cap.to_string(),
                entry: format!("{module}.*"),
            }),
        },
    ]
}

/// `SomeJava.add(1, 1.0)`: replace `1` with `1L` or `1.0`.
fn numeric_actions(data: &Value) -> Vec<CodeAction> {
    let Some(ints) = data.get("ints").and_then(Value::as_array) else {
        return vec![];
    };
    let mut actions = Vec::new();
    for int in ints {
        let (Some(value), Some(line), Some(column), Some(end_column)) = (
            int.get("value").and_then(Value::as_i64),
            int.get("line").and_then(Value::as_u64),
            int.get("column").and_then(Value::as_u64),
            int.get("endColumn").and_then(Value::as_u64),
        ) else {
            continue;
        };
        let span = Span::from_coords(line as u32, column as u32, line as u32, end_column as u32);
        actions.push(CodeAction {
            title: format!("Replace {value} with {value}L"),
            kind: "quickfix",
            edits: vec![(span.into(), format!("{value}L"))],
            manifest: None,
        });
        actions.push(CodeAction {
            title: format!("Replace {value} with {value}.0"),
            kind: "quickfix",
            edits: vec![(span.into(), format!("{value}.0"))],
            manifest: None,
        });
    }
    actions
}

fn null_token_in(artifacts: &DocumentArtifacts, span: Span) -> Option<Span> {
    artifacts
        .tokens
        .iter()
        .find(|t| t.kind == TokenKind::Keyword(KeywordKind::Null) && spans_intersect(t.span(), span))
        .map(|t| t.span())
}

fn spans_intersect(a: Span, b: Span) -> bool {
    a.contains(b.start) || a.contains(b.end) || b.contains(a.start) || b.contains(a.end)
}
