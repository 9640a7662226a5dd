//! Capability enforcement.
//!
//! Verifies that a function's declared `effectCaps` covers every
//! capability its body exercises, applies the workflow policy rules
//! (step/compensate capability containment, retry/timeout bounds), and
//! gates privileged calls against the workspace capability manifest.
//!
//! Fine-grained capability coverage is enforced only for functions that
//! spelled out capabilities (`effect_caps_explicit`); a plain
//! `performs io` stays coarse. The manifest gate applies regardless.

use serde_json::json;
use smol_str::SmolStr;

use crate::base::{DiagCode, Diagnostic, Origin, Severity};
use crate::ir::{CapabilityKind, CoreExpr, CoreFunc, CoreModule, CoreStmt, EffectAtom, Type};

use super::manifest::CapabilityManifest;

/// Base backoff delay used for the bounded-rational retry estimate.
const BASE_BACKOFF_MS: i64 = 1000;
/// Recommended retry-attempt ceiling.
const RECOMMENDED_MAX_ATTEMPTS: i64 = 5;
const LINEAR_WINDOW_MS: i64 = 5 * 60 * 1000;
const EXPONENTIAL_WINDOW_MS: i64 = 15 * 60 * 1000;
const MIN_TIMEOUT_MS: i64 = 1000;
const MAX_TIMEOUT_MS: i64 = 60 * 60 * 1000;

/// A capability use at a call site.
#[derive(Debug, Clone)]
struct CapUse {
    cap: CapabilityKind,
    callee: SmolStr,
    origin: Origin,
}

/// Check capability coverage and workflow policy for a whole module.
pub fn check_capabilities(
    module: &CoreModule,
    manifest: Option<&CapabilityManifest>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let module_name = module
        .name
        .clone()
        .unwrap_or_else(|| SmolStr::new("main"));

    for func in &module.funcs {
        let Some(body) = &func.body else {
            continue;
        };
        let mut uses = Vec::new();
        collect_uses_stmts(body, func, &mut uses);

        check_declared_coverage(func, &uses, &mut diagnostics);
        check_workflows(func, body, &mut diagnostics);
        if let Some(manifest) = manifest {
            check_manifest_gate(&module_name, func, &uses, manifest, &mut diagnostics);
        }
    }
    diagnostics
}

fn check_declared_coverage(func: &CoreFunc, uses: &[CapUse], diagnostics: &mut Vec<Diagnostic>) {
    if !func.effect_caps_explicit {
        return;
    }

    let mut missing: Vec<(CapabilityKind, Vec<&CapUse>)> = Vec::new();
    for cap_use in uses {
        if func.effect_caps.contains(&cap_use.cap) {
            continue;
        }
        match missing.iter_mut().find(|(c, _)| *c == cap_use.cap) {
            Some((_, sites)) => sites.push(cap_use),
            None => missing.push((cap_use.cap, vec![cap_use])),
        }
    }
    for (cap, sites) in &missing {
        let site_list: Vec<_> = sites
            .iter()
            .map(|s| json!({ "callee": s.callee, "line": s.origin.span.start.line }))
            .collect();
        diagnostics.push(
            Diagnostic::new(
                DiagCode::EffCapMissing,
                format!(
                    "'{}' uses capability {} without declaring it ({} call site(s))",
                    func.name,
                    cap.name(),
                    sites.len()
                ),
                func.header_origin.span,
            )
            .with_source("capability")
            .with_data(json!({ "func": func.name, "cap": cap.name(), "sites": site_list })),
        );
    }

    for declared in &func.effect_caps {
        if !uses.iter().any(|u| u.cap == *declared) {
            diagnostics.push(
                Diagnostic::new(
                    DiagCode::EffCapSuperfluous,
                    format!("'{}' declares capability {} but never uses it", func.name, declared),
                    func.header_origin.span,
                )
                .with_severity(Severity::Info)
                .with_source("capability")
                .with_data(json!({ "func": func.name, "cap": declared.name() })),
            );
        }
    }
}

fn check_workflows(func: &CoreFunc, body: &[CoreStmt], diagnostics: &mut Vec<Diagnostic>) {
    for stmt in body {
        let CoreStmt::Workflow(wf) = stmt else {
            // Workflows appear at statement level only.
            continue;
        };

        if !func.declared_effects.contains(&EffectAtom::Io) {
            diagnostics.push(
                Diagnostic::new(
                    DiagCode::WorkflowMissingIoEffect,
                    format!("workflow in '{}' requires the io effect", func.name),
                    wf.origin.span,
                )
                .with_source("capability")
                .with_data(json!({ "func": func.name })),
            );
        }

        for step in &wf.steps {
            if func.effect_caps_explicit {
                for cap in &step.effect_caps {
                    if !func.effect_caps.contains(cap) {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagCode::WorkflowUndeclaredCapability,
                                format!(
                                    "step '{}' uses {} which the workflow does not declare",
                                    step.name, cap
                                ),
                                step.origin.span,
                            )
                            .with_source("capability")
                            .with_data(json!({
                                "func": func.name,
                                "step": step.name,
                                "capability": cap.name(),
                            })),
                        );
                    }
                }
            }

            if let Some(compensate) = &step.compensate {
                let mut comp_caps = Vec::new();
                crate::ir::lower::collect_caps_from_stmts(compensate, &mut comp_caps);
                for cap in comp_caps {
                    if !step.effect_caps.contains(&cap) {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagCode::CompensateNewCapability,
                                format!(
                                    "compensate for step '{}' introduces {} not used by the step",
                                    step.name, cap
                                ),
                                step.origin.span,
                            )
                            .with_source("capability")
                            .with_data(json!({
                                "step": step.name,
                                "capability": cap.name(),
                            })),
                        );
                    }
                }
            }
        }

        check_retry_policy(wf, diagnostics);
    }
}

fn check_retry_policy(wf: &crate::ir::CoreWorkflow, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(timeout) = wf.timeout_ms {
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout) {
            diagnostics.push(
                Diagnostic::new(
                    DiagCode::WorkflowInvalidTimeout,
                    format!("timeout of {timeout}ms must be between 1 second and 1 hour"),
                    wf.origin.span,
                )
                .with_source("capability")
                .with_data(json!({ "timeoutMs": timeout })),
            );
        }
    }

    let Some(retry) = &wf.retry else {
        return;
    };
    if retry.max_attempts <= 0 {
        diagnostics.push(
            Diagnostic::new(
                DiagCode::WorkflowInvalidRetry,
                "retry must allow at least one attempt",
                retry.origin.span,
            )
            .with_source("capability"),
        );
        return;
    }
    if retry.max_attempts > RECOMMENDED_MAX_ATTEMPTS {
        diagnostics.push(
            Diagnostic::new(
                DiagCode::WorkflowExcessiveRetry,
                format!(
                    "{} attempts exceeds the recommended ceiling of {}",
                    retry.max_attempts, RECOMMENDED_MAX_ATTEMPTS
                ),
                retry.origin.span,
            )
            .with_severity(Severity::Warning)
            .with_source("capability")
            .with_data(json!({ "maxAttempts": retry.max_attempts })),
        );
    }

    let estimate = estimate_backoff_ms(retry.max_attempts, retry.backoff);
    let window = match retry.backoff {
        crate::syntax::ast::BackoffKind::Exponential => EXPONENTIAL_WINDOW_MS,
        _ => LINEAR_WINDOW_MS,
    };
    if estimate > window {
        diagnostics.push(
            Diagnostic::new(
                DiagCode::WorkflowExcessiveRetry,
                format!(
                    "estimated cumulative backoff of {estimate}ms exceeds the {}ms recommended window",
                    window
                ),
                retry.origin.span,
            )
            .with_severity(Severity::Warning)
            .with_source("capability")
            .with_data(json!({ "estimateMs": estimate, "windowMs": window })),
        );
    }
    if let Some(timeout) = wf.timeout_ms {
        if estimate > timeout {
            diagnostics.push(
                Diagnostic::new(
                    DiagCode::WorkflowRetryExceedsTimeout,
                    format!(
                        "estimated cumulative backoff of {estimate}ms exceeds the {timeout}ms timeout"
                    ),
                    retry.origin.span,
                )
                .with_source("capability")
                .with_data(json!({ "estimateMs": estimate, "timeoutMs": timeout })),
            );
        }
    }
}

/// Cumulative wait across retries, saturating to avoid overflow on large
/// attempt counts.
fn estimate_backoff_ms(attempts: i64, backoff: crate::syntax::ast::BackoffKind) -> i64 {
    use crate::syntax::ast::BackoffKind;
    let retries = (attempts - 1).max(0);
    match backoff {
        BackoffKind::Fixed => BASE_BACKOFF_MS.saturating_mul(retries),
        BackoffKind::Linear => {
            // base * (1 + 2 + … + retries)
            BASE_BACKOFF_MS.saturating_mul(retries.saturating_mul(retries + 1) / 2)
        }
        BackoffKind::Exponential => {
            let mut total: i64 = 0;
            let mut delay = BASE_BACKOFF_MS;
            for _ in 0..retries.min(62) {
                total = total.saturating_add(delay);
                delay = delay.saturating_mul(2);
            }
            total
        }
    }
}

/// The manifest gates at the effect level: every Io-family capability
/// checks under its own key and the coarse `io` key.
fn check_manifest_gate(
    module_name: &SmolStr,
    func: &CoreFunc,
    uses: &[CapUse],
    manifest: &CapabilityManifest,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut reported: Vec<CapabilityKind> = Vec::new();
    for cap_use in uses {
        if reported.contains(&cap_use.cap) {
            continue;
        }
        let effect_key = match cap_use.cap {
            CapabilityKind::Cpu => "cpu",
            _ => "io",
        };
        let allowed = manifest.allows(&cap_use.cap.manifest_key(), module_name, &func.name)
            || manifest.allows(effect_key, module_name, &func.name);
        if allowed {
            continue;
        }
        reported.push(cap_use.cap);
        diagnostics.push(
            Diagnostic::new(
                DiagCode::CapabilityNotAllowed,
                format!(
                    "'{}.{}' is not allowed to use {} by the workspace manifest",
                    module_name,
                    func.name,
                    cap_use.cap.name()
                ),
                cap_use.origin.span,
            )
            .with_source("capability")
            .with_data(json!({
                "func": format!("{}.{}", module_name, func.name),
                "module": module_name,
                "cap": effect_key,
            })),
        );
    }
}

/// Walk a function body recording capability uses with their call sites.
fn collect_uses_stmts(stmts: &[CoreStmt], func: &CoreFunc, out: &mut Vec<CapUse>) {
    for stmt in stmts {
        match stmt {
            CoreStmt::Let { value, .. } | CoreStmt::Set { value, .. } => {
                collect_uses_expr(value, func, out)
            }
            CoreStmt::Return { value, .. } => {
                if let Some(value) = value {
                    collect_uses_expr(value, func, out);
                }
            }
            CoreStmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                collect_uses_expr(cond, func, out);
                collect_uses_stmts(then, func, out);
                if let Some(otherwise) = otherwise {
                    collect_uses_stmts(otherwise, func, out);
                }
            }
            CoreStmt::Match { expr, cases, .. } => {
                collect_uses_expr(expr, func, out);
                for case in cases {
                    collect_uses_stmts(&case.body, func, out);
                }
            }
            CoreStmt::Start { expr, .. } => collect_uses_expr(expr, func, out),
            CoreStmt::Wait { .. } => {}
            CoreStmt::Workflow(wf) => {
                for step in &wf.steps {
                    collect_uses_stmts(&step.body, func, out);
                    if let Some(compensate) = &step.compensate {
                        collect_uses_stmts(compensate, func, out);
                    }
                }
            }
            CoreStmt::Scope { body, .. }
            | CoreStmt::ForEach { body, .. }
            | CoreStmt::Block { body, .. } => collect_uses_stmts(body, func, out),
            CoreStmt::Expr { expr, .. } => collect_uses_expr(expr, func, out),
        }
    }
}

fn collect_uses_expr(expr: &CoreExpr, func: &CoreFunc, out: &mut Vec<CapUse>) {
    if let CoreExpr::Call { target, args, origin } = expr {
        if let CoreExpr::Name { text, .. } = &**target {
            // Prefix rules.
            if let Some(cap) = CapabilityKind::infer_from_call(text) {
                out.push(CapUse {
                    cap,
                    callee: text.clone(),
                    origin: origin.clone(),
                });
            } else if let Some(param) = func.params.iter().find(|p| p.name == *text) {
                // Explicit capability phrases on the callable's type.
                if let Type::Func { caps, .. } = &param.ty {
                    for cap in caps {
                        out.push(CapUse {
                            cap: *cap,
                            callee: text.clone(),
                            origin: origin.clone(),
                        });
                    }
                }
            }
        }
        for arg in args {
            collect_uses_expr(arg, func, out);
        }
        return;
    }
    match expr {
        CoreExpr::Construct { fields, .. } => {
            for (_, value) in fields {
                collect_uses_expr(value, func, out);
            }
        }
        CoreExpr::Ok { expr, .. }
        | CoreExpr::Err { expr, .. }
        | CoreExpr::Some { expr, .. }
        | CoreExpr::Await { expr, .. } => collect_uses_expr(expr, func, out),
        CoreExpr::Lambda { body, .. } => collect_uses_expr(body, func, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::lower_module;
    use crate::parser::test_support::parse_en;

    use super::*;

    fn check_en(source: &str, manifest: Option<&CapabilityManifest>) -> Vec<Diagnostic> {
        let parsed = parse_en(source);
        let lowered = lower_module(&parsed.module, None);
        check_capabilities(&lowered.module, manifest)
    }

    fn codes(diags: &[Diagnostic]) -> Vec<&'static str> {
        diags.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_missing_capability() {
        let diags = check_en(
            "module m.\nto f, produce Text, performs io with Sql:\n  return Http.get(\"u\").\n",
            None,
        );
        let codes = codes(&diags);
        assert!(codes.contains(&"EFF_CAP_MISSING"), "{codes:?}");
        assert!(codes.contains(&"EFF_CAP_SUPERFLUOUS"), "{codes:?}");
    }

    #[test]
    fn test_coarse_io_not_checked() {
        let diags = check_en(
            "module m.\nto f, produce Text, performs io:\n  return Http.get(\"u\").\n",
            None,
        );
        assert!(!codes(&diags).contains(&"EFF_CAP_MISSING"));
    }

    #[test]
    fn test_callable_param_caps_count() {
        let diags = check_en(
            "module m.\nto f, given g as (given Int, produce Int, performs io with Sql), produce Int, performs io with Http:\n  return g(1).\n",
            None,
        );
        assert!(codes(&diags).contains(&"EFF_CAP_MISSING"));
    }

    #[test]
    fn test_workflow_missing_io() {
        let diags = check_en(
            "module m.\nto run, produce Int:\n  workflow:\n    step one:\n      Http.get(\"u\").\n  return 1.\n",
            None,
        );
        assert!(codes(&diags).contains(&"WORKFLOW_MISSING_IO_EFFECT"));
    }

    #[test]
    fn test_step_undeclared_capability() {
        let diags = check_en(
            "module m.\nto run, produce Int, performs io with Http:\n  workflow:\n    step store:\n      Db.insert(\"row\").\n  return 1.\n",
            None,
        );
        assert!(codes(&diags).contains(&"WORKFLOW_UNDECLARED_CAPABILITY"));
    }

    #[test]
    fn test_compensate_new_capability() {
        let diags = check_en(
            "module m.\nto run, produce Int, performs io:\n  workflow:\n    step charge:\n      Http.post(\"u\").\n      compensate:\n        Db.delete(\"row\").\n  return 1.\n",
            None,
        );
        assert!(codes(&diags).contains(&"COMPENSATE_NEW_CAPABILITY"));
    }

    #[test]
    fn test_retry_policy_bounds() {
        let diags = check_en(
            "module m.\nto run, produce Int, performs io:\n  workflow:\n    step one:\n      Http.get(\"u\").\n    retry max attempts 9 backoff exponential.\n    timeout within 100.\n  return 1.\n",
            None,
        );
        let codes = codes(&diags);
        assert!(codes.contains(&"WORKFLOW_EXCESSIVE_RETRY"), "{codes:?}");
        assert!(codes.contains(&"WORKFLOW_INVALID_TIMEOUT"), "{codes:?}");
        assert!(codes.contains(&"WORKFLOW_RETRY_EXCEEDS_TIMEOUT"), "{codes:?}");
    }

    #[test]
    fn test_manifest_gate_scenario() {
        let manifest = CapabilityManifest::parse(r#"{ "allow": { "io": [] } }"#).unwrap();
        let diags = check_en(
            "module demo.capdemo.\nto hello, produce Text, performs io:\n  return Http.get(\"u\").\n",
            Some(&manifest),
        );
        let diag = diags
            .iter()
            .find(|d| d.code == DiagCode::CapabilityNotAllowed)
            .expect("CAPABILITY_NOT_ALLOWED");
        let data = diag.data.as_ref().unwrap();
        assert_eq!(data["func"], "demo.capdemo.hello");
        assert_eq!(data["module"], "demo.capdemo");
        assert_eq!(data["cap"], "io");
    }

    #[test]
    fn test_manifest_wildcard_allows() {
        let manifest =
            CapabilityManifest::parse(r#"{ "allow": { "io": ["demo.capdemo.*"] } }"#).unwrap();
        let diags = check_en(
            "module demo.capdemo.\nto hello, produce Text, performs io:\n  return Http.get(\"u\").\n",
            Some(&manifest),
        );
        assert!(!codes(&diags).contains(&"CAPABILITY_NOT_ALLOWED"));
    }

    #[test]
    fn test_backoff_estimate() {
        use crate::syntax::ast::BackoffKind;
        assert_eq!(estimate_backoff_ms(1, BackoffKind::Fixed), 0);
        assert_eq!(estimate_backoff_ms(3, BackoffKind::Fixed), 2000);
        assert_eq!(estimate_backoff_ms(3, BackoffKind::Linear), 3000);
        assert_eq!(estimate_backoff_ms(4, BackoffKind::Exponential), 7000);
    }
}
