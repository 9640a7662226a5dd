//! PII taint analysis.
//!
//! Flow-sensitive tracking of PII-annotated values through a function
//! body. A parameter typed `@pii(...)` seeds the taint environment;
//! taint propagates through lets, constructs, calls, and match
//! bindings (each branch works on a cloned environment). Tainted values
//! reaching a sink (http, console, database, file write) produce
//! diagnostics; `redact(...)` clears taint.
//!
//! Analyzer state is confined to the function being checked; the pass
//! re-runs per function.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::json;
use smol_str::SmolStr;

use crate::base::{DiagCode, Diagnostic, FixIt, Severity, TextEdit};
use crate::ir::{CoreExpr, CoreFunc, CoreModule, CorePattern, CoreStmt, Type};

use super::check::ModuleContext;

const CONSENT_ANNOTATIONS: &[&str] = &["consent_required", "gdpr_consent", "requires_consent"];
const CONSENT_CALLS: &[&str] = &[
    "checkConsent",
    "requireConsent",
    "hasConsent",
    "isConsentGiven",
    "GDPR.checkConsent",
];
const DB_WRITE_METHODS: &[&str] = &[
    "insert", "update", "delete", "save", "persist", "exec", "execute",
];
const FILE_WRITE_METHODS: &[&str] = &["write", "writeFile", "append", "save"];

/// Analyze every function in a module. `strict` promotes HTTP and
/// database leaks to errors.
pub fn analyze_pii(module: &CoreModule, ctx: &ModuleContext, strict: bool) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for func in &module.funcs {
        analyze_func(func, ctx, strict, &mut diagnostics);
    }
    diagnostics
}

/// Taint environment: the set of tainted names.
type Env = FxHashMap<SmolStr, bool>;

struct PiiAnalyzer<'a> {
    ctx: &'a ModuleContext,
    strict: bool,
    diagnostics: &'a mut Vec<Diagnostic>,
    consent_seen: bool,
}

fn analyze_func(
    func: &CoreFunc,
    ctx: &ModuleContext,
    strict: bool,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(body) = &func.body else {
        return;
    };

    let mut env: Env = Env::default();
    let mut has_pii_param = false;
    for param in &func.params {
        if param.ty.is_pii() {
            env.insert(param.name.clone(), true);
            has_pii_param = true;
        }
    }

    let mut analyzer = PiiAnalyzer {
        ctx,
        strict,
        diagnostics,
        consent_seen: false,
    };
    analyzer.walk_stmts(body, &mut env);

    if has_pii_param && !analyzer.consent_seen && !has_consent_annotation(func) {
        let header = func.header_origin.span;
        analyzer.diagnostics.push(
            Diagnostic::new(
                DiagCode::PiiMissingConsentCheck,
                format!(
                    "'{}' processes PII without a consent annotation or consent check",
                    func.name
                ),
                header,
            )
            .with_severity(Severity::Warning)
            .with_source("pii")
            .with_fix(FixIt::new(
                "Add @consent_required",
                vec![TextEdit::insert(header.start, "@consent_required\n")],
            ))
            .with_data(json!({ "func": func.name })),
        );
    }
}

fn has_consent_annotation(func: &CoreFunc) -> bool {
    func.annotations.iter().any(|a| {
        CONSENT_ANNOTATIONS
            .iter()
            .any(|c| a.eq_ignore_ascii_case(c))
    })
}

fn is_consent_call(name: &str) -> bool {
    CONSENT_CALLS.contains(&name) || name.starts_with("Consent.")
}

/// Sink classification for a dotted call name.
fn sink_kind(name: &str) -> Option<&'static str> {
    if name == "print" || name == "Io.print" || name == "Console.log" || name.starts_with("Log.") {
        return Some("console");
    }
    let tail = name.rsplit('.').next().unwrap_or(name);
    if (name.starts_with("Db.") || name.starts_with("Sql.") || name.starts_with("Database."))
        && DB_WRITE_METHODS.contains(&tail)
    {
        return Some("database");
    }
    if (name.starts_with("Fs.") || name.starts_with("File.") || name.starts_with("Io."))
        && FILE_WRITE_METHODS.contains(&tail)
    {
        return Some("file");
    }
    None
}

impl PiiAnalyzer<'_> {
    fn walk_stmts(&mut self, stmts: &[CoreStmt], env: &mut Env) {
        for stmt in stmts {
            self.walk_stmt(stmt, env);
        }
    }

    fn walk_stmt(&mut self, stmt: &CoreStmt, env: &mut Env) {
        match stmt {
            CoreStmt::Let { name, value, .. } | CoreStmt::Set { name, value, .. } => {
                let tainted = self.eval_expr(value, env);
                let base = SmolStr::new(name.split('.').next().unwrap_or(name));
                if tainted {
                    env.insert(base, true);
                } else if !name.contains('.') {
                    env.insert(base, false);
                }
            }
            CoreStmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.eval_expr(value, env);
                }
            }
            CoreStmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.eval_expr(cond, env);
                let mut then_env = env.clone();
                self.walk_stmts(then, &mut then_env);
                if let Some(otherwise) = otherwise {
                    let mut else_env = env.clone();
                    self.walk_stmts(otherwise, &mut else_env);
                    merge_env(env, &else_env);
                }
                merge_env(env, &then_env);
            }
            CoreStmt::Match { expr, cases, .. } => {
                let scrutinee_tainted = self.eval_expr(expr, env);
                for case in cases {
                    // Each branch works on a cloned environment.
                    let mut branch_env = env.clone();
                    bind_pattern_taint(&case.pattern, scrutinee_tainted, &mut branch_env);
                    self.walk_stmts(&case.body, &mut branch_env);
                    merge_env(env, &branch_env);
                }
            }
            CoreStmt::Start { name, expr, .. } => {
                let tainted = self.eval_expr(expr, env);
                env.insert(name.clone(), tainted);
            }
            CoreStmt::Wait { .. } => {}
            CoreStmt::Workflow(wf) => {
                for step in &wf.steps {
                    self.walk_stmts(&step.body, env);
                    if let Some(compensate) = &step.compensate {
                        self.walk_stmts(compensate, env);
                    }
                }
            }
            CoreStmt::Scope { body, .. } | CoreStmt::Block { body, .. } => {
                self.walk_stmts(body, env)
            }
            CoreStmt::ForEach {
                var, iter, body, ..
            } => {
                let tainted = self.eval_expr(iter, env);
                let mut loop_env = env.clone();
                loop_env.insert(var.clone(), tainted);
                self.walk_stmts(body, &mut loop_env);
                merge_env(env, &loop_env);
            }
            CoreStmt::Expr { expr, .. } => {
                self.eval_expr(expr, env);
            }
        }
    }

    /// Evaluate an expression's taint; reports sink violations inline.
    fn eval_expr(&mut self, expr: &CoreExpr, env: &Env) -> bool {
        match expr {
            CoreExpr::Name { text, .. } => {
                let base = text.split('.').next().unwrap_or(text);
                *env.get(base).unwrap_or(&false)
            }
            CoreExpr::Ok { expr, .. }
            | CoreExpr::Err { expr, .. }
            | CoreExpr::Some { expr, .. }
            | CoreExpr::Await { expr, .. } => self.eval_expr(expr, env),
            CoreExpr::Construct { fields, .. } => {
                let mut tainted = false;
                for (_, value) in fields {
                    tainted |= self.eval_expr(value, env);
                }
                tainted
            }
            CoreExpr::Lambda { body, .. } => self.eval_expr(body, env),
            CoreExpr::Call { target, args, origin } => {
                let arg_taints: Vec<bool> = args.iter().map(|a| self.eval_expr(a, env)).collect();
                let any_tainted = arg_taints.iter().any(|t| *t);

                let Some(name) = (match &**target {
                    CoreExpr::Name { text, .. } => Some(text.clone()),
                    _ => None,
                }) else {
                    return any_tainted;
                };

                if is_consent_call(&name) {
                    self.consent_seen = true;
                    return false;
                }
                if name == "redact" {
                    // Redaction clears taint.
                    return false;
                }

                if any_tainted {
                    self.check_sinks(&name, args, &arg_taints, origin);
                }

                // Calls to local functions returning PII taint the result.
                if let Some(sig) = self.ctx.funcs.get(name.as_str()) {
                    if sig.ret.is_pii() {
                        return true;
                    }
                }

                // Conservative: argument taint propagates to the result.
                any_tainted
            }
            _ => false,
        }
    }

    fn check_sinks(
        &mut self,
        name: &str,
        args: &[CoreExpr],
        arg_taints: &[bool],
        origin: &crate::base::Origin,
    ) {
        // HTTP: any call exercising the Http capability.
        if name.starts_with("Http.") {
            let severity = if self.strict {
                Severity::Error
            } else {
                Severity::Warning
            };
            let mut diag = Diagnostic::new(
                DiagCode::PiiHttpUnencrypted,
                format!("PII value reaches HTTP call '{name}'"),
                origin.span,
            )
            .with_severity(severity)
            .with_source("pii")
            .with_data(json!({ "sink": "http", "callee": name }));
            if let Some(fix) = redact_fix(args, arg_taints) {
                diag = diag.with_fix(fix);
            }
            self.diagnostics.push(diag);
            return;
        }

        if let Some(kind) = sink_kind(name) {
            let severity = match kind {
                "database" | "file" if self.strict => Severity::Error,
                _ => Severity::Warning,
            };
            let mut diag = Diagnostic::new(
                DiagCode::PiiSinkUnknown,
                format!("PII value reaches {kind} sink '{name}'"),
                origin.span,
            )
            .with_severity(severity)
            .with_source("pii")
            .with_data(json!({ "sink": kind, "callee": name }));
            if let Some(fix) = redact_fix(args, arg_taints) {
                diag = diag.with_fix(fix);
            }
            self.diagnostics.push(diag);
        }
    }
}

/// Quick-fix wrapping the first tainted name argument with `redact(…)`.
fn redact_fix(args: &[CoreExpr], arg_taints: &[bool]) -> Option<FixIt> {
    for (arg, tainted) in args.iter().zip(arg_taints) {
        if !tainted {
            continue;
        }
        if let CoreExpr::Name { text, origin } = arg {
            return Some(FixIt::new(
                format!("Wrap '{text}' with redact(...)"),
                vec![
                    TextEdit::insert(origin.span.start, "redact("),
                    TextEdit::insert(origin.span.end, ")"),
                ],
            ));
        }
    }
    None
}

/// Pattern bindings inherit the scrutinee's taint.
fn bind_pattern_taint(pattern: &CorePattern, tainted: bool, env: &mut Env) {
    match pattern {
        CorePattern::Name { name, .. } => {
            env.insert(name.clone(), tainted);
        }
        CorePattern::Ctor { names, args, .. } => {
            for name in names {
                env.insert(name.clone(), tainted);
            }
            for arg in args {
                bind_pattern_taint(arg, tainted, env);
            }
        }
        CorePattern::Null { .. } | CorePattern::Int { .. } => {}
    }
}

/// Merge a branch environment back: taint is sticky across joins.
fn merge_env(into: &mut Env, branch: &Env) {
    for (name, tainted) in branch {
        if *tainted {
            into.insert(name.clone(), true);
        }
    }
}

/// True when an expression is tainted under the given environment;
/// exposed for the engine's tests of the taint invariants.
pub fn is_pii_tainted(expr: &CoreExpr, env: &FxHashMap<SmolStr, bool>, ctx: &ModuleContext) -> bool {
    let mut scratch = Vec::new();
    let mut analyzer = PiiAnalyzer {
        ctx,
        strict: false,
        diagnostics: &mut scratch,
        consent_seen: false,
    };
    analyzer.eval_expr(expr, env)
}

/// Parameter types that seed the taint environment.
pub fn pii_params(func: &CoreFunc) -> FxHashSet<SmolStr> {
    func.params
        .iter()
        .filter(|p| matches!(p.ty, Type::Pii { .. }))
        .map(|p| p.name.clone())
        .collect()
}
