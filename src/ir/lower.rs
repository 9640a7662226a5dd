//! AST → Core IR lowering.
//!
//! Re-roots every node to an [`Origin`], folds immediate constants where
//! that cannot change semantics (checked integer arithmetic only),
//! converts capability phrases to the closed [`CapabilityKind`] set, and
//! rewrites workflows into the explicit step shape with per-step
//! capability sets.

use smol_str::SmolStr;

use crate::base::{DiagCode, Diagnostic, Origin, Span};
use crate::syntax::ast::{self, Constraint, Expr, Pattern, Statement, TypeExpr};

use super::nodes::*;
use super::ty::{CapabilityKind, EffectAtom, EffectSet, Type};

/// Lowering output: the Core module plus `L1xx` diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct LowerResult {
    pub module: CoreModule,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lower a parsed module. `file` becomes the origin file identity.
pub fn lower_module(ast: &ast::Module, file: Option<&str>) -> LowerResult {
    let mut ctx = Lowerer {
        file: file.map(SmolStr::new),
        diagnostics: Vec::new(),
    };

    let mut imports = Vec::new();
    let mut datas = Vec::new();
    let mut enums = Vec::new();
    let mut funcs = Vec::new();

    for decl in &ast.decls {
        match decl {
            ast::Decl::Import(i) => imports.push(CoreImport {
                name: i.name.clone(),
                alias: i.alias.clone(),
                origin: ctx.origin(i.span),
            }),
            ast::Decl::Data(d) => datas.push(ctx.lower_data(d)),
            ast::Decl::Enum(e) => enums.push(CoreEnum {
                name: e.name.clone(),
                name_origin: ctx.origin(e.name_span),
                variants: e.variants.iter().map(|(v, _)| v.clone()).collect(),
                origin: ctx.origin(e.span),
            }),
            ast::Decl::Func(f) => funcs.push(ctx.lower_func(f)),
        }
    }

    LowerResult {
        module: CoreModule {
            name: ast.name.as_ref().map(|n| n.text.clone()),
            imports,
            datas,
            enums,
            funcs,
            origin: ctx.origin(ast.span),
        },
        diagnostics: ctx.diagnostics,
    }
}

struct Lowerer {
    file: Option<SmolStr>,
    diagnostics: Vec<Diagnostic>,
}

impl Lowerer {
    fn origin(&self, span: Span) -> Origin {
        Origin::new(span, self.file.clone())
    }

    fn lower_data(&mut self, data: &ast::Data) -> CoreData {
        let fields = data
            .fields
            .iter()
            .map(|f| {
                let mut required = false;
                let mut range = None;
                let mut pattern = None;
                for c in &f.constraints {
                    match c {
                        Constraint::Required { .. } => required = true,
                        Constraint::Range { min, max, .. } => range = Some((*min, *max)),
                        Constraint::Pattern { regex, .. } => pattern = Some(regex.clone()),
                    }
                }
                CoreField {
                    name: f.name.clone(),
                    ty: self.lower_type(&f.ty),
                    required,
                    range,
                    pattern,
                    type_inferred: f.type_inferred,
                    origin: self.origin(f.span),
                }
            })
            .collect();
        CoreData {
            name: data.name.clone(),
            name_origin: self.origin(data.name_span),
            fields,
            origin: self.origin(data.span),
        }
    }

    fn lower_func(&mut self, f: &ast::Func) -> CoreFunc {
        let mut declared_effects = Vec::new();
        let mut declared_effect_origins = Vec::new();
        for effect in &f.effects {
            match EffectAtom::parse(&effect.name) {
                Some(atom) => {
                    if !declared_effects.contains(&atom) {
                        declared_effects.push(atom);
                        declared_effect_origins.push((atom, self.origin(effect.span)));
                    }
                }
                None => {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagCode::L106,
                            format!("unknown effect '{}'", effect.name),
                            effect.span,
                        )
                        .with_source("lower"),
                    );
                }
            }
        }

        let mut effect_caps = Vec::new();
        let mut effect_vars = Vec::new();
        for (phrase, span) in &f.effect_caps {
            if f.type_params.iter().any(|p| p == phrase) {
                effect_vars.push(phrase.clone());
                continue;
            }
            match CapabilityKind::parse(phrase) {
                Some(cap) => {
                    if !effect_caps.contains(&cap) {
                        effect_caps.push(cap);
                    }
                }
                None => {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagCode::L106,
                            format!("unknown capability '{phrase}'"),
                            *span,
                        )
                        .with_source("lower"),
                    );
                }
            }
        }

        let params = f
            .params
            .iter()
            .map(|p| CoreParam {
                name: p.name.clone(),
                ty: self.lower_type(&p.ty),
                origin: self.origin(p.span),
            })
            .collect();

        let ret = f
            .ret_type
            .as_ref()
            .map(|t| self.lower_type(t))
            .unwrap_or(Type::Unknown);

        CoreFunc {
            name: f.name.clone(),
            name_origin: self.origin(f.name_span),
            annotations: f.annotations.iter().map(|(a, _)| a.clone()).collect(),
            type_params: f.type_params.clone(),
            params,
            declared_effects,
            declared_effect_origins,
            effect_vars,
            effect_caps,
            effect_caps_explicit: f.effect_caps_explicit,
            ret,
            ret_inferred: f.ret_type_inferred,
            body: f.body.as_ref().map(|b| self.lower_block(b)),
            header_origin: self.origin(f.header_span),
            origin: self.origin(f.span),
        }
    }

    fn lower_block(&mut self, stmts: &[Statement]) -> Vec<CoreStmt> {
        stmts.iter().map(|s| self.lower_stmt(s)).collect()
    }

    fn lower_stmt(&mut self, stmt: &Statement) -> CoreStmt {
        match stmt {
            Statement::Let {
                name,
                name_span,
                value,
                span,
            } => CoreStmt::Let {
                name: name.clone(),
                name_origin: self.origin(*name_span),
                value: self.lower_expr(value),
                origin: self.origin(*span),
            },
            Statement::Set {
                name,
                name_span,
                value,
                span,
            } => CoreStmt::Set {
                name: name.clone(),
                name_origin: self.origin(*name_span),
                value: self.lower_expr(value),
                origin: self.origin(*span),
            },
            Statement::Return { value, span } => CoreStmt::Return {
                value: value.as_ref().map(|e| self.lower_expr(e)),
                origin: self.origin(*span),
            },
            Statement::If {
                cond,
                then,
                otherwise,
                span,
            } => CoreStmt::If {
                cond: self.lower_expr(cond),
                then: self.lower_block(then),
                otherwise: otherwise.as_ref().map(|b| self.lower_block(b)),
                origin: self.origin(*span),
            },
            Statement::Match { expr, cases, span } => CoreStmt::Match {
                expr: self.lower_expr(expr),
                cases: cases
                    .iter()
                    .map(|c| CoreCase {
                        pattern: self.lower_pattern(&c.pattern),
                        body: self.lower_block(&c.body),
                        origin: self.origin(c.span),
                    })
                    .collect(),
                origin: self.origin(*span),
            },
            Statement::Start {
                name,
                name_span,
                expr,
                span,
            } => CoreStmt::Start {
                name: name.clone(),
                name_origin: self.origin(*name_span),
                expr: self.lower_expr(expr),
                origin: self.origin(*span),
            },
            Statement::Wait { names, span } => CoreStmt::Wait {
                names: names.iter().map(|(n, _)| n.clone()).collect(),
                origin: self.origin(*span),
            },
            Statement::Workflow(wf) => {
                let steps: Vec<CoreStep> = wf
                    .steps
                    .iter()
                    .map(|step| {
                        let body = self.lower_block(&step.body);
                        let compensate = step.compensate.as_ref().map(|b| self.lower_block(b));
                        let mut caps = Vec::new();
                        collect_caps_from_stmts(&body, &mut caps);
                        CoreStep {
                            name: step.name.clone(),
                            dependencies: step.depends_on.iter().map(|(d, _)| d.clone()).collect(),
                            body,
                            compensate,
                            effect_caps: caps,
                            origin: self.origin(step.span),
                        }
                    })
                    .collect();
                let mut workflow_caps = Vec::new();
                for step in &steps {
                    for cap in &step.effect_caps {
                        if !workflow_caps.contains(cap) {
                            workflow_caps.push(*cap);
                        }
                    }
                }
                CoreStmt::Workflow(CoreWorkflow {
                    steps,
                    retry: wf.retry.as_ref().map(|r| CoreRetry {
                        max_attempts: r.max_attempts,
                        backoff: r.backoff,
                        origin: self.origin(r.span),
                    }),
                    timeout_ms: wf.timeout.as_ref().map(|t| t.millis),
                    effect_caps: workflow_caps,
                    origin: self.origin(wf.span),
                })
            }
            Statement::Scope { name, body, span } => CoreStmt::Scope {
                name: name.clone(),
                body: self.lower_block(body),
                origin: self.origin(*span),
            },
            Statement::ForEach {
                var,
                var_span,
                iter,
                body,
                span,
            } => CoreStmt::ForEach {
                var: var.clone(),
                var_origin: self.origin(*var_span),
                iter: self.lower_expr(iter),
                body: self.lower_block(body),
                origin: self.origin(*span),
            },
            Statement::Block { body, span } => CoreStmt::Block {
                body: self.lower_block(body),
                origin: self.origin(*span),
            },
            Statement::Expr { expr, span } => CoreStmt::Expr {
                expr: self.lower_expr(expr),
                origin: self.origin(*span),
            },
        }
    }

    fn lower_pattern(&mut self, pattern: &Pattern) -> CorePattern {
        match pattern {
            Pattern::Null { span } => CorePattern::Null {
                origin: self.origin(*span),
            },
            Pattern::Int { value, span } => CorePattern::Int {
                value: *value,
                origin: self.origin(*span),
            },
            Pattern::Name { name, span } => CorePattern::Name {
                name: name.clone(),
                origin: self.origin(*span),
            },
            Pattern::Ctor {
                type_name,
                names,
                args,
                span,
            } => CorePattern::Ctor {
                type_name: type_name.clone(),
                names: names.iter().map(|(n, _)| n.clone()).collect(),
                args: args.iter().map(|a| self.lower_pattern(a)).collect(),
                origin: self.origin(*span),
            },
        }
    }

    fn lower_expr(&mut self, expr: &Expr) -> CoreExpr {
        match expr {
            Expr::Name { text, span } => CoreExpr::Name {
                text: text.clone(),
                origin: self.origin(*span),
            },
            Expr::Bool { value, span } => CoreExpr::Bool {
                value: *value,
                origin: self.origin(*span),
            },
            Expr::Int { value, span } => CoreExpr::Int {
                value: *value,
                origin: self.origin(*span),
            },
            Expr::Long { value, span } => CoreExpr::Long {
                value: value.clone(),
                origin: self.origin(*span),
            },
            Expr::Double { value, span } => CoreExpr::Double {
                value: *value,
                origin: self.origin(*span),
            },
            Expr::Str { value, span } => CoreExpr::Str {
                value: value.clone(),
                origin: self.origin(*span),
            },
            Expr::Null { span } => CoreExpr::Null {
                origin: self.origin(*span),
            },
            Expr::Call { target, args, span } => {
                let target = self.lower_expr(target);
                let args: Vec<CoreExpr> = args.iter().map(|a| self.lower_expr(a)).collect();
                let origin = self.origin(*span);
                fold_constant_call(target, args, origin)
            }
            Expr::Construct {
                type_name,
                type_span,
                fields,
                span,
            } => CoreExpr::Construct {
                type_name: type_name.clone(),
                type_origin: self.origin(*type_span),
                fields: fields
                    .iter()
                    .map(|(n, e)| (n.clone(), self.lower_expr(e)))
                    .collect(),
                origin: self.origin(*span),
            },
            Expr::Ok { expr, span } => CoreExpr::Ok {
                expr: Box::new(self.lower_expr(expr)),
                origin: self.origin(*span),
            },
            Expr::Err { expr, span } => CoreExpr::Err {
                expr: Box::new(self.lower_expr(expr)),
                origin: self.origin(*span),
            },
            Expr::Some { expr, span } => CoreExpr::Some {
                expr: Box::new(self.lower_expr(expr)),
                origin: self.origin(*span),
            },
            Expr::None { span } => CoreExpr::None {
                origin: self.origin(*span),
            },
            Expr::Lambda {
                params,
                ret_type,
                body,
                span,
            } => CoreExpr::Lambda {
                params: params
                    .iter()
                    .map(|p| CoreParam {
                        name: p.name.clone(),
                        ty: self.lower_type(&p.ty),
                        origin: self.origin(p.span),
                    })
                    .collect(),
                ret: ret_type
                    .as_ref()
                    .map(|t| self.lower_type(t))
                    .unwrap_or(Type::Unknown),
                body: Box::new(self.lower_expr(body)),
                origin: self.origin(*span),
            },
            Expr::Await { expr, span } => CoreExpr::Await {
                expr: Box::new(self.lower_expr(expr)),
                origin: self.origin(*span),
            },
        }
    }

    pub(crate) fn lower_type(&mut self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Name { text, .. } => match text.as_str() {
                "Text" => Type::Text,
                "Int" => Type::Int,
                "Long" => Type::Long,
                "Float" => Type::Float,
                "Double" => Type::Double,
                "Bool" => Type::Bool,
                "DateTime" => Type::DateTime,
                "Unknown" => Type::Unknown,
                _ => Type::Named(text.clone()),
            },
            TypeExpr::Var { name, .. } | TypeExpr::EffectVar { name, .. } => {
                Type::Var(name.clone())
            }
            TypeExpr::App { base, args, span } => {
                let args: Vec<Type> = args.iter().map(|a| self.lower_type(a)).collect();
                if base == "Workflow" {
                    match args.len() {
                        2 => {
                            let mut it = args.into_iter();
                            let r = it.next().unwrap_or(Type::Unknown);
                            let e = it.next().unwrap_or(Type::Unknown);
                            Type::Workflow(Box::new(r), Box::new(e))
                        }
                        _ => {
                            self.diagnostics.push(
                                Diagnostic::new(
                                    DiagCode::L104,
                                    "Workflow takes exactly two type arguments",
                                    *span,
                                )
                                .with_source("lower"),
                            );
                            Type::Unknown
                        }
                    }
                } else {
                    Type::App(base.clone(), args)
                }
            }
            TypeExpr::Maybe { inner, .. } => Type::Maybe(Box::new(self.lower_type(inner))),
            TypeExpr::Option { inner, .. } => Type::Option(Box::new(self.lower_type(inner))),
            TypeExpr::Result { ok, err, .. } => Type::Result(
                Box::new(self.lower_type(ok)),
                Box::new(
                    err.as_ref()
                        .map(|e| self.lower_type(e))
                        .unwrap_or(Type::Text),
                ),
            ),
            TypeExpr::List { elem, .. } => Type::List(Box::new(self.lower_type(elem))),
            TypeExpr::Map { key, value, .. } => Type::Map(
                Box::new(self.lower_type(key)),
                Box::new(self.lower_type(value)),
            ),
            TypeExpr::Func {
                params,
                ret,
                effects,
                caps,
                ..
            } => {
                let mut effect_set = EffectSet::EMPTY;
                for name in effects {
                    if let Some(atom) = EffectAtom::parse(name) {
                        effect_set.insert(atom);
                    }
                }
                let mut kinds = Vec::new();
                let mut vars = Vec::new();
                for cap in caps {
                    match CapabilityKind::parse(cap) {
                        Some(kind) => kinds.push(kind),
                        None => vars.push(cap.clone()),
                    }
                }
                Type::Func {
                    params: params.iter().map(|p| self.lower_type(p)).collect(),
                    ret: Box::new(self.lower_type(ret)),
                    effects: effect_set,
                    caps: kinds,
                    effect_vars: vars,
                }
            }
            TypeExpr::Pii {
                base,
                level,
                category,
                ..
            } => Type::Pii {
                base: Box::new(self.lower_type(base)),
                level: *level,
                category: *category,
            },
        }
    }
}

/// Fold builtin integer arithmetic with checked operations; anything
/// that could overflow or change semantics stays a call.
fn fold_constant_call(target: CoreExpr, args: Vec<CoreExpr>, origin: Origin) -> CoreExpr {
    let name = match &target {
        CoreExpr::Name { text, .. } => text.as_str(),
        _ => "",
    };
    if args.len() == 2 {
        if let (CoreExpr::Int { value: a, .. }, CoreExpr::Int { value: b, .. }) =
            (&args[0], &args[1])
        {
            let folded = match name {
                "plus" => a.checked_add(*b),
                "minus" => a.checked_sub(*b),
                "times" => a.checked_mul(*b),
                _ => None,
            };
            if let Some(value) = folded {
                return CoreExpr::Int { value, origin };
            }
        }
    }
    if args.len() == 1 && name == "not" {
        if let CoreExpr::Bool { value, .. } = &args[0] {
            return CoreExpr::Bool {
                value: !value,
                origin,
            };
        }
    }
    CoreExpr::Call {
        target: Box::new(target),
        args,
        origin,
    }
}

/// Collect capabilities exercised by call targets in a statement list.
pub(crate) fn collect_caps_from_stmts(stmts: &[CoreStmt], out: &mut Vec<CapabilityKind>) {
    for stmt in stmts {
        collect_caps_from_stmt(stmt, out);
    }
}

fn collect_caps_from_stmt(stmt: &CoreStmt, out: &mut Vec<CapabilityKind>) {
    match stmt {
        CoreStmt::Let { value, .. } | CoreStmt::Set { value, .. } => {
            collect_caps_from_expr(value, out)
        }
        CoreStmt::Return { value, .. } => {
            if let Some(value) = value {
                collect_caps_from_expr(value, out);
            }
        }
        CoreStmt::If {
            cond,
            then,
            otherwise,
            ..
        } => {
            collect_caps_from_expr(cond, out);
            collect_caps_from_stmts(then, out);
            if let Some(otherwise) = otherwise {
                collect_caps_from_stmts(otherwise, out);
            }
        }
        CoreStmt::Match { expr, cases, .. } => {
            collect_caps_from_expr(expr, out);
            for case in cases {
                collect_caps_from_stmts(&case.body, out);
            }
        }
        CoreStmt::Start { expr, .. } => collect_caps_from_expr(expr, out),
        CoreStmt::Wait { .. } => {}
        CoreStmt::Workflow(wf) => {
            for step in &wf.steps {
                collect_caps_from_stmts(&step.body, out);
                if let Some(compensate) = &step.compensate {
                    collect_caps_from_stmts(compensate, out);
                }
            }
        }
        CoreStmt::Scope { body, .. }
        | CoreStmt::ForEach { body, .. }
        | CoreStmt::Block { body, .. } => collect_caps_from_stmts(body, out),
        CoreStmt::Expr { expr, .. } => collect_caps_from_expr(expr, out),
    }
}

pub(crate) fn collect_caps_from_expr(expr: &CoreExpr, out: &mut Vec<CapabilityKind>) {
    match expr {
        CoreExpr::Call { target, args, .. } => {
            if let CoreExpr::Name { text, .. } = &**target {
                if let Some(cap) = CapabilityKind::infer_from_call(text) {
                    if !out.contains(&cap) {
                        out.push(cap);
                    }
                }
            }
            collect_caps_from_expr(target, out);
            for arg in args {
                collect_caps_from_expr(arg, out);
            }
        }
        CoreExpr::Construct { fields, .. } => {
            for (_, value) in fields {
                collect_caps_from_expr(value, out);
            }
        }
        CoreExpr::Ok { expr, .. }
        | CoreExpr::Err { expr, .. }
        | CoreExpr::Some { expr, .. }
        | CoreExpr::Await { expr, .. } => collect_caps_from_expr(expr, out),
        CoreExpr::Lambda { body, .. } => collect_caps_from_expr(body, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::test_support::parse_en;

    use super::*;

    fn lower_en(source: &str) -> LowerResult {
        let parsed = parse_en(source);
        lower_module(&parsed.module, Some("file:///demo.prose"))
    }

    #[test]
    fn test_origins_carry_file() {
        let result = lower_en("module m.\nto f, produce Int:\n  return 1.\n");
        assert_eq!(
            result.module.funcs[0].origin.file.as_deref(),
            Some("file:///demo.prose")
        );
    }

    #[test]
    fn test_capability_phrases_become_kinds() {
        let result =
            lower_en("module m.\nto f, produce Int, performs io with Http and Sql:\n  return 1.\n");
        let f = &result.module.funcs[0];
        assert_eq!(f.effect_caps, vec![CapabilityKind::Http, CapabilityKind::Sql]);
        assert_eq!(f.declared_effects, vec![EffectAtom::Io]);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_effect_var_preserved() {
        let result = lower_en(
            "module m.\nto f[e], given g as Int, produce Int, performs io and e:\n  return 1.\n",
        );
        let f = &result.module.funcs[0];
        assert_eq!(f.effect_vars, vec!["e"]);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_constant_folding_checked() {
        let result = lower_en("module m.\nto f, produce Int:\n  return 2 plus 3.\n");
        let body = result.module.funcs[0].body.as_ref().unwrap();
        let CoreStmt::Return { value: Some(CoreExpr::Int { value, .. }), .. } = &body[0] else {
            panic!("expected folded int, got {body:?}");
        };
        assert_eq!(*value, 5);
    }

    #[test]
    fn test_overflow_not_folded() {
        let result = lower_en(&format!(
            "module m.\nto f, produce Int:\n  return {} times 2.\n",
            i64::MAX
        ));
        let body = result.module.funcs[0].body.as_ref().unwrap();
        assert!(matches!(
            &body[0],
            CoreStmt::Return { value: Some(CoreExpr::Call { .. }), .. }
        ));
    }

    #[test]
    fn test_workflow_step_caps_computed() {
        let result = lower_en(
            "module m.\nto run, produce Int, performs io with Http:\n  workflow:\n    step fetch:\n      Http.get(\"u\").\n    step store, depends on fetch:\n      Db.insert(\"row\").\n  return 1.\n",
        );
        let body = result.module.funcs[0].body.as_ref().unwrap();
        let CoreStmt::Workflow(wf) = &body[0] else {
            panic!("expected workflow");
        };
        assert_eq!(wf.steps[0].effect_caps, vec![CapabilityKind::Http]);
        assert_eq!(wf.steps[1].effect_caps, vec![CapabilityKind::Sql]);
        assert_eq!(
            wf.effect_caps,
            vec![CapabilityKind::Http, CapabilityKind::Sql]
        );
        assert_eq!(wf.steps[1].dependencies, vec!["fetch"]);
    }

    #[test]
    fn test_result_default_err_is_text() {
        let result = lower_en(
            "module m.\nto f, given r as result of Int, produce Int:\n  return 1.\n",
        );
        let f = &result.module.funcs[0];
        assert_eq!(
            f.params[0].ty,
            Type::Result(Box::new(Type::Int), Box::new(Type::Text))
        );
    }
}
