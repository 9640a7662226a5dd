//! The type checker.
//!
//! Two passes: collect the module context (declarations, signatures,
//! import aliases, duplicate detection), then check each function body
//! in a fresh scope. Every failure is a coded diagnostic; the walk
//! continues to maximize coverage per compilation.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::json;
use smol_str::SmolStr;

use crate::base::{DiagCode, Diagnostic, Origin, RelatedInfo, Severity};
use crate::ir::{
    CapabilityKind, CoreData, CoreEnum, CoreExpr, CoreFunc, CoreModule, CorePattern, CoreStmt,
    EffectSet, Type,
};

use super::types::{assignable, numeric_join, unify, AliasTable, Bindings};

/// A collected function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSig {
    pub name: SmolStr,
    pub params: Vec<(SmolStr, Type)>,
    pub ret: Type,
    pub declared_effects: EffectSet,
    pub effect_caps: Vec<CapabilityKind>,
    pub effect_vars: Vec<SmolStr>,
    pub type_params: Vec<SmolStr>,
    pub name_origin: Origin,
    pub header_origin: Origin,
}

impl FuncSig {
    /// Hover rendering: `(params) -> ret performs EFFECTS`.
    pub fn display(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(n, t)| format!("{}: {}", n, t.display()))
            .collect();
        let mut out = format!("({}) -> {}", params.join(", "), self.ret.display());
        if !self.declared_effects.is_empty() {
            out.push_str(&format!(" performs {}", self.declared_effects));
        }
        if !self.effect_caps.is_empty() {
            let caps: Vec<&str> = self.effect_caps.iter().map(|c| c.name()).collect();
            out.push_str(&format!(" [{}]", caps.join(", ")));
        }
        out
    }
}

/// Module-level context shared by the checking passes and the IDE layer.
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    pub module_name: Option<SmolStr>,
    pub datas: IndexMap<SmolStr, CoreData>,
    pub enums: IndexMap<SmolStr, CoreEnum>,
    /// Enum variant name → owning enum.
    pub variant_owners: FxHashMap<SmolStr, SmolStr>,
    pub funcs: IndexMap<SmolStr, FuncSig>,
    pub aliases: AliasTable,
    pub imports: Vec<(SmolStr, Option<SmolStr>, Origin)>,
}

/// Checker output.
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
    pub context: ModuleContext,
}

/// Type-check a lowered module.
pub fn check_module(module: &CoreModule) -> CheckResult {
    let mut diagnostics = Vec::new();
    let context = collect_context(module, &mut diagnostics);

    let mut checker = Checker {
        ctx: &context,
        diagnostics,
        used_imports: FxHashSet::default(),
    };
    for func in &module.funcs {
        checker.check_func(func);
    }
    checker.report_unused_imports();

    CheckResult {
        diagnostics: checker.diagnostics,
        context,
    }
}

/// Pass 1: declarations, signatures, and duplicate rejection (`S003`).
fn collect_context(module: &CoreModule, diagnostics: &mut Vec<Diagnostic>) -> ModuleContext {
    let mut ctx = ModuleContext {
        module_name: module.name.clone(),
        ..ModuleContext::default()
    };
    let mut seen: FxHashMap<SmolStr, Origin> = FxHashMap::default();

    let mut check_dup = |name: &SmolStr, origin: &Origin, diagnostics: &mut Vec<Diagnostic>| {
        if let Some(first) = seen.get(name) {
            diagnostics.push(
                Diagnostic::new(
                    DiagCode::S003,
                    format!("'{name}' is declared more than once"),
                    origin.span,
                )
                .with_source("check")
                .with_related(RelatedInfo::new("first declared here", first.span)),
            );
            false
        } else {
            seen.insert(name.clone(), origin.clone());
            true
        }
    };

    for import in &module.imports {
        if let Some(alias) = &import.alias {
            ctx.aliases.insert(alias.clone(), import.name.clone());
        }
        ctx.imports
            .push((import.name.clone(), import.alias.clone(), import.origin.clone()));
    }
    for data in &module.datas {
        if check_dup(&data.name, &data.name_origin, diagnostics) {
            ctx.datas.insert(data.name.clone(), data.clone());
        }
    }
    for e in &module.enums {
        if check_dup(&e.name, &e.name_origin, diagnostics) {
            for variant in &e.variants {
                ctx.variant_owners.insert(variant.clone(), e.name.clone());
            }
            ctx.enums.insert(e.name.clone(), e.clone());
        }
    }
    for func in &module.funcs {
        if check_dup(&func.name, &func.name_origin, diagnostics) {
            ctx.funcs.insert(
                func.name.clone(),
                FuncSig {
                    name: func.name.clone(),
                    params: func
                        .params
                        .iter()
                        .map(|p| (p.name.clone(), p.ty.clone()))
                        .collect(),
                    ret: func.ret.clone(),
                    declared_effects: EffectSet::of(&func.declared_effects),
                    effect_caps: func.effect_caps.clone(),
                    effect_vars: func.effect_vars.clone(),
                    type_params: func.type_params.clone(),
                    name_origin: func.name_origin.clone(),
                    header_origin: func.header_origin.clone(),
                },
            );
        }
    }
    ctx
}

struct Checker<'a> {
    ctx: &'a ModuleContext,
    diagnostics: Vec<Diagnostic>,
    used_imports: FxHashSet<SmolStr>,
}

/// Lexical scope stack for one function body.
struct Scope {
    frames: Vec<FxHashMap<SmolStr, Type>>,
}

impl Scope {
    fn new() -> Self {
        Self {
            frames: vec![FxHashMap::default()],
        }
    }

    fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn bind(&mut self, name: impl Into<SmolStr>, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), ty);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Type> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }
}

/// Collected facts about one function body.
#[derive(Default)]
struct BodyFacts {
    return_types: Vec<(Type, Origin)>,
    last_expr_type: Option<Type>,
    starts: Vec<(SmolStr, Origin)>,
    waits: Vec<(SmolStr, Origin)>,
}

impl Checker<'_> {
    fn error(&mut self, code: DiagCode, message: impl Into<String>, origin: &Origin) {
        self.diagnostics
            .push(Diagnostic::new(code, message, origin.span).with_source("check"));
    }

    fn warn(&mut self, code: DiagCode, message: impl Into<String>, origin: &Origin) {
        self.diagnostics.push(
            Diagnostic::new(code, message, origin.span)
                .with_severity(Severity::Warning)
                .with_source("check"),
        );
    }

    fn check_func(&mut self, func: &CoreFunc) {
        let Some(body) = &func.body else {
            return;
        };

        let mut scope = Scope::new();
        for param in &func.params {
            scope.bind(param.name.clone(), param.ty.clone());
        }

        let mut facts = BodyFacts::default();
        self.check_block(body, &mut scope, &mut facts);

        // Return compatibility (relaxed, workflow-aware).
        if !func.ret_inferred && !matches!(func.ret, Type::Unknown) {
            for (ty, origin) in &facts.return_types {
                if !assignable(ty, &func.ret, false) {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagCode::S004,
                            format!(
                                "returns {} but '{}' produces {}",
                                ty.display(),
                                func.name,
                                func.ret.display()
                            ),
                            origin.span,
                        )
                        .with_source("check"),
                    );
                }
            }
            if facts.return_types.is_empty() {
                // Return is optional when the trailing expression already
                // has the declared type.
                let covered = facts
                    .last_expr_type
                    .as_ref()
                    .is_some_and(|t| assignable(t, &func.ret, false));
                if !covered {
                    self.error(
                        DiagCode::S004,
                        format!("'{}' produces {} but never returns it", func.name, func.ret.display()),
                        &func.header_origin,
                    );
                }
            }
        }

        self.check_async_discipline(&facts);
        self.check_generics(func, &facts);
    }

    fn check_block(&mut self, stmts: &[CoreStmt], scope: &mut Scope, facts: &mut BodyFacts) {
        for (i, stmt) in stmts.iter().enumerate() {
            let last = i + 1 == stmts.len();
            self.check_stmt(stmt, scope, facts, last);
        }
    }

    fn check_stmt(
        &mut self,
        stmt: &CoreStmt,
        scope: &mut Scope,
        facts: &mut BodyFacts,
        last: bool,
    ) {
        match stmt {
            CoreStmt::Let { name, value, .. } => {
                let ty = self.infer_expr(value, scope);
                scope.bind(name.clone(), ty);
            }
            CoreStmt::Set {
                name,
                value,
                name_origin,
                ..
            } => {
                let value_ty = self.infer_expr(value, scope);
                let base = name.split('.').next().unwrap_or(name);
                match scope.lookup(base).cloned() {
                    Some(existing) => {
                        let target_ty = if name.contains('.') {
                            self.walk_fields(&existing, name, name_origin)
                        } else {
                            existing
                        };
                        if !matches!(target_ty, Type::Unknown)
                            && !assignable(&value_ty, &target_ty, false)
                        {
                            self.error(
                                DiagCode::S006,
                                format!(
                                    "cannot set '{}' of type {} to {}",
                                    name,
                                    target_ty.display(),
                                    value_ty.display()
                                ),
                                name_origin,
                            );
                        }
                    }
                    None => {
                        self.error(
                            DiagCode::S008,
                            format!("'{base}' is not bound in this scope"),
                            name_origin,
                        );
                    }
                }
            }
            CoreStmt::Return { value, origin } => {
                let ty = value
                    .as_ref()
                    .map(|e| self.infer_expr(e, scope))
                    .unwrap_or(Type::Null);
                facts.return_types.push((ty, origin.clone()));
            }
            CoreStmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                let cond_ty = self.infer_expr(cond, scope);
                if !matches!(cond_ty.strip_pii(), Type::Bool | Type::Unknown) {
                    self.error(
                        DiagCode::S007,
                        format!("condition has type {}, expected Bool", cond_ty.display()),
                        cond.origin(),
                    );
                }
                scope.push();
                self.check_block(then, scope, facts);
                scope.pop();
                if let Some(otherwise) = otherwise {
                    scope.push();
                    self.check_block(otherwise, scope, facts);
                    scope.pop();
                }
            }
            CoreStmt::Match { expr, cases, .. } => {
                let scrutinee = self.infer_expr(expr, scope);
                for case in cases {
                    scope.push();
                    self.bind_pattern(&case.pattern, &scrutinee, scope);
                    self.check_block(&case.body, scope, facts);
                    scope.pop();
                }
            }
            CoreStmt::Start {
                name,
                name_origin,
                expr,
                ..
            } => {
                let ty = self.infer_expr(expr, scope);
                scope.bind(
                    name.clone(),
                    Type::Workflow(Box::new(ty), Box::new(Type::Text)),
                );
                facts.starts.push((name.clone(), name_origin.clone()));
            }
            CoreStmt::Wait { names, origin } => {
                for name in names {
                    facts.waits.push((name.clone(), origin.clone()));
                }
            }
            CoreStmt::Workflow(wf) => {
                for step in &wf.steps {
                    scope.push();
                    self.check_block(&step.body, scope, facts);
                    if let Some(compensate) = &step.compensate {
                        self.check_block(compensate, scope, facts);
                    }
                    scope.pop();
                }
            }
            CoreStmt::Scope { body, .. } | CoreStmt::Block { body, .. } => {
                scope.push();
                self.check_block(body, scope, facts);
                scope.pop();
            }
            CoreStmt::ForEach {
                var, iter, body, ..
            } => {
                let iter_ty = self.infer_expr(iter, scope);
                let elem = match iter_ty.strip_pii() {
                    Type::List(elem) => (**elem).clone(),
                    Type::Unknown => Type::Unknown,
                    other => {
                        self.warn(
                            DiagCode::S006,
                            format!("iterating a non-list value of type {}", other.display()),
                            iter.origin(),
                        );
                        Type::Unknown
                    }
                };
                scope.push();
                scope.bind(var.clone(), elem);
                self.check_block(body, scope, facts);
                scope.pop();
            }
            CoreStmt::Expr { expr, .. } => {
                let ty = self.infer_expr(expr, scope);
                if last {
                    facts.last_expr_type = Some(ty);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn infer_expr(&mut self, expr: &CoreExpr, scope: &mut Scope) -> Type {
        match expr {
            CoreExpr::Bool { .. } => Type::Bool,
            CoreExpr::Int { .. } => Type::Int,
            CoreExpr::Long { .. } => Type::Long,
            CoreExpr::Double { .. } => Type::Double,
            CoreExpr::Str { .. } => Type::Text,
            CoreExpr::Null { .. } => Type::Null,
            CoreExpr::Name { text, origin } => self.resolve_name(text, origin, scope),
            CoreExpr::Ok { expr, .. } => {
                let inner = self.infer_expr(expr, scope);
                Type::Result(Box::new(inner), Box::new(Type::Unknown))
            }
            CoreExpr::Err { expr, .. } => {
                let inner = self.infer_expr(expr, scope);
                Type::Result(Box::new(Type::Unknown), Box::new(inner))
            }
            CoreExpr::Some { expr, .. } => {
                let inner = self.infer_expr(expr, scope);
                Type::Option(Box::new(inner))
            }
            CoreExpr::None { .. } => Type::Option(Box::new(Type::Unknown)),
            CoreExpr::Await { expr, origin } => {
                let inner = self.infer_expr(expr, scope);
                self.unwrap_awaitable(&inner, origin)
            }
            CoreExpr::Lambda {
                params, ret, body, ..
            } => {
                scope.push();
                for p in params {
                    scope.bind(p.name.clone(), p.ty.clone());
                }
                let body_ty = self.infer_expr(body, scope);
                scope.pop();
                let ret = if matches!(ret, Type::Unknown) {
                    body_ty
                } else {
                    ret.clone()
                };
                Type::Func {
                    params: params.iter().map(|p| p.ty.clone()).collect(),
                    ret: Box::new(ret),
                    effects: EffectSet::EMPTY,
                    caps: vec![],
                    effect_vars: vec![],
                }
            }
            CoreExpr::Construct {
                type_name,
                type_origin,
                fields,
                ..
            } => self.check_construct(type_name, type_origin, fields, scope),
            CoreExpr::Call { target, args, origin } => {
                self.check_call(target, args, origin, scope)
            }
        }
    }

    fn unwrap_awaitable(&mut self, ty: &Type, origin: &Origin) -> Type {
        match ty.strip_pii() {
            Type::Maybe(inner) | Type::Option(inner) => (**inner).clone(),
            Type::Result(ok, _) => (**ok).clone(),
            Type::Workflow(r, _) => (**r).clone(),
            Type::App(name, args) if name == "Async" && args.len() == 1 => args[0].clone(),
            Type::Unknown => Type::Unknown,
            other => {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagCode::S012,
                        format!("awaiting a value of type {}", other.display()),
                        origin.span,
                    )
                    .with_severity(Severity::Warning)
                    .with_source("check"),
                );
                other.clone()
            }
        }
    }

    /// Resolve a possibly-dotted reference.
    fn resolve_name(&mut self, text: &SmolStr, origin: &Origin, scope: &Scope) -> Type {
        let base = text.split('.').next().unwrap_or(text);

        if let Some(ty) = scope.lookup(base) {
            let ty = ty.clone();
            if text.contains('.') {
                return self.walk_fields(&ty, text, origin);
            }
            return ty;
        }

        // Enum variant used as a value.
        if let Some(owner) = self.ctx.variant_owners.get(base) {
            return Type::Named(owner.clone());
        }

        // A local function referenced as a value.
        if !text.contains('.') {
            if let Some(sig) = self.ctx.funcs.get(base) {
                return Type::Func {
                    params: sig.params.iter().map(|(_, t)| t.clone()).collect(),
                    ret: Box::new(sig.ret.clone()),
                    effects: sig.declared_effects,
                    caps: sig.effect_caps.clone(),
                    effect_vars: sig.effect_vars.clone(),
                };
            }
        }

        // Import alias or module-qualified reference.
        if self.import_matches(base) {
            return Type::Unknown;
        }

        // Interop namespaces are capital-leading.
        if base.chars().next().is_some_and(char::is_uppercase) {
            return Type::Unknown;
        }

        self.error(DiagCode::S001, format!("unknown name '{base}'"), origin);
        Type::Unknown
    }

    fn import_matches(&mut self, base: &str) -> bool {
        for (name, alias, _) in &self.ctx.imports {
            let hit = alias.as_deref() == Some(base)
                || name.as_str() == base
                || name.split('.').next_back() == Some(base)
                || name.split('.').next() == Some(base);
            if hit {
                self.used_imports.insert(name.clone());
                return true;
            }
        }
        false
    }

    /// Walk dotted field accesses against data schemas.
    fn walk_fields(&mut self, base_ty: &Type, text: &SmolStr, origin: &Origin) -> Type {
        let mut current = base_ty.clone();
        for seg in text.split('.').skip(1) {
            let expanded = self.ctx.aliases.expand(current.strip_pii());
            let next = match &expanded {
                Type::Named(data_name) => {
                    let field_ty = self
                        .ctx
                        .datas
                        .get(data_name)
                        .and_then(|d| d.fields.iter().find(|f| f.name == seg))
                        .map(|f| f.ty.clone());
                    match field_ty {
                        Some(ty) => ty,
                        None => {
                            self.error(
                                DiagCode::S009,
                                format!("'{data_name}' has no field '{seg}'"),
                                origin,
                            );
                            return Type::Unknown;
                        }
                    }
                }
                Type::Unknown => {
                    // Heuristic: if exactly one data type in scope has a
                    // field with this name, use it as a hint.
                    let candidates: Vec<&CoreData> = self
                        .ctx
                        .datas
                        .values()
                        .filter(|d| d.fields.iter().any(|f| f.name == seg))
                        .collect();
                    if candidates.len() != 1 {
                        return Type::Unknown;
                    }
                    candidates[0]
                        .fields
                        .iter()
                        .find(|f| f.name == seg)
                        .map(|f| f.ty.clone())
                        .unwrap_or(Type::Unknown)
                }
                _ => return Type::Unknown,
            };
            current = next;
        }
        current
    }

    fn check_construct(
        &mut self,
        type_name: &SmolStr,
        type_origin: &Origin,
        fields: &[(SmolStr, CoreExpr)],
        scope: &mut Scope,
    ) -> Type {
        let expanded = self.ctx.aliases.expand(&Type::Named(type_name.clone()));
        let Type::Named(resolved) = &expanded else {
            return Type::Unknown;
        };
        let Some(data) = self.ctx.datas.get(resolved).cloned() else {
            self.error(
                DiagCode::S002,
                format!("unknown type '{type_name}'"),
                type_origin,
            );
            // Still typecheck the field expressions.
            for (_, value) in fields {
                self.infer_expr(value, scope);
            }
            return Type::Unknown;
        };

        for (field_name, value) in fields {
            let value_ty = self.infer_expr(value, scope);
            match data.fields.iter().find(|f| f.name == *field_name) {
                Some(field) => {
                    if !assignable(&value_ty, &field.ty, false) {
                        self.error(
                            DiagCode::S006,
                            format!(
                                "field '{}' expects {} but got {}",
                                field_name,
                                field.ty.display(),
                                value_ty.display()
                            ),
                            value.origin(),
                        );
                    }
                }
                None => {
                    self.warn(
                        DiagCode::UnknownField,
                        format!("'{}' has no field '{}'", data.name, field_name),
                        value.origin(),
                    );
                }
            }
        }
        for field in &data.fields {
            if field.required && !fields.iter().any(|(n, _)| *n == field.name) {
                self.warn(
                    DiagCode::MissingRequiredField,
                    format!("required field '{}' is not set", field.name),
                    type_origin,
                );
            }
        }

        Type::Named(data.name.clone())
    }

    fn check_call(
        &mut self,
        target: &CoreExpr,
        args: &[CoreExpr],
        origin: &Origin,
        scope: &mut Scope,
    ) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.infer_expr(a, scope)).collect();

        let CoreExpr::Name { text, origin: target_origin } = target else {
            // Calling a computed expression: must be function-typed.
            let target_ty = self.infer_expr(target, scope);
            return self.check_callable(&target_ty, &arg_types, origin);
        };

        // Builtin operators and helpers.
        if let Some(ty) = self.check_builtin(text, &arg_types, args, origin) {
            return ty;
        }

        // Local function call.
        if !text.contains('.') {
            if let Some(sig) = self.ctx.funcs.get(text.as_str()).cloned() {
                return self.check_local_call(&sig, &arg_types, args, origin);
            }
            // Lambda or function value in scope.
            if let Some(ty) = scope.lookup(text).cloned() {
                return self.check_callable(&ty, &arg_types, origin);
            }
            self.error(
                DiagCode::S001,
                format!("unknown function '{text}'"),
                target_origin,
            );
            return Type::Unknown;
        }

        // Dotted interop call: conservatively Unknown. Overload
        // resolution happens on the other side, so mixed numeric
        // literals only warn.
        self.import_matches(text.split('.').next().unwrap_or(text));
        self.check_interop_numeric(text, args, &arg_types, origin);
        Type::Unknown
    }

    fn check_builtin(
        &mut self,
        name: &str,
        arg_types: &[Type],
        args: &[CoreExpr],
        origin: &Origin,
    ) -> Option<Type> {
        match name {
            "plus" | "minus" | "times" | "dividedBy" => {
                if arg_types.len() == 2 {
                    // `plus` concatenates text as well.
                    if name == "plus"
                        && matches!(arg_types[0].strip_pii(), Type::Text)
                    {
                        return Some(Type::Text);
                    }
                    for (ty, arg) in arg_types.iter().zip(args) {
                        if !ty.strip_pii().is_numeric() && !matches!(ty.strip_pii(), Type::Unknown)
                        {
                            self.error(
                                DiagCode::S006,
                                format!("'{}' expects numbers, got {}", name, ty.display()),
                                arg.origin(),
                            );
                        }
                    }
                    return Some(numeric_join(&arg_types[0], &arg_types[1]));
                }
                self.arity_error(name, 2, arg_types.len(), origin);
                Some(Type::Unknown)
            }
            "lessThan" | "greaterThan" | "atLeast" | "atMost" => {
                if arg_types.len() != 2 {
                    self.arity_error(name, 2, arg_types.len(), origin);
                }
                Some(Type::Bool)
            }
            "equals" | "notEquals" => {
                if arg_types.len() != 2 {
                    self.arity_error(name, 2, arg_types.len(), origin);
                }
                Some(Type::Bool)
            }
            "and" | "or" => {
                if arg_types.len() != 2 {
                    self.arity_error(name, 2, arg_types.len(), origin);
                }
                Some(Type::Bool)
            }
            "not" => {
                if arg_types.len() != 1 {
                    self.arity_error("not", 1, arg_types.len(), origin);
                }
                Some(Type::Bool)
            }
            // Clears taint; the value itself passes through.
            "redact" => Some(
                arg_types
                    .first()
                    .map(|t| t.strip_pii().clone())
                    .unwrap_or(Type::Unknown),
            ),
            "print" => Some(Type::Null),
            "checkConsent" | "requireConsent" | "hasConsent" | "isConsentGiven" => {
                Some(Type::Bool)
            }
            _ => None,
        }
    }

    fn check_local_call(
        &mut self,
        sig: &FuncSig,
        arg_types: &[Type],
        args: &[CoreExpr],
        origin: &Origin,
    ) -> Type {
        if arg_types.len() != sig.params.len() {
            self.arity_error(&sig.name, sig.params.len(), arg_types.len(), origin);
            return sig.ret.clone();
        }

        if sig.type_params.is_empty() {
            for ((param_name, param_ty), (arg_ty, arg)) in
                sig.params.iter().zip(arg_types.iter().zip(args))
            {
                if !assignable(arg_ty, param_ty, false) {
                    self.error(
                        DiagCode::S006,
                        format!(
                            "argument '{}' expects {} but got {}",
                            param_name,
                            param_ty.display(),
                            arg_ty.display()
                        ),
                        arg.origin(),
                    );
                }
            }
            return sig.ret.clone();
        }

        // Generic call: bind type variables, then substitute the return.
        let mut bindings = Bindings::new();
        for ((param_name, param_ty), (arg_ty, arg)) in
            sig.params.iter().zip(arg_types.iter().zip(args))
        {
            if !unify(param_ty, arg_ty, &mut bindings)
                && !assignable(arg_ty, &bindings.apply(param_ty), false)
            {
                self.error(
                    DiagCode::S006,
                    format!(
                        "argument '{}' expects {} but got {}",
                        param_name,
                        param_ty.display(),
                        arg_ty.display()
                    ),
                    arg.origin(),
                );
            }
        }
        bindings.apply(&sig.ret)
    }

    fn check_callable(&mut self, ty: &Type, arg_types: &[Type], origin: &Origin) -> Type {
        match ty.strip_pii() {
            Type::Func { params, ret, .. } => {
                if params.len() != arg_types.len() {
                    self.arity_error("function value", params.len(), arg_types.len(), origin);
                } else {
                    for (param, arg) in params.iter().zip(arg_types) {
                        if !assignable(arg, param, false) {
                            self.error(
                                DiagCode::S006,
                                format!(
                                    "expected {} but got {}",
                                    param.display(),
                                    arg.display()
                                ),
                                origin,
                            );
                        }
                    }
                }
                (**ret).clone()
            }
            Type::Unknown => Type::Unknown,
            other => {
                self.error(
                    DiagCode::S006,
                    format!("value of type {} is not callable", other.display()),
                    origin,
                );
                Type::Unknown
            }
        }
    }

    /// Interop calls mixing Int, Long, and Double literals are ambiguous
    /// for overload resolution on the other side.
    fn check_interop_numeric(
        &mut self,
        target: &str,
        args: &[CoreExpr],
        arg_types: &[Type],
        origin: &Origin,
    ) {
        let has_int = arg_types.iter().any(|t| matches!(t, Type::Int));
        let has_wide = arg_types
            .iter()
            .any(|t| matches!(t, Type::Long | Type::Double));
        if !(has_int && has_wide) {
            return;
        }
        let ints: Vec<_> = args
            .iter()
            .filter_map(|a| match a {
                CoreExpr::Int { value, origin } => Some(json!({
                    "value": value,
                    "line": origin.span.start.line,
                    "column": origin.span.start.column,
                    "endColumn": origin.span.end.column,
                })),
                _ => None,
            })
            .collect();
        self.diagnostics.push(
            Diagnostic::new(
                DiagCode::AmbiguousInteropNumeric,
                format!("call to '{target}' mixes Int with Long/Double literals"),
                origin.span,
            )
            .with_severity(Severity::Warning)
            .with_source("check")
            .with_data(json!({ "func": target, "ints": ints })),
        );
    }

    fn arity_error(&mut self, name: &str, expected: usize, got: usize, origin: &Origin) {
        self.error(
            DiagCode::S005,
            format!("'{name}' expects {expected} argument(s) but got {got}"),
            origin,
        );
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    fn bind_pattern(&mut self, pattern: &CorePattern, scrutinee: &Type, scope: &mut Scope) {
        match pattern {
            CorePattern::Null { .. } => {}
            CorePattern::Int { origin, .. } => {
                let base = scrutinee.strip_pii();
                if !base.is_numeric() && !matches!(base, Type::Unknown) {
                    self.warn(
                        DiagCode::S006,
                        format!("integer pattern against {}", scrutinee.display()),
                        origin,
                    );
                }
            }
            CorePattern::Name { name, .. } => {
                scope.bind(name.clone(), scrutinee.clone());
            }
            CorePattern::Ctor {
                type_name,
                names,
                args,
                origin,
            } => self.bind_ctor_pattern(type_name, names, args, origin, scrutinee, scope),
        }
    }

    fn bind_ctor_pattern(
        &mut self,
        type_name: &SmolStr,
        names: &[SmolStr],
        args: &[CorePattern],
        origin: &Origin,
        scrutinee: &Type,
        scope: &mut Scope,
    ) {
        let scrutinee = scrutinee.strip_pii();
        match type_name.as_str() {
            "Ok" | "Err" => {
                if names.len() + args.len() > 1 {
                    self.error(
                        DiagCode::S011,
                        format!("'{type_name}' takes at most one binding"),
                        origin,
                    );
                }
                let inner = match scrutinee {
                    Type::Result(ok, err) => {
                        if type_name == "Ok" {
                            (**ok).clone()
                        } else {
                            (**err).clone()
                        }
                    }
                    _ => Type::Unknown,
                };
                if let Some(name) = names.first() {
                    scope.bind(name.clone(), inner);
                } else if let Some(arg) = args.first() {
                    self.bind_pattern(arg, &inner, scope);
                }
            }
            "Some" => {
                if names.len() + args.len() > 1 {
                    self.error(DiagCode::S011, "'Some' takes at most one binding", origin);
                }
                let inner = match scrutinee {
                    Type::Option(t) | Type::Maybe(t) => (**t).clone(),
                    _ => Type::Unknown,
                };
                if let Some(name) = names.first() {
                    scope.bind(name.clone(), inner);
                } else if let Some(arg) = args.first() {
                    self.bind_pattern(arg, &inner, scope);
                }
            }
            "None" => {
                if !names.is_empty() || !args.is_empty() {
                    self.error(DiagCode::S011, "'None' binds nothing", origin);
                }
            }
            other => {
                // Enum variant pattern.
                if let Some(owner) = self.ctx.variant_owners.get(other) {
                    if !names.is_empty() || !args.is_empty() {
                        self.error(
                            DiagCode::S011,
                            format!("enum variant '{other}' binds nothing"),
                            origin,
                        );
                    }
                    let _ = owner;
                    return;
                }
                // Data destructuring pattern.
                let expanded = self.ctx.aliases.expand(&Type::Named(type_name.clone()));
                let Type::Named(resolved) = &expanded else {
                    return;
                };
                let Some(data) = self.ctx.datas.get(resolved).cloned() else {
                    self.error(
                        DiagCode::S010,
                        format!("unknown constructor '{type_name}'"),
                        origin,
                    );
                    return;
                };
                for name in names {
                    match data.fields.iter().find(|f| f.name == *name) {
                        Some(field) => scope.bind(name.clone(), field.ty.clone()),
                        None => {
                            self.error(
                                DiagCode::S011,
                                format!("'{}' has no field '{}'", data.name, name),
                                origin,
                            );
                            scope.bind(name.clone(), Type::Unknown);
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Post-body checks
    // ------------------------------------------------------------------

    /// `start`/`wait` pairing.
    fn check_async_discipline(&mut self, facts: &BodyFacts) {
        let waited: FxHashSet<&SmolStr> = facts.waits.iter().map(|(n, _)| n).collect();
        let started: FxHashSet<&SmolStr> = facts.starts.iter().map(|(n, _)| n).collect();
        for (name, origin) in &facts.starts {
            if !waited.contains(name) {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagCode::S020,
                        format!("'{name}' is started but never waited for"),
                        origin.span,
                    )
                    .with_severity(Severity::Warning)
                    .with_source("check"),
                );
            }
        }
        for (name, origin) in &facts.waits {
            if !started.contains(name) {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagCode::S021,
                        format!("'{name}' is waited for but never started"),
                        origin.span,
                    )
                    .with_source("check"),
                );
            }
        }
    }

    /// Generic parameter reachability and return unification.
    fn check_generics(&mut self, func: &CoreFunc, facts: &BodyFacts) {
        for param in &func.type_params {
            if func.effect_vars.iter().any(|v| v == param) {
                continue;
            }
            let reachable = func.params.iter().any(|p| type_mentions_var(&p.ty, param));
            if !reachable {
                self.warn(
                    DiagCode::S013,
                    format!("type parameter '{param}' does not appear in any parameter"),
                    &func.header_origin,
                );
            }
        }

        if func.type_params.is_empty() || matches!(func.ret, Type::Unknown) {
            return;
        }
        if !type_mentions_any_var(&func.ret, &func.type_params) {
            return;
        }
        for (ret_ty, origin) in &facts.return_types {
            let mut bindings = Bindings::new();
            if !unify(&func.ret, ret_ty, &mut bindings) {
                self.error(
                    DiagCode::S014,
                    format!(
                        "return type {} does not unify with declared {}",
                        ret_ty.display(),
                        func.ret.display()
                    ),
                    origin,
                );
            }
        }
    }

    fn report_unused_imports(&mut self) {
        let unused: Vec<(SmolStr, Origin)> = self
            .ctx
            .imports
            .iter()
            .filter(|(name, _, _)| !self.used_imports.contains(name))
            .map(|(name, _, origin)| (name.clone(), origin.clone()))
            .collect();
        for (name, origin) in unused {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagCode::W001,
                    format!("import '{name}' is never used"),
                    origin.span,
                )
                .with_severity(Severity::Warning)
                .with_source("check"),
            );
        }
    }
}

fn type_mentions_var(ty: &Type, var: &str) -> bool {
    match ty {
        Type::Var(name) => name == var,
        Type::Maybe(t) | Type::Option(t) | Type::List(t) => type_mentions_var(t, var),
        Type::Result(a, b) | Type::Map(a, b) | Type::Workflow(a, b) => {
            type_mentions_var(a, var) || type_mentions_var(b, var)
        }
        Type::App(_, args) => args.iter().any(|a| type_mentions_var(a, var)),
        Type::Func { params, ret, effect_vars, .. } => {
            effect_vars.iter().any(|v| v == var)
                || params.iter().any(|p| type_mentions_var(p, var))
                || type_mentions_var(ret, var)
        }
        Type::Pii { base, .. } => type_mentions_var(base, var),
        _ => false,
    }
}

fn type_mentions_any_var(ty: &Type, vars: &[SmolStr]) -> bool {
    vars.iter().any(|v| type_mentions_var(ty, v))
}
