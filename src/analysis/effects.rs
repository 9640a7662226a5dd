//! Effect inference.
//!
//! Builds the intra-module call graph, computes strongly connected
//! components with an iterative Tarjan (no recursion, large workspaces
//! must not blow the stack), propagates observed effects in SCC order,
//! and reconciles declared against inferred/required effect sets.
//!
//! The graph is recomputed per module and never shared; only the
//! resulting effect signatures persist (the module index caches them for
//! cross-module inference).

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use smol_str::SmolStr;

use crate::base::{DiagCode, Diagnostic, FixIt, Severity, TextEdit};
use crate::ir::{
    CapabilityKind, CoreExpr, CoreFunc, CoreModule, CoreStmt, EffectAtom, EffectSet, Type,
};

/// The cached effect triple of one exported function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSignature {
    pub module: SmolStr,
    pub function: SmolStr,
    pub qualified_name: SmolStr,
    pub declared: Vec<EffectAtom>,
    pub inferred: Vec<EffectAtom>,
    pub required: Vec<EffectAtom>,
}

impl EffectSignature {
    pub fn declared_set(&self) -> EffectSet {
        EffectSet::of(&self.declared)
    }

    pub fn inferred_set(&self) -> EffectSet {
        EffectSet::of(&self.inferred)
    }

    pub fn required_set(&self) -> EffectSet {
        EffectSet::of(&self.required)
    }
}

/// Inference output: diagnostics plus the per-module signature cache.
#[derive(Debug, Clone, Default)]
pub struct EffectOutcome {
    pub diagnostics: Vec<Diagnostic>,
    /// Keyed by qualified name (`module.function`).
    pub signatures: IndexMap<SmolStr, EffectSignature>,
}

/// Per-function facts gathered by the body walk.
#[derive(Debug, Clone, Default)]
struct NodeFacts {
    observed: EffectSet,
    /// Indices of called local functions.
    callees: Vec<usize>,
    /// Effects imported via cross-module calls.
    imported: EffectSet,
}

/// Infer effects for a module. `imported_signatures` supplies cached
/// triples of other modules so cross-module calls need no re-analysis.
pub fn infer_effects(
    module: &CoreModule,
    imported_signatures: Option<&FxHashMap<SmolStr, EffectSignature>>,
) -> EffectOutcome {
    let mut outcome = EffectOutcome::default();
    let funcs: Vec<&CoreFunc> = module.funcs.iter().collect();
    let index_of: FxHashMap<&str, usize> = funcs
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();

    // Alias → module-name map for resolving imported qualified names.
    let mut import_names: FxHashMap<&str, &SmolStr> = FxHashMap::default();
    for import in &module.imports {
        if let Some(alias) = &import.alias {
            import_names.insert(alias.as_str(), &import.name);
        }
        import_names.insert(import.name.as_str(), &import.name);
        if let Some(last) = import.name.split('.').next_back() {
            import_names.insert(last, &import.name);
        }
    }

    // 1. Walk bodies: observed atoms, call edges, imported effects.
    let mut facts: Vec<NodeFacts> = vec![NodeFacts::default(); funcs.len()];
    for (i, func) in funcs.iter().enumerate() {
        if let Some(body) = &func.body {
            let mut walker = Walker {
                facts: &mut facts[i],
                index_of: &index_of,
                import_names: &import_names,
                imported_signatures,
            };
            walker.walk_stmts(body);
        }
        check_effect_vars(func, &mut outcome.diagnostics);
    }

    // 2. SCCs, then propagation in emission order (callees first).
    let adjacency: Vec<Vec<usize>> = facts.iter().map(|f| f.callees.clone()).collect();
    let sccs = tarjan_sccs(&adjacency);

    let mut inferred: Vec<EffectSet> = funcs
        .iter()
        .map(|f| EffectSet::of(&f.declared_effects))
        .collect();
    let mut required: Vec<EffectSet> = vec![EffectSet::EMPTY; funcs.len()];

    for scc in &sccs {
        // Union observed facts across the component.
        let mut component_inferred = EffectSet::EMPTY;
        let mut component_required = EffectSet::EMPTY;
        for &node in scc {
            component_inferred = component_inferred
                .union(inferred[node])
                .union(facts[node].observed)
                .union(facts[node].imported);
            component_required = component_required
                .union(facts[node].observed)
                .union(facts[node].imported);
            for &callee in &facts[node].callees {
                if scc.contains(&callee) {
                    continue;
                }
                // Callee-declared feeds inferred; callee-required feeds
                // required. Emission order guarantees both are final.
                component_inferred = component_inferred
                    .union(EffectSet::of(&funcs[callee].declared_effects))
                    .union(inferred[callee]);
                component_required = component_required.union(required[callee]);
            }
        }
        for &node in scc {
            inferred[node] = inferred[node].union(component_inferred);
            required[node] = required[node].union(component_required);
        }
    }

    // 3. Reconcile declared vs inferred/required per function.
    for (i, func) in funcs.iter().enumerate() {
        if func.body.is_some() {
            reconcile(func, inferred[i], required[i], &mut outcome.diagnostics);
        }
        let module_name = module
            .name
            .clone()
            .unwrap_or_else(|| SmolStr::new("main"));
        let qualified = SmolStr::new(format!("{}.{}", module_name, func.name));
        outcome.signatures.insert(
            qualified.clone(),
            EffectSignature {
                module: module_name,
                function: func.name.clone(),
                qualified_name: qualified,
                declared: func.declared_effects.clone(),
                inferred: inferred[i].iter().collect(),
                required: required[i].iter().collect(),
            },
        );
    }

    outcome
}

/// The built-in observed-effect rules for call-target names.
pub fn observed_effect(name: &str) -> Option<EffectAtom> {
    if name == "print" || name.starts_with("Io.") || name.starts_with("Log.") {
        return Some(EffectAtom::Io);
    }
    match CapabilityKind::infer_from_call(name) {
        Some(CapabilityKind::Cpu) => Some(EffectAtom::Cpu),
        Some(_) => Some(EffectAtom::Io),
        None => None,
    }
}

struct Walker<'a> {
    facts: &'a mut NodeFacts,
    index_of: &'a FxHashMap<&'a str, usize>,
    import_names: &'a FxHashMap<&'a str, &'a SmolStr>,
    imported_signatures: Option<&'a FxHashMap<SmolStr, EffectSignature>>,
}

impl Walker<'_> {
    fn walk_stmts(&mut self, stmts: &[CoreStmt]) {
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &CoreStmt) {
        match stmt {
            CoreStmt::Let { value, .. } | CoreStmt::Set { value, .. } => self.walk_expr(value),
            CoreStmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.walk_expr(value);
                }
            }
            CoreStmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.walk_expr(cond);
                self.walk_stmts(then);
                if let Some(otherwise) = otherwise {
                    self.walk_stmts(otherwise);
                }
            }
            CoreStmt::Match { expr, cases, .. } => {
                self.walk_expr(expr);
                for case in cases {
                    self.walk_stmts(&case.body);
                }
            }
            CoreStmt::Start { expr, .. } => self.walk_expr(expr),
            CoreStmt::Wait { .. } => {}
            CoreStmt::Workflow(wf) => {
                // Workflow bodies always contribute IO.
                self.facts.observed.insert(EffectAtom::Io);
                for step in &wf.steps {
                    self.walk_stmts(&step.body);
                    if let Some(compensate) = &step.compensate {
                        self.walk_stmts(compensate);
                    }
                }
            }
            CoreStmt::Scope { body, .. }
            | CoreStmt::ForEach { body, .. }
            | CoreStmt::Block { body, .. } => self.walk_stmts(body),
            CoreStmt::Expr { expr, .. } => self.walk_expr(expr),
        }
    }

    fn walk_expr(&mut self, expr: &CoreExpr) {
        match expr {
            CoreExpr::Call { target, args, .. } => {
                if let CoreExpr::Name { text, .. } = &**target {
                    self.record_call(text);
                } else {
                    self.walk_expr(target);
                }
                for arg in args {
                    self.walk_expr(arg);
                }
            }
            CoreExpr::Construct { fields, .. } => {
                for (_, value) in fields {
                    self.walk_expr(value);
                }
            }
            CoreExpr::Ok { expr, .. }
            | CoreExpr::Err { expr, .. }
            | CoreExpr::Some { expr, .. }
            | CoreExpr::Await { expr, .. } => self.walk_expr(expr),
            // Lambdas propagate their body's effects to the enclosing
            // function.
            CoreExpr::Lambda { body, .. } => self.walk_expr(body),
            _ => {}
        }
    }

    fn record_call(&mut self, name: &str) {
        if let Some(atom) = observed_effect(name) {
            self.facts.observed.insert(atom);
            return;
        }
        if let Some(&callee) = self.index_of.get(name) {
            if !self.facts.callees.contains(&callee) {
                self.facts.callees.push(callee);
            }
            return;
        }
        // Cross-module call: seed from the imported signature cache.
        if let Some(base) = name.split('.').next() {
            if name.contains('.') {
                if let Some(module_name) = self.import_names.get(base) {
                    let func = name.split('.').next_back().unwrap_or(name);
                    let qualified = format!("{module_name}.{func}");
                    if let Some(signatures) = self.imported_signatures {
                        if let Some(sig) = signatures.get(qualified.as_str()) {
                            self.facts.imported =
                                self.facts.imported.union(sig.inferred_set());
                        }
                    }
                }
            }
        }
    }
}

/// Effect variables resolve against the function-typed parameters that
/// carry them; a variable in the performs clause with no carrier can
/// never bind to a concrete atom.
fn check_effect_vars(func: &CoreFunc, diagnostics: &mut Vec<Diagnostic>) {
    for var in &func.effect_vars {
        let carried = func.params.iter().any(|p| match &p.ty {
            Type::Func { effect_vars, .. } => effect_vars.iter().any(|v| v == var),
            _ => false,
        });
        if !carried {
            diagnostics.push(
                Diagnostic::new(
                    DiagCode::EffectVarUnresolved,
                    format!(
                        "effect variable '{var}' in '{}' is not carried by any parameter",
                        func.name
                    ),
                    func.header_origin.span,
                )
                .with_severity(Severity::Warning)
                .with_source("effects"),
            );
        }
    }
    // A carrier variable the function never declared cannot resolve
    // either (hand-built IR only; the parser rejects it earlier).
    for param in &func.params {
        if let Type::Func { effect_vars, .. } = &param.ty {
            for var in effect_vars {
                if !func.type_params.iter().any(|p| p == var) {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagCode::EffectVarUnresolved,
                            format!("effect variable '{var}' is not declared by '{}'", func.name),
                            param.origin.span,
                        )
                        .with_severity(Severity::Warning)
                        .with_source("effects"),
                    );
                }
            }
        }
    }
}

fn reconcile(
    func: &CoreFunc,
    inferred: EffectSet,
    required: EffectSet,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let declared = EffectSet::of(&func.declared_effects);
    let header = func.header_origin.span;

    // Missing effects: required but not declared.
    for (atom, code) in [
        (EffectAtom::Io, DiagCode::EffInferMissingIo),
        (EffectAtom::Cpu, DiagCode::EffInferMissingCpu),
    ] {
        if required.contains(atom) && !declared.contains(atom) {
            // Declared IO already covers required CPU.
            if atom == EffectAtom::Cpu && declared.contains(EffectAtom::Io) {
                continue;
            }
            let phrase = atom.as_str();
            diagnostics.push(
                Diagnostic::new(
                    code,
                    format!(
                        "'{}' performs {} but does not declare it",
                        func.name, phrase
                    ),
                    header,
                )
                .with_source("effects")
                .with_fix(FixIt::new(
                    format!("Add It performs {} to '{}'", phrase.to_uppercase(), func.name),
                    vec![TextEdit::insert(header.end, format!(", performs {phrase}"))],
                ))
                .with_data(json!({ "func": func.name, "effect": phrase })),
            );
        }
    }

    // Redundant effects: declared but never required.
    for (atom, code) in [
        (EffectAtom::Io, DiagCode::EffInferRedundantIo),
        (EffectAtom::Cpu, DiagCode::EffInferRedundantCpu),
    ] {
        if declared.contains(atom) && !required.contains(atom) {
            let phrase = atom.as_str();
            let edit_span = func
                .declared_effect_origins
                .iter()
                .find(|(a, _)| *a == atom)
                .map(|(_, o)| o.span)
                .unwrap_or(header);
            diagnostics.push(
                Diagnostic::new(
                    code,
                    format!("'{}' declares {} but never requires it", func.name, phrase),
                    edit_span,
                )
                .with_severity(Severity::Warning)
                .with_source("effects")
                .with_fix(FixIt::new(
                    format!(
                        "Remove It performs {} from '{}'",
                        phrase.to_uppercase(),
                        func.name
                    ),
                    vec![TextEdit::new(edit_span, String::new())],
                ))
                .with_data(json!({ "func": func.name, "effect": phrase })),
            );
        }
    }

    // `cpu` alongside `io` is subsumed even when CPU work is required.
    if declared.contains(EffectAtom::Cpu)
        && declared.contains(EffectAtom::Io)
        && required.contains(EffectAtom::Cpu)
    {
        diagnostics.push(
            Diagnostic::new(
                DiagCode::EffInferRedundantCpuWithIo,
                format!("'{}' declares cpu, already subsumed by io", func.name),
                header,
            )
            .with_severity(Severity::Info)
            .with_source("effects")
            .with_data(json!({ "func": func.name })),
        );
    }

    debug_assert!(
        required.is_subset(inferred),
        "required must be a subset of inferred for '{}'",
        func.name
    );
}

/// Iterative Tarjan strongly-connected components. Emits each component
/// after every component it points to, so propagation can run in
/// emission order.
pub fn tarjan_sccs(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    // Explicit DFS frames: (node, next-edge cursor).
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        frames.push((start, 0));
        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if frame.1 == 0 {
                index[node] = next_index;
                low[node] = next_index;
                next_index += 1;
                stack.push(node);
                on_stack[node] = true;
            }
            let cursor = frame.1;
            if let Some(&succ) = adjacency[node].get(cursor) {
                frame.1 += 1;
                if index[succ] == usize::MAX {
                    frames.push((succ, 0));
                } else if on_stack[succ] {
                    low[node] = low[node].min(index[succ]);
                }
                continue;
            }
            // Node finished.
            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if low[node] == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                sccs.push(component);
            }
        }
    }
    sccs
}

#[cfg(test)]
mod tests {
    use crate::ir::lower_module;
    use crate::parser::test_support::parse_en;

    use super::*;

    fn infer_en(source: &str) -> EffectOutcome {
        let parsed = parse_en(source);
        let lowered = lower_module(&parsed.module, None);
        infer_effects(&lowered.module, None)
    }

    fn codes(outcome: &EffectOutcome) -> Vec<&'static str> {
        outcome.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_tarjan_simple_cycle() {
        // 0 → 1 → 2 → 0, 3 → 0
        let adjacency = vec![vec![1], vec![2], vec![0], vec![0]];
        let sccs = tarjan_sccs(&adjacency);
        assert_eq!(sccs.len(), 2);
        let cycle = sccs.iter().find(|s| s.len() == 3).unwrap();
        let mut sorted = cycle.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
        // The cycle is emitted before the node depending on it.
        assert_eq!(sccs[0].len(), 3);
    }

    #[test]
    fn test_missing_io_scenario() {
        let outcome = infer_en(
            "module m.\nto greet, produce Text:\n  return Http.get(\"https://example.com\").\n",
        );
        let diag = outcome
            .diagnostics
            .iter()
            .find(|d| d.code == DiagCode::EffInferMissingIo)
            .expect("EFF_INFER_MISSING_IO");
        assert!(diag.fix_its[0].title.contains("Add It performs IO to 'greet'"));
    }

    #[test]
    fn test_redundant_io_scenario() {
        let outcome = infer_en("module m.\nto pureish, produce Int, performs io:\n  return 1.\n");
        let diag = outcome
            .diagnostics
            .iter()
            .find(|d| d.code == DiagCode::EffInferRedundantIo)
            .expect("EFF_INFER_REDUNDANT_IO");
        assert!(!diag.severity.is_error());
        assert!(diag.fix_its[0].title.contains("Remove It performs IO"));
    }

    #[test]
    fn test_effects_propagate_through_calls() {
        let outcome = infer_en(
            "module m.\nto fetch, produce Text, performs io:\n  return Http.get(\"u\").\nto caller, produce Text:\n  return fetch().\n",
        );
        assert!(codes(&outcome).contains(&"EFF_INFER_MISSING_IO"));
        let sig = outcome.signatures.get("m.caller").unwrap();
        assert!(sig.inferred_set().contains(EffectAtom::Io));
        assert!(sig.required_set().contains(EffectAtom::Io));
    }

    #[test]
    fn test_recursive_cycle_propagates() {
        let outcome = infer_en(
            "module m.\nto ping, produce Int, performs io:\n  pong().\n  return Http.get(\"u\").\nto pong, produce Int, performs io:\n  ping().\n  return 1.\n",
        );
        let pong = outcome.signatures.get("m.pong").unwrap();
        assert!(pong.required_set().contains(EffectAtom::Io));
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    }

    #[test]
    fn test_required_subset_of_inferred() {
        let outcome = infer_en(
            "module m.\nto a, produce Int, performs io:\n  return Http.get(\"u\").\nto b, produce Int:\n  return a().\n",
        );
        for sig in outcome.signatures.values() {
            assert!(
                sig.required_set().is_subset(sig.inferred_set()),
                "required ⊄ inferred for {}",
                sig.qualified_name
            );
        }
    }

    #[test]
    fn test_workflow_contributes_io() {
        let outcome = infer_en(
            "module m.\nto run, produce Int:\n  workflow:\n    step one:\n      compute().\n  return 1.\n",
        );
        assert!(codes(&outcome).contains(&"EFF_INFER_MISSING_IO"));
    }

    #[test]
    fn test_cpu_subsumed_by_io() {
        let outcome = infer_en(
            "module m.\nto crunch, produce Int, performs io and cpu:\n  Cpu.hash(\"x\").\n  return Http.get(\"u\").\n",
        );
        assert!(codes(&outcome).contains(&"EFF_INFER_REDUNDANT_CPU_WITH_IO"));
    }

    #[test]
    fn test_imported_signatures_seed_inference() {
        let mut imported = FxHashMap::default();
        imported.insert(
            SmolStr::new("util.net.fetch"),
            EffectSignature {
                module: "util.net".into(),
                function: "fetch".into(),
                qualified_name: "util.net.fetch".into(),
                declared: vec![EffectAtom::Io],
                inferred: vec![EffectAtom::Io],
                required: vec![EffectAtom::Io],
            },
        );
        let parsed = parse_en(
            "module m.\nimport util.net as net.\nto caller, produce Text:\n  return net.fetch(\"u\").\n",
        );
        let lowered = lower_module(&parsed.module, None);
        let outcome = infer_effects(&lowered.module, Some(&imported));
        assert!(
            outcome
                .diagnostics
                .iter()
                .any(|d| d.code == DiagCode::EffInferMissingIo),
            "{:?}",
            outcome.diagnostics
        );
    }

    #[test]
    fn test_effect_var_without_carrier_warns() {
        let outcome = infer_en(
            "module m.\nto f[e], given x as Int, produce Int, performs io and e:\n  return x.\n",
        );
        assert!(codes(&outcome).contains(&"EFFECT_VAR_UNRESOLVED"));
    }

    #[test]
    fn test_effect_var_with_carrier_resolves() {
        let outcome = infer_en(
            "module m.\nto apply[e], given f as (given Int, produce Int, performs e), produce Int, performs e:\n  return f(1).\n",
        );
        assert!(
            !codes(&outcome).contains(&"EFFECT_VAR_UNRESOLVED"),
            "{:?}",
            outcome.diagnostics
        );
    }
}
