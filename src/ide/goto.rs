//! Go-to-definition.
//!
//! Resolution order: local binders (parameters, lets, pattern bindings,
//! start names, loop variables), module-level declarations, then the
//! workspace index for cross-module names.

use crate::base::{Position, Span};
use crate::engine::DocumentArtifacts;
use crate::index::ModuleIndex;
use crate::syntax::ast::{Decl, Func, MatchCase, Pattern, Statement};

use super::{ident_at, Location};

/// Resolve the definition of the identifier at `position`.
pub fn definition(
    artifacts: &DocumentArtifacts,
    index: &ModuleIndex,
    position: Position,
) -> Option<Location> {
    let token = ident_at(&artifacts.tokens, position)?;
    let name = token.value.as_str();

    // Local binder inside the enclosing function.
    for decl in &artifacts.module.decls {
        if let Decl::Func(func) = decl {
            if func.span.contains(position) {
                if let Some(span) = find_binder(func, name, position) {
                    return Some(Location {
                        uri: artifacts.uri.clone(),
                        range: span.into(),
                    });
                }
            }
        }
    }

    // Module-level declarations.
    for decl in &artifacts.module.decls {
        let (decl_name, selection) = match decl {
            Decl::Func(f) => (&f.name, f.name_span),
            Decl::Data(d) => (&d.name, d.name_span),
            Decl::Enum(e) => (&e.name, e.name_span),
            Decl::Import(_) => continue,
        };
        if decl_name == name {
            return Some(Location {
                uri: artifacts.uri.clone(),
                range: selection.into(),
            });
        }
        // Enum variants resolve to their enum.
        if let Decl::Enum(e) = decl {
            if e.variants.iter().any(|(v, _)| v == name) {
                return Some(Location {
                    uri: artifacts.uri.clone(),
                    range: e.name_span.into(),
                });
            }
        }
    }

    // Cross-module: the workspace index.
    let candidates = index.find_decls(name);
    let (record, decl) = candidates.first()?;
    Some(Location {
        uri: record.uri.clone(),
        range: decl.selection_range,
    })
}

/// The innermost binder for `name` before `position` in a function.
fn find_binder(func: &Func, name: &str, position: Position) -> Option<Span> {
    if let Some(param) = func.params.iter().find(|p| p.name == name) {
        return Some(param.name_span);
    }
    func.body
        .as_ref()
        .and_then(|body| find_binder_in_stmts(body, name, position))
}

fn find_binder_in_stmts(stmts: &[Statement], name: &str, position: Position) -> Option<Span> {
    let mut found = None;
    for stmt in stmts {
        if stmt.span().start > position {
            break;
        }
        match stmt {
            Statement::Let {
                name: n,
                name_span,
                ..
            }
            | Statement::Start {
                name: n,
                name_span,
                ..
            } if n == name => found = Some(*name_span),
            Statement::ForEach {
                var,
                var_span,
                body,
                ..
            } => {
                if var == name && stmt.span().contains(position) {
                    found = Some(*var_span);
                }
                if let Some(inner) = find_binder_in_stmts(body, name, position) {
                    found = Some(inner);
                }
            }
            Statement::If {
                then, otherwise, ..
            } => {
                if let Some(inner) = find_binder_in_stmts(then, name, position) {
                    found = Some(inner);
                }
                if let Some(otherwise) = otherwise {
                    if let Some(inner) = find_binder_in_stmts(otherwise, name, position) {
                        found = Some(inner);
                    }
                }
            }
            Statement::Match { cases, .. } => {
                for case in cases {
                    if let Some(inner) = find_binder_in_case(case, name, position) {
                        found = Some(inner);
                    }
                }
            }
            Statement::Scope { body, .. } | Statement::Block { body, .. } => {
                if let Some(inner) = find_binder_in_stmts(body, name, position) {
                    found = Some(inner);
                }
            }
            Statement::Workflow(wf) => {
                for step in &wf.steps {
                    if let Some(inner) = find_binder_in_stmts(&step.body, name, position) {
                        found = Some(inner);
                    }
                }
            }
            _ => {}
        }
    }
    found
}

fn find_binder_in_case(case: &MatchCase, name: &str, position: Position) -> Option<Span> {
    if !case.span.contains(position) {
        return find_binder_in_stmts(&case.body, name, position);
    }
    if let Pattern::Ctor { names, .. } = &case.pattern {
        if let Some((_, span)) = names.iter().find(|(n, _)| n == name) {
            return Some(*span);
        }
    }
    if let Pattern::Name { name: n, span } = &case.pattern {
        if n == name {
            return Some(*span);
        }
    }
    find_binder_in_stmts(&case.body, name, position)
}
