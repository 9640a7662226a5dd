//! Hover information.

use crate::base::Position;
use crate::engine::DocumentArtifacts;
use crate::index::{DeclKind, ModuleIndex, Range0};
use crate::syntax::ast::{Decl, Statement};
use crate::syntax::pretty::print_type;

use super::ident_at;

/// Result of a hover request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverResult {
    /// Markdown contents.
    pub contents: String,
    pub range: Range0,
}

/// Hover for the identifier under the cursor: functions show
/// `(params) -> ret performs EFFECTS`; values show their declared type.
pub fn hover(
    artifacts: &DocumentArtifacts,
    index: &ModuleIndex,
    position: Position,
) -> Option<HoverResult> {
    let token = ident_at(&artifacts.tokens, position)?;
    let name = token.value.as_str();
    let range: Range0 = token.span().into();

    // Local function signature.
    if let Some(sig) = artifacts.context.funcs.get(name) {
        return Some(HoverResult {
            contents: format!("```\n{} {}\n```", name, sig.display()),
            range,
        });
    }

    // Data/enum declarations.
    if let Some(data) = artifacts.context.datas.get(name) {
        let fields: Vec<String> = data
            .fields
            .iter()
            .map(|f| format!("  {}: {}", f.name, f.ty.display()))
            .collect();
        return Some(HoverResult {
            contents: format!("```\ndefine {}\n{}\n```", name, fields.join("\n")),
            range,
        });
    }
    if let Some(e) = artifacts.context.enums.get(name) {
        return Some(HoverResult {
            contents: format!(
                "```\ndefine {} as one of {}\n```",
                name,
                e.variants.join(", ")
            ),
            range,
        });
    }

    // Parameters and lets of the enclosing function.
    for decl in &artifacts.module.decls {
        let Decl::Func(func) = decl else { continue };
        if !func.span.contains(position) {
            continue;
        }
        if let Some(param) = func.params.iter().find(|p| p.name == name) {
            return Some(HoverResult {
                contents: format!("```\n{}: {}\n```", name, print_type(&param.ty)),
                range,
            });
        }
        if let Some(body) = &func.body {
            if stmt_binds(body, name) {
                return Some(HoverResult {
                    contents: format!("```\nlet {name}\n```"),
                    range,
                });
            }
        }
    }

    // Cross-module declaration via the index.
    let candidates = index.find_decls(name);
    let (record, decl) = candidates.first()?;
    let contents = match decl.kind {
        DeclKind::Func => {
            let params = decl
                .params
                .as_ref()
                .map(|p| p.join(", "))
                .unwrap_or_default();
            let ret = decl.return_type.as_deref().unwrap_or("Unknown");
            format!(
                "```\n{} ({}) -> {}\n```\nfrom {}",
                name,
                params,
                ret,
                record.module_name.as_deref().unwrap_or("?")
            )
        }
        DeclKind::Data => format!("```\ndefine {name}\n```"),
        DeclKind::Enum => format!("```\ndefine {name} as one of …\n```"),
    };
    Some(HoverResult { contents, range })
}

fn stmt_binds(stmts: &[Statement], name: &str) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Statement::Let { name: n, .. } | Statement::Start { name: n, .. } => n == name,
        Statement::If {
            then, otherwise, ..
        } => {
            stmt_binds(then, name)
                || otherwise.as_ref().is_some_and(|o| stmt_binds(o, name))
        }
        Statement::Match { cases, .. } => cases.iter().any(|c| stmt_binds(&c.body, name)),
        Statement::Scope { body, .. } | Statement::Block { body, .. } => stmt_binds(body, name),
        Statement::ForEach { var, body, .. } => var == name || stmt_binds(body, name),
        Statement::Workflow(wf) => wf.steps.iter().any(|s| stmt_binds(&s.body, name)),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::engine::DiagnosticsEngine;
    use crate::lexicon::LexiconRegistry;
    use crate::project::Config;

    use super::*;

    fn hover_at(source: &str, line: u32, col: u32) -> Option<HoverResult> {
        let mut engine =
            DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));
        engine.open_document("file:///t.prose", source.to_string(), 1);
        let artifacts = engine.artifacts_for("file:///t.prose", None).unwrap();
        let index = engine.index().read();
        hover(&artifacts, &index, Position::new(line, col))
    }

    #[test]
    fn test_hover_function_shows_signature_and_effects() {
        let result = hover_at(
            "module m.\nto greet, given who as Text, produce Text, performs io:\n  return who.\nto f, produce Text:\n  return greet(\"x\").\n",
            5,
            11,
        )
        .expect("hover");
        assert!(result.contents.contains("(who: Text) -> Text"), "{}", result.contents);
        assert!(result.contents.contains("performs"), "{}", result.contents);
    }

    #[test]
    fn test_hover_parameter_type() {
        let result = hover_at(
            "module m.\nto greet, given who as Text, produce Text:\n  return who.\n",
            3,
            11,
        )
        .expect("hover");
        assert!(result.contents.contains("who: Text"));
    }

    #[test]
    fn test_hover_data_shows_fields() {
        let result = hover_at(
            "module m.\ndefine User with name as Text.\nto f, given u as User, produce Text:\n  return u.name.\n",
            3,
            19,
        )
        .expect("hover");
        assert!(result.contents.contains("name: Text"), "{}", result.contents);
    }

    #[test]
    fn test_hover_nothing_on_punctuation() {
        assert!(hover_at("module m.\nto f, produce Int:\n  return 1.\n", 3, 12).is_none());
    }
}
