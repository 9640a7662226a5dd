//! Inlay hints: inferred field types, inferred returns, and effect
//! annotations that inference refined beyond the declaration.

use crate::base::Span;
use crate::engine::DocumentArtifacts;
use crate::index::ModuleIndex;
use crate::syntax::ast::Decl;
use crate::syntax::pretty::print_type;

/// What a hint annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlayHintKind {
    Type,
    Effect,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlayHint {
    /// 0-based position the hint renders after.
    pub line: u32,
    pub character: u32,
    pub label: String,
    pub kind: InlayHintKind,
}

fn after(span: Span) -> (u32, u32) {
    (span.end.line - 1, span.end.column - 1)
}

/// Hints for one document.
pub fn inlay_hints(artifacts: &DocumentArtifacts, index: &ModuleIndex) -> Vec<InlayHint> {
    let mut hints = Vec::new();

    for decl in &artifacts.module.decls {
        match decl {
            Decl::Data(data) => {
                for field in &data.fields {
                    if field.type_inferred {
                        let (line, character) = after(field.name_span);
                        hints.push(InlayHint {
                            line,
                            character,
                            label: format!(": {}", print_type(&field.ty)),
                            kind: InlayHintKind::Type,
                        });
                    }
                }
            }
            Decl::Func(func) => {
                // Effects inference refined beyond the declaration.
                if let Some(module_name) = &artifacts.module.name {
                    let qualified = format!("{}.{}", module_name.text, func.name);
                    if let Some(sig) = index.effect_signature(&qualified) {
                        let inferred = sig.inferred_set();
                        let declared = sig.declared_set();
                        let extra: Vec<&str> = inferred
                            .iter()
                            .filter(|a| !declared.contains(*a))
                            .map(|a| a.as_str())
                            .collect();
                        if !extra.is_empty() {
                            let (line, character) = after(func.name_span);
                            hints.push(InlayHint {
                                line,
                                character,
                                label: format!(" performs {}", extra.join(" and ")),
                                kind: InlayHintKind::Effect,
                            });
                        }
                    }
                }
                // Parameters that fell back to Unknown show their name
                // only; annotated ones need no hint.
            }
            _ => {}
        }
    }

    hints
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::engine::DiagnosticsEngine;
    use crate::lexicon::LexiconRegistry;
    use crate::project::Config;

    use super::*;

    fn hints_for(source: &str) -> Vec<InlayHint> {
        let mut engine =
            DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));
        engine.open_document("file:///t.prose", source.to_string(), 1);
        let artifacts = engine.artifacts_for("file:///t.prose", None).unwrap();
        let index = engine.index().read();
        inlay_hints(&artifacts, &index)
    }

    #[test]
    fn test_inferred_field_type_hint() {
        let hints = hints_for("module m.\ndefine Order with email, count.\n");
        let labels: Vec<&str> = hints.iter().map(|h| h.label.as_str()).collect();
        assert!(labels.contains(&": Text"), "{labels:?}");
        assert!(labels.contains(&": Int"), "{labels:?}");
    }

    #[test]
    fn test_effect_hint_for_refined_inference() {
        let hints = hints_for(
            "module m.\nto fetch, produce Text:\n  return Http.get(\"u\").\n",
        );
        let effect: Vec<_> = hints
            .iter()
            .filter(|h| h.kind == InlayHintKind::Effect)
            .collect();
        assert_eq!(effect.len(), 1);
        assert!(effect[0].label.contains("io"));
    }

    #[test]
    fn test_annotated_fields_have_no_hint() {
        let hints = hints_for("module m.\ndefine User with name as Text.\n");
        assert!(hints.is_empty(), "{hints:?}");
    }
}
