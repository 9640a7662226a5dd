//! Document and workspace symbols.

use crate::engine::DocumentArtifacts;
use crate::index::{DeclKind, ModuleIndex, Range0};
use crate::syntax::ast::Decl;

/// A node in the document symbol tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: DeclKind,
    pub range: Range0,
    pub selection_range: Range0,
    pub children: Vec<DocumentSymbol>,
}

/// A workspace symbol hit with its qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    pub qualified_name: String,
    pub kind: DeclKind,
    pub uri: String,
    pub range: Range0,
}

/// The declaration tree of one document. Data fields and enum variants
/// appear as children.
pub fn document_symbols(artifacts: &DocumentArtifacts) -> Vec<DocumentSymbol> {
    let mut symbols = Vec::new();
    for decl in &artifacts.module.decls {
        match decl {
            Decl::Import(_) => {}
            Decl::Data(data) => symbols.push(DocumentSymbol {
                name: data.name.to_string(),
                kind: DeclKind::Data,
                range: data.span.into(),
                selection_range: data.name_span.into(),
                children: data
                    .fields
                    .iter()
                    .map(|f| DocumentSymbol {
                        name: f.name.to_string(),
                        kind: DeclKind::Data,
                        range: f.span.into(),
                        selection_range: f.name_span.into(),
                        children: vec![],
                    })
                    .collect(),
            }),
            Decl::Enum(e) => symbols.push(DocumentSymbol {
                name: e.name.to_string(),
                kind: DeclKind::Enum,
                range: e.span.into(),
                selection_range: e.name_span.into(),
                children: e
                    .variants
                    .iter()
                    .map(|(v, span)| DocumentSymbol {
                        name: v.to_string(),
                        kind: DeclKind::Enum,
                        range: (*span).into(),
                        selection_range: (*span).into(),
                        children: vec![],
                    })
                    .collect(),
            }),
            Decl::Func(f) => symbols.push(DocumentSymbol {
                name: f.name.to_string(),
                kind: DeclKind::Func,
                range: f.span.into(),
                selection_range: f.name_span.into(),
                children: vec![],
            }),
        }
    }
    symbols
}

/// Fuzzy search over the workspace index, returning qualified names.
pub fn workspace_symbols(index: &ModuleIndex, query: &str) -> Vec<SymbolInfo> {
    index
        .search(query)
        .into_iter()
        .map(|(record, decl)| {
            let qualified = match &record.module_name {
                Some(module) => format!("{}.{}", module, decl.name),
                None => decl.name.to_string(),
            };
            SymbolInfo {
                name: decl.name.to_string(),
                qualified_name: qualified,
                kind: decl.kind,
                uri: record.uri.clone(),
                range: decl.selection_range,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::engine::DiagnosticsEngine;
    use crate::lexicon::LexiconRegistry;
    use crate::project::Config;

    use super::*;

    #[test]
    fn test_document_symbol_tree() {
        let mut engine =
            DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));
        engine.open_document(
            "file:///t.prose",
            "module m.\ndefine User with name as Text, age as Int.\ndefine Color as one of Red, Green.\nto f, produce Int:\n  return 1.\n"
                .to_string(),
            1,
        );
        let artifacts = engine.artifacts_for("file:///t.prose", None).unwrap();
        let symbols = document_symbols(&artifacts);
        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols[0].children.len(), 2);
        assert_eq!(symbols[1].children.len(), 2);
        assert_eq!(symbols[2].kind, DeclKind::Func);
    }

    #[test]
    fn test_workspace_symbols_qualified() {
        let mut engine =
            DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));
        engine.open_document(
            "file:///t.prose",
            "module demo.app.\nto greetUser, produce Int:\n  return 1.\n".to_string(),
            1,
        );
        let _ = engine.diagnostics("file:///t.prose", None);
        let index = engine.index().read();
        let hits = workspace_symbols(&index, "greet");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].qualified_name, "demo.app.greetUser");
    }
}
