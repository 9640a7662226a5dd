//! Module-import resolution over configured search roots.
//!
//! A dotted module name resolves to the first file on the roots whose
//! declared module header matches. Shadowing (a later root also
//! providing the module) is a warning, not an error.

use std::path::{Path, PathBuf};

use smol_str::SmolStr;
use tracing::debug;

use crate::base::{DiagCode, Diagnostic, Severity, Span};
use crate::canon::canonicalize;
use crate::lexer::{lex, TokenKind};
use crate::lexicon::{KeywordIndex, KeywordKind, Lexicon};

/// Source-file extensions the resolver considers.
const SOURCE_EXTENSIONS: &[&str] = &["prose", "cnl"];

/// A resolved module location.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModule {
    pub module_name: SmolStr,
    pub path: PathBuf,
    /// Other files also declaring the module (shadowed).
    pub shadowed: Vec<PathBuf>,
}

/// Resolves module names against the filesystem.
pub struct ModuleResolver {
    roots: Vec<PathBuf>,
    lexicon: Lexicon,
    keyword_index: KeywordIndex,
}

impl ModuleResolver {
    pub fn new(roots: Vec<PathBuf>, lexicon: Lexicon) -> Self {
        let keyword_index = KeywordIndex::build(&lexicon);
        Self {
            roots,
            lexicon,
            keyword_index,
        }
    }

    /// Resolve a dotted module name. The first match on the first root
    /// wins. Returns `None` when no file declares the module.
    pub fn resolve(&self, module_name: &str) -> Option<ResolvedModule> {
        let mut matches = Vec::new();
        for root in &self.roots {
            self.scan_dir(root, module_name, &mut matches);
        }
        let mut iter = matches.into_iter();
        let first = iter.next()?;
        let shadowed: Vec<PathBuf> = iter.collect();
        if !shadowed.is_empty() {
            debug!(module = module_name, count = shadowed.len(), "module shadowed");
        }
        Some(ResolvedModule {
            module_name: SmolStr::new(module_name),
            path: first,
            shadowed,
        })
    }

    /// Diagnostics for an unresolved or shadowed import at a span.
    pub fn diagnose_import(&self, module_name: &str, span: Span) -> Vec<Diagnostic> {
        match self.resolve(module_name) {
            None => vec![
                Diagnostic::new(
                    DiagCode::V001,
                    format!("import '{module_name}' does not resolve on the search roots"),
                    span,
                )
                .with_severity(Severity::Warning)
                .with_source("resolver"),
            ],
            Some(resolved) if !resolved.shadowed.is_empty() => vec![
                Diagnostic::new(
                    DiagCode::V002,
                    format!(
                        "module '{module_name}' is shadowed by {} other file(s)",
                        resolved.shadowed.len()
                    ),
                    span,
                )
                .with_severity(Severity::Warning)
                .with_source("resolver"),
            ],
            Some(_) => vec![],
        }
    }

    fn scan_dir(&self, dir: &Path, module_name: &str, matches: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        for path in paths {
            if path.is_dir() {
                self.scan_dir(&path, module_name, matches);
                continue;
            }
            let is_source = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));
            if !is_source {
                continue;
            }
            if self.declared_module(&path).as_deref() == Some(module_name) {
                matches.push(path);
            }
        }
    }

    /// Read just enough of a file to extract its module header.
    fn declared_module(&self, path: &Path) -> Option<SmolStr> {
        let text = std::fs::read_to_string(path).ok()?;
        let head: String = text.lines().take(10).collect::<Vec<_>>().join("\n");
        let canonical = canonicalize(&head, &self.lexicon);
        let out = lex(&canonical, &self.lexicon, &self.keyword_index);

        let mut tokens = out
            .tokens
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent));
        let first = tokens.next()?;
        if first.kind != TokenKind::Keyword(KeywordKind::ModuleDecl) {
            return None;
        }
        let mut name = String::new();
        for tok in tokens {
            match tok.kind {
                TokenKind::Ident | TokenKind::TypeIdent => name.push_str(&tok.value),
                TokenKind::Dot => name.push('.'),
                _ => break,
            }
        }
        let name = name.trim_end_matches('.');
        if name.is_empty() {
            None
        } else {
            Some(SmolStr::new(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::lexicon::english;

    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_resolves_by_declared_header() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.prose", "module demo.a.\n");
        write(dir.path(), "sub/b.prose", "module demo.b.\n");

        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()], english());
        let resolved = resolver.resolve("demo.b").expect("resolved");
        assert!(resolved.path.ends_with("sub/b.prose"));
        assert!(resolved.shadowed.is_empty());
    }

    #[test]
    fn test_unresolved_import_warns_v001() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()], english());
        let diags = resolver.diagnose_import("missing.module", Span::synthesized());
        assert_eq!(diags[0].code, DiagCode::V001);
        assert!(!diags[0].severity.is_error());
    }

    #[test]
    fn test_shadowing_warns_v002() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.prose", "module demo.a.\n");
        write(dir.path(), "z.prose", "module demo.a.\n");

        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()], english());
        let resolved = resolver.resolve("demo.a").expect("resolved");
        // First match in sorted order wins.
        assert!(resolved.path.ends_with("a.prose"));
        assert_eq!(resolved.shadowed.len(), 1);
        let diags = resolver.diagnose_import("demo.a", Span::synthesized());
        assert_eq!(diags[0].code, DiagCode::V002);
    }

    #[test]
    fn test_non_source_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes.txt", "module demo.a.\n");
        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()], english());
        assert!(resolver.resolve("demo.a").is_none());
    }
}
