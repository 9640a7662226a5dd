//! The workspace module index.
//!
//! One record per file: URI, module name, declarations with 0-based
//! editor ranges, cached effect signatures, and the import set. The
//! index maintains the module-name → URI map (first indexed wins; later
//! collisions are warnings), computes dependent-document invalidations,
//! and persists a JSON snapshot best-effort.

mod resolver;

pub use resolver::{ModuleResolver, ResolvedModule};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::EffectSignature;
use crate::base::{DiagCode, Diagnostic, LineCol, Severity, Span};
use crate::syntax::ast::{Decl, Module};
use crate::syntax::pretty::print_type;

/// A 0-based range for the editor surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range0 {
    pub start: LineCol,
    pub end: LineCol,
}

impl From<Span> for Range0 {
    fn from(span: Span) -> Self {
        Self {
            start: span.start.into(),
            end: span.end.into(),
        }
    }
}

impl Range0 {
    /// Back to the internal 1-based form.
    pub fn to_span(self) -> Span {
        Span::new(self.start.into(), self.end.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    Func,
    Data,
    Enum,
}

/// One indexed declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclRecord {
    pub name: SmolStr,
    pub kind: DeclKind,
    /// Full declaration range.
    pub range: Range0,
    /// The name identifier range.
    pub selection_range: Range0,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

/// Per-file index record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub uri: String,
    pub module_name: Option<SmolStr>,
    pub declarations: Vec<DeclRecord>,
    #[serde(default)]
    pub effect_signatures: IndexMap<SmolStr, EffectSignature>,
    #[serde(default)]
    pub imports: Vec<SmolStr>,
}

impl IndexRecord {
    /// Build a record from a parsed module and its effect signatures.
    pub fn from_module(
        uri: impl Into<String>,
        module: &Module,
        signatures: IndexMap<SmolStr, EffectSignature>,
    ) -> Self {
        let mut declarations = Vec::new();
        let mut imports = Vec::new();
        for decl in &module.decls {
            match decl {
                Decl::Import(import) => imports.push(import.name.clone()),
                Decl::Data(data) => declarations.push(DeclRecord {
                    name: data.name.clone(),
                    kind: DeclKind::Data,
                    range: data.span.into(),
                    selection_range: data.name_span.into(),
                    params: None,
                    return_type: None,
                }),
                Decl::Enum(e) => declarations.push(DeclRecord {
                    name: e.name.clone(),
                    kind: DeclKind::Enum,
                    range: e.span.into(),
                    selection_range: e.name_span.into(),
                    params: None,
                    return_type: None,
                }),
                Decl::Func(f) => declarations.push(DeclRecord {
                    name: f.name.clone(),
                    kind: DeclKind::Func,
                    range: f.span.into(),
                    selection_range: f.name_span.into(),
                    params: Some(
                        f.params
                            .iter()
                            .map(|p| format!("{} as {}", p.name, print_type(&p.ty)))
                            .collect(),
                    ),
                    return_type: f.ret_type.as_ref().map(print_type),
                }),
            }
        }
        Self {
            uri: uri.into(),
            module_name: module.name.as_ref().map(|n| n.text.clone()),
            declarations,
            effect_signatures: signatures,
            imports,
        }
    }
}

/// Why a snapshot failed to load; downgraded to an empty index with a
/// `C001` log line at the call site.
#[derive(Debug, Error)]
pub enum IndexCacheError {
    #[error("index cache could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("index cache is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported index cache version {0}")]
    Version(u32),
}

/// Snapshot shape persisted to `<workspace>/.cache/index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub root: String,
    pub files: Vec<IndexRecord>,
}

/// The cross-module symbol index.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    files: IndexMap<String, IndexRecord>,
    module_to_uri: FxHashMap<SmolStr, String>,
    dirty: bool,
}

impl ModuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a file's record. Returns index warnings (module
    /// name collisions, `V002`).
    pub fn update(&mut self, record: IndexRecord) -> Vec<Diagnostic> {
        let mut warnings = Vec::new();
        let uri = record.uri.clone();

        // Remove a stale module mapping for this URI first.
        if let Some(old) = self.files.get(&uri) {
            if let Some(old_name) = &old.module_name {
                if self.module_to_uri.get(old_name) == Some(&uri) {
                    self.module_to_uri.remove(old_name);
                }
            }
        }

        if let Some(module_name) = &record.module_name {
            match self.module_to_uri.get(module_name) {
                Some(existing) if existing != &uri => {
                    // First-indexed wins; the later entry is dropped.
                    warn!(module = %module_name, uri = %uri, "module name collision");
                    warnings.push(
                        Diagnostic::new(
                            DiagCode::V002,
                            format!(
                                "module '{module_name}' is already provided by {existing}"
                            ),
                            Span::synthesized(),
                        )
                        .with_severity(Severity::Warning)
                        .with_source("index"),
                    );
                }
                _ => {
                    self.module_to_uri.insert(module_name.clone(), uri.clone());
                }
            }
        }

        self.files.insert(uri, record);
        self.dirty = true;
        warnings
    }

    /// Drop a file on deletion.
    pub fn remove(&mut self, uri: &str) {
        if let Some(record) = self.files.shift_remove(uri) {
            if let Some(name) = &record.module_name {
                if self.module_to_uri.get(name).map(String::as_str) == Some(uri) {
                    self.module_to_uri.remove(name);
                    // Another surviving file may provide the module.
                    let replacement = self
                        .files
                        .values()
                        .find(|r| r.module_name.as_ref() == Some(name))
                        .map(|r| r.uri.clone());
                    if let Some(replacement) = replacement {
                        self.module_to_uri.insert(name.clone(), replacement);
                    }
                }
            }
            self.dirty = true;
        }
    }

    pub fn get(&self, uri: &str) -> Option<&IndexRecord> {
        self.files.get(uri)
    }

    pub fn uri_of_module(&self, module_name: &str) -> Option<&str> {
        self.module_to_uri.get(module_name).map(String::as_str)
    }

    pub fn record_of_module(&self, module_name: &str) -> Option<&IndexRecord> {
        self.uri_of_module(module_name).and_then(|uri| self.files.get(uri))
    }

    /// URIs of open documents whose imports include the given module.
    pub fn dependents_of(&self, module_name: &str) -> Vec<String> {
        self.files
            .values()
            .filter(|r| r.imports.iter().any(|i| i == module_name))
            .map(|r| r.uri.clone())
            .collect()
    }

    /// Effect signature lookup by qualified name, across every record.
    pub fn effect_signature(&self, qualified_name: &str) -> Option<&EffectSignature> {
        self.files
            .values()
            .find_map(|r| r.effect_signatures.get(qualified_name))
    }

    /// All cached signatures, for seeding cross-module inference.
    pub fn all_signatures(&self) -> FxHashMap<SmolStr, EffectSignature> {
        let mut out = FxHashMap::default();
        for record in self.files.values() {
            for (name, sig) in &record.effect_signatures {
                out.insert(name.clone(), sig.clone());
            }
        }
        out
    }

    /// Declarations matching a name, across the workspace.
    pub fn find_decls(&self, name: &str) -> Vec<(&IndexRecord, &DeclRecord)> {
        self.files
            .values()
            .flat_map(|r| r.declarations.iter().map(move |d| (r, d)))
            .filter(|(_, d)| d.name == name)
            .collect()
    }

    /// Fuzzy search over declaration names (workspace symbols).
    pub fn search(&self, query: &str) -> Vec<(&IndexRecord, &DeclRecord)> {
        let query = query.to_lowercase();
        self.files
            .values()
            .flat_map(|r| r.declarations.iter().map(move |d| (r, d)))
            .filter(|(_, d)| fuzzy_match(&d.name.to_lowercase(), &query))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexRecord> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn module_count(&self) -> usize {
        self.module_to_uri.len()
    }

    // ------------------------------------------------------------------
    // Persistence (best-effort)
    // ------------------------------------------------------------------

    pub fn snapshot(&self, root: &str) -> IndexSnapshot {
        IndexSnapshot {
            version: 1,
            generated_at: Utc::now(),
            root: root.to_string(),
            files: self.files.values().cloned().collect(),
        }
    }

    /// Persist to disk when dirty. Failures are logged, never raised.
    pub fn save_if_dirty(&mut self, path: &std::path::Path, root: &str) {
        if !self.dirty {
            return;
        }
        let snapshot = self.snapshot(root);
        let result = serde_json::to_string_pretty(&snapshot).map(|json| {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            std::fs::write(path, json)
        });
        match result {
            Ok(Ok(())) => {
                self.dirty = false;
                debug!(path = %path.display(), files = self.files.len(), "index snapshot saved");
            }
            Ok(Err(err)) => warn!(error = %err, "index snapshot not saved"),
            Err(err) => warn!(error = %err, "index snapshot not serialized"),
        }
    }

    /// Load a snapshot, reporting why it could not be used.
    pub fn try_load(path: &std::path::Path) -> Result<Self, IndexCacheError> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: IndexSnapshot = serde_json::from_str(&text)?;
        if snapshot.version != 1 {
            return Err(IndexCacheError::Version(snapshot.version));
        }
        let mut index = Self::new();
        for record in snapshot.files {
            index.update(record);
        }
        index.dirty = false;
        Ok(index)
    }

    /// Load a snapshot; absent or malformed files yield an empty index
    /// and the index rebuilds on demand (`C001`).
    pub fn load(path: &std::path::Path) -> Self {
        match Self::try_load(path) {
            Ok(index) => index,
            Err(IndexCacheError::Io(_)) => Self::new(),
            Err(err) => {
                warn!(code = "C001", error = %err, "index cache unreadable, rebuilding");
                Self::new()
            }
        }
    }
}

fn fuzzy_match(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let mut chars = needle.chars();
    let mut current = chars.next();
    for c in haystack.chars() {
        if Some(c) == current {
            current = chars.next();
            if current.is_none() {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use crate::parser::test_support::parse_en;

    use super::*;

    fn record(uri: &str, source: &str) -> IndexRecord {
        let parsed = parse_en(source);
        IndexRecord::from_module(uri, &parsed.module, IndexMap::new())
    }

    #[test]
    fn test_record_from_module() {
        let record = record(
            "file:///a.prose",
            "module demo.a.\ndefine User with name as Text.\nto greet, given who as Text, produce Text:\n  return who.\n",
        );
        assert_eq!(record.module_name.as_deref(), Some("demo.a"));
        assert_eq!(record.declarations.len(), 2);
        let func = &record.declarations[1];
        assert_eq!(func.kind, DeclKind::Func);
        assert_eq!(func.params.as_ref().unwrap()[0], "who as Text");
        assert_eq!(func.return_type.as_deref(), Some("Text"));
        // 0-based on the editor surface.
        assert_eq!(func.selection_range.start.line, 2);
    }

    #[test]
    fn test_module_collision_first_wins() {
        let mut index = ModuleIndex::new();
        assert!(index
            .update(record("file:///a.prose", "module demo.a.\n"))
            .is_empty());
        let warnings = index.update(record("file:///b.prose", "module demo.a.\n"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, DiagCode::V002);
        assert_eq!(index.uri_of_module("demo.a"), Some("file:///a.prose"));
    }

    #[test]
    fn test_remove_promotes_survivor() {
        let mut index = ModuleIndex::new();
        index.update(record("file:///a.prose", "module demo.a.\n"));
        index.update(record("file:///b.prose", "module demo.a.\n"));
        index.remove("file:///a.prose");
        assert_eq!(index.uri_of_module("demo.a"), Some("file:///b.prose"));
        index.remove("file:///b.prose");
        assert_eq!(index.uri_of_module("demo.a"), None);
    }

    #[test]
    fn test_dependents() {
        let mut index = ModuleIndex::new();
        index.update(record("file:///a.prose", "module demo.a.\n"));
        index.update(record(
            "file:///b.prose",
            "module demo.b.\nimport demo.a.\n",
        ));
        assert_eq!(index.dependents_of("demo.a"), vec!["file:///b.prose"]);
        assert!(index.dependents_of("demo.b").is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cache/index.json");

        let mut index = ModuleIndex::new();
        index.update(record(
            "file:///a.prose",
            "module demo.a.\nto f, produce Int:\n  return 1.\n",
        ));
        index.save_if_dirty(&path, "/workspace");

        let loaded = ModuleIndex::load(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.uri_of_module("demo.a"), Some("file:///a.prose"));
    }

    #[test]
    fn test_malformed_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{ not json").unwrap();
        let index = ModuleIndex::load(&path);
        assert!(index.is_empty());
    }

    #[test]
    fn test_fuzzy_search() {
        let mut index = ModuleIndex::new();
        index.update(record(
            "file:///a.prose",
            "module demo.a.\nto greetUser, produce Int:\n  return 1.\n",
        ));
        assert_eq!(index.search("gru").len(), 1);
        assert_eq!(index.search("zzz").len(), 0);
    }
}
