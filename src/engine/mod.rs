//! The diagnostics engine: per-document pipeline, version-keyed caches,
//! push and pull surfaces, workspace-wide aggregation, and the
//! invalidation rules that tie documents, imports, and lexicons
//! together.

pub mod db;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::analysis::{
    analyze_pii, check_capabilities, check_module, infer_effects, ManifestCache, ModuleContext,
};
use crate::base::{Diagnostic, FileId};
use crate::index::{IndexRecord, ModuleIndex, ModuleResolver};
use crate::ir::{lower_module, CoreModule};
use crate::lexer::Token;
use crate::lexicon::LexiconRegistry;
use crate::project::{Config, TaskQueueStats, WatcherStatus};
use crate::syntax::ast::Module;

pub use db::{parse_document, parse_text, FileText, ParsedDocument, RootDatabase};

/// Everything derived from one document version, shared with the IDE
/// layer.
#[derive(Debug, Clone)]
pub struct DocumentArtifacts {
    pub uri: String,
    pub version: i64,
    pub tokens: Arc<Vec<Token>>,
    pub trivia: Arc<Vec<Token>>,
    pub module: Arc<Module>,
    pub core: Arc<CoreModule>,
    pub context: Arc<ModuleContext>,
    pub diagnostics: Arc<Vec<Diagnostic>>,
}

struct DocumentState {
    file_text: FileText,
    version: i64,
    lexicon_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub index_files: usize,
    pub index_modules: usize,
    pub open_documents: usize,
    pub cached_documents: usize,
    pub queue: Option<TaskQueueStats>,
    pub watcher: Option<WatcherStatus>,
}

/// The core analysis host.
///
/// Mutations run on the caller's (single) scheduler thread; readers get
/// immutable snapshots behind the locks.
pub struct DiagnosticsEngine {
    db: RootDatabase,
    registry: Arc<LexiconRegistry>,
    config: Config,
    manifest: ManifestCache,
    documents: FxHashMap<String, DocumentState>,
    index: RwLock<ModuleIndex>,
    /// `(version, lexicon generation)` keyed artifact cache.
    artifacts: RwLock<FxHashMap<String, (i64, u64, Arc<DocumentArtifacts>)>>,
    next_file_id: u32,
    workspace_root: Option<PathBuf>,
}

impl DiagnosticsEngine {
    pub fn new(config: Config, registry: Arc<LexiconRegistry>) -> Self {
        let manifest = ManifestCache::new(config.capability_manifest_path.clone());
        Self {
            db: RootDatabase::new(),
            registry,
            config,
            manifest,
            documents: FxHashMap::default(),
            index: RwLock::new(ModuleIndex::new()),
            artifacts: RwLock::new(FxHashMap::default()),
            next_file_id: 0,
            workspace_root: None,
        }
    }

    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        if self.config.index_persist {
            let path = self.config.index_path_for(&root);
            *self.index.write() = ModuleIndex::load(&path);
        }
        self.workspace_root = Some(root);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    pub fn open_document(&mut self, uri: &str, text: String, version: i64) {
        let lexicon_id = self.config.locale.clone();
        let file_id = FileId::new(self.next_file_id);
        self.next_file_id += 1;
        let file_text = FileText::new(&self.db, file_id, uri.to_string(), text, lexicon_id.clone());
        self.documents.insert(
            uri.to_string(),
            DocumentState {
                file_text,
                version,
                lexicon_id,
            },
        );
        self.invalidate(uri);
    }

    /// Apply an edit: a new version invalidates every derived artifact
    /// of the document and of its dependents.
    pub fn change_document(&mut self, uri: &str, text: String, version: i64) {
        use salsa::Setter as _;
        let Some(doc) = self.documents.get_mut(uri) else {
            return self.open_document(uri, text, version);
        };
        doc.version = version;
        doc.file_text.set_text(&mut self.db).to(text);
        self.invalidate(uri);
        self.invalidate_dependents(uri);
    }

    pub fn close_document(&mut self, uri: &str) {
        self.documents.remove(uri);
        self.artifacts.write().remove(uri);
    }

    /// Watched-file deletion: drop the document and its index record.
    pub fn delete_document(&mut self, uri: &str) {
        self.close_document(uri);
        self.index.write().remove(uri);
    }

    /// Lexicon/locale change: swap the active lexicon and clear every
    /// derived cache.
    pub fn set_locale(&mut self, locale: &str) -> bool {
        use salsa::Setter as _;
        if !self.registry.set_active(locale) {
            return false;
        }
        self.config.locale = locale.to_string();
        let uris: Vec<String> = self.documents.keys().cloned().collect();
        for uri in uris {
            if let Some(doc) = self.documents.get_mut(&uri) {
                doc.lexicon_id = locale.to_string();
                doc.file_text
                    .set_lexicon_id(&mut self.db)
                    .to(locale.to_string());
            }
        }
        self.artifacts.write().clear();
        true
    }

    fn invalidate(&self, uri: &str) {
        self.artifacts.write().remove(uri);
    }

    fn invalidate_dependents(&self, uri: &str) {
        let module_name: Option<SmolStr> = self
            .index
            .read()
            .get(uri)
            .and_then(|r| r.module_name.clone());
        if let Some(module_name) = module_name {
            let dependents = self.index.read().dependents_of(&module_name);
            let mut cache = self.artifacts.write();
            for dependent in dependents {
                cache.remove(&dependent);
            }
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics (push and pull read the same computation)
    // ------------------------------------------------------------------

    /// Pull diagnostics for a document, computing on cache miss. A
    /// cancelled request returns `None` and leaves caches untouched.
    pub fn diagnostics(
        &mut self,
        uri: &str,
        cancel: Option<&CancellationToken>,
    ) -> Option<Arc<Vec<Diagnostic>>> {
        self.artifacts_for(uri, cancel)
            .map(|a| Arc::clone(&a.diagnostics))
    }

    /// Cached or recomputed artifacts for an open document.
    pub fn artifacts_for(
        &mut self,
        uri: &str,
        cancel: Option<&CancellationToken>,
    ) -> Option<Arc<DocumentArtifacts>> {
        let generation = self.registry.generation();
        let version = self.documents.get(uri)?.version;
        if let Some((cached_version, cached_gen, artifacts)) = self.artifacts.read().get(uri) {
            if *cached_version == version && *cached_gen == generation {
                return Some(Arc::clone(artifacts));
            }
        }

        let artifacts = self.compute(uri, cancel)?;
        self.artifacts
            .write()
            .insert(uri.to_string(), (version, generation, Arc::clone(&artifacts)));
        Some(artifacts)
    }

    /// A read-only view for the IDE layer (no recomputation).
    pub fn cached_artifacts(&self, uri: &str) -> Option<Arc<DocumentArtifacts>> {
        self.artifacts.read().get(uri).map(|(_, _, a)| Arc::clone(a))
    }

    /// Workspace-wide diagnostics over every indexed module; gated by
    /// configuration. Cancellation is honored between documents.
    pub fn workspace_diagnostics(
        &mut self,
        cancel: Option<&CancellationToken>,
    ) -> Vec<(String, Arc<Vec<Diagnostic>>)> {
        if !self.config.diagnostics_workspace_enabled {
            return vec![];
        }
        let uris: Vec<String> = self.index.read().iter().map(|r| r.uri.clone()).collect();
        let mut results = Vec::new();
        for uri in uris {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return results;
            }
            if self.documents.contains_key(&uri) {
                if let Some(diags) = self.diagnostics(&uri, cancel) {
                    results.push((uri, diags));
                }
                continue;
            }
            // Closed files analyze from disk, uncached.
            if let Some(text) = read_uri(&uri) {
                let diags = self.analyze_detached(&uri, &text, cancel);
                if let Some(diags) = diags {
                    results.push((uri, Arc::new(diags)));
                }
            }
        }
        results
    }

    /// Index a file that is not open, e.g. from a watcher event.
    pub fn index_file(&mut self, uri: &str) {
        if let Some(text) = read_uri(uri) {
            let _ = self.analyze_detached(uri, &text, None);
        }
    }

    /// Persist the index snapshot best-effort.
    pub fn persist_index(&self) {
        if !self.config.index_persist {
            return;
        }
        let Some(root) = &self.workspace_root else {
            return;
        };
        let path = self.config.index_path_for(root);
        self.index
            .write()
            .save_if_dirty(&path, &root.to_string_lossy());
    }

    pub fn index(&self) -> &RwLock<ModuleIndex> {
        &self.index
    }

    pub fn registry(&self) -> &LexiconRegistry {
        &self.registry
    }

    pub fn health(
        &self,
        queue: Option<TaskQueueStats>,
        watcher: Option<WatcherStatus>,
    ) -> HealthReport {
        let index = self.index.read();
        HealthReport {
            index_files: index.len(),
            index_modules: index.module_count(),
            open_documents: self.documents.len(),
            cached_documents: self.artifacts.read().len(),
            queue,
            watcher,
        }
    }

    // ------------------------------------------------------------------
    // The pipeline
    // ------------------------------------------------------------------

    /// Full phase pipeline for an open document. Early-phase failures
    /// still produce partial diagnostics; cancellation between phases
    /// returns `None` without touching any cache.
    fn compute(
        &mut self,
        uri: &str,
        cancel: Option<&CancellationToken>,
    ) -> Option<Arc<DocumentArtifacts>> {
        let cancelled = |c: Option<&CancellationToken>| c.is_some_and(|t| t.is_cancelled());
        if cancelled(cancel) {
            return None;
        }
        let doc = self.documents.get(uri)?;
        let version = doc.version;

        let parsed = if self.registry.get(&doc.lexicon_id).is_some()
            && !matches!(doc.lexicon_id.as_str(), "en-US" | "zh-CN")
        {
            // Custom lexicon: bypass the salsa path.
            let lexicon = self.registry.get(&doc.lexicon_id)?;
            parse_text(doc.file_text.text(&self.db), uri, &lexicon)
        } else {
            parse_document(&self.db, doc.file_text)
        };
        if cancelled(cancel) {
            return None;
        }

        let (artifacts, index_record) = self.analyze_parsed(uri, version, parsed, cancel)?;

        let warnings = self.index.write().update(index_record);
        if !warnings.is_empty() {
            debug!(uri, warnings = warnings.len(), "index warnings");
        }

        Some(artifacts)
    }

    /// Analysis phases shared by open-document and detached computation.
    fn analyze_parsed(
        &mut self,
        uri: &str,
        version: i64,
        parsed: ParsedDocument,
        cancel: Option<&CancellationToken>,
    ) -> Option<(Arc<DocumentArtifacts>, IndexRecord)> {
        let cancelled = |c: Option<&CancellationToken>| c.is_some_and(|t| t.is_cancelled());

        let mut diagnostics = parsed.diagnostics.clone();

        let lowered = lower_module(&parsed.module, Some(uri));
        diagnostics.extend(lowered.diagnostics);
        if cancelled(cancel) {
            return None;
        }

        let checked = check_module(&lowered.module);
        diagnostics.extend(checked.diagnostics);
        if cancelled(cancel) {
            return None;
        }

        // Import resolution against the configured search roots; the
        // index answers first, the filesystem resolver second.
        if !self.config.module_search_roots.is_empty() {
            if let Some(lexicon) = self.registry.active() {
                let resolver = ModuleResolver::new(
                    self.config.module_search_roots.clone(),
                    (*lexicon).clone(),
                );
                for decl in &parsed.module.decls {
                    if let crate::syntax::ast::Decl::Import(import) = decl {
                        if self.index.read().uri_of_module(&import.name).is_some() {
                            continue;
                        }
                        diagnostics.extend(resolver.diagnose_import(&import.name, import.span));
                    }
                }
            }
        }

        let imported = self.index.read().all_signatures();
        let effects = infer_effects(&lowered.module, Some(&imported));
        diagnostics.extend(effects.diagnostics);
        if cancelled(cancel) {
            return None;
        }

        let manifest = match self.manifest.state() {
            crate::analysis::ManifestState::Loaded(manifest) => Some(manifest),
            crate::analysis::ManifestState::Absent => None,
            crate::analysis::ManifestState::Unreadable(err) => {
                diagnostics.push(
                    Diagnostic::warning(
                        crate::base::DiagCode::M001,
                        format!("capability manifest could not be read: {err}"),
                        crate::base::Span::synthesized(),
                    )
                    .with_source("manifest"),
                );
                None
            }
            crate::analysis::ManifestState::Malformed(err) => {
                diagnostics.push(
                    Diagnostic::warning(
                        crate::base::DiagCode::M002,
                        format!("capability manifest is malformed: {err}"),
                        crate::base::Span::synthesized(),
                    )
                    .with_source("manifest"),
                );
                None
            }
        };
        diagnostics.extend(check_capabilities(&lowered.module, manifest.as_ref()));
        if cancelled(cancel) {
            return None;
        }

        diagnostics.extend(analyze_pii(
            &lowered.module,
            &checked.context,
            self.config.enforce_pii_checks,
        ));
        if cancelled(cancel) {
            return None;
        }

        let index_record = IndexRecord::from_module(uri, &parsed.module, effects.signatures);
        let artifacts = Arc::new(DocumentArtifacts {
            uri: uri.to_string(),
            version,
            tokens: parsed.tokens,
            trivia: parsed.trivia,
            module: parsed.module,
            core: Arc::new(lowered.module),
            context: Arc::new(checked.context),
            diagnostics: Arc::new(diagnostics),
        });
        Some((artifacts, index_record))
    }

    /// Analyze a closed file: no document state, no artifact caching,
    /// but the index record is refreshed.
    fn analyze_detached(
        &mut self,
        uri: &str,
        text: &str,
        cancel: Option<&CancellationToken>,
    ) -> Option<Vec<Diagnostic>> {
        let lexicon = self.registry.active()?;
        let parsed = parse_text(text, uri, &lexicon);
        let (artifacts, record) = self.analyze_parsed(uri, 0, parsed, cancel)?;
        self.index.write().update(record);
        Some(artifacts.diagnostics.as_ref().clone())
    }
}

fn read_uri(uri: &str) -> Option<String> {
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    std::fs::read_to_string(Path::new(path)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::DiagCode;

    fn engine() -> DiagnosticsEngine {
        DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()))
    }

    #[test]
    fn test_pull_diagnostics_for_clean_document() {
        let mut engine = engine();
        engine.open_document(
            "file:///a.prose",
            "module demo.a.\nto f, produce Int:\n  return 1.\n".to_string(),
            1,
        );
        let diags = engine.diagnostics("file:///a.prose", None).unwrap();
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_phase_merge_order() {
        let mut engine = engine();
        // Lexer (L002), parser (P006), and effects (missing io) all fire.
        engine.open_document(
            "file:///b.prose",
            "module demo.b.\nto f, produce Text:\n  return Http.get(\"u\n".to_string(),
            1,
        );
        let diags = engine.diagnostics("file:///b.prose", None).unwrap();
        let codes: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert!(codes.contains(&DiagCode::L002), "{codes:?}");
        let l_pos = codes.iter().position(|c| *c == DiagCode::L002).unwrap();
        let eff_pos = codes
            .iter()
            .position(|c| *c == DiagCode::EffInferMissingIo);
        if let Some(eff_pos) = eff_pos {
            assert!(l_pos < eff_pos, "lexer diagnostics precede effect ones");
        }
    }

    #[test]
    fn test_cache_hit_until_version_changes() {
        let mut engine = engine();
        engine.open_document("file:///c.prose", "module demo.c.\n".to_string(), 1);
        let first = engine.diagnostics("file:///c.prose", None).unwrap();
        let second = engine.diagnostics("file:///c.prose", None).unwrap();
        assert!(Arc::ptr_eq(&first, &second), "expected cached list");

        engine.change_document("file:///c.prose", "module demo.c2.\n".to_string(), 2);
        let third = engine.diagnostics("file:///c.prose", None).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_cancellation_leaves_no_cache() {
        let mut engine = engine();
        engine.open_document("file:///d.prose", "module demo.d.\n".to_string(), 1);
        let token = CancellationToken::new();
        token.cancel();
        assert!(engine.diagnostics("file:///d.prose", Some(&token)).is_none());
        assert!(engine.cached_artifacts("file:///d.prose").is_none());
    }

    #[test]
    fn test_dependent_invalidation() {
        let mut engine = engine();
        engine.open_document("file:///a.prose", "module demo.a.\n".to_string(), 1);
        engine.open_document(
            "file:///b.prose",
            "module demo.b.\nimport demo.a.\nto f, produce Int:\n  return 1.\n".to_string(),
            1,
        );
        let _ = engine.diagnostics("file:///a.prose", None);
        let _ = engine.diagnostics("file:///b.prose", None);
        assert!(engine.cached_artifacts("file:///b.prose").is_some());

        // Editing demo.a drops demo.b's cache.
        engine.change_document("file:///a.prose", "module demo.a.\n\n".to_string(), 2);
        assert!(engine.cached_artifacts("file:///b.prose").is_none());
    }

    #[test]
    fn test_locale_swap_clears_caches() {
        let mut engine = engine();
        engine.open_document("file:///e.prose", "module demo.e.\n".to_string(), 1);
        let _ = engine.diagnostics("file:///e.prose", None);
        assert!(engine.cached_artifacts("file:///e.prose").is_some());

        assert!(engine.set_locale("zh-CN"));
        assert!(engine.cached_artifacts("file:///e.prose").is_none());
        assert!(!engine.set_locale("fr-FR"));
    }

    #[test]
    fn test_index_updated_on_open() {
        let mut engine = engine();
        engine.open_document(
            "file:///f.prose",
            "module demo.f.\nto f, produce Int:\n  return 1.\n".to_string(),
            1,
        );
        let _ = engine.diagnostics("file:///f.prose", None);
        let index = engine.index().read();
        assert_eq!(index.uri_of_module("demo.f"), Some("file:///f.prose"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_delete_document_removes_index_entry() {
        let mut engine = engine();
        engine.open_document("file:///g.prose", "module demo.g.\n".to_string(), 1);
        let _ = engine.diagnostics("file:///g.prose", None);
        engine.delete_document("file:///g.prose");
        assert_eq!(engine.index().read().uri_of_module("demo.g"), None);
    }

    #[test]
    fn test_malformed_manifest_warns_m002() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("manifest.json");
        std::fs::write(&manifest_path, "{ not json").unwrap();

        let mut config = Config::default();
        config.capability_manifest_path = Some(manifest_path);
        let mut engine =
            DiagnosticsEngine::new(config, Arc::new(LexiconRegistry::with_builtins()));
        engine.open_document("file:///m.prose", "module demo.m.\n".to_string(), 1);
        let diags = engine.diagnostics("file:///m.prose", None).unwrap();
        assert!(diags.iter().any(|d| d.code == DiagCode::M002), "{diags:?}");
    }

    #[test]
    fn test_health_report() {
        let mut engine = engine();
        engine.open_document("file:///h.prose", "module demo.h.\n".to_string(), 1);
        let _ = engine.diagnostics("file:///h.prose", None);
        let health = engine.health(None, None);
        assert_eq!(health.open_documents, 1);
        assert_eq!(health.index_files, 1);
        assert_eq!(health.cached_documents, 1);
    }
}
