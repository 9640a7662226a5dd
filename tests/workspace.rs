//! Workspace-level behavior: bulk indexing from disk, workspace
//! diagnostics, and snapshot persistence.

use std::sync::Arc;

use prose::base::DiagCode;
use prose::engine::DiagnosticsEngine;
use prose::lexicon::LexiconRegistry;
use prose::project::Config;
use walkdir::WalkDir;

fn write(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn index_workspace(engine: &mut DiagnosticsEngine, root: &std::path::Path) {
    let mut paths: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "prose"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    for path in paths {
        engine.index_file(&format!("file://{}", path.display()));
    }
}

#[test]
fn test_bulk_index_and_workspace_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.prose",
        "module demo.a.\nto shared, produce Int, performs io:\n  return Http.get(\"u\").\n",
    );
    write(
        dir.path(),
        "lib/b.prose",
        "module demo.b.\nimport demo.a.\nto f, produce Text:\n  return Http.get(\"u\").\n",
    );
    write(dir.path(), "notes.txt", "not a source file");

    let mut engine =
        DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));
    index_workspace(&mut engine, dir.path());

    {
        let index = engine.index().read();
        assert_eq!(index.len(), 2);
        assert_eq!(index.module_count(), 2);
        assert!(index.uri_of_module("demo.a").is_some());
    }

    // Workspace diagnostics cover every indexed module; demo.b is
    // missing its io declaration.
    let results = engine.workspace_diagnostics(None);
    assert_eq!(results.len(), 2);
    let b_diags = results
        .iter()
        .find(|(uri, _)| uri.ends_with("b.prose"))
        .map(|(_, d)| d.clone())
        .expect("diagnostics for demo.b");
    assert!(b_diags.iter().any(|d| d.code == DiagCode::EffInferMissingIo));
}

#[test]
fn test_workspace_diagnostics_respect_config_gate() {
    let mut config = Config::default();
    config.diagnostics_workspace_enabled = false;
    let mut engine =
        DiagnosticsEngine::new(config, Arc::new(LexiconRegistry::with_builtins()));
    engine.open_document("file:///a.prose", "module demo.a.\n".to_string(), 1);
    let _ = engine.diagnostics("file:///a.prose", None);
    assert!(engine.workspace_diagnostics(None).is_empty());
}

#[test]
fn test_snapshot_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.prose", "module demo.a.\nto f, produce Int:\n  return 1.\n");

    let mut config = Config::default();
    config.index_path = Some(dir.path().join(".cache/index.json"));
    {
        let mut engine = DiagnosticsEngine::new(
            config.clone(),
            Arc::new(LexiconRegistry::with_builtins()),
        )
        .with_workspace_root(dir.path().to_path_buf());
        index_workspace(&mut engine, dir.path());
        engine.persist_index();
    }

    // A fresh engine picks the snapshot up before any parse.
    let engine = DiagnosticsEngine::new(config, Arc::new(LexiconRegistry::with_builtins()))
        .with_workspace_root(dir.path().to_path_buf());
    let index = engine.index().read();
    assert_eq!(index.len(), 1);
    assert!(index.uri_of_module("demo.a").is_some());
    let record = index.iter().next().unwrap();
    assert!(record.effect_signatures.contains_key("demo.a.f"));
}
