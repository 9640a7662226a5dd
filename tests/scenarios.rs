//! End-to-end scenarios through the full pipeline.

use std::sync::Arc;

use prose::analysis::CapabilityManifest;
use prose::base::{DiagCode, Span};
use prose::engine::DiagnosticsEngine;
use prose::ide;
use prose::lexicon::{english, LexiconRegistry};
use prose::project::Config;

fn engine() -> DiagnosticsEngine {
    DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()))
}

fn engine_with(config: Config) -> DiagnosticsEngine {
    DiagnosticsEngine::new(config, Arc::new(LexiconRegistry::with_builtins()))
}

/// A function whose body calls `Http.get` without declaring
/// IO gets `EFF_INFER_MISSING_IO` at the header plus an add-effect
/// action.
#[test]
fn missing_effect_end_to_end() {
    let mut engine = engine();
    engine.open_document(
        "file:///a.prose",
        "module demo.a.\nto greet, produce Text:\n  return Http.get(\"https://example.com\").\n"
            .to_string(),
        1,
    );
    let artifacts = engine.artifacts_for("file:///a.prose", None).unwrap();
    let diag = artifacts
        .diagnostics
        .iter()
        .find(|d| d.code == DiagCode::EffInferMissingIo)
        .expect("EFF_INFER_MISSING_IO");
    // At the function header span.
    assert_eq!(diag.span.start.line, 2);

    let actions = ide::code_actions(
        &artifacts,
        Span::from_coords(1, 1, 99, 1),
        &artifacts.diagnostics,
    );
    assert!(actions
        .iter()
        .any(|a| a.title == "Add It performs IO to 'greet'"));
}

/// A pure function declared `performs io` warns and offers
/// removal.
#[test]
fn redundant_effect_end_to_end() {
    let mut engine = engine();
    engine.open_document(
        "file:///b.prose",
        "module demo.b.\nto pureish, produce Int, performs io:\n  return 1.\n".to_string(),
        1,
    );
    let artifacts = engine.artifacts_for("file:///b.prose", None).unwrap();
    let diag = artifacts
        .diagnostics
        .iter()
        .find(|d| d.code == DiagCode::EffInferRedundantIo)
        .expect("EFF_INFER_REDUNDANT_IO");
    assert!(!diag.severity.is_error());
    assert!(diag.fix_its[0].title.contains("Remove It performs IO"));
}

/// A PII parameter flowing into `Http.post` without consent.
#[test]
fn pii_to_http_end_to_end() {
    let mut engine = engine();
    engine.open_document(
        "file:///c.prose",
        "module demo.c.\nto notify, given email as @pii(L2, email) Text, produce Text, performs io with Http:\n  Http.post(email).\n  return \"sent\".\n"
            .to_string(),
        1,
    );
    let artifacts = engine.artifacts_for("file:///c.prose", None).unwrap();
    let codes: Vec<_> = artifacts.diagnostics.iter().map(|d| d.code).collect();
    assert!(codes.contains(&DiagCode::PiiHttpUnencrypted), "{codes:?}");
    assert!(codes.contains(&DiagCode::PiiMissingConsentCheck), "{codes:?}");

    let actions = ide::code_actions(
        &artifacts,
        Span::from_coords(1, 1, 99, 1),
        &artifacts.diagnostics,
    );
    assert!(actions.iter().any(|a| a.title.contains("redact")));
    assert!(actions.iter().any(|a| a.title.contains("@consent_required")));
}

/// A manifest `{allow:{io:[]}}` blocks `Http.get`; both grant
/// actions are offered.
#[test]
fn manifest_gate_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("manifest.json");
    std::fs::write(&manifest_path, r#"{ "allow": { "io": [] } }"#).unwrap();

    let mut config = Config::default();
    config.capability_manifest_path = Some(manifest_path);
    let mut engine = engine_with(config);
    engine.open_document(
        "file:///d.prose",
        "module demo.capdemo.\nto hello, produce Text, performs io:\n  return Http.get(\"u\").\n"
            .to_string(),
        1,
    );
    let artifacts = engine.artifacts_for("file:///d.prose", None).unwrap();
    assert!(artifacts
        .diagnostics
        .iter()
        .any(|d| d.code == DiagCode::CapabilityNotAllowed));

    let actions = ide::code_actions(
        &artifacts,
        Span::from_coords(1, 1, 99, 1),
        &artifacts.diagnostics,
    );
    let titles: Vec<&str> = actions.iter().map(|a| a.title.as_str()).collect();
    assert!(titles.contains(&"Allow IO for demo.capdemo.hello in manifest"));
    assert!(titles.contains(&"Allow IO for demo.capdemo.* in manifest"));
}

/// `SomeJava.add(1, 1.0)` warns with literal-disambiguation
/// actions.
#[test]
fn numeric_interop_end_to_end() {
    let mut engine = engine();
    engine.open_document(
        "file:///e.prose",
        "module demo.e.\nto f, produce Int:\n  SomeJava.add(1, 1.0).\n  return 1.\n".to_string(),
        1,
    );
    let artifacts = engine.artifacts_for("file:///e.prose", None).unwrap();
    assert!(artifacts
        .diagnostics
        .iter()
        .any(|d| d.code == DiagCode::AmbiguousInteropNumeric));

    let actions = ide::code_actions(
        &artifacts,
        Span::from_coords(1, 1, 99, 1),
        &artifacts.diagnostics,
    );
    let titles: Vec<&str> = actions.iter().map(|a| a.title.as_str()).collect();
    assert!(titles.contains(&"Replace 1 with 1L"), "{titles:?}");
    assert!(titles.contains(&"Replace 1 with 1.0"), "{titles:?}");
}

/// Renaming `greet` in module A edits both A and the dotted
/// reference in B.
#[test]
fn cross_module_rename_end_to_end() {
    let a = "module demo.a.\nto greet, produce Text:\n  return \"hi\".\n";
    let b = "module demo.b.\nimport demo.a.\nto f, produce Text:\n  return a.greet().\n";
    let sources = vec![
        ide::SourceFile::Open {
            uri: "file:///a.prose".to_string(),
            text: a.to_string(),
        },
        ide::SourceFile::Open {
            uri: "file:///b.prose".to_string(),
            text: b.to_string(),
        },
    ];
    let edit = ide::rename(&sources, "greet", "greet2", &english(), 200, None).unwrap();
    assert_eq!(edit.changes.len(), 2);
    assert_eq!(edit.changes["file:///a.prose"].len(), 1);
    assert_eq!(edit.changes["file:///b.prose"].len(), 1);
}

/// Manifest wildcard coverage accepts the gated call.
#[test]
fn manifest_wildcard_suppresses_gate() {
    let manifest =
        CapabilityManifest::parse(r#"{ "allow": { "io": ["demo.capdemo.*"] } }"#).unwrap();
    assert!(manifest.allows("io", "demo.capdemo", "hello"));
}
