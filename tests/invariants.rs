//! The quantified invariants every release must hold.

use std::sync::Arc;

use once_cell::sync::Lazy;
use prose::analysis::{check_module, infer_effects, is_pii_tainted};
use prose::base::DiagCode;
use prose::canon::canonicalize;
use prose::engine::{parse_text, DiagnosticsEngine};
use prose::ir::lower_module;
use prose::lexicon::{chinese, english, KeywordIndex, Lexicon, LexiconRegistry};
use prose::project::Config;
use prose::syntax::print_module;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

/// Shared lexicon fixture; building one per assertion would recompile
/// the type-inference regexes for every case.
static ENGLISH: Lazy<Lexicon> = Lazy::new(english);

const CORPUS: &[&str] = &[
    "module demo.app.\nto greet, given who as Text, produce Text:\n  return who.\n",
    "define User with name as Text required, age as Int between 1 and 150.",
    "Let the total be 3.\tSet x to 4.",
    "to f, produce Int:\n  if x is less than 3:\n    return 0.\n  return 1.\n",
    "let s be \u{201C}smart quotes\u{201D}. // with a comment",
    "module m.\n\n\n\nto f, produce Int:\n  return 1.\n",
    "",
];

/// 1. Canonicalization is idempotent for all sources.
#[test]
fn invariant_canonicalize_idempotent() {
    for lexicon in [english(), chinese()] {
        for source in CORPUS {
            let once = canonicalize(source, &lexicon);
            let twice = canonicalize(&once, &lexicon);
            assert_eq!(once, twice, "lexicon {} source {source:?}", lexicon.id);
        }
    }
}

/// 2. Keyword phrases are uniquely recoverable; only allowed-duplicate
/// groups share a phrase.
#[test]
fn invariant_keyword_index_injective() {
    for lexicon in [english(), chinese()] {
        let index = KeywordIndex::build(&lexicon);
        assert!(
            index.violations().is_empty(),
            "lexicon {}: {:?}",
            lexicon.id,
            index.violations()
        );
    }
}

/// 3. Print → reparse yields an equivalent AST modulo spans (checked as
/// print-stability: print ∘ parse ∘ print is the identity on output).
#[test]
fn invariant_print_reparse_stable() {
    let programs = [
        "module shop.\ndefine User with name as Text required, age as Int between 1 and 150.\ndefine Color as one of Red, Green, Blue.\nto greet, given who as Text, produce Text, performs io with Http:\n  let msg be \"hi\".\n  return msg.\n",
        "module flow.\nto run, produce Int, performs io:\n  workflow:\n    step fetch:\n      Http.get(\"u\").\n    step store, depends on fetch:\n      Db.insert(\"row\").\n      compensate:\n        Db.delete(\"row\").\n    retry max attempts 3 backoff linear.\n    timeout within 30000.\n  return 1.\n",
        "module pats.\nto f, given r as result of Int or Text, produce Int:\n  match r:\n    when ok value:\n      return value.\n    when err e:\n      return 0.\n",
    ];
    let lexicon = &*ENGLISH;
    for program in programs {
        let first = parse_text(program, "file:///t.prose", lexicon);
        assert!(
            first.diagnostics.iter().all(|d| !d.severity.is_error()),
            "{:?}",
            first.diagnostics
        );
        let printed = print_module(&first.module);
        let second = parse_text(&printed, "file:///t.prose", lexicon);
        let reprinted = print_module(&second.module);
        assert_eq!(printed, reprinted, "program {program:?}");
    }
}

/// 4. `required ⊆ inferred`, and fully-declared functions produce no
/// missing-effect diagnostics.
#[test]
fn invariant_effect_sets() {
    let lexicon = &*ENGLISH;
    let sources = [
        "module m.\nto a, produce Int, performs io:\n  return Http.get(\"u\").\nto b, produce Int:\n  return a().\n",
        "module m.\nto fetch, produce Text, performs io:\n  return Http.get(\"u\").\nto caller, produce Text, performs io:\n  return fetch().\n",
    ];
    for source in sources {
        let parsed = parse_text(source, "file:///t.prose", lexicon);
        let lowered = lower_module(&parsed.module, None);
        let outcome = infer_effects(&lowered.module, None);
        for sig in outcome.signatures.values() {
            assert!(
                sig.required_set().is_subset(sig.inferred_set()),
                "required ⊄ inferred for {}",
                sig.qualified_name
            );
        }
    }
    // Declared ⊇ inferred ⇒ no missing-effect diagnostics.
    let parsed = parse_text(
        "module m.\nto fetch, produce Text, performs io:\n  return Http.get(\"u\").\n",
        "file:///t.prose",
        lexicon,
    );
    let lowered = lower_module(&parsed.module, None);
    let outcome = infer_effects(&lowered.module, None);
    assert!(outcome.diagnostics.iter().all(|d| !matches!(
        d.code,
        DiagCode::EffInferMissingIo | DiagCode::EffInferMissingCpu
    )));
}

/// 5. Taint seeding: untainted environments stay clean; a let from a
/// tainted value taints its binding.
#[test]
fn invariant_taint_facts() {
    let lexicon = &*ENGLISH;
    let parsed = parse_text(
        "module m.\nto f, given email as @pii(L2, email) Text and plain as Text, produce Text:\n  let copy be email.\n  return copy.\n",
        "file:///t.prose",
        lexicon,
    );
    let lowered = lower_module(&parsed.module, None);
    let checked = check_module(&lowered.module);

    let func = &lowered.module.funcs[0];
    let body = func.body.as_ref().unwrap();

    // Clean env: no expression is tainted.
    let clean: FxHashMap<SmolStr, bool> = FxHashMap::default();
    if let prose::ir::CoreStmt::Let { value, .. } = &body[0] {
        assert!(!is_pii_tainted(value, &clean, &checked.context));
    } else {
        panic!("expected let");
    }

    // Env with the PII parameter: the let's RHS is tainted.
    let mut tainted: FxHashMap<SmolStr, bool> = FxHashMap::default();
    tainted.insert(SmolStr::new("email"), true);
    if let prose::ir::CoreStmt::Let { value, .. } = &body[0] {
        assert!(is_pii_tainted(value, &tainted, &checked.context));
    }
}

/// 6. `CAPABILITY_NOT_ALLOWED` fires iff the manifest does not cover the
/// function's inferred capability use.
#[test]
fn invariant_manifest_gating() {
    use prose::analysis::{check_capabilities, CapabilityManifest};

    let lexicon = &*ENGLISH;
    let parsed = parse_text(
        "module demo.m.\nto hello, produce Text, performs io:\n  return Http.get(\"u\").\n",
        "file:///t.prose",
        lexicon,
    );
    let lowered = lower_module(&parsed.module, None);

    let closed = CapabilityManifest::parse(r#"{ "allow": { "io": [] } }"#).unwrap();
    let diags = check_capabilities(&lowered.module, Some(&closed));
    assert!(diags.iter().any(|d| d.code == DiagCode::CapabilityNotAllowed));

    let open = CapabilityManifest::parse(r#"{ "allow": { "io": ["demo.m.hello"] } }"#).unwrap();
    let diags = check_capabilities(&lowered.module, Some(&open));
    assert!(!diags.iter().any(|d| d.code == DiagCode::CapabilityNotAllowed));

    // No manifest means no restrictions.
    let diags = check_capabilities(&lowered.module, None);
    assert!(!diags.iter().any(|d| d.code == DiagCode::CapabilityNotAllowed));
}

/// 7. Index consistency: after any open/change/save/delete sequence the
/// module map contains exactly the surviving modules.
#[test]
fn invariant_index_consistency() {
    let mut engine =
        DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));

    engine.open_document("file:///a.prose", "module demo.a.\n".to_string(), 1);
    engine.open_document("file:///b.prose", "module demo.b.\n".to_string(), 1);
    let _ = engine.diagnostics("file:///a.prose", None);
    let _ = engine.diagnostics("file:///b.prose", None);
    assert_eq!(engine.index().read().module_count(), 2);

    // Rename demo.b's module by editing.
    engine.change_document("file:///b.prose", "module demo.c.\n".to_string(), 2);
    let _ = engine.diagnostics("file:///b.prose", None);
    {
        let index = engine.index().read();
        assert_eq!(index.uri_of_module("demo.c"), Some("file:///b.prose"));
        assert_eq!(index.uri_of_module("demo.b"), None);
    }

    // Delete a file: its module disappears.
    engine.delete_document("file:///a.prose");
    {
        let index = engine.index().read();
        assert_eq!(index.uri_of_module("demo.a"), None);
        assert_eq!(index.module_count(), 1);
    }
}

/// 8. A cancelled request leaves no mutation in diagnostic caches.
#[test]
fn invariant_cancellation_clean() {
    let mut engine =
        DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));
    engine.open_document("file:///a.prose", "module demo.a.\n".to_string(), 1);

    let token = CancellationToken::new();
    token.cancel();
    assert!(engine.diagnostics("file:///a.prose", Some(&token)).is_none());
    assert!(engine.cached_artifacts("file:///a.prose").is_none());

    // The same request without cancellation computes and caches.
    assert!(engine.diagnostics("file:///a.prose", None).is_some());
    assert!(engine.cached_artifacts("file:///a.prose").is_some());
}
