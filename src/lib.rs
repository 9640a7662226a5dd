//! # prose-core
//!
//! Core library for multilingual controlled-natural-language parsing,
//! Core IR lowering, and static analysis.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide       → editor services (hover, goto-def, references, rename, tokens)
//!   ↓
//! engine    → diagnostics engine, salsa database, analysis host
//!   ↓
//! analysis  → type checker, effect inference, capabilities, PII taint
//!   ↓
//! index     → module index, import resolution, snapshot persistence
//!   ↓
//! ir        → Core IR with origins, AST → Core lowering
//!   ↓
//! syntax    → AST types, pretty printer
//!   ↓
//! parser    → recursive-descent parser, field-type inference
//!   ↓
//! lexer     → token model, scanner, keyword translator
//!   ↓
//! canon     → source canonicalizer
//!   ↓
//! lexicon   → per-language keyword tables, keyword index, registry
//!   ↓
//! project   → configuration, file watcher, task scheduler
//!   ↓
//! base      → primitives (Position, Span, Origin, FileId, diagnostics)
//! ```

/// Foundation types: Position, Span, Origin, FileId, LineIndex, diagnostics
pub mod base;

/// Lexicons: keyword tables per natural language, keyword index, registry
pub mod lexicon;

/// Canonicalizer: raw source → deterministic text for the lexer
pub mod canon;

/// Lexer: logos raw scan, keyword recognition, indentation, translation
pub mod lexer;

/// Syntax: AST types with spans, pretty printer
pub mod syntax;

/// Parser: recursive-descent parser with recovery and fix-its
pub mod parser;

/// Core IR: origin-annotated IR and AST → Core lowering
pub mod ir;

/// Static analysis: types, checker, effects, capabilities, PII taint
pub mod analysis;

/// Module index: per-file records, module map, snapshot persistence
pub mod index;

/// Engine: salsa database, diagnostics pipeline and caches
pub mod engine;

/// IDE features: definitions, references, rename, hover, tokens, actions
pub mod ide;

/// Project management: configuration, watcher, bounded task queue
pub mod project;

// Re-export foundation types
pub use base::{
    Diagnostic, DiagCode, FileId, LineCol, LineIndex, Origin, Position, Severity, Span,
};
pub use lexicon::{KeywordKind, Lexicon, LexiconRegistry};
