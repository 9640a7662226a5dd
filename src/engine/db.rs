//! Salsa database definition and the tracked parse query.
//!
//! Parsing (canonicalize → lex → translate → parse) is memoized per
//! `FileText` input; editing a document updates the input and the query
//! recomputes on demand. Later phases are cached by the diagnostics
//! engine's version-keyed caches instead.

use std::sync::Arc;

use crate::base::{Diagnostic, FileId};
use crate::canon::canonicalize_with_comments;
use crate::lexer::{lex, needs_keyword_translation, translate_tokens, Token};
use crate::lexicon::{chinese, english, KeywordIndex, Lexicon};
use crate::parser::parse;
use crate::syntax::ast::Module;

// ============================================================================
// INPUTS
// ============================================================================

/// Input: one document's identity, text, and lexicon.
///
/// Set when a document is opened; updated on change.
#[salsa::input]
pub struct FileText {
    pub file: FileId,
    #[return_ref]
    pub uri: String,
    #[return_ref]
    pub text: String,
    #[return_ref]
    pub lexicon_id: String,
}

// ============================================================================
// DATABASE
// ============================================================================

/// The root Salsa database.
///
/// Queries are memoized and invalidated automatically when their inputs
/// change.
#[salsa::db]
#[derive(Default, Clone)]
pub struct RootDatabase {
    storage: salsa::Storage<Self>,
}

#[salsa::db]
impl salsa::Database for RootDatabase {
    fn salsa_event(&self, _event: &dyn Fn() -> salsa::Event) {}
}

impl RootDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// TRACKED QUERIES
// ============================================================================

/// Result of the front half of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedDocument {
    /// Canonicalizer/lexer/parser diagnostics, in phase order.
    pub diagnostics: Vec<Diagnostic>,
    /// Default-channel tokens (post keyword translation).
    pub tokens: Arc<Vec<Token>>,
    /// Comment trivia tokens.
    pub trivia: Arc<Vec<Token>>,
    pub module: Arc<Module>,
}

// Manual Eq impl for Salsa tracking; Module carries f64 literals.
impl Eq for ParsedDocument {}

/// The lexicon for a document id; built-in lexicons only — documents in
/// custom lexicons bypass the salsa path.
fn builtin_lexicon(id: &str) -> Lexicon {
    match id {
        "zh-CN" => chinese(),
        _ => english(),
    }
}

/// Canonicalize, lex, translate, and parse a document.
#[salsa::tracked]
pub fn parse_document(db: &dyn salsa::Database, file_text: FileText) -> ParsedDocument {
    let text = file_text.text(db);
    let uri = file_text.uri(db);
    let lexicon = builtin_lexicon(file_text.lexicon_id(db));
    parse_text(text, uri, &lexicon)
}

/// The same pipeline without memoization, for custom lexicons and for
/// workspace files that are not open documents.
pub fn parse_text(text: &str, uri: &str, lexicon: &Lexicon) -> ParsedDocument {
    let canonical = canonicalize_with_comments(text, lexicon);
    let keyword_index = KeywordIndex::build(lexicon);
    let mut lexed = lex(&canonical.text, lexicon, &keyword_index);

    // Comment trivia from the canonicalizer joins the lexer's channel.
    for comment in &canonical.comments {
        let start = crate::base::Position::new(comment.line, comment.col_start);
        let end = crate::base::Position::new(comment.line, comment.col_end);
        let mut token = Token::new(crate::lexer::TokenKind::Comment, comment.raw.as_str(), start, end);
        token.trivia = Some(crate::lexer::CommentTrivia {
            raw: comment.raw.as_str().into(),
            text: comment.text.as_str().into(),
            placement: if comment.standalone {
                crate::lexer::CommentPlacement::Standalone
            } else {
                crate::lexer::CommentPlacement::Inline
            },
        });
        lexed.trivia.push(token);
    }

    let english_lexicon = english();
    let tokens = if needs_keyword_translation(lexicon, &english_lexicon) {
        translate_tokens(&lexed.tokens, lexicon, &english_lexicon)
    } else {
        lexed.tokens
    };

    let parsed = parse(&tokens, lexicon, Some(uri));

    let mut diagnostics = lexed.diagnostics;
    diagnostics.extend(parsed.diagnostics);
    ParsedDocument {
        diagnostics,
        tokens: Arc::new(tokens),
        trivia: Arc::new(lexed.trivia),
        module: Arc::new(parsed.module),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let _db = RootDatabase::new();
    }

    #[test]
    fn test_tracked_parse_query() {
        let db = RootDatabase::new();
        let file_text = FileText::new(
            &db,
            FileId::new(0),
            "file:///demo.prose".to_string(),
            "module m.\nto f, produce Int:\n  return 1.\n".to_string(),
            "en-US".to_string(),
        );
        let parsed = parse_document(&db, file_text);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        assert_eq!(parsed.module.decls.len(), 1);
    }

    #[test]
    fn test_memoization_returns_equal_results() {
        let db = RootDatabase::new();
        let file_text = FileText::new(
            &db,
            FileId::new(0),
            "file:///demo.prose".to_string(),
            "module m.\n".to_string(),
            "en-US".to_string(),
        );
        let first = parse_document(&db, file_text);
        let second = parse_document(&db, file_text);
        assert_eq!(first, second);
    }

    #[test]
    fn test_chinese_documents_translate_to_canonical_tokens() {
        let db = RootDatabase::new();
        let file_text = FileText::new(
            &db,
            FileId::new(0),
            "file:///zh.prose".to_string(),
            "模块 demo.zh。\n".to_string(),
            "zh-CN".to_string(),
        );
        let parsed = parse_document(&db, file_text);
        assert_eq!(
            parsed.module.name.as_ref().map(|n| n.text.as_str()),
            Some("demo.zh")
        );
    }
}
