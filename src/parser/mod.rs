//! Recursive-descent parser: tokens → AST.
//!
//! The parser dispatches on semantic keyword kinds, so it serves every
//! lexicon; phrases shared between kinds (English `to` for both the
//! function header and the assignment target) are reinterpreted through
//! the lexicon's allowed-duplicate groups. Errors recover at the next
//! statement terminator and downstream passes still run against the
//! best-effort AST.

mod decls;
mod exprs;
mod infer;
mod stmts;
mod types;

pub use infer::infer_field_type;

use smol_str::SmolStr;

use crate::base::{DiagCode, Diagnostic, FixIt, Position, Span, TextEdit};
use crate::lexer::{Token, TokenKind};
use crate::lexicon::{KeywordKind, Lexicon};
use crate::syntax::ast::Module;

/// Parse result: the best-effort module plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    pub fn ok(&self) -> bool {
        self.diagnostics.iter().all(|d| !d.severity.is_error())
    }
}

/// Parse a token stream into a module.
///
/// `file_hint` feeds the quick-fix for a missing module header: the
/// suggested name derives from the file stem.
pub fn parse(tokens: &[Token], lexicon: &Lexicon, file_hint: Option<&str>) -> ParseResult {
    if tokens.is_empty() {
        return ParseResult {
            module: Module {
                name: None,
                decls: vec![],
                span: Span::synthesized(),
            },
            diagnostics: vec![],
        };
    }
    let mut parser = Parser::new(tokens, lexicon);
    let module = parser.parse_module(file_hint);
    ParseResult {
        module,
        diagnostics: parser.diagnostics,
    }
}

pub(crate) struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    pub(crate) lexicon: &'a Lexicon,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Type/effect parameters of the function being parsed.
    pub(crate) type_params: Vec<SmolStr>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], lexicon: &'a Lexicon) -> Self {
        Self {
            tokens,
            pos: 0,
            lexicon,
            diagnostics: Vec::new(),
            type_params: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Cursor primitives. Newlines are transparent except where layout
    // matters (blocks consume Indent/Dedent explicitly).
    // ------------------------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        let mut i = self.pos;
        while i < self.tokens.len() && self.tokens[i].kind == TokenKind::Newline {
            i += 1;
        }
        &self.tokens[i.min(self.tokens.len() - 1)]
    }

    /// Peek the nth significant token after the current one.
    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let mut i = self.pos;
        let mut seen = 0;
        loop {
            if i >= self.tokens.len() {
                return &self.tokens[self.tokens.len() - 1];
            }
            if self.tokens[i].kind != TokenKind::Newline {
                if seen == n {
                    return &self.tokens[i];
                }
                seen += 1;
            }
            i += 1;
        }
    }

    /// Peek without skipping layout tokens, for inline-vs-block decisions.
    pub(crate) fn peek_raw(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn bump(&mut self) -> Token {
        while self.pos < self.tokens.len() && self.tokens[self.pos].kind == TokenKind::Newline {
            self.pos += 1;
        }
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn bump_raw(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Keyword check honoring the lexicon's allowed-duplicate groups: a
    /// token lexed as the group's primary kind answers for any kind in
    /// its group.
    pub(crate) fn at_kw(&self, kind: KeywordKind) -> bool {
        match self.peek().kind {
            TokenKind::Keyword(k) => k == kind || self.lexicon.duplicates_allowed(k, kind),
            _ => false,
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    pub(crate) fn eat_kw(&mut self, kind: KeywordKind) -> Option<Token> {
        if self.at_kw(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            return Some(self.bump());
        }
        self.unexpected(kind.describe());
        None
    }

    pub(crate) fn expect_kw(&mut self, kind: KeywordKind) -> Option<Token> {
        if self.at_kw(kind) {
            return Some(self.bump());
        }
        self.unexpected(kind.describe());
        None
    }

    /// Statement-end punctuation with a `P006` fix-it when absent.
    pub(crate) fn expect_statement_end(&mut self) {
        if self.eat(TokenKind::Dot).is_some() {
            return;
        }
        let at = self.prev_end();
        let message = self
            .lexicon
            .message(crate::lexicon::MessageKey::MissingStatementEnd, &[]);
        self.diagnostics.push(
            Diagnostic::new(DiagCode::P006, message, Span::empty(at))
                .with_source("parser")
                .with_fix(FixIt::new(
                    "Insert '.'",
                    vec![TextEdit::insert(at, ".")],
                )),
        );
    }

    /// End position of the last consumed token.
    pub(crate) fn prev_end(&self) -> Position {
        let mut i = self.pos;
        while i > 0 {
            i -= 1;
            if !matches!(
                self.tokens[i].kind,
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
            ) {
                return self.tokens[i].end;
            }
        }
        self.tokens[0].start
    }

    pub(crate) fn unexpected(&mut self, expected: &str) {
        let tok = self.peek().clone();
        let message = self.lexicon.message(
            crate::lexicon::MessageKey::UnexpectedToken,
            &[tok.kind.describe(), expected],
        );
        self.diagnostics
            .push(Diagnostic::new(DiagCode::P002, message, tok.span()).with_source("parser"));
    }

    pub(crate) fn error_at(&mut self, code: DiagCode, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::new(code, message, span).with_source("parser"));
    }

    /// Recover to the next statement boundary: past the next `.`, or to
    /// a layout edge.
    pub(crate) fn recover_to_statement_end(&mut self) {
        loop {
            match self.peek_raw().kind {
                TokenKind::Dot => {
                    self.bump_raw();
                    return;
                }
                TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof => return,
                _ => {
                    self.bump_raw();
                }
            }
        }
    }

    /// The phrase for a keyword in this parser's lexicon, for building
    /// messages and fix-it text.
    pub(crate) fn phrase(&self, kind: KeywordKind) -> &str {
        self.lexicon
            .phrase(kind)
            .map(|s| s.as_str())
            .unwrap_or(kind.describe())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::canon::canonicalize;
    use crate::lexer::lex;
    use crate::lexicon::{english, KeywordIndex, Lexicon};

    use super::ParseResult;

    /// Canonicalize, lex, and parse an English source snippet.
    pub fn parse_en(source: &str) -> ParseResult {
        parse_with(source, &english())
    }

    pub fn parse_with(source: &str, lexicon: &Lexicon) -> ParseResult {
        let canonical = canonicalize(source, lexicon);
        let index = KeywordIndex::build(lexicon);
        let out = lex(&canonical, lexicon, &index);
        super::parse(&out.tokens, lexicon, Some("demo"))
    }
}
