//! Token model.

use smol_str::SmolStr;

use crate::base::{Position, Span};
use crate::lexicon::KeywordKind;

/// Placement of a comment relative to code on its line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentPlacement {
    /// Comment follows code on the same line.
    Inline,
    /// The whole line is comment/whitespace.
    Standalone,
}

/// Structured value of a comment token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTrivia {
    /// The comment including its marker.
    pub raw: SmolStr,
    /// The comment text without marker, trimmed.
    pub text: SmolStr,
    pub placement: CommentPlacement,
}

/// Token kinds on the default channel (plus `Comment` on trivia).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Lowercase or unspaced identifier.
    Ident,
    /// Capital-leading identifier.
    TypeIdent,
    /// A lexicon keyword; the primary kind per the keyword index.
    Keyword(KeywordKind),

    // Literals
    Str,
    Int,
    /// `L`-suffixed integer; the value keeps the digits as written so no
    /// precision is lost.
    Long,
    Float,

    // Structural
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    At,
    Eq,
    Arrow,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Gt,
    LtEq,
    GtEq,
    BangEq,

    // Layout
    Newline,
    Indent,
    Dedent,

    // Trivia channel
    Comment,

    Error,
    Eof,
}

impl TokenKind {
    /// Human-readable name for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::TypeIdent => "type name",
            TokenKind::Keyword(k) => k.describe(),
            TokenKind::Str => "string",
            TokenKind::Int => "integer",
            TokenKind::Long => "long integer",
            TokenKind::Float => "number",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Question => "'?'",
            TokenKind::At => "'@'",
            TokenKind::Eq => "'='",
            TokenKind::Arrow => "'->'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::LtEq => "'<='",
            TokenKind::GtEq => "'>='",
            TokenKind::BangEq => "'!='",
            TokenKind::Newline => "end of line",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::Comment => "comment",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

/// A token with kind, lexeme value, and span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: SmolStr,
    pub start: Position,
    pub end: Position,
    /// Structured comment payload when `kind == Comment`.
    pub trivia: Option<CommentTrivia>,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<SmolStr>, start: Position, end: Position) -> Self {
        Self {
            kind,
            value: value.into(),
            start,
            end,
            trivia: None,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Whether this token is the given keyword, honoring the lexicon's
    /// allowed-duplicate groups via the parser's context.
    pub fn is_keyword(&self, kind: KeywordKind) -> bool {
        self.kind == TokenKind::Keyword(kind)
    }
}
