//! Position tracking for AST and Core IR nodes.
//!
//! Stores the source location (line/column) of nodes for diagnostics and
//! editor features like hover, go-to-definition, and rename.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A position in source code (1-based line and column).
///
/// The editor surface converts to 0-based [`crate::base::LineCol`] at the
/// protocol boundary; everything internal stays 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// The first position of a document.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

/// A span representing a range in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Create a span from line/column coordinates.
    pub fn from_coords(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    /// A zero-width span at a position.
    pub fn empty(at: Position) -> Self {
        Self { start: at, end: at }
    }

    /// A zero-width span at the document start, for synthesized nodes.
    pub fn synthesized() -> Self {
        Self::empty(Position::start())
    }

    /// Check if a position falls within this span.
    pub fn contains(&self, position: Position) -> bool {
        if position.line < self.start.line || position.line > self.end.line {
            return false;
        }
        if position.line == self.start.line && position.column < self.start.column {
            return false;
        }
        if position.line == self.end.line && position.column > self.end.column {
            return false;
        }
        true
    }

    /// The smallest span covering both `self` and `other`.
    pub fn cover(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Provenance for a Core IR node: a span plus an optional file identity.
///
/// Every Core node carries an `Origin` so diagnostics produced by late
/// passes still point at the source that introduced the construct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub span: Span,
    pub file: Option<SmolStr>,
}

impl Origin {
    pub fn new(span: Span, file: Option<SmolStr>) -> Self {
        Self { span, file }
    }

    /// Origin for a synthesized constant with no source counterpart.
    pub fn synthesized() -> Self {
        Self {
            span: Span::synthesized(),
            file: None,
        }
    }
}

impl From<Span> for Origin {
    fn from(span: Span) -> Self {
        Self { span, file: None }
    }
}

/// Identity of a file inside a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}
