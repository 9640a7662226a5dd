//! Offset ↔ line/column conversion.
//!
//! The lexer works in byte offsets; spans are 1-based line/column. The
//! editor protocol wants 0-based lines and UTF-16-agnostic columns — we
//! keep columns in characters, which matches how the canonicalizer and
//! lexer count.

use serde::{Deserialize, Serialize};
use text_size::TextSize;

use super::Position;

/// A 0-based line/character pair for the editor surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineCol {
    pub line: u32,
    pub character: u32,
}

impl From<Position> for LineCol {
    fn from(pos: Position) -> Self {
        Self {
            line: pos.line.saturating_sub(1),
            character: pos.column.saturating_sub(1),
        }
    }
}

impl From<LineCol> for Position {
    fn from(lc: LineCol) -> Self {
        Self {
            line: lc.line + 1,
            column: lc.character + 1,
        }
    }
}

/// Maps byte offsets to positions and back for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    line_starts: Vec<TextSize>,
    len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::new(0)];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(TextSize::new(i as u32 + 1));
            }
        }
        Self {
            line_starts,
            len: TextSize::of(text),
        }
    }

    /// Convert a byte offset into a 1-based position.
    ///
    /// The column counts bytes from the line start; canonical text is
    /// ASCII-normalized outside string literals and CJK identifiers, where
    /// byte columns are what the lexer records consistently on both ends.
    pub fn position(&self, offset: TextSize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = u32::from(offset) - u32::from(self.line_starts[line]);
        Position::new(line as u32 + 1, col + 1)
    }

    /// Convert a 1-based position back into a byte offset.
    pub fn offset(&self, pos: Position) -> Option<TextSize> {
        let line = pos.line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(line)?;
        Some(start + TextSize::new(pos.column.saturating_sub(1)))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
