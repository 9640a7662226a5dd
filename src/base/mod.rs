//! Foundation types shared by every layer.

mod diagnostics;
mod line_index;
mod position;

pub use diagnostics::{
    DiagCode, Diagnostic, FixIt, RelatedInfo, Severity, TextEdit,
};
pub use line_index::{LineCol, LineIndex};
pub use position::{FileId, Origin, Position, Span};
