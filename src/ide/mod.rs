//! Editor-facing services.
//!
//! Every request consumes cached parse/typecheck artifacts where
//! available; streaming operations (references, rename) work in bounded
//! chunks and honor cancellation at chunk boundaries.

mod code_actions;
mod goto;
mod highlight;
mod hover;
mod inlay_hints;
mod references;
mod rename;
mod semantic_tokens;
mod symbols;

pub use code_actions::{code_actions, CodeAction, ManifestGrant};
pub use goto::definition;
pub use highlight::document_highlight;
pub use hover::{hover, HoverResult};
pub use inlay_hints::{inlay_hints, InlayHint, InlayHintKind};
pub use references::{collect_references, ReferenceOptions, SourceFile};
pub use rename::{prepare_rename, rename, PrepareRename, WorkspaceEdit};
pub use semantic_tokens::{semantic_tokens, SemanticToken, TokenModifier, TokenType, LEGEND};
pub use symbols::{document_symbols, workspace_symbols, DocumentSymbol, SymbolInfo};

use crate::base::Position;
use crate::index::Range0;
use crate::lexer::{Token, TokenKind};

/// A location on the editor surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub uri: String,
    pub range: Range0,
}

/// The identifier token at a position (keywords excluded).
pub(crate) fn ident_at(tokens: &[Token], position: Position) -> Option<&Token> {
    tokens.iter().find(|t| {
        matches!(t.kind, TokenKind::Ident | TokenKind::TypeIdent) && t.span().contains(position)
    })
}
