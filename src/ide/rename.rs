//! Rename, with precise prepare.

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::base::Position;
use crate::index::Range0;
use crate::lexer::{is_identifier, Token, TokenKind};
use crate::lexicon::Lexicon;

use super::references::{collect_references, ReferenceOptions, SourceFile};

/// Result of `prepareRename`: the exact identifier range and the current
/// text as placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareRename {
    pub range: Range0,
    pub placeholder: String,
}

/// Edits grouped per document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceEdit {
    pub changes: FxHashMap<String, Vec<(Range0, String)>>,
}

impl WorkspaceEdit {
    pub fn edit_count(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }
}

/// Validate the rename position. Keywords, literals, and punctuation
/// are not renameable.
pub fn prepare_rename(tokens: &[Token], position: Position) -> Option<PrepareRename> {
    let token = tokens.iter().find(|t| {
        matches!(t.kind, TokenKind::Ident | TokenKind::TypeIdent) && t.span().contains(position)
    })?;
    Some(PrepareRename {
        range: token.span().into(),
        placeholder: token.value.to_string(),
    })
}

/// Produce rename edits for every reference, chunked like the reference
/// scan. Returns `None` on cancellation or when the new name is not a
/// valid identifier — a rejected rename applies no edits.
pub fn rename(
    sources: &[SourceFile],
    old_name: &str,
    new_name: &str,
    lexicon: &Lexicon,
    chunk_size: usize,
    cancel: Option<&CancellationToken>,
) -> Option<WorkspaceEdit> {
    if !is_identifier(new_name) {
        return None;
    }
    let mut edit = WorkspaceEdit::default();
    let options = ReferenceOptions {
        chunk_size,
        include_declaration: true,
    };
    collect_references(sources, old_name, lexicon, &options, cancel, |chunk, _| {
        for location in chunk {
            edit.changes
                .entry(location.uri)
                .or_default()
                .push((location.range, new_name.to_string()));
        }
    })?;
    Some(edit)
}

#[cfg(test)]
mod tests {
    use crate::canon::canonicalize;
    use crate::lexer::lex;
    use crate::lexicon::{english, KeywordIndex};

    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let lexicon = english();
        let index = KeywordIndex::build(&lexicon);
        lex(&canonicalize(source, &lexicon), &lexicon, &index).tokens
    }

    #[test]
    fn test_prepare_rename_on_identifier() {
        let toks = tokens("let count be 1.");
        let prepared = prepare_rename(&toks, Position::new(1, 6)).expect("prepare");
        assert_eq!(prepared.placeholder, "count");
        assert_eq!(prepared.range.start.character, 4);
    }

    #[test]
    fn test_prepare_rename_rejects_keyword_and_literal() {
        let toks = tokens("let count be 1.");
        // On `let`.
        assert!(prepare_rename(&toks, Position::new(1, 2)).is_none());
        // On the literal.
        assert!(prepare_rename(&toks, Position::new(1, 14)).is_none());
    }

    #[test]
    fn test_cross_module_rename_scenario() {
        let sources = vec![
            SourceFile::Open {
                uri: "file:///a.prose".to_string(),
                text: "module demo.a.\nto greet, produce Int:\n  return 1.\n".to_string(),
            },
            SourceFile::Open {
                uri: "file:///b.prose".to_string(),
                text: "module demo.b.\nimport demo.a.\nto f, produce Int:\n  return a.greet().\n"
                    .to_string(),
            },
        ];
        let edit = rename(&sources, "greet", "greet2", &english(), 200, None).unwrap();
        assert_eq!(edit.edit_count(), 2);
        assert!(edit.changes.contains_key("file:///a.prose"));
        // The dotted reference in B is renamed too.
        assert!(edit.changes.contains_key("file:///b.prose"));
    }

    #[test]
    fn test_invalid_new_name_rejected() {
        let sources = vec![SourceFile::Open {
            uri: "file:///a.prose".to_string(),
            text: "module m.\nto greet, produce Int:\n  return 1.\n".to_string(),
        }];
        assert!(rename(&sources, "greet", "not a name", &english(), 200, None).is_none());
        assert!(rename(&sources, "greet", "9lives", &english(), 200, None).is_none());
    }

    #[test]
    fn test_cancelled_rename_produces_no_edit() {
        let sources = vec![SourceFile::Open {
            uri: "file:///a.prose".to_string(),
            text: "module m.\nto greet, produce Int:\n  return 1.\n".to_string(),
        }];
        let token = CancellationToken::new();
        token.cancel();
        assert!(rename(&sources, "greet", "hi", &english(), 200, Some(&token)).is_none());
    }
}
