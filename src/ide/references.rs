//! Find references.
//!
//! Lexer-accurate token matching across modules. Files are read and
//! lexed in small parallel batches (default 20 per batch); results
//! stream to the caller in bounded chunks with cancellation honored at
//! every chunk boundary. A file that fails to read is skipped without
//! aborting the operation.

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::canon::canonicalize;
use crate::lexer::{lex, TokenKind};
use crate::lexicon::{KeywordIndex, Lexicon};

use super::Location;

/// Files-per-batch for concurrent reads.
const READ_BATCH: usize = 20;

/// One searchable source: either text already in memory (open document)
/// or a path to read lazily.
#[derive(Debug, Clone)]
pub enum SourceFile {
    Open { uri: String, text: String },
    OnDisk { uri: String, path: std::path::PathBuf },
}

impl SourceFile {
    fn uri(&self) -> &str {
        match self {
            SourceFile::Open { uri, .. } | SourceFile::OnDisk { uri, .. } => uri,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceOptions {
    /// Max locations per emitted chunk.
    pub chunk_size: usize,
    pub include_declaration: bool,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            include_declaration: true,
        }
    }
}

/// Stream references to `name` through `on_chunk`; the callback receives
/// each bounded chunk and a running total. Returns the total number of
/// locations emitted, or `None` when cancelled (no partial guarantees
/// beyond already-emitted chunks).
pub fn collect_references(
    sources: &[SourceFile],
    name: &str,
    lexicon: &Lexicon,
    options: &ReferenceOptions,
    cancel: Option<&CancellationToken>,
    mut on_chunk: impl FnMut(Vec<Location>, usize),
) -> Option<usize> {
    let keyword_index = KeywordIndex::build(lexicon);
    let mut total = 0usize;
    let mut pending: Vec<Location> = Vec::new();

    for batch in sources.chunks(READ_BATCH) {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return None;
        }

        // Read + lex the batch concurrently; skipped files drop out.
        let batch_locations: Vec<Vec<Location>> = batch
            .par_iter()
            .filter_map(|source| {
                let (uri, text) = match source {
                    SourceFile::Open { uri, text } => (uri.clone(), text.clone()),
                    SourceFile::OnDisk { uri, path } => match std::fs::read_to_string(path) {
                        Ok(text) => (uri.clone(), text),
                        Err(err) => {
                            debug!(uri = %uri, error = %err, "reference scan skipped file");
                            return None;
                        }
                    },
                };
                Some(find_in_text(&uri, &text, name, lexicon, &keyword_index))
            })
            .collect();

        for locations in batch_locations {
            for location in locations {
                pending.push(location);
                if pending.len() >= options.chunk_size {
                    if cancel.is_some_and(|c| c.is_cancelled()) {
                        return None;
                    }
                    total += pending.len();
                    on_chunk(std::mem::take(&mut pending), total);
                }
            }
        }
    }

    if cancel.is_some_and(|c| c.is_cancelled()) {
        return None;
    }
    if !pending.is_empty() {
        total += pending.len();
        on_chunk(pending, total);
    }
    Some(total)
}

/// Token-accurate matches of `name` in one document.
fn find_in_text(
    uri: &str,
    text: &str,
    name: &str,
    lexicon: &Lexicon,
    keyword_index: &KeywordIndex,
) -> Vec<Location> {
    let canonical = canonicalize(text, lexicon);
    let out = lex(&canonical, lexicon, keyword_index);
    out.tokens
        .iter()
        .filter(|t| {
            matches!(t.kind, TokenKind::Ident | TokenKind::TypeIdent) && t.value == name
        })
        .map(|t| Location {
            uri: uri.to_string(),
            range: t.span().into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::lexicon::english;

    use super::*;

    fn open(uri: &str, text: &str) -> SourceFile {
        SourceFile::Open {
            uri: uri.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_references_across_documents() {
        let sources = vec![
            open(
                "file:///a.prose",
                "module demo.a.\nto greet, produce Int:\n  return 1.\n",
            ),
            open(
                "file:///b.prose",
                "module demo.b.\nimport demo.a.\nto f, produce Int:\n  return greet().\n",
            ),
        ];
        let mut chunks = Vec::new();
        let total = collect_references(
            &sources,
            "greet",
            &english(),
            &ReferenceOptions::default(),
            None,
            |chunk, _| chunks.push(chunk),
        )
        .unwrap();
        assert_eq!(total, 2);
        let all: Vec<_> = chunks.into_iter().flatten().collect();
        assert_eq!(all[0].uri, "file:///a.prose");
        assert_eq!(all[1].uri, "file:///b.prose");
    }

    #[test]
    fn test_chunking_respects_size() {
        let body: String = (0..25).map(|_| "  target().\n").collect();
        let sources = vec![open(
            "file:///a.prose",
            &format!("module m.\nto target, produce Int:\n  return 1.\nto f, produce Int:\n{body}  return 1.\n"),
        )];
        let mut sizes = Vec::new();
        let options = ReferenceOptions {
            chunk_size: 10,
            include_declaration: true,
        };
        let total = collect_references(
            &sources,
            "target",
            &english(),
            &options,
            None,
            |chunk, _| sizes.push(chunk.len()),
        )
        .unwrap();
        assert_eq!(total, 26);
        assert!(sizes.iter().take(sizes.len() - 1).all(|s| *s == 10));
    }

    #[test]
    fn test_cancellation_stops_between_chunks() {
        let sources = vec![open(
            "file:///a.prose",
            "module m.\nto f, produce Int:\n  x().\n  return 1.\n",
        )];
        let token = CancellationToken::new();
        token.cancel();
        let result = collect_references(
            &sources,
            "x",
            &english(),
            &ReferenceOptions::default(),
            Some(&token),
            |_, _| panic!("no chunk should be emitted after cancellation"),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let sources = vec![
            SourceFile::OnDisk {
                uri: "file:///missing.prose".to_string(),
                path: std::path::PathBuf::from("/nonexistent/missing.prose"),
            },
            open(
                "file:///a.prose",
                "module m.\nto f, produce Int:\n  let hit be 1.\n  return hit.\n",
            ),
        ];
        let total = collect_references(
            &sources,
            "hit",
            &english(),
            &ReferenceOptions::default(),
            None,
            |_, _| {},
        )
        .unwrap();
        assert_eq!(total, 2);
    }
}
