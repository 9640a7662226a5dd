//! Lexing: canonical text → token stream with spans.
//!
//! The raw character scan is a logos-generated tokenizer; a second pass
//! merges identifier sequences into lexicon keywords (longest match),
//! splits keyword prefixes out of unspaced CJK runs, classifies
//! capital-leading identifiers, and derives Indent/Dedent tokens from
//! line leads. Comments ride a trivia channel and never reach the parser.

mod scan;
mod token;
mod translate;

pub use scan::{is_identifier, lex, LexOutput};
pub use token::{CommentPlacement, CommentTrivia, Token, TokenKind};
pub use translate::{needs_keyword_translation, translate_tokens};
