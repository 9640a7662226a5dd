//! Per-natural-language surface definitions.
//!
//! A [`Lexicon`] maps the closed set of semantic [`KeywordKind`]s to the
//! phrases of one natural language, together with punctuation,
//! canonicalization rules, diagnostic message templates, and field-type
//! inference rules. Lexicons are immutable once built; the
//! [`LexiconRegistry`] is the process-wide service that owns them.

mod chinese;
mod english;
mod index;
mod keyword;
mod registry;
#[allow(clippy::module_inception)]
mod lexicon;
mod type_rules;

pub use english::english;
pub use chinese::chinese;
pub use index::KeywordIndex;
pub use keyword::KeywordKind;
pub use lexicon::{
    Canonicalization, Direction, Lexicon, MessageKey, Punctuation, WhitespaceMode,
};
pub use registry::LexiconRegistry;
pub use type_rules::{base_type_rules, InferredType, TypeInferenceRule};
