//! The immutable per-language lexicon record.

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::type_rules::TypeInferenceRule;
use super::KeywordKind;

/// Text direction of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

/// How word boundaries behave during canonicalization and lexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitespaceMode {
    /// Words are whitespace-separated.
    English,
    /// No whitespace between words; keyword matching is per-character.
    Chinese,
    /// Both conventions appear in one document.
    Mixed,
}

/// Punctuation configuration for one language surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Punctuation {
    pub statement_end: SmolStr,
    pub list_separator: SmolStr,
    pub enum_separator: SmolStr,
    pub block_start: SmolStr,
    pub string_open: SmolStr,
    pub string_close: SmolStr,
    pub marker_open: SmolStr,
    pub marker_close: SmolStr,
}

/// Canonicalization configuration.
#[derive(Debug, Clone)]
pub struct Canonicalization {
    pub full_width_to_half: bool,
    pub whitespace_mode: WhitespaceMode,
    pub remove_articles: bool,
    pub articles: Vec<SmolStr>,
    /// Groups of keyword kinds that may share one phrase.
    pub allowed_duplicates: Vec<Vec<KeywordKind>>,
    /// Named regex → replacement rules, applied last.
    pub custom_rules: Vec<(SmolStr, regex::Regex, SmolStr)>,
}

/// Keys for templated diagnostic messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    MissingStatementEnd,
    MissingModuleHeader,
    UnexpectedToken,
    UnterminatedString,
    UnknownCapability,
}

/// An immutable per-language surface definition.
///
/// Created once at startup; the registry hands out shared references.
#[derive(Debug, Clone)]
pub struct Lexicon {
    /// BCP-47 tag, e.g. "en-US".
    pub id: SmolStr,
    pub name: SmolStr,
    pub direction: Direction,
    /// Keyword kind → the phrase of this language. Insertion order is the
    /// order duplicate phrases resolve in (first registered wins).
    pub keywords: IndexMap<KeywordKind, SmolStr>,
    pub punctuation: Punctuation,
    pub canonicalization: Canonicalization,
    /// Templated messages; `{0}`, `{1}` substitute arguments.
    pub messages: IndexMap<MessageKey, SmolStr>,
    /// Ordered field-type inference rules: base rules plus this
    /// language's overlay, highest priority first after sorting.
    pub type_inference_rules: Vec<TypeInferenceRule>,
}

impl Lexicon {
    /// The phrase for a keyword kind. Lexicons built by this crate cover
    /// the full closed set, so missing entries only arise for hand-built
    /// test lexicons.
    pub fn phrase(&self, kind: KeywordKind) -> Option<&SmolStr> {
        self.keywords.get(&kind)
    }

    /// Whether two kinds are allowed to share one phrase.
    pub fn duplicates_allowed(&self, a: KeywordKind, b: KeywordKind) -> bool {
        if a == b {
            return true;
        }
        self.canonicalization
            .allowed_duplicates
            .iter()
            .any(|group| group.contains(&a) && group.contains(&b))
    }

    /// Render a message template with positional arguments.
    pub fn message(&self, key: MessageKey, args: &[&str]) -> String {
        let template = self
            .messages
            .get(&key)
            .map(|s| s.as_str())
            .unwrap_or("{0}");
        let mut out = template.to_string();
        for (i, arg) in args.iter().enumerate() {
            out = out.replace(&format!("{{{i}}}"), arg);
        }
        out
    }
}
