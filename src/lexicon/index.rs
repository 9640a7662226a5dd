//! Keyword index derived from a lexicon.
//!
//! The lexer cannot know keywords at compile time (lexicons are runtime
//! data), so each lexicon is compiled into a lookup structure: an exact
//! phrase map, a multi-word phrase list sorted longest-first for
//! greedy matching, and a CJK phrase list for splitting unspaced runs.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::lexicon::WhitespaceMode;
use super::{KeywordKind, Lexicon};

/// A phrase shared by several kinds; the first registered kind is primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseEntry {
    pub kinds: Vec<KeywordKind>,
}

impl PhraseEntry {
    pub fn primary(&self) -> KeywordKind {
        self.kinds[0]
    }
}

/// Compiled lookup tables for one lexicon.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    /// Lower-cased phrase → kinds (first registered is primary).
    exact: FxHashMap<SmolStr, PhraseEntry>,
    /// Multi-word phrases as word vectors, longest first.
    multi_word: Vec<(Vec<SmolStr>, KeywordKind)>,
    /// Phrases without internal spaces, longest first in characters.
    /// Used to split keyword prefixes out of unspaced CJK runs.
    unspaced: Vec<(SmolStr, KeywordKind)>,
    /// Phrases that share a spelling outside an `allowed_duplicates`
    /// group. Empty for well-formed lexicons.
    violations: Vec<(SmolStr, Vec<KeywordKind>)>,
    whitespace_mode: WhitespaceMode,
}

impl KeywordIndex {
    pub fn build(lexicon: &Lexicon) -> Self {
        let mut exact: FxHashMap<SmolStr, PhraseEntry> = FxHashMap::default();
        let mut multi_word = Vec::new();
        let mut unspaced = Vec::new();
        let mut violations = Vec::new();

        for (kind, phrase) in &lexicon.keywords {
            let lowered = SmolStr::new(phrase.to_lowercase());
            let entry = exact
                .entry(lowered.clone())
                .or_insert_with(|| PhraseEntry { kinds: vec![] });
            if !entry.kinds.contains(kind) {
                entry.kinds.push(*kind);
            }
            if lowered.contains(' ') {
                let words: Vec<SmolStr> = lowered.split(' ').map(SmolStr::new).collect();
                if !multi_word.iter().any(|(w, _): &(Vec<SmolStr>, _)| *w == words) {
                    multi_word.push((words, *kind));
                }
            } else {
                unspaced.push((lowered, *kind));
            }
        }

        // Longest first so greedy matching prefers the most specific phrase.
        multi_word.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        unspaced.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        for (phrase, entry) in &exact {
            if entry.kinds.len() > 1 {
                let ok = entry.kinds.iter().all(|a| {
                    entry
                        .kinds
                        .iter()
                        .all(|b| lexicon.duplicates_allowed(*a, *b))
                });
                if !ok {
                    violations.push((phrase.clone(), entry.kinds.clone()));
                }
            }
        }

        Self {
            exact,
            multi_word,
            unspaced,
            violations,
            whitespace_mode: lexicon.canonicalization.whitespace_mode,
        }
    }

    /// Look up a single word or merged phrase (case-insensitive).
    pub fn lookup(&self, phrase: &str) -> Option<&PhraseEntry> {
        if phrase.chars().any(|c| c.is_ascii_uppercase()) {
            self.exact.get(phrase.to_lowercase().as_str())
        } else {
            self.exact.get(phrase)
        }
    }

    /// Multi-word phrases, longest first. The lexer walks these against
    /// upcoming identifier tokens.
    pub fn multi_word_phrases(&self) -> &[(Vec<SmolStr>, KeywordKind)] {
        &self.multi_word
    }

    /// Split the longest keyword prefix off an unspaced run. Returns the
    /// matched kind and its character length.
    pub fn match_prefix(&self, run: &str) -> Option<(KeywordKind, usize)> {
        for (phrase, kind) in &self.unspaced {
            if run.starts_with(phrase.as_str()) {
                return Some((*kind, phrase.chars().count()));
            }
        }
        None
    }

    /// Whether keyword phrases must be split out of unspaced runs.
    pub fn splits_unspaced_runs(&self) -> bool {
        matches!(
            self.whitespace_mode,
            WhitespaceMode::Chinese | WhitespaceMode::Mixed
        )
    }

    /// Phrases violating the injectivity invariant.
    pub fn violations(&self) -> &[(SmolStr, Vec<KeywordKind>)] {
        &self.violations
    }

    /// Number of distinct phrases.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{chinese, english};
    use super::*;

    #[test]
    fn test_english_index_is_injective() {
        let index = KeywordIndex::build(&english());
        assert!(index.violations().is_empty(), "{:?}", index.violations());
    }

    #[test]
    fn test_chinese_index_is_injective() {
        let index = KeywordIndex::build(&chinese());
        assert!(index.violations().is_empty(), "{:?}", index.violations());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let index = KeywordIndex::build(&english());
        assert_eq!(
            index.lookup("Return").map(|e| e.primary()),
            Some(KeywordKind::Return)
        );
        assert_eq!(
            index.lookup("return").map(|e| e.primary()),
            Some(KeywordKind::Return)
        );
    }

    #[test]
    fn test_shared_phrase_keeps_registration_order() {
        let index = KeywordIndex::build(&english());
        let entry = index.lookup("to").unwrap();
        // `To` is registered before `FuncTo` in the English table.
        assert_eq!(entry.primary(), KeywordKind::To);
        assert!(entry.kinds.contains(&KeywordKind::FuncTo));
    }

    #[test]
    fn test_multi_word_sorted_longest_first() {
        let index = KeywordIndex::build(&english());
        let phrases = index.multi_word_phrases();
        let mut last = usize::MAX;
        for (words, _) in phrases {
            assert!(words.len() <= last);
            last = words.len();
        }
    }

    #[test]
    fn test_chinese_prefix_split() {
        let index = KeywordIndex::build(&chinese());
        // 工作流 (workflow) must win over any shorter prefix.
        let (kind, len) = index.match_prefix("工作流主流程").unwrap();
        assert_eq!(kind, KeywordKind::Workflow);
        assert_eq!(len, 3);
    }
}
