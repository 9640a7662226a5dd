//! Source canonicalization.
//!
//! Transforms raw source into the deterministic form the lexer consumes.
//! Pure and idempotent: `canonicalize(canonicalize(x)) == canonicalize(x)`.
//! Canonicalization never fails; malformed sequences are preserved for the
//! lexer to diagnose (an unterminated string still canonicalizes, and the
//! lexer later reports `L002`).
//!
//! All operations apply **outside** string literals; a lexeme between a
//! matched pair of string quotes (with backslash escapes) is copied
//! verbatim.

use regex::Regex;
use smol_str::SmolStr;

use crate::lexicon::Lexicon;

/// A comment captured during canonicalization when trivia retention is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSpan {
    /// 1-based line.
    pub line: u32,
    /// 1-based column of the comment marker.
    pub col_start: u32,
    /// 1-based column one past the comment end.
    pub col_end: u32,
    /// The comment including its marker.
    pub raw: String,
    /// The comment text without marker, trimmed.
    pub text: String,
    /// True when the whole line was comment/whitespace.
    pub standalone: bool,
}

/// Canonical text plus retained comment trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonResult {
    pub text: String,
    pub comments: Vec<CommentSpan>,
}

/// Canonicalize, dropping comments (newlines preserved).
pub fn canonicalize(text: &str, lexicon: &Lexicon) -> String {
    run(text, lexicon, false).text
}

/// Canonicalize, retaining comments on a trivia side-channel.
pub fn canonicalize_with_comments(text: &str, lexicon: &Lexicon) -> CanonResult {
    run(text, lexicon, true)
}

/// One line split into string-protected and transformable parts.
enum Segment {
    Code(String),
    Str(String),
}

fn run(text: &str, lexicon: &Lexicon, keep_comments: bool) -> CanonResult {
    // 1. Line endings: CR and CRLF become LF.
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let multi_word = multi_word_rewrites(lexicon);
    let article_re = article_regex(lexicon);

    let mut out_lines: Vec<String> = Vec::new();
    let mut comments = Vec::new();

    for (line_no, line) in text.split('\n').enumerate() {
        let (segments, comment) = split_line(line, lexicon);
        if let Some(c) = comment {
            if keep_comments {
                comments.push(CommentSpan {
                    line: line_no as u32 + 1,
                    ..c
                });
            }
        }

        let mut rendered = String::new();
        for segment in segments {
            match segment {
                Segment::Str(s) => rendered.push_str(&s),
                Segment::Code(code) => {
                    let mut code = code;
                    if lexicon.canonicalization.remove_articles {
                        if let Some(re) = &article_re {
                            code = re.replace_all(&code, "").into_owned();
                        }
                    }
                    for (re, replacement) in &multi_word {
                        code = re.replace_all(&code, replacement.as_str()).into_owned();
                    }
                    for (_, re, replacement) in &lexicon.canonicalization.custom_rules {
                        code = re.replace_all(&code, replacement.as_str()).into_owned();
                    }
                    rendered.push_str(&code);
                }
            }
        }

        let rendered = normalize_spacing(&rendered);
        out_lines.push(rendered.trim_end().to_string());
    }

    // Collapse runs of blank lines to a single blank.
    let mut collapsed: Vec<String> = Vec::new();
    for line in out_lines {
        if line.is_empty() && collapsed.last().is_some_and(|l| l.is_empty()) {
            continue;
        }
        collapsed.push(line);
    }

    CanonResult {
        text: collapsed.join("\n"),
        comments,
    }
}

/// Scan one line into code/string segments, applying the char-level
/// transforms (tabs, smart quotes, full-width folding) to code parts and
/// stripping any trailing comment.
fn split_line(line: &str, lexicon: &Lexicon) -> (Vec<Segment>, Option<CommentSpan>) {
    let full_width = lexicon.canonicalization.full_width_to_half;
    let open = first_char(&lexicon.punctuation.string_open);
    let close = first_char(&lexicon.punctuation.string_close);

    let mut segments = Vec::new();
    let mut code = String::new();
    let mut comment = None;

    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut significant_seen = false;
    while i < chars.len() {
        let c = chars[i];

        // Comment to end of line: `//…` or `#…`.
        let is_comment = c == '#' || (c == '/' && chars.get(i + 1) == Some(&'/'));
        if is_comment {
            let raw: String = chars[i..].iter().collect();
            let marker_len = if c == '#' { 1 } else { 2 };
            comment = Some(CommentSpan {
                line: 0,
                col_start: i as u32 + 1,
                col_end: chars.len() as u32 + 1,
                text: raw[marker_len..].trim().to_string(),
                raw,
                standalone: !significant_seen,
            });
            break;
        }

        // String literal: copied verbatim through the closing quote.
        if let Some(expected_close) = string_opener(c, open, close) {
            significant_seen = true;
            if !code.is_empty() {
                segments.push(Segment::Code(std::mem::take(&mut code)));
            }
            let mut s = String::new();
            // Smart openers straighten; lexicon quotes stay.
            s.push(straighten(c));
            i += 1;
            while i < chars.len() {
                let sc = chars[i];
                if sc == '\\' && i + 1 < chars.len() {
                    s.push(sc);
                    s.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if sc == expected_close || (expected_close == '\u{201D}' && sc == '"') {
                    s.push(straighten(sc));
                    i += 1;
                    break;
                }
                s.push(sc);
                i += 1;
            }
            segments.push(Segment::Str(s));
            continue;
        }

        // Char-level code transforms.
        let mut mapped = c;
        if c == '\t' {
            code.push_str("  ");
            i += 1;
            continue;
        }
        if is_smart_quote(c) {
            mapped = straighten(c);
        } else if full_width {
            mapped = fold_full_width(c);
        }
        if !mapped.is_whitespace() {
            significant_seen = true;
        }
        code.push(mapped);
        i += 1;
    }

    if !code.is_empty() {
        segments.push(Segment::Code(code));
    }
    (segments, comment)
}

/// Which closer a string opened by `c` expects, if `c` opens one.
fn string_opener(c: char, lexicon_open: char, lexicon_close: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        '\u{201C}' => Some('\u{201D}'), // “ … ”
        _ if c == lexicon_open => Some(lexicon_close),
        _ => None,
    }
}

fn is_smart_quote(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
}

fn straighten(c: char) -> char {
    match c {
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2018}' | '\u{2019}' => '\'',
        other => other,
    }
}

/// Fold a full-width character to its half-width equivalent.
fn fold_full_width(c: char) -> char {
    match c {
        // Full-width ASCII block.
        '\u{FF01}'..='\u{FF5E}' => {
            char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
        }
        '\u{3000}' => ' ',          // ideographic space
        '\u{3002}' => '.',          // 。
        '\u{3001}' => ',',          // 、
        other => other,
    }
}

fn first_char(s: &SmolStr) -> char {
    s.chars().next().unwrap_or('"')
}

/// Remove space before closing punctuation; collapse internal runs of
/// spaces. Leading indentation is preserved — the lexer derives block
/// structure from it.
fn normalize_spacing(line: &str) -> String {
    let indent_len = line.len() - line.trim_start_matches(' ').len();
    let (indent, rest) = line.split_at(indent_len);

    let mut out = String::with_capacity(line.len());
    out.push_str(indent);
    let mut last_space = false;
    for c in rest.chars() {
        if c == ' ' {
            last_space = true;
            continue;
        }
        if last_space && !matches!(c, '.' | ',' | ':' | ';' | '!' | '?') {
            out.push(' ');
        }
        last_space = false;
        out.push(c);
    }
    if last_space {
        out.push(' ');
    }
    out
}

/// Compiled rewrites lowering multi-word keyword phrases.
fn multi_word_rewrites(lexicon: &Lexicon) -> Vec<(Regex, String)> {
    let mut phrases: Vec<&str> = lexicon
        .keywords
        .values()
        .map(|p| p.as_str())
        .filter(|p| p.contains(' '))
        .collect();
    phrases.sort_by(|a, b| b.len().cmp(&a.len()));
    phrases.dedup();

    phrases
        .into_iter()
        .filter_map(|phrase| {
            let words: Vec<String> = phrase.split(' ').map(|w| regex::escape(w)).collect();
            let pattern = format!(r"(?i)\b{}\b", words.join(r"\s+"));
            Regex::new(&pattern).ok().map(|re| (re, phrase.to_string()))
        })
        .collect()
}

fn article_regex(lexicon: &Lexicon) -> Option<Regex> {
    if lexicon.canonicalization.articles.is_empty() {
        return None;
    }
    let words: Vec<String> = lexicon
        .canonicalization
        .articles
        .iter()
        .map(|a| regex::escape(a))
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b ?", words.join("|"))).ok()
}

#[cfg(test)]
mod tests {
    use crate::lexicon::{chinese, english};

    use super::*;

    #[test]
    fn test_idempotent() {
        let lex = english();
        let sources = [
            "module demo.app.\nto greet, produce Text:\n  return \"hi\".\n",
            "Let the total be 3.\tSet x to 4.",
            "define User with name as Text, age as Int.\n\n\n\nreturn none.",
            "let s be \u{201C}smart\u{201D}. // trailing",
        ];
        for src in sources {
            let once = canonicalize(src, &lex);
            let twice = canonicalize(&once, &lex);
            assert_eq!(once, twice, "not idempotent for {src:?}");
        }
    }

    #[test]
    fn test_line_endings_and_tabs() {
        let lex = english();
        let out = canonicalize("a\r\nb\rc\td", &lex);
        // "a" is an article and was removed, leaving the first line blank.
        assert_eq!(out, "\nb\nc  d");
    }

    #[test]
    fn test_articles_removed_outside_strings() {
        let lex = english();
        let out = canonicalize("let x be the \"a value of the thing\".", &lex);
        assert_eq!(out, "let x be \"a value of the thing\".");
    }

    #[test]
    fn test_smart_quotes_straightened() {
        let lex = english();
        let out = canonicalize("let s be \u{201C}hello\u{201D}.", &lex);
        assert_eq!(out, "let s be \"hello\".");
    }

    #[test]
    fn test_multi_word_keywords_lowercased() {
        let lex = english();
        let out = canonicalize("Wait For download.", &lex);
        assert_eq!(out, "wait for download.");
    }

    #[test]
    fn test_comments_stripped_lines_stable() {
        let lex = english();
        let out = canonicalize("let x be 1. // note\n# standalone\nreturn x.", &lex);
        assert_eq!(out, "let x be 1.\n\nreturn x.");
    }

    #[test]
    fn test_comment_trivia_retained() {
        let lex = english();
        let result = canonicalize_with_comments("let x be 1. // note\n# standalone", &lex);
        assert_eq!(result.comments.len(), 2);
        assert_eq!(result.comments[0].text, "note");
        assert!(!result.comments[0].standalone);
        assert!(result.comments[1].standalone);
        assert_eq!(result.comments[1].line, 2);
    }

    #[test]
    fn test_full_width_folding() {
        let lex = chinese();
        let out = canonicalize("令ｘ为１２３。", &lex);
        assert_eq!(out, "令x为123.");
    }

    #[test]
    fn test_unterminated_string_preserved() {
        let lex = english();
        let out = canonicalize("let s be \"oops", &lex);
        assert_eq!(out, "let s be \"oops");
    }

    #[test]
    fn test_space_before_punctuation_removed() {
        let lex = english();
        let out = canonicalize("return x .", &lex);
        assert_eq!(out, "return x.");
    }

    #[test]
    fn test_blank_runs_collapse() {
        let lex = english();
        let out = canonicalize("x.\n\n\n\ny.", &lex);
        assert_eq!(out, "x.\n\ny.");
    }
}
