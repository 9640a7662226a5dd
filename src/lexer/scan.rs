//! The scanner: logos raw pass plus lexicon-driven keyword recognition.

use logos::Logos;
use smol_str::SmolStr;
use text_size::TextSize;

use crate::base::{DiagCode, Diagnostic, LineIndex, Position, Span};
use crate::lexicon::{KeywordIndex, Lexicon};

use super::token::{CommentPlacement, CommentTrivia, Token, TokenKind};

/// Raw lexical classes. Keyword recognition happens in a later pass
/// because the lexicon is runtime data.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r" +")]
    Spaces,

    #[token("\n")]
    Newline,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"#[^\n]*")]
    HashComment,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,

    // A quote that never closes before end of line. The longer match
    // above wins whenever a closing quote exists.
    #[regex(r#""([^"\\\n]|\\.)*"#)]
    StrOpen,

    #[regex("「[^」\n]*」")]
    CjkStr,

    #[regex("「[^」\n]*")]
    CjkStrOpen,

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    Float,

    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    FloatExp,

    #[regex(r"[0-9]+[lL]")]
    Long,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"\p{Han}[\p{Han}_]*")]
    CjkRun,

    #[token("->")]
    Arrow,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("!=")]
    BangEq,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("?")]
    Question,
    #[token("@")]
    At,
    #[token("=")]
    Eq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
}

/// Lexer output: default-channel tokens, comment trivia, diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub trivia: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Tokenize canonical text against a lexicon.
pub fn lex(text: &str, lexicon: &Lexicon, index: &KeywordIndex) -> LexOutput {
    let line_index = LineIndex::new(text);
    let mut raw = Vec::new();
    let mut lexer = RawToken::lexer(text);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        raw.push((result, span.start as u32, lexer.slice()));
    }

    let mut out = LexOutput {
        tokens: Vec::new(),
        trivia: Vec::new(),
        diagnostics: Vec::new(),
    };

    layout_pass(&raw, text, &line_index, lexicon, index, &mut out);
    merge_keywords(index, &mut out.tokens);
    classify_idents(index, &mut out.tokens);
    out
}

/// First pass: positions, layout (Newline/Indent/Dedent), strings,
/// numbers, comments, CJK splitting, raw errors.
fn layout_pass(
    raw: &[(Result<RawToken, ()>, u32, &str)],
    text: &str,
    line_index: &LineIndex,
    lexicon: &Lexicon,
    kw_index: &KeywordIndex,
    out: &mut LexOutput,
) {
    let mut indent_stack: Vec<u32> = vec![0];
    let mut at_line_start = true;
    let mut pending_indent: u32 = 0;
    let mut line_has_code = false;

    for (result, offset, slice) in raw {
        let start = line_index.position(TextSize::new(*offset));
        let end = line_index.position(TextSize::new(offset + slice.len() as u32));
        let span = Span::new(start, end);

        let token = match result {
            Err(()) => {
                let message = lexicon.message(
                    crate::lexicon::MessageKey::UnexpectedToken,
                    &[*slice, "a token"],
                );
                out.diagnostics
                    .push(Diagnostic::new(DiagCode::L001, message, span).with_source("lexer"));
                out.tokens.push(Token::new(TokenKind::Error, *slice, start, end));
                at_line_start = false;
                line_has_code = true;
                continue;
            }
            Ok(t) => *t,
        };

        match token {
            RawToken::Spaces => {
                if at_line_start {
                    pending_indent = slice.len() as u32;
                }
            }
            RawToken::Newline => {
                out.tokens.push(Token::new(TokenKind::Newline, "\n", start, end));
                at_line_start = true;
                pending_indent = 0;
                line_has_code = false;
            }
            RawToken::LineComment | RawToken::HashComment => {
                let marker_len = if matches!(token, RawToken::HashComment) { 1 } else { 2 };
                let mut tok = Token::new(TokenKind::Comment, *slice, start, end);
                tok.trivia = Some(CommentTrivia {
                    raw: SmolStr::new(*slice),
                    text: SmolStr::new(slice[marker_len..].trim()),
                    placement: if line_has_code {
                        CommentPlacement::Inline
                    } else {
                        CommentPlacement::Standalone
                    },
                });
                out.trivia.push(tok);
                // Comment-only lines do not open or close blocks.
            }
            significant => {
                if at_line_start {
                    apply_indent(&mut indent_stack, pending_indent, start, out);
                    at_line_start = false;
                }
                line_has_code = true;
                emit_significant(significant, slice, start, end, lexicon, kw_index, out);
            }
        }
    }

    // Close open blocks at end of input.
    let eof = line_index.position(TextSize::of(text));
    while indent_stack.len() > 1 {
        indent_stack.pop();
        out.tokens.push(Token::new(TokenKind::Dedent, "", eof, eof));
    }
    out.tokens.push(Token::new(TokenKind::Eof, "", eof, eof));
}

fn apply_indent(stack: &mut Vec<u32>, width: u32, at: Position, out: &mut LexOutput) {
    let top = *stack.last().unwrap_or(&0);
    if width == top {
        return;
    }
    let span = Span::empty(at);
    if width > top {
        if width % 2 != 0 {
            out.diagnostics.push(Diagnostic::coded(DiagCode::L003, span).with_source("lexer"));
        }
        stack.push(width);
        out.tokens.push(Token::new(TokenKind::Indent, "", at, at));
        return;
    }
    while stack.len() > 1 && *stack.last().unwrap_or(&0) > width {
        stack.pop();
        out.tokens.push(Token::new(TokenKind::Dedent, "", at, at));
    }
    if *stack.last().unwrap_or(&0) != width {
        out.diagnostics.push(Diagnostic::coded(DiagCode::L004, span).with_source("lexer"));
    }
}

fn emit_significant(
    token: RawToken,
    slice: &str,
    start: Position,
    end: Position,
    lexicon: &Lexicon,
    kw_index: &KeywordIndex,
    out: &mut LexOutput,
) {
    match token {
        RawToken::Str | RawToken::CjkStr => {
            let inner = strip_quotes(slice);
            out.tokens
                .push(Token::new(TokenKind::Str, unescape(inner), start, end));
        }
        RawToken::StrOpen | RawToken::CjkStrOpen => {
            let message = lexicon.message(crate::lexicon::MessageKey::UnterminatedString, &[]);
            out.diagnostics.push(
                Diagnostic::new(DiagCode::L002, message, Span::new(start, end))
                    .with_source("lexer"),
            );
            let inner = strip_quotes(slice);
            out.tokens
                .push(Token::new(TokenKind::Str, unescape(inner), start, end));
        }
        RawToken::Float | RawToken::FloatExp => {
            out.tokens.push(Token::new(TokenKind::Float, slice, start, end));
        }
        RawToken::Long => {
            // Keep the digits as a string so 64-bit values survive.
            let digits = &slice[..slice.len() - 1];
            out.tokens.push(Token::new(TokenKind::Long, digits, start, end));
        }
        RawToken::Int => {
            out.tokens.push(Token::new(TokenKind::Int, slice, start, end));
        }
        RawToken::Ident => {
            out.tokens.push(Token::new(TokenKind::Ident, slice, start, end));
        }
        RawToken::CjkRun => {
            if kw_index.splits_unspaced_runs() {
                split_cjk_run(slice, start, kw_index, out);
            } else {
                out.tokens.push(Token::new(TokenKind::Ident, slice, start, end));
            }
        }
        RawToken::Arrow => push_plain(out, TokenKind::Arrow, slice, start, end),
        RawToken::LtEq => push_plain(out, TokenKind::LtEq, slice, start, end),
        RawToken::GtEq => push_plain(out, TokenKind::GtEq, slice, start, end),
        RawToken::BangEq => push_plain(out, TokenKind::BangEq, slice, start, end),
        RawToken::Dot => push_plain(out, TokenKind::Dot, slice, start, end),
        RawToken::Comma => push_plain(out, TokenKind::Comma, slice, start, end),
        RawToken::Colon => push_plain(out, TokenKind::Colon, slice, start, end),
        RawToken::LParen => push_plain(out, TokenKind::LParen, slice, start, end),
        RawToken::RParen => push_plain(out, TokenKind::RParen, slice, start, end),
        RawToken::LBracket => push_plain(out, TokenKind::LBracket, slice, start, end),
        RawToken::RBracket => push_plain(out, TokenKind::RBracket, slice, start, end),
        RawToken::Question => push_plain(out, TokenKind::Question, slice, start, end),
        RawToken::At => push_plain(out, TokenKind::At, slice, start, end),
        RawToken::Eq => push_plain(out, TokenKind::Eq, slice, start, end),
        RawToken::Plus => push_plain(out, TokenKind::Plus, slice, start, end),
        RawToken::Minus => push_plain(out, TokenKind::Minus, slice, start, end),
        RawToken::Star => push_plain(out, TokenKind::Star, slice, start, end),
        RawToken::Slash => push_plain(out, TokenKind::Slash, slice, start, end),
        RawToken::Lt => push_plain(out, TokenKind::Lt, slice, start, end),
        RawToken::Gt => push_plain(out, TokenKind::Gt, slice, start, end),
        RawToken::Spaces | RawToken::Newline | RawToken::LineComment | RawToken::HashComment => {}
    }
}

fn push_plain(out: &mut LexOutput, kind: TokenKind, slice: &str, start: Position, end: Position) {
    out.tokens.push(Token::new(kind, slice, start, end));
}

/// Split keyword prefixes out of an unspaced CJK run by maximal munch.
fn split_cjk_run(run: &str, start: Position, kw_index: &KeywordIndex, out: &mut LexOutput) {
    let mut col = start.column;
    let mut rest = run;
    let mut ident_buf = String::new();
    let mut ident_col = col;

    while !rest.is_empty() {
        if let Some((kind, char_len)) = kw_index.match_prefix(rest) {
            let byte_len: usize = rest.chars().take(char_len).map(|c| c.len_utf8()).sum();
            if !ident_buf.is_empty() {
                out.tokens.push(Token::new(
                    TokenKind::Ident,
                    ident_buf.as_str(),
                    Position::new(start.line, ident_col),
                    Position::new(start.line, col),
                ));
                ident_buf.clear();
            }
            let end_col = col + byte_len as u32;
            out.tokens.push(Token::new(
                TokenKind::Keyword(kind),
                &rest[..byte_len],
                Position::new(start.line, col),
                Position::new(start.line, end_col),
            ));
            col = end_col;
            rest = &rest[byte_len..];
            ident_col = col;
        } else {
            let c = match rest.chars().next() {
                Some(c) => c,
                None => break,
            };
            ident_buf.push(c);
            col += c.len_utf8() as u32;
            rest = &rest[c.len_utf8()..];
        }
    }

    if !ident_buf.is_empty() {
        out.tokens.push(Token::new(
            TokenKind::Ident,
            ident_buf.as_str(),
            Position::new(start.line, ident_col),
            Position::new(start.line, col),
        ));
    }
}

/// Merge identifier runs into multi-word keywords, and recognize
/// marker-bracketed phrases like `[wait for]`.
fn merge_keywords(index: &KeywordIndex, tokens: &mut Vec<Token>) {
    let phrases = index.multi_word_phrases();
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    'outer: while i < tokens.len() {
        let tok = &tokens[i];

        // Marker brackets force keyword interpretation.
        if tok.kind == TokenKind::LBracket {
            if let Some((kw, consumed)) = match_marker(index, tokens, i) {
                merged.push(kw);
                i += consumed;
                continue;
            }
        }

        if tok.kind == TokenKind::Ident {
            for (words, kind) in phrases {
                if words_match(tokens, i, words) {
                    let last = &tokens[i + words.len() - 1];
                    let value: String = tokens[i..i + words.len()]
                        .iter()
                        .map(|t| t.value.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    merged.push(Token::new(
                        TokenKind::Keyword(*kind),
                        value,
                        tok.start,
                        last.end,
                    ));
                    i += words.len();
                    continue 'outer;
                }
            }
        }

        merged.push(tok.clone());
        i += 1;
    }

    *tokens = merged;
}

fn words_match(tokens: &[Token], at: usize, words: &[SmolStr]) -> bool {
    if at + words.len() > tokens.len() {
        return false;
    }
    words.iter().enumerate().all(|(j, word)| {
        let t = &tokens[at + j];
        t.kind == TokenKind::Ident
            && t.start.line == tokens[at].start.line
            && t.value.eq_ignore_ascii_case(word)
    })
}

/// `[phrase]` → keyword token spanning the brackets, when the bracketed
/// words form a known phrase. Anything else (e.g. a type-parameter list)
/// is left untouched.
fn match_marker(index: &KeywordIndex, tokens: &[Token], at: usize) -> Option<(Token, usize)> {
    let mut j = at + 1;
    let mut words = Vec::new();
    while j < tokens.len() && tokens[j].kind == TokenKind::Ident {
        words.push(tokens[j].value.as_str());
        j += 1;
    }
    if words.is_empty() || j >= tokens.len() || tokens[j].kind != TokenKind::RBracket {
        return None;
    }
    let phrase = words.join(" ");
    let entry = index.lookup(&phrase)?;
    let tok = Token::new(
        TokenKind::Keyword(entry.primary()),
        phrase,
        tokens[at].start,
        tokens[j].end,
    );
    Some((tok, j - at + 1))
}

/// Classify remaining identifiers: keywords by exact phrase, then
/// capital-leading names as type identifiers.
fn classify_idents(index: &KeywordIndex, tokens: &mut [Token]) {
    for tok in tokens.iter_mut() {
        if tok.kind != TokenKind::Ident {
            continue;
        }
        if !tok.value.contains(' ') {
            if let Some(entry) = index.lookup(&tok.value) {
                tok.kind = TokenKind::Keyword(entry.primary());
                continue;
            }
        }
        if tok.value.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            tok.kind = TokenKind::TypeIdent;
        }
    }
}

/// Whether a string forms a single valid identifier (used to vet rename
/// targets before edits are produced).
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    let leading_ok = match chars.next() {
        Some(c) => unicode_ident::is_xid_start(c) || c == '_',
        None => false,
    };
    leading_ok && chars.all(|c| unicode_ident::is_xid_continue(c) || c == '_')
}

fn strip_quotes(slice: &str) -> &str {
    let mut s = slice;
    for quote in ["\"", "「"] {
        if let Some(rest) = s.strip_prefix(quote) {
            s = rest;
            break;
        }
    }
    for quote in ["\"", "」"] {
        if let Some(rest) = s.strip_suffix(quote) {
            s = rest;
            break;
        }
    }
    s
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::lexicon::{chinese, english, KeywordIndex, KeywordKind};

    use super::*;

    fn lex_en(text: &str) -> LexOutput {
        let lex = english();
        let index = KeywordIndex::build(&lex);
        super::lex(text, &lex, &index)
    }

    fn kinds(out: &LexOutput) -> Vec<TokenKind> {
        out.tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_lex_let_statement() {
        let out = lex_en("let x be 1.");
        assert_eq!(
            kinds(&out),
            vec![
                TokenKind::Keyword(KeywordKind::Let),
                TokenKind::Ident,
                TokenKind::Keyword(KeywordKind::Be),
                TokenKind::Int,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_multi_word_keyword_merged() {
        let out = lex_en("wait for download.");
        assert_eq!(out.tokens[0].kind, TokenKind::Keyword(KeywordKind::WaitFor));
        assert_eq!(out.tokens[0].value, "wait for");
        assert_eq!(out.tokens[1].kind, TokenKind::Ident);
    }

    #[test]
    fn test_longest_match_wins() {
        // "is less than" must not lex as Is + idents.
        let out = lex_en("if x is less than 3:");
        let kw: Vec<_> = out
            .tokens
            .iter()
            .filter_map(|t| match t.kind {
                TokenKind::Keyword(k) => Some(k),
                _ => None,
            })
            .collect();
        assert_eq!(kw, vec![KeywordKind::If, KeywordKind::LessThan]);
    }

    #[test]
    fn test_type_ident_classification() {
        let out = lex_en("let u be User.");
        assert_eq!(out.tokens[3].kind, TokenKind::TypeIdent);
        assert_eq!(out.tokens[3].value, "User");
    }

    #[test]
    fn test_long_literal_keeps_digits() {
        let out = lex_en("let n be 9007199254740993L.");
        let long = out.tokens.iter().find(|t| t.kind == TokenKind::Long).unwrap();
        assert_eq!(long.value, "9007199254740993");
    }

    #[test]
    fn test_float_and_int() {
        let out = lex_en("f(1, 2.5).");
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::Int));
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::Float));
    }

    #[test]
    fn test_unterminated_string_reports_l002() {
        let out = lex_en("let s be \"oops");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, DiagCode::L002);
        // Best-effort token still produced.
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::Str));
    }

    #[test]
    fn test_indent_dedent() {
        let out = lex_en("to f, produce Int:\n  return 1.\nlet y be 2.");
        let layout: Vec<_> = out
            .tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Indent | TokenKind::Dedent))
            .map(|t| t.kind)
            .collect();
        assert_eq!(layout, vec![TokenKind::Indent, TokenKind::Dedent]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_odd_indent_reports_l003() {
        let out = lex_en("to f, produce Int:\n   return 1.");
        assert!(out.diagnostics.iter().any(|d| d.code == DiagCode::L003));
    }

    #[test]
    fn test_inconsistent_dedent_reports_l004() {
        let out = lex_en("to f, produce Int:\n    return 1.\n  let x be 2.");
        assert!(out.diagnostics.iter().any(|d| d.code == DiagCode::L004));
    }

    #[test]
    fn test_comments_on_trivia_channel() {
        let out = lex_en("let x be 1. // note\n# standalone");
        assert_eq!(out.trivia.len(), 2);
        assert!(out.tokens.iter().all(|t| t.kind != TokenKind::Comment));
        let first = out.trivia[0].trivia.as_ref().unwrap();
        assert_eq!(first.text, "note");
        assert_eq!(first.placement, CommentPlacement::Inline);
        let second = out.trivia[1].trivia.as_ref().unwrap();
        assert_eq!(second.placement, CommentPlacement::Standalone);
    }

    #[test]
    fn test_unexpected_char_reports_l001() {
        let out = lex_en("let x be ~.");
        assert!(out.diagnostics.iter().any(|d| d.code == DiagCode::L001));
    }

    #[test]
    fn test_marker_bracket_forces_keyword() {
        let out = lex_en("[wait for] download.");
        assert_eq!(out.tokens[0].kind, TokenKind::Keyword(KeywordKind::WaitFor));
    }

    #[test]
    fn test_type_param_brackets_untouched() {
        let out = lex_en("to id[T], given x as T, produce T:");
        assert_eq!(out.tokens[2].kind, TokenKind::LBracket);
        assert_eq!(out.tokens[3].kind, TokenKind::TypeIdent);
        assert_eq!(out.tokens[4].kind, TokenKind::RBracket);
    }

    #[test]
    fn test_chinese_run_splitting() {
        let lex = chinese();
        let index = KeywordIndex::build(&lex);
        let out = super::lex("令年龄为30.", &lex, &index);
        let kinds: Vec<_> = out.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(KeywordKind::Let),
                TokenKind::Ident,
                TokenKind::Keyword(KeywordKind::Be),
                TokenKind::Int,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
        assert_eq!(out.tokens[1].value, "年龄");
    }
}
