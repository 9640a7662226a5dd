//! Document highlight: occurrences of the identifier at the cursor
//! within the current file.

use crate::base::Position;
use crate::index::Range0;
use crate::lexer::{Token, TokenKind};

use super::ident_at;

/// Highlight ranges for the identifier at `position`.
pub fn document_highlight(tokens: &[Token], position: Position) -> Vec<Range0> {
    let Some(target) = ident_at(tokens, position) else {
        return vec![];
    };
    let name = target.value.clone();
    tokens
        .iter()
        .filter(|t| {
            matches!(t.kind, TokenKind::Ident | TokenKind::TypeIdent) && t.value == name
        })
        .map(|t| t.span().into())
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::canon::canonicalize;
    use crate::lexer::lex;
    use crate::lexicon::{english, KeywordIndex};

    use super::*;

    #[test]
    fn test_highlights_all_occurrences() {
        let lexicon = english();
        let index = KeywordIndex::build(&lexicon);
        let source = "to f, given x as Int, produce Int:\n  let y be x plus x.\n  return y.\n";
        let out = lex(&canonicalize(source, &lexicon), &lexicon, &index);
        // Cursor on the `x` parameter.
        let highlights = document_highlight(&out.tokens, Position::new(1, 13));
        assert_eq!(highlights.len(), 3);
        // Cursor on punctuation: nothing.
        assert!(document_highlight(&out.tokens, Position::new(1, 6)).is_empty());
    }
}
