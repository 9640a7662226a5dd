//! Semantic tokens with a fixed legend.

use crate::engine::DocumentArtifacts;
use crate::lexer::TokenKind;

/// Token types, in legend order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Namespace,
    Type,
    Function,
    Parameter,
    Variable,
    Keyword,
    String,
    Number,
    Operator,
    Comment,
}

impl TokenType {
    pub fn legend_index(self) -> u32 {
        match self {
            TokenType::Namespace => 0,
            TokenType::Type => 1,
            TokenType::Function => 2,
            TokenType::Parameter => 3,
            TokenType::Variable => 4,
            TokenType::Keyword => 5,
            TokenType::String => 6,
            TokenType::Number => 7,
            TokenType::Operator => 8,
            TokenType::Comment => 9,
        }
    }
}

/// Modifier bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenModifier {
    Declaration = 1,
    Readonly = 2,
}

/// The legend advertised at initialize; fixed for the session.
pub const LEGEND: (&[&str], &[&str]) = (
    &[
        "namespace",
        "type",
        "function",
        "parameter",
        "variable",
        "keyword",
        "string",
        "number",
        "operator",
        "comment",
    ],
    &["declaration", "readonly"],
);

/// One LSP-encoded semantic token (delta form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticToken {
    pub delta_line: u32,
    pub delta_start: u32,
    pub length: u32,
    pub token_type: u32,
    pub token_modifiers: u32,
}

/// Classify every token of a document against the legend.
pub fn semantic_tokens(artifacts: &DocumentArtifacts) -> Vec<SemanticToken> {
    let mut classified: Vec<(u32, u32, u32, TokenType, u32)> = Vec::new();

    let func_names: Vec<&str> = artifacts
        .context
        .funcs
        .keys()
        .map(|k| k.as_str())
        .collect();
    let param_names: Vec<&str> = artifacts
        .context
        .funcs
        .values()
        .flat_map(|sig| sig.params.iter().map(|(n, _)| n.as_str()))
        .collect();

    for token in artifacts.tokens.iter() {
        let ty = match token.kind {
            TokenKind::Keyword(_) => Some(TokenType::Keyword),
            TokenKind::TypeIdent => Some(TokenType::Type),
            TokenKind::Str => Some(TokenType::String),
            TokenKind::Int | TokenKind::Long | TokenKind::Float => Some(TokenType::Number),
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq
            | TokenKind::BangEq
            | TokenKind::Eq
            | TokenKind::Arrow => Some(TokenType::Operator),
            TokenKind::Ident => {
                let name = token.value.as_str();
                if name.contains('.') || artifacts.module.name.as_ref().is_some_and(|m| m.text == name)
                {
                    Some(TokenType::Namespace)
                } else if func_names.contains(&name) {
                    Some(TokenType::Function)
                } else if param_names.contains(&name) {
                    Some(TokenType::Parameter)
                } else {
                    Some(TokenType::Variable)
                }
            }
            _ => None,
        };
        if let Some(ty) = ty {
            let modifiers = if ty == TokenType::Function
                && artifacts
                    .context
                    .funcs
                    .get(token.value.as_str())
                    .is_some_and(|sig| sig.name_origin.span == token.span())
            {
                TokenModifier::Declaration as u32
            } else {
                0
            };
            classified.push((
                token.start.line - 1,
                token.start.column - 1,
                (token.end.column - token.start.column).max(1),
                ty,
                modifiers,
            ));
        }
    }

    // Comments ride the trivia channel.
    for token in artifacts.trivia.iter() {
        classified.push((
            token.start.line - 1,
            token.start.column - 1,
            (token.end.column - token.start.column).max(1),
            TokenType::Comment,
            0,
        ));
    }

    classified.sort_by_key(|(line, col, ..)| (*line, *col));

    // Delta-encode.
    let mut out = Vec::with_capacity(classified.len());
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;
    for (line, start, length, ty, modifiers) in classified {
        let delta_line = line - prev_line;
        let delta_start = if delta_line == 0 {
            start - prev_start
        } else {
            start
        };
        out.push(SemanticToken {
            delta_line,
            delta_start,
            length,
            token_type: ty.legend_index(),
            token_modifiers: modifiers,
        });
        prev_line = line;
        prev_start = start;
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::engine::DiagnosticsEngine;
    use crate::lexicon::LexiconRegistry;
    use crate::project::Config;

    use super::*;

    fn tokens_for(source: &str) -> Vec<SemanticToken> {
        let mut engine =
            DiagnosticsEngine::new(Config::default(), Arc::new(LexiconRegistry::with_builtins()));
        engine.open_document("file:///t.prose", source.to_string(), 1);
        let artifacts = engine.artifacts_for("file:///t.prose", None).unwrap();
        semantic_tokens(&artifacts)
    }

    #[test]
    fn test_legend_sizes() {
        assert_eq!(LEGEND.0.len(), 10);
        assert_eq!(LEGEND.1.len(), 2);
    }

    #[test]
    fn test_classification_covers_kinds() {
        let tokens = tokens_for(
            "module m.\nto f, given x as Int, produce Int: // note\n  return x plus 1.\n",
        );
        let types: Vec<u32> = tokens.iter().map(|t| t.token_type).collect();
        assert!(types.contains(&TokenType::Keyword.legend_index()));
        assert!(types.contains(&TokenType::Parameter.legend_index()));
        assert!(types.contains(&TokenType::Number.legend_index()));
        assert!(types.contains(&TokenType::Comment.legend_index()));
    }

    #[test]
    fn test_delta_encoding_monotone() {
        let tokens = tokens_for("module m.\nto f, produce Int:\n  return 1.\n");
        // First token starts at the document origin.
        assert_eq!(tokens[0].delta_line, 0);
        // Every token on a new line resets delta_start to an absolute
        // column; same-line tokens advance.
        for token in &tokens {
            assert!(token.length >= 1);
        }
    }

    #[test]
    fn test_function_declaration_modifier() {
        let tokens = tokens_for("module m.\nto f, produce Int:\n  return f().\n");
        let declared: Vec<_> = tokens
            .iter()
            .filter(|t| t.token_modifiers & (TokenModifier::Declaration as u32) != 0)
            .collect();
        assert_eq!(declared.len(), 1);
    }
}
