//! Type expression parsing.

use smol_str::SmolStr;

use crate::base::{DiagCode, Span};
use crate::lexer::TokenKind;
use crate::lexicon::KeywordKind as K;
use crate::syntax::ast::*;

use super::Parser;

impl Parser<'_> {
    pub(crate) fn parse_type(&mut self) -> Option<TypeExpr> {
        // `@pii(Level, category) BaseType`
        if self.at(TokenKind::At) {
            return self.parse_pii_type();
        }
        let mut ty = self.parse_base_type()?;
        // Postfix `?` promotes to Maybe.
        while self.at(TokenKind::Question) {
            let q = self.bump();
            let span = ty.span().cover(q.span());
            ty = TypeExpr::Maybe {
                inner: Box::new(ty),
                span,
            };
        }
        Some(ty)
    }

    fn parse_pii_type(&mut self) -> Option<TypeExpr> {
        let at = self.bump();
        let marker = match self.peek().kind {
            TokenKind::Ident if self.peek().value == "pii" => self.bump(),
            _ => {
                self.unexpected("'pii'");
                return None;
            }
        };
        self.expect(TokenKind::LParen)?;
        let level_tok = match self.peek().kind {
            TokenKind::TypeIdent | TokenKind::Ident => self.bump(),
            _ => {
                self.unexpected("a PII level (L1, L2, L3)");
                return None;
            }
        };
        let level = match PiiLevel::parse(&level_tok.value) {
            Some(l) => l,
            None => {
                self.error_at(
                    DiagCode::P004,
                    format!("unknown PII level '{}'", level_tok.value),
                    level_tok.span(),
                );
                PiiLevel::L1
            }
        };
        self.expect(TokenKind::Comma)?;
        let cat_tok = match self.peek().kind {
            TokenKind::Ident | TokenKind::TypeIdent => self.bump(),
            _ => {
                self.unexpected("a PII category");
                return None;
            }
        };
        let category = match PiiCategory::parse(&cat_tok.value) {
            Some(c) => c,
            None => {
                self.error_at(
                    DiagCode::P004,
                    format!("unknown PII category '{}'", cat_tok.value),
                    cat_tok.span(),
                );
                PiiCategory::Name
            }
        };
        self.expect(TokenKind::RParen)?;
        let base = self.parse_type()?;
        let span = at.span().cover(base.span());
        let _ = marker;
        Some(TypeExpr::Pii {
            base: Box::new(base),
            level,
            category,
            span,
        })
    }

    fn parse_base_type(&mut self) -> Option<TypeExpr> {
        if self.at_kw(K::Maybe) {
            let kw = self.bump();
            let inner = self.parse_base_type()?;
            let span = kw.span().cover(inner.span());
            return Some(TypeExpr::Maybe {
                inner: Box::new(inner),
                span,
            });
        }
        if self.at_kw(K::OptionOf) {
            let kw = self.bump();
            let inner = self.parse_base_type()?;
            let span = kw.span().cover(inner.span());
            return Some(TypeExpr::Option {
                inner: Box::new(inner),
                span,
            });
        }
        if self.at_kw(K::ResultOf) {
            let kw = self.bump();
            let ok = self.parse_base_type()?;
            let err = if self.at_kw(K::Or) || self.at_kw(K::And) {
                self.bump();
                self.parse_base_type().map(Box::new)
            } else {
                None
            };
            let end = err
                .as_ref()
                .map(|e| e.span())
                .unwrap_or_else(|| ok.span());
            return Some(TypeExpr::Result {
                ok: Box::new(ok),
                err,
                span: kw.span().cover(end),
            });
        }
        if self.at_kw(K::ListOf) {
            let kw = self.bump();
            let elem = self.parse_base_type()?;
            let span = kw.span().cover(elem.span());
            return Some(TypeExpr::List {
                elem: Box::new(elem),
                span,
            });
        }
        if self.at_kw(K::MapOf) {
            let kw = self.bump();
            let key = self.parse_base_type()?;
            self.expect_kw(K::To)?;
            let value = self.parse_base_type()?;
            let span = kw.span().cover(value.span());
            return Some(TypeExpr::Map {
                key: Box::new(key),
                value: Box::new(value),
                span,
            });
        }

        // Primitive keywords.
        for (kw, name) in [
            (K::TextTy, "Text"),
            (K::IntTy, "Int"),
            (K::FloatTy, "Float"),
            (K::BoolTy, "Bool"),
        ] {
            if self.at_kw(kw) {
                let tok = self.bump();
                return Some(TypeExpr::Name {
                    text: SmolStr::new(name),
                    span: tok.span(),
                });
            }
        }

        // `(given Int and Text, produce Int, performs io)`
        if self.at(TokenKind::LParen) {
            return self.parse_func_type();
        }

        match self.peek().kind {
            TokenKind::TypeIdent => {
                let tok = self.bump();
                if self.type_params.iter().any(|p| *p == tok.value) {
                    return Some(TypeExpr::Var {
                        name: tok.value.clone(),
                        span: tok.span(),
                    });
                }
                // Type application: `Pair of Int and Text`.
                if self.at_kw(K::Of) {
                    self.bump();
                    let mut args = Vec::new();
                    loop {
                        match self.parse_base_type() {
                            Some(arg) => args.push(arg),
                            None => break,
                        }
                        if self.eat_kw(K::And).is_some() {
                            continue;
                        }
                        break;
                    }
                    let span = tok
                        .span()
                        .cover(args.last().map(|a| a.span()).unwrap_or(tok.span()));
                    return Some(TypeExpr::App {
                        base: tok.value.clone(),
                        args,
                        span,
                    });
                }
                Some(TypeExpr::Name {
                    text: tok.value.clone(),
                    span: tok.span(),
                })
            }
            TokenKind::Ident => {
                let tok = self.bump();
                if self.type_params.iter().any(|p| *p == tok.value) {
                    return Some(TypeExpr::Var {
                        name: tok.value.clone(),
                        span: tok.span(),
                    });
                }
                // Unspaced-script type names carry no case distinction.
                Some(TypeExpr::Name {
                    text: tok.value.clone(),
                    span: tok.span(),
                })
            }
            _ => {
                self.unexpected("a type");
                None
            }
        }
    }

    fn parse_func_type(&mut self) -> Option<TypeExpr> {
        let open = self.bump();
        let mut params = Vec::new();
        if self.at_kw(K::FuncGiven) {
            self.bump();
            loop {
                match self.parse_type() {
                    Some(ty) => params.push(ty),
                    None => break,
                }
                if self.eat_kw(K::And).is_some() {
                    continue;
                }
                if self.at(TokenKind::Comma)
                    && !matches!(
                        self.peek_nth(1).kind,
                        TokenKind::Keyword(K::FuncProduce) | TokenKind::Keyword(K::FuncPerforms)
                    )
                {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.eat(TokenKind::Comma);
        self.expect_kw(K::FuncProduce)?;
        let ret = self.parse_type()?;

        let mut effects = Vec::new();
        let mut caps = Vec::new();
        if self.eat(TokenKind::Comma).is_some() {
            if let Some(perf) = self.eat_kw(K::FuncPerforms) {
                let clause = self.parse_effect_clause(perf.span());
                effects = clause.0.into_iter().map(|e| e.name).collect();
                caps = clause.1.into_iter().map(|c| c.0).collect();
            }
        }
        self.expect(TokenKind::RParen);
        let span = open.span().cover(Span::empty(self.prev_end()));
        Some(TypeExpr::Func {
            params,
            ret: Box::new(ret),
            effects,
            caps,
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse_en;
    use crate::syntax::ast::*;

    fn param_type(ty: &str) -> TypeExpr {
        let src = format!("module m.\nto f, given x as {ty}, produce Int:\n  return 1.\n");
        let result = parse_en(&src);
        for decl in result.module.decls {
            if let Decl::Func(f) = decl {
                return f.params[0].ty.clone();
            }
        }
        panic!("no function parsed");
    }

    #[test]
    fn test_primitives() {
        assert!(matches!(param_type("Text"), TypeExpr::Name { text, .. } if text == "Text"));
        assert!(matches!(param_type("int"), TypeExpr::Name { text, .. } if text == "Int"));
    }

    #[test]
    fn test_maybe_and_postfix_question() {
        assert!(matches!(param_type("maybe Int"), TypeExpr::Maybe { .. }));
        assert!(matches!(param_type("Int?"), TypeExpr::Maybe { .. }));
    }

    #[test]
    fn test_option_result_list_map() {
        assert!(matches!(param_type("option of Int"), TypeExpr::Option { .. }));
        let TypeExpr::Result { err, .. } = param_type("result of Int or Text") else {
            panic!("expected result");
        };
        assert!(err.is_some());
        assert!(matches!(param_type("list of Text"), TypeExpr::List { .. }));
        assert!(matches!(param_type("map Text to Int"), TypeExpr::Map { .. }));
    }

    #[test]
    fn test_type_application() {
        let TypeExpr::App { base, args, .. } = param_type("Pair of Int and Text") else {
            panic!("expected app");
        };
        assert_eq!(base, "Pair");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_pii_annotation() {
        let TypeExpr::Pii { level, category, base, .. } = param_type("@pii(L2, email) Text") else {
            panic!("expected pii type");
        };
        assert_eq!(level, PiiLevel::L2);
        assert_eq!(category, PiiCategory::Email);
        assert!(matches!(*base, TypeExpr::Name { ref text, .. } if text == "Text"));
    }

    #[test]
    fn test_func_type() {
        let TypeExpr::Func { params, effects, .. } =
            param_type("(given Int, produce Int, performs io)")
        else {
            panic!("expected func type");
        };
        assert_eq!(params.len(), 1);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_type_var_from_params() {
        let src = "module m.\nto id[T], given x as T, produce T:\n  return x.\n";
        let result = parse_en(src);
        for decl in result.module.decls {
            if let Decl::Func(f) = decl {
                assert!(matches!(f.params[0].ty, TypeExpr::Var { .. }));
                return;
            }
        }
        panic!("no function parsed");
    }
}
