//! Expression parsing.
//!
//! Word operators (`plus`, `is less than`, `and`, …) and their symbolic
//! forms desugar to calls of builtin functions, so the AST needs no
//! binary-operator node and the checker treats them like any other call.

use smol_str::SmolStr;

use crate::base::{DiagCode, Span};
use crate::lexer::TokenKind;
use crate::lexicon::KeywordKind as K;
use crate::syntax::ast::*;

use super::Parser;

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_and()?;
        while self.at_kw(K::Or) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = builtin_call("or", lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_not()?;
        while self.at_kw(K::And) {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = builtin_call("and", lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_not(&mut self) -> Option<Expr> {
        if self.at_kw(K::Not) {
            let kw = self.bump();
            let inner = self.parse_not()?;
            let span = kw.span().cover(inner.span());
            return Some(Expr::Call {
                target: Box::new(Expr::Name {
                    text: SmolStr::new("not"),
                    span: kw.span(),
                }),
                args: vec![inner],
                span,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek().kind {
            TokenKind::Keyword(K::LessThan) | TokenKind::Keyword(K::Under) | TokenKind::Lt => {
                Some("lessThan")
            }
            TokenKind::Keyword(K::GreaterThan)
            | TokenKind::Keyword(K::Over)
            | TokenKind::Keyword(K::MoreThan)
            | TokenKind::Gt => Some("greaterThan"),
            TokenKind::Keyword(K::EqualsTo) | TokenKind::Keyword(K::Is) => Some("equals"),
            TokenKind::Keyword(K::AtLeast) | TokenKind::GtEq => Some("atLeast"),
            TokenKind::Keyword(K::AtMost) | TokenKind::LtEq => Some("atMost"),
            TokenKind::BangEq => Some("notEquals"),
            _ => None,
        };
        let Some(op) = op else {
            return Some(lhs);
        };
        self.bump();
        let rhs = self.parse_additive()?;
        Some(builtin_call(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Keyword(K::Plus) | TokenKind::Plus => "plus",
                TokenKind::Keyword(K::Minus) | TokenKind::Minus => "minus",
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = builtin_call(op, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Keyword(K::Times) | TokenKind::Star => "times",
                TokenKind::Keyword(K::DividedBy) | TokenKind::Slash => "dividedBy",
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = builtin_call(op, lhs, rhs);
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if self.at_kw(K::Await) {
            let kw = self.bump();
            let inner = self.parse_unary()?;
            let span = kw.span().cover(inner.span());
            return Some(Expr::Await {
                expr: Box::new(inner),
                span,
            });
        }
        if self.at(TokenKind::Minus) {
            // Negative literal.
            let minus = self.bump();
            match self.peek().kind {
                TokenKind::Int => {
                    let tok = self.bump();
                    let value: i64 = tok.value.parse().unwrap_or_default();
                    return Some(Expr::Int {
                        value: -value,
                        span: minus.span().cover(tok.span()),
                    });
                }
                TokenKind::Float => {
                    let tok = self.bump();
                    let value: f64 = tok.value.parse().unwrap_or_default();
                    return Some(Expr::Double {
                        value: -value,
                        span: minus.span().cover(tok.span()),
                    });
                }
                _ => {
                    self.error_at(
                        DiagCode::P005,
                        "expected a number after '-'",
                        minus.span(),
                    );
                    return None;
                }
            }
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        while self.at(TokenKind::LParen) {
            self.bump();
            let mut args = Vec::new();
            if !self.at(TokenKind::RParen) {
                loop {
                    match self.parse_expr() {
                        Some(arg) => args.push(arg),
                        None => break,
                    }
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen);
            let span = expr.span().cover(Span::empty(self.prev_end()));
            expr = Expr::Call {
                target: Box::new(expr),
                args,
                span,
            };
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int => {
                self.bump();
                Some(Expr::Int {
                    value: tok.value.parse().unwrap_or_default(),
                    span: tok.span(),
                })
            }
            TokenKind::Long => {
                self.bump();
                Some(Expr::Long {
                    value: tok.value.clone(),
                    span: tok.span(),
                })
            }
            TokenKind::Float => {
                self.bump();
                Some(Expr::Double {
                    value: tok.value.parse().unwrap_or_default(),
                    span: tok.span(),
                })
            }
            TokenKind::Str => {
                self.bump();
                Some(Expr::Str {
                    value: tok.value.clone(),
                    span: tok.span(),
                })
            }
            TokenKind::Keyword(K::True) => {
                self.bump();
                Some(Expr::Bool {
                    value: true,
                    span: tok.span(),
                })
            }
            TokenKind::Keyword(K::False) => {
                self.bump();
                Some(Expr::Bool {
                    value: false,
                    span: tok.span(),
                })
            }
            TokenKind::Keyword(K::Null) => {
                self.bump();
                Some(Expr::Null { span: tok.span() })
            }
            TokenKind::Keyword(K::NoneKw) => {
                self.bump();
                Some(Expr::None { span: tok.span() })
            }
            TokenKind::Keyword(K::OkOf) => self.parse_wrapped(WrapKind::Ok),
            TokenKind::Keyword(K::ErrOf) => self.parse_wrapped(WrapKind::Err),
            TokenKind::Keyword(K::SomeOf) => self.parse_wrapped(WrapKind::Some),
            TokenKind::Keyword(K::FuncGiven) => self.parse_lambda(),
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr();
                self.expect(TokenKind::RParen);
                inner
            }
            TokenKind::Ident | TokenKind::TypeIdent => self.parse_name_or_construct(),
            _ => {
                self.unexpected("an expression");
                None
            }
        }
    }

    fn parse_wrapped(&mut self, kind: WrapKind) -> Option<Expr> {
        let kw = self.bump();
        self.eat_kw(K::Of);
        let inner = self.parse_unary()?;
        let span = kw.span().cover(inner.span());
        let expr = Box::new(inner);
        Some(match kind {
            WrapKind::Ok => Expr::Ok { expr, span },
            WrapKind::Err => Expr::Err { expr, span },
            WrapKind::Some => Expr::Some { expr, span },
        })
    }

    /// `given x as Int -> x plus 1`, optionally `: RetType` before `->`.
    fn parse_lambda(&mut self) -> Option<Expr> {
        let kw = self.bump();
        let mut params = Vec::new();
        loop {
            let name_tok = match self.peek().kind {
                TokenKind::Ident => self.bump(),
                _ => break,
            };
            let ty = if self.eat_kw(K::As).is_some() {
                self.parse_type().unwrap_or(TypeExpr::Name {
                    text: SmolStr::new("Unknown"),
                    span: name_tok.span(),
                })
            } else {
                TypeExpr::Name {
                    text: SmolStr::new("Unknown"),
                    span: name_tok.span(),
                }
            };
            let span = name_tok.span().cover(ty.span());
            params.push(Parameter {
                name: name_tok.value.clone(),
                name_span: name_tok.span(),
                ty,
                span,
            });
            if self.eat(TokenKind::Comma).is_some() || self.eat_kw(K::And).is_some() {
                continue;
            }
            break;
        }
        let ret_type = if self.eat(TokenKind::Colon).is_some() {
            self.parse_type()
        } else {
            None
        };
        self.expect(TokenKind::Arrow)?;
        let body = self.parse_expr()?;
        let span = kw.span().cover(body.span());
        Some(Expr::Lambda {
            params,
            ret_type,
            body: Box::new(body),
            span,
        })
    }

    /// A dotted name, a constructor literal, or a plain reference.
    fn parse_name_or_construct(&mut self) -> Option<Expr> {
        let name = self.parse_dotted_name()?;

        // `User with name = "x", age = 30` — constructor literal. The
        // lookahead requires `field =` to distinguish from prose uses of
        // `with` in effect clauses (which never reach expression context).
        if !name.text.contains('.')
            && self.at_kw(K::TypeWith)
            && self.peek_nth(1).kind == TokenKind::Ident
            && self.peek_nth(2).kind == TokenKind::Eq
        {
            self.bump(); // with
            let mut fields = Vec::new();
            loop {
                let field_tok = match self.peek().kind {
                    TokenKind::Ident => self.bump(),
                    _ => break,
                };
                if self.expect(TokenKind::Eq).is_none() {
                    break;
                }
                match self.parse_expr() {
                    Some(value) => fields.push((field_tok.value.clone(), value)),
                    None => break,
                }
                if self.eat(TokenKind::Comma).is_some() || self.eat_kw(K::And).is_some() {
                    continue;
                }
                break;
            }
            let span = name.span.cover(Span::empty(self.prev_end()));
            return Some(Expr::Construct {
                type_name: name.text,
                type_span: name.span,
                fields,
                span,
            });
        }

        Some(Expr::Name {
            text: name.text,
            span: name.span,
        })
    }
}

enum WrapKind {
    Ok,
    Err,
    Some,
}

fn builtin_call(op: &str, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span().cover(rhs.span());
    Expr::Call {
        target: Box::new(Expr::Name {
            text: SmolStr::new(op),
            span,
        }),
        args: vec![lhs, rhs],
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse_en;
    use crate::syntax::ast::*;

    fn first_return_expr(source: &str) -> Expr {
        let result = parse_en(source);
        for decl in result.module.decls {
            if let Decl::Func(f) = decl {
                for stmt in f.body.unwrap_or_default() {
                    if let Statement::Return { value: Some(e), .. } = stmt {
                        return e;
                    }
                }
            }
        }
        panic!("no return expression");
    }

    fn body_expr(expr: &str) -> Expr {
        first_return_expr(&format!("module m.\nto f, produce Int:\n  return {expr}.\n"))
    }

    #[test]
    fn test_word_operator_desugars_to_call() {
        let e = body_expr("x plus 1");
        let Expr::Call { target, args, .. } = e else {
            panic!("expected call");
        };
        assert!(matches!(*target, Expr::Name { ref text, .. } if text == "plus"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_precedence_times_over_plus() {
        let e = body_expr("1 plus 2 times 3");
        let Expr::Call { target, args, .. } = e else {
            panic!("expected call");
        };
        assert!(matches!(*target, Expr::Name { ref text, .. } if text == "plus"));
        assert!(matches!(&args[1], Expr::Call { target, .. }
            if matches!(&**target, Expr::Name { text, .. } if text == "times")));
    }

    #[test]
    fn test_comparison_phrases() {
        let e = body_expr("x is less than 3");
        let Expr::Call { target, .. } = e else {
            panic!("expected call");
        };
        assert!(matches!(*target, Expr::Name { ref text, .. } if text == "lessThan"));
    }

    #[test]
    fn test_call_with_args() {
        let e = body_expr("Http.get(\"u\", 2)");
        let Expr::Call { target, args, .. } = e else {
            panic!("expected call");
        };
        assert!(matches!(*target, Expr::Name { ref text, .. } if text == "Http.get"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_construct_literal() {
        let e = body_expr("User with name = \"x\", age = 30");
        let Expr::Construct { type_name, fields, .. } = e else {
            panic!("expected construct");
        };
        assert_eq!(type_name, "User");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "name");
    }

    #[test]
    fn test_wrapped_variants() {
        assert!(matches!(body_expr("ok 1"), Expr::Ok { .. }));
        assert!(matches!(body_expr("err \"bad\""), Expr::Err { .. }));
        assert!(matches!(body_expr("some 5"), Expr::Some { .. }));
        assert!(matches!(body_expr("none"), Expr::None { .. }));
    }

    #[test]
    fn test_await() {
        let e = body_expr("await fetch()");
        assert!(matches!(e, Expr::Await { .. }));
    }

    #[test]
    fn test_lambda() {
        let e = body_expr("apply(given x as Int -> x plus 1)");
        let Expr::Call { args, .. } = e else {
            panic!("expected call");
        };
        let Expr::Lambda { params, body, .. } = &args[0] else {
            panic!("expected lambda, got {:?}", args[0]);
        };
        assert_eq!(params.len(), 1);
        assert!(matches!(&**body, Expr::Call { .. }));
    }

    #[test]
    fn test_negative_literal() {
        assert!(matches!(body_expr("-5"), Expr::Int { value: -5, .. }));
    }

    #[test]
    fn test_long_literal() {
        let e = body_expr("1L");
        assert!(matches!(e, Expr::Long { ref value, .. } if value == "1"));
    }

    #[test]
    fn test_dotted_field_access_is_single_name() {
        let e = body_expr("user.address.city");
        assert!(matches!(e, Expr::Name { ref text, .. } if text == "user.address.city"));
    }
}
