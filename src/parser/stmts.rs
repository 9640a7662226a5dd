//! Statement and block parsing.

use crate::base::{DiagCode, Span};
use crate::lexer::TokenKind;
use crate::lexicon::KeywordKind as K;
use crate::syntax::ast::*;

use super::Parser;

impl Parser<'_> {
    /// A block after `:`. Either an indented statement list or a single
    /// inline statement on the same line.
    pub(crate) fn parse_block(&mut self) -> Vec<Statement> {
        if self.peek_raw().kind == TokenKind::Newline {
            // Skip to the Indent (if any).
            while self.peek_raw().kind == TokenKind::Newline {
                self.bump_raw();
            }
            if self.peek_raw().kind != TokenKind::Indent {
                return Vec::new();
            }
            self.bump_raw();
            let mut stmts = Vec::new();
            loop {
                match self.peek_raw().kind {
                    TokenKind::Dedent => {
                        self.bump_raw();
                        break;
                    }
                    TokenKind::Newline | TokenKind::Indent => {
                        self.bump_raw();
                    }
                    TokenKind::Eof => break,
                    _ => match self.parse_statement() {
                        Some(stmt) => stmts.push(stmt),
                        None => {
                            self.recover_to_statement_end();
                        }
                    },
                }
            }
            stmts
        } else {
            match self.parse_statement() {
                Some(stmt) => vec![stmt],
                None => {
                    self.recover_to_statement_end();
                    Vec::new()
                }
            }
        }
    }

    pub(crate) fn parse_statement(&mut self) -> Option<Statement> {
        if self.at_kw(K::Let) {
            return self.parse_let();
        }
        if self.at_kw(K::Set) {
            return self.parse_set();
        }
        if self.at_kw(K::Return) {
            return self.parse_return();
        }
        if self.at_kw(K::If) {
            return self.parse_if();
        }
        if self.at_kw(K::Match) {
            return self.parse_match();
        }
        if self.at_kw(K::Start) {
            return self.parse_start();
        }
        if self.at_kw(K::WaitFor) {
            return self.parse_wait();
        }
        if self.at_kw(K::Workflow) {
            return self.parse_workflow().map(Statement::Workflow);
        }
        if self.at_kw(K::Within) {
            return self.parse_scope();
        }
        if self.at_kw(K::ForEach) {
            return self.parse_for_each();
        }

        // Expression statement.
        let expr = self.parse_expr()?;
        let span = expr.span();
        self.expect_statement_end();
        Some(Statement::Expr {
            expr,
            span: span.cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_let(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let name = self.expect_name()?;
        self.expect_kw(K::Be)?;
        let value = self.parse_expr()?;
        self.expect_statement_end();
        Some(Statement::Let {
            name: name.value.clone(),
            name_span: name.span(),
            value,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_set(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let name = self.parse_dotted_name()?;
        self.expect_kw(K::To)?;
        let value = self.parse_expr()?;
        self.expect_statement_end();
        Some(Statement::Set {
            name: name.text,
            name_span: name.span,
            value,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_return(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let value = if self.at(TokenKind::Dot) {
            None
        } else {
            self.parse_expr()
        };
        self.expect_statement_end();
        Some(Statement::Return {
            value,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_if(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Colon);
        let then = self.parse_block();
        let otherwise = if self.at_kw(K::Otherwise) {
            self.bump();
            if self.at_kw(K::If) {
                // `otherwise if …` chains as a nested If.
                self.parse_if().map(|s| vec![s])
            } else {
                self.expect(TokenKind::Colon);
                Some(self.parse_block())
            }
        } else {
            None
        };
        Some(Statement::If {
            cond,
            then,
            otherwise,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_match(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Colon);

        let mut cases = Vec::new();
        // Cases live in an indented block, one `when` per case.
        while self.peek_raw().kind == TokenKind::Newline {
            self.bump_raw();
        }
        if self.peek_raw().kind == TokenKind::Indent {
            self.bump_raw();
            loop {
                match self.peek_raw().kind {
                    TokenKind::Dedent => {
                        self.bump_raw();
                        break;
                    }
                    TokenKind::Newline | TokenKind::Indent => {
                        self.bump_raw();
                    }
                    TokenKind::Eof => break,
                    _ => {
                        if !self.at_kw(K::When) {
                            self.unexpected("'when'");
                            self.recover_to_statement_end();
                            continue;
                        }
                        let when = self.bump();
                        let pattern = match self.parse_pattern() {
                            Some(p) => p,
                            None => {
                                self.recover_to_statement_end();
                                continue;
                            }
                        };
                        self.expect(TokenKind::Colon);
                        let body = self.parse_block();
                        cases.push(MatchCase {
                            span: when.span().cover(Span::empty(self.prev_end())),
                            pattern,
                            body,
                        });
                    }
                }
            }
        }

        Some(Statement::Match {
            expr,
            cases,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    pub(crate) fn parse_pattern(&mut self) -> Option<Pattern> {
        if self.at_kw(K::Null) {
            let tok = self.bump();
            return Some(Pattern::Null { span: tok.span() });
        }
        if self.at(TokenKind::Minus) || self.at(TokenKind::Int) {
            let negative = self.eat(TokenKind::Minus).is_some();
            let tok = self.expect(TokenKind::Int)?;
            let value: i64 = tok.value.parse().unwrap_or_default();
            return Some(Pattern::Int {
                value: if negative { -value } else { value },
                span: tok.span(),
            });
        }
        // Wrapper constructors are keywords.
        for (kw, name) in [(K::OkOf, "Ok"), (K::ErrOf, "Err"), (K::SomeOf, "Some")] {
            if self.at_kw(kw) {
                let tok = self.bump();
                self.eat_kw(K::Of);
                let mut names = Vec::new();
                let mut args = Vec::new();
                match self.peek().kind {
                    TokenKind::Ident => {
                        let n = self.bump();
                        names.push((n.value.clone(), n.span()));
                    }
                    TokenKind::Int | TokenKind::Minus | TokenKind::Keyword(K::Null) => {
                        if let Some(p) = self.parse_pattern() {
                            args.push(p);
                        }
                    }
                    _ => {}
                }
                return Some(Pattern::Ctor {
                    type_name: name.into(),
                    names,
                    args,
                    span: tok.span().cover(Span::empty(self.prev_end())),
                });
            }
        }
        if self.at_kw(K::NoneKw) {
            let tok = self.bump();
            return Some(Pattern::Ctor {
                type_name: "None".into(),
                names: vec![],
                args: vec![],
                span: tok.span(),
            });
        }
        if self.at(TokenKind::TypeIdent) {
            let tok = self.bump();
            let mut names = Vec::new();
            // `User with name and age` destructures fields.
            if self.eat_kw(K::TypeWith).is_some() {
                loop {
                    match self.peek().kind {
                        TokenKind::Ident => {
                            let n = self.bump();
                            names.push((n.value.clone(), n.span()));
                        }
                        _ => break,
                    }
                    if self.eat(TokenKind::Comma).is_some() || self.eat_kw(K::And).is_some() {
                        continue;
                    }
                    break;
                }
            } else if self.at(TokenKind::Ident) {
                // Positional binding: `Ok value` style for user ctors.
                let n = self.bump();
                names.push((n.value.clone(), n.span()));
            }
            return Some(Pattern::Ctor {
                type_name: tok.value.clone(),
                names,
                args: vec![],
                span: tok.span().cover(Span::empty(self.prev_end())),
            });
        }
        if self.at(TokenKind::Ident) {
            let tok = self.bump();
            return Some(Pattern::Name {
                name: tok.value.clone(),
                span: tok.span(),
            });
        }
        self.error_at(DiagCode::P012, "invalid pattern", self.peek().span());
        None
    }

    fn parse_start(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let name = self.expect_name()?;
        self.expect_kw(K::As)?;
        let expr = self.parse_expr()?;
        self.expect_statement_end();
        Some(Statement::Start {
            name: name.value.clone(),
            name_span: name.span(),
            expr,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_wait(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let mut names = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Ident => {
                    let tok = self.bump();
                    names.push((tok.value.clone(), tok.span()));
                }
                _ => {
                    self.unexpected("a task name");
                    break;
                }
            }
            if self.eat_kw(K::And).is_some() || self.eat(TokenKind::Comma).is_some() {
                continue;
            }
            break;
        }
        self.expect_statement_end();
        Some(Statement::Wait {
            names,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_scope(&mut self) -> Option<Statement> {
        let kw = self.bump();
        self.expect_kw(K::Scope)?;
        let name = self.expect_name()?;
        self.expect(TokenKind::Colon);
        let body = self.parse_block();
        Some(Statement::Scope {
            name: name.value.clone(),
            body,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_for_each(&mut self) -> Option<Statement> {
        let kw = self.bump();
        let var = self.expect_name()?;
        self.expect_kw(K::In)?;
        let iter = self.parse_expr()?;
        self.expect(TokenKind::Colon);
        let body = self.parse_block();
        Some(Statement::ForEach {
            var: var.value.clone(),
            var_span: var.span(),
            iter,
            body,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_workflow(&mut self) -> Option<WorkflowStmt> {
        let kw = self.bump();
        self.expect(TokenKind::Colon);

        let mut steps = Vec::new();
        let mut retry = None;
        let mut timeout = None;

        while self.peek_raw().kind == TokenKind::Newline {
            self.bump_raw();
        }
        if self.peek_raw().kind == TokenKind::Indent {
            self.bump_raw();
            loop {
                match self.peek_raw().kind {
                    TokenKind::Dedent => {
                        self.bump_raw();
                        break;
                    }
                    TokenKind::Newline | TokenKind::Indent => {
                        self.bump_raw();
                    }
                    TokenKind::Eof => break,
                    _ => {
                        if self.at_kw(K::Step) {
                            if let Some(step) = self.parse_step() {
                                steps.push(step);
                            }
                        } else if self.at_kw(K::Retry) {
                            retry = self.parse_retry();
                        } else if self.at_kw(K::Timeout) {
                            timeout = self.parse_timeout();
                        } else {
                            self.unexpected("'step', 'retry', or 'timeout'");
                            self.recover_to_statement_end();
                        }
                    }
                }
            }
        }

        Some(WorkflowStmt {
            steps,
            retry,
            timeout,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    /// `step charge, depends on validate: …` with an optional trailing
    /// `compensate:` block inside the step body.
    fn parse_step(&mut self) -> Option<WorkflowStep> {
        let kw = self.bump();
        let name = self.expect_name()?;

        let mut depends_on = Vec::new();
        if self.eat(TokenKind::Comma).is_some() {
            self.expect_kw(K::Depends)?;
            self.expect_kw(K::On)?;
            loop {
                match self.peek().kind {
                    TokenKind::Ident => {
                        let tok = self.bump();
                        depends_on.push((tok.value.clone(), tok.span()));
                    }
                    _ => break,
                }
                if self.eat_kw(K::And).is_some() || self.eat(TokenKind::Comma).is_some() {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::Colon);

        // The step body is an indented block; a `compensate:` item inside
        // it becomes the compensation block.
        let mut body = Vec::new();
        let mut compensate = None;
        while self.peek_raw().kind == TokenKind::Newline {
            self.bump_raw();
        }
        if self.peek_raw().kind == TokenKind::Indent {
            self.bump_raw();
            loop {
                match self.peek_raw().kind {
                    TokenKind::Dedent => {
                        self.bump_raw();
                        break;
                    }
                    TokenKind::Newline | TokenKind::Indent => {
                        self.bump_raw();
                    }
                    TokenKind::Eof => break,
                    _ => {
                        if self.at_kw(K::Compensate) {
                            self.bump();
                            self.expect(TokenKind::Colon);
                            compensate = Some(self.parse_block());
                        } else {
                            match self.parse_statement() {
                                Some(stmt) => body.push(stmt),
                                None => self.recover_to_statement_end(),
                            }
                        }
                    }
                }
            }
        } else {
            body = self.parse_block();
        }

        Some(WorkflowStep {
            name: name.value.clone(),
            name_span: name.span(),
            depends_on,
            body,
            compensate,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    /// `retry max attempts 3 backoff exponential.`
    fn parse_retry(&mut self) -> Option<RetryPolicy> {
        let kw = self.bump();
        self.expect_kw(K::MaxAttempts)?;
        let attempts_tok = self.expect(TokenKind::Int)?;
        let max_attempts: i64 = attempts_tok.value.parse().unwrap_or_default();

        let backoff = if self.eat_kw(K::Backoff).is_some() {
            let tok = match self.peek().kind {
                TokenKind::Ident => self.bump(),
                _ => {
                    self.unexpected("a backoff kind");
                    return None;
                }
            };
            match tok.value.as_str() {
                "fixed" => BackoffKind::Fixed,
                "linear" => BackoffKind::Linear,
                "exponential" => BackoffKind::Exponential,
                other => {
                    self.error_at(
                        DiagCode::P002,
                        format!("unknown backoff kind '{other}'"),
                        tok.span(),
                    );
                    BackoffKind::Fixed
                }
            }
        } else {
            BackoffKind::Fixed
        };
        self.expect_statement_end();
        Some(RetryPolicy {
            max_attempts,
            backoff,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    /// `timeout within 30000.` (milliseconds)
    fn parse_timeout(&mut self) -> Option<TimeoutPolicy> {
        let kw = self.bump();
        self.eat_kw(K::Within);
        let tok = self.expect(TokenKind::Int)?;
        let millis: i64 = tok.value.parse().unwrap_or_default();
        self.expect_statement_end();
        Some(TimeoutPolicy {
            millis,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn expect_name(&mut self) -> Option<crate::lexer::Token> {
        match self.peek().kind {
            TokenKind::Ident => Some(self.bump()),
            _ => {
                self.unexpected("a name");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse_en;
    use crate::syntax::ast::*;

    fn first_func(source: &str) -> Func {
        let result = parse_en(source);
        for decl in result.module.decls {
            if let Decl::Func(f) = decl {
                return f;
            }
        }
        panic!("no function parsed");
    }

    #[test]
    fn test_let_and_return() {
        let f = first_func("module m.\nto f, produce Text:\n  let msg be \"hi\".\n  return msg.\n");
        let body = f.body.unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], Statement::Let { .. }));
        assert!(matches!(body[1], Statement::Return { .. }));
    }

    #[test]
    fn test_set_statement() {
        let f = first_func("module m.\nto f, produce Int:\n  set count to 0.\n  return count.\n");
        let body = f.body.unwrap();
        let Statement::Set { name, .. } = &body[0] else {
            panic!("expected set");
        };
        assert_eq!(name, "count");
    }

    #[test]
    fn test_if_otherwise() {
        let f = first_func(
            "module m.\nto f, given x as Int, produce Int:\n  if x is less than 3:\n    return 0.\n  otherwise:\n    return 1.\n",
        );
        let body = f.body.unwrap();
        let Statement::If { then, otherwise, .. } = &body[0] else {
            panic!("expected if");
        };
        assert_eq!(then.len(), 1);
        assert_eq!(otherwise.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_match_with_cases() {
        let f = first_func(
            "module m.\nto f, given r as result of Int, produce Int:\n  match r:\n    when ok value:\n      return value.\n    when err e:\n      return 0.\n",
        );
        let body = f.body.unwrap();
        let Statement::Match { cases, .. } = &body[0] else {
            panic!("expected match");
        };
        assert_eq!(cases.len(), 2);
        let Pattern::Ctor { type_name, names, .. } = &cases[0].pattern else {
            panic!("expected ctor pattern");
        };
        assert_eq!(type_name, "Ok");
        assert_eq!(names[0].0, "value");
    }

    #[test]
    fn test_start_wait() {
        let f = first_func(
            "module m.\nto f, produce Int, performs io:\n  start download as Http.get(\"u\").\n  wait for download.\n  return 1.\n",
        );
        let body = f.body.unwrap();
        assert!(matches!(body[0], Statement::Start { .. }));
        let Statement::Wait { names, .. } = &body[1] else {
            panic!("expected wait");
        };
        assert_eq!(names[0].0, "download");
    }

    #[test]
    fn test_workflow_steps_retry_timeout() {
        let f = first_func(
            "module m.\nto process, produce Int, performs io:\n  workflow:\n    step validate:\n      check().\n    step charge, depends on validate:\n      pay().\n      compensate:\n        refund().\n    retry max attempts 3 backoff exponential.\n    timeout within 30000.\n  return 1.\n",
        );
        let body = f.body.unwrap();
        let Statement::Workflow(wf) = &body[0] else {
            panic!("expected workflow, got {:?}", body[0]);
        };
        assert_eq!(wf.steps.len(), 2);
        assert_eq!(wf.steps[1].depends_on[0].0, "validate");
        assert!(wf.steps[1].compensate.is_some());
        let retry = wf.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.backoff, BackoffKind::Exponential);
        assert_eq!(wf.timeout.as_ref().unwrap().millis, 30000);
    }

    #[test]
    fn test_scope_block() {
        let f = first_func(
            "module m.\nto f, produce Int, performs io:\n  within scope db:\n    return 1.\n",
        );
        let body = f.body.unwrap();
        let Statement::Scope { name, body, .. } = &body[0] else {
            panic!("expected scope");
        };
        assert_eq!(name, "db");
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_for_each() {
        let f = first_func(
            "module m.\nto f, given items as list of Int, produce Int:\n  for each item in items:\n    process(item).\n  return 0.\n",
        );
        let body = f.body.unwrap();
        let Statement::ForEach { var, .. } = &body[0] else {
            panic!("expected for each");
        };
        assert_eq!(var, "item");
    }
}
