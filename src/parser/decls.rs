//! Top-level declarations: module header, imports, data, enums, functions.

use smol_str::SmolStr;

use crate::base::{DiagCode, Diagnostic, FixIt, Severity, Span, TextEdit};
use crate::lexer::TokenKind;
use crate::lexicon::{KeywordKind as K, MessageKey};
use crate::syntax::ast::*;

use super::infer::infer_field_type;
use super::Parser;

impl Parser<'_> {
    pub(crate) fn parse_module(&mut self, file_hint: Option<&str>) -> Module {
        let start = self.peek().start;
        let name = self.parse_module_header(file_hint);

        let mut decls = Vec::new();
        while !self.at_eof() {
            // Stray layout tokens between declarations.
            if matches!(self.peek().kind, TokenKind::Indent | TokenKind::Dedent) {
                self.bump();
                continue;
            }
            match self.parse_decl() {
                Some(decl) => decls.push(decl),
                None => {
                    if !self.at_eof() {
                        self.unexpected("a declaration");
                        self.recover_to_statement_end();
                    }
                }
            }
        }

        // Import aliases must be unique within the module.
        let mut seen_aliases: Vec<&str> = Vec::new();
        let mut duplicate_spans = Vec::new();
        for decl in &decls {
            if let Decl::Import(import) = decl {
                if let Some(alias) = &import.alias {
                    if seen_aliases.contains(&alias.as_str()) {
                        duplicate_spans.push((alias.clone(), import.span));
                    } else {
                        seen_aliases.push(alias.as_str());
                    }
                }
            }
        }
        for (alias, span) in duplicate_spans {
            self.error_at(
                DiagCode::P011,
                format!("import alias '{alias}' is already in use"),
                span,
            );
        }

        let end = self.prev_end();
        Module {
            name,
            decls,
            span: Span::new(start, end),
        }
    }

    fn parse_module_header(&mut self, file_hint: Option<&str>) -> Option<DottedName> {
        if self.at_kw(K::ModuleDecl) {
            let kw = self.bump();
            let name = self.parse_dotted_name()?;
            self.expect_statement_end();
            return Some(DottedName {
                span: kw.span().cover(name.span),
                ..name
            });
        }

        // Recoverable: derive a suggested name from the file path.
        let suggested = file_hint
            .map(module_name_from_path)
            .unwrap_or_else(|| "main".to_string());
        let message = self
            .lexicon
            .message(MessageKey::MissingModuleHeader, &[&suggested]);
        let at = self.peek().start;
        let header = format!("{} {}.\n", self.phrase(K::ModuleDecl), suggested);
        self.diagnostics.push(
            Diagnostic::new(DiagCode::P001, message, Span::empty(at))
                .with_severity(Severity::Warning)
                .with_source("parser")
                .with_fix(FixIt::new(
                    format!("Insert module header '{}'", suggested),
                    vec![TextEdit::insert(at, header)],
                )),
        );
        None
    }

    fn parse_decl(&mut self) -> Option<Decl> {
        // Annotations belong to the following function.
        let mut annotations = Vec::new();
        while self.at(TokenKind::At) && self.peek_nth(1).kind == TokenKind::Ident {
            let at = self.bump();
            let name = self.bump();
            annotations.push((name.value.clone(), at.span().cover(name.span())));
        }

        if self.at_kw(K::Import) {
            if !annotations.is_empty() {
                let span = annotations[0].1;
                self.error_at(DiagCode::P007, "annotations may only precede a function", span);
            }
            return self.parse_import().map(Decl::Import);
        }
        if self.at_kw(K::TypeDef) {
            if !annotations.is_empty() {
                let span = annotations[0].1;
                self.error_at(DiagCode::P007, "annotations may only precede a function", span);
            }
            return self.parse_data_or_enum();
        }
        if self.at_kw(K::FuncTo) {
            return self.parse_func(annotations).map(Decl::Func);
        }
        None
    }

    pub(crate) fn parse_dotted_name(&mut self) -> Option<DottedName> {
        let first = match self.peek().kind {
            TokenKind::Ident | TokenKind::TypeIdent => self.bump(),
            _ => {
                self.unexpected("a name");
                return None;
            }
        };
        let mut text = first.value.to_string();
        let mut span = first.span();
        // Segments continue while `.` is immediately followed by a name;
        // the final `.` is the statement end.
        while self.at(TokenKind::Dot)
            && matches!(
                self.peek_nth(1).kind,
                TokenKind::Ident | TokenKind::TypeIdent
            )
        {
            self.bump(); // '.'
            let seg = self.bump();
            text.push('.');
            text.push_str(&seg.value);
            span = span.cover(seg.span());
        }
        Some(DottedName {
            text: SmolStr::new(text),
            span,
        })
    }

    fn parse_import(&mut self) -> Option<Import> {
        let kw = self.bump();
        let name = self.parse_dotted_name()?;
        let alias = if self.eat_kw(K::As).is_some() {
            match self.peek().kind {
                TokenKind::Ident | TokenKind::TypeIdent => Some(self.bump().value.clone()),
                _ => {
                    self.unexpected("an alias name");
                    None
                }
            }
        } else {
            None
        };
        self.expect_statement_end();
        Some(Import {
            name: name.text,
            alias,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    /// `define T with f1 as Type, …` or `define T as one of A, B.`
    fn parse_data_or_enum(&mut self) -> Option<Decl> {
        let kw = self.bump();
        let name_tok = match self.peek().kind {
            TokenKind::TypeIdent | TokenKind::Ident => self.bump(),
            _ => {
                self.unexpected("a type name");
                self.recover_to_statement_end();
                return None;
            }
        };

        if self.at_kw(K::As) && self.peek_nth(1).kind == TokenKind::Keyword(K::TypeOneOf) {
            self.bump(); // as
            self.bump(); // one of
            let mut variants = Vec::new();
            loop {
                match self.peek().kind {
                    TokenKind::TypeIdent | TokenKind::Ident => {
                        let v = self.bump();
                        variants.push((v.value.clone(), v.span()));
                    }
                    _ => {
                        self.unexpected("an enum variant");
                        break;
                    }
                }
                if self.eat(TokenKind::Comma).is_some() || self.eat_kw(K::And).is_some() {
                    continue;
                }
                break;
            }
            self.expect_statement_end();
            return Some(Decl::Enum(EnumDecl {
                name: name_tok.value.clone(),
                name_span: name_tok.span(),
                variants,
                span: kw.span().cover(Span::empty(self.prev_end())),
            }));
        }

        if self.eat_kw(K::TypeWith).is_none() && self.eat_kw(K::TypeHas).is_none() {
            self.unexpected("'with', 'has', or 'as one of'");
            self.recover_to_statement_end();
            return None;
        }

        let mut fields = Vec::new();
        loop {
            match self.parse_field() {
                Some(field) => fields.push(field),
                None => break,
            }
            if self.eat(TokenKind::Comma).is_some() || self.eat_kw(K::And).is_some() {
                continue;
            }
            break;
        }
        self.expect_statement_end();
        Some(Decl::Data(Data {
            name: name_tok.value.clone(),
            name_span: name_tok.span(),
            fields,
            span: kw.span().cover(Span::empty(self.prev_end())),
        }))
    }

    fn parse_field(&mut self) -> Option<Field> {
        let name_tok = match self.peek().kind {
            TokenKind::Ident => self.bump(),
            _ => {
                self.unexpected("a field name");
                return None;
            }
        };
        let start = name_tok.span();

        let (ty, constraints, inferred) = if self.at_kw(K::As) {
            self.bump();
            let ty = self.parse_type()?;
            let constraints = self.parse_constraints();
            (ty, constraints, false)
        } else {
            let constraints = self.parse_constraints();
            let ty = infer_field_type(&name_tok.value, &constraints, self.lexicon, start);
            (ty, constraints, true)
        };

        let end = constraints
            .last()
            .map(|c| c.span())
            .unwrap_or_else(|| ty.span());
        Some(Field {
            name: name_tok.value.clone(),
            name_span: start,
            ty,
            constraints,
            type_inferred: inferred,
            span: start.cover(end),
        })
    }

    pub(crate) fn parse_constraints(&mut self) -> Vec<Constraint> {
        let mut constraints = Vec::new();
        loop {
            if self.at_kw(K::Required) {
                let tok = self.bump();
                constraints.push(Constraint::Required { span: tok.span() });
            } else if self.at_kw(K::Between) {
                let tok = self.bump();
                let min = self.parse_bound();
                if self.expect_kw(K::And).is_none() {
                    self.skip_bad_constraint(tok.span());
                    continue;
                }
                let max = self.parse_bound();
                constraints.push(Constraint::Range {
                    min,
                    max,
                    span: tok.span().cover(Span::empty(self.prev_end())),
                });
            } else if self.at_kw(K::AtLeast) {
                let tok = self.bump();
                let min = self.parse_bound();
                constraints.push(Constraint::Range {
                    min,
                    max: None,
                    span: tok.span().cover(Span::empty(self.prev_end())),
                });
            } else if self.at_kw(K::AtMost) {
                let tok = self.bump();
                let max = self.parse_bound();
                constraints.push(Constraint::Range {
                    min: None,
                    max,
                    span: tok.span().cover(Span::empty(self.prev_end())),
                });
            } else if self.at_kw(K::Matching) {
                let tok = self.bump();
                self.eat_kw(K::Pattern);
                match self.eat(TokenKind::Str) {
                    Some(s) => constraints.push(Constraint::Pattern {
                        regex: s.value.clone(),
                        span: tok.span().cover(s.span()),
                    }),
                    None => {
                        self.error_at(
                            DiagCode::P010,
                            "expected a pattern string after 'matching'",
                            tok.span(),
                        );
                    }
                }
            } else {
                break;
            }
        }
        constraints
    }

    fn parse_bound(&mut self) -> Option<f64> {
        let negative = self.eat(TokenKind::Minus).is_some();
        let tok = match self.peek().kind {
            TokenKind::Int | TokenKind::Float => self.bump(),
            _ => {
                self.error_at(
                    DiagCode::P010,
                    "expected a numeric bound",
                    self.peek().span(),
                );
                return None;
            }
        };
        tok.value
            .parse::<f64>()
            .ok()
            .map(|v| if negative { -v } else { v })
    }

    fn skip_bad_constraint(&mut self, span: Span) {
        self.error_at(DiagCode::P010, "invalid field constraint", span);
    }

    /// `to NAME [T, E]?, given …, produce …, performs …:` body
    fn parse_func(&mut self, annotations: Vec<(SmolStr, Span)>) -> Option<Func> {
        let kw = self.bump();
        let name_tok = match self.peek().kind {
            TokenKind::Ident | TokenKind::TypeIdent => self.bump(),
            _ => {
                self.unexpected("a function name");
                self.recover_to_statement_end();
                return None;
            }
        };

        // Type/effect parameter list: `[T, E]`.
        let mut type_params = Vec::new();
        if self.at(TokenKind::LBracket) {
            self.bump();
            loop {
                match self.peek().kind {
                    TokenKind::TypeIdent | TokenKind::Ident => {
                        type_params.push(self.bump().value.clone());
                    }
                    _ => break,
                }
                if self.eat(TokenKind::Comma).is_none() && self.eat_kw(K::And).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RBracket);
        }
        self.type_params = type_params.clone();

        let mut params = Vec::new();
        let mut effects = Vec::new();
        let mut effect_caps: Vec<(SmolStr, Span)> = Vec::new();
        let mut effect_caps_explicit = false;
        let mut ret_type = None;

        while self.eat(TokenKind::Comma).is_some() {
            if self.at_kw(K::FuncGiven) {
                self.bump();
                self.parse_params(&mut params);
            } else if self.at_kw(K::FuncProduce) {
                self.bump();
                ret_type = self.parse_type();
            } else if self.at_kw(K::FuncPerforms) {
                let perf = self.bump();
                let clause = self.parse_effect_clause(perf.span());
                effects = clause.0;
                effect_caps = clause.1;
                effect_caps_explicit = clause.2;
            } else {
                self.unexpected("'given', 'produce', or 'performs'");
                break;
            }
        }

        let header_end = self.prev_end();
        let header_span = kw.span().cover(Span::empty(header_end));

        let body = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_block())
        } else if self.at_kw(K::Return) {
            // Inline single-return form without a colon.
            Some(vec![self.parse_statement()?])
        } else {
            self.diagnostics.push(
                Diagnostic::coded(DiagCode::P013, header_span)
                    .with_source("parser")
                    .with_fix(FixIt::new(
                        "Add an empty body",
                        vec![TextEdit::insert(header_end, ": return null.")],
                    )),
            );
            None
        };

        self.type_params.clear();
        let ret_type_inferred = ret_type.is_none();
        Some(Func {
            name: name_tok.value.clone(),
            name_span: name_tok.span(),
            annotations,
            type_params,
            params,
            effects,
            effect_caps,
            effect_caps_explicit,
            ret_type,
            ret_type_inferred,
            body,
            header_span,
            span: kw.span().cover(Span::empty(self.prev_end())),
        })
    }

    fn parse_params(&mut self, params: &mut Vec<Parameter>) {
        loop {
            let name_tok = match self.peek().kind {
                TokenKind::Ident => self.bump(),
                _ => {
                    self.unexpected("a parameter name");
                    return;
                }
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

            // Parameters separate with `and` or `,`; a comma followed by
            // another clause keyword ends the list instead.
            if self.eat_kw(K::And).is_some() {
                continue;
            }
            if self.at(TokenKind::Comma) {
                let next = self.peek_nth(1);
                if matches!(
                    next.kind,
                    TokenKind::Keyword(K::FuncProduce)
                        | TokenKind::Keyword(K::FuncPerforms)
                        | TokenKind::Keyword(K::FuncGiven)
                ) {
                    return;
                }
                self.bump();
                continue;
            }
            return;
        }
    }

    /// Effect clause forms: `io`, `cpu`, `io and Http`, `io with Http
    /// and Sql`, `[Http, Sql]` (implies io).
    ///
    /// Returns (base effects, capability phrases, caps_explicit).
    pub(crate) fn parse_effect_clause(
        &mut self,
        clause_span: Span,
    ) -> (Vec<EffectName>, Vec<(SmolStr, Span)>, bool) {
        let mut effects = Vec::new();
        let mut caps: Vec<(SmolStr, Span)> = Vec::new();
        let mut explicit = false;

        if self.at(TokenKind::LBracket) {
            self.bump();
            explicit = true;
            loop {
                if !self.parse_capability_name(&mut caps) {
                    break;
                }
                if self.eat(TokenKind::Comma).is_some() || self.eat_kw(K::And).is_some() {
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RBracket);
            // A bare capability list implies the io effect.
            effects.push(EffectName {
                name: SmolStr::new("io"),
                span: clause_span,
            });
            return (effects, caps, explicit);
        }

        loop {
            if self.at_kw(K::Io) {
                let tok = self.bump();
                effects.push(EffectName {
                    name: SmolStr::new("io"),
                    span: tok.span(),
                });
            } else if self.at_kw(K::Cpu) {
                let tok = self.bump();
                effects.push(EffectName {
                    name: SmolStr::new("cpu"),
                    span: tok.span(),
                });
            } else if self.at_kw(K::TypeWith) {
                self.bump();
                explicit = true;
                loop {
                    if !self.parse_capability_name(&mut caps) {
                        break;
                    }
                    if self.eat(TokenKind::Comma).is_some() || self.eat_kw(K::And).is_some() {
                        continue;
                    }
                    break;
                }
                break;
            } else if self.at(TokenKind::TypeIdent) || self.at(TokenKind::Ident) {
                explicit = true;
                if !self.parse_capability_name(&mut caps) {
                    break;
                }
            } else if effects.is_empty() && caps.is_empty() {
                self.error_at(
                    DiagCode::P014,
                    "expected an effect: 'io', 'cpu', or a capability list",
                    self.peek().span(),
                );
                break;
            } else {
                break;
            }

            if self.eat_kw(K::And).is_some() {
                continue;
            }
            // `io with Http and Sql` continues into the capability list.
            if self.at_kw(K::TypeWith) {
                continue;
            }
            break;
        }

        (effects, caps, explicit)
    }

    /// One capability name. Unknown names are a parse error unless they
    /// match an effect variable in scope.
    fn parse_capability_name(&mut self, caps: &mut Vec<(SmolStr, Span)>) -> bool {
        match self.peek().kind {
            TokenKind::TypeIdent => {
                let tok = self.bump();
                caps.push((tok.value.clone(), tok.span()));
                true
            }
            TokenKind::Ident => {
                let tok = self.bump();
                if self.type_params.iter().any(|p| *p == tok.value) {
                    caps.push((tok.value.clone(), tok.span()));
                    true
                } else {
                    let message = self
                        .lexicon
                        .message(MessageKey::UnknownCapability, &[&tok.value]);
                    self.error_at(DiagCode::P014, message, tok.span());
                    false
                }
            }
            _ => {
                self.unexpected("a capability name");
                false
            }
        }
    }
}

fn module_name_from_path(path: &str) -> String {
    let stem = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .trim_end_matches(".prose")
        .trim_end_matches(".cnl");
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "main".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::parse_en;
    use crate::base::DiagCode;
    use crate::syntax::ast::*;

    #[test]
    fn test_module_header() {
        let result = parse_en("module demo.app.\n");
        assert_eq!(result.module.name.as_ref().unwrap().text, "demo.app");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_header_warns_with_fixit() {
        let result = parse_en("to f, produce Int:\n  return 1.\n");
        let warn = result
            .diagnostics
            .iter()
            .find(|d| d.code == DiagCode::P001)
            .expect("missing header warning");
        assert!(!warn.severity.is_error());
        assert!(!warn.fix_its.is_empty());
    }

    #[test]
    fn test_import_with_alias() {
        let result = parse_en("module m.\nimport util.strings as s.\n");
        let Decl::Import(import) = &result.module.decls[0] else {
            panic!("expected import");
        };
        assert_eq!(import.name, "util.strings");
        assert_eq!(import.alias.as_deref(), Some("s"));
    }

    #[test]
    fn test_data_declaration() {
        let result = parse_en("module m.\ndefine User with name as Text, age as Int required.\n");
        let Decl::Data(data) = &result.module.decls[0] else {
            panic!("expected data");
        };
        assert_eq!(data.name, "User");
        assert_eq!(data.fields.len(), 2);
        assert!(!data.fields[0].type_inferred);
        assert_eq!(data.fields[1].constraints.len(), 1);
    }

    #[test]
    fn test_enum_declaration() {
        let result = parse_en("module m.\ndefine Color as one of Red, Green, Blue.\n");
        let Decl::Enum(e) = &result.module.decls[0] else {
            panic!("expected enum");
        };
        assert_eq!(e.variants.len(), 3);
        assert_eq!(e.variants[0].0, "Red");
    }

    #[test]
    fn test_field_type_inferred_from_name() {
        let result = parse_en("module m.\ndefine Order with email, count.\n");
        let Decl::Data(data) = &result.module.decls[0] else {
            panic!("expected data");
        };
        assert!(data.fields[0].type_inferred);
        assert!(matches!(
            &data.fields[0].ty,
            TypeExpr::Name { text, .. } if text == "Text"
        ));
        assert!(matches!(
            &data.fields[1].ty,
            TypeExpr::Name { text, .. } if text == "Int"
        ));
    }

    #[test]
    fn test_fractional_range_infers_float() {
        let result = parse_en("module m.\ndefine P with score between 0.5 and 1.5.\n");
        let Decl::Data(data) = &result.module.decls[0] else {
            panic!("expected data");
        };
        assert!(matches!(
            &data.fields[0].ty,
            TypeExpr::Name { text, .. } if text == "Float"
        ));
    }

    #[test]
    fn test_function_header_full() {
        let result = parse_en(
            "module m.\nto greet, given who as Text, produce Text, performs io with Http:\n  return who.\n",
        );
        let Decl::Func(f) = &result.module.decls[0] else {
            panic!("expected func");
        };
        assert_eq!(f.name, "greet");
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.effects.len(), 1);
        assert_eq!(f.effect_caps.len(), 1);
        assert_eq!(f.effect_caps[0].0, "Http");
        assert!(f.effect_caps_explicit);
        assert!(f.body.is_some());
    }

    #[test]
    fn test_effect_bracket_list_implies_io() {
        let result = parse_en("module m.\nto f, produce Int, performs [Http, Sql]:\n  return 1.\n");
        let Decl::Func(f) = &result.module.decls[0] else {
            panic!("expected func");
        };
        assert_eq!(f.effects.len(), 1);
        assert_eq!(f.effects[0].name, "io");
        assert_eq!(f.effect_caps.len(), 2);
    }

    #[test]
    fn test_unknown_capability_is_p014() {
        let result = parse_en("module m.\nto f, produce Int, performs io with http:\n  return 1.\n");
        assert!(result.diagnostics.iter().any(|d| d.code == DiagCode::P014));
    }

    #[test]
    fn test_effect_variable_allowed_as_capability() {
        let result =
            parse_en("module m.\nto f[e], given g as Int, produce Int, performs io and e:\n  return 1.\n");
        assert!(
            !result.diagnostics.iter().any(|d| d.code == DiagCode::P014),
            "{:?}",
            result.diagnostics
        );
    }

    #[test]
    fn test_missing_body_is_p013() {
        let result = parse_en("module m.\nto f, produce Int.\n");
        assert!(result.diagnostics.iter().any(|d| d.code == DiagCode::P013));
    }

    #[test]
    fn test_missing_statement_end_has_fixit() {
        let result = parse_en("module m.\nimport util\n");
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.code == DiagCode::P006)
            .expect("P006");
        assert!(!diag.fix_its.is_empty());
    }

    #[test]
    fn test_duplicate_import_alias_is_p011() {
        let result =
            parse_en("module m.\nimport util.strings as s.\nimport util.numbers as s.\n");
        assert!(result.diagnostics.iter().any(|d| d.code == DiagCode::P011));
    }

    #[test]
    fn test_annotation_on_function() {
        let result = parse_en("module m.\n@consent_required\nto f, given e as Text, produce Text:\n  return e.\n");
        let Decl::Func(f) = &result.module.decls[0] else {
            panic!("expected func");
        };
        assert_eq!(f.annotations.len(), 1);
        assert_eq!(f.annotations[0].0, "consent_required");
    }
}
