//! Pretty printer emitting the canonical English surface.
//!
//! For any well-formed module, printing and reparsing yields an
//! equivalent AST modulo span positions. Word operators print in infix
//! form with precedence-aware parenthesization, so the desugared `Call`
//! shape round-trips.

use std::fmt::Write as _;

use super::ast::*;

/// Render a module as canonical source text.
pub fn print_module(module: &Module) -> String {
    let mut p = Printer::default();
    if let Some(name) = &module.name {
        p.line(&format!("module {}.", name.text));
        p.blank();
    }
    for decl in &module.decls {
        match decl {
            Decl::Import(i) => p.print_import(i),
            Decl::Data(d) => p.print_data(d),
            Decl::Enum(e) => p.print_enum(e),
            Decl::Func(f) => {
                p.print_func(f);
                p.blank();
            }
        }
    }
    let mut out = p.out;
    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        if !self.out.ends_with("\n\n") && !self.out.is_empty() {
            self.out.push('\n');
        }
    }

    fn print_import(&mut self, import: &Import) {
        match &import.alias {
            Some(alias) => self.line(&format!("import {} as {}.", import.name, alias)),
            None => self.line(&format!("import {}.", import.name)),
        }
    }

    fn print_data(&mut self, data: &Data) {
        let fields: Vec<String> = data.fields.iter().map(print_field).collect();
        self.line(&format!("define {} with {}.", data.name, fields.join(", ")));
    }

    fn print_enum(&mut self, e: &EnumDecl) {
        let variants: Vec<&str> = e.variants.iter().map(|(v, _)| v.as_str()).collect();
        self.line(&format!(
            "define {} as one of {}.",
            e.name,
            variants.join(", ")
        ));
    }

    fn print_func(&mut self, f: &Func) {
        for (ann, _) in &f.annotations {
            self.line(&format!("@{ann}"));
        }

        let mut header = format!("to {}", f.name);
        if !f.type_params.is_empty() {
            let _ = write!(header, "[{}]", f.type_params.join(", "));
        }
        if !f.params.is_empty() {
            let params: Vec<String> = f
                .params
                .iter()
                .map(|p| format!("{} as {}", p.name, print_type(&p.ty)))
                .collect();
            let _ = write!(header, ", given {}", params.join(" and "));
        }
        if let Some(ret) = &f.ret_type {
            let _ = write!(header, ", produce {}", print_type(ret));
        }
        if !f.effects.is_empty() || !f.effect_caps.is_empty() {
            let effects: Vec<&str> = f.effects.iter().map(|e| e.name.as_str()).collect();
            let base = if effects.is_empty() {
                "io".to_string()
            } else {
                effects.join(" and ")
            };
            let _ = write!(header, ", performs {base}");
            if !f.effect_caps.is_empty() {
                let caps: Vec<&str> = f.effect_caps.iter().map(|(c, _)| c.as_str()).collect();
                let _ = write!(header, " with {}", caps.join(" and "));
            }
        }

        match &f.body {
            None => self.line(&format!("{header}.")),
            Some(body) => {
                self.line(&format!("{header}:"));
                self.indent += 1;
                for stmt in body {
                    self.print_statement(stmt);
                }
                self.indent -= 1;
            }
        }
    }

    fn print_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Let { name, value, .. } => {
                self.line(&format!("let {} be {}.", name, print_expr(value, 0)));
            }
            Statement::Set { name, value, .. } => {
                self.line(&format!("set {} to {}.", name, print_expr(value, 0)));
            }
            Statement::Return { value, .. } => match value {
                Some(e) => self.line(&format!("return {}.", print_expr(e, 0))),
                None => self.line("return."),
            },
            Statement::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.line(&format!("if {}:", print_expr(cond, 0)));
                self.block(then);
                if let Some(otherwise) = otherwise {
                    self.line("otherwise:");
                    self.block(otherwise);
                }
            }
            Statement::Match { expr, cases, .. } => {
                self.line(&format!("match {}:", print_expr(expr, 0)));
                self.indent += 1;
                for case in cases {
                    self.line(&format!("when {}:", print_pattern(&case.pattern)));
                    self.block(&case.body);
                }
                self.indent -= 1;
            }
            Statement::Start { name, expr, .. } => {
                self.line(&format!("start {} as {}.", name, print_expr(expr, 0)));
            }
            Statement::Wait { names, .. } => {
                let names: Vec<&str> = names.iter().map(|(n, _)| n.as_str()).collect();
                self.line(&format!("wait for {}.", names.join(" and ")));
            }
            Statement::Workflow(wf) => self.print_workflow(wf),
            Statement::Scope { name, body, .. } => {
                self.line(&format!("within scope {name}:"));
                self.block(body);
            }
            Statement::ForEach {
                var, iter, body, ..
            } => {
                self.line(&format!("for each {} in {}:", var, print_expr(iter, 0)));
                self.block(body);
            }
            Statement::Block { body, .. } => {
                for stmt in body {
                    self.print_statement(stmt);
                }
            }
            Statement::Expr { expr, .. } => {
                self.line(&format!("{}.", print_expr(expr, 0)));
            }
        }
    }

    fn block(&mut self, stmts: &[Statement]) {
        self.indent += 1;
        for stmt in stmts {
            self.print_statement(stmt);
        }
        self.indent -= 1;
    }

    fn print_workflow(&mut self, wf: &WorkflowStmt) {
        self.line("workflow:");
        self.indent += 1;
        for step in &wf.steps {
            let mut head = format!("step {}", step.name);
            if !step.depends_on.is_empty() {
                let deps: Vec<&str> = step.depends_on.iter().map(|(d, _)| d.as_str()).collect();
                let _ = write!(head, ", depends on {}", deps.join(" and "));
            }
            self.line(&format!("{head}:"));
            self.indent += 1;
            for stmt in &step.body {
                self.print_statement(stmt);
            }
            if let Some(compensate) = &step.compensate {
                self.line("compensate:");
                self.block(compensate);
            }
            self.indent -= 1;
        }
        if let Some(retry) = &wf.retry {
            self.line(&format!(
                "retry max attempts {} backoff {}.",
                retry.max_attempts,
                retry.backoff.as_str()
            ));
        }
        if let Some(timeout) = &wf.timeout {
            self.line(&format!("timeout within {}.", timeout.millis));
        }
        self.indent -= 1;
    }
}

fn print_field(field: &Field) -> String {
    let mut out = field.name.to_string();
    if !field.type_inferred {
        let _ = write!(out, " as {}", print_type(&field.ty));
    }
    for c in &field.constraints {
        match c {
            Constraint::Required { .. } => out.push_str(" required"),
            Constraint::Range { min, max, .. } => match (min, max) {
                (Some(min), Some(max)) => {
                    let _ = write!(out, " between {} and {}", num(*min), num(*max));
                }
                (Some(min), None) => {
                    let _ = write!(out, " at least {}", num(*min));
                }
                (None, Some(max)) => {
                    let _ = write!(out, " at most {}", num(*max));
                }
                (None, None) => {}
            },
            Constraint::Pattern { regex, .. } => {
                let _ = write!(out, " matching pattern \"{}\"", escape(regex));
            }
        }
    }
    out
}

fn num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:?}")
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Render a type expression.
pub fn print_type(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Name { text, .. } => text.to_string(),
        TypeExpr::Var { name, .. } | TypeExpr::EffectVar { name, .. } => name.to_string(),
        TypeExpr::App { base, args, .. } => {
            let args: Vec<String> = args.iter().map(print_type).collect();
            format!("{} of {}", base, args.join(" and "))
        }
        TypeExpr::Maybe { inner, .. } => format!("maybe {}", print_type(inner)),
        TypeExpr::Option { inner, .. } => format!("option of {}", print_type(inner)),
        TypeExpr::Result { ok, err, .. } => match err {
            Some(err) => format!("result of {} or {}", print_type(ok), print_type(err)),
            None => format!("result of {}", print_type(ok)),
        },
        TypeExpr::List { elem, .. } => format!("list of {}", print_type(elem)),
        TypeExpr::Map { key, value, .. } => {
            format!("map {} to {}", print_type(key), print_type(value))
        }
        TypeExpr::Func {
            params,
            ret,
            effects,
            caps,
            ..
        } => {
            let mut out = String::from("(");
            if !params.is_empty() {
                let params: Vec<String> = params.iter().map(print_type).collect();
                let _ = write!(out, "given {}, ", params.join(" and "));
            }
            let _ = write!(out, "produce {}", print_type(ret));
            if !effects.is_empty() || !caps.is_empty() {
                let base = if effects.is_empty() {
                    "io".to_string()
                } else {
                    effects.join(" and ")
                };
                let _ = write!(out, ", performs {base}");
                if !caps.is_empty() {
                    let _ = write!(out, " with {}", caps.join(" and "));
                }
            }
            out.push(')');
            out
        }
        TypeExpr::Pii {
            base,
            level,
            category,
            ..
        } => format!(
            "@pii({}, {}) {}",
            level.as_str(),
            category.as_str(),
            print_type(base)
        ),
    }
}

fn print_pattern(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Null { .. } => "null".to_string(),
        Pattern::Int { value, .. } => value.to_string(),
        Pattern::Name { name, .. } => name.to_string(),
        Pattern::Ctor {
            type_name,
            names,
            args,
            ..
        } => {
            let mut out = match type_name.as_str() {
                "Ok" => "ok".to_string(),
                "Err" => "err".to_string(),
                "Some" => "some".to_string(),
                "None" => "none".to_string(),
                other => other.to_string(),
            };
            let wrapper = matches!(type_name.as_str(), "Ok" | "Err" | "Some" | "None");
            if !names.is_empty() {
                if wrapper || names.len() == 1 {
                    let _ = write!(out, " {}", names[0].0);
                } else {
                    let names: Vec<&str> = names.iter().map(|(n, _)| n.as_str()).collect();
                    let _ = write!(out, " with {}", names.join(" and "));
                }
            }
            for arg in args {
                let _ = write!(out, " {}", print_pattern(arg));
            }
            out
        }
    }
}

/// Operator precedence for infix rendering; mirrors the parser.
fn precedence(name: &str) -> Option<u8> {
    match name {
        "or" => Some(1),
        "and" => Some(2),
        "lessThan" | "greaterThan" | "equals" | "notEquals" | "atLeast" | "atMost" => Some(4),
        "plus" | "minus" => Some(5),
        "times" | "dividedBy" => Some(6),
        _ => None,
    }
}

fn infix_phrase(name: &str) -> &'static str {
    match name {
        "or" => "or",
        "and" => "and",
        "lessThan" => "is less than",
        "greaterThan" => "is greater than",
        "equals" => "is equal to",
        "notEquals" => "!=",
        "atLeast" => "at least",
        "atMost" => "at most",
        "plus" => "plus",
        "minus" => "minus",
        "times" => "times",
        "dividedBy" => "divided by",
        _ => "",
    }
}

/// Render an expression; `min_prec` drives parenthesization.
pub fn print_expr(expr: &Expr, min_prec: u8) -> String {
    match expr {
        Expr::Name { text, .. } => text.to_string(),
        Expr::Bool { value, .. } => value.to_string(),
        Expr::Int { value, .. } => value.to_string(),
        Expr::Long { value, .. } => format!("{value}L"),
        Expr::Double { value, .. } => format!("{value:?}"),
        Expr::Str { value, .. } => format!("\"{}\"", escape(value)),
        Expr::Null { .. } => "null".to_string(),
        Expr::None { .. } => "none".to_string(),
        Expr::Ok { expr, .. } => wrap_if(format!("ok {}", print_expr(expr, 7)), min_prec > 6),
        Expr::Err { expr, .. } => wrap_if(format!("err {}", print_expr(expr, 7)), min_prec > 6),
        Expr::Some { expr, .. } => wrap_if(format!("some {}", print_expr(expr, 7)), min_prec > 6),
        Expr::Await { expr, .. } => {
            wrap_if(format!("await {}", print_expr(expr, 7)), min_prec > 6)
        }
        Expr::Lambda {
            params,
            ret_type,
            body,
            ..
        } => {
            let params: Vec<String> = params
                .iter()
                .map(|p| format!("{} as {}", p.name, print_type(&p.ty)))
                .collect();
            let ret = ret_type
                .as_ref()
                .map(|t| format!(" : {}", print_type(t)))
                .unwrap_or_default();
            // Lambdas always parenthesize; they only appear as call args
            // in practice and the parens keep the body unambiguous.
            format!("(given {}{} -> {})", params.join(" and "), ret, print_expr(body, 0))
        }
        Expr::Construct {
            type_name, fields, ..
        } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{} = {}", name, print_expr(value, 0)))
                .collect();
            wrap_if(
                format!("{} with {}", type_name, fields.join(", ")),
                min_prec > 0,
            )
        }
        Expr::Call { target, args, .. } => {
            // Builtin binary operators render infix.
            if let Expr::Name { text, .. } = &**target {
                if args.len() == 2 {
                    if let Some(prec) = precedence(text) {
                        let rendered = format!(
                            "{} {} {}",
                            print_expr(&args[0], prec),
                            infix_phrase(text),
                            print_expr(&args[1], prec + 1)
                        );
                        return wrap_if(rendered, min_prec > prec);
                    }
                }
                if text == "not" && args.len() == 1 {
                    return wrap_if(
                        format!("not {}", print_expr(&args[0], 4)),
                        min_prec > 3,
                    );
                }
            }
            let args: Vec<String> = args.iter().map(|a| print_expr(a, 0)).collect();
            format!("{}({})", print_expr(target, 8), args.join(", "))
        }
    }
}

fn wrap_if(text: String, wrap: bool) -> String {
    if wrap {
        format!("({text})")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::test_support::parse_en;

    use super::*;

    /// Strip spans so modules compare structurally.
    fn reparse_equals(source: &str) {
        let first = parse_en(source);
        assert!(
            first.ok(),
            "fixture should parse cleanly: {:?}",
            first.diagnostics
        );
        let printed = print_module(&first.module);
        let second = parse_en(&printed);
        assert!(
            second.ok(),
            "printed output should reparse cleanly:\n{printed}\n{:?}",
            second.diagnostics
        );
        let reprinted = print_module(&second.module);
        assert_eq!(printed, reprinted, "print → parse → print must be stable");
    }

    #[test]
    fn test_round_trip_data_and_enum() {
        reparse_equals(
            "module shop.\ndefine User with name as Text required, age as Int between 1 and 150.\ndefine Color as one of Red, Green, Blue.\n",
        );
    }

    #[test]
    fn test_round_trip_function() {
        reparse_equals(
            "module shop.\nto greet, given who as Text, produce Text, performs io with Http:\n  let msg be \"hi\".\n  return msg.\n",
        );
    }

    #[test]
    fn test_round_trip_control_flow() {
        reparse_equals(
            "module shop.\nto f, given x as Int, produce Int:\n  if x is less than 3:\n    return 0.\n  otherwise:\n    return x plus 1 times 2.\n",
        );
    }

    #[test]
    fn test_round_trip_match_and_wrappers() {
        reparse_equals(
            "module shop.\nto f, given r as result of Int or Text, produce Int:\n  match r:\n    when ok value:\n      return value.\n    when err e:\n      return 0.\n",
        );
    }

    #[test]
    fn test_round_trip_workflow() {
        reparse_equals(
            "module shop.\nto run, produce Int, performs io:\n  workflow:\n    step validate:\n      check().\n    step charge, depends on validate:\n      pay().\n      compensate:\n        refund().\n    retry max attempts 3 backoff exponential.\n    timeout within 30000.\n  return 1.\n",
        );
    }

    #[test]
    fn test_precedence_parenthesization() {
        // (1 plus 2) times 3 must keep its grouping through a round trip.
        let src = "module m.\nto f, produce Int:\n  return (1 plus 2) times 3.\n";
        let first = parse_en(src);
        let printed = print_module(&first.module);
        assert!(printed.contains("(1 plus 2) times 3"), "{printed}");
    }

    #[test]
    fn test_pii_type_round_trip() {
        reparse_equals(
            "module m.\nto send, given email as @pii(L2, email) Text, produce Text, performs io with Http:\n  return email.\n",
        );
    }
}
