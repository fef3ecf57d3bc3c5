// A small hand-written tokenizer and recursive-descent reader. This is
// the one concrete realization of the otherwise-opaque parser
// capability the compiler consumes; it is deliberately not a generated
// grammar (there is no separate grammar crate dependency here).

use crate::error::{Result, RuntimeError};

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Num(f64),
    Str(String),
    Sym(String),
}

fn tokenize(line: &str) -> Result<Vec<Tok>> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut toks = Vec::new();
    let two_char_syms = ["==", "!=", "<=", ">=", "//", "**", "<<", ">>", ":="];

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '"' {
            let mut s = String::new();
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                s.push(chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return Err(RuntimeError::Parse {
                    location: line.to_string(),
                    message: "unterminated string literal".to_string(),
                });
            }
            i += 1;
            toks.push(Tok::Str(s));
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                if chars[i] == '.' {
                    is_float = true;
                }
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            if is_float {
                let n: f64 = text.parse().map_err(|_| RuntimeError::Parse {
                    location: line.to_string(),
                    message: format!("bad number literal '{}'", text),
                })?;
                toks.push(Tok::Num(n));
            } else {
                let n: i64 = text.parse().map_err(|_| RuntimeError::Parse {
                    location: line.to_string(),
                    message: format!("bad integer literal '{}'", text),
                })?;
                toks.push(Tok::Int(n));
            }
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            toks.push(Tok::Ident(text));
            continue;
        }
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        if two_char_syms.contains(&two.as_str()) {
            toks.push(Tok::Sym(two));
            i += 2;
            continue;
        }
        toks.push(Tok::Sym(c.to_string()));
        i += 1;
    }
    Ok(toks)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedExpr {
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(String),
    Id(String),
    Dot(String, String),
    Negate(Box<ParsedExpr>),
    Not(Box<ParsedExpr>),
    Binary(BinOp, Box<ParsedExpr>, Box<ParsedExpr>),
}

/// A reference (plain name, or `name.field`) as it appears on the
/// left of an assignment or as a call target.
#[derive(Clone, Debug, PartialEq)]
pub struct Ref {
    pub target: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParsedStatement {
    Expression(ParsedExpr),
    Constructor {
        name: String,
        expander: Option<String>,
        type_name: String,
        args: Vec<ParsedExpr>,
    },
    MethodCall {
        target: String,
        method: String,
        args: Vec<ParsedExpr>,
    },
    RoutineCallStmt(String),
    PropertyAssignment {
        target: String,
        property: String,
        expr: ParsedExpr,
    },
    VariableAssignment {
        name: String,
        expr: ParsedExpr,
    },
    VariableDecl {
        type_name: String,
        name: String,
        init: Option<ParsedExpr>,
    },
    RoutineDef {
        name: String,
        actions: Vec<ParsedStatement>,
    },
    RuleDef {
        condition: ParsedExpr,
        actions: Vec<ParsedStatement>,
    },
    Await(ParsedExpr),
    AwaitRoutine(String),
}

const TYPE_KEYWORDS: &[&str] = &["boolean", "integer", "number", "string"];

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
    text: String,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Tok> {
        self.toks.get(self.pos + n)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::Parse {
            location: self.text.clone(),
            message: message.into(),
        }
    }

    fn expect_sym(&mut self, sym: &str) -> Result<()> {
        match self.advance() {
            Some(Tok::Sym(ref s)) if s == sym => Ok(()),
            other => Err(self.err(format!("expected '{}', got {:?}", sym, other))),
        }
    }

    fn at_sym(&self, sym: &str) -> bool {
        matches!(self.peek(), Some(Tok::Sym(s)) if s == sym)
    }

    fn at_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(s)) if s == name)
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Tok::Ident(s)) => Ok(s),
            other => Err(self.err(format!("expected identifier, got {:?}", other))),
        }
    }

    // --- expressions, lowest to highest precedence ---

    fn parse_expr(&mut self) -> Result<ParsedExpr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_and()?;
        while self.at_ident("or") {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = ParsedExpr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_not()?;
        while self.at_ident("and") {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = ParsedExpr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<ParsedExpr> {
        if self.at_ident("not") {
            self.advance();
            return Ok(ParsedExpr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<ParsedExpr> {
        let lhs = self.parse_bitor()?;
        let op = match self.peek() {
            Some(Tok::Sym(s)) => match s.as_str() {
                "<" => Some(BinOp::Lt),
                "<=" => Some(BinOp::Lte),
                ">" => Some(BinOp::Gt),
                ">=" => Some(BinOp::Gte),
                "==" => Some(BinOp::Eq),
                "!=" => Some(BinOp::Neq),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_bitor()?;
            return Ok(ParsedExpr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_bitxor()?;
        while self.at_sym("|") {
            self.advance();
            let rhs = self.parse_bitxor()?;
            lhs = ParsedExpr::Binary(BinOp::BitOr, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_bitand()?;
        while self.at_sym("^") {
            self.advance();
            let rhs = self.parse_bitand()?;
            lhs = ParsedExpr::Binary(BinOp::BitXor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_shift()?;
        while self.at_sym("&") {
            self.advance();
            let rhs = self.parse_shift()?;
            lhs = ParsedExpr::Binary(BinOp::BitAnd, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym(s)) if s == "<<" => Some(BinOp::Shl),
                Some(Tok::Sym(s)) if s == ">>" => Some(BinOp::Shr),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.advance();
                    let rhs = self.parse_add()?;
                    lhs = ParsedExpr::Binary(op, Box::new(lhs), Box::new(rhs));
                }
                None => break,
            }
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym(s)) if s == "+" => Some(BinOp::Add),
                Some(Tok::Sym(s)) if s == "-" => Some(BinOp::Sub),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.advance();
                    let rhs = self.parse_mul()?;
                    lhs = ParsedExpr::Binary(op, Box::new(lhs), Box::new(rhs));
                }
                None => break,
            }
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<ParsedExpr> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym(s)) if s == "*" => Some(BinOp::Mul),
                Some(Tok::Sym(s)) if s == "/" => Some(BinOp::Div),
                Some(Tok::Sym(s)) if s == "//" => Some(BinOp::FloorDiv),
                Some(Tok::Sym(s)) if s == "%" => Some(BinOp::Mod),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.advance();
                    let rhs = self.parse_pow()?;
                    lhs = ParsedExpr::Binary(op, Box::new(lhs), Box::new(rhs));
                }
                None => break,
            }
        }
        Ok(lhs)
    }

    fn parse_pow(&mut self) -> Result<ParsedExpr> {
        let lhs = self.parse_unary()?;
        if self.at_sym("**") {
            self.advance();
            let rhs = self.parse_pow()?;
            return Ok(ParsedExpr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ParsedExpr> {
        if self.at_sym("-") {
            self.advance();
            return Ok(ParsedExpr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ParsedExpr> {
        match self.advance() {
            Some(Tok::Int(i)) => Ok(ParsedExpr::Int(i)),
            Some(Tok::Num(n)) => Ok(ParsedExpr::Number(n)),
            Some(Tok::Str(s)) => Ok(ParsedExpr::Str(s)),
            Some(Tok::Ident(ref s)) if s == "true" => Ok(ParsedExpr::Bool(true)),
            Some(Tok::Ident(ref s)) if s == "false" => Ok(ParsedExpr::Bool(false)),
            Some(Tok::Ident(name)) => {
                if self.at_sym(".") {
                    self.advance();
                    let field = self.expect_ident()?;
                    Ok(ParsedExpr::Dot(name, field))
                } else {
                    Ok(ParsedExpr::Id(name))
                }
            }
            Some(Tok::Sym(ref s)) if s == "(" => {
                let e = self.parse_expr()?;
                self.expect_sym(")")?;
                Ok(e)
            }
            other => Err(self.err(format!("expected expression, got {:?}", other))),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<ParsedExpr>> {
        self.expect_sym("(")?;
        let mut args = Vec::new();
        if !self.at_sym(")") {
            args.push(self.parse_expr()?);
            while self.at_sym(",") {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.expect_sym(")")?;
        Ok(args)
    }

    // --- statements ---

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn parse_statement(&mut self) -> Result<ParsedStatement> {
        if let Some(Tok::Ident(ref kw)) = self.peek() {
            if TYPE_KEYWORDS.contains(&kw.as_str()) {
                return self.parse_var_decl();
            }
            if kw == "when" {
                return self.parse_rule_def();
            }
        }
        if matches!(self.peek(), Some(Tok::Ident(_)))
            && matches!(self.peek_at(1), Some(Tok::Sym(s)) if s == ":=")
        {
            return self.parse_routine_def();
        }
        self.parse_simple_statement()
    }

    fn parse_var_decl(&mut self) -> Result<ParsedStatement> {
        let type_name = self.expect_ident()?;
        let name = self.expect_ident()?;
        let init = if self.at_sym("=") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(ParsedStatement::VariableDecl { type_name, name, init })
    }

    fn parse_block(&mut self) -> Result<Vec<ParsedStatement>> {
        self.expect_sym("(")?;
        let mut actions = Vec::new();
        if !self.at_sym(")") {
            actions.push(self.parse_action()?);
            while self.at_sym(";") {
                self.advance();
                actions.push(self.parse_action()?);
            }
        }
        self.expect_sym(")")?;
        Ok(actions)
    }

    fn parse_routine_def(&mut self) -> Result<ParsedStatement> {
        let name = self.expect_ident()?;
        self.expect_sym(":=")?;
        let actions = self.parse_block()?;
        Ok(ParsedStatement::RoutineDef { name, actions })
    }

    fn parse_rule_def(&mut self) -> Result<ParsedStatement> {
        self.advance(); // "when"
        let condition = self.parse_expr()?;
        let actions = self.parse_block()?;
        Ok(ParsedStatement::RuleDef { condition, actions })
    }

    fn parse_action(&mut self) -> Result<ParsedStatement> {
        if self.at_ident("await") {
            self.advance();
            // `await name()` with no further tokens before `;`/`)` refers
            // to a routine; anything else is a boolean condition.
            if matches!(self.peek(), Some(Tok::Ident(_)))
                && matches!(self.peek_at(1), Some(Tok::Sym(s)) if s == "(")
                && matches!(self.peek_at(2), Some(Tok::Sym(s)) if s == ")")
            {
                let name = self.expect_ident()?;
                self.advance();
                self.advance();
                return Ok(ParsedStatement::AwaitRoutine(name));
            }
            return Ok(ParsedStatement::Await(self.parse_expr()?));
        }
        self.parse_simple_statement()
    }

    /// Everything that starts with an identifier: method calls,
    /// routine calls, constructors, and the two assignment forms.
    fn parse_simple_statement(&mut self) -> Result<ParsedStatement> {
        if !matches!(self.peek(), Some(Tok::Ident(_))) {
            return Ok(ParsedStatement::Expression(self.parse_expr()?));
        }
        let name = self.expect_ident()?;

        if self.at_sym(".") {
            self.advance();
            let field = self.expect_ident()?;
            if self.at_sym("(") {
                let args = self.parse_args()?;
                return Ok(ParsedStatement::MethodCall {
                    target: name,
                    method: field,
                    args,
                });
            }
            self.expect_sym("=")?;
            let expr = self.parse_expr()?;
            return Ok(ParsedStatement::PropertyAssignment {
                target: name,
                property: field,
                expr,
            });
        }

        if self.at_sym("(") {
            let args = self.parse_args()?;
            if args.is_empty() && self.at_end() {
                return Ok(ParsedStatement::RoutineCallStmt(name));
            }
            // A bare call with arguments but no target and no
            // assignment is still only meaningful as a routine call;
            // routines take no arguments, so surface it plainly.
            return Ok(ParsedStatement::RoutineCallStmt(name));
        }

        if self.at_sym("=") {
            self.advance();
            // Constructor: `name = Expander.Type(args)` or `name = Type(args)`.
            if matches!(self.peek(), Some(Tok::Ident(_))) {
                let first = self.expect_ident()?;
                if self.at_sym(".") {
                    self.advance();
                    let type_name = self.expect_ident()?;
                    if self.at_sym("(") {
                        let args = self.parse_args()?;
                        return Ok(ParsedStatement::Constructor {
                            name,
                            expander: Some(first),
                            type_name,
                            args,
                        });
                    }
                    // Not actually a constructor; rewind to a property
                    // expression `first.type_name` as the RHS.
                    let expr = self.finish_binary_from(ParsedExpr::Dot(first, type_name))?;
                    return Ok(ParsedStatement::VariableAssignment { name, expr });
                }
                if self.at_sym("(") {
                    let args = self.parse_args()?;
                    return Ok(ParsedStatement::Constructor {
                        name,
                        expander: None,
                        type_name: first,
                        args,
                    });
                }
                let expr = self.finish_binary_from(ParsedExpr::Id(first))?;
                return Ok(ParsedStatement::VariableAssignment { name, expr });
            }
            let expr = self.parse_expr()?;
            return Ok(ParsedStatement::VariableAssignment { name, expr });
        }

        // A bare name (or the start of a larger expression, e.g. `x + 1`)
        // used as a top-level expression statement.
        let expr = self.finish_binary_from(ParsedExpr::Id(name))?;
        Ok(ParsedStatement::Expression(expr))
    }

    /// Continue precedence-climbing parsing an expression whose lowest
    /// primary has already been consumed (used when a statement's
    /// lookahead for `=`/`(`/`.` turns out to just be an ordinary
    /// expression after all).
    fn finish_binary_from(&mut self, seed: ParsedExpr) -> Result<ParsedExpr> {
        // Re-parsing from scratch with the seed spliced in is simplest:
        // there is no more input to our left, so just resume at the
        // same precedence level an identifier primary would occupy.
        let mut lhs = seed;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym(s)) => match s.as_str() {
                    "+" => Some(BinOp::Add),
                    "-" => Some(BinOp::Sub),
                    "*" => Some(BinOp::Mul),
                    "/" => Some(BinOp::Div),
                    "//" => Some(BinOp::FloorDiv),
                    "%" => Some(BinOp::Mod),
                    "**" => Some(BinOp::Pow),
                    "&" => Some(BinOp::BitAnd),
                    "|" => Some(BinOp::BitOr),
                    "^" => Some(BinOp::BitXor),
                    "<<" => Some(BinOp::Shl),
                    ">>" => Some(BinOp::Shr),
                    "<" => Some(BinOp::Lt),
                    "<=" => Some(BinOp::Lte),
                    ">" => Some(BinOp::Gt),
                    ">=" => Some(BinOp::Gte),
                    "==" => Some(BinOp::Eq),
                    "!=" => Some(BinOp::Neq),
                    _ => None,
                },
                Some(Tok::Ident(s)) if s == "and" => Some(BinOp::And),
                Some(Tok::Ident(s)) if s == "or" => Some(BinOp::Or),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.advance();
                    let rhs = self.parse_or()?;
                    lhs = ParsedExpr::Binary(op, Box::new(lhs), Box::new(rhs));
                }
                None => break,
            }
        }
        Ok(lhs)
    }
}

/// Parse a broadcast wire line of the form `name.prop=value;prop2=value2;…`
/// (the shape `Module::step` emits when broadcasting, §6). Returns `None`
/// if `text` isn't in exactly this shape, so the caller can fall back to
/// compiling it as an ordinary statement - this is a distinct grammar
/// from `parse_line`'s, not a subset of it, since the general statement
/// grammar only allows `;`-joined lists inside routine/rule parens.
pub fn parse_broadcast(text: &str) -> Option<(String, Vec<(String, crate::value::Value)>)> {
    let toks = tokenize(text).ok()?;
    let mut p = Parser {
        toks,
        pos: 0,
        text: text.to_string(),
    };
    let name = match p.advance()? {
        Tok::Ident(s) => s,
        _ => return None,
    };
    if !p.at_sym(".") {
        return None;
    }
    p.advance();

    let mut pairs = Vec::new();
    loop {
        let prop = match p.advance()? {
            Tok::Ident(s) => s,
            _ => return None,
        };
        if !p.at_sym("=") {
            return None;
        }
        p.advance();
        let value = match p.advance()? {
            Tok::Ident(ref s) if s == "true" => crate::value::Value::Boolean(true),
            Tok::Ident(ref s) if s == "false" => crate::value::Value::Boolean(false),
            Tok::Int(i) => crate::value::Value::Integer(i),
            Tok::Num(n) => crate::value::Value::Number(n),
            Tok::Str(s) => crate::value::Value::String(s),
            _ => return None,
        };
        pairs.push((prop, value));
        if p.at_sym(";") {
            p.advance();
            continue;
        }
        break;
    }
    if !p.at_end() {
        return None;
    }
    Some((name, pairs))
}

/// Parse a single line of the DSL into a top-level statement.
pub fn parse_line(line: &str) -> Result<ParsedStatement> {
    let toks = tokenize(line)?;
    let mut parser = Parser {
        toks,
        pos: 0,
        text: line.to_string(),
    };
    if parser.at_end() {
        return Err(parser.err("empty line"));
    }
    let stmt = parser.parse_statement()?;
    if !parser.at_end() {
        return Err(parser.err("trailing tokens after statement"));
    }
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variable_declaration_with_initializer() {
        let stmt = parse_line("number x = 1.5").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::VariableDecl {
                type_name: "number".into(),
                name: "x".into(),
                init: Some(ParsedExpr::Number(1.5)),
            }
        );
    }

    #[test]
    fn parses_variable_assignment_with_arithmetic() {
        let stmt = parse_line("x = x + 2").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::VariableAssignment {
                name: "x".into(),
                expr: ParsedExpr::Binary(
                    BinOp::Add,
                    Box::new(ParsedExpr::Id("x".into())),
                    Box::new(ParsedExpr::Int(2))
                ),
            }
        );
    }

    #[test]
    fn parses_constructor() {
        let stmt = parse_line("m = Output(2)").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::Constructor {
                name: "m".into(),
                expander: None,
                type_name: "Output".into(),
                args: vec![ParsedExpr::Int(2)],
            }
        );
    }

    #[test]
    fn parses_proxy_constructor_with_expander_prefix() {
        let stmt = parse_line("p = exp.Output(3)").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::Constructor {
                name: "p".into(),
                expander: Some("exp".into()),
                type_name: "Output".into(),
                args: vec![ParsedExpr::Int(3)],
            }
        );
    }

    #[test]
    fn parses_method_call() {
        let stmt = parse_line("m.on()").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::MethodCall {
                target: "m".into(),
                method: "on".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn parses_routine_definition_with_await_condition_and_assignment() {
        let stmt = parse_line("r := (await x > 3; x = 0)").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::RoutineDef {
                name: "r".into(),
                actions: vec![
                    ParsedStatement::Await(ParsedExpr::Binary(
                        BinOp::Gt,
                        Box::new(ParsedExpr::Id("x".into())),
                        Box::new(ParsedExpr::Int(3))
                    )),
                    ParsedStatement::VariableAssignment {
                        name: "x".into(),
                        expr: ParsedExpr::Int(0),
                    },
                ],
            }
        );
    }

    #[test]
    fn parses_rule_definition() {
        let stmt = parse_line("when flag (flag = false)").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::RuleDef {
                condition: ParsedExpr::Id("flag".into()),
                actions: vec![ParsedStatement::VariableAssignment {
                    name: "flag".into(),
                    expr: ParsedExpr::Bool(false),
                }],
            }
        );
    }

    #[test]
    fn parses_property_assignment() {
        let stmt = parse_line("m.threshold = 3.0").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::PropertyAssignment {
                target: "m".into(),
                property: "threshold".into(),
                expr: ParsedExpr::Number(3.0),
            }
        );
    }

    #[test]
    fn trailing_garbage_is_a_parse_error() {
        assert!(parse_line("x = 1 2").is_err());
    }

    #[test]
    fn parses_multi_property_broadcast_wire_format() {
        let (name, pairs) = parse_broadcast("p.state=true;count=3").unwrap();
        assert_eq!(name, "p");
        assert_eq!(
            pairs,
            vec![
                ("state".to_string(), crate::value::Value::Boolean(true)),
                ("count".to_string(), crate::value::Value::Integer(3)),
            ]
        );
    }

    #[test]
    fn broadcast_parser_rejects_ordinary_method_calls() {
        assert!(parse_broadcast("m.on()").is_none());
    }
}
