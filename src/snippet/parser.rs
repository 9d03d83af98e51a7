//! Typed AST and recursive-descent parser for the definition language.
//!
//! Allow-list-first grammar: the only statement forms that parse at all are
//! class definitions, annotated field declarations, plain assignments,
//! docstrings, `pass`, bare expressions, and import statements (parsed only
//! so the validator can name them in its reject). Function definitions,
//! decorators, control flow and inline suites are parse errors outright;
//! "cannot be expressed" beats "expressed but denied".

use serde_json::Value;

use super::lexer::{self, Tok, Token};

// -------------------------------- AST ------------------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    ClassDef(ClassDef),
    Field(FieldDecl),
    Assign { name: String, value: Expr, line: usize },
    Expr { value: Expr, line: usize },
    Docstring { text: String, line: usize },
    Pass { line: usize },
    Import { line: usize },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::ClassDef(c) => c.line,
            Stmt::Field(f) => f.line,
            Stmt::Assign { line, .. }
            | Stmt::Expr { line, .. }
            | Stmt::Docstring { line, .. }
            | Stmt::Pass { line }
            | Stmt::Import { line } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub annotation: Expr,
    pub default: Option<Expr>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Literal(Value),
    Attribute { value: Box<Expr>, attr: String },
    Call { func: Box<Expr>, args: Vec<Expr>, kwargs: Vec<(String, Expr)> },
    Subscript { value: Box<Expr>, index: Vec<Expr> },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
}

// ------------------------------- Errors ----------------------------------- //

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error("line {line}: {msg}")]
    Unexpected { line: usize, msg: String },
}

// ------------------------------- Parser ----------------------------------- //

pub fn parse(src: &str) -> Result<Module, ParseError> {
    let tokens = lexer::tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut stmts = Vec::new();
    while parser.peek().is_some() {
        if parser.eat(&Tok::Newline) {
            continue;
        }
        stmts.push(parser.statement()?);
    }
    Ok(Module { stmts })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::Unexpected { line: self.line(), msg: msg.into() }
    }

    fn expect(&mut self, tok: Tok, context: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if *t == tok => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => Err(self.err(format!("expected {tok} {context}, found {t}"))),
            None => Err(self.err(format!("expected {tok} {context}, found end of input"))),
        }
    }

    fn expect_name(&mut self, context: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Tok::Name(_)) => match self.bump() {
                Some(Token { tok: Tok::Name(name), .. }) => Ok(name),
                _ => unreachable!(),
            },
            Some(t) => Err(self.err(format!("expected a name {context}, found {t}"))),
            None => Err(self.err(format!("expected a name {context}, found end of input"))),
        }
    }

    fn end_of_line(&mut self) -> Result<(), ParseError> {
        match self.bump() {
            None | Some(Token { tok: Tok::Newline, .. }) => Ok(()),
            Some(Token { tok, line }) => Err(ParseError::Unexpected {
                line,
                msg: format!("expected end of line, found {tok}"),
            }),
        }
    }

    // ----------------------------- Statements ----------------------------- //

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        match self.peek() {
            Some(Tok::KwClass) => self.class_def().map(Stmt::ClassDef),
            Some(Tok::KwImport) | Some(Tok::KwFrom) => {
                // consume the whole logical line; the validator names the reject
                while let Some(token) = self.bump() {
                    if token.tok == Tok::Newline {
                        break;
                    }
                }
                Ok(Stmt::Import { line })
            }
            Some(Tok::KwPass) => {
                self.pos += 1;
                self.end_of_line()?;
                Ok(Stmt::Pass { line })
            }
            Some(Tok::KwDef) => Err(self.err("function definitions are not supported")),
            Some(Tok::Indent) => Err(self.err("unexpected indent")),
            Some(Tok::Dedent) => Err(self.err("unexpected dedent")),
            Some(Tok::Str(_)) if matches!(self.peek_at(1), Some(Tok::Newline) | None) => {
                let text = match self.bump() {
                    Some(Token { tok: Tok::Str(text), .. }) => text,
                    _ => unreachable!(),
                };
                self.end_of_line()?;
                Ok(Stmt::Docstring { text, line })
            }
            Some(Tok::Name(_)) if self.peek_at(1) == Some(&Tok::Colon) => {
                let name = self.expect_name("for a field declaration")?;
                self.pos += 1; // colon
                let annotation = self.expr()?;
                let default = if self.eat(&Tok::Eq) { Some(self.expr()?) } else { None };
                self.end_of_line()?;
                Ok(Stmt::Field(FieldDecl { name, annotation, default, line }))
            }
            Some(Tok::Name(_)) if self.peek_at(1) == Some(&Tok::Eq) => {
                let name = self.expect_name("for an assignment")?;
                self.pos += 1; // equals
                let value = self.expr()?;
                self.end_of_line()?;
                Ok(Stmt::Assign { name, value, line })
            }
            Some(_) => {
                let value = self.expr()?;
                self.end_of_line()?;
                Ok(Stmt::Expr { value, line })
            }
            None => Err(self.err("expected a statement, found end of input")),
        }
    }

    fn class_def(&mut self) -> Result<ClassDef, ParseError> {
        let line = self.line();
        self.pos += 1; // `class`
        let name = self.expect_name("after `class`")?;

        let mut bases = Vec::new();
        if self.eat(&Tok::LParen) {
            if !self.eat(&Tok::RParen) {
                loop {
                    bases.push(self.expr()?);
                    if self.eat(&Tok::Comma) {
                        if self.eat(&Tok::RParen) {
                            break;
                        }
                        continue;
                    }
                    self.expect(Tok::RParen, "to close the base list")?;
                    break;
                }
            }
        }

        self.expect(Tok::Colon, "after the class header")?;
        match self.peek() {
            Some(Tok::Newline) => {
                self.pos += 1;
            }
            _ => return Err(self.err("inline class bodies are not supported")),
        }
        self.expect(Tok::Indent, "to open the class body")?;

        let mut body = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::Dedent) => {
                    self.pos += 1;
                    break;
                }
                Some(Tok::Newline) => {
                    self.pos += 1;
                }
                Some(_) => body.push(self.statement()?),
                None => return Err(self.err("unexpected end of input in class body")),
            }
        }

        Ok(ClassDef { name, bases, body, line })
    }

    // ---------------------------- Expressions ----------------------------- //

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.pos += 1;
                    let attr = self.expect_name("after `.`")?;
                    expr = Expr::Attribute { value: Box::new(expr), attr };
                }
                Some(Tok::LParen) => {
                    self.pos += 1;
                    let (args, kwargs) = self.call_args()?;
                    expr = Expr::Call { func: Box::new(expr), args, kwargs };
                }
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    let index = self.expr_list(Tok::RBracket)?;
                    if index.is_empty() {
                        return Err(self.err("empty subscript"));
                    }
                    expr = Expr::Subscript { value: Box::new(expr), index };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let Some(token) = self.bump() else {
            return Err(self.err("expected an expression, found end of input"));
        };
        match token.tok {
            Tok::Name(name) => Ok(Expr::Name(name)),
            Tok::KwNone => Ok(Expr::Literal(Value::Null)),
            Tok::KwTrue => Ok(Expr::Literal(Value::Bool(true))),
            Tok::KwFalse => Ok(Expr::Literal(Value::Bool(false))),
            Tok::Int(v) => Ok(Expr::Literal(Value::from(v))),
            Tok::Float(v) => Ok(Expr::Literal(Value::from(v))),
            Tok::Str(text) => Ok(Expr::Literal(Value::from(text))),
            Tok::Minus => match self.bump() {
                Some(Token { tok: Tok::Int(v), .. }) => Ok(Expr::Literal(Value::from(-v))),
                Some(Token { tok: Tok::Float(v), .. }) => Ok(Expr::Literal(Value::from(-v))),
                _ => Err(ParseError::Unexpected {
                    line,
                    msg: "expected a number after `-`".into(),
                }),
            },
            Tok::LParen => {
                if self.eat(&Tok::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.expr()?;
                if self.eat(&Tok::Comma) {
                    let mut items = vec![first];
                    items.extend(self.expr_list(Tok::RParen)?);
                    Ok(Expr::Tuple(items))
                } else {
                    self.expect(Tok::RParen, "to close the group")?;
                    Ok(first)
                }
            }
            Tok::LBracket => Ok(Expr::List(self.expr_list(Tok::RBracket)?)),
            Tok::LBrace => self.dict_literal(),
            other => Err(ParseError::Unexpected {
                line,
                msg: format!("unexpected {other} in expression"),
            }),
        }
    }

    /// Comma-separated expressions up to and including `end`; empty lists and
    /// trailing commas allowed.
    fn expr_list(&mut self, end: Tok) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.eat(&end) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(&Tok::Comma) {
                if self.eat(&end) {
                    break;
                }
                continue;
            }
            self.expect(end.clone(), "to close the sequence")?;
            break;
        }
        Ok(items)
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok((args, kwargs));
        }
        loop {
            let is_kwarg = matches!(self.peek(), Some(Tok::Name(_)))
                && self.peek_at(1) == Some(&Tok::Eq);
            if is_kwarg {
                let name = self.expect_name("for a keyword argument")?;
                self.pos += 1; // equals
                kwargs.push((name, self.expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.err("positional argument after keyword argument"));
                }
                args.push(self.expr()?);
            }
            if self.eat(&Tok::Comma) {
                if self.eat(&Tok::RParen) {
                    break;
                }
                continue;
            }
            self.expect(Tok::RParen, "to close the call")?;
            break;
        }
        Ok((args, kwargs))
    }

    fn dict_literal(&mut self) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        if self.eat(&Tok::RBrace) {
            return Ok(Expr::Dict(entries));
        }
        loop {
            let key = self.expr()?;
            self.expect(Tok::Colon, "between dict key and value")?;
            let value = self.expr()?;
            entries.push((key, value));
            if self.eat(&Tok::Comma) {
                if self.eat(&Tok::RBrace) {
                    break;
                }
                continue;
            }
            self.expect(Tok::RBrace, "to close the dict literal")?;
            break;
        }
        Ok(Expr::Dict(entries))
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_one_class(src: &str) -> ClassDef {
        let module = parse(src).unwrap();
        assert_eq!(module.stmts.len(), 1);
        match module.stmts.into_iter().next().unwrap() {
            Stmt::ClassDef(c) => c,
            other => panic!("expected a class definition, got {other:?}"),
        }
    }

    #[test]
    fn class_with_fields_parses() {
        let class = parse_one_class(
            "class Reply(Base):\n    \"\"\"model answer\"\"\"\n    text: str\n    score: float = 0.5\n",
        );
        assert_eq!(class.name, "Reply");
        assert_eq!(class.bases, vec![Expr::Name("Base".into())]);
        assert_eq!(class.body.len(), 3);
        match &class.body[2] {
            Stmt::Field(f) => {
                assert_eq!(f.name, "score");
                assert_eq!(f.annotation, Expr::Name("float".into()));
                assert_eq!(f.default, Some(Expr::Literal(json!(0.5))));
            }
            other => panic!("expected a field, got {other:?}"),
        }
    }

    #[test]
    fn subscript_annotations_parse() {
        let class = parse_one_class(
            "class Pick(Base):\n    choice: Literal[\"a\", \"b\"]\n    tags: List[str]\n",
        );
        let Stmt::Field(choice) = &class.body[0] else { panic!() };
        assert_eq!(
            choice.annotation,
            Expr::Subscript {
                value: Box::new(Expr::Name("Literal".into())),
                index: vec![
                    Expr::Literal(json!("a")),
                    Expr::Literal(json!("b")),
                ],
            }
        );
    }

    #[test]
    fn import_statements_parse_as_import_nodes() {
        let module = parse("import os\n").unwrap();
        assert!(matches!(module.stmts[0], Stmt::Import { line: 1 }));
        let module = parse("from os import path\n").unwrap();
        assert!(matches!(module.stmts[0], Stmt::Import { .. }));
    }

    #[test]
    fn chained_attribute_and_call_expressions_parse() {
        let module = parse("x = a.__class__.__bases__\ny = obj.run(1, flag=True)\n").unwrap();
        let Stmt::Assign { value, .. } = &module.stmts[0] else { panic!() };
        assert!(matches!(value, Expr::Attribute { attr, .. } if attr == "__bases__"));
        let Stmt::Assign { value, .. } = &module.stmts[1] else { panic!() };
        let Expr::Call { args, kwargs, .. } = value else { panic!() };
        assert_eq!(args.len(), 1);
        assert_eq!(kwargs[0].0, "flag");
    }

    #[test]
    fn function_definitions_are_rejected() {
        let err = parse("def sneak():\n    pass\n").unwrap_err();
        assert!(err.to_string().contains("function definitions"));
    }

    #[test]
    fn inline_class_bodies_are_rejected() {
        let err = parse("class A(Base): pass\n").unwrap_err();
        assert!(err.to_string().contains("inline class bodies"));
    }

    #[test]
    fn control_flow_does_not_parse() {
        // `for` is not a keyword here; it lexes as a name and the statement
        // form `for x in ...` has no production
        assert!(parse("for x in range(10):\n    pass\n").is_err());
        assert!(parse("while True:\n    pass\n").is_err());
    }

    #[test]
    fn negative_defaults_parse() {
        let class = parse_one_class("class A(Base):\n    offset: int = -3\n");
        let Stmt::Field(f) = &class.body[0] else { panic!() };
        assert_eq!(f.default, Some(Expr::Literal(json!(-3))));
    }
}
