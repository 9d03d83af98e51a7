//! Tokenizer for the definition language accepted on the text path.
//!
//! Python-flavored surface: indentation delimits class bodies, `#` starts a
//! comment, newlines inside brackets are joined, strings may be single-,
//! double-, or triple-quoted. The token set is deliberately small; anything
//! outside it is a lex error, which the validator reports as a syntax reject.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Newline,
    Indent,
    Dedent,
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    KwClass,
    KwImport,
    KwFrom,
    KwPass,
    KwDef,
    KwNone,
    KwTrue,
    KwFalse,
    Colon,
    Comma,
    Dot,
    Eq,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Newline => write!(f, "end of line"),
            Tok::Indent => write!(f, "indent"),
            Tok::Dedent => write!(f, "dedent"),
            Tok::Name(n) => write!(f, "`{n}`"),
            Tok::Int(v) => write!(f, "`{v}`"),
            Tok::Float(v) => write!(f, "`{v}`"),
            Tok::Str(_) => write!(f, "string literal"),
            Tok::KwClass => write!(f, "`class`"),
            Tok::KwImport => write!(f, "`import`"),
            Tok::KwFrom => write!(f, "`from`"),
            Tok::KwPass => write!(f, "`pass`"),
            Tok::KwDef => write!(f, "`def`"),
            Tok::KwNone => write!(f, "`None`"),
            Tok::KwTrue => write!(f, "`True`"),
            Tok::KwFalse => write!(f, "`False`"),
            Tok::Colon => write!(f, "`:`"),
            Tok::Comma => write!(f, "`,`"),
            Tok::Dot => write!(f, "`.`"),
            Tok::Eq => write!(f, "`=`"),
            Tok::Minus => write!(f, "`-`"),
            Tok::LParen => write!(f, "`(`"),
            Tok::RParen => write!(f, "`)`"),
            Tok::LBracket => write!(f, "`[`"),
            Tok::RBracket => write!(f, "`]`"),
            Tok::LBrace => write!(f, "`{{`"),
            Tok::RBrace => write!(f, "`}}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("line {line}: {msg}")]
pub struct LexError {
    pub line: usize,
    pub msg: String,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    /// Open bracket nesting; newlines inside brackets are joined.
    depth: usize,
    indents: Vec<usize>,
    out: Vec<Token>,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let normalized = src.replace('\r', "");
    let mut lx = Lexer {
        chars: normalized.chars().collect(),
        pos: 0,
        line: 1,
        depth: 0,
        indents: vec![0],
        out: Vec::new(),
    };
    lx.run()?;
    Ok(lx.out)
}

impl Lexer {
    fn err(&self, msg: impl Into<String>) -> LexError {
        LexError { line: self.line, msg: msg.into() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.out.push(Token { tok, line: self.line });
    }

    fn run(&mut self) -> Result<(), LexError> {
        let mut at_line_start = true;
        loop {
            if at_line_start && self.depth == 0 {
                match self.start_of_line()? {
                    LineStart::Eof => break,
                    LineStart::Blank => continue,
                    LineStart::Tokens => at_line_start = false,
                }
            }
            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(Tok::Newline);
                        at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' => self.pos += 1,
                '#' => self.skip_comment(),
                '"' | '\'' => self.string(c)?,
                '0'..='9' => self.number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.name(),
                '(' => self.bracket(Tok::LParen, 1),
                ')' => self.bracket(Tok::RParen, -1),
                '[' => self.bracket(Tok::LBracket, 1),
                ']' => self.bracket(Tok::RBracket, -1),
                '{' => self.bracket(Tok::LBrace, 1),
                '}' => self.bracket(Tok::RBrace, -1),
                ':' => self.simple(Tok::Colon),
                ',' => self.simple(Tok::Comma),
                '.' => self.simple(Tok::Dot),
                '=' => self.simple(Tok::Eq),
                '-' => self.simple(Tok::Minus),
                other => return Err(self.err(format!("unexpected character {other:?}"))),
            }
        }
        // close the final logical line and any open blocks
        if !at_line_start {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        Ok(())
    }

    /// Measure indentation and emit Indent/Dedent when a real token follows.
    fn start_of_line(&mut self) -> Result<LineStart, LexError> {
        let mut width = 0usize;
        loop {
            match self.peek() {
                Some(' ') => {
                    width += 1;
                    self.pos += 1;
                }
                Some('\t') => {
                    // tab stops every 8 columns, like the reference language
                    width = (width / 8 + 1) * 8;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        match self.peek() {
            None => return Ok(LineStart::Eof),
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                return Ok(LineStart::Blank);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.pos += 1;
                    self.line += 1;
                }
                return Ok(LineStart::Blank);
            }
            Some(_) => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(Tok::Indent);
        } else {
            while width < *self.indents.last().unwrap_or(&0) {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
            if width != *self.indents.last().unwrap_or(&0) {
                return Err(self.err("inconsistent indentation"));
            }
        }
        Ok(LineStart::Tokens)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn simple(&mut self, tok: Tok) {
        self.pos += 1;
        self.push(tok);
    }

    fn bracket(&mut self, tok: Tok, delta: isize) {
        self.pos += 1;
        if delta > 0 {
            self.depth += 1;
        } else {
            self.depth = self.depth.saturating_sub(1);
        }
        self.push(tok);
    }

    fn name(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let tok = match word.as_str() {
            "class" => Tok::KwClass,
            "import" => Tok::KwImport,
            "from" => Tok::KwFrom,
            "pass" => Tok::KwPass,
            "def" => Tok::KwDef,
            "None" => Tok::KwNone,
            "True" => Tok::KwTrue,
            "False" => Tok::KwFalse,
            _ => Tok::Name(word),
        };
        self.push(tok);
    }

    fn number(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' if !is_float && matches!(self.peek_at(1), Some('0'..='9')) => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let tok = if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.err(format!("invalid number literal `{text}`")))?;
            Tok::Float(value)
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.err(format!("integer literal `{text}` out of range")))?;
            Tok::Int(value)
        };
        self.push(tok);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), LexError> {
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };
        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.err("unterminated string literal"));
            };
            if triple {
                if c == quote && self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            } else if c == quote {
                self.pos += 1;
                break;
            }
            match c {
                '\\' => {
                    let escaped = self
                        .peek_at(1)
                        .ok_or_else(|| self.err("unterminated string literal"))?;
                    let resolved = match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        other => {
                            return Err(
                                self.err(format!("unsupported escape sequence `\\{other}`"))
                            );
                        }
                    };
                    text.push(resolved);
                    self.pos += 2;
                }
                '\n' => {
                    if !triple {
                        return Err(self.err("unterminated string literal"));
                    }
                    text.push('\n');
                    self.pos += 1;
                    self.line += 1;
                }
                other => {
                    text.push(other);
                    self.pos += 1;
                }
            }
        }
        self.push(Tok::Str(text));
        Ok(())
    }
}

enum LineStart {
    Eof,
    Blank,
    Tokens,
}

// ------------------------------- Tests ------------------------------------ //
