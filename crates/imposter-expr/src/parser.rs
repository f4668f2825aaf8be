//! Recursive-descent parser for `${ ... }` expressions.
//!
//! ```text
//! expr      := ifExpr | funcCall | literal | array
//! ifExpr    := "if" "(" expr ")" expr "else" expr
//! funcCall  := identifier "(" (expr ("," expr)*)? ")"
//! literal   := string | number | "true" | "false"
//! array     := "[" (expr ("," expr)*)? "]"
//! ```

use crate::ast::Expression;
use crate::error::ParseError;

const OPEN: &str = "${";
const CLOSE: &str = "}";

/// Parses a configuration string.
///
/// Strings that are not wrapped in `${` and `}` are returned as string
/// literals unchanged. Error positions are byte offsets into the text between
/// the delimiters.
pub fn parse(text: &str) -> Result<Expression, ParseError> {
    let body = match text
        .strip_prefix(OPEN)
        .and_then(|rest| rest.strip_suffix(CLOSE))
    {
        Some(body) => body,
        None => return Ok(Expression::StringIdentity(text.to_string())),
    };

    let mut parser = Parser::new(body);
    let expr = parser.expression()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.unexpected(c, "expected end of expression"));
    }
    Ok(expr)
}

struct Parser<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self { source, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError::new(message, self.source, position)
    }

    fn unexpected(&self, c: char, expected: &str) -> ParseError {
        self.error(
            format!("unexpected token '{c}' at position {}: {expected}", self.pos),
            self.pos,
        )
    }

    /// Skips whitespace and consumes `token`.
    fn expect(&mut self, token: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == token => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.unexpected(c, &format!("expected '{token}'"))),
            None => Err(self.error(
                format!("unexpected end of string: expected token '{token}'"),
                self.pos,
            )),
        }
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of string", self.pos)),
            Some('"') => self.string(),
            Some('[') => self.array(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.word(),
            Some(_) => Err(self.error("could not find a parser for the current token", self.pos)),
        }
    }

    fn identifier(&mut self) -> &'s str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    fn word(&mut self) -> Result<Expression, ParseError> {
        let word = self.identifier();
        match word {
            "true" | "false" => Ok(Expression::BoolIdentity(word.to_string())),
            "if" => self.if_else(),
            _ => self.call(word),
        }
    }

    fn if_else(&mut self) -> Result<Expression, ParseError> {
        self.expect('(')?;
        let guard = self.expression()?;
        self.expect(')')?;
        let left = self.expression()?;

        self.skip_whitespace();
        let keyword_at = self.pos;
        if self.identifier() != "else" {
            self.pos = keyword_at;
            return match self.peek() {
                Some(c) => Err(self.unexpected(c, "expected 'else'")),
                None => Err(self.error("unexpected end of string: expected 'else'", self.pos)),
            };
        }

        let right = self.expression()?;
        Ok(Expression::IfElse {
            guard: Box::new(guard),
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn call(&mut self, name: &str) -> Result<Expression, ParseError> {
        self.expect('(')?;
        let args = self.args(')')?;
        Ok(Expression::Function {
            name: name.to_string(),
            args,
        })
    }

    fn array(&mut self) -> Result<Expression, ParseError> {
        self.expect('[')?;
        let elements = self.args(']')?;
        Ok(Expression::ArrayIdentity(elements))
    }

    /// Comma-separated expressions up to and including `close`.
    fn args(&mut self, close: char) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(args);
        }

        loop {
            args.push(self.expression()?);
            self.skip_whitespace();
            match self.bump() {
                Some(c) if c == close => return Ok(args),
                Some(',') => continue,
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.unexpected(c, &format!("expected ',' or '{close}'")));
                }
                None => {
                    return Err(self.error(
                        format!("unexpected end of string: expected token '{close}'"),
                        self.pos,
                    ))
                }
            }
        }
    }

    fn string(&mut self) -> Result<Expression, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Expression::StringIdentity(value)),
                Some('\\') => match self.peek() {
                    Some(escaped @ ('"' | '\\')) => {
                        self.pos += 1;
                        value.push(escaped);
                    }
                    _ => value.push('\\'),
                },
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string literal", open)),
            }
        }
    }

    fn number(&mut self) -> Result<Expression, ParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(self.error("could not find a parser for the current token", start));
            }
        }

        let mut dots = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' {
                if dots > 0 {
                    return Err(self.unexpected(c, "a number accepts at most one decimal point"));
                }
                dots += 1;
                self.pos += 1;
            } else {
                break;
            }
        }

        let raw = self.source[start..self.pos].to_string();
        Ok(if dots == 0 {
            Expression::IntegerIdentity(raw)
        } else {
            Expression::FloatIdentity(raw)
        })
    }
}
