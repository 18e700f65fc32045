// src/selector/parser.rs

//! Hand-written parser for bracketed selector clauses.
//!
//! Grammar (whitespace between tokens is ignored):
//!
//! ```text
//! selector := clause+
//! clause   := '[' '!'? key ( op value )? ']'
//! op       := '=' | '!=' | '~'
//! key      := bare | quoted
//! value    := bare | quoted
//! quoted   := '"' ... '"' | '\'' ... '\''
//! ```

use regex::Regex;

use crate::errors::{PipelineError, Result};

#[derive(Debug, Clone)]
pub enum Predicate {
    Present,
    Equals(String),
    Matches(Regex),
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub key: String,
    pub negated: bool,
    pub predicate: Predicate,
}

pub fn parse_clauses(text: &str) -> Result<Vec<Clause>> {
    let mut cursor = Cursor::new(text);
    let mut clauses = Vec::new();

    cursor.skip_ws();
    while !cursor.at_end() {
        clauses.push(cursor.clause()?);
        cursor.skip_ws();
    }

    if clauses.is_empty() {
        return Err(cursor.error("selector has no clauses"));
    }
    Ok(clauses)
}

struct Cursor<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::InvalidSelector {
            selector: self.text.to_string(),
            reason: reason.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn clause(&mut self) -> Result<Clause> {
        if !self.eat('[') {
            return Err(self.error(format!("expected '[' at offset {}", self.pos)));
        }
        self.skip_ws();

        let mut negated = self.eat('!');
        self.skip_ws();

        let key = self.token(&['=', '~', '!', ']'])?;
        if key.is_empty() {
            return Err(self.error("empty clause key"));
        }
        self.skip_ws();

        let predicate = match self.peek() {
            Some(']') => Predicate::Present,
            Some('=') => {
                self.bump();
                Predicate::Equals(self.value()?)
            }
            Some('!') if self.peek_at(1) == Some('=') => {
                self.pos += 2;
                negated = !negated;
                Predicate::Equals(self.value()?)
            }
            Some('~') => {
                self.bump();
                let pattern = self.value()?;
                let re = Regex::new(&pattern)
                    .map_err(|e| self.error(format!("invalid regex '{pattern}': {e}")))?;
                Predicate::Matches(re)
            }
            Some(other) => return Err(self.error(format!("unexpected '{other}' in clause"))),
            None => return Err(self.error("unterminated clause")),
        };

        self.skip_ws();
        if !self.eat(']') {
            return Err(self.error("unterminated clause"));
        }

        Ok(Clause {
            key,
            negated,
            predicate,
        })
    }

    fn value(&mut self) -> Result<String> {
        self.skip_ws();
        self.token(&[']'])
    }

    /// A quoted string, or a bare run of characters up to one of `stops`.
    fn token(&mut self, stops: &[char]) -> Result<String> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == q => return Ok(out),
                        Some(c) => out.push(c),
                        None => return Err(self.error("unterminated quoted string")),
                    }
                }
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if stops.contains(&c) {
                        break;
                    }
                    self.pos += 1;
                }
                if self.at_end() {
                    return Err(self.error("unterminated clause"));
                }
                let raw: String = self.chars[start..self.pos].iter().collect();
                Ok(raw.trim().to_string())
            }
        }
    }
}
