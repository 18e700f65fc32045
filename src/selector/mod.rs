// src/selector/mod.rs

//! Attribute selectors and path patterns used to target graph nodes.
//!
//! A selector is a conjunction of bracketed clauses:
//!
//! - `[key]`           the attribute is present and not null
//! - `[key=value]`     its rendered string equals `value`
//! - `[key~pattern]`   its rendered string matches the regex (unanchored)
//! - `[!...]`          negates any of the above; `[key!=value]` is shorthand
//!
//! Evaluation never fails: a missing attribute simply fails positive clauses.

mod eval;
mod parser;
pub mod path;

use std::fmt;
use std::str::FromStr;

use crate::errors::{PipelineError, Result};

pub use eval::{AttributeSource, GEOM_TYPE_KEY};
pub use parser::{Clause, Predicate};
pub use path::PathPattern;

#[derive(Debug, Clone)]
pub struct Selector {
    text: String,
    clauses: Vec<Clause>,
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self> {
        let clauses = parser::parse_clauses(text)?;
        Ok(Self {
            text: text.trim().to_string(),
            clauses,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches<S: AttributeSource + ?Sized>(&self, source: &S) -> bool {
        self.clauses.iter().all(|c| eval::clause_holds(c, source))
    }
}

impl FromStr for Selector {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
