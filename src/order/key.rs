// src/order/key.rs

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::{PipelineError, Result};

pub const WILDCARD: &str = "+";

/// One dotted component of an order key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Num(u64),
    Text(String),
    Wildcard,
}

impl Segment {
    fn rank(&self) -> u8 {
        match self {
            Segment::Num(_) => 0,
            Segment::Text(_) => 1,
            Segment::Wildcard => 2,
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Num(n) => write!(f, "{n}"),
            Segment::Text(t) => f.write_str(t),
            Segment::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// Parsed dotted order key, e.g. `30.40.5` or `10.+`.
///
/// The derived ordering is lexicographic over segments, so a strict prefix
/// sorts before its extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderKey {
    segments: Vec<Segment>,
}

impl OrderKey {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| PipelineError::InvalidOrder {
            key: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty order key"));
        }

        let mut segments = Vec::new();
        for raw in trimmed.split('.') {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(invalid("empty segment"));
            }
            let seg = if raw == WILDCARD {
                Segment::Wildcard
            } else if raw.bytes().all(|b| b.is_ascii_digit()) {
                let n = raw
                    .parse::<u64>()
                    .map_err(|e| invalid(&format!("numeric segment '{raw}': {e}")))?;
                Segment::Num(n)
            } else {
                Segment::Text(raw.to_string())
            };
            segments.push(seg);
        }

        Ok(Self { segments })
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| *s == Segment::Wildcard)
    }

    /// Same key with its last segment swapped for a wildcard.
    pub fn with_last_wildcard(&self) -> Self {
        let mut segments = self.segments.clone();
        match segments.last_mut() {
            Some(last) => *last = Segment::Wildcard,
            None => segments.push(Segment::Wildcard),
        }
        Self { segments }
    }

    /// A lone top-level wildcard.
    pub fn wildcard() -> Self {
        Self {
            segments: vec![Segment::Wildcard],
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for OrderKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        OrderKey::parse(s)
    }
}
