// src/order/resolver.rs

//! Wildcard resolution for order keys.
//!
//! Counters are scoped by the exact preceding prefix: `10.+` looks at the
//! integers already used directly below `10`, `30.+.+` first resolves the
//! middle wildcard below `30` and then the last one below the result.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::errors::{PipelineError, Result};
use crate::order::key::{OrderKey, Segment};

#[derive(Debug, Default, Clone)]
pub struct WildcardResolver {
    /// Highest integer seen at a position, keyed by the prefix before it.
    counters: HashMap<Vec<Segment>, u64>,
    wildcard_keys: HashSet<OrderKey>,
    explicit_keys: HashSet<OrderKey>,
}

impl WildcardResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key` into a wildcard-free key and record it.
    ///
    /// Fails with a scope conflict when an explicit key collides with one a
    /// wildcard produced, in either direction. Nothing is recorded on error.
    pub fn resolve(&mut self, key: &OrderKey) -> Result<OrderKey> {
        let had_wildcard = key.has_wildcard();

        let mut resolved: Vec<Segment> = Vec::with_capacity(key.segments().len());
        for seg in key.segments() {
            let seg = match seg {
                Segment::Wildcard => {
                    let current = self.counters.get(&resolved).copied().unwrap_or(0);
                    let next = current.checked_add(1).ok_or_else(|| PipelineError::InvalidOrder {
                        key: key.to_string(),
                        reason: format!("no integer left after {current} for the wildcard"),
                    })?;
                    Segment::Num(next)
                }
                other => other.clone(),
            };
            resolved.push(seg);
        }
        let resolved = OrderKey::from_segments(resolved);

        if had_wildcard {
            if self.explicit_keys.contains(&resolved) {
                return Err(PipelineError::WildcardConflict(format!(
                    "'{key}' resolves to '{resolved}', which is declared explicitly"
                )));
            }
        } else if self.wildcard_keys.contains(&resolved) {
            return Err(PipelineError::WildcardConflict(format!(
                "'{resolved}' was already produced by a wildcard"
            )));
        }

        self.commit(&resolved);
        if had_wildcard {
            self.wildcard_keys.insert(resolved.clone());
        } else {
            self.explicit_keys.insert(resolved.clone());
        }

        trace!(key = %key, resolved = %resolved, "resolved order key");
        Ok(resolved)
    }

    fn commit(&mut self, resolved: &OrderKey) {
        let segs = resolved.segments();
        for (i, seg) in segs.iter().enumerate() {
            if let Segment::Num(n) = seg {
                let slot = self.counters.entry(segs[..i].to_vec()).or_insert(0);
                if *n > *slot {
                    *slot = *n;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_all(keys: &[&str]) -> Result<Vec<String>> {
        let mut r = WildcardResolver::new();
        keys.iter()
            .map(|k| r.resolve(&OrderKey::parse(k)?).map(|k| k.to_string()))
            .collect()
    }

    #[test]
    fn wildcard_counts_up_under_prefix() {
        let out = resolve_all(&["10.+", "10.+", "10.+"]).unwrap();
        assert_eq!(out, vec!["10.1", "10.2", "10.3"]);
    }

    #[test]
    fn wildcard_follows_explicit_siblings() {
        let out = resolve_all(&["10.5", "10.+"]).unwrap();
        assert_eq!(out, vec!["10.5", "10.6"]);
    }

    #[test]
    fn nested_wildcards_use_independent_counters() {
        let out = resolve_all(&["30.+.+", "30.+.+", "30.1.+"]).unwrap();
        assert_eq!(out, vec!["30.1.1", "30.2.1", "30.1.2"]);
    }

    #[test]
    fn explicit_key_colliding_with_wildcard_is_rejected() {
        let err = resolve_all(&["10.+", "10.1"]).unwrap_err();
        assert!(matches!(err, PipelineError::WildcardConflict(_)));
    }

    #[test]
    fn wildcard_after_the_largest_integer_is_an_error() {
        let err = resolve_all(&["10.18446744073709551615", "10.+"]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOrder { .. }));
        assert!(err.is_configuration());
    }
}
