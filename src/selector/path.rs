// src/selector/path.rs

//! Filesystem-like path patterns such as `/Features/*` or `/Roads/high*`.

use globset::{Glob, GlobMatcher};

use crate::errors::{PipelineError, Result};
use crate::scene::Node;

#[derive(Debug, Clone)]
enum SegmentMatcher {
    Any,
    Literal(String),
    Glob(GlobMatcher),
}

impl SegmentMatcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            SegmentMatcher::Any => true,
            SegmentMatcher::Literal(lit) => lit == name,
            SegmentMatcher::Glob(g) => g.is_match(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathPattern {
    text: String,
    segments: Vec<SegmentMatcher>,
}

impl PathPattern {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| PipelineError::InvalidPath {
            path: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Err(invalid("'/' alone selects nothing"));
        }

        let mut segments = Vec::new();
        for seg in rest.split('/') {
            if seg.is_empty() {
                return Err(invalid("empty path segment"));
            }
            let matcher = if seg == "*" {
                SegmentMatcher::Any
            } else if seg.contains(['*', '?', '[', '{']) {
                let glob = Glob::new(seg)
                    .map_err(|e| invalid(&format!("bad glob '{seg}': {e}")))?;
                SegmentMatcher::Glob(glob.compile_matcher())
            } else {
                SegmentMatcher::Literal(seg.to_string())
            };
            segments.push(matcher);
        }

        Ok(Self {
            text: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Nodes under `root` matched by this pattern, in document order.
    ///
    /// Every segment but the last walks one level of children. The last
    /// segment matches immediate children of those prefixes, or every
    /// descendant below them when `recurse` is set.
    pub fn resolve<'a>(&self, root: &'a Node, recurse: bool) -> Vec<&'a Node> {
        let Some((last, prefix)) = self.segments.split_last() else {
            return Vec::new();
        };

        let mut level: Vec<&Node> = vec![root];
        for seg in prefix {
            level = level
                .into_iter()
                .flat_map(|n| n.children.iter())
                .filter(|c| seg.matches(&c.name))
                .collect();
        }

        let mut out = Vec::new();
        for parent in level {
            if recurse {
                out.extend(parent.descendants().filter(|n| last.matches(&n.name)));
            } else {
                out.extend(parent.children.iter().filter(|n| last.matches(&n.name)));
            }
        }
        out
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
