// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::ServerSection;

/// Always ignored: the cache lives here and must never trigger a reload.
const STATE_DIR_GLOB: &str = ".scenepipe/**";

/// Decides which changed paths (relative to the pipeline root) count as
/// definition sources.
#[derive(Clone)]
pub struct SourceFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl fmt::Debug for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFilter")
            .field("include", &self.include.len())
            .field("exclude", &self.exclude.len())
            .finish()
    }
}

impl SourceFilter {
    /// `extensions` without the leading dot, `exclude` as globs.
    pub fn new(extensions: &[String], exclude: &[String]) -> Result<Self> {
        let include: Vec<String> = extensions
            .iter()
            .map(|ext| format!("**/*.{}", ext.trim_start_matches('.')))
            .collect();
        let mut exclude = exclude.to_vec();
        exclude.push(STATE_DIR_GLOB.to_string());

        Ok(Self {
            include: build_globset(&include).context("building source globset")?,
            exclude: build_globset(&exclude).context("building exclude globset")?,
        })
    }

    pub fn from_section(section: &ServerSection) -> Result<Self> {
        Self::new(&section.extensions, &section.exclude)
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// `path` relative to `root` with forward slashes, or `None` when it lies
/// outside. Falls back to canonical paths for platforms that report events
/// under a different absolute prefix (symlinked temp dirs).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_extensions_and_honours_excludes() {
        let filter = SourceFilter::new(&["toml".into()], &["drafts/**".into()]).unwrap();
        assert!(filter.matches("pipeline.toml"));
        assert!(filter.matches("stages/roads.toml"));
        assert!(!filter.matches("features.json"));
        assert!(!filter.matches("drafts/wip.toml"));
        assert!(!filter.matches(".scenepipe/cache/x.toml"));
    }
}
