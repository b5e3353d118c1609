//! Include/exclude pattern matching for transfers.
//!
//! A pattern string is a comma-separated list of globs. Globs prefixed with
//! `!` exclude; the rest include. `**` crosses directory boundaries, `*` does not.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};

/// Parsed include/exclude glob set.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    /// Compiled positive globs.
    include: GlobSet,
    /// Compiled negative globs.
    exclude: GlobSet,
    /// Raw pattern string (for display).
    pattern: String,
}

impl Default for GlobFilter {
    fn default() -> Self {
        Self::match_all()
    }
}

impl GlobFilter {
    /// A filter that accepts every path.
    pub fn match_all() -> Self {
        Self {
            include: GlobSet::empty(),
            exclude: GlobSet::empty(),
            pattern: String::new(),
        }
    }

    /// Parse a comma-separated pattern string.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();

        for part in pattern.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (builder, glob) = match part.strip_prefix('!') {
                Some(negated) => (&mut exclude, negated),
                None => (&mut include, part),
            };
            builder.add(compile(glob)?);
        }

        Ok(Self {
            include: include.build().map_err(|e| invalid(pattern, e))?,
            exclude: exclude.build().map_err(|e| invalid(pattern, e))?,
            pattern: pattern.to_string(),
        })
    }

    /// Whether `path` (slash separated, relative) passes the filter.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.replace('\\', "/");
        let included = self.include.is_empty() || self.include.is_match(&path);
        included && !self.exclude.is_match(&path)
    }

    /// True when the filter accepts everything.
    pub fn is_match_all(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Keep the items whose extracted path matches, preserving order.
    pub fn filter<T, F>(&self, items: Vec<T>, path_of: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        if self.is_match_all() {
            return items;
        }
        items.into_iter().filter(|item| self.matches(path_of(item))).collect()
    }
}

/// Parse `pattern` and filter `items` by it. An empty pattern keeps everything.
pub fn filter_with_glob<T, F>(items: Vec<T>, pattern: &str, path_of: F) -> Result<Vec<T>>
where
    F: Fn(&T) -> &str,
{
    if pattern.trim().is_empty() {
        return Ok(items);
    }
    Ok(GlobFilter::parse(pattern)?.filter(items, path_of))
}

fn compile(glob: &str) -> Result<globset::Glob> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map_err(|e| invalid(glob, e))
}

fn invalid(pattern: &str, source: globset::Error) -> Error {
    Error::InvalidGlob {
        pattern: pattern.to_string(),
        source,
    }
}
