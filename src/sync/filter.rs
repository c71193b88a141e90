//! Include/exclude filtering for directory entries.
//!
//! Candidate set = (include list if non-empty, else everything) minus the
//! exclude list. Exclusion always wins.
//!
//! List items are literal relative paths; a listed directory covers
//! everything beneath it. Items written as `glob:<pattern>` are matched as
//! glob patterns instead.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Prefix marking a list item as a glob pattern.
pub const GLOB_PREFIX: &str = "glob:";

/// One compiled include or exclude list.
#[derive(Debug, Clone)]
struct PatternList {
    literals: Vec<PathBuf>,
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl PatternList {
    fn empty() -> Self {
        Self {
            literals: Vec::new(),
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    fn compile(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut literals = Vec::new();
        let mut builder = GlobSetBuilder::new();
        for item in patterns {
            let Some(pattern) = item.strip_prefix(GLOB_PREFIX) else {
                literals.push(PathBuf::from(item));
                continue;
            };
            let pattern_err = |source| ConfigError::Pattern {
                pattern: item.clone(),
                source,
            };
            builder.add(Glob::new(pattern).map_err(pattern_err)?);
            builder.add(Glob::new(&format!("{}/**", pattern.trim_end_matches('/'))).map_err(pattern_err)?);
        }
        let glob_set = builder.build().map_err(|source| ConfigError::Pattern {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            literals,
            glob_set,
            patterns: patterns.to_vec(),
        })
    }

    fn is_match(&self, relative: &Path) -> bool {
        self.literals.iter().any(|literal| relative.starts_with(literal)) || self.glob_set.is_match(relative)
    }
}

/// Decides which relative paths below a directory entry are synced.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: PatternList,
    exclude: PatternList,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl PathFilter {
    /// A filter that admits every path.
    pub fn allow_all() -> Self {
        Self {
            include: PatternList::empty(),
            exclude: PatternList::empty(),
        }
    }

    /// Compile include and exclude lists of relative paths or globs.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: PatternList::compile(include)?,
            exclude: PatternList::compile(exclude)?,
        })
    }

    /// Whether `relative` belongs to the candidate set.
    pub fn admits(&self, relative: &Path) -> bool {
        if self.exclude.is_match(relative) {
            return false;
        }
        self.include.patterns.is_empty() || self.include.is_match(relative)
    }

    pub fn includes(&self) -> &[String] {
        &self.include.patterns
    }

    pub fn excludes(&self) -> &[String] {
        &self.exclude.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.include.patterns.is_empty() && self.exclude.patterns.is_empty()
    }
}
