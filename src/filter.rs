//! Artifact eligibility filter.
//!
//! Decides, per output file, whether a minified and/or gzipped variant may
//! exist. The filter is a plain value built once from `[minify]` and
//! `[gzip]` and shared by every stage:
//!
//! - **Extensions**: allow-list, case-insensitive, configured with or
//!   without the leading dot.
//! - **skip_files**: regexes tested against the file name.
//! - **skip_dirs** (minify only): regexes tested against each directory
//!   segment of the path relative to the filter root.
//!
//! Patterns are anchored at the start of the tested string, so `help`
//! matches `help.js` and `helpers.js` but not `app-help.js`.

use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{GzipConfig, MinifyConfig};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Compile patterns as prefix matches.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, FilterError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&format!("^(?:{p})")).map_err(|source| FilterError::Pattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// First pattern matching `subject`, if any.
pub fn first_match<'a>(patterns: &'a [Regex], subject: &str) -> Option<&'a Regex> {
    patterns.iter().find(|re| re.is_match(subject))
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[derive(Debug, Clone, Default)]
struct Rule {
    enabled: bool,
    extensions: Vec<String>,
    skip_files: Vec<Regex>,
    skip_dirs: Vec<Regex>,
}

impl Rule {
    fn allows(&self, relative: &Path) -> bool {
        if !self.enabled {
            return false;
        }
        let ext = relative
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext {
            Some(ext) if self.extensions.contains(&ext) => {}
            _ => return false,
        }
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if first_match(&self.skip_files, &name).is_some() {
            return false;
        }
        let Some(parent) = relative.parent() else {
            return true;
        };
        !parent.components().any(|c| {
            let segment = c.as_os_str().to_string_lossy();
            first_match(&self.skip_dirs, &segment).is_some()
        })
    }
}

/// Per-file predicate for minified and gzipped variants.
#[derive(Debug, Clone)]
pub struct ArtifactFilter {
    root: PathBuf,
    minify: Rule,
    gzip: Rule,
}

impl ArtifactFilter {
    pub fn new(
        root: impl Into<PathBuf>,
        minify: &MinifyConfig,
        gzip: &GzipConfig,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            root: root.into(),
            minify: Rule {
                enabled: minify.execute,
                extensions: normalize_extensions(&minify.extensions),
                skip_files: compile_patterns(&minify.skip_files)?,
                skip_dirs: compile_patterns(&minify.skip_dirs)?,
            },
            gzip: Rule {
                enabled: gzip.execute,
                extensions: normalize_extensions(&gzip.extensions),
                skip_files: compile_patterns(&gzip.skip_files)?,
                skip_dirs: Vec::new(),
            },
        })
    }

    /// The same rules, with directory segments measured from another root.
    pub fn rooted_at(&self, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..self.clone()
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a minified variant of `path` may exist.
    pub fn can_minify(&self, path: &Path) -> bool {
        self.minify.allows(self.relative(path))
    }

    /// Whether a gzipped variant of `path` may exist.
    pub fn can_gzip(&self, path: &Path) -> bool {
        self.gzip.allows(self.relative(path))
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
