//! Stylesheet compilation seam.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::OutputStyle;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("failed to compile {path}: {message}")]
    Sass { path: PathBuf, message: String },
}

/// Compiles a `.scss`/`.sass` source file to CSS text.
pub trait StylesheetCompiler {
    fn compile(&self, source: &Path, style: OutputStyle) -> Result<String, CompileError>;
}

/// `grass`-backed compiler. Imports resolve relative to the importing file
/// and to the configured load paths.
#[derive(Debug, Clone, Default)]
pub struct GrassCompiler {
    load_paths: Vec<PathBuf>,
}

impl GrassCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_paths.push(path.into());
        self
    }
}

fn grass_style(style: OutputStyle) -> grass::OutputStyle {
    match style {
        // grass has no nested style; expanded is the closest readable form
        OutputStyle::Nested | OutputStyle::Expanded => grass::OutputStyle::Expanded,
        OutputStyle::Compressed => grass::OutputStyle::Compressed,
    }
}

impl StylesheetCompiler for GrassCompiler {
    fn compile(&self, source: &Path, style: OutputStyle) -> Result<String, CompileError> {
        let options = grass::Options::default()
            .style(grass_style(style))
            .load_paths(self.load_paths.as_slice());
        grass::from_path(source, &options).map_err(|e| CompileError::Sass {
            path: source.to_path_buf(),
            message: e.to_string(),
        })
    }
}
