//! Pipeline stages.
//!
//! Every stage walks one source root and writes into the output tree, the
//! staging tree, or the remote store. A stage is gated by its own `execute`
//! flag: [`Stage::execute`] returns a skipped report without touching the
//! filesystem when the flag is off.
//!
//! Shared pieces live here: the [`Stage`] trait, the [`StageContext`] every
//! stage borrows, progress [`BuildEvent`]s, per-stage [`StageReport`]s, and
//! the variant helpers that write `.min` and `.gz` siblings.

pub mod page;
pub mod publish;
pub mod static_copy;
pub mod stylesheet;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{DirsConfig, UrlsConfig};
use crate::filter::ArtifactFilter;
use crate::render::RenderError;
use crate::store::StoreError;
use crate::stylesheet::CompileError;
use crate::variant::{DeriveError, Deriver, gzipped_path, minified_path};

pub use page::PageStage;
pub use publish::PublishStage;
pub use static_copy::StaticCopyStage;
pub use stylesheet::StylesheetStage;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{path}: {source}")]
    Derive { path: PathBuf, source: DeriveError },
    #[error("{path}: {source}")]
    Render { path: PathBuf, source: RenderError },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("publishing is enabled but no object store was provided")]
    NoStore,
    #[error("bucket {0:?} does not exist or is not accessible")]
    BucketMissing(String),
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
}

/// Attach the offending path to an IO error.
pub(crate) fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StageError + '_ {
    move |source| StageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn derive_err(path: &Path) -> impl FnOnce(DeriveError) -> StageError + '_ {
    move |source| StageError::Derive {
        path: path.to_path_buf(),
        source,
    }
}

/// Progress notifications sent to the CLI printer.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    StageStarted {
        stage: &'static str,
    },
    StageSkipped {
        stage: &'static str,
    },
    /// A file was written to the output or staging tree. `variants` lists
    /// the sibling variants written next to it (`min`, `gz`, `min.gz`).
    FileWritten {
        stage: &'static str,
        source: String,
        output: String,
        variants: Vec<&'static str>,
    },
    ObjectPublished {
        key: String,
        status: ObjectStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    Uploaded,
    Unchanged,
}

/// Outcome of one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub skipped: bool,
    /// Source files processed.
    pub files: usize,
    /// Minified and gzipped siblings written locally.
    pub variants: usize,
    pub uploaded: usize,
    pub unchanged: usize,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    pub fn skipped(stage: &'static str) -> Self {
        Self {
            stage,
            skipped: true,
            ..Self::default()
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "{}: skipped", self.stage);
        }
        write!(f, "{}: {} files", self.stage, self.files)?;
        if self.variants > 0 {
            write!(f, ", {} variants", self.variants)?;
        }
        if self.uploaded > 0 || self.unchanged > 0 {
            write!(
                f,
                ", {} uploaded, {} unchanged",
                self.uploaded, self.unchanged
            )?;
        }
        Ok(())
    }
}

/// Everything a stage borrows from the build.
pub struct StageContext<'a> {
    pub dirs: &'a DirsConfig,
    pub urls: &'a UrlsConfig,
    /// Rooted at the output root.
    pub filter: &'a ArtifactFilter,
    pub deriver: Deriver<'a>,
    pub events: Option<&'a Sender<BuildEvent>>,
}

impl StageContext<'_> {
    pub fn emit(&self, event: BuildEvent) {
        if let Some(tx) = self.events {
            tx.send(event).ok();
        }
    }

    /// Minify `path` over itself, if the filter allows.
    pub fn minify_in_place(&self, path: &Path) -> Result<bool, StageError> {
        if !self.filter.can_minify(path) {
            return Ok(false);
        }
        let bytes = fs::read(path).map_err(io_err(path))?;
        let minified = self.deriver.minify(&bytes, path).map_err(derive_err(path))?;
        fs::write(path, minified).map_err(io_err(path))?;
        Ok(true)
    }

    /// Write the minified variant of `path` to its `.min` sibling, if the
    /// filter allows. Returns the sibling path.
    pub fn minify_sibling(&self, path: &Path) -> Result<Option<PathBuf>, StageError> {
        if !self.filter.can_minify(path) {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(io_err(path))?;
        let minified = self.deriver.minify(&bytes, path).map_err(derive_err(path))?;
        let dest = minified_path(path);
        fs::write(&dest, minified).map_err(io_err(&dest))?;
        Ok(Some(dest))
    }

    /// Write the gzipped variant of `path` to its `.gz` sibling, if the
    /// filter allows. Returns the sibling path.
    pub fn gzip_sibling(&self, path: &Path) -> Result<Option<PathBuf>, StageError> {
        if !self.filter.can_gzip(path) {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(io_err(path))?;
        let gzipped = self.deriver.gzip(&bytes).map_err(derive_err(path))?;
        let dest = gzipped_path(path);
        fs::write(&dest, gzipped).map_err(io_err(&dest))?;
        Ok(Some(dest))
    }
}

/// A build step.
pub trait Stage {
    fn name(&self) -> &'static str;

    /// The stage's own enable flag.
    fn enabled(&self) -> bool;

    /// Directory the stage walks.
    fn root_path(&self) -> &Path;

    /// Do the work unconditionally.
    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, StageError>;

    /// Run the stage if enabled; otherwise report it as skipped.
    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageReport, StageError> {
        if !self.enabled() {
            tracing::debug!(stage = self.name(), "stage disabled");
            ctx.emit(BuildEvent::StageSkipped { stage: self.name() });
            return Ok(StageReport::skipped(self.name()));
        }
        tracing::info!(stage = self.name(), root = %self.root_path().display(), "stage started");
        ctx.emit(BuildEvent::StageStarted { stage: self.name() });
        let report = self.run(ctx)?;
        tracing::info!(stage = self.name(), files = report.files, "stage finished");
        Ok(report)
    }

    /// `path` relative to [`Stage::root_path`].
    fn relative_path<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.root_path()).unwrap_or(path)
    }
}

/// Every regular file under `root`, sorted. A missing root yields nothing.
pub fn iter_files(root: &Path) -> Result<Vec<PathBuf>, StageError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Write `bytes` to `path`, creating parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, bytes).map_err(io_err(path))
}

/// `/`-separated display form of a relative path.
pub fn display_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
