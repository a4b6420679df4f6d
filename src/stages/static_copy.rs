//! Static-copy stage.
//!
//! Copies the static tree to `<site>/<static subpath>/` and writes variants
//! beside each copy:
//!
//! ```text
//! static/main.css  ->  site/static/main.css
//!                      site/static/main.min.css      (minify allowed)
//!                      site/static/main.min.css.gz   (minify and gzip allowed)
//!                      site/static/main.css.gz       (gzip allowed)
//! ```
//!
//! Files are independent, so they are processed in parallel on the rayon
//! pool.

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    BuildEvent, Stage, StageContext, StageError, StageReport, display_path, io_err, iter_files,
};
use crate::config::StaticConfig;

pub struct StaticCopyStage<'a> {
    config: &'a StaticConfig,
    root: PathBuf,
}

impl<'a> StaticCopyStage<'a> {
    pub fn new(config: &'a StaticConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    /// Copy one file and derive its variants. Returns the number of variant
    /// files written.
    fn copy_one(&self, ctx: &StageContext<'_>, source: &Path) -> Result<usize, StageError> {
        let relative = self.relative_path(source);
        let output_rel = ctx.urls.static_subpath().join(relative);
        let dest = ctx.dirs.site.join(&output_rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::copy(source, &dest).map_err(io_err(&dest))?;

        let mut variants = Vec::new();
        if let Some(min) = ctx.minify_sibling(&dest)? {
            variants.push("min");
            if ctx.gzip_sibling(&min)?.is_some() {
                variants.push("min.gz");
            }
        }
        if ctx.gzip_sibling(&dest)?.is_some() {
            variants.push("gz");
        }

        tracing::debug!(
            source = %relative.display(),
            output = %output_rel.display(),
            ?variants,
            "static file copied"
        );
        let written = variants.len();
        ctx.emit(BuildEvent::FileWritten {
            stage: self.name(),
            source: display_path(relative),
            output: display_path(&output_rel),
            variants,
        });
        Ok(written)
    }
}

impl Stage for StaticCopyStage<'_> {
    fn name(&self) -> &'static str {
        "static"
    }

    fn enabled(&self) -> bool {
        self.config.execute
    }

    fn root_path(&self) -> &Path {
        &self.root
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, StageError> {
        let files = iter_files(&self.root)?;
        let variants = files
            .par_iter()
            .map(|source| self.copy_one(ctx, source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StageReport {
            files: files.len(),
            variants: variants.iter().sum(),
            ..StageReport::new(self.name())
        })
    }
}
