//! Build orchestration.
//!
//! A build runs in a fixed order, each stage gated by its own flag:
//!
//! 1. clean the output root (`clean_before_build`)
//! 2. pages
//! 3. static copy
//! 4. stylesheets
//! 5. publish
//!
//! The first failing stage aborts the build. Collaborators are passed in by
//! reference so tests can swap any of them for a stub.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;

use crate::config::SiteConfig;
use crate::filter::{ArtifactFilter, FilterError};
use crate::minify::Minifier;
use crate::render::PageRenderer;
use crate::stages::{
    BuildEvent, PageStage, PublishStage, Stage, StageContext, StageError, StageReport,
    StaticCopyStage, StylesheetStage,
};
use crate::store::ObjectStore;
use crate::stylesheet::StylesheetCompiler;
use crate::variant::Deriver;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid pattern: {0}")]
    Filter(#[from] FilterError),
    #[error("failed to clean {path}: {source}")]
    Clean {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        source: StageError,
    },
}

/// External collaborators used by the stages.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub renderer: &'a dyn PageRenderer,
    pub compiler: &'a dyn StylesheetCompiler,
    pub minifier: &'a dyn Minifier,
    /// Required only when publishing is enabled.
    pub store: Option<&'a dyn ObjectStore>,
}

/// Per-stage outcomes of a build, in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub cleaned: bool,
    pub stages: Vec<StageReport>,
}

impl BuildReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ran: Vec<String> = self
            .stages
            .iter()
            .filter(|s| !s.skipped)
            .map(|s| s.to_string())
            .collect();
        if ran.is_empty() {
            write!(f, "Nothing to do: every stage is disabled")
        } else {
            write!(f, "Built {}", ran.join("; "))
        }
    }
}

/// A stage as configured, for `check` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub name: &'static str,
    pub enabled: bool,
    pub root: PathBuf,
}

/// The stages a build would run, in order.
pub fn stage_plan(config: &SiteConfig) -> Vec<PlannedStage> {
    let dirs = &config.dirs;
    vec![
        PlannedStage {
            name: "pages",
            enabled: config.pages.execute,
            root: dirs.pages.clone(),
        },
        PlannedStage {
            name: "static",
            enabled: config.static_files.execute,
            root: dirs.static_files.clone(),
        },
        PlannedStage {
            name: "sass",
            enabled: config.sass.execute,
            root: dirs.sass.clone(),
        },
        PlannedStage {
            name: "cdn",
            enabled: config.cdn.execute,
            root: dirs.cdn.clone(),
        },
    ]
}

/// Run every stage in order.
pub fn build(
    config: &SiteConfig,
    collaborators: Collaborators<'_>,
    events: Option<&Sender<BuildEvent>>,
) -> Result<BuildReport, BuildError> {
    let mut report = BuildReport::default();

    if config.clean_before_build && config.dirs.site.exists() {
        tracing::info!(site = %config.dirs.site.display(), "cleaning output root");
        fs::remove_dir_all(&config.dirs.site).map_err(|source| BuildError::Clean {
            path: config.dirs.site.clone(),
            source,
        })?;
        report.cleaned = true;
    }

    let filter = ArtifactFilter::new(&config.dirs.site, &config.minify, &config.gzip)?;
    let ctx = StageContext {
        dirs: &config.dirs,
        urls: &config.urls,
        filter: &filter,
        deriver: Deriver::new(collaborators.minifier),
        events,
    };

    let pages = PageStage::new(&config.pages, &config.dirs.pages, collaborators.renderer)?;
    let static_copy = StaticCopyStage::new(&config.static_files, &config.dirs.static_files);
    let stylesheets = StylesheetStage::new(&config.sass, &config.dirs.sass, collaborators.compiler);
    let publish = PublishStage::new(&config.cdn, &config.dirs.cdn, collaborators.store);
    let stages: [&dyn Stage; 4] = [&pages, &static_copy, &stylesheets, &publish];

    for stage in stages {
        let stage_report = stage.execute(&ctx).map_err(|source| BuildError::Stage {
            stage: stage.name(),
            source,
        })?;
        report.stages.push(stage_report);
    }
    Ok(report)
}
