//! CLI output formatting for builds.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! ==> pages
//!     blog/post.md → blog/post/index.html (min, gz)
//!     robots.txt → robots.txt
//! ==> static
//!     main.css → static/main.css (min, min.gz, gz)
//! -- sass (disabled)
//! ==> cdn
//!     uploaded  assets/css/timetable.css
//!     unchanged assets/img/logo.png
//!
//! Built pages: 2 files, 1 variants; static: 1 files, 3 variants; cdn: 2 files, 1 uploaded, 1 unchanged
//! ```
//!
//! ## Check
//!
//! ```text
//! Config
//!     staticpage.toml
//! Stages
//!     pages   on   web/pages
//!     static  off  web/static
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! do no I/O.

use std::path::Path;

use crate::pipeline::{BuildReport, PlannedStage};
use crate::stages::{BuildEvent, ObjectStatus};

// ============================================================================
// Build progress
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::StageStarted { stage } => vec![format!("==> {stage}")],
        BuildEvent::StageSkipped { stage } => vec![format!("-- {stage} (disabled)")],
        BuildEvent::FileWritten {
            source,
            output,
            variants,
            ..
        } => {
            let mut line = format!("    {source} \u{2192} {output}");
            if !variants.is_empty() {
                line.push_str(&format!(" ({})", variants.join(", ")));
            }
            vec![line]
        }
        BuildEvent::ObjectPublished { key, status } => {
            let label = match status {
                ObjectStatus::Uploaded => "uploaded ",
                ObjectStatus::Unchanged => "unchanged",
            };
            vec![format!("    {label} {key}")]
        }
    }
}

/// Format the summary printed after a build.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.cleaned {
        lines.push("Cleaned output root".to_string());
    }
    lines.push(report.to_string());
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the validated config location and stage plan.
pub fn format_check_output(config_path: &Path, plan: &[PlannedStage]) -> Vec<String> {
    let mut lines = vec!["Config".to_string(), format!("    {}", config_path.display())];
    lines.push("Stages".to_string());
    let width = plan.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for stage in plan {
        let flag = if stage.enabled { "on " } else { "off" };
        lines.push(format!(
            "    {:width$}  {}  {}",
            stage.name,
            flag,
            stage.root.display(),
            width = width
        ));
    }
    lines
}

pub fn print_check_output(config_path: &Path, plan: &[PlannedStage]) {
    for line in format_check_output(config_path, plan) {
        println!("{}", line);
    }
}
