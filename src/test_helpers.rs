//! Shared test utilities for the staticpage test suite.
//!
//! Provides the fixture site, its loaded config, and stub collaborators
//! with deterministic output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let parts = fixture_context_parts(tmp.path());
//! let ctx = parts.context(Deriver::new(&StubMinifier));
//!
//! StaticCopyStage::new(&parts.config.static_files, &parts.config.dirs.static_files)
//!     .execute(&ctx)
//!     .unwrap();
//! ```
//!
//! # Fixture layout (`fixtures/site/`)
//!
//! ```text
//! staticpage.toml
//! pages/      index.html contact.html help.html robots.txt
//!             blog/post.md private/gallery.html
//! templates/  base.html
//! static/     main.css app.js help.js logo.jpeg private/admin.js
//! sass/       hero.scss README.txt
//! data/       company.toml
//! cdn/        css/timetable.css img/logo.png
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::config::{SiteConfig, load_config};
use crate::filter::ArtifactFilter;
use crate::minify::{Minifier, MinifyError, MinifyKind};
use crate::render::{Context, PageRenderer, RenderError, split_front_matter};
use crate::stages::StageContext;
use crate::variant::Deriver;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// The fixture's `staticpage.toml`, with directories resolved into `root`.
pub fn fixture_config(root: &Path) -> SiteConfig {
    load_config(&root.join("staticpage.toml")).unwrap()
}

/// Config and filter for building a [`StageContext`] over the fixture.
pub struct FixtureParts {
    pub config: SiteConfig,
    pub filter: ArtifactFilter,
}

impl FixtureParts {
    pub fn context<'a>(&'a self, deriver: Deriver<'a>) -> StageContext<'a> {
        StageContext {
            dirs: &self.config.dirs,
            urls: &self.config.urls,
            filter: &self.filter,
            deriver,
            events: None,
        }
    }
}

pub fn fixture_context_parts(root: &Path) -> FixtureParts {
    let config = fixture_config(root);
    let filter = ArtifactFilter::new(&config.dirs.site, &config.minify, &config.gzip).unwrap();
    FixtureParts { config, filter }
}

// =========================================================================
// Stub collaborators
// =========================================================================

/// Minifier that strips all ASCII whitespace, whatever the kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubMinifier;

impl StubMinifier {
    pub fn expected(bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect()
    }
}

impl Minifier for StubMinifier {
    fn minify(&self, bytes: &[u8], _kind: MinifyKind) -> Result<Vec<u8>, MinifyError> {
        Ok(Self::expected(bytes))
    }
}

/// [`StubMinifier`] that counts its calls.
#[derive(Debug, Default)]
pub struct CountingMinifier {
    calls: AtomicUsize,
}

impl CountingMinifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Minifier for CountingMinifier {
    fn minify(&self, bytes: &[u8], kind: MinifyKind) -> Result<Vec<u8>, MinifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StubMinifier.minify(bytes, kind)
    }
}

/// Renderer whose output names the template; markdown bodies pass through
/// untouched after the real front matter split.
#[derive(Debug, Default)]
pub struct StubRenderer;

impl StubRenderer {
    pub fn rendered(template: &str) -> String {
        format!("<html>\n  <body>{template}</body>\n</html>\n")
    }
}

impl PageRenderer for StubRenderer {
    fn render(&self, template: &str, _context: &Context) -> Result<String, RenderError> {
        Ok(Self::rendered(template))
    }

    fn parse_markdown(&self, text: &str) -> Result<(String, Context), RenderError> {
        let (headers, body) = split_front_matter(text)?;
        Ok((body.to_string(), headers))
    }
}
