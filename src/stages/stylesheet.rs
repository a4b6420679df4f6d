//! Stylesheet stage.
//!
//! Compiles every `.scss`/`.sass` file under the sass root to `.css`, keeping
//! its relative path under a `css/` directory:
//!
//! - destination `static`: `<site>/<static subpath>/css/`, then the CSS is
//!   gzipped, minified to `.min.css` and that gzipped too;
//! - destination `cdn`: `<cdn>/css/`, with no local variants; the publish
//!   stage derives them on upload.
//!
//! Other files under the sass root are ignored.

use std::path::{Path, PathBuf};

use super::{
    BuildEvent, Stage, StageContext, StageError, StageReport, display_path, iter_files,
    write_file,
};
use crate::config::{SassConfig, SassDestination};
use crate::stylesheet::StylesheetCompiler;

pub struct StylesheetStage<'a> {
    config: &'a SassConfig,
    root: PathBuf,
    compiler: &'a dyn StylesheetCompiler,
}

fn is_stylesheet_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("scss") || e.eq_ignore_ascii_case("sass"))
}

impl<'a> StylesheetStage<'a> {
    pub fn new(
        config: &'a SassConfig,
        root: impl Into<PathBuf>,
        compiler: &'a dyn StylesheetCompiler,
    ) -> Self {
        Self {
            config,
            root: root.into(),
            compiler,
        }
    }

    /// Directory compiled CSS is written under.
    pub fn output_root(&self, ctx: &StageContext<'_>) -> PathBuf {
        match self.config.destination {
            SassDestination::Cdn => ctx.dirs.cdn.join("css"),
            SassDestination::Static => ctx.dirs.site.join(ctx.urls.static_subpath()).join("css"),
        }
    }
}

impl Stage for StylesheetStage<'_> {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn enabled(&self) -> bool {
        self.config.execute
    }

    fn root_path(&self) -> &Path {
        &self.root
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, StageError> {
        let output_root = self.output_root(ctx);
        let mut report = StageReport::new(self.name());

        for source in iter_files(&self.root)? {
            if !is_stylesheet_source(&source) {
                continue;
            }
            let relative = self.relative_path(&source).to_path_buf();
            let dest = output_root.join(&relative).with_extension("css");
            let css = self.compiler.compile(&source, self.config.output_style)?;
            write_file(&dest, css.as_bytes())?;

            let mut variants = Vec::new();
            if self.config.destination == SassDestination::Static {
                if ctx.gzip_sibling(&dest)?.is_some() {
                    variants.push("gz");
                }
                if let Some(min) = ctx.minify_sibling(&dest)? {
                    variants.push("min");
                    if ctx.gzip_sibling(&min)?.is_some() {
                        variants.push("min.gz");
                    }
                }
            }

            let shown = dest.strip_prefix(&output_root).unwrap_or(&dest);
            let output = format!("css/{}", display_path(shown));
            tracing::debug!(source = %relative.display(), %output, ?variants, "stylesheet compiled");
            report.files += 1;
            report.variants += variants.len();
            ctx.emit(BuildEvent::FileWritten {
                stage: self.name(),
                source: display_path(&relative),
                output,
                variants,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputStyle;
    use crate::stylesheet::GrassCompiler;
    use crate::test_helpers::{StubMinifier, fixture_context_parts, setup_fixtures};
    use crate::variant::Deriver;
    use std::fs;

    #[test]
    fn static_destination_writes_variants() {
        let tmp = setup_fixtures();
        let parts = fixture_context_parts(tmp.path());
        let ctx = parts.context(Deriver::new(&StubMinifier));
        let compiler = GrassCompiler::new();
        let stage = StylesheetStage::new(&parts.config.sass, &parts.config.dirs.sass, &compiler);

        let report = stage.execute(&ctx).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.variants, 3);

        let css_dir = parts.config.dirs.site.join("static/css");
        let compiled = compiler
            .compile(&parts.config.dirs.sass.join("hero.scss"), OutputStyle::Nested)
            .unwrap();
        assert_eq!(fs::read_to_string(css_dir.join("hero.css")).unwrap(), compiled);
        assert_eq!(
            fs::read(css_dir.join("hero.min.css")).unwrap(),
            StubMinifier::expected(compiled.as_bytes())
        );
        assert!(css_dir.join("hero.css.gz").exists());
        assert!(css_dir.join("hero.min.css.gz").exists());
        // Non-stylesheet files under the sass root are ignored
        assert!(!css_dir.join("README.css").exists());
    }

    #[test]
    fn cdn_destination_writes_css_only() {
        let tmp = setup_fixtures();
        let mut parts = fixture_context_parts(tmp.path());
        parts.config.sass.destination = SassDestination::Cdn;
        let ctx = parts.context(Deriver::new(&StubMinifier));
        let compiler = GrassCompiler::new();
        let stage = StylesheetStage::new(&parts.config.sass, &parts.config.dirs.sass, &compiler);

        let report = stage.execute(&ctx).unwrap();
        assert_eq!(report.variants, 0);
        let css_dir = parts.config.dirs.cdn.join("css");
        assert!(css_dir.join("hero.css").exists());
        assert!(!css_dir.join("hero.min.css").exists());
        assert!(!css_dir.join("hero.css.gz").exists());
    }

    #[test]
    fn stylesheet_sources_by_extension() {
        assert!(is_stylesheet_source(Path::new("a/hero.scss")));
        assert!(is_stylesheet_source(Path::new("hero.SASS")));
        assert!(!is_stylesheet_source(Path::new("README.md")));
    }
}
