//! Page stage: renders the pages tree into the output root.
//!
//! Each file under the pages directory becomes one output file:
//!
//! | Source | Output |
//! |---|---|
//! | `about.html` | template `about.html` rendered with the global context |
//! | `blog/post.md` | header `template` (default `base.html`) rendered with `content` + headers |
//! | anything else | copied byte-for-byte |
//!
//! With `only_index` on, HTML outputs other than `index.html` move into a
//! directory of their own (`about.html` -> `about/index.html`) unless their
//! name matches a `skip_for_index` pattern. Written files are then minified
//! in place and gzipped to a `.gz` sibling, as the filter allows.

use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    BuildEvent, Stage, StageContext, StageError, StageReport, display_path, io_err, iter_files,
    write_file,
};
use crate::config::{PageConfig, UrlsConfig};
use crate::filter::{FilterError, compile_patterns, first_match};
use crate::render::{Context, PageRenderer, current_year};

/// Template used for markdown documents without a `template` header.
pub const DEFAULT_TEMPLATE: &str = "base.html";

pub struct PageStage<'a> {
    config: &'a PageConfig,
    root: PathBuf,
    renderer: &'a dyn PageRenderer,
    skip_for_index: Vec<Regex>,
}

impl<'a> PageStage<'a> {
    pub fn new(
        config: &'a PageConfig,
        root: impl Into<PathBuf>,
        renderer: &'a dyn PageRenderer,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            config,
            root: root.into(),
            renderer,
            skip_for_index: compile_patterns(&config.skip_for_index)?,
        })
    }

    /// Apply collapse-to-index to a relative output path.
    pub fn index_path(&self, relative: &Path) -> PathBuf {
        let is_html = relative
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("html"));
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if !is_html
            || !self.config.only_index
            || name == "index.html"
            || first_match(&self.skip_for_index, &name).is_some()
        {
            return relative.to_path_buf();
        }
        relative.with_extension("").join("index.html")
    }

    /// Variables every page sees.
    pub fn global_context(&self, urls: &UrlsConfig) -> Context {
        let mut ctx = Context::new();
        ctx.insert("url_home".into(), Value::from(urls.home.as_str()));
        ctx.insert("url_static".into(), Value::from(urls.static_files.as_str()));
        ctx.insert("url_cdn".into(), Value::from(urls.cdn.as_str()));
        ctx.insert("current_year".into(), Value::from(current_year()));
        for (key, value) in &self.config.globals {
            ctx.insert(key.clone(), toml_to_json(value));
        }
        ctx
    }

    fn render_html(
        &self,
        source: &Path,
        relative: &Path,
        globals: &Context,
    ) -> Result<String, StageError> {
        self.renderer
            .render(&display_path(relative), globals)
            .map_err(|source_err| StageError::Render {
                path: source.to_path_buf(),
                source: source_err,
            })
    }

    fn render_markdown(&self, source: &Path, globals: &Context) -> Result<String, StageError> {
        let text = fs::read_to_string(source).map_err(io_err(source))?;
        let render_err = |e| StageError::Render {
            path: source.to_path_buf(),
            source: e,
        };
        let (html, headers) = self.renderer.parse_markdown(&text).map_err(render_err)?;
        let template = headers
            .get("template")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TEMPLATE)
            .to_string();

        let mut ctx = globals.clone();
        ctx.extend(headers);
        ctx.insert("content".into(), Value::String(html));
        self.renderer.render(&template, &ctx).map_err(render_err)
    }
}

impl Stage for PageStage<'_> {
    fn name(&self) -> &'static str {
        "pages"
    }

    fn enabled(&self) -> bool {
        self.config.execute
    }

    fn root_path(&self) -> &Path {
        &self.root
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, StageError> {
        let globals = self.global_context(ctx.urls);
        let mut report = StageReport::new(self.name());

        for source in iter_files(&self.root)? {
            let relative = self.relative_path(&source).to_path_buf();
            let ext = relative
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();

            let (output_rel, bytes) = match ext.as_str() {
                "html" => {
                    let html = self.render_html(&source, &relative, &globals)?;
                    (relative.clone(), html.into_bytes())
                }
                "md" => {
                    let html = self.render_markdown(&source, &globals)?;
                    (relative.with_extension("html"), html.into_bytes())
                }
                _ => (relative.clone(), fs::read(&source).map_err(io_err(&source))?),
            };
            let output_rel = self.index_path(&output_rel);
            let dest = ctx.dirs.site.join(&output_rel);
            write_file(&dest, &bytes)?;

            let mut variants = Vec::new();
            if ctx.minify_in_place(&dest)? {
                variants.push("min");
            }
            if ctx.gzip_sibling(&dest)?.is_some() {
                variants.push("gz");
                report.variants += 1;
            }
            tracing::debug!(
                source = %relative.display(),
                output = %output_rel.display(),
                ?variants,
                "page written"
            );
            ctx.emit(BuildEvent::FileWritten {
                stage: self.name(),
                source: display_path(&relative),
                output: display_path(&output_rel),
                variants,
            });
            report.files += 1;
        }
        Ok(report)
    }
}

/// Convert a config value into a template value.
fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}
