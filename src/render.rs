//! Page rendering: templates and markdown.
//!
//! [`PageRenderer`] is the seam between the page stage and the template
//! engine. The production [`TeraRenderer`] loads every template up front:
//!
//! - `.html` files under the pages directory, named by their relative path
//!   (`blog/index.html`), so pages can be rendered as templates;
//! - every file under the templates directory, which wins on a name clash.
//!
//! Templates get two functions besides whatever the context carries:
//! `data(name=..., key=...)` (see [`crate::data`]) and `current_year()`.
//!
//! Markdown documents start with an optional metadata block:
//!
//! ```text
//! ---
//! title: Release notes
//! template: post.html
//! tags: rust
//!     cli
//! ---
//!
//! # Body starts here
//! ```
//!
//! Keys are lowercased. A key with one value maps to a string, a key with
//! continuation lines (indented four spaces) maps to a list.

use chrono::Datelike;
use pulldown_cmark::{Options, Parser, html};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Tera, Value as TeraValue};
use thiserror::Error;
use walkdir::WalkDir;

use crate::data::DataStore;

/// Template variables.
pub type Context = Map<String, Value>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to load templates: {0}")]
    Load(String),
    #[error("failed to render {template}: {message}")]
    Template { template: String, message: String },
    #[error("malformed front matter: {0}")]
    FrontMatter(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Template engine and markdown parser used by the page stage.
pub trait PageRenderer {
    /// Render the template named `template` (a `/`-separated relative path).
    fn render(&self, template: &str, context: &Context) -> Result<String, RenderError>;

    /// Split a markdown document into rendered HTML and its metadata.
    fn parse_markdown(&self, text: &str) -> Result<(String, Context), RenderError>;
}

/// Tera-backed renderer with CommonMark markdown.
pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    pub fn new(pages: &Path, templates: &Path, data: DataStore) -> Result<Self, RenderError> {
        let mut files = template_files(pages, |p| {
            p.extension().is_some_and(|e| e.eq_ignore_ascii_case("html"))
        })?;
        // Added last so that templates shadow same-named pages.
        files.extend(template_files(templates, |_| true)?);

        let mut tera = Tera::default();
        tera.add_template_files(files)
            .map_err(|e| RenderError::Load(error_chain(&e)))?;
        tera.register_function("data", DataFunction(Arc::new(data)));
        tera.register_function("current_year", |_: &HashMap<String, TeraValue>| {
            Ok(TeraValue::from(current_year()))
        });
        Ok(Self { tera })
    }

    #[cfg(test)]
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }
}

impl PageRenderer for TeraRenderer {
    fn render(&self, template: &str, context: &Context) -> Result<String, RenderError> {
        let to_error = |e: tera::Error| RenderError::Template {
            template: template.to_string(),
            message: error_chain(&e),
        };
        let ctx = tera::Context::from_value(Value::Object(context.clone())).map_err(to_error)?;
        self.tera.render(template, &ctx).map_err(to_error)
    }

    fn parse_markdown(&self, text: &str) -> Result<(String, Context), RenderError> {
        let (headers, body) = split_front_matter(text)?;
        Ok((markdown_to_html(body), headers))
    }
}

/// Current calendar year (UTC).
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// `data(name=..., key=...)` template function.
struct DataFunction(Arc<DataStore>);

impl tera::Function for DataFunction {
    fn call(&self, args: &HashMap<String, TeraValue>) -> tera::Result<TeraValue> {
        let name = args
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| tera::Error::msg("data() requires a string `name` argument"))?;
        let key = args.get("key").and_then(|v| v.as_str());
        self.0
            .lookup(name, key)
            .map_err(|e| tera::Error::msg(e.to_string()))
    }
}

/// `(path, name)` pairs for every matching file under `root`, sorted, named
/// by their `/`-separated path relative to `root`.
fn template_files(
    root: &Path,
    include: impl Fn(&Path) -> bool,
) -> Result<Vec<(PathBuf, Option<String>)>, RenderError> {
    if root.as_os_str().is_empty() || !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !include(path) {
            continue;
        }
        let name = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((path.to_path_buf(), Some(name)));
    }
    Ok(files)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// =============================================================================
// Markdown
// =============================================================================

/// CommonMark with tables and `{#id .class}` heading attributes.
pub fn markdown_to_html(body: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_HEADING_ATTRIBUTES;
    let parser = Parser::new_ext(body, options);
    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn is_fence(line: &str) -> bool {
    matches!(line.trim_end(), "---" | "...")
}

fn parse_key_line(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (key.to_ascii_lowercase(), value.trim()))
}

/// Split the leading metadata block off a markdown document.
pub fn split_front_matter(text: &str) -> Result<(Context, &str), RenderError> {
    let mut entries: Vec<(String, Vec<String>)> = Vec::new();
    let mut offset = 0;
    let mut opened = false;
    let mut closed = false;

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let content = line.trim_end_matches(['\n', '\r']);
        if idx == 0 && content.trim_end() == "---" {
            opened = true;
            offset += line.len();
            continue;
        }
        if content.trim().is_empty() || (is_fence(content) && (opened || !entries.is_empty())) {
            offset += line.len();
            closed = true;
            break;
        }
        if let Some((key, value)) = parse_key_line(content) {
            entries.push((key, vec![value.to_string()]));
        } else if content.starts_with("    ") && !entries.is_empty() {
            if let Some((_, values)) = entries.last_mut() {
                values.push(content.trim().to_string());
            }
        } else {
            closed = true;
            break;
        }
        offset += line.len();
    }

    if opened && !closed {
        return Err(RenderError::FrontMatter(
            "metadata block opened with --- is never closed".into(),
        ));
    }

    let mut headers = Context::new();
    for (key, mut values) in entries {
        let value = match values.len() {
            1 => Value::String(values.remove(0)),
            _ => Value::Array(values.into_iter().map(Value::String).collect()),
        };
        match headers.get_mut(&key) {
            Some(Value::Array(existing)) => match value {
                Value::Array(more) => existing.extend(more),
                single => existing.push(single),
            },
            Some(existing) => {
                let first = existing.take();
                let mut merged = vec![first];
                match value {
                    Value::Array(more) => merged.extend(more),
                    single => merged.push(single),
                }
                *existing = Value::Array(merged);
            }
            None => {
                headers.insert(key, value);
            }
        }
    }
    let body = if closed { &text[offset..] } else { "" };
    Ok((headers, body))
}
