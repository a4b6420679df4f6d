//! Text minification.
//!
//! The [`Minifier`] trait is the seam for the minify collaborator; stages
//! only ever see `&dyn Minifier`. [`TextMinifier`] is the production
//! implementation: HTML is minified in-house (comment stripping plus
//! whitespace folding), CSS and JavaScript go through the `minifier` crate.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinifyError {
    #[error("no minifier for {0}")]
    NotMinifiable(String),
    #[error("content is not valid UTF-8")]
    NotUtf8(#[from] std::string::FromUtf8Error),
    #[error("CSS minification failed: {0}")]
    Css(String),
}

/// Content kinds that can be minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinifyKind {
    Html,
    Css,
    Js,
}

impl MinifyKind {
    /// Kind for a bare extension (no dot), case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "css" => Some(Self::Css),
            "js" => Some(Self::Js),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Produces a smaller equivalent of text content.
pub trait Minifier: Sync {
    fn minify(&self, bytes: &[u8], kind: MinifyKind) -> Result<Vec<u8>, MinifyError>;
}

/// Production minifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMinifier;

impl Minifier for TextMinifier {
    fn minify(&self, bytes: &[u8], kind: MinifyKind) -> Result<Vec<u8>, MinifyError> {
        let text = String::from_utf8(bytes.to_vec())?;
        let out = match kind {
            MinifyKind::Html => minify_html(&text),
            MinifyKind::Css => minifier::css::minify(&text)
                .map_err(|e| MinifyError::Css(e.to_string()))?
                .to_string(),
            MinifyKind::Js => minifier::js::minify(&text).to_string(),
        };
        Ok(out.into_bytes())
    }
}

/// Remove `<!-- ... -->` comments, including ones spanning lines. An
/// unterminated comment runs to the end of the document.
fn strip_html_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start + 4..].find("-->") {
            Some(end) => rest = &rest[start + 4 + end + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Line-based HTML minification: strip comments, fold whitespace runs to a
/// single space, trim each line and drop blank ones.
pub fn minify_html(text: &str) -> String {
    strip_html_comments(text)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
