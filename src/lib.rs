//! # staticpage
//!
//! A static site builder that turns a tree of page templates, markdown
//! documents, stylesheets, and static assets into a deployable output tree,
//! then publishes a staging tree to an S3-compatible bucket, uploading only
//! what changed.
//!
//! # Architecture: Fixed-Order Stage Pipeline
//!
//! ```text
//! 0. Clean     site/                   (optional)
//! 1. Pages     pages/   →  site/       (render .html / .md, copy the rest)
//! 2. Static    static/  →  site/static/
//! 3. Sass      sass/    →  site/static/css/  or  cdn/css/
//! 4. Publish   cdn/     →  bucket      (checksum-gated upload)
//! ```
//!
//! Every stage is enabled by its own `execute` flag in `staticpage.toml`.
//! Besides the file itself, a stage may write up to three variants:
//!
//! | Variant | Name | When |
//! |---------|------|------|
//! | minified | `main.min.css` | extension in `[minify] extensions`, no skip pattern |
//! | gzipped | `main.css.gz` | extension in `[gzip] extensions`, no skip pattern |
//! | gzipped minified | `main.min.css.gz` | both |
//!
//! The page stage is the exception: it minifies HTML in place instead of
//! writing a `.min` sibling.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Orchestrates a build: clean, then each stage in order |
//! | [`stages`] | The `Stage` trait, shared stage context, and the four stages |
//! | [`config`] | `staticpage.toml` loading, `$ENV:` substitution, validation |
//! | [`filter`] | Which files may get minified / gzipped variants |
//! | [`variant`] | Minify and gzip derivation, variant naming |
//! | [`artifact`] | A staged file with lazily derived variants and object keys |
//! | [`fingerprint`] | MD5 content checksums for change detection |
//! | [`mimetypes`] | Extension → content type table for uploads |
//! | [`minify`] | `Minifier` trait and the production text minifier |
//! | [`render`] | `PageRenderer` trait, Tera templates, markdown with front matter |
//! | [`data`] | Data files (`toml`/`json`/`yaml`) exposed to templates |
//! | [`stylesheet`] | `StylesheetCompiler` trait and the grass compiler |
//! | [`store`] | `ObjectStore` trait and the S3 client |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Collaborators Behind Traits
//!
//! Templating, stylesheet compilation, minification, and the object store
//! are each reached through a small trait ([`render::PageRenderer`],
//! [`stylesheet::StylesheetCompiler`], [`minify::Minifier`],
//! [`store::ObjectStore`]). Stages only see `&dyn Trait`, so every stage is
//! tested against stubs without network access or a template directory.
//!
//! ## Checksum-Gated Publishing
//!
//! Each uploaded object carries the MD5 of its source file's raw bytes as
//! `checksum` metadata. On the next run a variant is uploaded only when the
//! stored checksum is missing or different. All four variants of a file
//! share the raw checksum: a variant changes exactly when its source does,
//! and the minifier and gzip level are fixed.
//!
//! ## Reproducible Gzip
//!
//! Gzip output uses level 9 and a zero header timestamp, so rebuilding an
//! unchanged file produces identical bytes.

pub mod artifact;
pub mod config;
pub mod data;
pub mod filter;
pub mod fingerprint;
pub mod mimetypes;
pub mod minify;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod stages;
pub mod store;
pub mod stylesheet;
pub mod variant;

#[cfg(test)]
pub(crate) mod test_helpers;
