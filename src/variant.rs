//! Variant derivation: minified and gzip-compressed bytes.
//!
//! Derivation is pure: bytes in, bytes out. Where a variant lands is decided
//! by the naming helpers below, shared by the local stages (sibling files)
//! and the publish stage (object keys):
//!
//! | Variant | `main.css` | `LICENSE` |
//! |---|---|---|
//! | raw | `main.css` | `LICENSE` |
//! | minified | `main.min.css` | `LICENSE.min` |
//! | gzipped | `main.css.gz` | `LICENSE.gz` |
//! | gzipped minified | `main.min.css.gz` | `LICENSE.min.gz` |

use flate2::Compression;
use flate2::GzBuilder;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::minify::{Minifier, MinifyError, MinifyKind};

/// Gzip level used for every compressed variant.
pub const GZIP_LEVEL: u32 = 9;

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("minify error: {0}")]
    Minify(#[from] MinifyError),
    #[error("gzip error: {0}")]
    Gzip(#[from] io::Error),
}

/// Computes derived variant bytes.
#[derive(Clone, Copy)]
pub struct Deriver<'a> {
    minifier: &'a dyn Minifier,
    mtime: u32,
}

impl<'a> Deriver<'a> {
    pub fn new(minifier: &'a dyn Minifier) -> Self {
        Self { minifier, mtime: 0 }
    }

    /// Override the gzip header timestamp (seconds since the epoch).
    pub fn with_mtime(mut self, mtime: u32) -> Self {
        self.mtime = mtime;
        self
    }

    /// Minify `bytes`, choosing the content kind from `path`'s extension.
    pub fn minify(&self, bytes: &[u8], path: &Path) -> Result<Vec<u8>, DeriveError> {
        let kind = MinifyKind::from_path(path)
            .ok_or_else(|| MinifyError::NotMinifiable(path.display().to_string()))?;
        Ok(self.minifier.minify(bytes, kind)?)
    }

    /// Gzip `bytes` at level 9 with a fixed header timestamp, so equal input
    /// always yields equal output.
    pub fn gzip(&self, bytes: &[u8]) -> Result<Vec<u8>, DeriveError> {
        let mut encoder = GzBuilder::new()
            .mtime(self.mtime)
            .write(Vec::with_capacity(bytes.len() / 2), Compression::new(GZIP_LEVEL));
        encoder.write_all(bytes)?;
        Ok(encoder.finish()?)
    }
}

/// `name.ext` -> `name.min.ext`; a name without extension gets `.min`.
pub fn minified_name(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}.min{}", &name[..idx], &name[idx..]),
        _ => format!("{name}.min"),
    }
}

/// `name` -> `name.gz`.
pub fn gzipped_name(name: &str) -> String {
    format!("{name}.gz")
}

/// Sibling path holding the minified variant of `path`.
pub fn minified_path(path: &Path) -> PathBuf {
    rename_file(path, minified_name)
}

/// Sibling path holding the gzipped variant of `path`.
pub fn gzipped_path(path: &Path) -> PathBuf {
    rename_file(path, gzipped_name)
}

fn rename_file(path: &Path, rename: fn(&str) -> String) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    path.with_file_name(rename(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubMinifier;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn gunzip(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn gzip_decompresses_to_input() {
        let deriver = Deriver::new(&StubMinifier);
        let gz = deriver.gzip(b".hero{font-size:13rem}").unwrap();
        assert_eq!(gunzip(&gz), b".hero{font-size:13rem}");
    }

    #[test]
    fn gzip_is_reproducible() {
        let deriver = Deriver::new(&StubMinifier);
        let a = deriver.gzip(b"same bytes").unwrap();
        let b = deriver.gzip(b"same bytes").unwrap();
        assert_eq!(a, b);
        // MTIME field of the gzip header
        assert_eq!(&a[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn gzip_mtime_override_lands_in_header() {
        let deriver = Deriver::new(&StubMinifier).with_mtime(0x0102_0304);
        let gz = deriver.gzip(b"x").unwrap();
        assert_eq!(&gz[4..8], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn minify_dispatches_on_extension() {
        let deriver = Deriver::new(&StubMinifier);
        let out = deriver.minify(b"a { }", Path::new("css/main.CSS")).unwrap();
        assert_eq!(out, StubMinifier::expected(b"a { }"));
    }

    #[test]
    fn minify_unsupported_kind_is_error() {
        let deriver = Deriver::new(&StubMinifier);
        let err = deriver.minify(b"\x89PNG", Path::new("logo.png")).unwrap_err();
        assert!(matches!(
            err,
            DeriveError::Minify(MinifyError::NotMinifiable(_))
        ));
    }

    // =========================================================================
    // Naming
    // =========================================================================

    #[test]
    fn variant_names() {
        assert_eq!(minified_name("timetable.css"), "timetable.min.css");
        assert_eq!(gzipped_name("timetable.css"), "timetable.css.gz");
        assert_eq!(
            gzipped_name(&minified_name("timetable.css")),
            "timetable.min.css.gz"
        );
        assert_eq!(minified_name("archive.tar.gz"), "archive.tar.min.gz");
    }

    #[test]
    fn variant_names_without_extension() {
        assert_eq!(minified_name("LICENSE"), "LICENSE.min");
        assert_eq!(minified_name(".htaccess"), ".htaccess.min");
    }

    #[test]
    fn variant_paths_are_siblings() {
        let path = Path::new("/site/static/main.css");
        assert_eq!(minified_path(path), PathBuf::from("/site/static/main.min.css"));
        assert_eq!(gzipped_path(path), PathBuf::from("/site/static/main.css.gz"));
    }
}
