//! Published artifacts and their variants.
//!
//! An [`Artifact`] is one file from the staging tree on its way to the
//! object store. It owns the raw bytes and derives the other variants on
//! first use, each at most once. Variants the filter rejects are never
//! computed.

use std::cell::OnceCell;
use std::path::{Component, Path, PathBuf};

use crate::filter::ArtifactFilter;
use crate::fingerprint::fingerprint;
use crate::mimetypes;
use crate::variant::{DeriveError, Deriver, gzipped_path, minified_path};

/// The four forms a file can be published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Raw,
    Minified,
    Gzipped,
    GzippedMinified,
}

impl Variant {
    /// Upload order.
    pub const ALL: [Variant; 4] = [
        Variant::Raw,
        Variant::Minified,
        Variant::Gzipped,
        Variant::GzippedMinified,
    ];

    pub fn content_encoding(self) -> &'static str {
        match self {
            Variant::Raw | Variant::Minified => "",
            Variant::Gzipped | Variant::GzippedMinified => "gzip",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Variant::Raw => "raw",
            Variant::Minified => "min",
            Variant::Gzipped => "gz",
            Variant::GzippedMinified => "min.gz",
        }
    }

    /// Path of this variant for a raw file at `path`.
    pub fn path_for(self, path: &Path) -> PathBuf {
        match self {
            Variant::Raw => path.to_path_buf(),
            Variant::Minified => minified_path(path),
            Variant::Gzipped => gzipped_path(path),
            Variant::GzippedMinified => gzipped_path(&minified_path(path)),
        }
    }
}

/// Join a key prefix and a relative path with `/`.
///
/// A trailing `/` on the prefix is ignored; an empty prefix yields the bare
/// relative key.
pub fn object_key(prefix: &str, relative: &Path) -> String {
    let rel = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        rel
    } else {
        format!("{prefix}/{rel}")
    }
}

/// One staged file and its lazily derived variants.
pub struct Artifact<'a> {
    destination: PathBuf,
    bytes: Vec<u8>,
    can_minify: bool,
    can_gzip: bool,
    deriver: Deriver<'a>,
    fingerprint: OnceCell<String>,
    minified: OnceCell<Vec<u8>>,
    gzipped: OnceCell<Vec<u8>>,
    gzipped_minified: OnceCell<Vec<u8>>,
}

impl<'a> Artifact<'a> {
    /// `destination` is relative to the staging root.
    pub fn new(
        destination: impl Into<PathBuf>,
        bytes: Vec<u8>,
        filter: &ArtifactFilter,
        deriver: Deriver<'a>,
    ) -> Self {
        let destination = destination.into();
        Self {
            can_minify: filter.can_minify(&destination),
            can_gzip: filter.can_gzip(&destination),
            destination,
            bytes,
            deriver,
            fingerprint: OnceCell::new(),
            minified: OnceCell::new(),
            gzipped: OnceCell::new(),
            gzipped_minified: OnceCell::new(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_eligible(&self, variant: Variant) -> bool {
        match variant {
            Variant::Raw => true,
            Variant::Minified => self.can_minify,
            Variant::Gzipped => self.can_gzip,
            Variant::GzippedMinified => self.can_minify && self.can_gzip,
        }
    }

    /// Eligible variants, in upload order.
    pub fn variants(&self) -> impl Iterator<Item = Variant> + '_ {
        Variant::ALL
            .into_iter()
            .filter(|v| self.is_eligible(*v))
    }

    /// Checksum of the raw bytes, shared by every variant.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| fingerprint(&self.bytes))
    }

    pub fn content_type(&self) -> &'static str {
        mimetypes::content_type(&self.destination)
    }

    pub fn key(&self, prefix: &str, variant: Variant) -> String {
        object_key(prefix, &variant.path_for(&self.destination))
    }

    /// Bytes of `variant`, derived on first request. `None` when the filter
    /// rules the variant out.
    pub fn bytes(&self, variant: Variant) -> Result<Option<&[u8]>, DeriveError> {
        if !self.is_eligible(variant) {
            return Ok(None);
        }
        let bytes = match variant {
            Variant::Raw => &self.bytes[..],
            Variant::Minified => self.minified()?,
            Variant::Gzipped => memoize(&self.gzipped, || self.deriver.gzip(&self.bytes))?,
            Variant::GzippedMinified => {
                let minified = self.minified()?;
                memoize(&self.gzipped_minified, || self.deriver.gzip(minified))?
            }
        };
        Ok(Some(bytes))
    }

    fn minified(&self) -> Result<&[u8], DeriveError> {
        memoize(&self.minified, || {
            self.deriver.minify(&self.bytes, &self.destination)
        })
    }
}

fn memoize(
    cell: &OnceCell<Vec<u8>>,
    derive: impl FnOnce() -> Result<Vec<u8>, DeriveError>,
) -> Result<&[u8], DeriveError> {
    if let Some(bytes) = cell.get() {
        return Ok(bytes);
    }
    let bytes = derive()?;
    Ok(cell.get_or_init(|| bytes))
}
