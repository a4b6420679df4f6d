//! Content fingerprints for change detection.
//!
//! The publish stage stores an MD5 hex digest of each file's raw bytes as
//! object metadata and compares it on the next run. MD5 is used for
//! compatibility with checksums already stored on published objects; it is a
//! change token, not an integrity guarantee.

use md5::{Digest, Md5};

/// MD5 of `bytes`, as a 32-character lowercase hex string.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}
