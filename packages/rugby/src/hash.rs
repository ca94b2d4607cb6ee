//! Hashing primitives shared across the cache engine.
//!
//! Two distinct hash families are used by `rugby`, each for a different
//! purpose:
//! - [`Blake3`] identifies file *content*, used when verifying artifacts
//!   moved into or out of the binary store.
//! - [`Sha256`] identifies a target's *fingerprint context* (see
//!   [`crate::fingerprint`]), matching the reference hash named by the
//!   fingerprint algorithm.

use std::path::Path;

use color_eyre::Result;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256 as Sha256Hasher};
use tracing::{instrument, trace};

use crate::fs;

/// A Blake3 hash, hex encoded.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
pub struct Blake3(String);

impl Blake3 {
    /// Hash the contents of the file at the specified path.
    #[instrument(name = "Blake3::from_file")]
    pub async fn from_file(path: &crate::path::AbsFilePath) -> Result<Self> {
        let content = fs::must_read_buffered(path).await?;
        Ok(Self::from_buffer(content))
    }

    /// Hash the contents of a buffer.
    #[instrument(skip_all, name = "Blake3::from_buffer")]
    pub fn from_buffer(buffer: impl AsRef<[u8]>) -> Self {
        let buffer = buffer.as_ref();
        let hash = blake3::hash(buffer).as_bytes().to_vec();
        let hash = hex::encode(hash);
        trace!(?hash, bytes = buffer.len(), "hash buffer");
        Self(hash)
    }

    /// View the hash as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Blake3 {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A SHA-256 digest, hex encoded.
///
/// This is the reference hash used for target [`fingerprints`](crate::fingerprint::Fingerprint):
/// content-addressable, deterministic, and stable across platforms given the
/// same byte-equal input document.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
pub struct Sha256(String);

impl Sha256 {
    /// Hash a single buffer.
    pub fn from_buffer(buffer: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256Hasher::new();
        hasher.update(buffer.as_ref());
        Self(hex::encode(hasher.finalize()))
    }

    /// Hash the path at the given location.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(Self::from_buffer(bytes))
    }

    /// View the hash as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Report whether this string has the shape of a hash produced by this
    /// module: lowercase hex.
    pub fn looks_like_hex(candidate: &str) -> bool {
        !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl AsRef<str> for Sha256 {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Sha256> for String {
    fn from(hash: Sha256) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        let a = Sha256::from_buffer(b"hello world");
        let b = Sha256::from_buffer(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn sha256_differs_on_differing_input() {
        let a = Sha256::from_buffer(b"hello world");
        let b = Sha256::from_buffer(b"hello worlD");
        assert_ne!(a, b);
    }

    #[test]
    fn looks_like_hex_rejects_non_hex() {
        assert!(Sha256::looks_like_hex("a1b2c3"));
        assert!(!Sha256::looks_like_hex("not-hex!"));
        assert!(!Sha256::looks_like_hex(""));
    }
}
