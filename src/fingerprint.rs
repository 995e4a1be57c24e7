//! Content fingerprints
//!
//! A fingerprint is an immutable SHA-256 digest of a source file's bytes,
//! wrapped with a `sha256:` prefix. Fingerprints are used purely as an
//! equality oracle for change detection and are never decoded.

use std::fmt;

use sha2::{Digest, Sha256};

/// Content fingerprint value object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Prefix for SHA-256 fingerprints
    pub const PREFIX: &'static str = "sha256:";

    /// Compute the fingerprint of a byte sequence. Succeeds for any input,
    /// including empty.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(format!("{}{:x}", Self::PREFIX, digest))
    }

    /// Rehydrate a fingerprint from its persisted string form, adding the
    /// prefix if it is missing.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with(Self::PREFIX) {
            Self(raw.to_string())
        } else {
            Self(format!("{}{}", Self::PREFIX, raw))
        }
    }

    /// Full string form with prefix
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digits without the prefix
    pub fn hex(&self) -> &str {
        self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
