//! Short codes and the fingerprint function that derives them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters in a short code.
pub const CODE_LEN: usize = 16;

/// Function used by the index to derive a code from a path key.
pub type Fingerprinter = fn(&str) -> ShortCode;

/// Fixed-width lowercase hex identifier standing in for a relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Parses a code received from a client.
    ///
    /// Returns `None` unless the input is exactly [`CODE_LEN`] lowercase hex
    /// characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == CODE_LEN
            && raw
                .bytes()
                .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ShortCode {
    type Err = InvalidShortCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidShortCode(s.to_string()))
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid short code: {0}")]
pub struct InvalidShortCode(pub String);

/// Derives the short code for a path key: the first [`CODE_LEN`] hex
/// characters of its SHA-256 digest.
pub fn fingerprint(path: &str) -> ShortCode {
    let digest = Sha256::digest(path.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(CODE_LEN);
    ShortCode(encoded)
}
