//! Content-addressed identity for pages and page versions.
//!
//! Both hashes are SHA-256 over the UTF-8 bytes of the input, rendered as
//! lowercase hex. [`UrlHash`] identifies a page by its exact URL string,
//! without any normalization, so `https://a/x` and `https://a/x/` are
//! different pages (see the tests pinning this). [`ContentHash`] identifies
//! one observed content snapshot.
//!
//! Hash values are only ever accepted from two places: computed here, or
//! parsed back out of storage through the validating `parse` constructors.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Rejected digest string: wrong length or not lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a sha-256 hex digest: {0:?}")]
pub struct InvalidHash(pub String);

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn check_digest(s: &str) -> Result<(), InvalidHash> {
    let ok = s.len() == 64
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if ok {
        Ok(())
    } else {
        Err(InvalidHash(s.to_string()))
    }
}

/// Identity of a page: SHA-256 of the exact URL string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlHash(String);

impl UrlHash {
    /// Hashes a URL string as-is. No case folding, no trailing-slash or
    /// query-parameter canonicalization.
    pub fn from_url(url: &str) -> Self {
        Self(sha256_hex(url))
    }

    /// Accepts a stored digest, validating shape.
    pub fn parse(s: &str) -> Result<Self, InvalidHash> {
        check_digest(s)?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of one content snapshot: SHA-256 of the raw content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_content(content: &str) -> Self {
        Self(sha256_hex(content))
    }

    /// Accepts a stored digest, validating shape.
    pub fn parse(s: &str) -> Result<Self, InvalidHash> {
        check_digest(s)?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Serde goes through the validating constructors so a malformed digest in a
// payload is a deserialization error, not a latent bad value.

impl Serialize for UrlHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UrlHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
