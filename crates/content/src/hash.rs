use std::fmt;
use std::str::FromStr;

use crate::error::LocatorError;

/// SHA-1 of the empty byte sequence. Backends never need to store it.
pub const EMPTY_CONTENT_HASH: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

const HASH_LEN: usize = 40;

/// A Moodle content hash: 40 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a hash, ignoring surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, LocatorError> {
        let trimmed = raw.trim();
        let valid = trimmed.len() == HASH_LEN
            && trimmed
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(LocatorError::InvalidHash(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn empty() -> Self {
        Self(EMPTY_CONTENT_HASH.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty_content(&self) -> bool {
        self.0 == EMPTY_CONTENT_HASH
    }

    /// Storage layout shared by the filesystem and object storage
    /// backends: `ab/cd/abcd...`.
    pub fn shard_path(&self) -> String {
        format!("{}/{}/{}", &self.0[..2], &self.0[2..4], self.0)
    }

    /// Location of the blob inside a hydrated backup: `files/ab/abcd...`.
    pub fn archive_path(&self) -> String {
        format!("files/{}/{}", &self.0[..2], self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
