//! Video fingerprint (content-addressed cache key).

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ModelError, ModelResult};

/// Length of a fingerprint in hex characters (SHA-256).
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Deterministic identifier of a video, used exclusively as the cache key.
///
/// Always 64 lowercase hex characters. Construct it with [`VideoFingerprint::parse`]
/// or [`VideoFingerprint::from_digest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoFingerprint(String);

impl VideoFingerprint {
    /// Parse a client-supplied fingerprint. Uppercase hex is normalized.
    pub fn parse(value: &str) -> ModelResult<Self> {
        let value = value.trim();
        if value.len() != FINGERPRINT_HEX_LEN {
            return Err(ModelError::invalid_fingerprint(format!(
                "expected {} hex characters, got {}",
                FINGERPRINT_HEX_LEN,
                value.len()
            )));
        }
        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ModelError::invalid_fingerprint(
                "fingerprint must be hexadecimal",
            ));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Build a fingerprint from a raw 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut hex = String::with_capacity(FINGERPRINT_HEX_LEN);
        for byte in digest {
            hex.push_str(&format!("{:02x}", byte));
        }
        Self(hex)
    }

    /// Get the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for VideoFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VideoFingerprint {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for VideoFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for VideoFingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
