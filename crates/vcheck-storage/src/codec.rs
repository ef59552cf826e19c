//! Cache entry encoding.
//!
//! Entries are stored as JSON, gzip-compressed for blob storage. Anything
//! that fails to decode, or carries an older entry version, is treated as a
//! cache miss.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use vcheck_models::{CacheEntry, VideoFingerprint, CACHE_ENTRY_VERSION};

use crate::error::{StorageError, StorageResult};

/// Content type for gzip-compressed JSON.
pub const CONTENT_TYPE_GZIP: &str = "application/gzip";

pub fn encode_entry(entry: &CacheEntry) -> StorageResult<String> {
    serde_json::to_string(entry)
        .map_err(|e| StorageError::serialization(format!("Failed to serialize cache entry: {}", e)))
}

/// Decode a JSON entry stored under `fingerprint`.
pub fn decode_entry(json: &str, fingerprint: &VideoFingerprint) -> Option<CacheEntry> {
    let entry = match serde_json::from_str::<CacheEntry>(json) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(fingerprint = %fingerprint.short(), error = %e, "Failed to deserialize cache entry");
            return None;
        }
    };

    if !entry.is_current_version() {
        debug!(
            fingerprint = %fingerprint.short(),
            cached_version = entry.version,
            current_version = CACHE_ENTRY_VERSION,
            "Cache entry version mismatch, treating as miss"
        );
        return None;
    }

    if &entry.fingerprint != fingerprint {
        warn!(
            fingerprint = %fingerprint.short(),
            stored = %entry.fingerprint.short(),
            "Cache entry stored under the wrong key, treating as miss"
        );
        return None;
    }

    Some(entry)
}

/// Compress an entry to gzip JSON bytes.
pub fn compress_entry(entry: &CacheEntry) -> StorageResult<Vec<u8>> {
    let json = encode_entry(entry)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(json.as_bytes())
        .map_err(|e| StorageError::serialization(format!("Failed to gzip cache entry: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| StorageError::serialization(format!("Failed to finish gzip encoding: {}", e)))
}

/// Decompress gzip JSON bytes. `None` for corrupt or outdated data.
pub fn decompress_entry(data: &[u8], fingerprint: &VideoFingerprint) -> Option<CacheEntry> {
    let mut decoder = GzDecoder::new(data);
    let mut json = String::new();

    if let Err(e) = decoder.read_to_string(&mut json) {
        warn!(fingerprint = %fingerprint.short(), error = %e, "Failed to decompress cache entry");
        return None;
    }

    decode_entry(&json, fingerprint)
}
