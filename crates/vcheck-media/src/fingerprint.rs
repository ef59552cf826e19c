//! Video fingerprinting.
//!
//! Small sources are hashed in full. Above `2 * chunk_size` bytes the digest
//! covers a fixed-size prefix chunk, a fixed-size suffix chunk and the
//! `(name, size, modified)` metadata tuple, so fingerprinting a large upload
//! costs two chunk reads instead of a full scan.
//!
//! The chunk size is [`DEFAULT_FINGERPRINT_CHUNK_SIZE`] (1 MiB) unless
//! overridden with `FINGERPRINT_CHUNK_SIZE`. Changing it changes every
//! sampled-mode fingerprint and therefore invalidates the cache for large files.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use tracing::debug;

use vcheck_models::{FrameSample, VideoFingerprint, VideoMeta};

use crate::error::{MediaError, MediaResult};

/// Default prefix/suffix chunk size in bytes.
pub const DEFAULT_FINGERPRINT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Domain tag mixed into every digest. Bump the version to re-key the cache.
const FINGERPRINT_DOMAIN: &[u8] = b"vcheck-fingerprint:v1";

/// Fingerprint settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintConfig {
    pub chunk_size: u64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_FINGERPRINT_CHUNK_SIZE,
        }
    }
}

impl FingerprintConfig {
    pub fn from_env() -> Self {
        Self {
            chunk_size: std::env::var("FINGERPRINT_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|size: &u64| *size > 0)
                .unwrap_or(DEFAULT_FINGERPRINT_CHUNK_SIZE),
        }
    }
}

/// Metadata tuple of a readable source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    pub name: String,
    pub size: u64,
    /// Last modification, seconds since the Unix epoch
    pub modified: Option<i64>,
}

impl SourceMeta {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: i64) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// Which strategy produced a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintMode {
    Full,
    Sampled,
}

/// Select the hashing strategy for a source of `size` bytes.
pub fn fingerprint_mode(size: u64, config: &FingerprintConfig) -> FingerprintMode {
    if size <= config.chunk_size.saturating_mul(2) {
        FingerprintMode::Full
    } else {
        FingerprintMode::Sampled
    }
}

/// Fingerprint a seekable source.
pub fn fingerprint_reader<R: Read + Seek>(
    reader: &mut R,
    meta: &SourceMeta,
    config: &FingerprintConfig,
) -> MediaResult<VideoFingerprint> {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_DOMAIN);

    match fingerprint_mode(meta.size, config) {
        FingerprintMode::Full => {
            hasher.update(b"full");
            reader.seek(SeekFrom::Start(0))?;
            io::copy(reader, &mut hasher)?;
        }
        FingerprintMode::Sampled => {
            hasher.update(b"sampled");
            let chunk = usize::try_from(config.chunk_size)
                .map_err(|_| MediaError::invalid_input("fingerprint chunk size too large"))?;
            let mut buf = vec![0u8; chunk];

            reader.seek(SeekFrom::Start(0))?;
            reader.read_exact(&mut buf)?;
            hasher.update(&buf);

            reader.seek(SeekFrom::Start(meta.size - config.chunk_size))?;
            reader.read_exact(&mut buf)?;
            hasher.update(&buf);

            update_field(&mut hasher, meta.name.as_bytes());
            hasher.update(meta.size.to_le_bytes());
            match meta.modified {
                Some(modified) => {
                    hasher.update([1u8]);
                    hasher.update(modified.to_le_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
    }

    Ok(finish(hasher))
}

/// Fingerprint an in-memory video.
pub fn fingerprint_bytes(
    bytes: &[u8],
    name: &str,
    config: &FingerprintConfig,
) -> MediaResult<VideoFingerprint> {
    let meta = SourceMeta::new(name, bytes.len() as u64);
    fingerprint_reader(&mut io::Cursor::new(bytes), &meta, config)
}

/// Fingerprint a file on disk. The read runs on the blocking pool.
pub async fn fingerprint_file(
    path: impl AsRef<Path>,
    config: FingerprintConfig,
) -> MediaResult<VideoFingerprint> {
    let path = path.as_ref().to_path_buf();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path));
    }

    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        let metadata = file.metadata()?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut meta = SourceMeta::new(name, metadata.len());
        if let Some(secs) = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        {
            meta = meta.with_modified(secs.as_secs() as i64);
        }

        let fingerprint = fingerprint_reader(&mut file, &meta, &config)?;
        debug!(
            path = %path.display(),
            size = meta.size,
            mode = ?fingerprint_mode(meta.size, &config),
            fingerprint = %fingerprint.short(),
            "Fingerprinted video file"
        );
        Ok(fingerprint)
    })
    .await
    .map_err(|e| MediaError::internal(format!("fingerprint task failed: {}", e)))?
}

/// Fingerprint client-sampled frames when no client fingerprint was sent.
///
/// Covers the optional video metadata and every frame's offset and bytes, in order.
pub fn fingerprint_frames(frames: &[FrameSample], meta: Option<&VideoMeta>) -> VideoFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_DOMAIN);
    hasher.update(b"frames");

    match meta {
        Some(meta) => {
            hasher.update([1u8]);
            update_optional(&mut hasher, meta.name.as_deref().map(str::as_bytes));
            match meta.size {
                Some(size) => {
                    hasher.update([1u8]);
                    hasher.update(size.to_le_bytes());
                }
                None => hasher.update([0u8]),
            }
            update_optional(&mut hasher, meta.mime_type.as_deref().map(str::as_bytes));
        }
        None => hasher.update([0u8]),
    }

    hasher.update((frames.len() as u64).to_le_bytes());
    for frame in frames {
        hasher.update(frame.offset_seconds.to_bits().to_le_bytes());
        update_field(&mut hasher, frame.image.mime_type.as_bytes());
        update_field(&mut hasher, &frame.image.bytes);
    }

    finish(hasher)
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn update_optional(hasher: &mut Sha256, bytes: Option<&[u8]>) {
    match bytes {
        Some(bytes) => {
            hasher.update([1u8]);
            update_field(hasher, bytes);
        }
        None => hasher.update([0u8]),
    }
}

fn finish(hasher: Sha256) -> VideoFingerprint {
    let digest: [u8; 32] = hasher.finalize().into();
    VideoFingerprint::from_digest(&digest)
}
