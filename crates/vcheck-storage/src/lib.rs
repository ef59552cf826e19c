//! Analysis cache storage.
//!
//! This crate provides:
//! - The `AnalysisCache` contract (get / put-if-absent / expire)
//! - In-memory, Redis and Cloudflare R2 backends
//! - Gzip JSON entry encoding for blob storage
//! - Backend selection from environment configuration

pub mod backend;
pub mod blob;
pub mod cache;
pub mod client;
pub mod codec;
pub mod error;
pub mod kv;
pub mod memory;

pub use backend::{CacheBackend, CacheBackendKind, CacheConfig, CacheFailurePolicy};
pub use blob::{blob_key, BlobCache};
pub use cache::{AnalysisCache, PutOutcome};
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use kv::{analysis_key, RedisCache};
pub use memory::MemoryCache;
