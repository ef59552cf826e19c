//! R2 client implementation.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// HTTP status R2 returns when a conditional write's precondition does not hold.
const STATUS_PRECONDITION_FAILED: u16 = 412;

/// HTTP status R2 returns when an `If-Match` write finds no object.
const STATUS_NOT_FOUND: u16 = 404;

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Outcome of a conditional upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalPut {
    Created,
    /// Another object (or another version of it) won the write
    AlreadyExists,
}

/// A downloaded object with its ETag.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub etag: Option<String>,
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = R2Config::from_env()?;
        Self::new(config).await
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload bytes only if no object exists at `key` (`If-None-Match: *`).
    pub async fn upload_bytes_if_absent(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<ConditionalPut> {
        debug!("Uploading {} bytes to {} (if absent)", data.len(), key);

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .if_none_match("*")
            .send()
            .await;

        match result {
            Ok(_) => Ok(ConditionalPut::Created),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                if status == Some(STATUS_PRECONDITION_FAILED) {
                    Ok(ConditionalPut::AlreadyExists)
                } else {
                    Err(StorageError::upload_failed(e.to_string()))
                }
            }
        }
    }

    /// Overwrite `key` only while its ETag is still `etag` (`If-Match`).
    ///
    /// Falls back to [`Self::upload_bytes_if_absent`] when the object has
    /// been removed in the meantime.
    pub async fn replace_bytes_if_match(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
        etag: &str,
    ) -> StorageResult<ConditionalPut> {
        debug!("Replacing {} with {} bytes (if-match {})", key, data.len(), etag);

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.clone()))
            .content_type(content_type)
            .if_match(etag)
            .send()
            .await;

        match result {
            Ok(_) => Ok(ConditionalPut::Created),
            Err(e) => match e.raw_response().map(|r| r.status().as_u16()) {
                Some(STATUS_PRECONDITION_FAILED) => Ok(ConditionalPut::AlreadyExists),
                Some(STATUS_NOT_FOUND) => self.upload_bytes_if_absent(data, key, content_type).await,
                _ => Err(StorageError::upload_failed(e.to_string())),
            },
        }
    }

    /// Download an object with its ETag. `Ok(None)` when the key does not exist.
    pub async fn download_object(&self, key: &str) -> StorageResult<Option<StoredObject>> {
        debug!("Downloading {}", key);

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if e.as_service_error().map_or(false, |se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(StorageError::DownloadFailed(e.to_string()));
            }
        };

        let etag = response.e_tag().map(str::to_string);
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(Some(StoredObject { data, etag }))
    }

    /// Download object as bytes. `Ok(None)` when the key does not exist.
    pub async fn download_bytes(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.download_object(key).await?.map(|object| object.data))
    }

    /// Delete an object.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}
