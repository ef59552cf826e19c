//! Pipeline error types.

use thiserror::Error;

use vcheck_media::MediaError;
use vcheck_models::ModelError;
use vcheck_oracle::OracleError;
use vcheck_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Every way an analysis can fail. None of these are ever cached.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Frame extraction failed: {0}")]
    Decode(#[from] MediaError),

    #[error("Scoring oracle failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Cache backend failed: {0}")]
    Backend(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Input(_) => "invalid_input",
            Self::Decode(_) => "decode_failed",
            Self::Oracle(_) => "oracle_failed",
            Self::Backend(_) => "cache_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller has to fix the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

impl From<ModelError> for PipelineError {
    fn from(e: ModelError) -> Self {
        Self::Input(e.to_string())
    }
}
