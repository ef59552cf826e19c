//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),

    #[error("Request has no frames")]
    NoFrames,

    #[error("Too many frames: {count} (max {max})")]
    TooManyFrames { count: usize, max: usize },

    #[error("Invalid frame offset: {0}")]
    InvalidOffset(String),
}

impl ModelError {
    pub fn invalid_fingerprint(msg: impl Into<String>) -> Self {
        Self::InvalidFingerprint(msg.into())
    }

    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }
}
