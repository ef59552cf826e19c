//! Oracle error types.

use thiserror::Error;

pub type OracleResult<T> = Result<T, OracleError>;

/// Maximum length (in chars) of an upstream diagnostic kept on an error.
pub const MAX_DIAGNOSTIC_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle not configured: {0}")]
    Config(String),

    #[error("Oracle request failed: {0}")]
    Transport(String),

    #[error("Oracle timed out after {0} seconds")]
    Timeout(u64),

    #[error("Oracle returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Oracle response violated schema: {detail}")]
    Schema { detail: String, payload: String },

    #[error("Analysis request has no frames")]
    EmptyFrames,
}

impl OracleError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(truncate_diagnostic(&msg.into()))
    }

    pub fn upstream(status: u16, body: &str) -> Self {
        Self::Upstream {
            status,
            body: truncate_diagnostic(body),
        }
    }

    pub fn schema(detail: impl Into<String>, payload: &str) -> Self {
        Self::Schema {
            detail: truncate_diagnostic(&detail.into()),
            payload: truncate_diagnostic(payload),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Raw upstream payload, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Upstream { body, .. } => Some(body),
            Self::Schema { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// Truncate to [`MAX_DIAGNOSTIC_LEN`] chars on a char boundary.
pub fn truncate_diagnostic(text: &str) -> String {
    match text.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
