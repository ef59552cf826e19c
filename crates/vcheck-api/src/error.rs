//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use vcheck_oracle::truncate_diagnostic;
use vcheck_pipeline::PipelineError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Pipeline(e) => match e {
                PipelineError::Input(_) => StatusCode::BAD_REQUEST,
                PipelineError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Oracle(o) if o.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
                PipelineError::Oracle(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Short, stable description for the `error` field.
    fn summary(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "Not found",
            ApiError::BadRequest(_) | ApiError::Validation(_) => "Invalid request",
            ApiError::MethodNotAllowed => "Method not allowed",
            ApiError::RateLimited => "Rate limit exceeded",
            ApiError::Internal(_) => "Internal error",
            ApiError::Pipeline(e) => match e {
                PipelineError::Input(_) => "Invalid input",
                PipelineError::Decode(_) => "Could not extract frames from the video",
                PipelineError::Oracle(_) => "Scoring service failed",
                PipelineError::Backend(_) => "Analysis cache unavailable",
                PipelineError::Internal(_) => "Internal error",
            },
        }
    }

    /// Details that describe infrastructure rather than the request.
    fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::Internal(_)
                | ApiError::Pipeline(PipelineError::Internal(_))
                | ApiError::Pipeline(PipelineError::Backend(_))
        )
    }

    fn details(&self) -> Option<String> {
        match self {
            ApiError::MethodNotAllowed | ApiError::RateLimited => None,
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Validation(msg)
            | ApiError::Internal(msg) => Some(msg.clone()),
            ApiError::Pipeline(e) => Some(e.to_string()),
        }
    }
}

/// Error body: `{ "error": ..., "details": ... }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        // Don't expose internal error details in production
        let details = if self.is_internal()
            && std::env::var("ENVIRONMENT")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false)
        {
            None
        } else {
            self.details().map(|d| truncate_diagnostic(&d))
        };

        let body = ErrorResponse {
            error: self.summary().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
