//! Structured request logging utilities.
//!
//! Provides consistent, structured logging for analysis requests with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

use vcheck_models::VideoFingerprint;

/// Request logger for structured logging with consistent formatting.
///
/// Carries the request ID and, once known, the video fingerprint.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    request_id: String,
    operation: String,
    fingerprint: Option<String>,
}

impl RequestLogger {
    /// Create a new logger for a specific request and operation.
    pub fn new(request_id: &str, operation: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            operation: operation.to_string(),
            fingerprint: None,
        }
    }

    /// Create a logger with a fresh request ID.
    pub fn generate(operation: &str) -> Self {
        Self::new(&Uuid::new_v4().to_string(), operation)
    }

    /// Attach the fingerprint once it has been computed.
    pub fn set_fingerprint(&mut self, fingerprint: &VideoFingerprint) {
        self.fingerprint = Some(fingerprint.short().to_string());
    }

    fn fingerprint_field(&self) -> &str {
        self.fingerprint.as_deref().unwrap_or("-")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            operation = %self.operation,
            "Analysis started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            operation = %self.operation,
            fingerprint = %self.fingerprint_field(),
            "Analysis progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_id = %self.request_id,
            operation = %self.operation,
            fingerprint = %self.fingerprint_field(),
            "Analysis warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            request_id = %self.request_id,
            operation = %self.operation,
            fingerprint = %self.fingerprint_field(),
            "Analysis error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            operation = %self.operation,
            fingerprint = %self.fingerprint_field(),
            "Analysis completed: {}", message
        );
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this request.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "analysis",
            request_id = %self.request_id,
            operation = %self.operation
        )
    }
}
