//! Fallback handlers keeping the error shape for unmatched requests.

use crate::error::ApiError;

/// Known path, wrong verb.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Unknown path.
pub async fn route_not_found() -> ApiError {
    ApiError::not_found("no such route")
}
