//! Cached analysis lookup and result schema.

use axum::extract::{Path, State};
use axum::Json;
use schemars::schema::RootSchema;

use vcheck_models::{analysis_result_schema, AnalyzeResponse, VideoFingerprint};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Fetch a previously computed analysis by fingerprint.
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let fingerprint = VideoFingerprint::parse(&fingerprint)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    match state.orchestrator.lookup(&fingerprint).await? {
        Some(result) => Ok(Json(AnalyzeResponse {
            result,
            cached: true,
            fingerprint,
        })),
        None => Err(ApiError::not_found(format!(
            "no analysis cached for {}",
            fingerprint
        ))),
    }
}

/// JSON Schema of the analysis result.
pub async fn get_schema() -> Json<RootSchema> {
    Json(analysis_result_schema())
}
