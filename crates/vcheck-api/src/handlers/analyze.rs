//! Analyze handlers.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use vcheck_media::fingerprint_bytes;
use vcheck_models::{AnalyzeRequest, AnalyzeResponse, Platform};
use vcheck_pipeline::{AnalysisOutcome, PipelineError, Submission, VideoInput};

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestId;
use crate::state::AppState;

/// Query string of `POST /api/analyze-video`.
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeVideoQuery {
    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    #[validate(length(max = 500))]
    pub hook: Option<String>,

    #[serde(default)]
    #[validate(length(max = 2200))]
    pub description: Option<String>,
}

/// Analyze client-sampled frames.
pub async fn analyze(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let submission = Submission::new(
        request.platform,
        VideoInput::Uploaded {
            fingerprint: request.video_hash,
            meta: request.video_meta,
            frames: request.frames,
        },
    )
    .with_hook(request.hook)
    .with_description(request.description);

    let outcome = run_analysis(&state, request_id, submission).await?;
    Ok(Json(outcome.into()))
}

/// Analyze a raw video body; frames are sampled server-side.
pub async fn analyze_video(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<AnalyzeVideoQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    query
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    if body.is_empty() {
        return Err(ApiError::bad_request(
            "request body must contain the video bytes",
        ));
    }

    // Hash the bytes, not the temp file, so identical uploads share a key
    let fingerprint = fingerprint_bytes(&body, "", &state.orchestrator.config().fingerprint)
        .map_err(PipelineError::from)?;

    let upload = tempfile::Builder::new()
        .prefix("vcheck-upload-")
        .tempfile()
        .map_err(|e| ApiError::internal(format!("failed to create upload file: {}", e)))?;
    tokio::fs::write(upload.path(), &body)
        .await
        .map_err(|e| ApiError::internal(format!("failed to write upload file: {}", e)))?;

    info!(
        bytes = body.len(),
        fingerprint = %fingerprint.short(),
        "Received raw video upload"
    );

    let submission = Submission::new(
        query.platform,
        VideoInput::File {
            path: upload.path().to_path_buf(),
            fingerprint: Some(fingerprint),
        },
    )
    .with_hook(query.hook)
    .with_description(query.description);

    let outcome = run_analysis(&state, request_id, submission).await;
    drop(upload);
    Ok(Json(outcome?.into()))
}

async fn run_analysis(
    state: &AppState,
    request_id: Option<Extension<RequestId>>,
    submission: Submission,
) -> ApiResult<AnalysisOutcome> {
    let outcome = match request_id {
        Some(Extension(RequestId(id))) => {
            state
                .orchestrator
                .analyze_with_request_id(&id, submission)
                .await?
        }
        None => state.orchestrator.analyze(submission).await?,
    };
    Ok(outcome)
}
