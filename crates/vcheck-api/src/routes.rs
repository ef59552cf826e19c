//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    analyze, analyze_video, get_analysis, get_schema, health, method_not_allowed, ready,
    route_not_found,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    // Every API route answers a wrong verb with 405 in the error shape
    let api_routes = Router::new()
        .route("/analyze", post(analyze).fallback(method_not_allowed))
        .route(
            "/analyze-video",
            post(analyze_video).fallback(method_not_allowed),
        )
        .route(
            "/analysis/:fingerprint",
            get(get_analysis).fallback(method_not_allowed),
        )
        .route("/schema", get(get_schema).fallback(method_not_allowed))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .fallback(route_not_found)
        // The body limit below is the only one; extractors must not apply their own
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use image::RgbImage;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use vcheck_media::{DecodeCapability, DecoderFactory, MediaError, MediaResult};
    use vcheck_models::AnalysisRequest;
    use vcheck_oracle::{OracleResult, RawCriteria, RawVerdict, ScoringOracle};
    use vcheck_pipeline::{Orchestrator, PipelineConfig};
    use vcheck_storage::MemoryCache;

    use crate::config::ApiConfig;
    use crate::error::ErrorResponse;

    struct FixedOracle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScoringOracle for FixedOracle {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn score(&self, _: &AnalysisRequest) -> OracleResult<RawVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawVerdict {
                criteria: RawCriteria {
                    hook_impact: Some(20.0),
                    visual_quality: Some(20.0),
                    message_clarity: Some(20.0),
                    caption_legibility: Some(20.0),
                    engagement_potential: Some(20.0),
                },
                reported_total: Some(50.0),
                summary: "Excelente".to_string(),
                ..Default::default()
            })
        }
    }

    struct NoDecoder;

    #[async_trait]
    impl DecoderFactory for NoDecoder {
        async fn open(&self, path: &Path) -> MediaResult<Box<dyn DecodeCapability>> {
            Err(MediaError::invalid_input(format!(
                "cannot decode {}",
                path.display()
            )))
        }
    }

    fn test_app() -> (Router, Arc<FixedOracle>) {
        let oracle = Arc::new(FixedOracle {
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::new(
            Arc::new(MemoryCache::new()),
            oracle.clone(),
            Arc::new(NoDecoder),
            PipelineConfig::default(),
        );
        let state = AppState::new(ApiConfig::default(), Arc::new(orchestrator));
        (create_router(state, None), oracle)
    }

    fn frame_data_url() -> String {
        let image = RgbImage::from_pixel(16, 16, image::Rgb([120, 10, 200]));
        vcheck_media::raster::encode_jpeg(&image, 80)
            .unwrap()
            .to_data_url()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_analyze_then_replay_then_lookup() {
        let (app, oracle) = test_app();
        let body = json!({
            "platform": "tiktok",
            "hook": "Você não vai acreditar",
            "video_meta": {"name": "clip.mp4", "size": 1234, "type": "video/mp4"},
            "frames": [
                {"t": 0.5, "image": frame_data_url()},
                {"t": 1.5, "image": frame_data_url()}
            ]
        });

        let (status, first) = send(&app, post_json("/api/analyze", body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["cached"], false);
        assert_eq!(first["result"]["total_score"], 100);

        let (status, second) = send(&app, post_json("/api/analyze", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["cached"], true);
        assert_eq!(second["fingerprint"], first["fingerprint"]);
        assert_eq!(second["result"], first["result"]);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);

        let fingerprint = first["fingerprint"].as_str().unwrap();
        let (status, cached) = send(&app, get(&format!("/api/analysis/{}", fingerprint))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cached["cached"], true);
        assert_eq!(cached["result"], first["result"]);
    }

    #[tokio::test]
    async fn test_missing_frames_is_bad_request() {
        let (app, oracle) = test_app();

        let (status, body) =
            send(&app, post_json("/api/analyze", json!({"platform": "kwai"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(error.error, "Invalid request");
        assert!(error.details.is_some());

        let (status, _) = send(
            &app,
            post_json("/api/analyze", json!({"platform": "kwai", "frames": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (app, _) = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_unprocessable() {
        let (app, oracle) = test_app();
        let body = json!({
            "frames": [{"t": 0.5, "image": "data:image/jpeg;base64,AQIDBA=="}]
        });

        let (status, body) = send(&app, post_json("/api/analyze", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Could not extract frames from the video");
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_verb_is_method_not_allowed() {
        let (app, _) = test_app();
        let (status, body) = send(&app, get("/api/analyze")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed");

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/api/schema")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let (app, _) = test_app();

        let (status, body) = send(&app, get(&format!("/api/analysis/{}", "0".repeat(64)))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");

        let (status, _) = send(&app, get("/api/analysis/xyz")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_video_requires_body() {
        let (app, _) = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/analyze-video?platform=instagram")
            .header("content-type", "application/octet-stream")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_video_decode_failure() {
        let (app, oracle) = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/analyze-video?platform=youtube_shorts&hook=oi")
            .header("content-type", "application/octet-stream")
            .body(Body::from(vec![0u8; 1024]))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["details"].as_str().unwrap().contains("cannot decode"));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_platform_is_bad_request() {
        let (app, _) = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/analyze-video?platform=myspace")
            .body(Body::from(vec![1u8; 16]))
            .unwrap();

        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_schema_and_health() {
        let (app, _) = test_app();

        let (status, schema) = send(&app, get("/api/schema")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(schema["properties"]["total_score"].is_object());

        let (status, health) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");

        let (status, ready) = send(&app, get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ready["checks"]["cache"]["backend"], "memory");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (app, _) = test_app();
        let (status, body) = send(&app, get("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_request_id_and_security_headers() {
        let (app, _) = test_app();
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-abc")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-request-id"], "req-abc");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
    }
}
