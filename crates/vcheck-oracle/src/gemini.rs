//! Gemini scoring oracle.
//!
//! One `generateContent` call per analysis: the sampled frames go inline as
//! base64 JPEG parts, the reply is constrained by `responseSchema`. There is
//! no retry and no fallback parsing; a reply that does not fit the schema is
//! an [`OracleError::Schema`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use vcheck_models::AnalysisRequest;

use crate::error::{OracleError, OracleResult};
use crate::oracle::ScoringOracle;
use crate::prompt::{build_user_prompt, response_schema, SYSTEM_INSTRUCTION};
use crate::types::RawVerdict;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for the Gemini oracle.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, without the `/v1beta` path
    pub base_url: String,
    pub timeout: Duration,
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_output_tokens: 2048,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> OracleResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::config("GEMINI_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = std::env::var("ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(tokens) = std::env::var("ORACLE_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.max_output_tokens = tokens;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini-backed [`ScoringOracle`].
pub struct GeminiOracle {
    client: Client,
    config: GeminiConfig,
}

impl GeminiOracle {
    pub fn new(config: GeminiConfig) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> OracleResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    fn build_request(&self, request: &AnalysisRequest) -> GeminiRequest {
        let mut parts = Vec::with_capacity(request.frames.len() + 1);
        parts.push(Part::Text {
            text: build_user_prompt(request),
        });
        parts.extend(request.frames.iter().map(|frame| Part::Inline {
            inline_data: InlineData {
                mime_type: frame.image.mime_type.clone(),
                data: frame.image.to_base64(),
            },
        }));

        GeminiRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
                temperature: 0.0,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout(self.config.timeout.as_secs())
        } else {
            // The request URL carries the API key
            OracleError::transport(format!("Gemini API request failed: {}", e.without_url()))
        }
    }
}

#[async_trait]
impl ScoringOracle for GeminiOracle {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn score(&self, request: &AnalysisRequest) -> OracleResult<RawVerdict> {
        if request.frames.is_empty() {
            return Err(OracleError::EmptyFrames);
        }

        let body = self.build_request(request);
        let started = Instant::now();
        debug!(
            model = %self.config.model,
            frames = request.frames.len(),
            fingerprint = %request.fingerprint.short(),
            "Calling Gemini"
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Gemini API returned an error status");
            return Err(OracleError::upstream(status.as_u16(), &text));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            OracleError::schema(format!("Failed to parse Gemini envelope: {}", e), &text)
        })?;

        if let Some(reason) = gemini_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(OracleError::schema(
                format!("Prompt blocked: {}", reason),
                &text,
            ));
        }

        let candidate = gemini_response
            .candidates
            .first()
            .ok_or_else(|| OracleError::schema("No candidates in Gemini response", &text))?;

        let reply: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();

        if reply.trim().is_empty() {
            let detail = match &candidate.finish_reason {
                Some(reason) => format!("Empty reply (finish reason {})", reason),
                None => "Empty reply".to_string(),
            };
            return Err(OracleError::schema(detail, &text));
        }

        let verdict = RawVerdict::from_json(&reply).map_err(|detail| OracleError::schema(detail, &reply))?;

        info!(
            model = %self.config.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            reported_total = ?verdict.reported_total,
            "Gemini verdict received"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use vcheck_models::{EncodedImage, FrameSample, Platform, VideoFingerprint, VideoMeta};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            VideoFingerprint::from_digest(&[2; 32]),
            Platform::Instagram,
            vec![FrameSample::new(0.5, EncodedImage::jpeg(vec![0xFF, 0xD8, 0xFF]), 640, 360)],
            VideoMeta::default(),
        )
        .unwrap()
    }

    fn oracle(server: &MockServer) -> GeminiOracle {
        GeminiOracle::new(GeminiConfig::new("test-key").with_base_url(server.uri())).unwrap()
    }

    fn envelope(reply: &str) -> Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": reply}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_score_success() {
        let server = MockServer::start().await;
        let reply = r#"{"hook_impacto": 15, "qualidade_visual": 12, "clareza_mensagem": 18,
            "legibilidade_texto_legenda": 10, "potencial_engajamento": 14, "score_viralizacao": 69,
            "resumo": "ok", "pontos_fortes": [], "pontos_fracos": [], "sugestoes_melhoria": [],
            "ganchos_sugeridos": [], "legendas_sugeridas": [], "hashtags_sugeridas": []}"#;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json", "temperature": 0.0}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(reply)))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = oracle(&server).score(&request()).await.unwrap();
        assert_eq!(verdict.criteria.values(), [15.0, 12.0, 18.0, 10.0, 14.0]);
        assert_eq!(verdict.reported_total, Some(69.0));
    }

    #[tokio::test]
    async fn test_frames_sent_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [
                    {},
                    {"inlineData": {"mimeType": "image/jpeg", "data": "/9j/"}}
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(r#"{"resumo": "x"}"#)))
            .expect(1)
            .mount(&server)
            .await;

        oracle(&server).score(&request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_upstream_error_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded ".repeat(200)))
            .mount(&server)
            .await;

        let err = oracle(&server).score(&request()).await.unwrap_err();
        match err {
            OracleError::Upstream { status, body } => {
                assert_eq!(status, 503);
                assert!(body.len() <= crate::error::MAX_DIAGNOSTIC_LEN + 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_reply_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope("Sure! Here is the analysis: score 80")),
            )
            .mount(&server)
            .await;

        let err = oracle(&server).score(&request()).await.unwrap_err();
        match err {
            OracleError::Schema { payload, .. } => assert!(payload.contains("score 80")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_candidates_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = oracle(&server).score(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope("{}"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let oracle = GeminiOracle::new(
            GeminiConfig::new("test-key")
                .with_base_url(server.uri())
                .with_timeout(Duration::from_secs(1)),
        )
        .unwrap();
        let err = oracle.score(&request()).await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    }

    #[test]
    #[serial]
    fn test_config_requires_api_key() {
        std::env::remove_var("GEMINI_API_KEY");
        assert!(matches!(GeminiConfig::from_env(), Err(OracleError::Config(_))));

        std::env::set_var("GEMINI_API_KEY", "abc");
        std::env::set_var("ORACLE_TIMEOUT_SECS", "15");
        let config = GeminiConfig::from_env().unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.timeout, Duration::from_secs(15));
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("ORACLE_TIMEOUT_SECS");
    }
}
