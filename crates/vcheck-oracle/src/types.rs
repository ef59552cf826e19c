//! Untrusted oracle verdicts.
//!
//! Field names follow the oracle's response schema. Nothing here is
//! validated beyond JSON types; the pipeline's validator normalizes it.

use serde::{Deserialize, Serialize};

/// Raw per-axis scores as reported. Missing axes are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCriteria {
    #[serde(rename = "hook_impacto", default)]
    pub hook_impact: Option<f64>,
    #[serde(rename = "qualidade_visual", default)]
    pub visual_quality: Option<f64>,
    #[serde(rename = "clareza_mensagem", default)]
    pub message_clarity: Option<f64>,
    #[serde(rename = "legibilidade_texto_legenda", default)]
    pub caption_legibility: Option<f64>,
    #[serde(rename = "potencial_engajamento", default)]
    pub engagement_potential: Option<f64>,
}

impl RawCriteria {
    /// Axis values in the same order as `CriteriaScores::values`, missing as 0.
    pub fn values(&self) -> [f64; 5] {
        [
            self.hook_impact.unwrap_or(0.0),
            self.visual_quality.unwrap_or(0.0),
            self.message_clarity.unwrap_or(0.0),
            self.caption_legibility.unwrap_or(0.0),
            self.engagement_potential.unwrap_or(0.0),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPlatformTips {
    #[serde(default)]
    pub tiktok: Vec<String>,
    #[serde(default)]
    pub instagram: Vec<String>,
    #[serde(default)]
    pub youtube_shorts: Vec<String>,
    #[serde(default)]
    pub kwai: Vec<String>,
}

/// Oracle reply before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVerdict {
    #[serde(flatten)]
    pub criteria: RawCriteria,

    /// Self-reported total; never trusted
    #[serde(rename = "score_viralizacao", default)]
    pub reported_total: Option<f64>,

    #[serde(rename = "resumo", default)]
    pub summary: String,

    #[serde(rename = "pontos_fortes", default)]
    pub strengths: Vec<String>,

    #[serde(rename = "pontos_fracos", default)]
    pub weaknesses: Vec<String>,

    #[serde(rename = "sugestoes_melhoria", default)]
    pub improvements: Vec<String>,

    #[serde(rename = "ganchos_sugeridos", default)]
    pub hooks: Vec<String>,

    #[serde(rename = "legendas_sugeridas", default)]
    pub captions: Vec<String>,

    #[serde(rename = "hashtags_sugeridas", default)]
    pub hashtags: Vec<String>,

    #[serde(rename = "recomendacoes_por_plataforma", default)]
    pub platform_tips: RawPlatformTips,
}

impl RawVerdict {
    /// Parse a reply body. Anything but a JSON object is rejected.
    pub fn from_json(text: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(text.trim()).map_err(|e| format!("not valid JSON: {}", e))?;
        if !value.is_object() {
            return Err("expected a JSON object".to_string());
        }
        serde_json::from_value(value).map_err(|e| format!("unexpected field type: {}", e))
    }
}
