//! Prompt text and response schema sent to the oracle.

use serde_json::{json, Value};

use vcheck_models::{AnalysisRequest, MAX_CRITERION_SCORE, MAX_TOTAL_SCORE};

/// System instruction shared by every request.
pub const SYSTEM_INSTRUCTION: &str = "\
You are Viracheck AI, a short-form video analyst. Answer in Brazilian Portuguese.
Reply ONLY with a JSON object matching the response schema.
Score each criterion from 0 to 20 as an integer:
- hook_impacto: strength of the first seconds
- qualidade_visual: framing, lighting and sharpness
- clareza_mensagem: how clear the message is
- legibilidade_texto_legenda: legibility of on-screen text and captions
- potencial_engajamento: likelihood of comments, shares and saves
score_viralizacao is the sum of the five criteria (0 to 100).
If some information is unavailable, use an empty string or an empty list.";

/// User turn text describing the video and the sampled frames.
pub fn build_user_prompt(request: &AnalysisRequest) -> String {
    let offsets = request
        .frames
        .iter()
        .map(|f| format!("{:.2}s", f.offset_seconds))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "Analyze this video for virality potential.\n\nPlatform: {}\n",
        request.platform.display_name()
    );
    if let Some(hook) = &request.hook {
        prompt.push_str(&format!("Hook: {}\n", hook));
    }
    if let Some(description) = &request.description {
        prompt.push_str(&format!("Description: {}\n", description));
    }
    if let Some(duration) = request.metadata.duration_seconds {
        prompt.push_str(&format!("Duration: {:.1}s\n", duration));
    }
    prompt.push_str(&format!(
        "\nThe {} attached images are frames sampled at {} (in order).\n\
         Give practical suggestions to improve retention, call to action, editing, captions and pacing.",
        request.frames.len(),
        offsets
    ));
    prompt
}

/// Response schema in the oracle's OpenAPI subset.
pub fn response_schema() -> Value {
    let axis = json!({
        "type": "INTEGER",
        "minimum": 0,
        "maximum": MAX_CRITERION_SCORE
    });
    let list = json!({ "type": "ARRAY", "items": { "type": "STRING" } });

    json!({
        "type": "OBJECT",
        "properties": {
            "hook_impacto": axis,
            "qualidade_visual": axis,
            "clareza_mensagem": axis,
            "legibilidade_texto_legenda": axis,
            "potencial_engajamento": axis,
            "score_viralizacao": { "type": "INTEGER", "minimum": 0, "maximum": MAX_TOTAL_SCORE },
            "resumo": { "type": "STRING" },
            "pontos_fortes": list,
            "pontos_fracos": list,
            "sugestoes_melhoria": list,
            "ganchos_sugeridos": list,
            "legendas_sugeridas": list,
            "hashtags_sugeridas": list,
            "recomendacoes_por_plataforma": {
                "type": "OBJECT",
                "properties": {
                    "tiktok": list,
                    "instagram": list,
                    "youtube_shorts": list,
                    "kwai": list
                }
            }
        },
        "required": [
            "hook_impacto",
            "qualidade_visual",
            "clareza_mensagem",
            "legibilidade_texto_legenda",
            "potencial_engajamento",
            "score_viralizacao",
            "resumo",
            "pontos_fortes",
            "pontos_fracos",
            "sugestoes_melhoria",
            "ganchos_sugeridos",
            "legendas_sugeridas",
            "hashtags_sugeridas"
        ]
    })
}
