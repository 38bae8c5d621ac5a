//! Gemini `generateContent` client.
//!
//! Non-streaming REST calls with optional Google Search grounding. Auth is via
//! API key in query parameter.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use shark_core::types::GroundingLink;

use crate::{GenerateReply, GenerateRequest, Part, TextClient, Turn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    pub base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: Option<&str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

// --- Gemini request/response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn format_turns(turns: &[Turn]) -> Vec<serde_json::Value> {
    turns
        .iter()
        .map(|turn| {
            let parts: Vec<serde_json::Value> = turn
                .parts
                .iter()
                .map(|part| match part {
                    Part::Text(text) => json!({ "text": text }),
                    Part::InlineJpeg(bytes) => json!({
                        "inlineData": {
                            "mimeType": "image/jpeg",
                            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                        }
                    }),
                })
                .collect();
            json!({ "role": turn.role.as_str(), "parts": parts })
        })
        .collect()
}

fn build_body(request: &GenerateRequest) -> GeminiRequest {
    let system_instruction = request.system_instruction.as_ref().map(|s| {
        json!({
            "parts": [{ "text": s }]
        })
    });

    let tools = request
        .search_grounding
        .then(|| vec![json!({ "googleSearch": {} })]);

    GeminiRequest {
        contents: format_turns(&request.turns),
        system_instruction,
        tools,
    }
}

fn extract_reply(response: GenerateResponse) -> GenerateReply {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return GenerateReply::default();
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    // Citations need a URI; a missing title falls back to the URI
    let links: Vec<GroundingLink> = candidate
        .grounding_metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .filter_map(|web| {
            let uri = web.uri?;
            let title = web.title.unwrap_or_else(|| uri.clone());
            Some(GroundingLink { uri, title })
        })
        .collect();

    GenerateReply { text, links }
}

#[async_trait]
impl TextClient for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateReply> {
        let body = build_body(request);

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        debug!(model = %request.model, grounded = request.search_grounding, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error {status}: {body}");
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(extract_reply(parsed))
    }
}
