//! Gemini clients.
//!
//! [`generate`] wraps the REST `generateContent` endpoint (chat, venue search,
//! session review). [`live`] speaks the bidirectional WebSocket protocol used
//! by the real-time coach. Both are behind traits so callers can swap in fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod generate;
pub mod live;

pub use generate::GeminiClient;
pub use live::{GeminiLive, LiveConfig, LiveConnector, LiveEvent, LiveFrame, LiveHandle};

/// Who produced a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    /// Wire name used by the generateContent API.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Model => "model",
        }
    }
}

/// One part of a turn: text or an inline JPEG.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    InlineJpeg(Vec<u8>),
}

/// A single conversation turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// A request to the text generation endpoint.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub turns: Vec<Turn>,
    /// Attach the Google Search tool so replies can cite web sources.
    pub search_grounding: bool,
}

/// A completed generation: joined text plus any grounding citations.
#[derive(Debug, Clone, Default)]
pub struct GenerateReply {
    pub text: String,
    pub links: Vec<shark_core::types::GroundingLink>,
}

/// Text generation client trait.
#[async_trait]
pub trait TextClient: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateReply>;
}
