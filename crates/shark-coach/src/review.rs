//! Post-session review.
//!
//! The player scrubs to a moment in the recording and asks about it. Each
//! question ships one full-resolution snapshot of that moment plus the
//! question text; one question runs at a time.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use shark_core::busy::BusyFlag;
use shark_gemini::{GenerateRequest, Part, TextClient, Turn, TurnRole};
use shark_media::frame::FrameSource;

use crate::prompt::review_prompt;

/// Snapshot dimensions for review queries. Full resolution, unlike the live
/// sampling path.
pub const REVIEW_WIDTH: u32 = 1280;
pub const REVIEW_HEIGHT: u32 = 720;
pub const REVIEW_JPEG_QUALITY: u8 = 80;

/// Shown when the review call fails outright.
pub const REVIEW_FALLBACK: &str = "Shark AI unavailable for review.";
/// Shown when the model returns an empty reply.
pub const REVIEW_EMPTY_REPLY: &str = "Analysis failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewMessage {
    pub role: ReviewRole,
    pub text: String,
}

/// What happened to an [`ReviewSession::ask`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    /// The conversation gained a user message and a reply.
    Answered,
    /// A previous question is still in flight.
    RejectedBusy,
    /// The question was blank.
    RejectedEmpty,
}

/// A review conversation over one moment of a recorded session.
pub struct ReviewSession {
    client: Arc<dyn TextClient>,
    player: Arc<dyn FrameSource>,
    model: String,
    skill_level: u8,
    messages: Mutex<Vec<ReviewMessage>>,
    busy: BusyFlag,
}

impl ReviewSession {
    pub fn new(
        client: Arc<dyn TextClient>,
        player: Arc<dyn FrameSource>,
        model: impl Into<String>,
        skill_level: u8,
    ) -> Self {
        Self {
            client,
            player,
            model: model.into(),
            skill_level,
            messages: Mutex::new(Vec::new()),
            busy: BusyFlag::new(),
        }
    }

    /// Ask about the currently scrubbed moment.
    ///
    /// Blank questions and questions asked while another is in flight change
    /// nothing. Failures still produce a reply, so the conversation never
    /// silently drops a question.
    pub async fn ask(&self, question: &str) -> AskOutcome {
        if question.trim().is_empty() {
            return AskOutcome::RejectedEmpty;
        }
        let Some(_guard) = self.busy.acquire() else {
            return AskOutcome::RejectedBusy;
        };

        self.push(ReviewRole::User, question);

        let reply = match self.query(question).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%e, "Review query failed");
                REVIEW_FALLBACK.to_string()
            }
        };
        self.push(ReviewRole::Assistant, reply);

        AskOutcome::Answered
    }

    async fn query(&self, question: &str) -> anyhow::Result<String> {
        let frame = self
            .player
            .current_frame()
            .ok_or_else(|| anyhow::anyhow!("no frame at the scrubbed position"))?;
        let jpeg = frame.to_jpeg(REVIEW_WIDTH, REVIEW_HEIGHT, REVIEW_JPEG_QUALITY)?;

        let request = GenerateRequest {
            model: self.model.clone(),
            system_instruction: None,
            turns: vec![Turn {
                role: TurnRole::User,
                parts: vec![
                    Part::InlineJpeg(jpeg),
                    Part::Text(review_prompt(question, self.skill_level)),
                ],
            }],
            search_grounding: false,
        };

        let reply = self.client.generate(&request).await?;
        if reply.text.is_empty() {
            Ok(REVIEW_EMPTY_REPLY.to_string())
        } else {
            Ok(reply.text)
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn messages(&self) -> Vec<ReviewMessage> {
        self.messages.lock().unwrap().clone()
    }

    fn push(&self, role: ReviewRole, text: impl Into<String>) {
        self.messages.lock().unwrap().push(ReviewMessage {
            role,
            text: text.into(),
        });
    }
}
