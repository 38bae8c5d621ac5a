//! Shark Bot — search-grounded billiards chat.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use shark_core::busy::BusyFlag;
use shark_core::types::{Coordinates, GroundingLink};
use shark_gemini::{GenerateRequest, TextClient, Turn};

/// Seeded assistant message every conversation opens with.
pub const CHAT_GREETING: &str =
    "I'm your tactical AI. State your query: Strategy, local intel, or technical rules.";
/// Shown when the chat call fails outright.
pub const CHAT_FALLBACK: &str = "Encryption error. Protocol failed.";
/// Shown when the model returns an empty reply.
pub const CHAT_EMPTY_REPLY: &str = "Connection dropout. Retrying handshake...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default)]
    pub links: Vec<GroundingLink>,
}

/// What happened to a [`ChatSession::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The conversation gained a user message and a reply.
    Sent,
    /// A previous message is still in flight.
    RejectedBusy,
    /// The message was blank.
    RejectedEmpty,
}

/// A Shark Bot conversation.
///
/// The visible history is display-only; each question goes to the model alone,
/// framed by a system instruction carrying skill level and coordinates.
pub struct ChatSession {
    client: Arc<dyn TextClient>,
    model: String,
    skill_level: u8,
    location: Option<Coordinates>,
    messages: Mutex<Vec<ChatMessage>>,
    busy: BusyFlag,
}

impl ChatSession {
    pub fn new(
        client: Arc<dyn TextClient>,
        model: impl Into<String>,
        skill_level: u8,
        location: Option<Coordinates>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            skill_level,
            location,
            messages: Mutex::new(vec![ChatMessage {
                role: ChatRole::Assistant,
                text: CHAT_GREETING.into(),
                links: vec![],
            }]),
            busy: BusyFlag::new(),
        }
    }

    /// Send one message. Blank input and input while a reply is in flight
    /// change nothing; failures still produce a reply.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SendOutcome::RejectedEmpty;
        }
        let Some(_guard) = self.busy.acquire() else {
            return SendOutcome::RejectedBusy;
        };

        self.push(ChatRole::User, trimmed, vec![]);

        let request = GenerateRequest {
            model: self.model.clone(),
            system_instruction: Some(self.system_instruction()),
            turns: vec![Turn::user_text(trimmed)],
            search_grounding: true,
        };

        match self.client.generate(&request).await {
            Ok(reply) => {
                let text = if reply.text.is_empty() {
                    CHAT_EMPTY_REPLY.to_string()
                } else {
                    reply.text
                };
                self.push(ChatRole::Assistant, text, reply.links);
            }
            Err(e) => {
                warn!(%e, "Chat query failed");
                self.push(ChatRole::Assistant, CHAT_FALLBACK, vec![]);
            }
        }

        SendOutcome::Sent
    }

    fn system_instruction(&self) -> String {
        let coordinates = self
            .location
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Stealth Mode".into());
        format!(
            "You are 'Shark Bot', a high-level technical assistant.\n\
             Player Skill: {}/10.\n\
             Current Coordinates: {}.\n\
             Tone: Direct, analytical, professional, and technical. \
             Use billiards terminology accurately.",
            self.skill_level, coordinates
        )
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    fn push(&self, role: ChatRole, text: impl Into<String>, links: Vec<GroundingLink>) {
        self.messages.lock().unwrap().push(ChatMessage {
            role,
            text: text.into(),
            links,
        });
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use shark_gemini::GenerateReply;

    use super::*;

    enum Script {
        Reply(&'static str, Vec<GroundingLink>),
        Empty(Vec<GroundingLink>),
        Fail,
    }

    struct FakeClient {
        script: Script,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl FakeClient {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextClient for FakeClient {
        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateReply> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.script {
                Script::Reply(text, links) => Ok(GenerateReply {
                    text: (*text).into(),
                    links: links.clone(),
                }),
                Script::Empty(links) => Ok(GenerateReply {
                    text: String::new(),
                    links: links.clone(),
                }),
                Script::Fail => anyhow::bail!("429"),
            }
        }
    }

    fn link(uri: &str) -> GroundingLink {
        GroundingLink {
            uri: uri.into(),
            title: uri.into(),
        }
    }

    #[tokio::test]
    async fn test_conversation_opens_with_greeting() {
        let chat = ChatSession::new(
            FakeClient::new(Script::Fail),
            "gemini-3-flash-preview",
            5,
            None,
        );
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::Assistant);
        assert_eq!(messages[0].text, CHAT_GREETING);
    }

    #[tokio::test]
    async fn test_send_gets_grounded_reply() {
        let client = FakeClient::new(Script::Reply(
            "The Break Room runs a Tuesday league.",
            vec![link("https://breakroom.example")],
        ));
        let chat = ChatSession::new(client.clone(), "gemini-3-flash-preview", 8, None);

        assert_eq!(chat.send("  Any leagues near me?  ").await, SendOutcome::Sent);

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        // Input is trimmed before it enters the conversation
        assert_eq!(messages[1].text, "Any leagues near me?");
        assert_eq!(messages[2].text, "The Break Room runs a Tuesday league.");
        assert_eq!(messages[2].links, vec![link("https://breakroom.example")]);
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn test_request_ships_only_current_message() {
        let client = FakeClient::new(Script::Reply("ok", vec![]));
        let chat = ChatSession::new(client.clone(), "gemini-3-flash-preview", 8, None);

        chat.send("first question").await;
        chat.send("second question").await;

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[1].turns.len(), 1);
        assert!(seen[1].search_grounding);
        let shark_gemini::Part::Text(text) = &seen[1].turns[0].parts[0] else {
            panic!("expected a text part");
        };
        assert_eq!(text, "second question");
    }

    #[tokio::test]
    async fn test_system_instruction_carries_location() {
        let client = FakeClient::new(Script::Reply("ok", vec![]));
        let chat = ChatSession::new(
            client.clone(),
            "gemini-3-flash-preview",
            3,
            Some(Coordinates {
                lat: 40.7,
                lng: -74.0,
            }),
        );
        chat.send("hello").await;

        let seen = client.seen.lock().unwrap();
        let instruction = seen[0].system_instruction.as_deref().unwrap();
        assert!(instruction.contains("Player Skill: 3/10."));
        assert!(instruction.contains("Current Coordinates: 40.7, -74."));
    }

    #[tokio::test]
    async fn test_missing_location_is_stealth_mode() {
        let client = FakeClient::new(Script::Reply("ok", vec![]));
        let chat = ChatSession::new(client.clone(), "gemini-3-flash-preview", 3, None);
        chat.send("hello").await;

        let seen = client.seen.lock().unwrap();
        let instruction = seen[0].system_instruction.as_deref().unwrap();
        assert!(instruction.contains("Current Coordinates: Stealth Mode."));
    }

    #[tokio::test]
    async fn test_blank_input_changes_nothing() {
        let client = FakeClient::new(Script::Reply("unused", vec![]));
        let chat = ChatSession::new(client.clone(), "gemini-3-flash-preview", 5, None);

        assert_eq!(chat.send("   ").await, SendOutcome::RejectedEmpty);
        assert_eq!(chat.messages().len(), 1);
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_gets_fallback_without_links() {
        let chat = ChatSession::new(
            FakeClient::new(Script::Fail),
            "gemini-3-flash-preview",
            5,
            None,
        );
        assert_eq!(chat.send("down?").await, SendOutcome::Sent);

        let messages = chat.messages();
        assert_eq!(messages[2].text, CHAT_FALLBACK);
        assert!(messages[2].links.is_empty());
    }

    #[tokio::test]
    async fn test_empty_reply_keeps_its_links() {
        let chat = ChatSession::new(
            FakeClient::new(Script::Empty(vec![link("https://halls.example")])),
            "gemini-3-flash-preview",
            5,
            None,
        );
        chat.send("where?").await;

        let messages = chat.messages();
        assert_eq!(messages[2].text, CHAT_EMPTY_REPLY);
        assert_eq!(messages[2].links, vec![link("https://halls.example")]);
    }

    #[tokio::test]
    async fn test_second_send_rejected_while_busy() {
        struct GatedClient {
            release: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
        }

        #[async_trait]
        impl TextClient for GatedClient {
            async fn generate(&self, _request: &GenerateRequest) -> anyhow::Result<GenerateReply> {
                let gate = self.release.lock().unwrap().take();
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok(GenerateReply {
                    text: "done".into(),
                    links: vec![],
                })
            }
        }

        let (release_tx, release_rx) = tokio::sync::oneshot::channel();
        let chat = Arc::new(ChatSession::new(
            Arc::new(GatedClient {
                release: Mutex::new(Some(release_rx)),
            }),
            "gemini-3-flash-preview",
            5,
            None,
        ));

        let first = {
            let chat = chat.clone();
            tokio::spawn(async move { chat.send("first").await })
        };

        // Wait until the first send holds the busy flag
        while !chat.is_busy() {
            tokio::task::yield_now().await;
        }

        assert_eq!(chat.send("second").await, SendOutcome::RejectedBusy);

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), SendOutcome::Sent);
        // Only the first message joined the conversation
        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "first");
    }
}
