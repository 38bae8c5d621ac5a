//! Gemini Live session over WebSocket.
//!
//! Speaks the `BidiGenerateContent` protocol: one setup message up front, then
//! media chunks (JPEG frames, audio) upstream and audio + transcription
//! downstream. The server sends JSON in both text and binary frames.

use async_trait::async_trait;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com";
const LIVE_WS_PATH: &str =
    "/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Parameters for opening a live session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
}

/// Events emitted by a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Server acknowledged the setup message.
    Opened,
    /// A fragment of the spoken reply, transcribed.
    Transcript(String),
    /// Raw 16-bit PCM at 24kHz mono.
    Audio(Vec<u8>),
    /// The model was cut off mid-reply; queued audio is stale.
    Interrupted,
    /// The model finished its turn.
    TurnComplete,
    /// The socket closed or the server asked us to go away.
    Closed,
}

/// A media chunk headed for the model.
#[derive(Debug, Clone)]
pub struct LiveFrame {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Handle for feeding and closing a live session from outside.
pub struct LiveHandle {
    input_tx: mpsc::UnboundedSender<LiveFrame>,
    cancel: CancellationToken,
}

impl LiveHandle {
    pub fn from_parts(
        input_tx: mpsc::UnboundedSender<LiveFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self { input_tx, cancel }
    }

    /// Queue a media frame for the model.
    pub fn send_frame(&self, mime_type: &str, data: &[u8]) -> anyhow::Result<()> {
        self.input_tx
            .send(LiveFrame {
                mime_type: mime_type.to_string(),
                data: data.to_vec(),
            })
            .map_err(|_| anyhow::anyhow!("live session closed"))
    }

    /// Ask the session task to close the socket and exit.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Opens live sessions. Implemented by [`GeminiLive`] and by test fakes.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(
        &self,
        config: &LiveConfig,
    ) -> anyhow::Result<(LiveHandle, mpsc::UnboundedReceiver<LiveEvent>)>;
}

/// The real Gemini Live connector.
pub struct GeminiLive {
    pub base_url: String,
    api_key: String,
}

impl GeminiLive {
    pub fn new(base_url: Option<&str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_LIVE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiLive {
    async fn connect(
        &self,
        config: &LiveConfig,
    ) -> anyhow::Result<(LiveHandle, mpsc::UnboundedReceiver<LiveEvent>)> {
        let url = format!("{}{}?key={}", self.base_url, LIVE_WS_PATH, self.api_key);

        debug!(model = %config.model, "Opening Gemini Live socket");
        let (mut ws, _) = connect_async(&url).await?;

        let setup = setup_message(config);
        ws.send(Message::Text(setup.to_string().into())).await?;

        let (input_tx, input_rx) = mpsc::unbounded_channel::<LiveFrame>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<LiveEvent>();
        let cancel = CancellationToken::new();

        let handle = LiveHandle {
            input_tx,
            cancel: cancel.clone(),
        };

        tokio::spawn(async move {
            info!("Live session started");
            run_session(ws, input_rx, event_tx, cancel).await;
            info!("Live session ended");
        });

        Ok((handle, event_rx))
    }
}

fn setup_message(config: &LiveConfig) -> serde_json::Value {
    json!({
        "setup": {
            "model": format!("models/{}", config.model),
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": config.voice }
                    }
                }
            },
            "systemInstruction": {
                "parts": [{ "text": config.system_instruction }]
            },
            "outputAudioTranscription": {}
        }
    })
}

fn realtime_input_message(frame: &LiveFrame) -> serde_json::Value {
    json!({
        "realtimeInput": {
            "mediaChunks": [{
                "mimeType": frame.mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(&frame.data),
            }]
        }
    })
}

async fn run_session(
    mut ws: WsStream,
    mut input_rx: mpsc::UnboundedReceiver<LiveFrame>,
    event_tx: mpsc::UnboundedSender<LiveEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws.close(None).await;
                break;
            }
            frame = input_rx.recv() => {
                let Some(frame) = frame else { break };
                let msg = realtime_input_message(&frame);
                if let Err(e) = ws.send(Message::Text(msg.to_string().into())).await {
                    warn!(%e, "Live input send failed");
                    let _ = event_tx.send(LiveEvent::Closed);
                    break;
                }
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if forward_events(&text, &event_tx).is_err() {
                            return;
                        }
                    }
                    // The Live API also delivers JSON in binary frames
                    Some(Ok(Message::Binary(bytes))) => {
                        match std::str::from_utf8(&bytes) {
                            Ok(text) => {
                                if forward_events(text, &event_tx).is_err() {
                                    return;
                                }
                            }
                            Err(_) => trace!("Ignoring non-UTF8 binary frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = event_tx.send(LiveEvent::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%e, "Live socket error");
                        let _ = event_tx.send(LiveEvent::Closed);
                        break;
                    }
                }
            }
        }
    }
}

fn forward_events(text: &str, event_tx: &mpsc::UnboundedSender<LiveEvent>) -> Result<(), ()> {
    for event in parse_server_text(text) {
        event_tx.send(event).map_err(|_| ())?;
    }
    Ok(())
}

// --- Server message types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    #[serde(default)]
    setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    server_content: Option<ServerContent>,
    #[serde(default)]
    go_away: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    output_transcription: Option<Transcription>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Debug, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<LivePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LivePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Transcription {
    #[serde(default)]
    text: Option<String>,
}

/// Translate one server JSON message into session events.
///
/// Interruption comes before any audio in the same message, so the player
/// flushes stale buffers before scheduling fresh ones.
fn parse_server_text(text: &str) -> Vec<LiveEvent> {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            trace!(%e, "Unparsed live message");
            return Vec::new();
        }
    };

    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(LiveEvent::Opened);
    }

    if let Some(content) = message.server_content {
        if let Some(text) = content.output_transcription.and_then(|t| t.text) {
            if !text.is_empty() {
                events.push(LiveEvent::Transcript(text));
            }
        }

        if content.interrupted {
            events.push(LiveEvent::Interrupted);
        }

        for part in content.model_turn.map(|t| t.parts).unwrap_or_default() {
            let Some(data) = part.inline_data.and_then(|d| d.data) else {
                continue;
            };
            match base64::engine::general_purpose::STANDARD.decode(&data) {
                Ok(bytes) => events.push(LiveEvent::Audio(bytes)),
                Err(e) => warn!(%e, "Bad base64 in live audio part"),
            }
        }

        if content.turn_complete {
            events.push(LiveEvent::TurnComplete);
        }
    }

    if message.go_away.is_some() {
        events.push(LiveEvent::Closed);
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    #[test]
    fn test_setup_message_shape() {
        let config = LiveConfig {
            model: "gemini-2.5-flash-native-audio-preview-09-2025".into(),
            voice: "Charon".into(),
            system_instruction: "Coach the player.".into(),
        };
        let msg = setup_message(&config);
        let setup = &msg["setup"];
        assert_eq!(
            setup["model"],
            "models/gemini-2.5-flash-native-audio-preview-09-2025"
        );
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Charon"
        );
        assert_eq!(
            setup["systemInstruction"]["parts"][0]["text"],
            "Coach the player."
        );
        assert!(setup["outputAudioTranscription"].is_object());
    }

    #[test]
    fn test_realtime_input_shape() {
        let frame = LiveFrame {
            mime_type: "image/jpeg".into(),
            data: vec![0xFF, 0xD8, 0xFF],
        };
        let msg = realtime_input_message(&frame);
        let chunk = &msg["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "image/jpeg");
        assert_eq!(chunk["data"], b64(&[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn test_parse_setup_complete() {
        let events = parse_server_text(r#"{"setupComplete":{}}"#);
        assert_eq!(events, vec![LiveEvent::Opened]);
    }

    #[test]
    fn test_parse_audio_and_transcript() {
        let audio = b64(&[1, 2, 3, 4]);
        let text = format!(
            r#"{{"serverContent":{{"modelTurn":{{"parts":[{{"inlineData":{{"mimeType":"audio/pcm;rate=24000","data":"{audio}"}}}}]}},"outputTranscription":{{"text":"Aim low."}}}}}}"#
        );
        let events = parse_server_text(&text);
        assert_eq!(
            events,
            vec![
                LiveEvent::Transcript("Aim low.".into()),
                LiveEvent::Audio(vec![1, 2, 3, 4]),
            ]
        );
    }

    #[test]
    fn test_parse_interrupted_precedes_audio() {
        let audio = b64(&[9, 9]);
        let text = format!(
            r#"{{"serverContent":{{"interrupted":true,"modelTurn":{{"parts":[{{"inlineData":{{"data":"{audio}"}}}}]}}}}}}"#
        );
        let events = parse_server_text(&text);
        assert_eq!(
            events,
            vec![LiveEvent::Interrupted, LiveEvent::Audio(vec![9, 9])]
        );
    }

    #[test]
    fn test_parse_turn_complete() {
        let events = parse_server_text(r#"{"serverContent":{"turnComplete":true}}"#);
        assert_eq!(events, vec![LiveEvent::TurnComplete]);
    }

    #[test]
    fn test_parse_go_away() {
        let events = parse_server_text(r#"{"goAway":{"timeLeft":"10s"}}"#);
        assert_eq!(events, vec![LiveEvent::Closed]);
    }

    #[test]
    fn test_parse_garbage_yields_nothing() {
        assert!(parse_server_text("not json").is_empty());
        assert!(parse_server_text(r#"{"usageMetadata":{"totalTokenCount":5}}"#).is_empty());
    }

    #[test]
    fn test_handle_send_after_receiver_drop() {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let handle = LiveHandle::from_parts(input_tx, CancellationToken::new());
        assert!(handle.send_frame("image/jpeg", &[1, 2]).is_ok());
        drop(input_rx);
        assert!(handle.send_frame("image/jpeg", &[1, 2]).is_err());
    }

    #[test]
    fn test_handle_close_is_idempotent() {
        let (input_tx, _input_rx) = mpsc::unbounded_channel();
        let handle = LiveHandle::from_parts(input_tx, CancellationToken::new());
        assert!(!handle.is_closed());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }
}
