//! The live coaching session.
//!
//! One background task owns the whole loop: it samples a frame from the
//! capture stream every two seconds, pushes it to the live model, schedules
//! reply audio for gapless playback, and keeps a short rolling transcript.
//! The session holds only non-owning references to capture; it learns about
//! teardown through a cloned cancellation token and never touches the camera
//! itself.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shark_core::error::SharkError;
use shark_gemini::live::{LiveConfig, LiveConnector, LiveEvent, LiveHandle};
use shark_media::audio::{AudioChunk, LIVE_SAMPLE_RATE};
use shark_media::frame::FrameSource;
use shark_media::scheduler::{AudioSink, PlaybackScheduler};

use crate::prompt::coach_instruction;
use crate::transcript::TranscriptRing;

/// Frame sampling cadence.
pub const SAMPLE_INTERVAL_MS: u64 = 2000;
/// Sampled frames are scaled down before upload.
pub const SAMPLE_WIDTH: u32 = 320;
pub const SAMPLE_HEIGHT: u32 = 180;
pub const SAMPLE_JPEG_QUALITY: u8 = 60;

/// Session lifecycle. Every change goes through [`CoachState::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoachState {
    Closed,
    Opening,
    Open,
}

impl CoachState {
    /// Step to `next`, or fail on an edge the lifecycle does not allow.
    pub fn advance(self, next: CoachState) -> Result<CoachState, SharkError> {
        use CoachState::*;
        match (self, next) {
            (Closed, Opening) | (Opening, Open) | (Opening, Closed) | (Open, Closed) => Ok(next),
            (from, to) => Err(SharkError::Live(format!(
                "illegal coach transition {from:?} -> {to:?}"
            ))),
        }
    }
}

/// Updates the session pushes to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum CoachUpdate {
    /// The model acknowledged setup; coaching is live.
    Opened,
    /// Transcript lines after a new fragment arrived, oldest first.
    Transcript(Vec<String>),
    /// The session is over, whatever the reason.
    Closed,
}

/// What to coach with, and for whom.
#[derive(Debug, Clone)]
pub struct CoachSettings {
    pub model: String,
    pub voice: String,
    pub skill_level: u8,
}

impl CoachSettings {
    fn live_config(&self) -> LiveConfig {
        LiveConfig {
            model: self.model.clone(),
            voice: self.voice.clone(),
            system_instruction: coach_instruction(self.skill_level),
        }
    }
}

/// Handle for observing and stopping a coach session.
pub struct CoachHandle {
    cancel: CancellationToken,
    state: Arc<Mutex<CoachState>>,
}

impl CoachHandle {
    pub fn state(&self) -> CoachState {
        *self.state.lock().unwrap()
    }

    pub fn is_active(&self) -> bool {
        self.state() != CoachState::Closed
    }

    /// Stop the session. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Start a coaching session against an open capture stream.
///
/// `frames` and `capture_closed` come from the capture stream; the session
/// does not own the camera and exits when the token fires.
pub fn start<S: AudioSink + 'static>(
    connector: Arc<dyn LiveConnector>,
    settings: CoachSettings,
    frames: Arc<dyn FrameSource>,
    capture_closed: CancellationToken,
    sink: S,
) -> (CoachHandle, mpsc::UnboundedReceiver<CoachUpdate>) {
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let state = Arc::new(Mutex::new(CoachState::Closed));

    let handle = CoachHandle {
        cancel: cancel.clone(),
        state: state.clone(),
    };

    tokio::spawn(async move {
        info!(model = %settings.model, "Coach session starting");
        run(
            connector,
            settings,
            frames,
            capture_closed,
            sink,
            cancel,
            state,
            update_tx,
        )
        .await;
        info!("Coach session ended");
    });

    (handle, update_rx)
}

#[allow(clippy::too_many_arguments)]
async fn run<S: AudioSink>(
    connector: Arc<dyn LiveConnector>,
    settings: CoachSettings,
    frames: Arc<dyn FrameSource>,
    capture_closed: CancellationToken,
    sink: S,
    cancel: CancellationToken,
    state: Arc<Mutex<CoachState>>,
    update_tx: mpsc::UnboundedSender<CoachUpdate>,
) {
    if capture_closed.is_cancelled() {
        warn!("Capture is gone, not opening a session");
        let _ = update_tx.send(CoachUpdate::Closed);
        return;
    }

    try_advance(&state, CoachState::Opening);

    let (live, mut events) = match connector.connect(&settings.live_config()).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(%e, "Live connect failed");
            try_advance(&state, CoachState::Closed);
            let _ = update_tx.send(CoachUpdate::Closed);
            return;
        }
    };

    let mut scheduler = PlaybackScheduler::new(sink);
    let mut ring = TranscriptRing::new();
    let mut interval = tokio::time::interval(Duration::from_millis(SAMPLE_INTERVAL_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = capture_closed.cancelled() => {
                info!("Capture closed, tearing the session down");
                break;
            }
            _ = interval.tick(), if current(&state) == CoachState::Open => {
                sample_frame(frames.as_ref(), &live);
            }
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("Live event channel closed");
                    break;
                };
                scheduler.reap();
                match event {
                    LiveEvent::Opened => {
                        if try_advance(&state, CoachState::Open) {
                            let _ = update_tx.send(CoachUpdate::Opened);
                        }
                    }
                    LiveEvent::Transcript(text) => {
                        ring.push(text);
                        let _ = update_tx.send(CoachUpdate::Transcript(ring.to_vec()));
                    }
                    LiveEvent::Audio(bytes) => {
                        let chunk = AudioChunk::from_pcm16_le(&bytes, LIVE_SAMPLE_RATE);
                        if chunk.is_empty() {
                            continue;
                        }
                        if let Err(e) = scheduler.schedule(chunk) {
                            warn!(%e, "Dropping audio chunk");
                        }
                    }
                    LiveEvent::Interrupted => {
                        debug!("Reply interrupted, flushing playback");
                        scheduler.interrupt();
                    }
                    LiveEvent::TurnComplete => debug!("Coach turn complete"),
                    LiveEvent::Closed => {
                        info!("Live session closed by server");
                        break;
                    }
                }
            }
        }
    }

    live.close();
    scheduler.interrupt();
    try_advance(&state, CoachState::Closed);
    let _ = update_tx.send(CoachUpdate::Closed);
}

fn current(state: &Mutex<CoachState>) -> CoachState {
    *state.lock().unwrap()
}

fn try_advance(state: &Mutex<CoachState>, next: CoachState) -> bool {
    let mut guard = state.lock().unwrap();
    match guard.advance(next) {
        Ok(next) => {
            *guard = next;
            true
        }
        Err(e) => {
            warn!(%e, "Ignoring state change");
            false
        }
    }
}

fn sample_frame(frames: &dyn FrameSource, live: &LiveHandle) {
    let Some(frame) = frames.current_frame() else {
        debug!("No frame available to sample");
        return;
    };
    match frame.to_jpeg(SAMPLE_WIDTH, SAMPLE_HEIGHT, SAMPLE_JPEG_QUALITY) {
        Ok(jpeg) => {
            if let Err(e) = live.send_frame("image/jpeg", &jpeg) {
                debug!(%e, "Frame send failed, session is closing");
            }
        }
        Err(e) => warn!(%e, "Frame encode failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        let state = CoachState::Closed.advance(CoachState::Opening).unwrap();
        let state = state.advance(CoachState::Open).unwrap();
        assert_eq!(state.advance(CoachState::Closed).unwrap(), CoachState::Closed);

        // Opening can close without ever reaching Open
        assert_eq!(
            CoachState::Opening.advance(CoachState::Closed).unwrap(),
            CoachState::Closed
        );
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(CoachState::Closed.advance(CoachState::Open).is_err());
        assert!(CoachState::Closed.advance(CoachState::Closed).is_err());
        assert!(CoachState::Open.advance(CoachState::Open).is_err());
        assert!(CoachState::Open.advance(CoachState::Opening).is_err());
        assert!(CoachState::Opening.advance(CoachState::Opening).is_err());
    }

    #[test]
    fn test_try_advance_ignores_illegal() {
        let state = Mutex::new(CoachState::Closed);
        assert!(try_advance(&state, CoachState::Opening));
        assert!(try_advance(&state, CoachState::Open));
        // A duplicate open acknowledgement changes nothing
        assert!(!try_advance(&state, CoachState::Open));
        assert_eq!(current(&state), CoachState::Open);
    }

    #[test]
    fn test_settings_build_live_config() {
        let settings = CoachSettings {
            model: "gemini-2.5-flash-native-audio-preview-09-2025".into(),
            voice: "Charon".into(),
            skill_level: 5,
        };
        let config = settings.live_config();
        assert_eq!(config.voice, "Charon");
        assert!(config.system_instruction.contains("player level 5"));
    }
}
