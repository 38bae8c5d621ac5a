//! Camera capture lifecycle.
//!
//! A [`CaptureSource`] opens the device and yields a [`CaptureStream`]. The
//! stream owns the teardown token; consumers hold non-owning references to the
//! frame source and subscribe to teardown by cloning the token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shark_core::error::{Result, SharkError};

use crate::frame::{FrameSource, RgbFrame};

/// Which camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    /// Front-facing, toward the player.
    User,
    /// Rear-facing, toward the table.
    Environment,
}

/// Requested capture parameters. Sources treat these as ideals, not hard
/// requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Capture microphone audio alongside video.
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            audio: true,
        }
    }
}

/// A camera device abstraction.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Open the device. Denied permission surfaces as [`SharkError::Capture`].
    async fn open(&self, constraints: &CaptureConstraints) -> Result<CaptureStream>;
}

/// An open capture stream: live frames, optional encoded chunks, and a
/// teardown token.
pub struct CaptureStream {
    frames: Arc<dyn FrameSource>,
    chunks: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    closed: CancellationToken,
}

impl CaptureStream {
    pub fn new(frames: Arc<dyn FrameSource>) -> Self {
        Self {
            frames,
            chunks: Mutex::new(None),
            closed: CancellationToken::new(),
        }
    }

    /// A stream that also emits encoded recording chunks.
    pub fn with_chunks(
        frames: Arc<dyn FrameSource>,
        chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            frames,
            chunks: Mutex::new(Some(chunks)),
            closed: CancellationToken::new(),
        }
    }

    /// Non-owning reference to the live frames.
    pub fn frames(&self) -> Arc<dyn FrameSource> {
        self.frames.clone()
    }

    /// Token that fires when the stream closes. Clone it to subscribe to
    /// teardown without owning the stream.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Release the device. Safe to call more than once.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Take the encoded-chunk receiver, if this stream records. Yields `None`
    /// on a frames-only stream or after a previous take.
    pub fn take_chunks(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.chunks.lock().unwrap().take()
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Owns the current capture stream and guards against double-opens.
pub struct CaptureController {
    source: Arc<dyn CaptureSource>,
    stream: Option<CaptureStream>,
}

impl CaptureController {
    pub fn new(source: Arc<dyn CaptureSource>) -> Self {
        Self {
            source,
            stream: None,
        }
    }

    /// Open the camera. A second start while active is a no-op.
    pub async fn start(&mut self, constraints: &CaptureConstraints) -> Result<()> {
        if self.stream.is_some() {
            debug!("Capture already active");
            return Ok(());
        }

        match self.source.open(constraints).await {
            Ok(stream) => {
                info!(?constraints.facing, "Capture started");
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) => {
                warn!(%e, "Capture failed to start");
                Err(e)
            }
        }
    }

    /// Release the camera. A stop without a stream is a no-op.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
            info!("Capture stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream(&self) -> Option<&CaptureStream> {
        self.stream.as_ref()
    }
}

/// A synthetic table-green camera for development and tests.
///
/// Emits encoded chunks every 500ms until the stream closes.
#[derive(Default)]
pub struct SyntheticSource {
    pub deny: bool,
}

struct SyntheticFrames {
    width: u32,
    height: u32,
    tick: AtomicU64,
}

impl FrameSource for SyntheticFrames {
    fn current_frame(&self) -> Option<RgbFrame> {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        // Felt green with a slow shimmer so consecutive frames differ
        let green = 96 + (tick % 32) as u8;
        Some(RgbFrame::solid(self.width, self.height, [16, green, 48]))
    }
}

#[async_trait]
impl CaptureSource for SyntheticSource {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<CaptureStream> {
        if self.deny {
            return Err(SharkError::Capture("camera permission denied".into()));
        }

        let frames = Arc::new(SyntheticFrames {
            width: constraints.ideal_width,
            height: constraints.ideal_height,
            tick: AtomicU64::new(0),
        });

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let stream = CaptureStream::with_chunks(frames.clone(), chunk_rx);
        let closed = stream.closed();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(500));
            loop {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(frame) = frames.current_frame() else { continue };
                        match frame.to_jpeg(frame.width, frame.height, 80) {
                            Ok(jpeg) => {
                                if chunk_tx.send(jpeg).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(%e, "Synthetic chunk encode failed"),
                        }
                    }
                }
            }
        });

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_controller_start_stop() {
        let mut controller = CaptureController::new(Arc::new(SyntheticSource::default()));
        assert!(!controller.is_active());

        controller
            .start(&CaptureConstraints::default())
            .await
            .unwrap();
        assert!(controller.is_active());

        let closed = controller.stream().unwrap().closed();
        assert!(!closed.is_cancelled());

        controller.stop();
        assert!(!controller.is_active());
        // Subscribers see teardown through their cloned token
        assert!(closed.is_cancelled());

        // Stop again is a no-op
        controller.stop();
    }

    #[tokio::test]
    async fn test_double_start_keeps_first_stream() {
        let mut controller = CaptureController::new(Arc::new(SyntheticSource::default()));
        controller
            .start(&CaptureConstraints::default())
            .await
            .unwrap();
        let first = controller.stream().unwrap().closed();

        controller
            .start(&CaptureConstraints::default())
            .await
            .unwrap();
        assert!(!first.is_cancelled());
    }

    #[tokio::test]
    async fn test_denied_permission_is_typed() {
        let mut controller = CaptureController::new(Arc::new(SyntheticSource { deny: true }));
        let err = controller
            .start(&CaptureConstraints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SharkError::Capture(_)));
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_synthetic_frames_and_chunks() {
        let source = SyntheticSource::default();
        let stream = source.open(&CaptureConstraints::default()).await.unwrap();

        let frame = stream.frames().current_frame().unwrap();
        assert_eq!(frame.width, 1280);
        assert_eq!(frame.height, 720);

        let mut chunks = stream.take_chunks().unwrap();
        // Second take yields nothing
        assert!(stream.take_chunks().is_none());

        let chunk = chunks.recv().await.unwrap();
        assert_eq!(&chunk[..2], &[0xFF, 0xD8]);

        stream.close();
    }
}
