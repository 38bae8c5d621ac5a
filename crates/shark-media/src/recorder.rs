//! Session recording — accumulates encoded chunks while capture runs.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use shark_core::error::{Result, SharkError};

use crate::capture::CaptureStream;

/// A finished recording.
#[derive(Debug, Clone)]
pub struct RecordedArtifact {
    pub id: Uuid,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl RecordedArtifact {
    /// Write the artifact to the system temp directory, returning its path.
    pub async fn write_temp(&self) -> anyhow::Result<PathBuf> {
        let ext = self.mime_type.rsplit('/').next().unwrap_or("bin");
        let path = std::env::temp_dir().join(format!("shark-session-{}.{ext}", self.id));
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// Collects encoded chunks from a capture stream into one artifact.
pub struct Recorder {
    chunks: Vec<Vec<u8>>,
    active: bool,
    mime_type: String,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            active: false,
            mime_type: "video/webm".into(),
        }
    }

    /// Begin recording. Without an open stream this is a no-op.
    pub fn start(&mut self, stream: Option<&CaptureStream>) -> Result<()> {
        let Some(stream) = stream else {
            debug!("No capture stream, recording skipped");
            return Ok(());
        };
        if stream.is_closed() {
            debug!("Capture stream already closed, recording skipped");
            return Ok(());
        }
        if self.active {
            return Err(SharkError::Recording("already recording".into()));
        }

        self.chunks.clear();
        self.active = true;
        info!("Recording started");
        Ok(())
    }

    /// Append one encoded chunk. Ignored while inactive, and empty chunks are
    /// dropped.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if !self.active || chunk.is_empty() {
            return;
        }
        self.chunks.push(chunk);
    }

    /// Pull everything currently buffered in the stream's chunk channel.
    pub fn drain_chunks(&mut self, rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Ok(chunk) = rx.try_recv() {
            self.push_chunk(chunk);
        }
    }

    /// Finish recording. Yields `None` if recording never started.
    pub fn stop(&mut self) -> Option<RecordedArtifact> {
        if !self.active {
            return None;
        }
        self.active = false;

        let bytes: Vec<u8> = self.chunks.drain(..).flatten().collect();
        info!(bytes = bytes.len(), "Recording stopped");

        Some(RecordedArtifact {
            id: Uuid::new_v4(),
            mime_type: self.mime_type.clone(),
            bytes,
            created_at: Utc::now(),
        })
    }

    pub fn is_recording(&self) -> bool {
        self.active
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::frame::{FrameSource, RgbFrame};

    struct OneFrame;

    impl FrameSource for OneFrame {
        fn current_frame(&self) -> Option<RgbFrame> {
            Some(RgbFrame::solid(4, 4, [0, 0, 0]))
        }
    }

    #[test]
    fn test_record_accumulates_chunks() {
        let stream = CaptureStream::new(Arc::new(OneFrame));
        let mut recorder = Recorder::new();

        recorder.start(Some(&stream)).unwrap();
        assert!(recorder.is_recording());

        recorder.push_chunk(vec![1, 2]);
        recorder.push_chunk(vec![]); // dropped
        recorder.push_chunk(vec![3]);

        let artifact = recorder.stop().unwrap();
        assert_eq!(artifact.bytes, vec![1, 2, 3]);
        assert_eq!(artifact.mime_type, "video/webm");
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_start_without_stream_is_noop() {
        let mut recorder = Recorder::new();
        recorder.start(None).unwrap();
        assert!(!recorder.is_recording());
        recorder.push_chunk(vec![1]);
        assert!(recorder.stop().is_none());
    }

    #[test]
    fn test_start_on_closed_stream_is_noop() {
        let stream = CaptureStream::new(Arc::new(OneFrame));
        stream.close();
        let mut recorder = Recorder::new();
        recorder.start(Some(&stream)).unwrap();
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_double_start_errors() {
        let stream = CaptureStream::new(Arc::new(OneFrame));
        let mut recorder = Recorder::new();
        recorder.start(Some(&stream)).unwrap();
        let err = recorder.start(Some(&stream)).unwrap_err();
        assert!(matches!(err, SharkError::Recording(_)));
    }

    #[test]
    fn test_restart_clears_previous_chunks() {
        let stream = CaptureStream::new(Arc::new(OneFrame));
        let mut recorder = Recorder::new();

        recorder.start(Some(&stream)).unwrap();
        recorder.push_chunk(vec![1]);
        recorder.stop().unwrap();

        recorder.start(Some(&stream)).unwrap();
        recorder.push_chunk(vec![2]);
        let artifact = recorder.stop().unwrap();
        assert_eq!(artifact.bytes, vec![2]);
    }

    #[tokio::test]
    async fn test_drain_chunks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stream = CaptureStream::new(Arc::new(OneFrame));
        let mut recorder = Recorder::new();
        recorder.start(Some(&stream)).unwrap();

        tx.send(vec![1]).unwrap();
        tx.send(vec![2, 3]).unwrap();
        recorder.drain_chunks(&mut rx);

        let artifact = recorder.stop().unwrap();
        assert_eq!(artifact.bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_write_temp() {
        let artifact = RecordedArtifact {
            id: Uuid::new_v4(),
            mime_type: "video/webm".into(),
            bytes: vec![9, 8, 7],
            created_at: Utc::now(),
        };
        let path = artifact.write_temp().await.unwrap();
        assert!(path.to_string_lossy().ends_with(".webm"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![9, 8, 7]);
        std::fs::remove_file(path).ok();
    }
}
