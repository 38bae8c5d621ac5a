//! PCM audio chunks.

/// Sample rate of audio produced by the live session.
pub const LIVE_SAMPLE_RATE: u32 = 24_000;

/// Decoded 16-bit PCM mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Decode little-endian 16-bit PCM. A trailing odd byte is dropped.
    pub fn from_pcm16_le(bytes: &[u8], sample_rate: u32) -> Self {
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
