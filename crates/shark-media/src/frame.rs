//! Raw video frames and JPEG sampling.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb, imageops};

/// A packed RGB8 frame.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB triples, `width * height * 3` bytes.
    pub data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            anyhow::bail!(
                "frame buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            );
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A single-color frame, handy for synthetic sources and tests.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width * height) {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Scale to `width`x`height` and encode as JPEG at the given quality (1-100).
    pub fn to_jpeg(&self, width: u32, height: u32, quality: u8) -> anyhow::Result<Vec<u8>> {
        let image: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(self.width, self.height, self.data.clone())
                .ok_or_else(|| anyhow::anyhow!("frame buffer does not match its dimensions"))?;

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        if self.width == width && self.height == height {
            encoder.encode_image(&image)?;
        } else {
            let resized = imageops::resize(&image, width, height, imageops::FilterType::Triangle);
            encoder.encode_image(&resized)?;
        }
        Ok(out)
    }
}

/// Anything that can hand out the most recent video frame.
///
/// Implemented by live capture streams and by session artifacts being
/// scrubbed during review.
pub trait FrameSource: Send + Sync {
    /// The latest frame, or `None` when nothing has been captured yet.
    fn current_frame(&self) -> Option<RgbFrame>;
}
