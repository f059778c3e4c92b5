//! JPEG frame encoder

use crate::error::EyeError;
use crate::frame::RawFrame;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Encodes frames at a fixed quality into one reused destination buffer.
pub struct FrameEncoder {
    quality: u8,
    buffer: Vec<u8>,
}

impl FrameEncoder {
    /// `quality` is clamped to 0-100. JPEG has no quality 0, so 0 encodes as 1.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100),
            buffer: Vec::new(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&mut self, frame: &RawFrame) -> Result<Bytes, EyeError> {
        let image = frame.image();
        if image.width() == 0 || image.height() == 0 {
            return Err(EyeError::Encode("frame has no pixels".to_string()));
        }

        self.buffer.clear();
        let mut encoder = JpegEncoder::new_with_quality(&mut self.buffer, self.quality.max(1));
        encoder
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .map_err(|e| EyeError::Encode(e.to_string()))?;
        Ok(Bytes::copy_from_slice(&self.buffer))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
