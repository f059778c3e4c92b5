//! Captured frames and the source trait both capture variants implement

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;

/// One captured or rendered RGB image at the configured capture resolution.
///
/// Pixels sit behind an `Arc` so the overlay preview can hold the last frame
/// without copying it.
#[derive(Debug, Clone)]
pub struct RawFrame {
    image: Arc<RgbImage>,
    captured_at: Instant,
}

impl RawFrame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
            captured_at: Instant::now(),
        }
    }

    /// Wrap pixels that are already shared, e.g. a reused render target.
    pub fn from_shared(image: Arc<RgbImage>) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn shared_image(&self) -> Arc<RgbImage> {
        Arc::clone(&self.image)
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

/// Produces frames for the capture loop.
///
/// `capture` fails softly: `None` means "nothing this tick" and the caller
/// skips the send without logging.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Option<RawFrame>;

    /// Release the capture device or render target. Called once on teardown,
    /// after the connection close has been attempted.
    fn release(&mut self) {}

    fn describe(&self) -> String;
}

/// Copy `source` into a buffer of exactly `width`x`height`.
pub fn fit_to_resolution(source: &RgbImage, width: u32, height: u32) -> RgbImage {
    if source.dimensions() == (width, height) {
        return source.clone();
    }
    imageops::resize(source, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_downscales_native_resolution() {
        let native = RgbImage::from_pixel(1280, 720, image::Rgb([10, 20, 30]));
        let fitted = fit_to_resolution(&native, 640, 480);
        assert_eq!(fitted.dimensions(), (640, 480));
        assert_eq!(fitted.get_pixel(320, 240), &image::Rgb([10, 20, 30]));
    }

    #[test]
    fn test_fit_keeps_matching_resolution() {
        let native = RgbImage::new(64, 48);
        assert_eq!(fit_to_resolution(&native, 64, 48).dimensions(), (64, 48));
    }

    #[test]
    fn test_raw_frame_clone_shares_pixels() {
        let frame = RawFrame::new(RgbImage::new(4, 4));
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.image(), copy.image()));
        assert_eq!((copy.width(), copy.height()), (4, 4));
    }
}
