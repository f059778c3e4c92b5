//! Device-camera frame source
//!
//! A physical (or synthetic) camera streams at its native resolution and
//! every captured frame is copied down to the capture resolution before it
//! reaches the encoder.

use crate::config::ClientConfig;
use crate::error::EyeError;
use crate::frame::{fit_to_resolution, FrameSource, RawFrame};
use image::{Rgb, RgbImage};
use tracing::{error, info};

/// Which way a camera faces relative to the device screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Rear,
    External,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub name: String,
    pub facing: CameraFacing,
}

impl CameraInfo {
    pub fn new(name: impl Into<String>, facing: CameraFacing) -> Self {
        Self {
            name: name.into(),
            facing,
        }
    }
}

/// A camera the device source can stream from.
pub trait CameraDevice: Send {
    fn info(&self) -> &CameraInfo;

    /// Start streaming at the requested native resolution. The device may
    /// settle on a different size.
    fn start(&mut self, width: u32, height: u32) -> Result<(), EyeError>;

    fn is_active(&self) -> bool;

    /// Most recent frame, or `None` if the device has nothing new yet.
    fn latest_frame(&mut self) -> Option<RgbImage>;

    fn stop(&mut self);
}

/// Index of the first rear-facing camera, falling back to the first camera.
pub fn select_camera(cameras: &[CameraInfo]) -> Option<usize> {
    if cameras.is_empty() {
        return None;
    }
    Some(
        cameras
            .iter()
            .position(|c| c.facing == CameraFacing::Rear)
            .unwrap_or(0),
    )
}

/// Frame source backed by one selected [`CameraDevice`].
pub struct DeviceCameraSource {
    device: Option<Box<dyn CameraDevice>>,
    width: u32,
    height: u32,
}

impl DeviceCameraSource {
    /// Pick and start a camera from `devices`.
    ///
    /// Setup failures are logged and leave a degraded source whose `capture`
    /// always returns `None`.
    pub fn open(devices: Vec<Box<dyn CameraDevice>>, config: &ClientConfig) -> Self {
        let infos: Vec<CameraInfo> = devices.iter().map(|d| d.info().clone()).collect();
        let device = match select_camera(&infos) {
            Some(index) => {
                let mut device = devices.into_iter().nth(index);
                if let Some(ref mut cam) = device {
                    match cam.start(config.device_width, config.device_height) {
                        Ok(()) => info!(
                            "Camera '{}' started at {}x{} (capture {}x{})",
                            cam.info().name,
                            config.device_width,
                            config.device_height,
                            config.capture_width,
                            config.capture_height
                        ),
                        Err(e) => error!("Failed to start camera '{}': {}", cam.info().name, e),
                    }
                }
                device
            }
            None => {
                error!("No camera devices found, frames will not be captured");
                None
            }
        };

        Self {
            device,
            width: config.capture_width,
            height: config.capture_height,
        }
    }

    pub fn camera(&self) -> Option<&CameraInfo> {
        self.device.as_ref().map(|d| d.info())
    }
}

impl FrameSource for DeviceCameraSource {
    fn capture(&mut self) -> Option<RawFrame> {
        let device = self.device.as_mut()?;
        if !device.is_active() {
            return None;
        }
        let native = device.latest_frame()?;
        Some(RawFrame::new(fit_to_resolution(&native, self.width, self.height)))
    }

    fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.stop();
            info!("Camera '{}' released", device.info().name);
        }
    }

    fn describe(&self) -> String {
        match self.camera() {
            Some(info) => format!("camera '{}' ({:?})", info.name, info.facing),
            None => "no camera".to_string(),
        }
    }
}

impl Drop for DeviceCameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Camera that renders a moving test pattern.
///
/// Used when no real camera backend is compiled in, and by tests.
pub struct SyntheticCamera {
    info: CameraInfo,
    size: Option<(u32, u32)>,
    frame_index: u64,
}

impl SyntheticCamera {
    pub fn new(info: CameraInfo) -> Self {
        Self {
            info,
            size: None,
            frame_index: 0,
        }
    }

    pub fn rear(name: impl Into<String>) -> Self {
        Self::new(CameraInfo::new(name, CameraFacing::Rear))
    }
}

impl CameraDevice for SyntheticCamera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn start(&mut self, width: u32, height: u32) -> Result<(), EyeError> {
        if width == 0 || height == 0 {
            return Err(EyeError::Camera(format!("invalid resolution {}x{}", width, height)));
        }
        self.size = Some((width, height));
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.size.is_some()
    }

    fn latest_frame(&mut self) -> Option<RgbImage> {
        let (width, height) = self.size?;
        self.frame_index = self.frame_index.wrapping_add(1);
        let shift = (self.frame_index % 256) as u32;

        // Diagonal gradient plus a bright square drifting left to right.
        let square = (width / 8).max(1);
        let square_x = (shift * 4) % width.saturating_sub(square).max(1);
        let square_y = height / 3;
        Some(RgbImage::from_fn(width, height, |x, y| {
            if x >= square_x && x < square_x + square && y >= square_y && y < square_y + square {
                Rgb([255, 255, 255])
            } else {
                Rgb([
                    ((x * 255 / width + shift) % 200) as u8,
                    ((y * 255 / height) % 200) as u8,
                    (((x + y) / 4 + shift) % 200) as u8,
                ])
            }
        }))
    }

    fn stop(&mut self) {
        self.size = None;
    }
}

#[cfg(feature = "opencv")]
pub use self::opencv_backend::OpenCvCamera;

#[cfg(feature = "opencv")]
mod opencv_backend {
    use super::{CameraDevice, CameraFacing, CameraInfo};
    use crate::error::EyeError;
    use image::RgbImage;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{VideoCapture, CAP_ANY, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
    };
    use tracing::warn;

    /// USB or built-in camera opened through OpenCV.
    pub struct OpenCvCamera {
        info: CameraInfo,
        index: i32,
        capture: Option<VideoCapture>,
    }

    impl OpenCvCamera {
        pub fn new(index: i32) -> Self {
            Self {
                info: CameraInfo::new(format!("opencv:{}", index), CameraFacing::Unknown),
                index,
                capture: None,
            }
        }
    }

    impl CameraDevice for OpenCvCamera {
        fn info(&self) -> &CameraInfo {
            &self.info
        }

        fn start(&mut self, width: u32, height: u32) -> Result<(), EyeError> {
            let mut capture = VideoCapture::new(self.index, CAP_ANY)
                .map_err(|e| EyeError::Camera(format!("Failed to open camera {}: {}", self.index, e)))?;
            let opened = capture
                .is_opened()
                .map_err(|e| EyeError::Camera(format!("Camera {} not opened: {}", self.index, e)))?;
            if !opened {
                return Err(EyeError::Camera(format!("Camera {} failed to open", self.index)));
            }
            capture
                .set(CAP_PROP_FRAME_WIDTH, width as f64)
                .map_err(|e| EyeError::Camera(format!("Failed to set width: {}", e)))?;
            capture
                .set(CAP_PROP_FRAME_HEIGHT, height as f64)
                .map_err(|e| EyeError::Camera(format!("Failed to set height: {}", e)))?;
            self.capture = Some(capture);
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.capture
                .as_ref()
                .map(|c| c.is_opened().unwrap_or(false))
                .unwrap_or(false)
        }

        fn latest_frame(&mut self) -> Option<RgbImage> {
            let capture = self.capture.as_mut()?;
            let mut bgr = Mat::default();
            match capture.read(&mut bgr) {
                Ok(true) if !bgr.empty() => {}
                Ok(_) => return None,
                Err(e) => {
                    warn!("Camera {} read failed: {}", self.index, e);
                    return None;
                }
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).ok()?;
            let width = u32::try_from(rgb.cols()).ok()?;
            let height = u32::try_from(rgb.rows()).ok()?;
            let data = rgb.data_bytes().ok()?.to_vec();
            RgbImage::from_raw(width, height, data)
        }

        fn stop(&mut self) {
            if let Some(mut capture) = self.capture.take() {
                let _ = capture.release();
            }
        }
    }
}
