//! Configuration for the capture client
//!
//! Field names on disk follow the recognized option names (`serverIP`,
//! `jpegQuality`, `sendInterval`, ...). Every field has a default so a partial
//! file is enough.

use crate::error::EyeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime the client is hosted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Desktop,
    Mobile,
    /// Standalone XR headset runtime. Always captures the rendered view.
    XrHeadset,
}

impl Platform {
    /// Best guess from the compilation target.
    pub fn detect() -> Self {
        if cfg!(any(target_os = "android", target_os = "ios")) {
            Platform::Mobile
        } else {
            Platform::Desktop
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::detect()
    }
}

/// Which frame source variant the client runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Physical camera device.
    DeviceCamera,
    /// Off-screen render of a tracked viewpoint.
    RenderedView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    #[serde(rename = "serverIP")]
    pub server_ip: String,
    pub server_port: u16,
    #[serde(rename = "isVRMode")]
    pub vr_mode: bool,
    pub platform: Platform,
    /// Resolution of every frame handed to the encoder.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Resolution requested from a physical camera.
    pub device_width: u32,
    pub device_height: u32,
    /// JPEG quality, 0-100.
    pub jpeg_quality: u8,
    /// Seconds between frame sends.
    pub send_interval: f64,
    /// Host ticks per second.
    pub tick_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_ip: "192.168.18.89".to_string(),
            server_port: 8765,
            vr_mode: false,
            platform: Platform::default(),
            capture_width: 640,
            capture_height: 480,
            device_width: 1280,
            device_height: 720,
            jpeg_quality: 75,
            send_interval: 0.1,
            tick_rate: 60,
        }
    }
}

const MAX_DIMENSION: u32 = 8192;
/// One day.
const MAX_SEND_INTERVAL_SECS: f64 = 86_400.0;

impl ClientConfig {
    /// `ws://{serverIP}:{serverPort}` with no path.
    pub fn server_url(&self) -> String {
        format!("ws://{}:{}", self.server_ip, self.server_port)
    }

    /// Capture variant, fixed for the lifetime of the client.
    pub fn capture_mode(&self) -> CaptureMode {
        if self.vr_mode || self.platform == Platform::XrHeadset {
            CaptureMode::RenderedView
        } else {
            CaptureMode::DeviceCamera
        }
    }

    /// Saturates at `Duration::MAX` for values too large to represent.
    pub fn send_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.send_interval.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server_ip.trim().is_empty() {
            return Err("serverIP must not be empty".to_string());
        }
        if self.server_port == 0 {
            return Err("serverPort must be non-zero".to_string());
        }
        url::Url::parse(&self.server_url())
            .map_err(|e| format!("Invalid server address {}: {}", self.server_url(), e))?;

        for (name, w, h) in [
            ("capture", self.capture_width, self.capture_height),
            ("device", self.device_width, self.device_height),
        ] {
            if w == 0 || h == 0 {
                return Err(format!("{} resolution must be non-zero", name));
            }
            if w > MAX_DIMENSION || h > MAX_DIMENSION {
                return Err(format!("{} resolution too large (max {}px per side)", name, MAX_DIMENSION));
            }
        }

        if self.jpeg_quality > 100 {
            return Err("jpegQuality must be between 0 and 100".to_string());
        }
        if !self.send_interval.is_finite() || self.send_interval <= 0.0 {
            return Err("sendInterval must be a positive number of seconds".to_string());
        }
        if self.send_interval > MAX_SEND_INTERVAL_SECS {
            return Err(format!("sendInterval must be at most {} seconds", MAX_SEND_INTERVAL_SECS));
        }
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err("tickRate must be between 1 and 1000".to_string());
        }
        Ok(())
    }

    /// Load from a TOML or JSON file, picked by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EyeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config: Self = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| EyeError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| EyeError::Config(format!("{}: {}", path.display(), e)))?
        };
        config.validate().map_err(EyeError::Config)?;
        Ok(config)
    }

    /// Apply `SIGHTLINE_*` overrides from a variable lookup.
    ///
    /// Unparsable values are reported rather than silently skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), EyeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, EyeError> {
            raw.trim()
                .parse::<T>()
                .map_err(|_| EyeError::Config(format!("{} has an invalid value: {:?}", key, raw)))
        }

        if let Some(ip) = lookup("SIGHTLINE_SERVER_IP") {
            self.server_ip = ip;
        }
        if let Some(raw) = lookup("SIGHTLINE_SERVER_PORT") {
            self.server_port = parse("SIGHTLINE_SERVER_PORT", &raw)?;
        }
        if let Some(raw) = lookup("SIGHTLINE_VR_MODE") {
            self.vr_mode = parse("SIGHTLINE_VR_MODE", &raw)?;
        }
        if let Some(raw) = lookup("SIGHTLINE_JPEG_QUALITY") {
            self.jpeg_quality = parse("SIGHTLINE_JPEG_QUALITY", &raw)?;
        }
        if let Some(raw) = lookup("SIGHTLINE_SEND_INTERVAL") {
            self.send_interval = parse("SIGHTLINE_SEND_INTERVAL", &raw)?;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<(), EyeError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }
}
