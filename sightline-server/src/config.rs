//! Server configuration

use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// 10 MiB, large enough for any sane JPEG frame.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Bounding box of the brightest region.
    Luminance,
    /// Always reports nothing.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_message_size: usize,
    pub detector: DetectorKind,
    /// Luma value (0-255) a pixel must reach to count as bright.
    pub luminance_threshold: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8765,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            detector: DetectorKind::Luminance,
            luminance_threshold: 200,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_message_size == 0 {
            return Err("max_message_size must be greater than 0".to_string());
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| format!("invalid bind address {}:{}: {}", self.bind, self.port, e))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(ServerError::Config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8765);
        assert_eq!(config.max_message_size, 10 * 1024 * 1024);
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8765");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServerConfig::default();
        config.bind = "not-an-ip".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.max_message_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config: ServerConfig = toml::from_str("port = 9001\ndetector = \"none\"").unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.detector, DetectorKind::None);
        assert_eq!(config.bind, "0.0.0.0");
    }
}
