//! Error types for sightline-eye

use sightline_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EyeError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<EyeError> for CoreError {
    fn from(err: EyeError) -> Self {
        match err {
            EyeError::Core(inner) => inner,
            EyeError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::Protocol(format!("Client error: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eye_error_display() {
        let err = EyeError::Camera("no device".to_string());
        assert!(err.to_string().contains("Camera error"));
        assert!(err.to_string().contains("no device"));
    }

    #[test]
    fn test_eye_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml");
        let err: EyeError = io_err.into();
        assert!(matches!(err, EyeError::Io(_)));
    }

    #[test]
    fn test_eye_error_to_core_error() {
        let core: CoreError = EyeError::Transport("socket closed".to_string()).into();
        match core {
            CoreError::Protocol(msg) => {
                assert!(msg.contains("Client error"));
                assert!(msg.contains("socket closed"));
            }
            _ => panic!("Expected Protocol error"),
        }

        let core: CoreError = EyeError::Config("bad port".to_string()).into();
        assert!(matches!(core, CoreError::Configuration(_)));
    }
}
