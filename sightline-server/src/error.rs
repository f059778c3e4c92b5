use sightline_core::Error as CoreError;
use thiserror::Error;

/// Reference server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<ServerError> for CoreError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Core(e) => e,
            ServerError::Io(e) => CoreError::Io(e),
            ServerError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::Protocol(format!("Server error: {}", other)),
        }
    }
}
