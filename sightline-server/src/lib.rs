//! sightline-server: reference detection peer
//!
//! Accepts WebSocket clients on `/`, decodes every binary frame as an image,
//! runs a [`Detector`] over it and answers with a JSON `ServerResponse`.

pub mod config;
pub mod detector;
pub mod error;
pub mod websocket;

pub use config::{DetectorKind, ServerConfig};
pub use detector::{Detector, LuminanceDetector, NullDetector, StaticDetector};
pub use error::ServerError;

use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use websocket::{websocket_handler, DetectionState};

/// Build the router serving detections at `/`.
pub fn router(detector: Arc<dyn Detector>, max_message_size: usize) -> Router {
    let state = Arc::new(DetectionState {
        detector,
        max_message_size,
    });
    Router::new().route("/", get(websocket_handler)).with_state(state)
}

/// A bound, not yet serving, detection server.
pub struct DetectionServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl DetectionServer {
    /// Bind the configured address. Port 0 picks a free port.
    pub async fn bind(config: &ServerConfig, detector: Arc<dyn Detector>) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;
        let addr = config.socket_addr().map_err(ServerError::Config)?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Detection server listening on ws://{} (detector: {})",
            local_addr,
            detector.name()
        );
        Ok(Self {
            listener,
            router: router(detector, config.max_message_size),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve(self) -> Result<(), ServerError> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;
        info!("Detection server on {} stopped", self.local_addr);
        Ok(())
    }
}
