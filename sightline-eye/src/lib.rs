//! sightline-eye: frame streaming client for sightline
//!
//! Captures frames from a camera or a rendered viewpoint, streams them as JPEG
//! over a WebSocket to a detection server, and keeps the latest detections
//! available for an overlay. In rendered-view mode each detection is projected
//! back into the scene.

pub mod camera;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod overlay;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod scene;
pub mod transport;

pub use camera::{CameraDevice, CameraFacing, CameraInfo, DeviceCameraSource, SyntheticCamera};
pub use config::{CaptureMode, ClientConfig, Platform};
pub use encoder::FrameEncoder;
pub use error::EyeError;
pub use frame::{FrameSource, RawFrame};
pub use interpreter::{DetectionStore, InterpreterStats, MessageOutcome, ResponseInterpreter};
pub use overlay::{OverlayBox, OverlayView};
pub use pipeline::{CapturePipeline, PipelineStats, TickReport};
pub use projection::{Projector, SharedViewpoint, Viewpoint, Viewport};
pub use render::RenderedViewSource;
pub use scene::{Collider, Ray, RayHit, Raycast, Scene};
pub use transport::websocket::WebSocketClient;
pub use transport::{ConnectionState, LifecycleEvent, StateWatch, Transport};
