//! sightline-core: wire protocol shared by the sightline client and server
//!
//! The client streams JPEG frames as binary WebSocket messages and receives
//! one JSON [`ServerResponse`] per frame. Both ends use the types here so the
//! field names (`className`, `inference_time`, ...) live in one place.

pub mod error;
pub mod protocol;

pub use error::{Error, Result};
pub use protocol::{Detection, ServerResponse, WorldPoint, STATUS_ERROR, STATUS_SUCCESS};
