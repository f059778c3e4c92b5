//! Response interpreter and the shared detection store

use crate::projection::Projector;
use parking_lot::RwLock;
use sightline_core::{Detection, ServerResponse};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Latest accepted detection list.
///
/// Each update publishes a brand new list, so a reader holding a snapshot
/// never sees a half-replaced collection.
#[derive(Debug, Clone, Default)]
pub struct DetectionStore {
    current: Arc<RwLock<Arc<Vec<Detection>>>>,
}

impl DetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Detection>> {
        Arc::clone(&self.current.read())
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    pub(crate) fn publish(&self, detections: Vec<Detection>) {
        *self.current.write() = Arc::new(detections);
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Detections replaced the shared list.
    Applied { count: usize, inference_time: f64 },
    /// Parsed, but the status was not `"success"`.
    Rejected { status: String, message: Option<String> },
    /// Not UTF-8 or not valid JSON. Dropped.
    Malformed,
}

#[derive(Debug, Default)]
pub struct InterpreterStats {
    applied: AtomicU64,
    rejected: AtomicU64,
    malformed: AtomicU64,
}

impl InterpreterStats {
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Turns server replies into the shared detection list.
pub struct ResponseInterpreter {
    store: DetectionStore,
    projector: Option<Projector>,
    stats: Arc<InterpreterStats>,
}

impl ResponseInterpreter {
    pub fn new(store: DetectionStore) -> Self {
        Self {
            store,
            projector: None,
            stats: Arc::new(InterpreterStats::default()),
        }
    }

    /// Resolve world positions for every accepted list (rendered-view mode).
    pub fn with_projector(mut self, projector: Projector) -> Self {
        self.projector = Some(projector);
        self
    }

    pub fn store(&self) -> &DetectionStore {
        &self.store
    }

    pub fn stats(&self) -> Arc<InterpreterStats> {
        Arc::clone(&self.stats)
    }

    /// Handle one complete inbound message.
    ///
    /// Failures are logged once and never touch the store.
    pub fn on_message(&self, raw: &[u8]) -> MessageOutcome {
        let response = match ServerResponse::from_slice(raw) {
            Ok(response) => response,
            Err(e) => {
                warn!("Dropping unreadable server message ({} bytes): {}", raw.len(), e);
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                return MessageOutcome::Malformed;
            }
        };

        if !response.is_success() {
            debug!(
                "Server reported status {:?}: {}",
                response.status,
                response.message.as_deref().unwrap_or("no message")
            );
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return MessageOutcome::Rejected {
                status: response.status,
                message: response.message,
            };
        }

        let mut detections = response.detections;
        if let Some(projector) = &self.projector {
            projector.project(&mut detections);
        }
        let count = detections.len();
        self.store.publish(detections);
        self.stats.applied.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Applied {} detections (server inference {:.3}s)",
            count, response.inference_time
        );

        MessageOutcome::Applied {
            count,
            inference_time: response.inference_time,
        }
    }
}
