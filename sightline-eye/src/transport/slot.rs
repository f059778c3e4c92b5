use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Outbound buffer of capacity one. A newer frame replaces an unsent one.
#[derive(Debug, Default)]
pub struct OutboundSlot {
    pending: Mutex<Option<Bytes>>,
    notify: Notify,
}

impl OutboundSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payload` and wake the writer. Returns true if an older unsent
    /// payload was dropped to make room.
    pub fn put(&self, payload: Bytes) -> bool {
        let replaced = self.pending.lock().replace(payload).is_some();
        self.notify.notify_one();
        replaced
    }

    pub fn take(&self) -> Option<Bytes> {
        self.pending.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_none()
    }

    pub async fn notified(&self) {
        self.notify.notified().await
    }
}
