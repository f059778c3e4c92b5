//! Host tick loop tying capture, encoding, transport and interpretation together

use crate::config::{CaptureMode, ClientConfig};
use crate::encoder::FrameEncoder;
use crate::frame::{FrameSource, RawFrame};
use crate::interpreter::{DetectionStore, InterpreterStats, MessageOutcome, ResponseInterpreter};
use crate::overlay::OverlayView;
use crate::transport::{ConnectionState, StateWatch, Transport};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Inbound messages handed to the interpreter.
    pub dispatched: usize,
    /// Of those, how many replaced the detection list.
    pub applied: usize,
    /// A frame was handed to the transport.
    pub sent: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub ticks: u64,
    pub frames_sent: u64,
    pub frames_missing: u64,
    pub encode_failures: u64,
    pub send_failures: u64,
}

/// The client pipeline. All methods run on the caller's task.
pub struct CapturePipeline<T: Transport> {
    config: ClientConfig,
    mode: CaptureMode,
    source: Box<dyn FrameSource>,
    encoder: FrameEncoder,
    transport: T,
    interpreter: ResponseInterpreter,
    last_send: Option<Instant>,
    preview: Option<RawFrame>,
    stats: PipelineStats,
}

impl<T: Transport> CapturePipeline<T> {
    pub fn new(
        config: ClientConfig,
        source: Box<dyn FrameSource>,
        transport: T,
        interpreter: ResponseInterpreter,
    ) -> Self {
        let mode = config.capture_mode();
        let encoder = FrameEncoder::new(config.jpeg_quality);
        Self {
            config,
            mode,
            source,
            encoder,
            transport,
            interpreter,
            last_send: None,
            preview: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn detections(&self) -> &DetectionStore {
        self.interpreter.store()
    }

    pub fn interpreter_stats(&self) -> Arc<InterpreterStats> {
        self.interpreter.stats()
    }

    pub fn state_watch(&self) -> StateWatch {
        self.transport.state_watch()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    /// Open the connection. A failure is logged and the pipeline keeps ticking
    /// in the `Disconnected` state.
    pub async fn start(&mut self) {
        info!(
            "Starting {:?} pipeline with {} -> {}",
            self.mode,
            self.source.describe(),
            self.config.server_url()
        );
        if let Err(e) = self.transport.connect().await {
            error!("Failed to connect to {}: {}", self.config.server_url(), e);
        }
    }

    /// One host tick.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        self.stats.ticks += 1;

        for message in self.transport.dispatch_message_queue() {
            report.dispatched += 1;
            if let MessageOutcome::Applied { .. } = self.interpreter.on_message(&message) {
                report.applied += 1;
            }
        }

        if self.transport.state() != ConnectionState::Connected || !self.send_due(now) {
            return report;
        }

        let Some(frame) = self.source.capture() else {
            self.stats.frames_missing += 1;
            return report;
        };

        let payload = match self.encoder.encode(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Skipping frame: {}", e);
                self.stats.encode_failures += 1;
                return report;
            }
        };

        if self.mode == CaptureMode::DeviceCamera {
            self.preview = Some(frame);
        }

        match self.transport.send(payload) {
            Ok(()) => {
                self.last_send = Some(now);
                self.stats.frames_sent += 1;
                report.sent = true;
            }
            Err(e) => {
                debug!("Frame dropped: {}", e);
                self.stats.send_failures += 1;
            }
        }

        report
    }

    fn send_due(&self, now: Instant) -> bool {
        match self.last_send {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.config.send_interval(),
        }
    }

    /// Read-only view for presentation.
    pub fn overlay(&self) -> OverlayView {
        OverlayView::new(
            self.transport.state(),
            self.mode,
            self.interpreter.store().snapshot(),
            self.preview.as_ref().map(RawFrame::shared_image),
        )
    }

    /// Close the connection if one is open, then release the frame source.
    pub async fn shutdown(&mut self) {
        if self.transport.state() != ConnectionState::Disconnected {
            if let Err(e) = self.transport.close().await {
                warn!("Error closing connection: {}", e);
            }
        }
        self.source.release();
        info!(
            "Pipeline stopped after {} ticks, {} frames sent",
            self.stats.ticks, self.stats.frames_sent
        );
    }

    /// Connect, tick at `tickRate` until `shutdown` resolves, then tear down.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start().await;

        let period = self.config.tick_period().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                instant = ticker.tick() => {
                    self.tick(instant.into_std());
                }
            }
        }

        self.shutdown().await;
    }
}
