use tokio::sync::mpsc;
use tracing::warn;

use super::messages::CaptureEvent;

/// Host-side event boundary.
///
/// The adapter holds one sink and emits every event through it, in order.
/// Hosts plug in whatever delivery they need; `ChannelSink` covers the
/// common case of draining an in-process channel.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: CaptureEvent);
}

/// Sink that forwards events into an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

impl ChannelSink {
    /// Create the sink together with the receiver the host drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: CaptureEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event receiver dropped; event discarded");
        }
    }
}
