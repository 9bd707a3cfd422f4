use gatebridge_data::HostMessage;
use tokio::sync::mpsc;

/// Outbound channel to the host.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<HostMessage>,
}

impl Outbox {
    pub fn new(tx: mpsc::UnboundedSender<HostMessage>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Sends a message; a host that has gone away only costs a warning.
    pub fn send(&self, message: HostMessage) {
        tracing::trace!(kind = message.kind(), "outbound");
        if self.tx.send(message).is_err() {
            tracing::warn!("host channel closed, dropping outbound message");
        }
    }
}
