//! Push-only channel towards one connected client.

use serde::Serialize;
use tokio::sync::mpsc;

/// An item queued for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A serialized message.
    Message(String),
    /// The server is done with this connection.
    Close,
}

/// Sending half of a client connection.
///
/// Sends never block and never fail loudly: a client that went away simply
/// stops receiving.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Outbound {
    /// Create a connected outbound/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Serialize `message` as JSON and queue it.
    ///
    /// Returns `false` if serialization failed or the client is gone.
    pub fn send_json<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize outbound message");
                false
            }
        }
    }

    /// Queue an already-serialized message.
    pub fn send_text(&self, text: String) -> bool {
        self.tx.send(Outgoing::Message(text)).is_ok()
    }

    /// Ask the connection to close once everything queued so far is delivered.
    pub fn close(&self) {
        let _ = self.tx.send(Outgoing::Close);
    }

    /// Whether the receiving side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
