//! Outbound delivery seam
//!
//! Handlers never touch sockets; they hand encoded payloads to a
//! [`ConnectionSink`] keyed by connection id. The tokio transport registers
//! a channel per connection; tests swap in a recording sink.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::registry::servers::ConnId;

/// Delivery of an encoded payload to one connection.
pub trait ConnectionSink: Send + Sync {
    /// Returns false when the connection is gone. Callers treat a failed
    /// send as a no-op, never as an error.
    fn send(&self, conn: ConnId, bytes: Vec<u8>) -> bool;
}

/// [`ConnectionSink`] over per-connection mpsc senders, one writer task per
/// connection on the other end.
pub struct ChannelSink {
    senders: RwLock<HashMap<ConnId, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl ChannelSink {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, conn: ConnId, sender: mpsc::UnboundedSender<Vec<u8>>) {
        self.senders.write().insert(conn, sender);
    }

    pub fn unregister(&self, conn: ConnId) {
        self.senders.write().remove(&conn);
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSink for ChannelSink {
    fn send(&self, conn: ConnId, bytes: Vec<u8>) -> bool {
        match self.senders.read().get(&conn) {
            Some(sender) => sender.send(bytes).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_registered_connection() {
        let sink = ChannelSink::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        sink.register(1, tx);

        assert!(sink.send(1, vec![1, 2, 3]));
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_send_to_missing_connection_fails_quietly() {
        let sink = ChannelSink::new();
        assert!(!sink.send(42, vec![1]));
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let sink = ChannelSink::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        sink.register(1, tx);
        sink.unregister(1);
        assert!(!sink.send(1, vec![1]));
    }
}
