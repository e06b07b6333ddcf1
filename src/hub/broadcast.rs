//! Fan-out of server messages to connected clients

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::ws::protocol::ServerMsg;

use super::ConnectionId;

/// Queued payloads per connection at which a backlog warning is logged,
/// repeated at every further multiple
pub const BACKLOG_WARN_THRESHOLD: usize = 512;

/// Outbound queue of one connection; its writer task drains it to the socket
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<String>,
    backlog: Arc<AtomicUsize>,
}

/// Writer side of an [`Outbound`] queue
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<String>,
    backlog: Arc<AtomicUsize>,
}

/// Create a connection's outbound queue
pub fn outbound_channel() -> (Outbound, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let backlog = Arc::new(AtomicUsize::new(0));
    (
        Outbound {
            tx,
            backlog: backlog.clone(),
        },
        OutboundReceiver { rx, backlog },
    )
}

impl Outbound {
    /// Queue a payload, returning the queue depth including it
    fn push(&self, payload: String) -> Result<usize, mpsc::error::SendError<String>> {
        // counted before the send so the receiver never sees an uncounted payload
        let depth = self.backlog.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(e) = self.tx.send(payload) {
            self.backlog.fetch_sub(1, Ordering::Relaxed);
            return Err(e);
        }
        Ok(depth)
    }

    /// Payloads queued but not yet taken by the writer
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::Relaxed)
    }
}

impl OutboundReceiver {
    pub async fn recv(&mut self) -> Option<String> {
        let payload = self.rx.recv().await?;
        self.backlog.fetch_sub(1, Ordering::Relaxed);
        Some(payload)
    }

    pub fn try_recv(&mut self) -> Result<String, mpsc::error::TryRecvError> {
        let payload = self.rx.try_recv()?;
        self.backlog.fetch_sub(1, Ordering::Relaxed);
        Ok(payload)
    }
}

fn backlog_warning_due(depth: usize) -> bool {
    depth >= BACKLOG_WARN_THRESHOLD && depth % BACKLOG_WARN_THRESHOLD == 0
}

/// Outbound channels of every attached connection
#[derive(Default)]
pub struct Broadcaster {
    connections: HashMap<ConnectionId, Outbound>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, connection_id: ConnectionId, outbound: Outbound) {
        self.connections.insert(connection_id, outbound);
    }

    /// Drop a connection's channel, which also ends its writer task
    pub fn detach(&mut self, connection_id: &ConnectionId) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Send to a single connection
    pub fn send_to(&self, connection_id: &ConnectionId, msg: &ServerMsg) -> bool {
        let Some(outbound) = self.connections.get(connection_id) else {
            return false;
        };
        let Some(payload) = encode(msg) else {
            return false;
        };

        deliver(connection_id, outbound, payload)
    }

    /// Serialize once and send the same payload to every connection.
    /// Returns how many connections accepted it.
    pub fn broadcast_all(&self, msg: &ServerMsg) -> usize {
        let Some(payload) = encode(msg) else {
            return 0;
        };

        let mut delivered = 0;
        for (connection_id, outbound) in &self.connections {
            if deliver(connection_id, outbound, payload.clone()) {
                delivered += 1;
            }
        }
        delivered
    }
}

fn deliver(connection_id: &ConnectionId, outbound: &Outbound, payload: String) -> bool {
    match outbound.push(payload) {
        Ok(backlog) => {
            if backlog_warning_due(backlog) {
                warn!(connection_id = %connection_id, backlog, "Outbound queue backing up");
            }
            true
        }
        Err(_) => {
            debug!(connection_id = %connection_id, "Outbound channel closed, message dropped");
            false
        }
    }
}

fn encode(msg: &ServerMsg) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json),
        Err(e) => {
            error!(error = %e, "Failed to serialize server message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::ChatMessage;
    use uuid::Uuid;

    fn chat() -> ServerMsg {
        ServerMsg::ChatMessage(ChatMessage {
            player: "Player7".to_string(),
            message: "hi".to_string(),
            timestamp: "1:00:00 PM".to_string(),
        })
    }

    #[test]
    fn broadcast_reaches_everyone_with_identical_payload() {
        let mut broadcaster = Broadcaster::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = outbound_channel();
            broadcaster.attach(Uuid::new_v4(), tx);
            receivers.push(rx);
        }

        assert_eq!(broadcaster.broadcast_all(&chat()), 3);

        let payloads: Vec<String> = receivers
            .iter_mut()
            .map(|rx| rx.try_recv().unwrap())
            .collect();
        assert!(payloads.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn closed_receivers_are_skipped() {
        let mut broadcaster = Broadcaster::new();
        let (live_tx, mut live_rx) = outbound_channel();
        let (dead_tx, dead_rx) = outbound_channel();
        broadcaster.attach(Uuid::new_v4(), live_tx);
        broadcaster.attach(Uuid::new_v4(), dead_tx);
        drop(dead_rx);

        assert_eq!(broadcaster.broadcast_all(&chat()), 1);
        assert!(live_rx.try_recv().is_ok());
    }

    #[test]
    fn send_to_targets_one_connection() {
        let mut broadcaster = Broadcaster::new();
        let a = Uuid::new_v4();
        let (a_tx, mut a_rx) = outbound_channel();
        let (b_tx, mut b_rx) = outbound_channel();
        broadcaster.attach(a, a_tx);
        broadcaster.attach(Uuid::new_v4(), b_tx);

        assert!(broadcaster.send_to(&a, &chat()));
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_err());
        assert!(!broadcaster.send_to(&Uuid::new_v4(), &chat()));
    }

    #[test]
    fn detach_closes_the_channel() {
        let mut broadcaster = Broadcaster::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = outbound_channel();
        broadcaster.attach(id, tx);

        assert!(broadcaster.detach(&id));
        assert!(!broadcaster.detach(&id));
        assert_eq!(broadcaster.len(), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn backlog_rises_on_send_and_falls_on_receive() {
        let mut broadcaster = Broadcaster::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = outbound_channel();
        let observer = tx.clone();
        broadcaster.attach(id, tx);

        for _ in 0..3 {
            assert!(broadcaster.send_to(&id, &chat()));
        }
        assert_eq!(observer.backlog(), 3);

        rx.try_recv().unwrap();
        assert_eq!(observer.backlog(), 2);
        rx.try_recv().unwrap();
        rx.try_recv().unwrap();
        assert_eq!(observer.backlog(), 0);
    }

    #[test]
    fn send_to_closed_queue_does_not_count_as_backlog() {
        let (tx, rx) = outbound_channel();
        drop(rx);
        assert!(tx.push("x".to_string()).is_err());
        assert_eq!(tx.backlog(), 0);
    }

    #[test]
    fn backlog_warning_fires_at_each_threshold_multiple() {
        assert!(!backlog_warning_due(1));
        assert!(!backlog_warning_due(BACKLOG_WARN_THRESHOLD - 1));
        assert!(backlog_warning_due(BACKLOG_WARN_THRESHOLD));
        assert!(!backlog_warning_due(BACKLOG_WARN_THRESHOLD + 1));
        assert!(backlog_warning_due(BACKLOG_WARN_THRESHOLD * 3));
    }

    #[tokio::test]
    async fn slow_writer_backlog_crosses_threshold() {
        let mut broadcaster = Broadcaster::new();
        let id = Uuid::new_v4();
        let (tx, mut rx) = outbound_channel();
        let observer = tx.clone();
        broadcaster.attach(id, tx);

        for _ in 0..BACKLOG_WARN_THRESHOLD {
            broadcaster.broadcast_all(&chat());
        }
        assert_eq!(observer.backlog(), BACKLOG_WARN_THRESHOLD);

        // draining restores a zero backlog and preserves every payload
        for _ in 0..BACKLOG_WARN_THRESHOLD {
            assert!(rx.recv().await.is_some());
        }
        assert_eq!(observer.backlog(), 0);
    }
}
