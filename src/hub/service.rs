//! Hub service - single task owning the registry and processing events in order

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::util::time::chat_timestamp;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::broadcast::{Broadcaster, Outbound};
use super::chat::build_chat;
use super::registry::{ConnectionId, PlayerMap, PlayerRecord, PlayerRegistry};
use super::HubError;

/// Capacity of the inbound event queue
pub const EVENT_BUFFER: usize = 256;

/// Events processed by the hub, one at a time
#[derive(Debug)]
pub enum HubEvent {
    Connect {
        connection_id: ConnectionId,
        outbound: Outbound,
        reply: oneshot::Sender<Result<PlayerRecord, HubError>>,
    },
    Move {
        connection_id: ConnectionId,
        x: f64,
        y: f64,
    },
    Chat {
        connection_id: ConnectionId,
        message: String,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    /// Read-only view of the registry
    Snapshot {
        reply: oneshot::Sender<PlayerMap>,
    },
}

/// Cloneable handle for talking to the hub task
#[derive(Clone)]
pub struct HubHandle {
    event_tx: mpsc::Sender<HubEvent>,
    player_count: Arc<AtomicUsize>,
}

impl HubHandle {
    /// Register a connection. Its `currentPlayer` and the following
    /// `playersUpdate` are queued on `outbound` before this returns.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        outbound: Outbound,
    ) -> Result<PlayerRecord, HubError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(HubEvent::Connect {
            connection_id,
            outbound,
            reply,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::Closed)?
    }

    /// Forward a parsed client message from `connection_id`
    pub async fn client_message(
        &self,
        connection_id: ConnectionId,
        msg: ClientMsg,
    ) -> Result<(), HubError> {
        let event = match msg {
            ClientMsg::Move { x, y } => HubEvent::Move { connection_id, x, y },
            ClientMsg::ChatMessage(message) => HubEvent::Chat {
                connection_id,
                message,
            },
        };
        self.send(event).await
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), HubError> {
        self.send(HubEvent::Disconnect { connection_id }).await
    }

    pub async fn snapshot(&self) -> Result<PlayerMap, HubError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(HubEvent::Snapshot { reply }).await?;
        reply_rx.await.map_err(|_| HubError::Closed)
    }

    /// Players currently registered, as of the last processed event
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.event_tx.send(event).await.map_err(|_| HubError::Closed)
    }
}

/// The authoritative hub (owned by its task)
pub struct HubService {
    registry: PlayerRegistry,
    broadcaster: Broadcaster,
    event_rx: mpsc::Receiver<HubEvent>,
    player_count: Arc<AtomicUsize>,
}

impl HubService {
    pub fn new(seed: u64) -> (Self, HubHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = HubHandle {
            event_tx,
            player_count: player_count.clone(),
        };

        let service = Self {
            registry: PlayerRegistry::new(seed),
            broadcaster: Broadcaster::new(),
            event_rx,
            player_count,
        };

        (service, handle)
    }

    /// Process events until every handle is dropped
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(event) = self.event_rx.recv().await {
            self.handle_event(event);
        }

        if !self.registry.is_empty() {
            warn!(player_count = self.registry.len(), "Hub stopped with players still registered");
        }
        info!("Hub stopped");
    }

    fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connect {
                connection_id,
                outbound,
                reply,
            } => self.handle_connect(connection_id, outbound, reply),
            HubEvent::Move { connection_id, x, y } => self.handle_move(connection_id, x, y),
            HubEvent::Chat {
                connection_id,
                message,
            } => self.handle_chat(connection_id, &message),
            HubEvent::Disconnect { connection_id } => self.handle_disconnect(connection_id),
            HubEvent::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    fn handle_connect(
        &mut self,
        connection_id: ConnectionId,
        outbound: Outbound,
        reply: oneshot::Sender<Result<PlayerRecord, HubError>>,
    ) {
        let record = match self.registry.on_connect(connection_id) {
            Ok(record) => record,
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "Rejected connection");
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.broadcaster.attach(connection_id, outbound);
        self.broadcaster
            .send_to(&connection_id, &ServerMsg::CurrentPlayer(record.clone()));
        self.sync_player_count();

        info!(
            connection_id = %connection_id,
            name = %record.name,
            x = record.x,
            y = record.y,
            player_count = self.registry.len(),
            connections = self.broadcaster.len(),
            "Player joined hub"
        );

        self.broadcast_players();

        if reply.send(Ok(record)).is_err() {
            // Connection went away before it saw its record
            warn!(connection_id = %connection_id, "Connect caller gone, removing player");
            self.handle_disconnect(connection_id);
        }
    }

    fn handle_move(&mut self, connection_id: ConnectionId, x: f64, y: f64) {
        match self.registry.apply_move(&connection_id, x, y) {
            Some(record) => {
                debug!(connection_id = %connection_id, x = record.x, y = record.y, "Player moved");
                self.broadcast_players();
            }
            None => {
                debug!(connection_id = %connection_id, x, y, "Dropped move");
            }
        }
    }

    fn handle_chat(&mut self, connection_id: ConnectionId, raw: &str) {
        let Some(sender) = self.registry.get(&connection_id) else {
            debug!(connection_id = %connection_id, "Dropped chat from unregistered connection");
            return;
        };
        let Some(chat) = build_chat(&sender.name, raw, chat_timestamp()) else {
            debug!(connection_id = %connection_id, "Dropped blank chat message");
            return;
        };

        let delivered = self.broadcaster.broadcast_all(&ServerMsg::ChatMessage(chat));
        debug!(connection_id = %connection_id, delivered, "Relayed chat message");
    }

    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        self.broadcaster.detach(&connection_id);

        match self.registry.on_disconnect(&connection_id) {
            Some(record) => {
                self.sync_player_count();
                info!(
                    connection_id = %connection_id,
                    name = %record.name,
                    player_count = self.registry.len(),
                    "Player left hub"
                );
                self.broadcast_players();
            }
            None => {
                debug!(connection_id = %connection_id, "Disconnect for unknown connection");
            }
        }
    }

    fn broadcast_players(&self) {
        let delivered = self
            .broadcaster
            .broadcast_all(&ServerMsg::PlayersUpdate(self.registry.snapshot()));
        debug!(delivered, player_count = self.registry.len(), "Broadcast players update");
    }

    fn sync_player_count(&self) {
        self.player_count
            .store(self.registry.len(), Ordering::Relaxed);
    }
}
