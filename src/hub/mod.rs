//! Hub state synchronization: registry, position updates, broadcast and chat

pub mod bounds;
pub mod broadcast;
pub mod chat;
pub mod registry;
pub mod service;

pub use broadcast::{outbound_channel, OutboundReceiver};
pub use registry::{ConnectionId, PlayerMap, PlayerRecord};
pub use service::{HubHandle, HubService};

/// Hub errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    #[error("Hub is not running")]
    Closed,
}
