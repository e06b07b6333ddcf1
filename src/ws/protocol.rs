//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON text of the form `{"type": <event>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::hub::{PlayerMap, PlayerRecord};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMsg {
    /// Claimed absolute position of the sender's avatar
    #[serde(rename = "move")]
    Move { x: f64, y: f64 },

    /// Raw chat line typed by the sender
    #[serde(rename = "chat message")]
    ChatMessage(String),
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMsg {
    /// The record created for this connection, sent once right after connect
    #[serde(rename = "currentPlayer")]
    CurrentPlayer(PlayerRecord),

    /// Every connected player, sent to all after any registry change
    #[serde(rename = "playersUpdate")]
    PlayersUpdate(PlayerMap),

    /// Relayed chat line
    #[serde(rename = "chat message")]
    ChatMessage(ChatMessage),
}

/// Chat line as relayed to every client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub player: String,
    pub message: String,
    pub timestamp: String,
}
