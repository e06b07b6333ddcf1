//! Connection registry: the authoritative map of connected players

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bounds::{WorldBounds, PLAYABLE_BOUNDS};
use super::HubError;

/// Identifier of one WebSocket connection, and of the player it carries
pub type ConnectionId = Uuid;

/// Full player state keyed by connection, as broadcast to clients
pub type PlayerMap = BTreeMap<ConnectionId, PlayerRecord>;

/// One player per active connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: ConnectionId,
    pub x: f64,
    pub y: f64,
    pub name: String,
}

/// Registry of all connected players (owned by the hub task)
pub struct PlayerRegistry {
    players: PlayerMap,
    bounds: WorldBounds,
    rng: ChaCha8Rng,
}

impl PlayerRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            players: PlayerMap::new(),
            bounds: PLAYABLE_BOUNDS,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create the record for a newly connected client
    pub fn on_connect(&mut self, connection_id: ConnectionId) -> Result<PlayerRecord, HubError> {
        if self.players.contains_key(&connection_id) {
            return Err(HubError::DuplicateConnection(connection_id));
        }

        let (x, y) = self.bounds.spawn_position(&mut self.rng);
        let record = PlayerRecord {
            id: connection_id,
            x,
            y,
            name: format!("Player{}", self.rng.gen_range(0..1000)),
        };

        self.players.insert(connection_id, record.clone());
        Ok(record)
    }

    /// Remove a player. Absent ids are not an error: the removal may
    /// already have happened.
    pub fn on_disconnect(&mut self, connection_id: &ConnectionId) -> Option<PlayerRecord> {
        self.players.remove(connection_id)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&PlayerRecord> {
        self.players.get(connection_id)
    }

    /// Apply a client-claimed position, clamped into bounds.
    ///
    /// Returns `None` without touching anything when the id is unknown or the
    /// position cannot be clamped.
    pub fn apply_move(&mut self, connection_id: &ConnectionId, x: f64, y: f64) -> Option<&PlayerRecord> {
        let (x, y) = self.bounds.clamp(x, y)?;
        let record = self.players.get_mut(connection_id)?;
        record.x = x;
        record.y = y;
        debug_assert!(self.bounds.contains(record.x, record.y));
        Some(record)
    }

    pub fn snapshot(&self) -> PlayerMap {
        self.players.clone()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
