//! WebSocket transport: upgrade handling and wire protocol

pub mod handler;
pub mod protocol;

pub use handler::ws_handler;
