//! Error types surfaced by the server runtime.

use crate::config::ConfigError;
use crate::session::ConnectionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or query the listening socket.
    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Unparsable frame or unknown message type.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] serde_json::Error),

    /// WebSocket handshake, read or write failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection's outbound queue is gone.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),
}
