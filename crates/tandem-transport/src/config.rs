//! Connection and listener configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The fixed well-known service port.
pub const DEFAULT_PORT: u16 = 5555;

/// Upper bound on the announced length of a variable-length message.
///
/// A peer announcing more than this has its connection failed instead of
/// having the receiver allocate the announced amount.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1 << 20;

/// Settings for the client side of connection establishment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long the datagram client waits for the port reply before
    /// re-sending its probe.
    pub handshake_timeout: Duration,

    /// How many probes the datagram client sends before giving up.
    pub handshake_attempts: u32,

    /// Largest variable-length message the connection will accept.
    pub max_message_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(1),
            handshake_attempts: 5,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

/// Settings for the server's listening socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// How long a datagram peer's assigned port is remembered. A repeated
    /// probe from the same peer within this window gets the same port back
    /// instead of a second logical connection.
    pub handshake_window: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            handshake_window: Duration::from_secs(5),
        }
    }
}
