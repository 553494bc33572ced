//! Error types for the transport layer.

use std::net::SocketAddrV4;

/// Errors that can occur while binding, accepting, or establishing
/// connections.
///
/// A `TransportError` always means no [`Connection`](crate::Connection)
/// was produced. Failures on an existing connection are reported as
/// [`ConnectionError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind to {addr} failed: {source}")]
    BindFailed {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a peer failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to the server failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },

    /// The datagram port negotiation did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The peer is not reachable over IPv4.
    #[error("unsupported peer address: {0}")]
    UnsupportedAddress(std::net::SocketAddr),
}

/// Errors from a single send or receive on a [`Connection`](crate::Connection).
///
/// Only [`ConnectionError::Transient`] leaves the connection usable.
/// Every other variant means the connection is dead from now on.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection was already dead. The socket was not touched.
    #[error("connection is dead")]
    Dead,

    /// The OS reported a retry-eligible condition.
    #[error("transient I/O failure: {0}")]
    Transient(#[source] std::io::Error),

    /// The OS reported a terminal condition; the connection is now dead.
    #[error("connection lost: {0}")]
    Terminal(#[source] std::io::Error),

    /// Fewer bytes arrived than the frame requires; the connection is now dead.
    #[error("framing failure: {0}")]
    Framing(String),
}

impl ConnectionError {
    /// Returns `true` if the operation may be retried on the same connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
