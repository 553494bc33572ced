//! Transport abstraction layer for Tandem.
//!
//! Provides one [`Connection`] type that works the same over a reliable
//! byte stream ([`Stream`], TCP) and over unreliable datagrams
//! ([`Datagram`], UDP). The difference between the two lives entirely in
//! the [`Transport`] policy trait:
//!
//! - how a listening socket is bound and how peers are accepted,
//! - how a client establishes a logical connection,
//! - how a single raw send or receive is performed.
//!
//! The datagram policy simulates per-client connections with a small
//! port-negotiation handshake, so both transports expose identical
//! send/receive/liveness semantics to the layers above.

#![allow(async_fn_in_trait)]

mod client;
mod config;
mod connection;
mod datagram;
mod error;
mod outcome;
mod stream;

pub use client::Client;
pub use config::{ClientConfig, ListenerConfig, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_PORT};
pub use connection::{Connection, PendingClient};
pub use datagram::{Datagram, DatagramListener, DATAGRAM_CHUNK_SIZE};
pub use error::{ConnectionError, TransportError};
pub use outcome::{is_transient, IoOutcome};
pub use stream::Stream;

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};

use serde::{Deserialize, Serialize};

/// Stable identifier for one logical connection within a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Creates a new `ClientId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Which transport a policy implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Reliable, ordered byte stream (TCP).
    Stream,
    /// Unreliable, size-limited datagrams (UDP).
    Datagram,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Datagram => write!(f, "datagram"),
        }
    }
}

/// The transport-specific primitives a [`Connection`] is built from.
///
/// Implemented once per transport. Everything generic over `Transport`
/// (connections, clients, the registry, the server) picks its behavior
/// from this trait at compile time, so a connection's transport can never
/// change during its lifetime.
pub trait Transport: Send + Sync + Sized + 'static {
    /// The per-connection socket owned by a [`Connection`].
    type Socket: Send + 'static;
    /// The server-side socket that new peers arrive on.
    type Listener: Send + 'static;

    /// Tag for logging and configuration.
    const KIND: TransportKind;

    /// Largest payload sent in one raw operation when streaming a
    /// variable-length message. `None` means the whole payload goes out
    /// in one write.
    const CHUNK_SIZE: Option<usize>;

    /// Binds the well-known listening socket.
    async fn bind(
        addr: SocketAddrV4,
        config: &ListenerConfig,
    ) -> Result<Self::Listener, TransportError>;

    /// Returns the address the listener is bound to.
    fn listener_addr(listener: &Self::Listener) -> io::Result<SocketAddr>;

    /// Waits for the next peer and completes the server half of
    /// connection establishment.
    ///
    /// The returned future is `Send` so the accept loop can run on a
    /// spawned task.
    fn accept(
        listener: &mut Self::Listener,
    ) -> impl Future<Output = Result<PendingClient<Self::Socket>, TransportError>> + Send;

    /// Completes the client half of connection establishment.
    async fn connect(
        server: SocketAddrV4,
        config: &ClientConfig,
    ) -> Result<PendingClient<Self::Socket>, TransportError>;

    /// Sends all of `buf` to the socket's peer.
    async fn raw_send(socket: &mut Self::Socket, buf: &[u8]) -> IoOutcome;

    /// Receives exactly `buf.len()` bytes from the socket's peer.
    ///
    /// A `Done(n)` with `n != buf.len()` means the peer delivered a frame
    /// of the wrong size. Implementations report an oversized datagram as
    /// `n > buf.len()` rather than truncating it silently.
    async fn raw_receive(socket: &mut Self::Socket, buf: &mut [u8]) -> IoOutcome;

    /// Returns the socket's local address.
    fn local_addr(socket: &Self::Socket) -> io::Result<SocketAddr>;
}

/// Narrows an OS address to the IPv4 form the wire format carries.
pub(crate) fn expect_v4(addr: SocketAddr) -> Result<SocketAddrV4, TransportError> {
    match addr {
        SocketAddr::V4(v4) => Ok(v4),
        other => Err(TransportError::UnsupportedAddress(other)),
    }
}
