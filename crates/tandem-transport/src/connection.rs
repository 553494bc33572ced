//! The transport-agnostic connection and its constructor record.

use std::fmt;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};

use crate::{ConnectionError, IoOutcome, Transport, DEFAULT_MAX_MESSAGE_LEN};

/// A freshly established peer that has not been wrapped in a
/// [`Connection`] yet.
///
/// Produced by [`Transport::accept`] on the server and by
/// [`Transport::connect`] on the client. It is consumed exactly once by
/// [`PendingClient::into_connection`], which is the only way to build a
/// `Connection`.
pub struct PendingClient<S> {
    socket: S,
    peer: SocketAddrV4,
}

impl<S> PendingClient<S> {
    /// Pairs an already established socket with its peer address.
    pub fn new(socket: S, peer: SocketAddrV4) -> Self {
        Self { socket, peer }
    }

    /// The address of the remote peer.
    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }

    /// Materializes the connection. The connection takes ownership of the
    /// socket and starts out alive.
    pub fn into_connection<T>(self) -> Connection<T>
    where
        T: Transport<Socket = S>,
    {
        Connection {
            socket: self.socket,
            peer: self.peer,
            dead: false,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl<S> fmt::Debug for PendingClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingClient")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// One logical connection to a peer over transport `T`.
///
/// The connection owns its socket: dropping it closes the socket, and
/// [`Connection::into_socket`] hands the socket back without closing it.
///
/// ## Liveness
///
/// Every raw operation classifies its OS result. Transient conditions
/// (would-block, out-of-memory, interrupted) fail the call but keep the
/// connection alive. Anything else flips the connection to dead, and a
/// dead connection never touches its socket again: every later call
/// returns [`ConnectionError::Dead`] immediately.
pub struct Connection<T: Transport> {
    socket: T::Socket,
    peer: SocketAddrV4,
    dead: bool,
    max_message_len: usize,
}

impl<T: Transport> Connection<T> {
    /// Returns `true` once the connection has failed terminally.
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Marks the connection dead. There is no way back.
    pub fn mark_dead(&mut self) {
        if !self.dead {
            tracing::debug!(peer = %self.peer, transport = %T::KIND, "connection marked dead");
        }
        self.dead = true;
    }

    /// The address of the remote peer.
    ///
    /// For datagram connections this is the peer's dedicated channel, not
    /// the server's well-known port.
    pub fn peer_addr(&self) -> SocketAddrV4 {
        self.peer
    }

    /// The local address of the underlying socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        T::local_addr(&self.socket)
    }

    /// Largest variable-length message this connection accepts.
    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// Changes the variable-length message limit.
    pub fn set_max_message_len(&mut self, max: usize) {
        self.max_message_len = max;
    }

    /// Gives up ownership of the socket without closing it.
    pub fn into_socket(self) -> T::Socket {
        self.socket
    }

    /// Sends all of `buf` in one raw operation.
    ///
    /// An empty buffer is a no-op and never reaches the socket.
    pub async fn send_raw(&mut self, buf: &[u8]) -> Result<(), ConnectionError> {
        if self.dead {
            return Err(ConnectionError::Dead);
        }
        if buf.is_empty() {
            return Ok(());
        }
        let outcome = T::raw_send(&mut self.socket, buf).await;
        self.settle(outcome, buf.len(), "send")
    }

    /// Fills all of `buf` in one raw operation.
    ///
    /// An empty buffer is a no-op and never reaches the socket.
    pub async fn receive_raw(&mut self, buf: &mut [u8]) -> Result<(), ConnectionError> {
        if self.dead {
            return Err(ConnectionError::Dead);
        }
        if buf.is_empty() {
            return Ok(());
        }
        let outcome = T::raw_receive(&mut self.socket, buf).await;
        self.settle(outcome, buf.len(), "receive")
    }

    fn settle(
        &mut self,
        outcome: IoOutcome,
        expected: usize,
        op: &'static str,
    ) -> Result<(), ConnectionError> {
        match outcome {
            IoOutcome::Done(n) if n == expected => {
                tracing::trace!(peer = %self.peer, bytes = n, op, "raw I/O complete");
                Ok(())
            }
            IoOutcome::Done(n) => {
                self.mark_dead();
                Err(ConnectionError::Framing(format!(
                    "{op} moved {n} of {expected} bytes"
                )))
            }
            IoOutcome::Transient(e) => {
                tracing::trace!(peer = %self.peer, error = %e, op, "transient I/O failure");
                Err(ConnectionError::Transient(e))
            }
            IoOutcome::Terminal(e) => {
                tracing::debug!(peer = %self.peer, error = %e, op, "terminal I/O failure");
                self.mark_dead();
                Err(ConnectionError::Terminal(e))
            }
        }
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &T::KIND)
            .field("peer", &self.peer)
            .field("dead", &self.dead)
            .finish_non_exhaustive()
    }
}
