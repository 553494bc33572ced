//! The client side: a connection that actively establishes itself.

use std::net::SocketAddrV4;
use std::ops::{Deref, DerefMut};

use crate::{ClientConfig, Connection, Transport, TransportError};

/// A [`Connection`] to a known server address.
///
/// `Client` dereferences to its connection, so every connection method
/// (and every extension trait on it) is available directly.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), tandem_transport::TransportError> {
/// use tandem_transport::{Client, ClientConfig, Stream};
///
/// let client = Client::<Stream>::connect(
///     "127.0.0.1:5555".parse().unwrap(),
///     &ClientConfig::default(),
/// )
/// .await?;
/// assert!(!client.is_dead());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<T: Transport> {
    conn: Connection<T>,
}

impl<T: Transport> Client<T> {
    /// Establishes a logical connection to `server`.
    ///
    /// For the stream transport this is a plain connect. For the datagram
    /// transport it runs the port-negotiation handshake, re-sending the
    /// probe as configured.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if no connection could be established.
    /// A failed handshake never yields a half-built client.
    pub async fn connect(
        server: SocketAddrV4,
        config: &ClientConfig,
    ) -> Result<Self, TransportError> {
        let pending = T::connect(server, config).await?;
        let mut conn = pending.into_connection::<T>();
        conn.set_max_message_len(config.max_message_len);
        tracing::info!(%server, transport = %T::KIND, "connected to server");
        Ok(Self { conn })
    }

    /// Unwraps the client into its connection.
    pub fn into_connection(self) -> Connection<T> {
        self.conn
    }
}

impl<T: Transport> Deref for Client<T> {
    type Target = Connection<T>;

    fn deref(&self) -> &Connection<T> {
        &self.conn
    }
}

impl<T: Transport> DerefMut for Client<T> {
    fn deref_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }
}
