//! Typed values over raw connections.
//!
//! ## Encoding
//!
//! | Type | Bytes on the wire |
//! |---|---|
//! | `u16`, `i16` | 2 bytes, big-endian |
//! | `u32`, `i32` | 4 bytes, big-endian |
//! | `Vec<u8>`, `String` | `u32` length `N`, then `N` payload bytes |
//!
//! Signed integers are sent as the two's-complement bits of the unsigned
//! type of the same width.
//!
//! Every integer is a single raw operation, which on the datagram
//! transport means a single datagram. A variable-length payload goes out
//! in one write on the stream transport, and as `ceil(N / chunk)`
//! datagrams on the datagram transport.

use tandem_transport::{Connection, ConnectionError, Transport};

use crate::{chunk_ranges, ProtocolError};

/// A value that can be sent over and received from a [`Connection`].
pub trait Wire: Sized {
    /// Writes `self` to the connection.
    async fn write<T: Transport>(&self, conn: &mut Connection<T>) -> Result<(), ProtocolError>;

    /// Reads one value from the connection.
    async fn read<T: Transport>(conn: &mut Connection<T>) -> Result<Self, ProtocolError>;
}

macro_rules! impl_wire_for_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Wire for $ty {
                async fn write<T: Transport>(
                    &self,
                    conn: &mut Connection<T>,
                ) -> Result<(), ProtocolError> {
                    conn.send_raw(&self.to_be_bytes()).await?;
                    Ok(())
                }

                async fn read<T: Transport>(
                    conn: &mut Connection<T>,
                ) -> Result<Self, ProtocolError> {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    conn.receive_raw(&mut buf).await?;
                    Ok(<$ty>::from_be_bytes(buf))
                }
            }
        )*
    };
}

impl_wire_for_int!(u16, i16, u32, i32);

impl Wire for Vec<u8> {
    async fn write<T: Transport>(&self, conn: &mut Connection<T>) -> Result<(), ProtocolError> {
        write_bytes(conn, self).await
    }

    async fn read<T: Transport>(conn: &mut Connection<T>) -> Result<Self, ProtocolError> {
        read_bytes(conn).await
    }
}

impl Wire for String {
    async fn write<T: Transport>(&self, conn: &mut Connection<T>) -> Result<(), ProtocolError> {
        write_bytes(conn, self.as_bytes()).await
    }

    async fn read<T: Transport>(conn: &mut Connection<T>) -> Result<Self, ProtocolError> {
        let bytes = read_bytes(conn).await?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// Adds typed `send` / `receive` to every [`Connection`].
///
/// ```rust,ignore
/// use tandem_protocol::ConnectionExt;
///
/// conn.send(&42u32).await?;
/// let name: String = conn.receive().await?;
/// ```
pub trait ConnectionExt {
    /// Sends one value.
    async fn send<W: Wire>(&mut self, value: &W) -> Result<(), ProtocolError>;

    /// Receives one value.
    async fn receive<W: Wire>(&mut self) -> Result<W, ProtocolError>;
}

impl<T: Transport> ConnectionExt for Connection<T> {
    async fn send<W: Wire>(&mut self, value: &W) -> Result<(), ProtocolError> {
        value.write(self).await
    }

    async fn receive<W: Wire>(&mut self) -> Result<W, ProtocolError> {
        W::read(self).await
    }
}

/// Sends a `u32` length prefix followed by the payload.
async fn write_bytes<T: Transport>(
    conn: &mut Connection<T>,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    if conn.is_dead() {
        return Err(ConnectionError::Dead.into());
    }
    let max = conn.max_message_len();
    let len = match u32::try_from(bytes.len()) {
        Ok(len) if bytes.len() <= max => len,
        _ => {
            return Err(ProtocolError::MessageTooLarge {
                len: bytes.len(),
                max,
            });
        }
    };

    len.write(conn).await?;

    match T::CHUNK_SIZE {
        None => conn.send_raw(bytes).await?,
        Some(chunk) => {
            for range in chunk_ranges(bytes.len(), chunk) {
                send_chunk(conn, &bytes[range]).await?;
            }
        }
    }
    Ok(())
}

/// Reads a `u32` length prefix and then exactly that many payload bytes.
async fn read_bytes<T: Transport>(conn: &mut Connection<T>) -> Result<Vec<u8>, ProtocolError> {
    if conn.is_dead() {
        return Err(ConnectionError::Dead.into());
    }
    let len = u32::read(conn).await? as usize;
    let max = conn.max_message_len();
    if len > max {
        tracing::debug!(
            peer = %conn.peer_addr(),
            len,
            max,
            "peer announced an oversized message"
        );
        conn.mark_dead();
        return Err(ProtocolError::MessageTooLarge { len, max });
    }

    let mut buf = vec![0u8; len];
    match T::CHUNK_SIZE {
        None => conn.receive_raw(&mut buf).await?,
        Some(chunk) => {
            for range in chunk_ranges(len, chunk) {
                receive_chunk(conn, &mut buf[range]).await?;
            }
        }
    }
    Ok(buf)
}

/// Sends one chunk, retrying transient failures until it goes out or the
/// connection dies. There is no backoff.
async fn send_chunk<T: Transport>(
    conn: &mut Connection<T>,
    chunk: &[u8],
) -> Result<(), ConnectionError> {
    loop {
        match conn.send_raw(chunk).await {
            Err(ConnectionError::Transient(e)) => {
                tracing::trace!(error = %e, "retrying chunk send");
                tokio::task::yield_now().await;
            }
            other => return other,
        }
    }
}

/// Receives one chunk, retrying transient failures until it arrives or the
/// connection dies.
async fn receive_chunk<T: Transport>(
    conn: &mut Connection<T>,
    chunk: &mut [u8],
) -> Result<(), ConnectionError> {
    loop {
        match conn.receive_raw(chunk).await {
            Err(ConnectionError::Transient(e)) => {
                tracing::trace!(error = %e, "retrying chunk receive");
                tokio::task::yield_now().await;
            }
            other => return other,
        }
    }
}
