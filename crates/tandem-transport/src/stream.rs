//! Stream transport (TCP).
//!
//! Connection establishment is the OS-level connect/accept, and the
//! connected socket is the only raw send/receive target.

use std::io;
use std::net::{SocketAddr, SocketAddrV4};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::{
    expect_v4, ClientConfig, IoOutcome, ListenerConfig, PendingClient, Transport,
    TransportError, TransportKind,
};

/// The reliable, ordered [`Transport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Stream;

impl Transport for Stream {
    type Socket = TcpStream;
    type Listener = TcpListener;

    const KIND: TransportKind = TransportKind::Stream;
    const CHUNK_SIZE: Option<usize> = None;

    async fn bind(
        addr: SocketAddrV4,
        _config: &ListenerConfig,
    ) -> Result<TcpListener, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed { addr, source })?;
        tracing::info!(%addr, "stream listener bound");
        Ok(listener)
    }

    fn listener_addr(listener: &TcpListener) -> io::Result<SocketAddr> {
        listener.local_addr()
    }

    async fn accept(
        listener: &mut TcpListener,
    ) -> Result<PendingClient<TcpStream>, TransportError> {
        let (stream, addr) = listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let peer = expect_v4(addr)?;
        disable_nagle(&stream);
        tracing::debug!(%peer, "accepted stream peer");
        Ok(PendingClient::new(stream, peer))
    }

    async fn connect(
        server: SocketAddrV4,
        _config: &ClientConfig,
    ) -> Result<PendingClient<TcpStream>, TransportError> {
        let stream = TcpStream::connect(server)
            .await
            .map_err(|source| TransportError::ConnectFailed {
                addr: server,
                source,
            })?;
        disable_nagle(&stream);
        tracing::debug!(%server, "stream connection established");
        Ok(PendingClient::new(stream, server))
    }

    async fn raw_send(socket: &mut TcpStream, buf: &[u8]) -> IoOutcome {
        IoOutcome::from_result(socket.write_all(buf).await.map(|()| buf.len()))
    }

    async fn raw_receive(socket: &mut TcpStream, buf: &mut [u8]) -> IoOutcome {
        IoOutcome::from_result(socket.read_exact(buf).await)
    }

    fn local_addr(socket: &TcpStream) -> io::Result<SocketAddr> {
        socket.local_addr()
    }
}

/// Frames are tiny and strictly request/response, so send them immediately.
fn disable_nagle(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }
}
