//! Datagram transport (UDP).
//!
//! Raw datagram sockets have no notion of a connection, so this policy
//! builds one with a two-step handshake:
//!
//! ```text
//! client (ephemeral port)                 server (well-known port)
//!   ── u16 0 (probe) ────────────────────────→
//!                                             bind dedicated socket :P
//!                                             connect it to the client
//!   ←────────────────────────── u16 P (port) ──
//!   connect to server:P
//! ```
//!
//! After that both sides talk over their own connected sockets, one pair
//! per logical connection, so chunks of one message never interleave with
//! another client's traffic and the OS filters out strangers.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;

use crate::{
    expect_v4, is_transient, ClientConfig, IoOutcome, ListenerConfig, PendingClient,
    Transport, TransportError, TransportKind,
};

/// Payload bytes per datagram when a message is split into chunks.
///
/// Chosen to stay below common path MTUs once IP and UDP headers are
/// added.
pub const DATAGRAM_CHUNK_SIZE: usize = 534;

/// The probe value a client sends to the well-known port.
const PROBE: u16 = 0;

/// Receive buffer for handshake datagrams. Larger than a probe so that
/// oversized datagrams are detected instead of silently truncated.
const HANDSHAKE_BUF: usize = 16;

/// The unreliable, datagram-oriented [`Transport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Datagram;

/// The server's well-known datagram socket plus the handshake memory
/// needed to answer repeated probes consistently.
#[derive(Debug)]
pub struct DatagramListener {
    socket: UdpSocket,
    local_ip: Ipv4Addr,
    window: Duration,
    assigned: HashMap<SocketAddrV4, Assignment>,
}

#[derive(Debug, Clone, Copy)]
struct Assignment {
    port: u16,
    at: Instant,
}

impl DatagramListener {
    /// Returns the port already handed to `peer`, if it is still within
    /// the handshake window.
    fn assigned_port(&mut self, peer: SocketAddrV4) -> Option<u16> {
        let window = self.window;
        self.assigned.retain(|_, a| a.at.elapsed() < window);
        self.assigned.get(&peer).map(|a| a.port)
    }

    fn remember(&mut self, peer: SocketAddrV4, port: u16) {
        self.assigned.insert(
            peer,
            Assignment {
                port,
                at: Instant::now(),
            },
        );
    }

    /// Opens the dedicated per-client socket and points it at `peer`.
    async fn open_channel(&self, peer: SocketAddrV4) -> io::Result<(UdpSocket, u16)> {
        let channel = UdpSocket::bind(SocketAddrV4::new(self.local_ip, 0)).await?;
        channel.connect(peer).await?;
        let port = channel.local_addr()?.port();
        Ok((channel, port))
    }

    async fn send_port(&self, peer: SocketAddrV4, port: u16) -> io::Result<()> {
        self.socket.send_to(&port.to_be_bytes(), peer).await?;
        Ok(())
    }
}

impl Transport for Datagram {
    type Socket = UdpSocket;
    type Listener = DatagramListener;

    const KIND: TransportKind = TransportKind::Datagram;
    const CHUNK_SIZE: Option<usize> = Some(DATAGRAM_CHUNK_SIZE);

    async fn bind(
        addr: SocketAddrV4,
        config: &ListenerConfig,
    ) -> Result<DatagramListener, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed { addr, source })?;
        tracing::info!(%addr, "datagram listener bound");
        Ok(DatagramListener {
            socket,
            local_ip: *addr.ip(),
            window: config.handshake_window,
            assigned: HashMap::new(),
        })
    }

    fn listener_addr(listener: &DatagramListener) -> io::Result<SocketAddr> {
        listener.socket.local_addr()
    }

    async fn accept(
        listener: &mut DatagramListener,
    ) -> Result<PendingClient<UdpSocket>, TransportError> {
        let mut buf = [0u8; HANDSHAKE_BUF];
        loop {
            let (n, from) = listener
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(TransportError::AcceptFailed)?;

            let peer = match expect_v4(from) {
                Ok(peer) => peer,
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring probe");
                    continue;
                }
            };

            if decode_u16(&buf[..n]) != Some(PROBE) {
                tracing::debug!(%peer, bytes = n, "ignoring malformed probe");
                continue;
            }

            if let Some(port) = listener.assigned_port(peer) {
                tracing::debug!(%peer, port, "repeated probe, re-sending assigned port");
                if let Err(e) = listener.send_port(peer, port).await {
                    tracing::debug!(%peer, error = %e, "failed to re-send port");
                }
                continue;
            }

            let (channel, port) = listener.open_channel(peer).await.map_err(|e| {
                TransportError::Handshake(format!("no channel for {peer}: {e}"))
            })?;
            listener.send_port(peer, port).await.map_err(|e| {
                TransportError::Handshake(format!("port reply to {peer} failed: {e}"))
            })?;
            listener.remember(peer, port);

            tracing::debug!(%peer, port, "datagram peer negotiated");
            return Ok(PendingClient::new(channel, peer));
        }
    }

    async fn connect(
        server: SocketAddrV4,
        config: &ClientConfig,
    ) -> Result<PendingClient<UdpSocket>, TransportError> {
        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::BindFailed {
                addr: local,
                source,
            })?;

        let attempts = config.handshake_attempts.max(1);
        let mut buf = [0u8; HANDSHAKE_BUF];

        for attempt in 1..=attempts {
            socket
                .send_to(&PROBE.to_be_bytes(), server)
                .await
                .map_err(|source| TransportError::ConnectFailed {
                    addr: server,
                    source,
                })?;

            let reply =
                tokio::time::timeout(config.handshake_timeout, socket.recv_from(&mut buf)).await;

            let port = match reply {
                Ok(Ok((n, _))) => match decode_u16(&buf[..n]) {
                    Some(port) if port != 0 => port,
                    _ => {
                        tracing::debug!(%server, bytes = n, "ignoring malformed port reply");
                        continue;
                    }
                },
                Ok(Err(e)) if is_transient(&e) => continue,
                Ok(Err(source)) => {
                    return Err(TransportError::ConnectFailed {
                        addr: server,
                        source,
                    });
                }
                Err(_) => {
                    tracing::debug!(%server, attempt, "port reply timed out");
                    continue;
                }
            };

            let channel = SocketAddrV4::new(*server.ip(), port);
            socket
                .connect(channel)
                .await
                .map_err(|source| TransportError::ConnectFailed {
                    addr: channel,
                    source,
                })?;
            discard_stale(&socket, channel);
            tracing::debug!(%server, %channel, "datagram connection established");
            return Ok(PendingClient::new(socket, channel));
        }

        Err(TransportError::Handshake(format!(
            "no port reply from {server} after {attempts} probes"
        )))
    }

    async fn raw_send(socket: &mut UdpSocket, buf: &[u8]) -> IoOutcome {
        IoOutcome::from_result(socket.send(buf).await)
    }

    async fn raw_receive(socket: &mut UdpSocket, buf: &mut [u8]) -> IoOutcome {
        // One spare byte so an oversized datagram shows up as `n > buf.len()`
        // instead of being truncated by the OS.
        let mut scratch = vec![0u8; buf.len() + 1];
        match socket.recv(&mut scratch).await {
            Ok(n) => {
                let kept = n.min(buf.len());
                buf[..kept].copy_from_slice(&scratch[..kept]);
                IoOutcome::Done(n)
            }
            Err(e) => IoOutcome::from_result(Err(e)),
        }
    }

    fn local_addr(socket: &UdpSocket) -> io::Result<SocketAddr> {
        socket.local_addr()
    }
}

/// Drops datagrams queued before `socket` was connected to `channel`.
///
/// Connecting filters future arrivals but leaves the receive queue alone,
/// so duplicate port replies to re-sent probes would otherwise be read as
/// the first application data.
fn discard_stale(socket: &UdpSocket, channel: SocketAddrV4) {
    let mut sink = [0u8; HANDSHAKE_BUF];
    loop {
        match socket.try_peek_sender() {
            Ok(from) if from == SocketAddr::V4(channel) => return,
            Ok(from) => {
                if socket.try_recv_from(&mut sink).is_err() {
                    return;
                }
                tracing::trace!(%from, "discarded stale handshake datagram");
            }
            Err(_) => return,
        }
    }
}

/// Decodes a datagram that must hold exactly one big-endian `u16`.
fn decode_u16(datagram: &[u8]) -> Option<u16> {
    let bytes: [u8; 2] = datagram.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_u16_exact_two_bytes() {
        assert_eq!(decode_u16(&[0x12, 0x34]), Some(0x1234));
        assert_eq!(decode_u16(&[0, 0]), Some(PROBE));
    }

    #[test]
    fn test_decode_u16_wrong_length_is_none() {
        assert_eq!(decode_u16(&[]), None);
        assert_eq!(decode_u16(&[1]), None);
        assert_eq!(decode_u16(&[0, 0, 0]), None);
    }

    #[tokio::test]
    async fn test_assigned_port_expires_after_window() {
        let mut listener = Datagram::bind(
            "127.0.0.1:0".parse().unwrap(),
            &ListenerConfig {
                handshake_window: Duration::ZERO,
            },
        )
        .await
        .expect("should bind");
        let peer: SocketAddrV4 = "127.0.0.1:40000".parse().unwrap();

        listener.remember(peer, 41000);

        assert_eq!(listener.assigned_port(peer), None);
        assert!(listener.assigned.is_empty());
    }

    #[tokio::test]
    async fn test_assigned_port_remembered_within_window() {
        let mut listener = Datagram::bind("127.0.0.1:0".parse().unwrap(), &ListenerConfig::default())
            .await
            .expect("should bind");
        let peer: SocketAddrV4 = "127.0.0.1:40000".parse().unwrap();

        listener.remember(peer, 41000);

        assert_eq!(listener.assigned_port(peer), Some(41000));
    }
}
