//! Integration tests for the wire codec over real loopback sockets.

use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use tandem_protocol::{ConnectionExt, ProtocolError};
use tandem_transport::{
    Client, ClientConfig, Connection, ConnectionError, Datagram, ListenerConfig, PendingClient,
    Stream, Transport, DATAGRAM_CHUNK_SIZE,
};
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;

const WAIT: Duration = Duration::from_secs(5);

/// Payload lengths around the datagram chunk boundary.
const STRING_LENGTHS: [usize; 6] = [0, 1, 533, 534, 535, 1068];

fn v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => panic!("expected an IPv4 address"),
    }
}

/// Establishes a connected pair over transport `T`: (server side, client).
async fn pair<T: Transport>() -> (Connection<T>, Client<T>) {
    let mut listener = T::bind("127.0.0.1:0".parse().unwrap(), &ListenerConfig::default())
        .await
        .expect("should bind");
    let addr = v4(T::listener_addr(&listener).unwrap());

    // Drive the server half concurrently with the client half.
    let (pending, client) = tokio::join!(T::accept(&mut listener), async {
        Client::<T>::connect(addr, &ClientConfig::default()).await
    });
    let pending = pending.expect("should accept");
    let client = client.expect("client should connect");
    (pending.into_connection(), client)
}

/// A datagram connection whose peer is a bare socket, so tests can see
/// every datagram the codec produces.
async fn datagram_with_raw_peer() -> (Connection<Datagram>, UdpSocket) {
    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let raw_addr = v4(raw.local_addr().unwrap());
    socket.connect(raw_addr).await.unwrap();
    raw.connect(socket.local_addr().unwrap()).await.unwrap();
    let conn = PendingClient::new(socket, raw_addr).into_connection::<Datagram>();
    (conn, raw)
}

fn text_of_len(len: usize) -> String {
    "story".chars().cycle().take(len).collect()
}

async fn round_trip_all<T: Transport>() {
    let (mut server, mut client) = pair::<T>().await;

    for value in [0u16, 1, 0x1234, u16::MAX] {
        client.send(&value).await.unwrap();
        assert_eq!(server.receive::<u16>().await.unwrap(), value);
    }
    for value in [i16::MIN, -1, 0, i16::MAX] {
        server.send(&value).await.unwrap();
        assert_eq!(client.receive::<i16>().await.unwrap(), value);
    }
    for value in [0u32, 1, 0xDEAD_BEEF, u32::MAX] {
        client.send(&value).await.unwrap();
        assert_eq!(server.receive::<u32>().await.unwrap(), value);
    }
    for value in [i32::MIN, -1, 0, i32::MAX] {
        server.send(&value).await.unwrap();
        assert_eq!(client.receive::<i32>().await.unwrap(), value);
    }
    for len in STRING_LENGTHS {
        let text = text_of_len(len);
        client.send(&text).await.unwrap();
        let received: String = tokio::time::timeout(WAIT, server.receive())
            .await
            .expect("string should arrive")
            .unwrap();
        assert_eq!(received, text, "length {len}");
    }

    assert!(!server.is_dead());
    assert!(!client.is_dead());
}

// =========================================================================
// Round trips
// =========================================================================

#[tokio::test]
async fn test_round_trip_stream_all_types() {
    round_trip_all::<Stream>().await;
}

#[tokio::test]
async fn test_round_trip_datagram_all_types() {
    round_trip_all::<Datagram>().await;
}

#[tokio::test]
async fn test_signed_reinterprets_unsigned_bits() {
    let (mut server, mut client) = pair::<Stream>().await;

    client.send(&-1i16).await.unwrap();
    assert_eq!(server.receive::<u16>().await.unwrap(), u16::MAX);

    client.send(&0x8000_0000u32).await.unwrap();
    assert_eq!(server.receive::<i32>().await.unwrap(), i32::MIN);
}

#[tokio::test]
async fn test_byte_string_round_trip_keeps_nul_bytes() {
    let (mut server, mut client) = pair::<Datagram>().await;
    let payload = vec![0u8, 255, 0, 1, 0];

    client.send(&payload).await.unwrap();

    assert_eq!(server.receive::<Vec<u8>>().await.unwrap(), payload);
}

// =========================================================================
// Byte layout
// =========================================================================

#[tokio::test]
async fn test_stream_integers_are_big_endian() {
    let (server, mut client) = pair::<Stream>().await;
    let mut raw = server.into_socket();

    client.send(&0x0102u16).await.unwrap();
    client.send(&0x0A0B_0C0Du32).await.unwrap();

    let mut buf = [0u8; 6];
    tokio::io::AsyncReadExt::read_exact(&mut raw, &mut buf)
        .await
        .unwrap();
    assert_eq!(buf, [0x01, 0x02, 0x0A, 0x0B, 0x0C, 0x0D]);
}

#[tokio::test]
async fn test_datagram_string_is_length_then_chunks() {
    let (mut conn, raw) = datagram_with_raw_peer().await;
    let text = text_of_len(1068);

    conn.send(&text).await.unwrap();

    let mut buf = vec![0u8; 2048];
    let mut sizes = Vec::new();
    let mut payload = Vec::new();
    for _ in 0..3 {
        let n = tokio::time::timeout(WAIT, raw.recv(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        sizes.push(n);
        if sizes.len() == 1 {
            assert_eq!(&buf[..n], &1068u32.to_be_bytes());
        } else {
            payload.extend_from_slice(&buf[..n]);
        }
    }

    assert_eq!(sizes, vec![4, DATAGRAM_CHUNK_SIZE, DATAGRAM_CHUNK_SIZE]);
    assert_eq!(payload, text.as_bytes());
}

#[tokio::test]
async fn test_datagram_string_reassembles_from_chunks() {
    let (mut conn, raw) = datagram_with_raw_peer().await;
    let text = text_of_len(1100);
    let bytes = text.as_bytes();

    raw.send(&1100u32.to_be_bytes()).await.unwrap();
    raw.send(&bytes[..534]).await.unwrap();
    raw.send(&bytes[534..1068]).await.unwrap();
    raw.send(&bytes[1068..]).await.unwrap();

    let received: String = tokio::time::timeout(WAIT, conn.receive())
        .await
        .expect("string should arrive")
        .unwrap();
    assert_eq!(received, text);
}

// =========================================================================
// Limits and failures
// =========================================================================

#[tokio::test]
async fn test_receive_oversized_announcement_fails_and_kills() {
    let (mut server, client) = pair::<Stream>().await;
    server.set_max_message_len(16);
    let mut raw = client.into_connection().into_socket();

    raw.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
    let result = server.receive::<String>().await;

    assert!(matches!(
        result,
        Err(ProtocolError::MessageTooLarge { len, max: 16 }) if len == u32::MAX as usize
    ));
    assert!(server.is_dead());
}

#[tokio::test]
async fn test_send_oversized_is_rejected_without_writing() {
    let (mut server, mut client) = pair::<Stream>().await;
    client.set_max_message_len(4);

    let result = client.send(&"too long".to_string()).await;
    assert!(matches!(
        result,
        Err(ProtocolError::MessageTooLarge { len: 8, max: 4 })
    ));
    assert!(!client.is_dead(), "a rejected send leaves the connection alive");

    // The stream is still in sync: the next value arrives intact.
    client.send(&7u16).await.unwrap();
    assert_eq!(server.receive::<u16>().await.unwrap(), 7);
}

#[tokio::test]
async fn test_invalid_utf8_keeps_connection_alive() {
    let (mut server, mut client) = pair::<Stream>().await;

    client.send(&vec![0xFFu8, 0xFE]).await.unwrap();
    client.send(&3u16).await.unwrap();

    assert!(matches!(
        server.receive::<String>().await,
        Err(ProtocolError::InvalidUtf8)
    ));
    assert!(!server.is_dead());
    assert_eq!(server.receive::<u16>().await.unwrap(), 3);
}

#[tokio::test]
async fn test_truncated_string_kills_connection() {
    let (mut server, client) = pair::<Stream>().await;
    let mut raw = client.into_connection().into_socket();

    raw.write_all(&10u32.to_be_bytes()).await.unwrap();
    raw.write_all(b"abc").await.unwrap();
    drop(raw);

    let result = server.receive::<String>().await;

    assert!(matches!(
        result,
        Err(ProtocolError::Connection(ConnectionError::Terminal(_)))
    ));
    assert!(server.is_dead());
}

#[tokio::test]
async fn test_dead_connection_fails_every_type() {
    let (mut server, _client) = pair::<Datagram>().await;
    server.mark_dead();

    assert!(matches!(
        server.send(&1u16).await,
        Err(ProtocolError::Connection(ConnectionError::Dead))
    ));
    assert!(matches!(
        server.send(&"x".to_string()).await,
        Err(ProtocolError::Connection(ConnectionError::Dead))
    ));
    assert!(matches!(
        server.receive::<i32>().await,
        Err(ProtocolError::Connection(ConnectionError::Dead))
    ));
    assert!(matches!(
        server.receive::<String>().await,
        Err(ProtocolError::Connection(ConnectionError::Dead))
    ));
}
