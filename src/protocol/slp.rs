//! Server List Ping over TCP.
//!
//! One connection per probe: connect, send the handshake followed by a status
//! request, read back a single length-prefixed JSON document. Each of the
//! three steps gets its own deadline, so a server that accepts quickly but
//! never answers still fails after one timeout's worth of reading.
use super::varint::{read_varint, write_varint};
use crate::error::{Phase, ProbeError};
use crate::status::ServerInfo;
use log::debug;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

/// Protocol version announced in the handshake. Servers answer status
/// requests regardless of the value, so it is never negotiated.
pub const PROTOCOL_VERSION: u32 = 0x6E;

/// Upper bound on the status document we are willing to buffer.
pub const MAX_PAYLOAD_LEN: u32 = 1 << 20;

const HANDSHAKE_ID: u32 = 0x00;
const STATUS_REQUEST_ID: u32 = 0x00;
const NEXT_STATE_STATUS: u32 = 1;

/// Builds the handshake packet for `endpoint` with the status request frame
/// appended.
///
/// The host field is the textual address, one byte per character.
///
/// ```
/// # use conduit::protocol::slp::handshake;
/// let packet = handshake("127.0.0.1:25565".parse().unwrap());
/// assert_eq!(&packet[..4], &[0x0F, 0x00, 0x6E, 0x09]);
/// assert_eq!(&packet[packet.len() - 5..], &[0x63, 0xDD, 0x01, 0x01, 0x00]);
/// ```
pub fn handshake(endpoint: SocketAddr) -> Vec<u8> {
    let host = endpoint.ip().to_string();

    let mut body = Vec::with_capacity(host.len() + 8);
    write_varint(&mut body, HANDSHAKE_ID);
    write_varint(&mut body, PROTOCOL_VERSION);
    write_varint(&mut body, len_u32(host.len()));
    // Address text is always ASCII; the cast only drops bits for code points
    // that can never appear in it.
    #[allow(clippy::cast_possible_truncation)]
    body.extend(host.chars().map(|c| c as u8));
    body.extend_from_slice(&endpoint.port().to_be_bytes());
    write_varint(&mut body, NEXT_STATE_STATUS);

    let mut packet = Vec::with_capacity(body.len() + 4);
    write_varint(&mut packet, len_u32(body.len()));
    packet.extend_from_slice(&body);

    // Status request: a frame of length 1 holding only the packet id.
    write_varint(&mut packet, 1);
    write_varint(&mut packet, STATUS_REQUEST_ID);
    packet
}

/// Pings `endpoint` and parses its status reply.
pub async fn ping(endpoint: SocketAddr, timeout: Duration) -> Result<ServerInfo, ProbeError> {
    let mut stream = connect(endpoint, timeout).await?;

    let packet = handshake(endpoint);
    time::timeout(timeout, stream.write_all(&packet))
        .await
        .map_err(|_| ProbeError::Timeout(Phase::Write))?
        .map_err(ProbeError::Write)?;

    let json = time::timeout(timeout, read_status(&mut stream))
        .await
        .map_err(|_| ProbeError::Timeout(Phase::Read))??;

    if let Err(e) = stream.shutdown().await {
        debug!("Shutdown stream error {e}");
    }

    ServerInfo::from_status_json(endpoint, &json)
}

async fn connect(endpoint: SocketAddr, timeout: Duration) -> Result<TcpStream, ProbeError> {
    time::timeout(timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| ProbeError::Timeout(Phase::Connect))?
        .map_err(ProbeError::Connect)
}

/// Reads one status response frame and returns the JSON bytes.
async fn read_status(stream: &mut TcpStream) -> Result<Vec<u8>, ProbeError> {
    let _frame_len = read_varint(stream).await?;
    let _packet_id = read_varint(stream).await?;

    let json_len = read_varint(stream).await?;
    if json_len == 0 {
        return Err(ProbeError::EmptyPayload);
    }
    if json_len > MAX_PAYLOAD_LEN {
        return Err(ProbeError::MalformedResponse(format!(
            "status payload of {json_len} bytes exceeds {MAX_PAYLOAD_LEN}"
        )));
    }

    let mut json = vec![0u8; json_len as usize];
    // read_exact loops over short reads until the buffer is full.
    stream.read_exact(&mut json).await.map_err(ProbeError::Read)?;
    Ok(json)
}

fn len_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::varint::encode;
    use tokio::net::TcpListener;

    const STATUS: &str = r#"{"version":{"name":"1.20.4","protocol":765},"players":{"online":3,"max":20},"description":{"text":"Hello"}}"#;

    fn status_frame(json: &[u8]) -> Vec<u8> {
        let mut body = encode(0x00);
        body.extend(encode(len_u32(json.len())));
        body.extend_from_slice(json);

        let mut frame = encode(len_u32(body.len()));
        frame.extend(body);
        frame
    }

    /// Accepts one connection, drains the request and replies with `reply`,
    /// split into small chunks to force partial reads on the client side.
    async fn serve_once(reply: Vec<u8>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; handshake(addr).len()];
            socket.read_exact(&mut request).await.unwrap();
            assert_eq!(request, handshake(addr));
            for chunk in reply.chunks(7) {
                socket.write_all(chunk).await.unwrap();
                socket.flush().await.unwrap();
                time::sleep(Duration::from_millis(1)).await;
            }
        });
        addr
    }

    #[test]
    fn handshake_is_byte_exact() {
        let packet = handshake("127.0.0.1:25565".parse().unwrap());
        let mut expected = vec![0x0F, 0x00, 0x6E, 0x09];
        expected.extend_from_slice(b"127.0.0.1");
        expected.extend_from_slice(&[0x63, 0xDD, 0x01, 0x01, 0x00]);
        assert_eq!(expected, packet);
    }

    #[test]
    fn handshake_writes_port_high_byte_first() {
        let packet = handshake("10.0.0.1:258".parse().unwrap());
        let port_at = packet.len() - 5;
        assert_eq!(&packet[port_at..port_at + 2], &[0x01, 0x02]);
    }

    #[test]
    fn handshake_uses_ipv6_text() {
        let packet = handshake("[::1]:25565".parse().unwrap());
        assert_eq!(packet[0], 0x09);
        assert_eq!(packet[3], 3);
        assert_eq!(&packet[4..7], b"::1");
    }

    #[tokio::test]
    async fn pings_a_server_with_fragmented_reply() {
        let addr = serve_once(status_frame(STATUS.as_bytes())).await;
        let info = ping(addr, Duration::from_secs(2)).await.unwrap();

        assert_eq!(info.version(), "1.20.4");
        assert_eq!(info.online(), 3);
        assert_eq!(info.max(), 20);
        assert_eq!(info.description(), Some("Hello"));
        assert_eq!(info.endpoint(), addr);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let addr = serve_once(vec![0x02, 0x00, 0x00]).await;
        let err = ping(addr, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ProbeError::EmptyPayload));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_reading() {
        let mut reply = encode(8);
        reply.extend(encode(0));
        reply.extend(encode(MAX_PAYLOAD_LEN + 1));
        let addr = serve_once(reply).await;
        let err = ping(addr, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ProbeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn short_payload_is_a_read_error() {
        let mut reply = status_frame(STATUS.as_bytes());
        reply.truncate(reply.len() - 10);
        let addr = serve_once(reply).await;
        let err = ping(addr, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Read(_)));
    }

    #[tokio::test]
    async fn silent_server_times_out_on_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(5)).await;
        });

        let timeout = Duration::from_millis(200);
        let started = time::Instant::now();
        let err = ping(addr, timeout).await.unwrap_err();

        assert!(matches!(err, ProbeError::Timeout(Phase::Read)));
        assert!(started.elapsed() < timeout * 2 + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn closed_port_fails_to_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ping(addr, Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(
            err,
            ProbeError::Connect(_) | ProbeError::Timeout(Phase::Connect)
        ));
    }
}
