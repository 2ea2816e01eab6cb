//! GameSpy4-style Query over UDP.
//!
//! Two round trips: a handshake that returns a challenge token, then a basic
//! stat request carrying that token. Each receive waits at most one timeout.
use crate::error::{Phase, ProbeError};
use crate::status::ServerInfo;
use log::debug;
use once_cell::sync::Lazy;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time;

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const TYPE_HANDSHAKE: u8 = 0x09;
const TYPE_STAT: u8 = 0x00;

/// Type byte plus echoed session id at the start of every reply.
pub const HEADER_LEN: usize = 5;

/// Servers only look at the low nibble of each session id byte.
const SESSION_MASK: u32 = 0x0F0F_0F0F;

const RECV_BUF_LEN: usize = 2048;

static CLOCK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Derives a session id from the process-monotonic clock.
pub fn session_id() -> [u8; 4] {
    // Wrapping at 32 bits is fine, the id only needs to differ between probes.
    #[allow(clippy::cast_possible_truncation)]
    let ticks = CLOCK_ORIGIN.elapsed().as_nanos() as u32;
    (ticks & SESSION_MASK).to_be_bytes()
}

pub fn handshake_request(session: [u8; 4]) -> [u8; 7] {
    let mut datagram = [0u8; 7];
    datagram[..2].copy_from_slice(&MAGIC);
    datagram[2] = TYPE_HANDSHAKE;
    datagram[3..].copy_from_slice(&session);
    datagram
}

pub fn stat_request(session: [u8; 4], token: [u8; 4]) -> [u8; 11] {
    let mut datagram = [0u8; 11];
    datagram[..2].copy_from_slice(&MAGIC);
    datagram[2] = TYPE_STAT;
    datagram[3..7].copy_from_slice(&session);
    datagram[7..].copy_from_slice(&token);
    datagram
}

/// Converts the decimal challenge token text from a handshake reply into the
/// four big-endian bytes the stat request expects.
pub fn challenge_token(raw: &[u8]) -> Result<[u8; 4], ProbeError> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_end_matches('\0').trim();
    trimmed
        .parse::<i32>()
        .map(i32::to_be_bytes)
        .map_err(|_| ProbeError::Parse {
            field: "challenge token",
            value: trimmed.to_owned(),
        })
}

/// Strips and checks the reply header, returning the payload.
fn payload(reply: &[u8], session: [u8; 4]) -> Result<&[u8], ProbeError> {
    if reply.len() < HEADER_LEN {
        return Err(ProbeError::MalformedResponse(format!(
            "reply of {} bytes is shorter than its header",
            reply.len()
        )));
    }
    if reply[1..HEADER_LEN] != session {
        return Err(ProbeError::MalformedResponse(
            "reply echoes a different session id".to_owned(),
        ));
    }
    Ok(&reply[HEADER_LEN..])
}

/// Queries `endpoint` and parses its basic stat reply.
pub async fn query(endpoint: SocketAddr, timeout: Duration) -> Result<ServerInfo, ProbeError> {
    let socket = bind(endpoint).await?;
    socket.connect(endpoint).await.map_err(ProbeError::Connect)?;

    let session = session_id();
    let mut buf = [0u8; RECV_BUF_LEN];

    let request = handshake_request(session);
    let reply = exchange(&socket, &request, &mut buf, timeout, Phase::Handshake).await?;
    let token = challenge_token(payload(reply, session)?)?;
    debug!("Challenge token from {endpoint}: {token:?}");

    let request = stat_request(session, token);
    let reply = exchange(&socket, &request, &mut buf, timeout, Phase::Stat).await?;
    ServerInfo::from_stat_fields(endpoint, payload(reply, session)?)
}

async fn bind(endpoint: SocketAddr) -> Result<UdpSocket, ProbeError> {
    let local: SocketAddr = match endpoint {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    UdpSocket::bind(local).await.map_err(ProbeError::Bind)
}

/// Sends one datagram and waits up to `timeout` for the answer.
async fn exchange<'a>(
    socket: &UdpSocket,
    request: &[u8],
    buf: &'a mut [u8],
    timeout: Duration,
    phase: Phase,
) -> Result<&'a [u8], ProbeError> {
    socket.send(request).await.map_err(ProbeError::Write)?;

    match time::timeout(timeout, socket.recv(buf)).await {
        Ok(Ok(size)) => Ok(&buf[..size]),
        Ok(Err(e)) => {
            // ICMP port unreachable surfaces here as ConnectionRefused.
            debug!("Receive error during {phase}: {e}");
            Err(ProbeError::NoResponse(phase))
        }
        Err(_) => Err(ProbeError::NoResponse(phase)),
    }
}
