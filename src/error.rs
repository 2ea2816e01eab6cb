//! Error types produced while probing a single target.
//!
//! None of these are fatal to a scan: the orchestrator turns every
//! [`ProbeError`] into "no server at this endpoint" and moves on.
use std::{fmt, io};
use thiserror::Error;

/// The network step a probe was in when it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// TCP connect.
    Connect,
    /// Writing the SLP handshake and status request.
    Write,
    /// Reading the SLP status response.
    Read,
    /// Query phase 1, waiting for the challenge token.
    Handshake,
    /// Query phase 2, waiting for the basic stat reply.
    Stat,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Write => "write",
            Self::Read => "read",
            Self::Handshake => "query handshake",
            Self::Stat => "query stat",
        };
        f.write_str(name)
    }
}

/// Why a probe produced no [`ServerInfo`](crate::status::ServerInfo).
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("timed out during {0}")]
    Timeout(Phase),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("could not bind local socket: {0}")]
    Bind(#[source] io::Error),

    #[error("no reply during {0}")]
    NoResponse(Phase),

    #[error("server sent an empty status payload")]
    EmptyPayload,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("could not parse {field} from {value:?}")]
    Parse { field: &'static str, value: String },

    #[error("invalid status json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("varint is longer than 5 bytes")]
    Overflow,
}

/// A target or port specification that cannot be scanned. These are the
/// only errors that stop the program before a scan starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("no valid ports or ranges provided")]
    NoPorts,

    #[error("invalid port number '{0}'")]
    InvalidPort(String),

    #[error("port {0} must be between 1 and 65535")]
    PortOutOfRange(u16),

    #[error("invalid range format '{0}', expected 'start-end' (for example 25565-25575)")]
    RangeFormat(String),

    #[error("start {start} is greater than end {end} in range '{range}'")]
    ReversedRange {
        start: String,
        end: String,
        range: String,
    },

    #[error("invalid target '{0}', expected an address, CIDR block or address range")]
    InvalidTarget(String),

    #[error("range '{0}' mixes IPv4 and IPv6 addresses")]
    MixedFamilies(String),
}
