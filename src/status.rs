//! Normalises SLP and Query replies into a single [`ServerInfo`] record.
//!
//! Everything here is pure: the probes hand over bytes they already read and
//! get either a record or the reason it could not be built. Nothing is
//! defaulted; a reply that lacks a field is rejected.
use crate::error::ProbeError;
use serde_json::Value;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Minimum number of NUL-separated fields in a Query basic stat body.
pub const STAT_FIELDS: usize = 5;

/// What a responding server told us about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    address: IpAddr,
    port: u16,
    version: String,
    online: u32,
    max: u32,
    description: Option<String>,
}

impl ServerInfo {
    /// Builds a record from an SLP status document.
    ///
    /// `version.name`, `players.online`, `players.max` and `description` are
    /// required. `description` is either a plain string or an object whose
    /// `text` member is used.
    ///
    /// ```
    /// # use conduit::status::ServerInfo;
    /// let json = br#"{"version":{"name":"1.20"},"players":{"online":3,"max":20},"description":"A server"}"#;
    /// let info = ServerInfo::from_status_json("127.0.0.1:25565".parse().unwrap(), json).unwrap();
    /// assert_eq!(info.to_string(), "127.0.0.1:25565 [1.20] (3/20) A server");
    /// ```
    pub fn from_status_json(endpoint: SocketAddr, json: &[u8]) -> Result<Self, ProbeError> {
        let root: Value = serde_json::from_slice(json)?;

        let version = root
            .pointer("/version/name")
            .and_then(Value::as_str)
            .ok_or(ProbeError::MissingField("version.name"))?;
        let online = player_count(&root, "/players/online", "players.online")?;
        let max = player_count(&root, "/players/max", "players.max")?;

        let description = match root.get("description") {
            Some(Value::String(text)) => text.as_str(),
            Some(Value::Object(chat)) => chat
                .get("text")
                .and_then(Value::as_str)
                .ok_or(ProbeError::MissingField("description.text"))?,
            _ => return Err(ProbeError::MissingField("description")),
        };

        Ok(Self {
            address: endpoint.ip(),
            port: endpoint.port(),
            version: version.to_owned(),
            online,
            max,
            description: Some(description.to_owned()),
        })
    }

    /// Builds a record from the body of a Query basic stat reply, header
    /// already stripped.
    ///
    /// Fields 1, 3 and 4 become version, online and max. Query carries no
    /// description.
    pub fn from_stat_fields(endpoint: SocketAddr, body: &[u8]) -> Result<Self, ProbeError> {
        let fields: Vec<&[u8]> = body.split(|&b| b == 0).collect();
        if fields.len() < STAT_FIELDS {
            return Err(ProbeError::MalformedResponse(format!(
                "expected at least {STAT_FIELDS} stat fields, got {}",
                fields.len()
            )));
        }

        Ok(Self {
            address: endpoint.ip(),
            port: endpoint.port(),
            version: String::from_utf8_lossy(fields[1]).into_owned(),
            online: parse_count(fields[3], "online")?,
            max: parse_count(fields[4], "max")?,
            description: None,
        })
    }

    pub const fn address(&self) -> IpAddr {
        self.address
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub const fn online(&self) -> u32 {
        self.online
    }

    pub const fn max(&self) -> u32 {
        self.max
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({}/{})",
            self.endpoint(),
            self.version,
            self.online,
            self.max
        )?;
        if let Some(description) = &self.description {
            write!(f, " {description}")?;
        }
        Ok(())
    }
}

fn player_count(root: &Value, pointer: &str, field: &'static str) -> Result<u32, ProbeError> {
    let value = root.pointer(pointer).ok_or(ProbeError::MissingField(field))?;
    value
        .as_u64()
        .and_then(|count| u32::try_from(count).ok())
        .ok_or_else(|| ProbeError::Parse {
            field,
            value: value.to_string(),
        })
}

fn parse_count(raw: &[u8], field: &'static str) -> Result<u32, ProbeError> {
    let text = String::from_utf8_lossy(raw);
    text.trim().parse().map_err(|_| ProbeError::Parse {
        field,
        value: text.into_owned(),
    })
}
