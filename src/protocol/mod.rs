//! Wire codecs for the two status protocols a Minecraft server may speak.
//!
//! [`slp`] is tried first; [`query`] is the UDP fallback for servers that
//! have `enable-query` set but do not answer (or answer badly) over TCP.
pub mod query;
pub mod slp;
pub mod varint;
