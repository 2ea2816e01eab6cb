//! This crate exposes the internal functionality of the Conduit Minecraft
//! server scanner.
//!
//! Conduit walks an address x port search space and asks every endpoint for
//! its status using the Server List Ping protocol over TCP, optionally
//! falling back to the Query protocol over UDP. Servers that answer are
//! reported with their version, player counts and description.
//!
//! ## Architecture Overview
//!
//! 1. **Input Processing**: targets ([`address`]) and ports ([`input`]) are parsed and validated
//! 2. **Target Stream**: [`scanner::TargetIterator`] lazily crosses addresses with ports
//! 3. **Probing**: [`scanner::Scanner`] keeps at most `size` probes in flight, each one
//!    running [`protocol::slp`] and, if enabled, [`protocol::query`]
//! 4. **Parsing**: replies are normalised into [`status::ServerInfo`]
//! 5. **Reporting**: every server found goes to a [`scanner::ResultSink`]
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use conduit::address::{addresses, parse_target};
//! use conduit::scanner::{ProbeConfig, Scanner, TargetIterator};
//! use conduit::status::ServerInfo;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let specs = vec![parse_target("192.168.1.0/24")?];
//!     let targets = TargetIterator::new(addresses(&specs), vec![25565]);
//!
//!     let scanner = Scanner::new(
//!         254,
//!         ProbeConfig {
//!             timeout: Duration::from_millis(500),
//!             query_fallback: true,
//!         },
//!     );
//!
//!     let mut servers: Vec<ServerInfo> = Vec::new();
//!     let session = scanner.run(targets, &mut servers).await;
//!
//!     for server in &servers {
//!         println!("{server}");
//!     }
//!     println!("{session}");
//!     Ok(())
//! }
//! ```
#![allow(clippy::needless_doctest_main)]

pub mod tui;

pub mod input;

pub mod scanner;

pub mod address;

pub mod error;

pub mod protocol;

pub mod status;
