//! ArangoDB client core
//!
//! This crate provides the connection pool and request dispatcher that
//! fronts a set of ArangoDB coordinator endpoints and turns the server's
//! HTTP/JSON API into reliable, load-balanced, failover-aware request
//! execution.
//!
//! # Key Features
//!
//! - **Connection pooling**: one keep-alive HTTP pool per endpoint, with a
//!   global in-flight ceiling derived from the socket budget
//! - **Load balancing**: three selectable strategies (sticky, round-robin,
//!   one-random) over an append-only host list
//! - **Transparent failover**: refused connections on unpinned requests are
//!   retried on the next host, bounded by the retry policy
//! - **Leader redirect**: a 503 carrying `x-arango-endpoint` transparently
//!   re-routes the request to the advertised coordinator and remembers it
//! - **Request affinity**: per-request host pinning (cursor continuations)
//!   and dirty-read routing on a dedicated cursor
//! - **Response interpretation**: JSON bodies are parsed and the server's
//!   structured error envelope is surfaced as a typed [`ArangoError`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use arango_client::{Connection, ConnectionConfig, LoadBalancingStrategy};
//!
//! #[tokio::main]
//! async fn main() -> arango_client::Result<()> {
//!     let conn = Connection::new(
//!         ConnectionConfig::new("tcp://db1.example.com:8529")
//!             .with_url("tcp://db2.example.com:8529")
//!             .with_load_balancing(LoadBalancingStrategy::RoundRobin),
//!     )?;
//!
//!     let version = conn.server_version().await?;
//!     println!("connected to {} {}", version.server, version.version);
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Outcomes are classified so callers can dispatch on them: a structured
//! server error ([`ArangoError`], matched by `error_num`), a bare HTTP
//! error ([`HttpError`]), a socket-level [`TransportError`], or a JSON
//! parse failure. Only refused connections are recovered transparently;
//! nothing else is swallowed.

pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod request;
pub mod response;

mod host;
mod sanitize;
mod transport;

pub use config::{AgentOptions, ConnectionConfig, LoadBalancingStrategy, MaxRetries};
pub use connection::{Connection, VersionInfo};
pub use database::{Database, DatabaseInfo};
pub use error::{codes, ArangoError, DriverError, HttpError, Result, TransportError};
pub use request::{ArangoRequest, Body, Query};
pub use response::ArangoResponse;
