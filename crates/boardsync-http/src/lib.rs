//! boardsync-http: transport and connection layer for the board mirror
//!
//! This crate owns everything between a request payload and a normalized
//! `Result`:
//! - `Transport`: one HTTP round-trip (pluggable; `HttpTransport` is the
//!   pooled blocking implementation)
//! - `Connection`: retry loop with rate-budget awareness, response
//!   classification, and the access-denied conversion for the remote's
//!   ambiguous empty-collection shape
//!
//! The object model lives in the `boardsync` crate.

pub mod config;
pub mod connection;
pub mod testing;
pub mod transport;

pub use config::ApiConfig;
pub use connection::{parse_cooldown_seconds, Connection, Sleeper, ThreadSleeper};
pub use transport::{HttpTransport, Transport, TransportResponse};
