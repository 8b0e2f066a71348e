//! TTL caching for loaded resources
//!
//! `TtlCache` is a generic expiring map for anything keyed by a list of
//! fields. `BoardCache` builds on the same expiry model for boards, whose
//! cold loads are expensive and flaky enough to deserve retries and shared
//! instances.

pub mod board_cache;
pub mod ttl;

pub use board_cache::{BoardCache, BoardLoader, BOARD_TTL_SECS};
pub use ttl::{cache_key, TtlCache, DEFAULT_TTL_SECS};
