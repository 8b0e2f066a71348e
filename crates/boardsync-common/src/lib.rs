//! Shared error taxonomy and result alias for boardsync

pub mod error;

pub use error::{BoardError, Result};
