//! bwcache - Bitwarden lookups with a shared in-memory cache
//!
//! Resolves items and attachments through the `bw` CLI and memoizes the
//! results in a TTL cache file on a memory-backed filesystem, shared by every
//! process that needs the same secrets.

pub mod bitwarden;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod ui;
#[cfg(unix)]
pub mod writer;

pub use error::{BwcacheError, BwcacheResult};
