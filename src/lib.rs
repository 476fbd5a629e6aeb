//! herdcache - Coalesced cache-aside reads
//!
//! Reads records through a cache and makes sure that concurrent misses for
//! the same key reach the backing store only once, sharing the result (or
//! the error) with every caller that asked.

pub mod app;
pub mod cache;
pub mod cli;
pub mod coalesce;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod reader;
pub mod server;
pub mod store;

pub use coalesce::KeyedCoalescer;
pub use error::{HerdError, HerdResult};
pub use reader::CacheAsideReader;
