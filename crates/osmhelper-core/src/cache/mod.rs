//! In-memory response caching.
//!
//! `TtlCache` keeps values for a fixed time-to-live and coalesces concurrent
//! misses on the same key into a single fetch. Nothing is written to disk;
//! the cache starts empty on every process start.

pub mod ttl;

pub use ttl::TtlCache;
