//! # Storage
//!
//! Disk-backed implementations of the cache traits.

pub mod redb_cache;

pub use redb_cache::RedbCache;
