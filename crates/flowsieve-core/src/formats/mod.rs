//! # Formats
//!
//! Byte-level encodings. File and database I/O live with the callers.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, entry_from_bytes, entry_to_bytes,
};
