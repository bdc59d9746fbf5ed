//! Error types for arena and collection operations.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Errors surfaced by arena allocation and the staged entry points.
///
/// Expected misses — an absent key, a pop from an empty sequence — are never
/// errors; they come back as `Option`/sentinel values.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArenaError {
    /// The backing buffer cannot grow enough to satisfy an allocation.
    #[error("arena capacity exceeded: requested {requested} bytes, capacity {capacity} bytes")]
    CapacityExceeded {
        /// Number of bytes requested.
        requested: u32,
        /// Configured maximum buffer size.
        capacity: u32,
    },
    /// A staged key does not fit the key scratch region.
    #[error("key of {len} bytes exceeds the {max}-byte key buffer")]
    KeyTooLarge {
        /// Length of the offending key.
        len: u32,
        /// Capacity of the key buffer.
        max: u32,
    },
    /// A blob value is too long for a packed offset/length slot.
    #[error("blob of {len} bytes exceeds the {max}-byte packed-slot limit")]
    BlobTooLarge {
        /// Length of the offending blob.
        len: u32,
        /// Largest length a packed word can carry.
        max: u32,
    },
    /// A blob allocation landed beyond the 20-bit packed offset window.
    #[error("blob at offset {offset} is outside the packed-pointer window")]
    BlobWindowExhausted {
        /// Offset the allocator returned.
        offset: u32,
    },
    /// A transient batch was opened while another one is still active.
    #[error("transient session already active (owner tag {active})")]
    TransientActive {
        /// Tag of the session already running.
        active: u8,
    },
}
