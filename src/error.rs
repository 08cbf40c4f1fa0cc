//! Error types for Lynx.
//!
//! A single tagged enum covers every fallible library operation. Variants
//! carry a `[LYNX-XXX]` code in their `Display` message for easy grepping
//! in logs, mirroring the coded-message convention the wider example pack
//! uses for embedded database crates.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by Lynx operations.
///
/// `search` is the one public operation that does *not* return this type:
/// a dimension mismatch there yields an empty [`crate::SearchResult`]
/// rather than an error, since search is defined as returning a value type
/// (spec §7).
#[derive(Error, Debug)]
pub enum Error {
    /// A vector's length did not match the database's configured
    /// dimension (LYNX-001).
    #[error("[LYNX-001] dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// `get`/`remove` was called with an id that is not present
    /// (LYNX-002).
    #[error("[LYNX-002] vector not found: id {0}")]
    VectorNotFound(u64),

    /// A query was issued against an index that has not been built yet
    /// (LYNX-003), e.g. an IVF index with no trained centroids.
    #[error("[LYNX-003] index not built")]
    IndexNotBuilt,

    /// A caller-supplied parameter was invalid (LYNX-004): a duplicate id
    /// within a batch, an empty `data_path` on `save`, an unknown index
    /// type, or a malformed k-means configuration.
    #[error("[LYNX-004] invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation is not valid given the current state (LYNX-005):
    /// inserting an id that already exists in an index, or a transient
    /// inconsistency surfaced during write-log replay.
    #[error("[LYNX-005] invalid state: {0}")]
    InvalidState(String),

    /// Memory allocation failed (LYNX-006).
    #[error("[LYNX-006] out of memory: {0}")]
    OutOfMemory(String),

    /// Underlying file I/O failed (LYNX-007).
    #[error("[LYNX-007] I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A persisted file was structurally invalid: bad magic, truncated
    /// payload, or unsupported version (LYNX-008).
    #[error("[LYNX-008] serialization error: {0}")]
    Serialization(String),

    /// The requested operation is recognized but intentionally
    /// unimplemented (LYNX-009): `flush()` with `enable_wal = true`.
    #[error("[LYNX-009] not implemented: {0}")]
    NotImplemented(String),

    /// Maintenance aborted because the write log exceeded its pressure
    /// threshold (LYNX-010).
    #[error("[LYNX-010] busy: {0}")]
    Busy(String),
}

impl Error {
    /// Returns the stable `LYNX-XXX` error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "LYNX-001",
            Self::VectorNotFound(_) => "LYNX-002",
            Self::IndexNotBuilt => "LYNX-003",
            Self::InvalidParameter(_) => "LYNX-004",
            Self::InvalidState(_) => "LYNX-005",
            Self::OutOfMemory(_) => "LYNX-006",
            Self::IoError(_) => "LYNX-007",
            Self::Serialization(_) => "LYNX-008",
            Self::NotImplemented(_) => "LYNX-009",
            Self::Busy(_) => "LYNX-010",
        }
    }
}

/// Returns the error's full coded message, e.g. `"[LYNX-001] dimension
/// mismatch: expected 128, got 64"`.
///
/// Free-function mirror of `Error`'s `Display` impl, for parity with the
/// library's documented external surface.
#[must_use]
pub fn error_string(err: &Error) -> String {
    err.to_string()
}
