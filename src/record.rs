//! Core data types: stored records, search results, and database statistics.

use serde::{Deserialize, Serialize};

/// A single stored vector, keyed by a caller-chosen id.
///
/// `id` is opaque and unique within a database; it is never reused after a
/// `remove` within the same lifetime unless the caller explicitly
/// re-inserts it (insert and remove are independent operations — the
/// system does not track "history" for an id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Caller-chosen unique identifier.
    pub id: u64,
    /// The embedding itself. Length must equal the database's configured
    /// dimension.
    pub vector: Vec<f32>,
    /// Opaque metadata bytes. No JSON parsing happens inside the crate;
    /// callers own the encoding.
    pub metadata: Option<Vec<u8>>,
}

impl VectorRecord {
    /// Creates a record with no metadata.
    #[must_use]
    pub fn new(id: u64, vector: Vec<f32>) -> Self {
        Self { id, vector, metadata: None }
    }

    /// Creates a record carrying opaque metadata bytes.
    #[must_use]
    pub fn with_metadata(id: u64, vector: Vec<f32>, metadata: Vec<u8>) -> Self {
        Self { id, vector, metadata: Some(metadata) }
    }

    /// The record's vector length.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// One entry in a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Id of the matching record.
    pub id: u64,
    /// Distance under the query's metric. Lower is always more similar,
    /// for every metric (see [`crate::distance`]).
    pub distance: f32,
}

/// The outcome of a `search` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matches, sorted ascending by distance, `items.len() <= k` and
    /// containing no duplicate ids.
    pub items: Vec<SearchResultItem>,
    /// Number of vectors actually scored — not the dataset size, not
    /// `items.len()`.
    pub total_candidates: u64,
    /// Wall-clock time spent inside the query, in milliseconds.
    pub query_time_ms: f64,
}

impl SearchResult {
    /// An empty result with no candidates scored and no time recorded.
    ///
    /// Returned by `search` on a dimension mismatch (a value type, not an
    /// error — see [`crate::error`]).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Point-in-time counters and sizing information for a [`crate::Database`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DatabaseStats {
    /// Number of distinct ids currently stored.
    pub vector_count: usize,
    /// Configured vector dimension.
    pub dimension: usize,
    /// Estimated total memory footprint in bytes (record store + index).
    pub memory_usage_bytes: usize,
    /// Estimated memory footprint of the index alone, in bytes.
    pub index_memory_bytes: usize,
    /// Mean `search` latency in milliseconds across all queries so far.
    pub avg_query_time_ms: f64,
    /// Total `search` calls served, ever.
    pub total_queries: u64,
    /// Total successful inserts, ever. Monotonic — never decremented by
    /// `remove`.
    pub total_inserts: u64,
}
