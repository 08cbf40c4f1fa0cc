//! Pluggable nearest-neighbor indices and their common capability set.
//!
//! Three concrete index kinds exist: [`flat::FlatIndex`] (exact),
//! [`ivf::IvfIndex`] (clustered approximate), and [`hnsw::HnswIndex`]
//! (graph approximate). The set is closed and fixed at database
//! construction, so [`IndexImpl`] models them as a tagged enum rather than
//! a `dyn VectorIndex` trait object — no caller ever needs a fourth kind
//! at runtime, and the enum lets `Database` match on `config.index_type`
//! once at construction and never again.

pub mod flat;
pub mod hnsw;
pub mod ivf;

use crate::config::{Config, IndexType, SearchParams};
use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::record::{SearchResultItem, VectorRecord};

use flat::FlatIndex;
use hnsw::HnswIndex;
use ivf::IvfIndex;

/// Shared capability set over the three index kinds.
///
/// `deserialize` is deliberately absent here: an associated function
/// returning `Self` is not object-safe and, more importantly, there is no
/// polymorphic call site for it — a caller deserializing a persisted
/// index already knows which kind the header's magic bytes name before
/// constructing anything, so each concrete type exposes its own
/// `deserialize`, and [`IndexImpl::deserialize`] dispatches on the
/// expected [`IndexType`] instead.
pub trait VectorIndex {
    /// Inserts `vector` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidState`] if `id` is already present.
    fn add(&self, id: u64, vector: &[f32]) -> Result<()>;

    /// Removes `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::VectorNotFound`] if `id` is absent.
    fn remove(&self, id: u64) -> Result<()>;

    /// Whether `id` is present.
    fn contains(&self, id: u64) -> bool;

    /// Scores `query` against the index and returns the `k` nearest
    /// matches passing `params`'s filter, ascending by distance,
    /// alongside the number of candidates actually scored.
    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> (Vec<SearchResultItem>, u64);

    /// Replaces the entire index with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameter`] on a duplicate id
    /// within `records`.
    fn build(&self, records: &[VectorRecord]) -> Result<()>;

    /// Serializes the index to its bit-exact on-disk format.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IoError`] if writing fails.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Number of stored vectors.
    fn size(&self) -> usize;

    /// Configured vector dimension.
    fn dimension(&self) -> usize;

    /// Estimated memory footprint in bytes.
    fn memory_usage(&self) -> usize;
}

/// Owning, closed-set dispatch over the three index kinds.
///
/// Held by [`crate::database::Database`] as `Arc<IndexImpl>`; the
/// non-blocking maintenance protocol (spec.md §4.7) clones the active
/// index via `serialize` → `deserialize` into a detached copy, optimizes
/// the clone, then atomically swaps the `Arc`.
pub enum IndexImpl {
    /// Exact brute-force search.
    Flat(FlatIndex),
    /// Hierarchical graph approximate search.
    Hnsw(HnswIndex),
    /// Clustered approximate search.
    Ivf(IvfIndex),
}

impl IndexImpl {
    /// Constructs the index kind named by `config.index_type`, with that
    /// kind's section of `config` supplying its parameters.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        match config.index_type {
            IndexType::Flat => Self::Flat(FlatIndex::new(config.dimension, config.distance_metric)),
            IndexType::Hnsw => {
                Self::Hnsw(HnswIndex::new(config.dimension, config.distance_metric, config.hnsw.clone()))
            }
            IndexType::Ivf => Self::Ivf(IvfIndex::new(config.dimension, config.distance_metric, config.ivf)),
        }
    }

    /// The [`IndexType`] this instance was constructed as.
    #[must_use]
    pub fn kind(&self) -> IndexType {
        match self {
            Self::Flat(_) => IndexType::Flat,
            Self::Hnsw(_) => IndexType::Hnsw,
            Self::Ivf(_) => IndexType::Ivf,
        }
    }

    /// Returns the raw vector stored under `id`, if present. Used by the
    /// database's `load()` to repopulate record bodies from the index
    /// (spec.md §4.6 "Persistence").
    #[must_use]
    pub fn vector_for(&self, id: u64) -> Option<Vec<f32>> {
        match self {
            Self::Flat(index) => index.vector_for(id),
            Self::Hnsw(index) => index.vector_for(id),
            Self::Ivf(index) => index.vector_for(id),
        }
    }

    /// Runs the graph/cluster-structure optimization appropriate for
    /// this index kind. A no-op for `Flat`, which has no auxiliary
    /// structure to optimize.
    pub fn optimize(&self) {
        if let Self::Hnsw(index) = self {
            index.optimize_graph();
        }
    }

    /// Deserializes bytes expected to hold an index of kind `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if `bytes` does not match
    /// `expected`'s on-disk format.
    pub fn deserialize(expected: IndexType, bytes: &[u8]) -> Result<Self> {
        Ok(match expected {
            IndexType::Flat => Self::Flat(FlatIndex::deserialize(bytes)?),
            IndexType::Hnsw => Self::Hnsw(HnswIndex::deserialize(bytes)?),
            IndexType::Ivf => Self::Ivf(IvfIndex::deserialize(bytes)?),
        })
    }

    /// The distance metric this index was constructed with.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        match self {
            Self::Flat(index) => index.metric(),
            Self::Hnsw(index) => index.metric(),
            Self::Ivf(index) => index.metric(),
        }
    }
}

impl VectorIndex for IndexImpl {
    fn add(&self, id: u64, vector: &[f32]) -> Result<()> {
        match self {
            Self::Flat(index) => index.add(id, vector),
            Self::Hnsw(index) => index.add(id, vector),
            Self::Ivf(index) => index.add(id, vector),
        }
    }

    fn remove(&self, id: u64) -> Result<()> {
        match self {
            Self::Flat(index) => index.remove(id),
            Self::Hnsw(index) => index.remove(id),
            Self::Ivf(index) => index.remove(id),
        }
    }

    fn contains(&self, id: u64) -> bool {
        match self {
            Self::Flat(index) => index.contains(id),
            Self::Hnsw(index) => index.contains(id),
            Self::Ivf(index) => index.contains(id),
        }
    }

    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> (Vec<SearchResultItem>, u64) {
        match self {
            Self::Flat(index) => index.search(query, k, params),
            Self::Hnsw(index) => index.search(query, k, params),
            Self::Ivf(index) => index.search(query, k, params),
        }
    }

    fn build(&self, records: &[VectorRecord]) -> Result<()> {
        match self {
            Self::Flat(index) => index.build(records),
            Self::Hnsw(index) => index.build(records),
            Self::Ivf(index) => index.build(records),
        }
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            Self::Flat(index) => index.serialize(),
            Self::Hnsw(index) => index.serialize(),
            Self::Ivf(index) => index.serialize(),
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::Flat(index) => index.size(),
            Self::Hnsw(index) => index.size(),
            Self::Ivf(index) => index.size(),
        }
    }

    fn dimension(&self) -> usize {
        match self {
            Self::Flat(index) => index.dimension(),
            Self::Hnsw(index) => index.dimension(),
            Self::Ivf(index) => index.dimension(),
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            Self::Flat(index) => index.memory_usage(),
            Self::Hnsw(index) => index.memory_usage(),
            Self::Ivf(index) => index.memory_usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn new_constructs_the_configured_kind() {
        let config = Config::builder(4).index_type(IndexType::Flat).build();
        let index = IndexImpl::new(&config);
        assert_eq!(index.kind(), IndexType::Flat);
        assert_eq!(index.dimension(), 4);
    }

    #[test]
    fn dispatch_add_contains_remove_round_trips() {
        let config = Config::builder(2).index_type(IndexType::Flat).build();
        let index = IndexImpl::new(&config);
        index.add(1, &[0.0, 0.0]).unwrap();
        assert!(index.contains(1));
        index.remove(1).unwrap();
        assert!(!index.contains(1));
    }

    #[test]
    fn serialize_deserialize_round_trips_through_dispatch() {
        let config = Config::builder(2).index_type(IndexType::Ivf).build();
        let index = IndexImpl::new(&config);
        index.add(1, &[1.0, 2.0]).unwrap();
        let bytes = index.serialize().unwrap();
        let restored = IndexImpl::deserialize(IndexType::Ivf, &bytes).unwrap();
        assert_eq!(restored.size(), 1);
        assert_eq!(restored.vector_for(1), Some(vec![1.0, 2.0]));
    }
}
