//! Exact brute-force index: an `id -> vector` map with no auxiliary
//! structure.
//!
//! Guarantees 100% recall since every stored vector is scored against the
//! query; the cost is O(N * D) per search.

use crate::codec::{read_magic, read_u32, read_u64, read_vector, write_magic, write_u32, write_u64, write_vector};
use crate::config::SearchParams;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::record::{SearchResultItem, VectorRecord};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::HashSet;

const MAGIC: &[u8; 4] = b"FLAT";
const VERSION: u32 = 1;

/// Exact nearest-neighbor index.
///
/// Has no thread safety of its own beyond the `RwLock` needed to satisfy
/// `&self` call signatures shared with the other index kinds — the
/// database layer's outer lock is what actually serializes access in
/// normal use (spec.md §4.3: "Thread safety: none; the database layer
/// provides it").
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    vectors: RwLock<FxHashMap<u64, Vec<f32>>>,
}

impl FlatIndex {
    /// Creates an empty index over vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self { dimension, metric, vectors: RwLock::new(FxHashMap::default()) }
    }

    /// Inserts `vector` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `id` is already present.
    pub fn add(&self, id: u64, vector: &[f32]) -> Result<()> {
        let mut vectors = self.vectors.write();
        if vectors.contains_key(&id) {
            return Err(Error::InvalidState(format!("id {id} already present")));
        }
        vectors.insert(id, vector.to_vec());
        Ok(())
    }

    /// Removes `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VectorNotFound`] if `id` is absent.
    pub fn remove(&self, id: u64) -> Result<()> {
        let mut vectors = self.vectors.write();
        if vectors.remove(&id).is_none() {
            return Err(Error::VectorNotFound(id));
        }
        Ok(())
    }

    /// Whether `id` is present.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.vectors.read().contains_key(&id)
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn size(&self) -> usize {
        self.vectors.read().len()
    }

    /// Configured vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Configured distance metric.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Estimated memory footprint in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let vectors = self.vectors.read();
        vectors.len() * (std::mem::size_of::<u64>() + self.dimension * std::mem::size_of::<f32>())
    }

    /// Returns the raw vector stored under `id`, if present.
    #[must_use]
    pub fn vector_for(&self, id: u64) -> Option<Vec<f32>> {
        self.vectors.read().get(&id).cloned()
    }

    /// Scores `query` against every stored vector, applies `params`'s
    /// filter, and returns the `k` closest matches ascending by distance
    /// alongside the number of vectors actually scored.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> (Vec<SearchResultItem>, u64) {
        if query.len() != self.dimension {
            return (Vec::new(), 0);
        }
        let vectors = self.vectors.read();
        let mut scored: Vec<SearchResultItem> = Vec::new();
        for (&id, vector) in vectors.iter() {
            if !params.passes(id) {
                continue;
            }
            let distance = self.metric.calculate(query, vector);
            scored.push(SearchResultItem { id, distance });
        }
        let total_candidates = scored.len() as u64;
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        (scored, total_candidates)
    }

    /// Replaces the entire index with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `records` contains a
    /// duplicate id.
    pub fn build(&self, records: &[VectorRecord]) -> Result<()> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id) {
                return Err(Error::InvalidParameter(format!("duplicate id {} in batch", record.id)));
            }
        }
        let mut vectors = self.vectors.write();
        vectors.clear();
        for record in records {
            vectors.insert(record.id, record.vector.clone());
        }
        Ok(())
    }

    /// Serializes to the bit-exact `FLAT` format (spec.md §6).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IoError`] if writing to the in-memory buffer fails
    /// (practically infallible; kept `Result` for parity with the other
    /// index kinds, whose serialization can fail).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let vectors = self.vectors.read();
        let mut buf = Vec::new();
        write_magic(&mut buf, MAGIC)?;
        write_u32(&mut buf, VERSION)?;
        write_u64(&mut buf, self.dimension as u64)?;
        write_u32(&mut buf, self.metric.to_code())?;
        write_u64(&mut buf, vectors.len() as u64)?;
        for (&id, vector) in vectors.iter() {
            write_u64(&mut buf, id)?;
            write_vector(&mut buf, vector)?;
        }
        Ok(buf)
    }

    /// Deserializes from the bit-exact `FLAT` format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if `bytes` is truncated, has a
    /// bad magic, or references an unknown metric code.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut r: &[u8] = bytes;
        read_magic(&mut r, MAGIC)?;
        let _version = read_u32(&mut r)?;
        let dimension = read_u64(&mut r)? as usize;
        let metric = DistanceMetric::from_code(read_u32(&mut r)?)?;
        let count = read_u64(&mut r)? as usize;
        let mut vectors = FxHashMap::default();
        vectors.reserve(count);
        for _ in 0..count {
            let id = read_u64(&mut r)?;
            let vector = read_vector(&mut r, dimension)?;
            vectors.insert(id, vector);
        }
        Ok(Self { dimension, metric, vectors: RwLock::new(vectors) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SearchParams {
        SearchParams::none()
    }

    #[test]
    fn exact_search_returns_nearest_ascending() {
        let index = FlatIndex::new(4, DistanceMetric::L2);
        index.add(1, &[0.0, 0.0, 0.0, 0.0]).unwrap();
        index.add(2, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add(3, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        index.add(4, &[2.0, 0.0, 0.0, 0.0]).unwrap();

        let (items, total) = index.search(&[0.1, 0.0, 0.0, 0.0], 2, &params());
        assert_eq!(total, 4);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[1].id, 2);
        assert!((items[0].distance - 0.1).abs() < 1e-5);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let index = FlatIndex::new(2, DistanceMetric::L2);
        index.add(1, &[0.0, 0.0]).unwrap();
        assert!(index.add(1, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn remove_missing_id_errors() {
        let index = FlatIndex::new(2, DistanceMetric::L2);
        assert!(matches!(index.remove(42), Err(Error::VectorNotFound(42))));
    }

    #[test]
    fn build_rejects_duplicate_ids_in_batch() {
        let index = FlatIndex::new(2, DistanceMetric::L2);
        let records = vec![VectorRecord::new(1, vec![0.0, 0.0]), VectorRecord::new(1, vec![1.0, 1.0])];
        assert!(index.build(&records).is_err());
        assert_eq!(index.size(), 0);
    }

    #[test]
    fn filter_excludes_ids_and_shrinks_total_candidates() {
        let index = FlatIndex::new(2, DistanceMetric::L2);
        index.add(1, &[0.0, 0.0]).unwrap();
        index.add(2, &[0.0, 0.1]).unwrap();
        let params = SearchParams::none().with_filter(|id| id != 1);
        let (items, total) = index.search(&[0.0, 0.0], 5, &params);
        assert_eq!(total, 1);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 2);
    }

    #[test]
    fn mismatched_dimension_query_returns_empty() {
        let index = FlatIndex::new(4, DistanceMetric::L2);
        index.add(1, &[0.0, 0.0, 0.0, 0.0]).unwrap();
        let (items, total) = index.search(&[0.0, 0.0], 1, &params());
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn serialize_round_trip_is_bit_exact() {
        let index = FlatIndex::new(3, DistanceMetric::Cosine);
        index.add(10, &[1.0, 2.0, 3.0]).unwrap();
        index.add(20, &[4.0, 5.0, 6.0]).unwrap();

        let bytes = index.serialize().unwrap();
        let restored = FlatIndex::deserialize(&bytes).unwrap();

        assert_eq!(restored.dimension(), 3);
        assert_eq!(restored.size(), 2);
        assert_eq!(restored.vector_for(10), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(restored.vector_for(20), Some(vec![4.0, 5.0, 6.0]));
    }
}
