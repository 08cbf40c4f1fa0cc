//! Inverted-file (IVF) index: vectors are partitioned into clusters by a
//! trained k-means model, and a query only scores vectors inside the
//! `n_probe` closest clusters.
//!
//! Cheaper than [`crate::index::flat::FlatIndex`] at query time, at the
//! cost of approximate recall: a true nearest neighbor sitting in a
//! cluster that was not probed is missed.

use crate::codec::{
    read_magic, read_u32, read_u64, read_vector, write_magic, write_u32, write_u64, write_vector,
};
use crate::config::{IvfConfig, SearchParams};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::kmeans::{self, KMeansConfig};
use crate::record::{SearchResultItem, VectorRecord};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

const MAGIC: &[u8; 4] = b"IVFX";
const VERSION: u32 = 1;

/// One cluster's members, stored as parallel arrays so that removing a
/// member is a swap-pop on both arrays at once: O(1) amortized, no
/// reindexing of the rest of the list.
#[derive(Default)]
struct InvertedList {
    ids: Vec<u64>,
    vectors: Vec<Vec<f32>>,
}

impl InvertedList {
    fn push(&mut self, id: u64, vector: Vec<f32>) {
        self.ids.push(id);
        self.vectors.push(vector);
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    /// Swap-removes the member at `position`, returning the id that now
    /// occupies `position` (the one swapped in from the tail), if any.
    fn swap_remove(&mut self, position: usize) -> Option<u64> {
        self.ids.swap_remove(position);
        self.vectors.swap_remove(position);
        self.ids.get(position).copied()
    }
}

struct IvfState {
    centroids: Vec<Vec<f32>>,
    clusters: Vec<InvertedList>,
    /// id -> (cluster index, position within that cluster's parallel arrays).
    id_to_cluster: FxHashMap<u64, (usize, usize)>,
}

impl IvfState {
    fn empty() -> Self {
        Self { centroids: Vec::new(), clusters: Vec::new(), id_to_cluster: FxHashMap::default() }
    }

    fn size(&self) -> usize {
        self.id_to_cluster.len()
    }
}

/// Clustered approximate index.
pub struct IvfIndex {
    dimension: usize,
    metric: DistanceMetric,
    config: IvfConfig,
    state: RwLock<IvfState>,
}

impl IvfIndex {
    /// Creates an index with no trained centroids.
    #[must_use]
    pub fn new(dimension: usize, metric: DistanceMetric, config: IvfConfig) -> Self {
        Self { dimension, metric, config, state: RwLock::new(IvfState::empty()) }
    }

    /// Whether training has produced at least one centroid.
    #[must_use]
    pub fn is_built(&self) -> bool {
        !self.state.read().centroids.is_empty()
    }

    /// Trains `n_clusters` centroids over `records` (k-means, reusing
    /// this index's configured distance metric) and assigns every record
    /// to its nearest centroid. Replaces any prior state entirely.
    ///
    /// An empty `records` clears the index (`Ok`, not an error).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `records` contains a
    /// duplicate id.
    pub fn build(&self, records: &[VectorRecord]) -> Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id) {
                return Err(Error::InvalidParameter(format!("duplicate id {} in batch", record.id)));
            }
        }

        if records.is_empty() {
            *self.state.write() = IvfState::empty();
            return Ok(());
        }

        let raw: Vec<Vec<f32>> = records.iter().map(|r| r.vector.clone()).collect();
        let kmeans_config = KMeansConfig::default();
        let centroids = kmeans::train(&raw, self.config.n_clusters, self.metric, &kmeans_config);

        let mut state = IvfState::empty();
        state.clusters = (0..centroids.len()).map(|_| InvertedList::default()).collect();
        for record in records {
            let cluster = kmeans::nearest_centroid(&record.vector, &centroids, self.metric).0;
            let position = state.clusters[cluster].len();
            state.clusters[cluster].push(record.id, record.vector.clone());
            state.id_to_cluster.insert(record.id, (cluster, position));
        }
        state.centroids = centroids;

        *self.state.write() = state;
        Ok(())
    }

    /// Inserts `vector` under `id`.
    ///
    /// If no centroids exist yet, this initializes a single centroid
    /// equal to `vector` and one inverted list, so the database's
    /// incremental-insert path works even before the first `build`
    /// (spec.md §4.4). Otherwise `vector` is assigned to its nearest
    /// existing centroid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `id` is already present.
    pub fn add(&self, id: u64, vector: &[f32]) -> Result<()> {
        let mut state = self.state.write();
        if state.id_to_cluster.contains_key(&id) {
            return Err(Error::InvalidState(format!("id {id} already present")));
        }
        if state.centroids.is_empty() {
            state.centroids.push(vector.to_vec());
            state.clusters.push(InvertedList::default());
        }
        let cluster = kmeans::nearest_centroid(vector, &state.centroids, self.metric).0;
        let position = state.clusters[cluster].len();
        state.clusters[cluster].push(id, vector.to_vec());
        state.id_to_cluster.insert(id, (cluster, position));
        Ok(())
    }

    /// Removes `id` from its cluster via swap-pop on that cluster's
    /// parallel `ids`/`vectors` arrays: O(1) amortized, independent of
    /// cluster size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VectorNotFound`] if `id` is absent.
    pub fn remove(&self, id: u64) -> Result<()> {
        let mut state = self.state.write();
        let Some((cluster, position)) = state.id_to_cluster.remove(&id) else {
            return Err(Error::VectorNotFound(id));
        };
        if let Some(moved_id) = state.clusters[cluster].swap_remove(position) {
            state.id_to_cluster.insert(moved_id, (cluster, position));
        }
        Ok(())
    }

    /// Whether `id` is present.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.state.read().id_to_cluster.contains_key(&id)
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.read().size()
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

    /// Returns the raw vector stored under `id`, if present.
    #[must_use]
    pub fn vector_for(&self, id: u64) -> Option<Vec<f32>> {
        let state = self.state.read();
        let &(cluster, position) = state.id_to_cluster.get(&id)?;
        state.clusters[cluster].vectors.get(position).cloned()
    }

    /// Estimated memory footprint in bytes: stored vectors plus
    /// centroids plus per-cluster id lists.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let state = self.state.read();
        let vector_bytes =
            state.size() * (std::mem::size_of::<u64>() + self.dimension * std::mem::size_of::<f32>());
        let centroid_bytes = state.centroids.len() * self.dimension * std::mem::size_of::<f32>();
        let cluster_bytes: usize = state.clusters.iter().map(|c| c.len() * std::mem::size_of::<u64>()).sum();
        vector_bytes + centroid_bytes + cluster_bytes
    }

    /// Searches the `n_probe` clusters nearest to `query` (overridden by
    /// `params.n_probe`, clamped to `[1, n_clusters]`) and returns the `k`
    /// closest matches passing `params`'s filter, ascending by distance,
    /// alongside the number of vectors actually scored.
    ///
    /// Returns an empty result with zero candidates if the index has no
    /// centroids yet, or if `query`'s length does not match the
    /// configured dimension.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> (Vec<SearchResultItem>, u64) {
        if query.len() != self.dimension {
            return (Vec::new(), 0);
        }
        let state = self.state.read();
        if state.centroids.is_empty() {
            return (Vec::new(), 0);
        }

        let n_probe = params.n_probe.unwrap_or(self.config.n_probe);
        let n_probe = n_probe.max(1).min(state.centroids.len());

        let mut centroid_order: Vec<(usize, f32)> = state
            .centroids
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, self.metric.calculate(query, c)))
            .collect();
        centroid_order.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut scored: Vec<SearchResultItem> = Vec::new();
        for &(cluster_idx, _) in centroid_order.iter().take(n_probe) {
            let list = &state.clusters[cluster_idx];
            for (&id, vector) in list.ids.iter().zip(list.vectors.iter()) {
                if !params.passes(id) {
                    continue;
                }
                let distance = self.metric.calculate(query, vector);
                scored.push(SearchResultItem { id, distance });
            }
        }
        let total_candidates = scored.len() as u64;
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        (scored, total_candidates)
    }

    /// Serializes to the bit-exact `IVFX` format (spec.md §6): header,
    /// centroids, per-cluster member ids and vectors, then the
    /// `id -> cluster` map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IoError`] if writing to the in-memory buffer
    /// fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let state = self.state.read();
        let mut buf = Vec::new();
        write_magic(&mut buf, MAGIC)?;
        write_u32(&mut buf, VERSION)?;
        write_u64(&mut buf, self.dimension as u64)?;
        write_u32(&mut buf, self.metric.to_code())?;
        write_u64(&mut buf, state.centroids.len() as u64)?;
        write_u64(&mut buf, state.size() as u64)?;

        for centroid in &state.centroids {
            write_vector(&mut buf, centroid)?;
        }

        for cluster in &state.clusters {
            write_u64(&mut buf, cluster.len() as u64)?;
            for &id in &cluster.ids {
                write_u64(&mut buf, id)?;
            }
            for vector in &cluster.vectors {
                write_vector(&mut buf, vector)?;
            }
        }

        write_u64(&mut buf, state.id_to_cluster.len() as u64)?;
        for (&id, &(cluster, _)) in &state.id_to_cluster {
            write_u64(&mut buf, id)?;
            write_u64(&mut buf, cluster as u64)?;
        }
        Ok(buf)
    }

    /// Deserializes from the bit-exact `IVFX` format.
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
        let k = read_u64(&mut r)? as usize;
        let _total = read_u64(&mut r)?;

        let mut centroids = Vec::with_capacity(k);
        for _ in 0..k {
            centroids.push(read_vector(&mut r, dimension)?);
        }

        let mut clusters = Vec::with_capacity(k);
        let mut id_to_cluster = FxHashMap::default();
        for cluster_idx in 0..k {
            let list_size = read_u64(&mut r)? as usize;
            let mut ids = Vec::with_capacity(list_size);
            for _ in 0..list_size {
                ids.push(read_u64(&mut r)?);
            }
            let mut list = InvertedList::default();
            for (position, &id) in ids.iter().enumerate() {
                let vector = read_vector(&mut r, dimension)?;
                list.push(id, vector);
                id_to_cluster.insert(id, (cluster_idx, position));
            }
            clusters.push(list);
        }

        // The `id -> cluster` section is redundant with the per-cluster
        // id lists above (every id's cluster is already implied by which
        // list it appears in); it is still read here to stay on the
        // documented wire format, but discarded in favor of the
        // position-aware map built above.
        let map_size = read_u64(&mut r)? as usize;
        for _ in 0..map_size {
            let _id = read_u64(&mut r)?;
            let _cluster = read_u64(&mut r)?;
        }

        let n_probe = if k == 0 { IvfConfig::default().n_probe } else { k.min(IvfConfig::default().n_probe).max(1) };
        Ok(Self {
            dimension,
            metric,
            config: IvfConfig { n_clusters: k, n_probe },
            state: RwLock::new(IvfState { centroids, clusters, id_to_cluster }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_records() -> Vec<VectorRecord> {
        let mut records = Vec::new();
        let mut id = 0;
        for &(cx, cy) in &[(0.0, 0.0), (10.0, 10.0)] {
            for i in 0..10 {
                let jitter = (i as f32 % 3.0) * 0.1;
                records.push(VectorRecord::new(id, vec![cx + jitter, cy + jitter]));
                id += 1;
            }
        }
        records
    }

    #[test]
    fn unbuilt_index_returns_empty_search() {
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 2, n_probe: 1 });
        let (items, total) = index.search(&[0.0, 0.0], 5, &SearchParams::none());
        assert!(items.is_empty());
        assert_eq!(total, 0);
        assert!(!index.is_built());
    }

    #[test]
    fn build_assigns_every_record_to_a_cluster() {
        let records = grid_records();
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 2, n_probe: 2 });
        index.build(&records).unwrap();
        assert!(index.is_built());
        assert_eq!(index.size(), 20);
    }

    #[test]
    fn empty_build_clears_the_index() {
        let records = grid_records();
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 2, n_probe: 2 });
        index.build(&records).unwrap();
        index.build(&[]).unwrap();
        assert!(!index.is_built());
        assert_eq!(index.size(), 0);
    }

    #[test]
    fn search_probing_all_clusters_finds_nearest() {
        let records = grid_records();
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 2, n_probe: 2 });
        index.build(&records).unwrap();

        let (items, _) = index.search(&[0.0, 0.0], 3, &SearchParams::none());
        assert!(!items.is_empty());
        assert!(items[0].distance <= items.last().unwrap().distance);
    }

    #[test]
    fn n_probe_of_one_restricts_candidates_versus_full_probe() {
        let records = grid_records();
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 2, n_probe: 2 });
        index.build(&records).unwrap();

        let (_, full_total) = index.search(&[0.0, 0.0], 20, &SearchParams::none());
        let narrow_params = SearchParams::none().with_n_probe(1);
        let (_, narrow_total) = index.search(&[0.0, 0.0], 20, &narrow_params);
        assert!(narrow_total <= full_total);
    }

    #[test]
    fn add_auto_initializes_first_centroid() {
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 4, n_probe: 1 });
        index.add(1, &[1.0, 1.0]).unwrap();
        assert!(index.is_built());
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn add_and_remove_after_build() {
        let records = grid_records();
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 2, n_probe: 2 });
        index.build(&records).unwrap();

        index.add(999, &[5.0, 5.0]).unwrap();
        assert!(index.contains(999));
        index.remove(999).unwrap();
        assert!(!index.contains(999));
        assert!(matches!(index.remove(999), Err(Error::VectorNotFound(999))));
    }

    #[test]
    fn serialize_round_trip_preserves_clusters_and_centroids() {
        let records = grid_records();
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 2, n_probe: 2 });
        index.build(&records).unwrap();

        let bytes = index.serialize().unwrap();
        let restored = IvfIndex::deserialize(&bytes).unwrap();

        assert_eq!(restored.size(), 20);
        assert!(restored.is_built());
        for record in &records {
            assert_eq!(restored.vector_for(record.id), Some(record.vector.clone()));
        }
    }

    #[test]
    fn remove_via_swap_pop_does_not_disturb_surviving_members() {
        let records = grid_records();
        let index = IvfIndex::new(2, DistanceMetric::L2, IvfConfig { n_clusters: 1, n_probe: 1 });
        index.build(&records).unwrap();

        // Remove every id but the last one inserted into the (single)
        // cluster, in ascending order, so each removal swap-pops a
        // different surviving id into the freed slot.
        for id in 0..19u64 {
            index.remove(id).unwrap();
            assert!(!index.contains(id));
        }
        assert!(index.contains(19));
        assert_eq!(index.size(), 1);
        assert_eq!(index.vector_for(19), Some(records[19].vector.clone()));

        let (items, _) = index.search(&[10.0, 10.0], 1, &SearchParams::none());
        assert_eq!(items[0].id, 19);
    }
}
