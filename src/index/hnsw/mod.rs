//! Hierarchical Navigable Small World graph index.
//!
//! The hardest subsystem in the crate: a multi-layer proximity graph where
//! every node holds its vector plus a per-layer neighbor list, searched by
//! greedy descent through the upper layers followed by a beam search
//! (`search_layer`) at layer 0.
//!
//! Submodules split the algorithm the way the graph itself is organized:
//! [`insert`] (the insertion algorithm and its bidirectional-connection
//! bookkeeping), [`search`] (`search_layer` and the greedy descent used
//! both during insertion and at query time), [`neighbors`] (heuristic
//! neighbor selection and degree-cap pruning), [`persistence`]
//! (`serialize`/`deserialize`).

mod insert;
mod neighbors;
mod persistence;
mod search;

use crate::config::{HnswConfig, SearchParams};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::record::{SearchResultItem, VectorRecord};
use crate::rng::Rng;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Arena index into [`HnswInner::nodes`]. Stable for a node's lifetime;
/// reused only across a full [`HnswIndex::optimize_graph`] rebuild, never
/// while the node it named is still live.
pub(crate) type NodeId = usize;

/// A single graph node: its vector, the highest layer it participates
/// in, and its neighbor list at every layer from 0 to `max_layer`.
pub(crate) struct Node {
    pub(crate) id: u64,
    pub(crate) vector: Vec<f32>,
    pub(crate) max_layer: usize,
    pub(crate) neighbors: Vec<Vec<NodeId>>,
}

/// Mutable graph state behind [`HnswIndex`]'s single coarse lock.
///
/// Every other index kind in this crate uses the same lock-per-call
/// shape; HNSW additionally needs mutual exclusion across its own
/// multi-step insertion algorithm, so one `RwLock` covers the whole
/// struct rather than a lock per field. This is coarser than the
/// teacher's fine-grained per-layer node locks, which exist there to
/// serve that codebase's own concurrency budget; this crate's contract
/// (spec.md §5) only requires that the *database's* outer lock make the
/// index-internal lock a no-op in the common case, which a single lock
/// satisfies and a finer one would not simplify.
///
/// Removed nodes leave a `None` tombstone rather than compacting the
/// arena (spec.md §9): swap-pop would require rewriting every neighbor
/// reference to the moved slot, which a tombstone avoids entirely at the
/// cost of wasted (but bounded) arena space until the next
/// `optimize_graph`.
pub(crate) struct HnswInner {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) id_to_node: FxHashMap<u64, NodeId>,
    pub(crate) entry_point: Option<NodeId>,
    pub(crate) entry_point_layer: usize,
    pub(crate) rng: Rng,
}

impl HnswInner {
    fn empty(random_seed: Option<u64>) -> Self {
        Self {
            nodes: Vec::new(),
            id_to_node: FxHashMap::default(),
            entry_point: None,
            entry_point_layer: 0,
            rng: Rng::new(random_seed),
        }
    }
}

/// Graph-based approximate index.
pub struct HnswIndex {
    dimension: usize,
    metric: DistanceMetric,
    config: HnswConfig,
    /// Target degree for layers above 0.
    m: usize,
    /// Degree cap for layers above 0 (equal to `m`).
    m_max: usize,
    /// Degree cap at layer 0 (`2 * m`).
    m_max0: usize,
    /// Level-generation constant `1 / ln(m)`.
    ml: f64,
    ef_construction: usize,
    ef_search: usize,
    inner: RwLock<HnswInner>,
}

/// Caps the exponentially-distributed level draw so a single unlucky
/// sample cannot allocate an absurd number of empty layers (spec.md
/// §4.5: "capped by a reasonable maximum (e.g. 16)").
const MAX_LEVEL: usize = 15;

fn compute_ml(m: usize) -> f64 {
    1.0 / (m.max(2) as f64).ln()
}

fn random_level(rng: &Rng, ml: f64) -> usize {
    let level = (-rng.next_open01().ln() * ml).floor();
    if level < 0.0 {
        0
    } else {
        (level as usize).min(MAX_LEVEL)
    }
}

impl HnswIndex {
    /// Creates an empty graph with the given construction/search
    /// parameters frozen for this index's lifetime.
    #[must_use]
    pub fn new(dimension: usize, metric: DistanceMetric, config: HnswConfig) -> Self {
        let m = config.m.max(1);
        let ml = compute_ml(m);
        let ef_construction = config.ef_construction.max(1);
        let ef_search = config.ef_search.max(1);
        let random_seed = config.random_seed;
        Self {
            dimension,
            metric,
            config,
            m,
            m_max: m,
            m_max0: m * 2,
            ml,
            ef_construction,
            ef_search,
            inner: RwLock::new(HnswInner::empty(random_seed)),
        }
    }

    /// Whether `id` is present.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.inner.read().id_to_node.contains_key(&id)
    }

    /// Number of live (non-tombstoned) nodes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.read().id_to_node.len()
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
        let inner = self.inner.read();
        let idx = *inner.id_to_node.get(&id)?;
        inner.nodes[idx].as_ref().map(|n| n.vector.clone())
    }

    /// Estimated memory footprint in bytes: `O(N*D*4 + N*M_max0*8)`
    /// (spec.md §4.5 "Complexity"), the lower layer's neighbor lists
    /// dominating.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        let inner = self.inner.read();
        let n = inner.id_to_node.len();
        n * self.dimension * std::mem::size_of::<f32>() + n * self.m_max0 * std::mem::size_of::<u64>()
    }

    /// Removes `id`. Erases its neighbor references from every layer of
    /// every node that pointed at it, then re-selects the entry point
    /// (surviving node with highest `max_layer`, ties broken by lowest
    /// id) if `id` was the entry point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VectorNotFound`] if `id` is absent.
    pub fn remove(&self, id: u64) -> Result<()> {
        let mut inner = self.inner.write();
        let Some(node_idx) = inner.id_to_node.remove(&id) else {
            return Err(Error::VectorNotFound(id));
        };
        let max_layer = inner.nodes[node_idx].as_ref().expect("id_to_node entry has a live node").max_layer;
        for layer in 0..=max_layer {
            let referers: Vec<NodeId> = inner.nodes[node_idx].as_ref().unwrap().neighbors[layer].clone();
            for other in referers {
                if let Some(node) = inner.nodes[other].as_mut() {
                    if layer < node.neighbors.len() {
                        node.neighbors[layer].retain(|&n| n != node_idx);
                    }
                }
            }
        }
        inner.nodes[node_idx] = None;

        if inner.entry_point == Some(node_idx) {
            let mut best: Option<(NodeId, usize, u64)> = None;
            for (idx, slot) in inner.nodes.iter().enumerate() {
                if let Some(node) = slot {
                    let candidate = (idx, node.max_layer, node.id);
                    best = Some(match best {
                        None => candidate,
                        Some(b) if candidate.1 > b.1 || (candidate.1 == b.1 && candidate.2 < b.2) => candidate,
                        Some(b) => b,
                    });
                }
            }
            match best {
                Some((idx, layer, _)) => {
                    inner.entry_point = Some(idx);
                    inner.entry_point_layer = layer;
                }
                None => {
                    inner.entry_point = None;
                    inner.entry_point_layer = 0;
                }
            }
        }
        Ok(())
    }

    /// Replaces the entire graph with `records`, inserted in the order
    /// given.
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
        let mut inner = self.inner.write();
        *inner = HnswInner::empty(self.config.random_seed);
        for record in records {
            self.insert_locked(&mut inner, record.id, record.vector.clone());
        }
        Ok(())
    }

    /// Reconstructs the graph from scratch: pulls every live vector out
    /// in ascending-id order, resets level assignments, and re-inserts
    /// each through the standard insertion algorithm. This is the
    /// long-running operation the write-log maintenance pattern
    /// (spec.md §4.7) exists to run off the hot path.
    pub fn optimize_graph(&self) {
        let mut inner = self.inner.write();
        let mut records: Vec<(u64, Vec<f32>)> =
            inner.nodes.iter().filter_map(|slot| slot.as_ref().map(|n| (n.id, n.vector.clone()))).collect();
        records.sort_by_key(|(id, _)| *id);

        let mut fresh = HnswInner::empty(self.config.random_seed);
        for (id, vector) in records {
            self.insert_locked(&mut fresh, id, vector);
        }
        *inner = fresh;
    }
}
