//! Insertion algorithm (spec.md §4.5 "Insertion algorithm").

use super::neighbors::{add_bidirectional_connection, select_neighbors};
use super::search::{greedy_descend, search_layer};
use super::{random_level, HnswIndex, HnswInner, Node, NodeId};
use crate::error::{Error, Result};

impl HnswIndex {
    /// Inserts `vector` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if `id` is already present.
    pub fn add(&self, id: u64, vector: &[f32]) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.id_to_node.contains_key(&id) {
            return Err(Error::InvalidState(format!("id {id} already present")));
        }
        self.insert_locked(&mut inner, id, vector.to_vec());
        Ok(())
    }

    /// Core insertion, assuming the caller already holds the write lock
    /// and has checked `id` is not already present. Shared by `add`,
    /// `build`, and `optimize_graph`, which all need to perform several
    /// insertions under a single lock acquisition.
    pub(super) fn insert_locked(&self, inner: &mut HnswInner, id: u64, vector: Vec<f32>) {
        let level = random_level(&inner.rng, self.ml);
        let node_idx: NodeId = inner.nodes.len();
        inner.nodes.push(Some(Node { id, vector: vector.clone(), max_layer: level, neighbors: vec![Vec::new(); level + 1] }));
        inner.id_to_node.insert(id, node_idx);

        let Some(entry_point) = inner.entry_point else {
            inner.entry_point = Some(node_idx);
            inner.entry_point_layer = level;
            return;
        };
        let entry_layer = inner.entry_point_layer;

        let mut current = entry_point;
        if entry_layer > level {
            current = greedy_descend(inner, &vector, entry_point, entry_layer, level + 1, self.metric).0;
        }

        let mut entry_points = vec![current];
        let top_layer = level.min(entry_layer);
        for lc in (0..=top_layer).rev() {
            let (candidates, _) = search_layer(inner, &vector, &entry_points, self.ef_construction, lc, self.metric);
            let cap = if lc == 0 { self.m_max0 } else { self.m_max };
            let selected = select_neighbors(inner, &vector, &candidates, cap, self.metric);

            for &neighbor in &selected {
                add_bidirectional_connection(inner, node_idx, neighbor, lc, cap, self.metric);
            }
            entry_points = candidates;
        }

        if level > entry_layer {
            inner.entry_point = Some(node_idx);
            inner.entry_point_layer = level;
        }
    }
}
