//! Heuristic neighbor selection and bidirectional edge maintenance
//! (spec.md §4.5 "Heuristic neighbor selection").

use super::{HnswInner, NodeId};
use crate::distance::DistanceMetric;

/// Selects up to `cap` neighbors from `candidates` (already sorted
/// ascending by distance to `query`, as produced by `search_layer`).
///
/// A candidate `c` is admitted only if it is closer to `query` than to
/// every neighbor already selected — this prunes neighbors that are
/// "redundant" given an already-chosen closer one, trading a few
/// exact-rank positions for a graph that stays navigable as it grows.
pub(super) fn select_neighbors(
    inner: &HnswInner,
    query: &[f32],
    candidates: &[NodeId],
    cap: usize,
    metric: DistanceMetric,
) -> Vec<NodeId> {
    let mut selected: Vec<NodeId> = Vec::with_capacity(cap.min(candidates.len()));
    for &candidate in candidates {
        if selected.len() >= cap {
            break;
        }
        let Some(candidate_node) = inner.nodes[candidate].as_ref() else { continue };
        let distance_to_query = metric.calculate(query, &candidate_node.vector);

        let mut admit = true;
        for &already in &selected {
            let Some(already_node) = inner.nodes[already].as_ref() else { continue };
            let distance_to_already = metric.calculate(&candidate_node.vector, &already_node.vector);
            if distance_to_already < distance_to_query {
                admit = false;
                break;
            }
        }
        if admit {
            selected.push(candidate);
        }
    }
    selected
}

/// Adds a bidirectional edge between `a` and `b` at layer `lc`, then
/// shrinks either endpoint's neighbor list back to `cap` if the new edge
/// pushed it over the degree cap.
pub(super) fn add_bidirectional_connection(
    inner: &mut HnswInner,
    a: NodeId,
    b: NodeId,
    lc: usize,
    cap: usize,
    metric: DistanceMetric,
) {
    if let Some(node) = inner.nodes[a].as_mut() {
        if lc < node.neighbors.len() && !node.neighbors[lc].contains(&b) {
            node.neighbors[lc].push(b);
        }
    }
    if let Some(node) = inner.nodes[b].as_mut() {
        if lc < node.neighbors.len() && !node.neighbors[lc].contains(&a) {
            node.neighbors[lc].push(a);
        }
    }
    shrink_if_over_cap(inner, a, lc, cap, metric);
    shrink_if_over_cap(inner, b, lc, cap, metric);
}

/// Re-runs the heuristic over `node`'s current neighbor set at layer
/// `lc` and truncates to `cap` if it exceeds the cap.
fn shrink_if_over_cap(inner: &mut HnswInner, node: NodeId, lc: usize, cap: usize, metric: DistanceMetric) {
    let Some(n) = inner.nodes[node].as_ref() else { return };
    if lc >= n.neighbors.len() || n.neighbors[lc].len() <= cap {
        return;
    }
    let vector = n.vector.clone();
    let mut candidates = n.neighbors[lc].clone();
    candidates.sort_by(|&x, &y| {
        let dx = inner.nodes[x].as_ref().map_or(f32::MAX, |nx| metric.calculate(&vector, &nx.vector));
        let dy = inner.nodes[y].as_ref().map_or(f32::MAX, |ny| metric.calculate(&vector, &ny.vector));
        dx.total_cmp(&dy)
    });
    let shrunk = select_neighbors(inner, &vector, &candidates, cap, metric);
    if let Some(n) = inner.nodes[node].as_mut() {
        n.neighbors[lc] = shrunk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::hnsw::HnswIndex;

    fn graph_with_nodes(vectors: &[[f32; 2]]) -> HnswIndex {
        let index = HnswIndex::new(2, DistanceMetric::L2, crate::config::HnswConfig {
            m: 4,
            ef_construction: 16,
            ef_search: 16,
            max_elements: 100,
            random_seed: Some(3),
        });
        for (i, v) in vectors.iter().enumerate() {
            index.add(i as u64, v).unwrap();
        }
        index
    }

    #[test]
    fn select_neighbors_respects_cap() {
        let index = graph_with_nodes(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]]);
        let inner = index.inner.read();
        let candidates: Vec<NodeId> = (0..5).collect();
        let selected = select_neighbors(&inner, &[0.0, 0.0], &candidates, 2, DistanceMetric::L2);
        assert!(selected.len() <= 2);
    }

    #[test]
    fn bidirectional_connection_is_visible_from_both_sides() {
        let index = graph_with_nodes(&[[0.0, 0.0], [1.0, 0.0]]);
        let mut inner = index.inner.write();
        add_bidirectional_connection(&mut inner, 0, 1, 0, 4, DistanceMetric::L2);
        assert!(inner.nodes[0].as_ref().unwrap().neighbors[0].contains(&1));
        assert!(inner.nodes[1].as_ref().unwrap().neighbors[0].contains(&0));
    }
}
