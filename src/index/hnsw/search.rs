//! `search_layer` beam search, the greedy single-nearest descent used
//! through the upper layers, and the top-level query path (spec.md §4.5
//! "`search_layer`" and "Search").

use super::{HnswIndex, HnswInner, NodeId};
use crate::config::SearchParams;
use crate::distance::DistanceMetric;
use crate::record::SearchResultItem;

use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Clone, Copy)]
struct Scored {
    distance: f32,
    node: NodeId,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for Scored {}
impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Scored {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

/// A single-nearest greedy walk at each layer from `from_layer` down to
/// `to_layer` (inclusive), refining the current nearest node at every
/// step. Used to descend the upper layers before the beam search at the
/// target insertion/search layer takes over.
///
/// Returns `(nearest_node, nodes_scored)`.
pub(super) fn greedy_descend(
    inner: &HnswInner,
    query: &[f32],
    start: NodeId,
    from_layer: usize,
    to_layer: usize,
    metric: DistanceMetric,
) -> (NodeId, usize) {
    let mut current = start;
    let mut scored = 0usize;
    if from_layer < to_layer {
        return (current, scored);
    }
    for lc in (to_layer..=from_layer).rev() {
        loop {
            let Some(node) = inner.nodes[current].as_ref() else { break };
            let mut best = current;
            let mut best_dist = metric.calculate(query, &node.vector);
            scored += 1;
            if lc >= node.neighbors.len() {
                break;
            }
            let mut improved = false;
            for &neighbor in &node.neighbors[lc] {
                let Some(n) = inner.nodes[neighbor].as_ref() else { continue };
                let d = metric.calculate(query, &n.vector);
                scored += 1;
                if d < best_dist {
                    best_dist = d;
                    best = neighbor;
                    improved = true;
                }
            }
            current = best;
            if !improved {
                break;
            }
        }
    }
    (current, scored)
}

/// Beam search at a single layer: maintains a min-heap of candidates to
/// visit and a max-heap of the best `ef` results seen so far, expanding
/// through each visited node's neighbor list at layer `lc` until no
/// unvisited candidate could improve the result set.
///
/// Returns `(results_sorted_ascending, nodes_scored)`.
pub(super) fn search_layer(
    inner: &HnswInner,
    query: &[f32],
    entry_points: &[NodeId],
    ef: usize,
    lc: usize,
    metric: DistanceMetric,
) -> (Vec<NodeId>, usize) {
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    let mut candidates: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();
    let mut results: BinaryHeap<Scored> = BinaryHeap::new();

    for &ep in entry_points {
        let Some(node) = inner.nodes[ep].as_ref() else { continue };
        if !visited.insert(ep) {
            continue;
        }
        let d = metric.calculate(query, &node.vector);
        candidates.push(Reverse(Scored { distance: d, node: ep }));
        results.push(Scored { distance: d, node: ep });
    }

    while let Some(Reverse(current)) = candidates.pop() {
        if results.len() >= ef {
            if let Some(farthest) = results.peek() {
                if current.distance > farthest.distance {
                    break;
                }
            }
        }
        let Some(node) = inner.nodes[current.node].as_ref() else { continue };
        if lc >= node.neighbors.len() {
            continue;
        }
        for &neighbor in &node.neighbors[lc] {
            if !visited.insert(neighbor) {
                continue;
            }
            let Some(n) = inner.nodes[neighbor].as_ref() else { continue };
            let d = metric.calculate(query, &n.vector);
            let should_push = results.len() < ef || results.peek().is_some_and(|f| d < f.distance);
            if should_push {
                candidates.push(Reverse(Scored { distance: d, node: neighbor }));
                results.push(Scored { distance: d, node: neighbor });
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let scored = visited.len();
    let sorted = results.into_sorted_vec();
    (sorted.into_iter().map(|s| s.node).collect(), scored)
}

impl HnswIndex {
    /// Greedy-descends from the entry point through the upper layers,
    /// then runs a beam search at layer 0 with `ef = max(ef_search, k)`.
    /// Applies `params`'s filter to the final candidate set (filtered
    /// entries are discarded without refill; recall can degrade under a
    /// selective filter, per spec.md §4.5 and the "do not reimplement as
    /// filter-aware traversal" design note).
    ///
    /// Returns an empty result if the graph is empty or `query`'s length
    /// does not match the configured dimension.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> (Vec<SearchResultItem>, u64) {
        if query.len() != self.dimension {
            return (Vec::new(), 0);
        }
        let inner = self.inner.read();
        let Some(entry_point) = inner.entry_point else {
            return (Vec::new(), 0);
        };
        let entry_layer = inner.entry_point_layer;

        let (current, descend_scored) = if entry_layer >= 1 {
            greedy_descend(&inner, query, entry_point, entry_layer, 1, self.metric)
        } else {
            (entry_point, 0)
        };

        let ef = params.ef_search.unwrap_or(self.ef_search).max(k);
        let (candidates, layer0_scored) = search_layer(&inner, query, &[current], ef, 0, self.metric);

        let mut items: Vec<SearchResultItem> = Vec::with_capacity(candidates.len());
        for node_idx in candidates {
            let Some(node) = inner.nodes[node_idx].as_ref() else { continue };
            if !params.passes(node.id) {
                continue;
            }
            let distance = self.metric.calculate(query, &node.vector);
            items.push(SearchResultItem { id: node.id, distance });
        }
        items.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        items.truncate(k);

        (items, (descend_scored + layer0_scored) as u64)
    }
}
