//! K-means++ trainer used by the IVF index to produce cluster centroids.

use crate::distance::DistanceMetric;
use crate::rng::Rng;

/// Convergence/iteration limits for [`train`].
#[derive(Debug, Clone, Copy)]
pub struct KMeansConfig {
    /// Maximum Lloyd iterations before giving up.
    pub max_iterations: usize,
    /// Halt once the maximum centroid movement between iterations drops
    /// below this value.
    pub convergence_threshold: f32,
    /// Seed for k-means++ initialization. `None` seeds from entropy.
    pub random_seed: Option<u64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-4,
            random_seed: None,
        }
    }
}

/// Trains `k` centroids over `vectors` under `metric`.
///
/// If `k > vectors.len()`, `k` is silently reduced to `vectors.len()` (one
/// cluster per vector). Returns an empty vector if `vectors` is empty.
///
/// Uses k-means++ initialization (each successive centroid sampled with
/// probability proportional to its squared distance from the nearest
/// already-chosen centroid) followed by standard Lloyd iteration: assign
/// each vector to its nearest centroid, recompute centroids as the
/// coordinate-wise mean of their members, repeat until the largest
/// centroid movement falls under `convergence_threshold` or
/// `max_iterations` is reached. An update that empties a cluster
/// reinitializes that centroid to a randomly chosen input vector, so no
/// cluster starves permanently.
#[must_use]
pub fn train(
    vectors: &[Vec<f32>],
    k: usize,
    metric: DistanceMetric,
    config: &KMeansConfig,
) -> Vec<Vec<f32>> {
    if vectors.is_empty() {
        return Vec::new();
    }
    let k = k.min(vectors.len()).max(1);
    let rng = Rng::new(config.random_seed);

    let mut centroids = init_plus_plus(vectors, k, metric, &rng);

    for _ in 0..config.max_iterations {
        let assignments = assign(vectors, &centroids, metric);
        let (new_centroids, max_move) =
            update_centroids(vectors, &assignments, &centroids, &rng);
        centroids = new_centroids;
        if max_move < config.convergence_threshold {
            break;
        }
    }

    centroids
}

/// Assigns each vector to the index of its nearest centroid.
fn assign(vectors: &[Vec<f32>], centroids: &[Vec<f32>], metric: DistanceMetric) -> Vec<usize> {
    vectors
        .iter()
        .map(|v| nearest_centroid(v, centroids, metric).0)
        .collect()
}

/// Returns `(index, distance)` of the centroid nearest to `vector`.
///
/// Panics if `centroids` is empty; every caller in this module guarantees
/// at least one centroid exists before calling this.
pub(crate) fn nearest_centroid(
    vector: &[f32],
    centroids: &[Vec<f32>],
    metric: DistanceMetric,
) -> (usize, f32) {
    let mut best_idx = 0;
    let mut best_dist = f32::MAX;
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = metric.calculate(vector, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }
    (best_idx, best_dist)
}

fn update_centroids(
    vectors: &[Vec<f32>],
    assignments: &[usize],
    previous: &[Vec<f32>],
    rng: &Rng,
) -> (Vec<Vec<f32>>, f32) {
    let k = previous.len();
    let dim = previous[0].len();
    let mut sums = vec![vec![0.0f32; dim]; k];
    let mut counts = vec![0usize; k];

    for (vector, &cluster) in vectors.iter().zip(assignments.iter()) {
        counts[cluster] += 1;
        for (sum_dim, &value) in sums[cluster].iter_mut().zip(vector.iter()) {
            *sum_dim += value;
        }
    }

    let mut new_centroids = Vec::with_capacity(k);
    let mut max_move = 0.0f32;

    for cluster in 0..k {
        let centroid = if counts[cluster] == 0 {
            // Empty cluster: reinitialize to a random input vector rather
            // than leaving it to drift off into irrelevance.
            vectors[rng.next_below(vectors.len())].clone()
        } else {
            let n = counts[cluster] as f32;
            sums[cluster].iter().map(|&s| s / n).collect()
        };
        let movement = crate::distance::distance_l2(&centroid, &previous[cluster]);
        max_move = max_move.max(movement);
        new_centroids.push(centroid);
    }

    (new_centroids, max_move)
}

/// k-means++ initialization: first centroid uniform at random, each
/// subsequent centroid sampled with probability proportional to its
/// squared distance from the nearest already-chosen centroid.
fn init_plus_plus(
    vectors: &[Vec<f32>],
    k: usize,
    metric: DistanceMetric,
    rng: &Rng,
) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    let first = rng.next_below(vectors.len());
    centroids.push(vectors[first].clone());

    while centroids.len() < k {
        let weights: Vec<f32> = vectors
            .iter()
            .map(|v| {
                let (_, dist) = nearest_centroid(v, &centroids, metric);
                dist * dist
            })
            .collect();
        let total: f64 = weights.iter().map(|&w| w as f64).sum();
        let next_idx = if total <= 0.0 {
            // Every remaining vector is already a chosen centroid (or
            // coincides with one); fall back to uniform sampling so
            // progress is still made.
            rng.next_below(vectors.len())
        } else {
            let mut target = rng.next_open01() * total;
            let mut chosen = vectors.len() - 1;
            for (idx, &w) in weights.iter().enumerate() {
                target -= w as f64;
                if target <= 0.0 {
                    chosen = idx;
                    break;
                }
            }
            chosen
        };
        centroids.push(vectors[next_idx].clone());
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_vectors() -> Vec<Vec<f32>> {
        let mut vectors = Vec::new();
        for &(cx, cy) in &[(0.0, 0.0), (10.0, 10.0), (-10.0, 10.0)] {
            for i in 0..20 {
                let jitter = (i as f32 % 5.0) * 0.1;
                vectors.push(vec![cx + jitter, cy + jitter]);
            }
        }
        vectors
    }

    #[test]
    fn trains_requested_number_of_centroids() {
        let vectors = grid_vectors();
        let config = KMeansConfig { random_seed: Some(1), ..Default::default() };
        let centroids = train(&vectors, 3, DistanceMetric::L2, &config);
        assert_eq!(centroids.len(), 3);
    }

    #[test]
    fn reduces_k_when_greater_than_n() {
        let vectors = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let config = KMeansConfig { random_seed: Some(1), ..Default::default() };
        let centroids = train(&vectors, 10, DistanceMetric::L2, &config);
        assert_eq!(centroids.len(), 2);
    }

    #[test]
    fn empty_input_yields_no_centroids() {
        let config = KMeansConfig::default();
        let centroids = train(&[], 5, DistanceMetric::L2, &config);
        assert!(centroids.is_empty());
    }

    #[test]
    fn centroids_land_near_true_cluster_centers() {
        let vectors = grid_vectors();
        let config = KMeansConfig { random_seed: Some(42), ..Default::default() };
        let centroids = train(&vectors, 3, DistanceMetric::L2, &config);

        let expected = [[0.0, 0.0], [10.0, 10.0], [-10.0, 10.0]];
        for exp in &expected {
            let closest = centroids
                .iter()
                .map(|c| crate::distance::distance_l2(c, exp))
                .fold(f32::MAX, f32::min);
            assert!(closest < 1.0, "no centroid near {exp:?}, closest dist {closest}");
        }
    }

    #[test]
    fn is_reproducible_with_same_seed() {
        let vectors = grid_vectors();
        let config = KMeansConfig { random_seed: Some(99), ..Default::default() };
        let a = train(&vectors, 3, DistanceMetric::L2, &config);
        let b = train(&vectors, 3, DistanceMetric::L2, &config);
        assert_eq!(a, b);
    }
}
