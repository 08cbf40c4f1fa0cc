//! Property-based coverage via `proptest`, modeled on the teacher's
//! `proptest_tests` module (`index/hnsw/index_tests.rs`): small, focused
//! properties over randomly generated dimensions/vectors rather than
//! fixed example data.

use proptest::prelude::*;

use lynx::{
    calculate_distance, Config, Database, DistanceMetric, IndexType, SearchParams, VectorRecord,
};

fn vector_strategy(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-100.0f32..100.0, dim)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// L2 and Cosine distance are symmetric under argument swap, for any
    /// pair of equal-length vectors.
    #[test]
    fn prop_distance_is_symmetric(a in vector_strategy(8), b in vector_strategy(8)) {
        for metric in [DistanceMetric::L2, DistanceMetric::Cosine, DistanceMetric::DotProduct] {
            let ab = calculate_distance(&a, &b, metric);
            let ba = calculate_distance(&b, &a, metric);
            prop_assert!((ab - ba).abs() < 1e-3, "{metric:?} not symmetric: {ab} vs {ba}");
        }
    }

    /// L2 distance between a vector and itself is zero.
    #[test]
    fn prop_l2_distance_to_self_is_zero(v in vector_strategy(16)) {
        let d = calculate_distance(&v, &v, DistanceMetric::L2);
        prop_assert!(d.abs() < 1e-2, "L2 self-distance should be ~0, got {d}");
    }

    /// A `FlatIndex`-backed database's `search` never returns more than
    /// `k` items, for any `k` and any randomly sized population.
    #[test]
    fn prop_flat_search_returns_at_most_k(
        vectors in proptest::collection::vec(vector_strategy(8), 1usize..=40),
        k in 1usize..=20,
    ) {
        let config = Config::builder(8).index_type(IndexType::Flat).distance_metric(DistanceMetric::L2).build();
        let db = Database::create(config).unwrap();
        for (id, vector) in vectors.iter().enumerate() {
            db.insert(VectorRecord::new(id as u64, vector.clone())).unwrap();
        }

        let query = vec![0.0f32; 8];
        let result = db.search(&query, k, &SearchParams::none());
        prop_assert!(result.items.len() <= k);
        prop_assert!(result.items.len() <= vectors.len());
    }

    /// `size()` always equals the number of records successfully
    /// inserted minus those successfully removed, for an arbitrary
    /// interleaving of inserts and removes over a small id space.
    #[test]
    fn prop_size_tracks_successful_inserts_and_removes(
        ops in proptest::collection::vec((0u64..10, any::<bool>()), 1usize..=60),
    ) {
        let config = Config::builder(4).index_type(IndexType::Flat).build();
        let db = Database::create(config).unwrap();
        let mut expected = std::collections::HashSet::new();

        for (id, is_insert) in ops {
            if is_insert {
                if db.insert(VectorRecord::new(id, vec![id as f32; 4])).is_ok() {
                    expected.insert(id);
                }
            } else if db.remove(id).is_ok() {
                expected.remove(&id);
            }
        }

        prop_assert_eq!(db.size(), expected.len());
        for id in &expected {
            prop_assert!(db.contains(*id));
        }
    }

    /// `FlatIndex` serialize/deserialize round-trips every stored vector
    /// bit-for-bit, for an arbitrary population.
    #[test]
    fn prop_flat_serialize_round_trip_preserves_every_vector(
        vectors in proptest::collection::vec(vector_strategy(6), 0usize..=30),
    ) {
        use lynx::index::flat::FlatIndex;

        let index = FlatIndex::new(6, DistanceMetric::L2);
        for (id, vector) in vectors.iter().enumerate() {
            index.add(id as u64, vector).unwrap();
        }

        let bytes = index.serialize().unwrap();
        let restored = FlatIndex::deserialize(&bytes).unwrap();

        prop_assert_eq!(restored.size(), vectors.len());
        for (id, vector) in vectors.iter().enumerate() {
            prop_assert_eq!(restored.vector_for(id as u64), Some(vector.clone()));
        }
    }

    /// K-means never returns more centroids than requested, and never
    /// more than the number of input vectors.
    #[test]
    fn prop_kmeans_centroid_count_is_bounded(
        vectors in proptest::collection::vec(vector_strategy(4), 1usize..=50),
        k in 1usize..=20,
    ) {
        use lynx::kmeans::{train, KMeansConfig};

        let config = KMeansConfig { random_seed: Some(1), ..Default::default() };
        let centroids = train(&vectors, k, DistanceMetric::L2, &config);
        prop_assert!(centroids.len() <= k);
        prop_assert!(centroids.len() <= vectors.len());
        for centroid in &centroids {
            prop_assert_eq!(centroid.len(), 4);
        }
    }
}
