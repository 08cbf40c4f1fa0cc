//! End-to-end scenarios straight out of the spec's testable-properties list:
//! each function here is one named scenario, driven only through the public
//! `Database` surface (no internal types), the way `tests/e2e_complete.rs`
//! drives the teacher crate through its `Collection` surface.

use std::collections::HashSet;

use lynx::{Config, Database, DistanceMetric, HnswConfig, IndexType, IvfConfig, SearchParams, VectorRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

fn random_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn flat_ground_truth(vectors: &[(u64, Vec<f32>)], query: &[f32], k: usize) -> Vec<u64> {
    let mut scored: Vec<(u64, f32)> =
        vectors.iter().map(|(id, v)| (*id, lynx::calculate_distance(query, v, DistanceMetric::Cosine))).collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(k);
    scored.into_iter().map(|(id, _)| id).collect()
}

fn recall_at_k(retrieved: &[u64], ground_truth: &[u64]) -> f64 {
    if ground_truth.is_empty() {
        return 1.0;
    }
    let truth: HashSet<u64> = ground_truth.iter().copied().collect();
    let hits = retrieved.iter().filter(|id| truth.contains(id)).count();
    hits as f64 / ground_truth.len() as f64
}

/// Scenario A — Flat exact search.
#[test]
fn scenario_a_flat_exact_search() {
    let config = Config::builder(4).index_type(IndexType::Flat).distance_metric(DistanceMetric::L2).build();
    let db = Database::create(config).unwrap();

    db.insert(VectorRecord::new(1, vec![0.0, 0.0, 0.0, 0.0])).unwrap();
    db.insert(VectorRecord::new(2, vec![1.0, 0.0, 0.0, 0.0])).unwrap();
    db.insert(VectorRecord::new(3, vec![0.0, 1.0, 0.0, 0.0])).unwrap();
    db.insert(VectorRecord::new(4, vec![2.0, 0.0, 0.0, 0.0])).unwrap();

    let result = db.search(&[0.1, 0.0, 0.0, 0.0], 2, &SearchParams::none());
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].id, 1);
    assert!((result.items[0].distance - 0.1).abs() < 1e-5);
    assert_eq!(result.items[1].id, 2);
    assert!((result.items[1].distance - 0.9).abs() < 1e-5);
}

/// Scenario B — HNSW recall against brute-force ground truth, averaged
/// over 100 random queries.
#[test]
fn scenario_b_hnsw_recall_is_at_least_95_percent() {
    let dim = 128;
    let mut rng = StdRng::seed_from_u64(42);

    let config = Config::builder(dim)
        .index_type(IndexType::Hnsw)
        .distance_metric(DistanceMetric::Cosine)
        .hnsw(HnswConfig { m: 16, ef_construction: 200, ef_search: 200, max_elements: 1_000_000, random_seed: Some(42) })
        .build();
    let db = Database::create(config).unwrap();

    let mut all_vectors = Vec::with_capacity(1000);
    for id in 0..1000u64 {
        let vector = random_vector(&mut rng, dim);
        db.insert(VectorRecord::new(id, vector.clone())).unwrap();
        all_vectors.push((id, vector));
    }

    let mut recalls = Vec::with_capacity(100);
    for _ in 0..100 {
        let query = random_vector(&mut rng, dim);
        let ground_truth = flat_ground_truth(&all_vectors, &query, 10);
        let result = db.search(&query, 10, &SearchParams::none());
        let retrieved: Vec<u64> = result.items.iter().map(|item| item.id).collect();
        recalls.push(recall_at_k(&retrieved, &ground_truth));
    }

    let mean_recall = recalls.iter().sum::<f64>() / recalls.len() as f64;
    assert!(mean_recall >= 0.95, "mean recall@10 was {mean_recall}, expected >= 0.95");
}

/// Scenario C — IVF recall rises monotonically with `n_probe`, reaching
/// exact-search parity once every cluster is probed.
#[test]
fn scenario_c_ivf_n_probe_sweep_improves_recall() {
    let dim = 64;
    let mut rng = StdRng::seed_from_u64(7);

    let config = Config::builder(dim)
        .index_type(IndexType::Ivf)
        .distance_metric(DistanceMetric::Cosine)
        .ivf(IvfConfig { n_clusters: 32, n_probe: 10 })
        .build();
    let db = Database::create(config).unwrap();

    let mut all_vectors = Vec::with_capacity(5000);
    let mut batch = Vec::with_capacity(5000);
    for id in 0..5000u64 {
        let vector = random_vector(&mut rng, dim);
        all_vectors.push((id, vector.clone()));
        batch.push(VectorRecord::new(id, vector));
    }
    db.batch_insert(&batch).unwrap();

    let queries: Vec<Vec<f32>> = (0..50).map(|_| random_vector(&mut rng, dim)).collect();

    let mean_recall_at = |n_probe: usize| -> f64 {
        let params = SearchParams::none().with_n_probe(n_probe);
        let recalls: Vec<f64> = queries
            .iter()
            .map(|query| {
                let ground_truth = flat_ground_truth(&all_vectors, query, 10);
                let result = db.search(query, 10, &params);
                let retrieved: Vec<u64> = result.items.iter().map(|item| item.id).collect();
                recall_at_k(&retrieved, &ground_truth)
            })
            .collect();
        recalls.iter().sum::<f64>() / recalls.len() as f64
    };

    let recall_p1 = mean_recall_at(1);
    let recall_p8 = mean_recall_at(8);
    let recall_p32 = mean_recall_at(32);

    assert!(recall_p1 >= 0.60, "n_probe=1 recall {recall_p1} below 0.60 floor");
    assert!(recall_p8 >= 0.90, "n_probe=8 recall {recall_p8} below 0.90 floor");
    assert!(recall_p32 >= recall_p8, "recall should rise monotonically with n_probe");
    assert!((recall_p32 - 1.0).abs() < 1e-9, "n_probe=32 (all clusters) should equal exact search");
}

/// Scenario D — duplicate id rejection.
#[test]
fn scenario_d_duplicate_rejection_keeps_first_insert() {
    let config = Config::builder(2).index_type(IndexType::Flat).build();
    let db = Database::create(config).unwrap();

    db.insert(VectorRecord::new(7, vec![1.0, 1.0])).unwrap();
    let err = db.insert(VectorRecord::new(7, vec![2.0, 2.0])).unwrap_err();
    assert!(matches!(err, lynx::Error::InvalidParameter(_)));
    assert_eq!(db.get(7).unwrap().vector, vec![1.0, 1.0]);
}

/// Scenario E — batch insert is all-or-nothing on a dimension mismatch
/// partway through the batch.
#[test]
fn scenario_e_batch_atomicity_on_dimension_mismatch() {
    let dim = 4;
    let config = Config::builder(dim).index_type(IndexType::Flat).build();
    let db = Database::create(config).unwrap();

    db.insert(VectorRecord::new(1, vec![0.0; dim])).unwrap();
    db.insert(VectorRecord::new(2, vec![0.0; dim])).unwrap();

    let batch = vec![
        VectorRecord::new(3, vec![0.0; dim]),
        VectorRecord::new(4, vec![0.0; dim + 1]),
        VectorRecord::new(5, vec![0.0; dim]),
    ];
    let err = db.batch_insert(&batch).unwrap_err();
    assert!(matches!(err, lynx::Error::DimensionMismatch { .. }));
    assert_eq!(db.size(), 2);
    assert!(!db.contains(3));
    assert!(!db.contains(5));
}

/// Scenario F — save/load round trip preserves size, metadata, and exact
/// search results for a Flat index.
#[test]
fn scenario_f_save_load_round_trip() {
    let dir = tempdir().unwrap();
    let mut config = Config::builder(4).index_type(IndexType::Flat).build();
    config.data_path = dir.path().to_string_lossy().into_owned();

    let db = Database::create(config.clone()).unwrap();
    for i in 0..100u64 {
        let metadata = format!("rec_{i}").into_bytes();
        db.insert(VectorRecord::with_metadata(i, vec![i as f32, 0.0, 0.0, 0.0], metadata)).unwrap();
    }
    db.save().unwrap();

    let reloaded = Database::create(config).unwrap();
    reloaded.load().unwrap();

    assert_eq!(reloaded.size(), 100);
    for i in 0..100u64 {
        assert!(reloaded.contains(i));
        assert_eq!(reloaded.get(i).unwrap().metadata, Some(format!("rec_{i}").into_bytes()));
    }
    let result = reloaded.search(&[42.0, 0.0, 0.0, 0.0], 1, &SearchParams::none());
    assert_eq!(result.items[0].id, 42);
}
