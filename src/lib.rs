//! # Lynx
//!
//! In-process approximate nearest neighbor vector database library.
//!
//! Lynx embeds directly into a host process: no server, no network
//! protocol, a single [`Database`] handle shared behind an `Arc` across
//! threads. Three index algorithms are available per database ([`IndexType`]):
//! exact [`index::flat::FlatIndex`] brute-force search, graph-based
//! [`index::hnsw::HnswIndex`] approximate search, and clustered
//! [`index::ivf::IvfIndex`] approximate search.
//!
//! ## Quick start
//!
//! ```
//! use lynx::{Config, Database, DistanceMetric, SearchParams, VectorRecord};
//!
//! let config = Config::builder(4).distance_metric(DistanceMetric::L2).build();
//! let db = Database::create(config).unwrap();
//!
//! db.insert(VectorRecord::new(1, vec![0.0, 0.0, 0.0, 0.0])).unwrap();
//! db.insert(VectorRecord::new(2, vec![1.0, 0.0, 0.0, 0.0])).unwrap();
//!
//! let result = db.search(&[0.1, 0.0, 0.0, 0.0], 1, &SearchParams::none());
//! assert_eq!(result.items[0].id, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod codec;
pub mod config;
pub mod database;
pub mod distance;
pub mod error;
pub mod index;
pub mod kmeans;
mod rng;
pub mod record;
pub mod write_log;

pub use config::{index_type_string, Config, ConfigBuilder, ConfigError, HnswConfig, IndexType, IvfConfig, SearchParams};
pub use database::{Database, RecordsIter, VectorDatabase};
pub use distance::{
    calculate_distance, distance_cosine, distance_dot_product, distance_l2, distance_l2_squared,
    distance_metric_string, DistanceMetric,
};
pub use error::{error_string, Error, Result};
pub use index::{IndexImpl, VectorIndex};
pub use record::{DatabaseStats, SearchResult, SearchResultItem, VectorRecord};
