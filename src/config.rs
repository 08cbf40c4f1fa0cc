//! Lynx configuration.
//!
//! Provides a plain `Config` struct for direct construction, plus a
//! `lynx.toml` + `LYNX_*`-environment-variable loader in the layered style
//! used elsewhere in the ecosystem for embedded database crates.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (the struct you pass to [`crate::Database::create`])
//! 2. Environment variables (`LYNX_*`)
//! 3. Configuration file (`lynx.toml`)
//! 4. Default values

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::distance::DistanceMetric;

/// Configuration-loading errors, distinct from [`crate::Error`] because
/// they can occur before a `Database` exists to report through it.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file or environment could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// The offending key, dotted-path style (`"hnsw.m"`).
        key: String,
        /// Human-readable explanation.
        message: String,
    },
}

/// Which index algorithm backs a [`crate::Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    /// Exact brute-force search. 100% recall, O(N) per query.
    Flat,
    /// Hierarchical Navigable Small World graph. Default.
    Hnsw,
    /// Inverted-file clustered index.
    Ivf,
}

impl Default for IndexType {
    fn default() -> Self {
        Self::Hnsw
    }
}

impl IndexType {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Hnsw => "hnsw",
            Self::Ivf => "ivf",
        }
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the stable string name for an [`IndexType`].
///
/// Free-function mirror of [`IndexType::as_str`], matching the library's
/// documented external surface.
#[must_use]
pub fn index_type_string(index_type: IndexType) -> &'static str {
    index_type.as_str()
}

/// HNSW construction/search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Target degree per node per layer (layer 0 uses `2 * m`).
    pub m: usize,
    /// Beam width used while building the graph.
    pub ef_construction: usize,
    /// Default beam width used while searching, absent a per-query
    /// override.
    pub ef_search: usize,
    /// Informational only: the native graph is unbounded and never
    /// rejects inserts past this count; kept to size-hint the initial
    /// backing storage.
    pub max_elements: usize,
    /// Seed for the level-assignment PRNG. `None` seeds from entropy.
    pub random_seed: Option<u64>,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            max_elements: 1_000_000,
            random_seed: None,
        }
    }
}

/// IVF clustering/search parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IvfConfig {
    /// Number of k-means clusters to train.
    pub n_clusters: usize,
    /// Default number of clusters probed per query, absent a per-query
    /// override.
    pub n_probe: usize,
}

impl Default for IvfConfig {
    fn default() -> Self {
        Self { n_clusters: 1024, n_probe: 10 }
    }
}

/// Top-level database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vector length. Required in practice (defaults to 0, which fails
    /// validation) since there is no sensible default dimension.
    pub dimension: usize,
    /// Distance metric used for all search/index operations.
    pub distance_metric: DistanceMetric,
    /// Which index algorithm to construct.
    pub index_type: IndexType,
    /// HNSW-specific parameters (used when `index_type == Hnsw`).
    pub hnsw: HnswConfig,
    /// IVF-specific parameters (used when `index_type == Ivf`).
    pub ivf: IvfConfig,
    /// Directory for persistence. Empty means in-memory only — `save`
    /// fails and `flush` is a no-op.
    pub data_path: String,
    /// Reserved. Must stay `false`: `flush()` returns
    /// [`crate::Error::NotImplemented`] when this is `true`, it is never
    /// silently accepted.
    pub enable_wal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dimension: 0,
            distance_metric: DistanceMetric::default(),
            index_type: IndexType::default(),
            hnsw: HnswConfig::default(),
            ivf: IvfConfig::default(),
            data_path: String::new(),
            enable_wal: false,
        }
    }
}

impl Config {
    /// Creates a configuration for the given dimension with every other
    /// field defaulted.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension, ..Self::default() }
    }

    /// Starts a [`ConfigBuilder`] for the given dimension.
    #[must_use]
    pub fn builder(dimension: usize) -> ConfigBuilder {
        ConfigBuilder::new(dimension)
    }

    /// Loads configuration layered over `lynx.toml` (if present) and
    /// `LYNX_*` environment variables, with [`Config::default`] as the
    /// base layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if the file or environment
    /// cannot be deserialized into a `Config`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("lynx.toml")
    }

    /// Loads configuration from a specific TOML file path, layered under
    /// `LYNX_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("LYNX_").split("_").lowercase(false));

        figment.extract().map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration's internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero dimension, a zero
    /// `hnsw.m`, or a zero `ivf.n_clusters`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "dimension".to_string(),
                message: "dimension must be greater than zero".to_string(),
            });
        }
        if self.hnsw.m == 0 {
            return Err(ConfigError::InvalidValue {
                key: "hnsw.m".to_string(),
                message: "m must be greater than zero".to_string(),
            });
        }
        if self.ivf.n_clusters == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ivf.n_clusters".to_string(),
                message: "n_clusters must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Fluent builder over [`Config`], mirroring the section-by-section
/// construction style used for the nested config structs.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts a builder for the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { config: Config::new(dimension) }
    }

    /// Sets the distance metric.
    #[must_use]
    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.distance_metric = metric;
        self
    }

    /// Sets the index type.
    #[must_use]
    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.config.index_type = index_type;
        self
    }

    /// Overrides the HNSW section wholesale.
    #[must_use]
    pub fn hnsw(mut self, hnsw: HnswConfig) -> Self {
        self.config.hnsw = hnsw;
        self
    }

    /// Overrides the IVF section wholesale.
    #[must_use]
    pub fn ivf(mut self, ivf: IvfConfig) -> Self {
        self.config.ivf = ivf;
        self
    }

    /// Sets the persistence directory.
    #[must_use]
    pub fn data_path(mut self, path: impl Into<String>) -> Self {
        self.config.data_path = path.into();
        self
    }

    /// Finishes the builder, returning the assembled [`Config`].
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}

/// Per-query search parameter overrides. Unset fields inherit from the
/// database's [`Config`].
#[derive(Clone, Default)]
pub struct SearchParams {
    /// Overrides `hnsw.ef_search` for this query only.
    pub ef_search: Option<usize>,
    /// Overrides `ivf.n_probe` for this query only.
    pub n_probe: Option<usize>,
    /// Optional predicate; only ids for which this returns `true` are
    /// eligible to appear in the result.
    pub filter: Option<Box<dyn Fn(u64) -> bool + Send + Sync>>,
}

impl std::fmt::Debug for SearchParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParams")
            .field("ef_search", &self.ef_search)
            .field("n_probe", &self.n_probe)
            .field("filter", &self.filter.as_ref().map(|_| "Fn(u64) -> bool"))
            .finish()
    }
}

impl SearchParams {
    /// A `SearchParams` with every field unset — the query inherits every
    /// default from the database's `Config`.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the `ef_search` override.
    #[must_use]
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = Some(ef_search);
        self
    }

    /// Sets the `n_probe` override.
    #[must_use]
    pub fn with_n_probe(mut self, n_probe: usize) -> Self {
        self.n_probe = Some(n_probe);
        self
    }

    /// Sets the id filter predicate.
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(u64) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Applies the filter, if any; ids pass through unfiltered `SearchParams`.
    #[must_use]
    pub fn passes(&self, id: u64) -> bool {
        self.filter.as_ref().map_or(true, |f| f(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_hnsw_index_and_l2_metric() {
        let config = Config::new(128);
        assert_eq!(config.index_type, IndexType::Hnsw);
        assert_eq!(config.distance_metric, DistanceMetric::L2);
        assert_eq!(config.hnsw.m, 16);
        assert_eq!(config.ivf.n_clusters, 1024);
    }

    #[test]
    fn zero_dimension_fails_validation() {
        let config = Config::new(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = Config::builder(64)
            .index_type(IndexType::Ivf)
            .distance_metric(DistanceMetric::Cosine)
            .build();
        assert_eq!(config.dimension, 64);
        assert_eq!(config.index_type, IndexType::Ivf);
        assert_eq!(config.distance_metric, DistanceMetric::Cosine);
    }

    #[test]
    fn search_params_filter_defaults_to_pass_all() {
        let params = SearchParams::none();
        assert!(params.passes(1));
        assert!(params.passes(u64::MAX));
    }

    #[test]
    fn search_params_filter_applies() {
        let params = SearchParams::none().with_filter(|id| id % 2 == 0);
        assert!(params.passes(4));
        assert!(!params.passes(5));
    }

    #[test]
    fn index_type_round_trips_through_display() {
        assert_eq!(IndexType::Flat.to_string(), "flat");
        assert_eq!(IndexType::Hnsw.to_string(), "hnsw");
        assert_eq!(IndexType::Ivf.to_string(), "ivf");
    }
}
