//! The unified, concurrent database that owns records and delegates
//! search to a polymorphic index (spec.md §4.6).

use crate::codec::{read_magic, read_u32, read_u64, write_magic, write_u32, write_u64};
use crate::config::{Config, ConfigBuilder, IndexType, SearchParams};
use crate::error::{Error, Result};
use crate::index::{IndexImpl, VectorIndex};
use crate::record::{DatabaseStats, SearchResult, SearchResultItem, VectorRecord};
use crate::write_log::{LogEntry, LogOp, WriteLog};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const VECTORS_MAGIC: &[u8; 4] = b"LYNX";
const VECTORS_VERSION: u32 = 1;

/// Lock-free `f64` counter, bit-cast through an `AtomicU64`.
///
/// Statistics need an atomic float accumulator (`total_query_time_ms`)
/// and `std::sync::atomic` has no native `AtomicF64`; `fetch_update`
/// over the bit pattern gives the same relaxed-ordering accumulation
/// without a lock.
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn fetch_add(&self, delta: f64) {
        let _ = self.0.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + delta).to_bits())
        });
    }
}

/// Records and the active index, behind one lock: spec.md §5 requires
/// that the lock protect both together so readers never observe a
/// record whose index entry hasn't landed yet, or vice versa.
struct DbState {
    vectors: FxHashMap<u64, VectorRecord>,
    index: Arc<IndexImpl>,
}

/// The public database handle. Owns its records, its active index, and
/// the bounded write log used for non-blocking maintenance.
pub struct Database {
    config: Config,
    state: RwLock<DbState>,
    write_log: WriteLog,
    total_inserts: AtomicU64,
    total_queries: AtomicU64,
    total_query_time_ms: AtomicF64,
}

impl Database {
    /// Constructs a database for `config`, validating it first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `config` fails validation
    /// (zero dimension, zero `hnsw.m`, or zero `ivf.n_clusters`).
    pub fn create(config: Config) -> Result<Self> {
        config.validate().map_err(|e| Error::InvalidParameter(e.to_string()))?;
        let index = IndexImpl::new(&config);
        Ok(Self {
            config,
            state: RwLock::new(DbState { vectors: FxHashMap::default(), index: Arc::new(index) }),
            write_log: WriteLog::new(),
            total_inserts: AtomicU64::new(0),
            total_queries: AtomicU64::new(0),
            total_query_time_ms: AtomicF64::new(0.0),
        })
    }

    /// Starts a [`ConfigBuilder`] for a database of the given dimension,
    /// so callers don't have to fill in every nested config section by
    /// hand before calling [`Database::create`].
    #[must_use]
    pub fn builder(dimension: usize) -> ConfigBuilder {
        Config::builder(dimension)
    }

    /// Inserts `record`. Exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `record.vector.len()`
    /// doesn't match the configured dimension, or
    /// [`Error::InvalidParameter`] if `record.id` already exists. On an
    /// index-level failure the just-inserted record map entry is rolled
    /// back before the error is returned.
    pub fn insert(&self, record: VectorRecord) -> Result<()> {
        if record.vector.len() != self.config.dimension {
            return Err(Error::DimensionMismatch { expected: self.config.dimension, actual: record.vector.len() });
        }
        let mut state = self.state.write();
        if state.vectors.contains_key(&record.id) {
            return Err(Error::InvalidParameter(format!("id {} already present", record.id)));
        }
        state.vectors.insert(record.id, record.clone());
        if let Err(e) = state.index.add(record.id, &record.vector) {
            state.vectors.remove(&record.id);
            return Err(e);
        }
        self.total_inserts.fetch_add(1, Ordering::Relaxed);
        if self.write_log.is_enabled() {
            self.write_log.append(LogEntry::insert(record.id, record.vector.clone()));
        }
        debug!(id = record.id, "inserted record");
        Ok(())
    }

    /// Removes `id`. Exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VectorNotFound`] if `id` is absent.
    pub fn remove(&self, id: u64) -> Result<()> {
        let mut state = self.state.write();
        if !state.vectors.contains_key(&id) {
            return Err(Error::VectorNotFound(id));
        }
        state.index.remove(id)?;
        state.vectors.remove(&id);
        if self.write_log.is_enabled() {
            self.write_log.append(LogEntry::remove(id));
        }
        debug!(id, "removed record");
        Ok(())
    }

    /// Whether `id` is present. Shared lock.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.state.read().vectors.contains_key(&id)
    }

    /// Returns a clone of the record stored under `id`, if present.
    /// Shared lock.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<VectorRecord> {
        self.state.read().vectors.get(&id).cloned()
    }

    /// Number of stored records. Shared lock.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.read().vectors.len()
    }

    /// Configured vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// The database's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crate version string, for callers that want to log or assert
    /// compatibility against a persisted file's producer.
    #[must_use]
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Scores `query` against the active index and returns the `k`
    /// nearest matches passing `params`'s filter. Shared lock, held for
    /// the duration of the search so statistics reflect a consistent
    /// view of the index.
    ///
    /// Returns an empty [`SearchResult`] (not an error) if `query`'s
    /// length doesn't match the configured dimension — `search` is
    /// defined as returning a value type (spec.md §7).
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> SearchResult {
        if query.len() != self.config.dimension {
            return SearchResult::empty();
        }
        let state = self.state.read();
        let start = Instant::now();
        let (items, total_candidates) = state.index.search(query, k, params);
        let query_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        drop(state);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.total_query_time_ms.fetch_add(query_time_ms);
        debug!(k, total_candidates, query_time_ms, "search completed");

        SearchResult { items, total_candidates, query_time_ms }
    }

    /// Inserts every record in `records`, choosing one of three
    /// strategies (spec.md §4.6 "`batch_insert` — the strategy
    /// decision"):
    ///
    /// - the database is empty: validate the whole batch, then
    ///   `index.build` it directly (fastest path);
    /// - the index is IVF and the batch is large relative to the
    ///   current size: rebuild the index from the combined existing +
    ///   new population, since IVF centroids benefit substantially from
    ///   retraining on the full set;
    /// - otherwise: validate the whole batch up front (dimension and
    ///   intra-batch uniqueness, plus collisions with existing ids) and
    ///   insert one at a time. All-or-nothing: any validation failure
    ///   leaves the database completely unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] or [`Error::InvalidParameter`]
    /// on any invalid record; the database is left unchanged in that
    /// case.
    pub fn batch_insert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write();

        if state.vectors.is_empty() {
            validate_batch(records, self.config.dimension)?;
            state.index.build(records)?;
            state.vectors = records.iter().map(|r| (r.id, r.clone())).collect();
            self.total_inserts.fetch_add(records.len() as u64, Ordering::Relaxed);
            return Ok(());
        }

        let is_large_ivf_batch =
            state.index.kind() == IndexType::Ivf && records.len() * 2 > state.vectors.len();
        if is_large_ivf_batch {
            warn!(batch_len = records.len(), existing = state.vectors.len(), "IVF batch_insert triggering full rebuild-with-merge");
            validate_batch(records, self.config.dimension)?;
            let mut seen: HashSet<u64> = state.vectors.keys().copied().collect();
            for record in records {
                if !seen.insert(record.id) {
                    return Err(Error::InvalidParameter(format!("id {} already present", record.id)));
                }
            }
            let mut all: Vec<VectorRecord> = state.vectors.values().cloned().collect();
            all.extend(records.iter().cloned());
            state.index.build(&all)?;
            state.vectors = all.iter().map(|r| (r.id, r.clone())).collect();
            self.total_inserts.fetch_add(records.len() as u64, Ordering::Relaxed);
            return Ok(());
        }

        validate_batch(records, self.config.dimension)?;
        for record in records {
            if state.vectors.contains_key(&record.id) {
                return Err(Error::InvalidParameter(format!("id {} already present", record.id)));
            }
        }

        for (applied, record) in records.iter().enumerate() {
            state.vectors.insert(record.id, record.clone());
            if let Err(e) = state.index.add(record.id, &record.vector) {
                for done in &records[..applied] {
                    state.vectors.remove(&done.id);
                    let _ = state.index.remove(done.id);
                }
                state.vectors.remove(&record.id);
                return Err(e);
            }
        }
        self.total_inserts.fetch_add(records.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Point-in-time counters and sizing information. Shared lock.
    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        let state = self.state.read();
        let total_queries = self.total_queries.load(Ordering::Relaxed);
        let total_time = self.total_query_time_ms.load();
        let avg_query_time_ms = if total_queries > 0 { total_time / total_queries as f64 } else { 0.0 };

        let vector_bytes: usize = state
            .vectors
            .values()
            .map(|r| std::mem::size_of::<u64>() + r.vector.len() * std::mem::size_of::<f32>() + r.metadata.as_ref().map_or(0, Vec::len))
            .sum();
        let index_memory_bytes = state.index.memory_usage();

        DatabaseStats {
            vector_count: state.vectors.len(),
            dimension: self.config.dimension,
            memory_usage_bytes: vector_bytes + index_memory_bytes,
            index_memory_bytes,
            avg_query_time_ms,
            total_queries,
            total_inserts: self.total_inserts.load(Ordering::Relaxed),
        }
    }

    /// Returns an iterator over every stored record. The iterator holds
    /// the shared lock for its entire lifetime — no writer can proceed
    /// while iteration is in progress. Callers must not let the iterator
    /// outlive any operation that could deadlock against this contract.
    #[must_use]
    pub fn all_records(&self) -> RecordsIter<'_> {
        let guard = self.state.read();
        let ids: Vec<u64> = guard.vectors.keys().copied().collect();
        RecordsIter { guard, ids: ids.into_iter() }
    }

    /// Writes `index.bin` and `vectors.bin` under `config.data_path`.
    /// Shared lock (read-only).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `data_path` is empty, or
    /// [`Error::IoError`] if the filesystem write fails.
    pub fn save(&self) -> Result<()> {
        if self.config.data_path.is_empty() {
            return Err(Error::InvalidParameter("data_path is empty".to_string()));
        }
        let state = self.state.read();
        let dir = Path::new(&self.config.data_path);
        std::fs::create_dir_all(dir)?;

        let index_bytes = state.index.serialize()?;
        std::fs::write(dir.join("index.bin"), index_bytes)?;

        let mut vectors_buf = Vec::new();
        write_magic(&mut vectors_buf, VECTORS_MAGIC)?;
        write_u32(&mut vectors_buf, VECTORS_VERSION)?;
        write_u64(&mut vectors_buf, state.vectors.len() as u64)?;
        for record in state.vectors.values() {
            write_u64(&mut vectors_buf, record.id)?;
            let metadata = record.metadata.as_deref().unwrap_or(&[]);
            write_u32(&mut vectors_buf, metadata.len() as u32)?;
            vectors_buf.extend_from_slice(metadata);
        }
        std::fs::write(dir.join("vectors.bin"), vectors_buf)?;

        info!(path = %self.config.data_path, count = state.vectors.len(), "saved database");
        Ok(())
    }

    /// Clears in-memory state and reloads `index.bin`/`vectors.bin` from
    /// `config.data_path`. Exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IoError`] if either file is missing or unreadable,
    /// or [`Error::Serialization`] if either is malformed or references
    /// an id the other doesn't know about.
    pub fn load(&self) -> Result<()> {
        let dir = Path::new(&self.config.data_path);

        let index_bytes = std::fs::read(dir.join("index.bin"))?;
        let loaded_index = IndexImpl::deserialize(self.config.index_type, &index_bytes)?;

        let vectors_bytes = std::fs::read(dir.join("vectors.bin"))?;
        let mut r: &[u8] = &vectors_bytes;
        read_magic(&mut r, VECTORS_MAGIC)?;
        let _version = read_u32(&mut r)?;
        let count = read_u64(&mut r)? as usize;

        let mut vectors = FxHashMap::default();
        vectors.reserve(count);
        for _ in 0..count {
            let id = read_u64(&mut r)?;
            let metadata_len = read_u32(&mut r)? as usize;
            let mut metadata_bytes = vec![0u8; metadata_len];
            std::io::Read::read_exact(&mut r, &mut metadata_bytes)
                .map_err(|_| Error::Serialization("truncated vectors.bin: metadata bytes".to_string()))?;
            let vector = loaded_index
                .vector_for(id)
                .ok_or_else(|| Error::Serialization(format!("id {id} present in vectors.bin but missing from index.bin")))?;
            let metadata = if metadata_bytes.is_empty() { None } else { Some(metadata_bytes) };
            vectors.insert(id, VectorRecord { id, vector, metadata });
        }

        let mut state = self.state.write();
        state.vectors = vectors;
        state.index = Arc::new(loaded_index);
        info!(path = %self.config.data_path, count, "loaded database");
        Ok(())
    }

    /// Persists to disk if configured to, per spec.md §4.6 "Persistence":
    /// `NotImplemented` if `enable_wal` is set, a no-op if `data_path` is
    /// empty, otherwise equivalent to [`Database::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotImplemented`] if `config.enable_wal` is
    /// `true`, or whatever [`Database::save`] returns otherwise.
    pub fn flush(&self) -> Result<()> {
        if self.config.enable_wal {
            return Err(Error::NotImplemented("flush with enable_wal = true".to_string()));
        }
        if self.config.data_path.is_empty() {
            return Ok(());
        }
        self.save()
    }

    /// Runs the non-blocking clone-optimize-replay-swap maintenance
    /// protocol (spec.md §4.7): enables write logging, clones the active
    /// index and optimizes the clone while queries and writes continue
    /// against the original, replays logged writes onto the clone, then
    /// atomically swaps it in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if the write log exceeds
    /// [`crate::write_log::WARN_THRESHOLD`] entries while the clone was
    /// being optimized.
    pub fn optimize_index(&self) -> Result<()> {
        info!("starting index optimization");
        self.write_log.enable();

        let (kind, bytes) = {
            let state = self.state.read();
            (state.index.kind(), state.index.serialize()?)
        };
        let cloned = IndexImpl::deserialize(kind, &bytes)?;
        cloned.optimize();

        if self.write_log.over_warn_threshold() {
            warn!(len = self.write_log.len(), "write log pressure crossed warn threshold, aborting optimize_index");
            self.write_log.disable();
            self.write_log.clear();
            return Err(Error::Busy("write log exceeded warn threshold during optimize_index".to_string()));
        }

        for entry in self.write_log.drain() {
            match entry.op {
                LogOp::Insert => {
                    let vector = entry.vector.expect("insert log entries always carry a vector");
                    if let Err(Error::InvalidState(_)) = cloned.add(entry.id, &vector) {
                        let _ = cloned.remove(entry.id);
                        cloned.add(entry.id, &vector)?;
                    }
                }
                LogOp::Remove => {
                    let _ = cloned.remove(entry.id);
                }
            }
        }

        self.write_log.disable();

        {
            let mut state = self.state.write();
            state.index = Arc::new(cloned);
        }
        self.write_log.clear();
        info!("index optimization complete, swapped active index");
        Ok(())
    }
}

fn validate_batch(records: &[VectorRecord], dimension: usize) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.vector.len() != dimension {
            return Err(Error::DimensionMismatch { expected: dimension, actual: record.vector.len() });
        }
        if !seen.insert(record.id) {
            return Err(Error::InvalidParameter(format!("duplicate id {} in batch", record.id)));
        }
    }
    Ok(())
}

/// Iterator over every stored record, returned by [`Database::all_records`].
///
/// Holds the database's shared lock for its entire lifetime.
pub struct RecordsIter<'a> {
    guard: parking_lot::RwLockReadGuard<'a, DbState>,
    ids: std::vec::IntoIter<u64>,
}

impl Iterator for RecordsIter<'_> {
    type Item = VectorRecord;

    fn next(&mut self) -> Option<VectorRecord> {
        loop {
            let id = self.ids.next()?;
            if let Some(record) = self.guard.vectors.get(&id) {
                return Some(record.clone());
            }
        }
    }
}

/// Object-safety-friendly contract capturing [`Database`]'s method set,
/// for callers that want to abstract over it (e.g. a test double).
pub trait VectorDatabase {
    /// See [`Database::insert`].
    fn insert(&self, record: VectorRecord) -> Result<()>;
    /// See [`Database::remove`].
    fn remove(&self, id: u64) -> Result<()>;
    /// See [`Database::contains`].
    fn contains(&self, id: u64) -> bool;
    /// See [`Database::get`].
    fn get(&self, id: u64) -> Option<VectorRecord>;
    /// See [`Database::search`].
    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> SearchResult;
    /// See [`Database::batch_insert`].
    fn batch_insert(&self, records: &[VectorRecord]) -> Result<()>;
    /// See [`Database::size`].
    fn size(&self) -> usize;
    /// See [`Database::dimension`].
    fn dimension(&self) -> usize;
    /// See [`Database::stats`].
    fn stats(&self) -> DatabaseStats;
    /// See [`Database::config`].
    fn config(&self) -> &Config;
    /// See [`Database::flush`].
    fn flush(&self) -> Result<()>;
    /// See [`Database::save`].
    fn save(&self) -> Result<()>;
    /// See [`Database::load`].
    fn load(&self) -> Result<()>;
    /// See [`Database::version`].
    fn version(&self) -> &'static str;
}

impl VectorDatabase for Database {
    fn insert(&self, record: VectorRecord) -> Result<()> {
        Database::insert(self, record)
    }

    fn remove(&self, id: u64) -> Result<()> {
        Database::remove(self, id)
    }

    fn contains(&self, id: u64) -> bool {
        Database::contains(self, id)
    }

    fn get(&self, id: u64) -> Option<VectorRecord> {
        Database::get(self, id)
    }

    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> SearchResult {
        Database::search(self, query, k, params)
    }

    fn batch_insert(&self, records: &[VectorRecord]) -> Result<()> {
        Database::batch_insert(self, records)
    }

    fn size(&self) -> usize {
        Database::size(self)
    }

    fn dimension(&self) -> usize {
        Database::dimension(self)
    }

    fn stats(&self) -> DatabaseStats {
        Database::stats(self)
    }

    fn config(&self) -> &Config {
        Database::config(self)
    }

    fn flush(&self) -> Result<()> {
        Database::flush(self)
    }

    fn save(&self) -> Result<()> {
        Database::save(self)
    }

    fn load(&self) -> Result<()> {
        Database::load(self)
    }

    fn version(&self) -> &'static str {
        Database::version(self)
    }
}
