//! Bounded append log used by the non-blocking maintenance protocol
//! (spec.md §4.7): while `optimize_index` clones and rebuilds the active
//! index, concurrent writes are appended here instead of (or in addition
//! to) applied to the live index, then replayed against the rebuilt clone
//! before the atomic swap.
//!
//! This is a maintenance replay buffer, not a durability mechanism —
//! nothing here survives a process restart, and that's by design (§9
//! Non-goals excludes crash durability).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Hard cap on log length. Once reached, `append` returns `false` and
/// the in-progress `optimize_index` aborts maintenance.
pub const MAX_ENTRIES: usize = 100_000;

/// Soft cap checked before replay. Exceeding it aborts the maintenance
/// pass with [`crate::Error::Busy`] rather than replaying an
/// unreasonably large backlog.
pub const WARN_THRESHOLD: usize = 50_000;

/// The write operation a [`LogEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOp {
    /// A record was inserted.
    Insert,
    /// A record was removed.
    Remove,
}

/// One recorded write, in the order it was applied to the live index.
///
/// Order is semantically significant: `Insert(5,A); Remove(5); Insert(5,B)`
/// must replay as written, not collapse to `Insert(5,B)` — an optimization
/// that reordered or deduplicated entries by id would silently resurrect
/// vectors that were meant to be gone.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Which operation this entry records.
    pub op: LogOp,
    /// The affected record's id.
    pub id: u64,
    /// The inserted vector. `None` for `Remove` entries.
    pub vector: Option<Vec<f32>>,
}

impl LogEntry {
    /// Builds an `Insert` entry.
    #[must_use]
    pub fn insert(id: u64, vector: Vec<f32>) -> Self {
        Self { op: LogOp::Insert, id, vector: Some(vector) }
    }

    /// Builds a `Remove` entry.
    #[must_use]
    pub fn remove(id: u64) -> Self {
        Self { op: LogOp::Remove, id, vector: None }
    }
}

/// An ordered, bounded record of writes applied to the live index while
/// maintenance logging is enabled.
pub struct WriteLog {
    enabled: AtomicBool,
    entries: Mutex<Vec<LogEntry>>,
}

impl Default for WriteLog {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteLog {
    /// Creates an empty, disabled log.
    #[must_use]
    pub fn new() -> Self {
        Self { enabled: AtomicBool::new(false), entries: Mutex::new(Vec::new()) }
    }

    /// Whether logging is currently enabled. Uses acquire ordering so a
    /// writer that observes `true` here is guaranteed to see every
    /// append the maintenance thread will eventually replay.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enables logging (release-store).
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Disables logging (release-store) without clearing entries —
    /// callers that want a clean slate call [`WriteLog::clear`]
    /// explicitly.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Appends `entry`. Returns `false` without appending if the log is
    /// already at [`MAX_ENTRIES`] — the hard cap that aborts an
    /// in-progress maintenance pass.
    pub fn append(&self, entry: LogEntry) -> bool {
        let mut entries = self.entries.lock();
        if entries.len() >= MAX_ENTRIES {
            return false;
        }
        entries.push(entry);
        true
    }

    /// Current entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the log has crossed [`WARN_THRESHOLD`].
    #[must_use]
    pub fn over_warn_threshold(&self) -> bool {
        self.len() > WARN_THRESHOLD
    }

    /// Removes and returns every entry, in order, leaving the log empty.
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries.lock())
    }

    /// Discards every entry without returning them.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
