//! A small deterministic PRNG shared by k-means++ sampling and HNSW level
//! assignment.
//!
//! The crate never takes a runtime dependency on the `rand` crate (it stays
//! a dev-dependency for test data generation only); instead we carry the
//! same xorshift64 sequence used for probe diversification in the graph
//! search path, generalized into a reusable type instead of an inlined
//! `AtomicU64` update.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A seedable xorshift64 generator.
///
/// Not cryptographically secure; it exists purely to make k-means++ and
/// HNSW level assignment reproducible when a seed is supplied, and
/// reasonably well distributed when one isn't.
pub struct Rng {
    state: AtomicU64,
}

impl Rng {
    /// Creates a generator seeded from `seed`, or from the system clock if
    /// `seed` is `None`.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(entropy_seed);
        // xorshift64 requires a nonzero state.
        let state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { state: AtomicU64::new(state) }
    }

    /// Returns the next raw 64-bit output.
    pub fn next_u64(&self) -> u64 {
        self.state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |mut x| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                Some(x)
            })
            .unwrap_or(0)
    }

    /// Returns a uniform `f64` in `(0, 1]` — never exactly `0.0`, which
    /// matters for callers taking its logarithm (HNSW level assignment).
    pub fn next_open01(&self) -> f64 {
        // Top 53 bits give full f64 mantissa precision; add 1 to the
        // numerator so the result is never exactly zero.
        let bits = self.next_u64() >> 11;
        (bits as f64 + 1.0) / ((1u64 << 53) as f64 + 1.0)
    }

    /// Returns a uniform index in `[0, bound)`. Returns `0` if `bound == 0`.
    pub fn next_below(&self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % bound as u64) as usize
    }
}

fn entropy_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x1234_5678_9ABC_DEF0)
        ^ (&AtomicU64::new(0) as *const AtomicU64 as u64)
}
