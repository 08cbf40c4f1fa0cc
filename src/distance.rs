//! Distance metrics for vector similarity calculations.
//!
//! Every kernel here treats *lower* as *more similar*, including dot
//! product (negated) — callers never need to flip comparison direction
//! based on the metric in use.

use serde::{Deserialize, Serialize};

/// Distance metric used to order search results.
///
/// `L2` and `Cosine` are true distances (0 = identical). `DotProduct` is
/// the negated inner product so that, like the others, smaller means more
/// similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance.
    L2,
    /// `1 - cosine_similarity(a, b)`.
    Cosine,
    /// Negated dot product, for maximum inner product search.
    DotProduct,
}

impl DistanceMetric {
    /// Computes the distance between two equal-length vectors under this
    /// metric.
    ///
    /// Returns `f32::MAX` if the vectors have mismatched lengths (a
    /// non-negative sentinel is impossible for a real distance value);
    /// callers must validate dimensions upstream, this is a last-resort
    /// guard rather than the primary validation path.
    #[must_use]
    pub fn calculate(&self, a: &[f32], b: &[f32]) -> f32 {
        calculate_distance(a, b, *self)
    }

    /// Stable lowercase name, used in config files and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::DotProduct => "dot_product",
        }
    }

    /// Stable numeric code used in on-disk index headers (`index.bin`'s
    /// `metric` field for every index kind).
    #[must_use]
    pub const fn to_code(self) -> u32 {
        match self {
            Self::L2 => 0,
            Self::Cosine => 1,
            Self::DotProduct => 2,
        }
    }

    /// Recovers a `DistanceMetric` from its on-disk numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] for an unrecognized code —
    /// a corrupt or foreign-format file, not a caller mistake.
    pub fn from_code(code: u32) -> crate::Result<Self> {
        match code {
            0 => Ok(Self::L2),
            1 => Ok(Self::Cosine),
            2 => Ok(Self::DotProduct),
            other => Err(crate::Error::Serialization(format!(
                "unknown distance metric code {other}"
            ))),
        }
    }
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::L2
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the stable string name for a [`DistanceMetric`].
///
/// Free-function mirror of [`DistanceMetric::as_str`] for callers that
/// prefer the functional surface described in the library's external
/// interface.
#[must_use]
pub fn distance_metric_string(metric: DistanceMetric) -> &'static str {
    metric.as_str()
}

/// Dispatches to the distance kernel matching `metric`.
///
/// Returns `f32::MAX` on a length mismatch instead of panicking: the hot
/// path (index insertion, ~90% of insertion time per the source profile)
/// must stay allocation-free and branch-predictable, so mismatches are
/// reported rather than asserted.
#[must_use]
pub fn calculate_distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }
    match metric {
        DistanceMetric::L2 => distance_l2(a, b),
        DistanceMetric::Cosine => distance_cosine(a, b),
        DistanceMetric::DotProduct => distance_dot_product(a, b),
    }
}

/// Euclidean distance: `sqrt(sum((a_i - b_i)^2))`.
#[must_use]
pub fn distance_l2(a: &[f32], b: &[f32]) -> f32 {
    distance_l2_squared(a, b).sqrt()
}

/// Squared Euclidean distance. Used internally wherever only a monotone
/// ordering is needed (e.g. ranking candidates), to skip the `sqrt`.
#[must_use]
pub fn distance_l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Cosine distance: `1 - (a . b) / (|a| * |b|)`. Returns `1.0` if either
/// vector has zero norm, since similarity is undefined there and `1.0` is
/// the maximally-dissimilar sentinel for this metric.
#[must_use]
pub fn distance_cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Negated dot product: `-(a . b)`. Negated so that, as with every other
/// metric here, a smaller value means "more similar".
#[must_use]
pub fn distance_dot_product(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    -dot
}
