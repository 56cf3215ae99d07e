//! Embedding vector normalization strategies.
//!
//! All three rescales are total functions over well-formed input and
//! preserve the vector's dimension. The strategy is a process-wide
//! configuration choice: queries must be normalized the same way the
//! stored chunk vectors were at indexing time, or similarity scores are
//! meaningless.

use serde::Deserialize;

/// Which rescale to apply to raw embedding vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationStrategy {
    /// Divide every component by the vector's dimension count.
    RangeScale,
    /// Divide by the Euclidean norm; unit length for non-zero input.
    #[default]
    L2,
    /// Map `min -> 0`, `max -> 1`, linear in between.
    MinMax,
}

impl NormalizationStrategy {
    pub fn apply(&self, v: &[f32]) -> Vec<f32> {
        match self {
            NormalizationStrategy::RangeScale => range_scale(v),
            NormalizationStrategy::L2 => l2(v),
            NormalizationStrategy::MinMax => min_max(v),
        }
    }
}

/// Divide every component by the vector's length (dimension count).
///
/// A fixed linear rescale, not a unit-length normalization.
pub fn range_scale(v: &[f32]) -> Vec<f32> {
    if v.is_empty() {
        return Vec::new();
    }
    let scale = v.len() as f32;
    v.iter().map(|x| x / scale).collect()
}

/// Divide every component by the Euclidean norm.
///
/// A zero vector is returned unchanged; any other input comes out with
/// unit Euclidean length.
pub fn l2(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Map `min(v) -> 0` and `max(v) -> 1` with linear interpolation.
///
/// A constant vector (max == min) maps to all zeros.
pub fn min_max(v: &[f32]) -> Vec<f32> {
    if v.is_empty() {
        return Vec::new();
    }
    let min = v.iter().copied().fold(f32::INFINITY, f32::min);
    let max = v.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| (x - min) / (max - min)).collect()
}
