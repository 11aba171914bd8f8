//! Intensity-threshold segmentation around a seed
//!
//! Used whenever no interactive model can serve a run. Each seed claims the
//! voxels of a cubic neighbourhood that are brighter than
//! `max(min_threshold, seed_value * seed_ratio)`.

use ndarray::{ArrayView3, s};
use std::ops::Range;

use super::mask::CandidateMask;
use crate::points::Voxel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackParams {
    /// Neighbourhood half-width in voxels
    pub radius: usize,
    /// Lower bound for the intensity threshold
    pub min_threshold: f32,
    /// Fraction of the seed intensity used as threshold
    pub seed_ratio: f32,
}

impl Default for FallbackParams {
    fn default() -> Self {
        Self {
            radius: 12,
            min_threshold: 300.0,
            seed_ratio: 0.7,
        }
    }
}

impl FallbackParams {
    pub fn threshold(&self, seed_value: f32) -> f32 {
        self.min_threshold.max(seed_value * self.seed_ratio)
    }
}

/// Half-open bounds `[c - radius, c + radius)` per axis, clipped to `shape`
pub fn neighborhood(seed: Voxel, shape: [usize; 3], radius: usize) -> [Range<usize>; 3] {
    let bounds = |center: usize, len: usize| {
        center.saturating_sub(radius)..(center + radius).min(len)
    };
    [
        bounds(seed.z, shape[0]),
        bounds(seed.y, shape[1]),
        bounds(seed.x, shape[2]),
    ]
}

/// Voxels in the neighbourhood of `seed` strictly above the seed's threshold
pub fn candidate_mask(data: ArrayView3<'_, f32>, seed: Voxel, params: &FallbackParams) -> CandidateMask {
    let (d0, d1, d2) = data.dim();
    let [rz, ry, rx] = neighborhood(seed, [d0, d1, d2], params.radius);
    let seed_value = data.get(seed.as_index()).copied().unwrap_or(0.0);
    let threshold = params.threshold(seed_value);

    let origin = [rz.start, ry.start, rx.start];
    let mask = data
        .slice(s![rz, ry, rx])
        .mapv(|value| value > threshold);
    CandidateMask::region(origin, mask)
}
