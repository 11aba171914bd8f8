//! 2D slice extraction for display

use ndarray::ArrayView2;

use crate::points::Axis;

use super::types::Volume;

/// View of slice `index` along `axis`. Rows follow the pixel `y` axis, columns `x`.
///
/// Panics if `index` is out of range; callers validate against the volume shape.
pub fn slice_view(volume: &Volume, axis: Axis, index: usize) -> ArrayView2<'_, f32> {
    volume
        .data()
        .index_axis_move(ndarray::Axis(axis.index()), index)
}

/// Linearly rescale a slice into 0..=255. A flat slice maps to all zeros.
pub fn normalize_for_display(slice: ArrayView2<'_, f32>) -> Vec<Vec<u8>> {
    let (lo, hi) = slice
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let span = hi - lo;
    slice
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|&v| {
                    if span > 0.0 {
                        ((v - lo) / span * 255.0) as u8
                    } else {
                        0
                    }
                })
                .collect()
        })
        .collect()
}
