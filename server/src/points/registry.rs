//! Canonical registry of labeled seed points for one session
//!
//! The registry owns the voxel → label map (the source of truth) and keeps a
//! derived per-slice projection cache in sync with it. A point appears in the
//! projection of every slice that contains it: one slice per axis.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

use super::coords::{Axis, Pixel, SliceKey, Voxel};
use super::palette::{Rgb, color_for};

/// Label of a seed point, unique within a session. Zero is reserved for background.
pub type Label = u16;

/// Errors raised by point registration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PointError {
    #[error("Invalid point label: {0} (labels run from 1 to {max})", max = Label::MAX)]
    InvalidLabel(u64),

    #[error("No free point label left")]
    LabelsExhausted,
}

/// A point as it appears on one slice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedPoint {
    pub x: usize,
    pub y: usize,
    pub point_number: Label,
    pub color: Rgb,
}

/// A labeled point in the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedPoint {
    pub label: Label,
    pub voxel: Voxel,
}

#[derive(Debug, Default)]
pub struct PointRegistry {
    /// Canonical set, in chronological mark order
    by_voxel: IndexMap<Voxel, Label>,
    by_label: HashMap<Label, Voxel>,
    projections: BTreeMap<SliceKey, Vec<ProjectedPoint>>,
    highest_label: Label,
    last_label: Label,
}

impl PointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the pixel `pixel` on slice `slice_index` of `axis`.
    ///
    /// With an explicit label the point owning that label (if any) is
    /// relocated here. Without one, an already-marked voxel keeps its label
    /// and a new voxel receives the first free label after the most recent
    /// mark. Returns the label the point ends up with.
    pub fn mark(
        &mut self,
        axis: Axis,
        slice_index: usize,
        pixel: Pixel,
        explicit_label: Option<Label>,
    ) -> Result<Label, PointError> {
        let voxel = axis.to_voxel(slice_index, pixel);

        let label = match explicit_label {
            Some(0) => return Err(PointError::InvalidLabel(0)),
            Some(label) => {
                self.remove(label);
                // Coordinates are unique: a different label sitting on this voxel is superseded
                if let Some(&previous) = self.by_voxel.get(&voxel) {
                    debug!("Point {} superseded at {} by point {}", previous, voxel, label);
                    self.remove(previous);
                }
                self.insert(voxel, label);
                label
            }
            None => match self.by_voxel.get(&voxel) {
                Some(&existing) => existing,
                None => {
                    let label = self.next_free_label()?;
                    self.insert(voxel, label);
                    label
                }
            },
        };

        self.refresh_projections(voxel, label);
        self.last_label = label;
        Ok(label)
    }

    /// Delete the point with `label` everywhere. Returns false if there was none.
    pub fn remove(&mut self, label: Label) -> bool {
        let Some(voxel) = self.by_label.remove(&label) else {
            return false;
        };
        self.by_voxel.shift_remove(&voxel);

        for axis in Axis::ALL {
            let key = SliceKey::containing(axis, voxel);
            if let Some(points) = self.projections.get_mut(&key) {
                points.retain(|p| p.point_number != label);
                if points.is_empty() {
                    self.projections.remove(&key);
                }
            }
        }
        true
    }

    /// Remove every point and restart numbering
    pub fn clear(&mut self) {
        self.by_voxel.clear();
        self.by_label.clear();
        self.projections.clear();
        self.highest_label = 0;
        self.last_label = 0;
    }

    /// Points projected onto slice `slice_index` of `axis`
    pub fn list_slice(&self, axis: Axis, slice_index: usize) -> &[ProjectedPoint] {
        self.projections
            .get(&SliceKey::new(axis, slice_index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All points in chronological mark order
    pub fn list_all(&self) -> Vec<SeedPoint> {
        self.by_voxel
            .iter()
            .map(|(&voxel, &label)| SeedPoint { label, voxel })
            .collect()
    }

    /// Every non-empty slice projection
    pub fn projections(&self) -> impl Iterator<Item = (SliceKey, &[ProjectedPoint])> {
        self.projections
            .iter()
            .map(|(key, points)| (*key, points.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_voxel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_voxel.is_empty()
    }

    /// Label of the chronologically most recent mark
    pub fn last_label(&self) -> Label {
        self.last_label
    }

    /// Highest label assigned since the last clear
    pub fn highest_label(&self) -> Label {
        self.highest_label
    }

    fn insert(&mut self, voxel: Voxel, label: Label) {
        self.by_voxel.insert(voxel, label);
        self.by_label.insert(label, voxel);
        self.highest_label = self.highest_label.max(label);
    }

    fn next_free_label(&self) -> Result<Label, PointError> {
        let mut candidate = self.last_label;
        loop {
            candidate = candidate.checked_add(1).ok_or(PointError::LabelsExhausted)?;
            if !self.by_label.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
    }

    fn refresh_projections(&mut self, voxel: Voxel, label: Label) {
        let color = color_for(label);
        for axis in Axis::ALL {
            let pixel = axis.to_pixel(voxel);
            let points = self
                .projections
                .entry(SliceKey::containing(axis, voxel))
                .or_default();
            points.retain(|p| p.point_number != label);
            points.push(ProjectedPoint {
                x: pixel.x,
                y: pixel.y,
                point_number: label,
                color,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn assert_consistent(registry: &PointRegistry) {
        let all = registry.list_all();
        let labels: HashSet<_> = all.iter().map(|p| p.label).collect();
        let voxels: HashSet<_> = all.iter().map(|p| p.voxel).collect();
        assert_eq!(labels.len(), all.len(), "duplicate label in {:?}", all);
        assert_eq!(voxels.len(), all.len(), "duplicate voxel in {:?}", all);

        for (key, points) in registry.projections() {
            for p in points {
                let voxel = registry
                    .by_label
                    .get(&p.point_number)
                    .copied()
                    .unwrap_or_else(|| panic!("slice {key} references missing point {}", p.point_number));
                assert_eq!(key.axis.project(key.index, voxel), Some(Pixel::new(p.x, p.y)));
            }
        }
        for seed in &all {
            for axis in Axis::ALL {
                let on_slice = registry.list_slice(axis, axis.slice_of(seed.voxel));
                assert_eq!(
                    on_slice.iter().filter(|p| p.point_number == seed.label).count(),
                    1,
                    "point {} missing from axis {}",
                    seed.label,
                    axis
                );
            }
        }
    }

    #[test]
    fn test_axial_marks_then_remove() {
        let mut registry = PointRegistry::new();

        let first = registry.mark(Axis::Axial, 32, Pixel::new(10, 10), None).unwrap();
        let second = registry.mark(Axis::Axial, 32, Pixel::new(15, 15), None).unwrap();
        assert_eq!((first, second), (1, 2));

        let on_slice = registry.list_slice(Axis::Axial, 32);
        assert_eq!(on_slice.len(), 2);
        assert_eq!(on_slice[0].point_number, 1);
        assert_eq!(on_slice[0].color, color_for(1));
        assert_eq!((on_slice[1].x, on_slice[1].y), (15, 15));
        assert_eq!(on_slice[1].color, color_for(2));

        assert!(registry.remove(1));
        let on_slice = registry.list_slice(Axis::Axial, 32);
        assert_eq!(on_slice.len(), 1);
        assert_eq!(on_slice[0].point_number, 2);
        assert_consistent(&registry);
    }

    #[test]
    fn test_remark_same_voxel_reuses_label() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 5, Pixel::new(1, 2), None).unwrap();
        registry.mark(Axis::Axial, 5, Pixel::new(3, 4), None).unwrap();

        // Same voxel reached from the sagittal view
        let voxel = Axis::Axial.to_voxel(5, Pixel::new(1, 2));
        let pixel = Axis::Sagittal.to_pixel(voxel);
        let label = registry
            .mark(Axis::Sagittal, voxel.z, pixel, None)
            .unwrap();

        assert_eq!(label, 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.last_label(), 1);
        assert_consistent(&registry);
    }

    #[test]
    fn test_next_label_follows_last_mark_and_skips_taken() {
        let mut registry = PointRegistry::new();
        for i in 0..3 {
            registry.mark(Axis::Axial, 0, Pixel::new(i, 0), None).unwrap();
        }
        // Re-mark point 1: the next new point would be 2, which is taken
        registry.mark(Axis::Axial, 0, Pixel::new(0, 0), None).unwrap();
        let label = registry.mark(Axis::Axial, 0, Pixel::new(9, 9), None).unwrap();
        assert_eq!(label, 4);
        assert_consistent(&registry);
    }

    #[test]
    fn test_explicit_label_relocates_point() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 10, Pixel::new(1, 1), None).unwrap();
        registry.mark(Axis::Axial, 10, Pixel::new(2, 2), None).unwrap();

        let label = registry
            .mark(Axis::Coronal, 7, Pixel::new(3, 3), Some(1))
            .unwrap();
        assert_eq!(label, 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.by_label.get(&1).copied(), Some(Voxel::new(3, 7, 3)));
        assert!(
            registry
                .list_slice(Axis::Axial, 10)
                .iter()
                .all(|p| p.point_number != 1)
        );
        assert_consistent(&registry);
    }

    #[test]
    fn test_explicit_label_raises_highest() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 0, Pixel::new(0, 0), Some(20)).unwrap();
        assert_eq!(registry.highest_label(), 20);
        assert_eq!(registry.last_label(), 20);
        let next = registry.mark(Axis::Axial, 0, Pixel::new(1, 0), None).unwrap();
        assert_eq!(next, 21);
    }

    #[test]
    fn test_explicit_label_on_occupied_voxel_supersedes() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 4, Pixel::new(1, 1), None).unwrap();
        registry.mark(Axis::Axial, 4, Pixel::new(1, 1), Some(7)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_label.get(&1).copied(), None);
        assert_eq!(registry.by_voxel.get(&Voxel::new(1, 1, 4)).copied(), Some(7));
        assert_consistent(&registry);
    }

    #[test]
    fn test_explicit_zero_label_rejected() {
        let mut registry = PointRegistry::new();
        let result = registry.mark(Axis::Axial, 0, Pixel::new(0, 0), Some(0));
        assert_eq!(result, Err(PointError::InvalidLabel(0)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 0, Pixel::new(0, 0), None).unwrap();

        assert!(registry.remove(1));
        assert!(!registry.remove(1));
        assert!(!registry.remove(42));
        assert!(registry.is_empty());
        assert_eq!(registry.projections().count(), 0);
    }

    #[test]
    fn test_removing_last_point_keeps_numbering() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 0, Pixel::new(0, 0), None).unwrap();
        registry.mark(Axis::Axial, 0, Pixel::new(1, 0), None).unwrap();
        registry.remove(1);
        registry.remove(2);

        let label = registry.mark(Axis::Axial, 0, Pixel::new(2, 0), None).unwrap();
        assert_eq!(label, 3);
    }

    #[test]
    fn test_clear_resets_numbering() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 0, Pixel::new(0, 0), None).unwrap();
        registry.mark(Axis::Axial, 0, Pixel::new(1, 0), None).unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.last_label(), 0);
        assert!(registry.list_slice(Axis::Axial, 0).is_empty());
        let label = registry.mark(Axis::Axial, 0, Pixel::new(5, 5), None).unwrap();
        assert_eq!(label, 1);
    }

    #[test]
    fn test_list_all_is_chronological() {
        let mut registry = PointRegistry::new();
        registry.mark(Axis::Axial, 0, Pixel::new(0, 0), Some(5)).unwrap();
        registry.mark(Axis::Axial, 0, Pixel::new(1, 0), Some(2)).unwrap();
        registry.mark(Axis::Axial, 0, Pixel::new(2, 0), None).unwrap();

        let labels: Vec<_> = registry.list_all().iter().map(|p| p.label).collect();
        assert_eq!(labels, vec![5, 2, 3]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Mark { axis: u8, slice: usize, x: usize, y: usize, label: Option<Label> },
        Remove(Label),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u8..3, 0usize..4, 0usize..4, 0usize..4, proptest::option::of(1u16..6))
                .prop_map(|(axis, slice, x, y, label)| Op::Mark { axis, slice, x, y, label }),
            1 => (1u16..6).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_registry_stays_consistent(ops in proptest::collection::vec(op(), 1..40)) {
            let mut registry = PointRegistry::new();
            for op in ops {
                match op {
                    Op::Mark { axis, slice, x, y, label } => {
                        let axis = Axis::try_from(axis).unwrap();
                        registry.mark(axis, slice, Pixel::new(x, y), label).unwrap();
                    }
                    Op::Remove(label) => {
                        registry.remove(label);
                    }
                }
                assert_consistent(&registry);
            }
        }
    }
}
