//! Mapping between 2D slice views and 3D voxel coordinates
//!
//! Volume axes are fixed: axis 0 is sagittal, axis 1 coronal, axis 2 axial.
//! A view is addressed by `(axis, slice_index)` and a position on it by a
//! [`Pixel`]; the same position in the volume is a [`Voxel`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Viewing axis of a 2D slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Axis {
    Sagittal,
    Coronal,
    Axial,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Sagittal, Axis::Coronal, Axis::Axial];

    /// Volume dimension this axis slices through
    pub fn index(self) -> usize {
        match self {
            Axis::Sagittal => 0,
            Axis::Coronal => 1,
            Axis::Axial => 2,
        }
    }

    /// Map a pixel on slice `slice_index` of this axis into the volume
    pub fn to_voxel(self, slice_index: usize, pixel: Pixel) -> Voxel {
        let Pixel { x: px, y: py } = pixel;
        match self {
            Axis::Sagittal => Voxel::new(slice_index, py, px),
            Axis::Coronal => Voxel::new(py, slice_index, px),
            Axis::Axial => Voxel::new(py, px, slice_index),
        }
    }

    /// Slice of this axis that contains `voxel`
    pub fn slice_of(self, voxel: Voxel) -> usize {
        voxel.as_index()[self.index()]
    }

    /// Pixel position of `voxel` on the slice of this axis that contains it.
    ///
    /// Exact inverse of [`Axis::to_voxel`]: for any slice and pixel,
    /// `axis.to_pixel(axis.to_voxel(slice, p)) == p`.
    pub fn to_pixel(self, voxel: Voxel) -> Pixel {
        match self {
            Axis::Sagittal => Pixel::new(voxel.x, voxel.y),
            Axis::Coronal => Pixel::new(voxel.x, voxel.z),
            Axis::Axial => Pixel::new(voxel.y, voxel.z),
        }
    }

    /// Pixel position of `voxel` on slice `slice_index`, if the voxel lies on it
    pub fn project(self, slice_index: usize, voxel: Voxel) -> Option<Pixel> {
        (self.slice_of(voxel) == slice_index).then(|| self.to_pixel(voxel))
    }

    /// `(width, height)` of this axis' slices for a volume of `shape`
    pub fn plane_size(self, shape: [usize; 3]) -> (usize, usize) {
        let [d0, d1, d2] = shape;
        match self {
            Axis::Sagittal => (d2, d1),
            Axis::Coronal => (d2, d0),
            Axis::Axial => (d1, d0),
        }
    }
}

impl TryFrom<u8> for Axis {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Axis::Sagittal),
            1 => Ok(Axis::Coronal),
            2 => Ok(Axis::Axial),
            other => Err(other),
        }
    }
}

impl From<Axis> for u8 {
    fn from(axis: Axis) -> Self {
        axis.index() as u8
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Position on a 2D slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub x: usize,
    pub y: usize,
}

impl Pixel {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Voxel coordinate in `(z, y, x)` order, matching the volume's array axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel {
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

impl Voxel {
    pub fn new(z: usize, y: usize, x: usize) -> Self {
        Self { z, y, x }
    }

    pub fn as_index(self) -> [usize; 3] {
        [self.z, self.y, self.x]
    }

    /// Whether the voxel lies inside a volume of `shape`
    pub fn within(self, shape: [usize; 3]) -> bool {
        self.z < shape[0] && self.y < shape[1] && self.x < shape[2]
    }
}

impl fmt::Display for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.z, self.y, self.x)
    }
}

/// Key of one slice view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceKey {
    pub axis: Axis,
    pub index: usize,
}

impl SliceKey {
    pub fn new(axis: Axis, index: usize) -> Self {
        Self { axis, index }
    }

    /// Slice of `axis` containing `voxel`
    pub fn containing(axis: Axis, voxel: Voxel) -> Self {
        Self::new(axis, axis.slice_of(voxel))
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.axis, self.index)
    }
}
