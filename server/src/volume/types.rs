//! Volume types and error definitions

use ndarray::{Array3, ArrayView3};
use nifti::NiftiHeader;
use serde::Serialize;
use thiserror::Error;

use crate::points::Voxel;

/// Errors that can occur when decoding or encoding volumes
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("File too large: {size} bytes (maximum is {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode volume: {0}")]
    Decode(String),

    #[error("Failed to encode volume: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 4x4 voxel-to-world transform, row major
pub type Affine = [[f32; 4]; 4];

pub const IDENTITY_AFFINE: Affine = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Where a volume came from.
///
/// Slice series are stacked in a different voxel order than packed files, so
/// label volumes produced for them are reoriented before saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A single packed volume file (`.nii`, `.nii.gz`)
    PackedFile,
    /// A directory of 2D slices stacked along axis 0
    SeriesDirectory,
}

impl SourceKind {
    pub fn needs_reorientation(self) -> bool {
        matches!(self, SourceKind::SeriesDirectory)
    }

    pub fn file_type(self) -> &'static str {
        match self {
            SourceKind::PackedFile => "nifti",
            SourceKind::SeriesDirectory => "series",
        }
    }
}

/// A loaded scan: dense intensities plus optional spatial metadata
#[derive(Debug)]
pub struct Volume {
    data: Array3<f32>,
    affine: Option<Affine>,
    header: Option<NiftiHeader>,
    source: SourceKind,
    file_name: String,
    range: (f32, f32),
}

impl Volume {
    pub fn new(data: Array3<f32>, source: SourceKind, file_name: impl Into<String>) -> Self {
        let range = data
            .iter()
            .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or((0.0, 0.0));

        Self {
            data,
            affine: None,
            header: None,
            source,
            file_name: file_name.into(),
            range,
        }
    }

    pub fn with_affine(mut self, affine: Option<Affine>) -> Self {
        self.affine = affine;
        self
    }

    pub fn with_header(mut self, header: NiftiHeader) -> Self {
        self.header = Some(header);
        self
    }

    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn shape(&self) -> [usize; 3] {
        let (d0, d1, d2) = self.data.dim();
        [d0, d1, d2]
    }

    pub fn affine(&self) -> Option<&Affine> {
        self.affine.as_ref()
    }

    pub fn header(&self) -> Option<&NiftiHeader> {
        self.header.as_ref()
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `(min, max)` intensity
    pub fn intensity_range(&self) -> (f32, f32) {
        self.range
    }

    pub fn contains(&self, voxel: Voxel) -> bool {
        voxel.within(self.shape())
    }
}
