//! Scan volumes: decoding uploads, slicing for display, and saving label volumes
//!
//! This module provides:
//! - `Volume` and `SourceKind` describing a loaded scan
//! - upload decoding for packed NIfTI files and zipped slice series
//! - label-volume saving and ITK-SNAP label descriptions

pub mod loader;
pub mod slice;
mod types;
pub mod writer;

pub use loader::{UploadKind, check_size, load_nifti, load_upload};
pub use slice::{normalize_for_display, slice_view};
pub use types::{Affine, IDENTITY_AFFINE, SourceKind, Volume, VolumeError};
pub use writer::{
    label_description_path, reorient_for_source, save_label_volume, write_label_description,
};
