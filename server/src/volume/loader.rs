//! Decoding uploaded scans into [`Volume`]s
//!
//! Two upload kinds are accepted:
//! - packed NIfTI files (`.nii`, `.nii.gz`)
//! - a `.zip` of 2D slice images (`.png`, `.tif`, `.tiff`), stacked in file-name order

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::{debug, info, warn};

use super::types::{Affine, SourceKind, Volume, VolumeError};

/// Supported slice image extensions inside a series archive
const SLICE_EXTENSIONS: &[&str] = &["png", "tif", "tiff"];

/// Upload kind, decided from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Nifti,
    SeriesArchive,
}

impl UploadKind {
    pub fn detect(file_name: &str) -> Result<Self, VolumeError> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".nii") || lower.ends_with(".nii.gz") {
            Ok(UploadKind::Nifti)
        } else if lower.ends_with(".zip") {
            Ok(UploadKind::SeriesArchive)
        } else {
            Err(VolumeError::UnsupportedFormat(format!(
                "'{}': upload a .nii, .nii.gz, or a .zip of slice images",
                file_name
            )))
        }
    }
}

/// Reject uploads above `limit` bytes. Runs before any decoding.
pub fn check_size(size: usize, limit: usize) -> Result<(), VolumeError> {
    if size > limit {
        return Err(VolumeError::TooLarge { size, limit });
    }
    Ok(())
}

/// Decode an uploaded file, staging it under `staging_dir`
pub fn load_upload(
    file_name: &str,
    bytes: &[u8],
    limit: usize,
    staging_dir: &Path,
) -> Result<Volume, VolumeError> {
    check_size(bytes.len(), limit)?;
    let kind = UploadKind::detect(file_name)?;

    // Only the final path component is trusted
    let file_name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| VolumeError::UnsupportedFormat(file_name.to_string()))?
        .to_string();

    fs::create_dir_all(staging_dir)?;
    info!(
        "Decoding upload {} ({:.1} MB) as {:?}",
        file_name,
        bytes.len() as f64 / (1024.0 * 1024.0),
        kind
    );

    match kind {
        UploadKind::Nifti => {
            let path = staging_dir.join(&file_name);
            fs::write(&path, bytes)?;
            load_nifti(&path)
        }
        UploadKind::SeriesArchive => {
            let series_dir = staging_dir.join("series");
            fs::create_dir_all(&series_dir)?;
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
                .map_err(|e| VolumeError::Decode(format!("invalid zip archive: {}", e)))?;
            archive
                .extract(&series_dir)
                .map_err(|e| VolumeError::Decode(format!("failed to extract archive: {}", e)))?;
            load_series_dir(&series_dir, &file_name)
        }
    }
}

/// Load a packed NIfTI volume
pub fn load_nifti(path: &Path) -> Result<Volume, VolumeError> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| VolumeError::Decode(format!("{:?}: {}", path, e)))?;
    let header = obj.header().clone();

    let data = obj
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| VolumeError::Decode(e.to_string()))?;
    let ndim = data.ndim();
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| VolumeError::Decode(format!("expected a 3D volume, got {} dimensions", ndim)))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("volume.nii.gz")
        .to_string();

    let affine = sform_affine(&header);
    let volume = Volume::new(data, SourceKind::PackedFile, file_name)
        .with_affine(affine)
        .with_header(header);

    let (lo, hi) = volume.intensity_range();
    info!(
        "Loaded NIfTI {:?}: shape {:?}, range {:.2} to {:.2}",
        path,
        volume.shape(),
        lo,
        hi
    );
    Ok(volume)
}

/// Load every slice image under `dir` and stack them along axis 0
pub fn load_series_dir(dir: &Path, file_name: &str) -> Result<Volume, VolumeError> {
    let mut paths = Vec::new();
    collect_slice_files(dir, &mut paths)?;
    if paths.is_empty() {
        return Err(VolumeError::Decode(
            "no slice images found in uploaded archive".to_string(),
        ));
    }
    paths.sort_by_cached_key(|p| slice_order_key(p));

    let mut slices: Vec<Array2<f32>> = Vec::with_capacity(paths.len());
    for path in &paths {
        match read_slice(path) {
            Ok(slice) => slices.push(slice),
            Err(e) => warn!("Skipping unreadable slice {:?}: {}", path, e),
        }
    }
    let Some(first) = slices.first() else {
        return Err(VolumeError::Decode("no valid slices found".to_string()));
    };

    let plane = first.dim();
    if let Some(bad) = slices.iter().find(|s| s.dim() != plane) {
        return Err(VolumeError::Decode(format!(
            "slice dimensions differ: {:?} vs {:?}",
            plane,
            bad.dim()
        )));
    }

    let views: Vec<ArrayView2<f32>> = slices.iter().map(|s| s.view()).collect();
    let data = ndarray::stack(ndarray::Axis(0), &views)
        .map_err(|e| VolumeError::Decode(e.to_string()))?;

    info!(
        "Slice series loaded: {} slices, shape {:?}",
        slices.len(),
        data.dim()
    );
    Ok(Volume::new(data, SourceKind::SeriesDirectory, file_name))
}

fn collect_slice_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), VolumeError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_slice_files(&path, out)?;
            continue;
        }
        let is_slice = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SLICE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_slice {
            debug!("Found slice: {:?}", path);
            out.push(path);
        }
    }
    Ok(())
}

/// Sort key: trailing number of the file stem, then the full path
fn slice_order_key(path: &Path) -> (Option<u64>, PathBuf) {
    let number = path.file_stem().and_then(|s| s.to_str()).and_then(|stem| {
        let digits: String = stem
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        digits.parse().ok()
    });
    (number, path.to_path_buf())
}

fn read_slice(path: &Path) -> Result<Array2<f32>, VolumeError> {
    let image = image::open(path)
        .map_err(|e| VolumeError::Decode(e.to_string()))?
        .into_luma16();
    let (width, height) = image.dimensions();
    let values: Vec<f32> = image.into_raw().into_iter().map(f32::from).collect();
    Array2::from_shape_vec((height as usize, width as usize), values)
        .map_err(|e| VolumeError::Decode(e.to_string()))
}

fn sform_affine(header: &NiftiHeader) -> Option<Affine> {
    (header.sform_code > 0).then(|| {
        [
            header.srow_x,
            header.srow_y,
            header.srow_z,
            [0.0, 0.0, 0.0, 1.0],
        ]
    })
}
