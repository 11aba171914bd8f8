//! Saving label volumes and their label-description files

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array3, Axis as ArrayAxis};
use nifti::NiftiHeader;
use nifti::writer::WriterOptions;
use tracing::debug;

use crate::points::{Label, color_for, name_for};

use super::types::{Affine, IDENTITY_AFFINE, SourceKind, Volume, VolumeError};

/// Put a label volume into the voxel order its source expects on disk.
///
/// Slice series are stacked `(slice, row, col)`; their labels are transposed
/// to `(col, row, slice)` and flipped along the last axis. Packed files are
/// returned unchanged.
pub fn reorient_for_source(labels: Array3<Label>, source: SourceKind) -> Array3<Label> {
    if !source.needs_reorientation() {
        return labels;
    }
    let mut reoriented = labels.permuted_axes([2, 1, 0]);
    reoriented.invert_axis(ArrayAxis(2));
    reoriented.as_standard_layout().into_owned()
}

/// Header to save labels with: the source header when present, otherwise
/// one carrying the source affine (or identity)
fn output_header(volume: &Volume) -> NiftiHeader {
    let mut header = match volume.header() {
        Some(header) => header.clone(),
        None => header_from_affine(volume.affine().unwrap_or(&IDENTITY_AFFINE)),
    };
    // Labels are stored unscaled
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    header
}

fn header_from_affine(affine: &Affine) -> NiftiHeader {
    NiftiHeader {
        pixdim: [1.0; 8],
        sform_code: 1,
        qform_code: 0,
        srow_x: affine[0],
        srow_y: affine[1],
        srow_z: affine[2],
        ..NiftiHeader::default()
    }
}

/// Save `labels` as a NIfTI file at `path` (gzip-compressed for `.nii.gz`)
pub fn save_label_volume(
    labels: &Array3<Label>,
    volume: &Volume,
    path: &Path,
) -> Result<(), VolumeError> {
    let header = output_header(volume);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(labels)
        .map_err(|e| VolumeError::Encode(format!("{:?}: {}", path, e)))?;
    debug!("Wrote label volume {:?} with shape {:?}", path, labels.dim());
    Ok(())
}

/// Companion description path: `<stem>_labels.txt` next to the label volume
pub fn label_description_path(volume_path: &Path) -> PathBuf {
    let name = volume_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("segmentation.nii.gz");
    let stem = name
        .strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
        .unwrap_or(name);
    volume_path.with_file_name(format!("{}_labels.txt", stem))
}

/// Write an ITK-SNAP label description for `labels` (ascending, background excluded)
pub fn write_label_description(labels: &[Label], path: &Path) -> Result<(), VolumeError> {
    let mut out = BufWriter::new(File::create(path)?);
    render_label_description(labels, &mut out)?;
    out.flush()?;
    Ok(())
}

fn render_label_description(labels: &[Label], out: &mut impl Write) -> std::io::Result<()> {
    const RULE: &str = "################################################";
    writeln!(out, "{}", RULE)?;
    writeln!(out, "# ITK-SnAP Label Description File")?;
    writeln!(out, "# Generated by seedseg")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "# IDX   -R-  -G-  -B-  -A--  VIS MSH  LABEL")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "    0     0    0    0        0  0  0    \"Clear Label\"")?;

    for &label in labels.iter().filter(|&&l| l > 0) {
        let color = color_for(label);
        writeln!(
            out,
            "  {:3}  {:3}  {:3}  {:3}        1  1  1    \"{}\"",
            label,
            color.r,
            color.g,
            color.b,
            name_for(label)
        )?;
    }
    Ok(())
}
