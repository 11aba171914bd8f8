//! Seed-driven segmentation runs
//!
//! A run turns the seed points of a session into one label volume: seeds are
//! processed in the order they were marked, and each one claims only voxels
//! no earlier seed has claimed. The interactive backend is probed once per
//! run; if it is unavailable, or fails on any seed, the whole run is redone
//! with the threshold fallback so a result never mixes strategies.

use chrono::Local;
use metrics::{counter, histogram};
use ndarray::Array3;
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::capability::{Capability, InteractiveSegmenter, MaskProducer, SegmenterError};
use super::fallback::{self, FallbackParams};
use super::mask::CandidateMask;
use crate::points::{Label, SeedPoint};
use crate::session::{ArtifactKind, SessionState};
use crate::volume::{
    Volume, VolumeError, label_description_path, reorient_for_source, save_label_volume,
    write_label_description,
};

/// Reasons a run is refused before it starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("No volume loaded")]
    NoVolume,

    #[error("No points marked")]
    NoPoints,

    #[error("Session {0} no longer exists")]
    SessionClosed(String),
}

/// How a label volume was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Interactive,
    ThresholdFallback,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Interactive => "interactive",
            Strategy::ThresholdFallback => "threshold_fallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Interactive => f.write_str("interactive model"),
            Strategy::ThresholdFallback => f.write_str("threshold fallback"),
        }
    }
}

/// Label volume produced by one run, in source voxel order
#[derive(Debug, Clone)]
pub struct LabelVolume {
    pub labels: Array3<Label>,
    pub strategy: Strategy,
    /// Voxels claimed per seed label
    pub voxel_counts: BTreeMap<Label, usize>,
}

impl LabelVolume {
    /// Labels that claimed at least one voxel, ascending
    pub fn unique_labels(&self) -> Vec<Label> {
        self.voxel_counts
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&label, _)| label)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Result of a run, as reported to the client
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationReport {
    pub status: RunStatus,
    pub message: String,
    pub strategy: Strategy,
    pub file_path: Option<String>,
    pub unique_labels: Vec<Label>,
    pub voxel_counts: BTreeMap<Label, usize>,
}

pub struct SegmentationOrchestrator {
    segmenter: Arc<dyn InteractiveSegmenter>,
    fallback: FallbackParams,
}

impl SegmentationOrchestrator {
    pub fn new(segmenter: Arc<dyn InteractiveSegmenter>, fallback: FallbackParams) -> Self {
        Self {
            segmenter,
            fallback,
        }
    }

    pub fn segmenter(&self) -> &dyn InteractiveSegmenter {
        self.segmenter.as_ref()
    }

    pub fn fallback_params(&self) -> &FallbackParams {
        &self.fallback
    }

    /// Build the label volume for `seeds` (chronological order)
    pub fn compute_labels(&self, volume: &Volume, seeds: &[SeedPoint]) -> LabelVolume {
        let shape = volume.shape();

        match self.segmenter.acquire() {
            Capability::Available(mut producer) => {
                info!(
                    "Segmenting {} seeds with {}",
                    seeds.len(),
                    self.segmenter.name()
                );
                let result = merge(shape, seeds, |seed| {
                    interactive_candidate(producer.as_mut(), volume, seed)
                });
                match result {
                    Ok((labels, voxel_counts)) => {
                        return LabelVolume {
                            labels,
                            strategy: Strategy::Interactive,
                            voxel_counts,
                        };
                    }
                    Err(e) => warn!(
                        "Interactive segmentation failed ({}), restarting run with threshold fallback",
                        e
                    ),
                }
            }
            Capability::Unavailable(reason) => {
                info!("Interactive segmenter unavailable ({}), using threshold fallback", reason)
            }
        }

        let data = volume.data();
        let Ok((labels, voxel_counts)) = merge::<Infallible, _>(shape, seeds, |seed| {
            Ok(fallback::candidate_mask(data, seed.voxel, &self.fallback))
        });
        LabelVolume {
            labels,
            strategy: Strategy::ThresholdFallback,
            voxel_counts,
        }
    }

    /// Segment the session's volume from its seed points and save the result
    /// as the session's only outputs.
    ///
    /// Missing volume or points are refused without touching the session.
    /// Failures after that are reported in the returned report, with any
    /// partially written files removed.
    pub fn run(&self, session: &mut SessionState) -> Result<SegmentationReport, SegmentationError> {
        if session.is_closed() {
            return Err(SegmentationError::SessionClosed(session.id().to_string()));
        }
        let volume = session
            .volume()
            .cloned()
            .ok_or(SegmentationError::NoVolume)?;
        let seeds = session.points().list_all();
        if seeds.is_empty() {
            return Err(SegmentationError::NoPoints);
        }

        let start = Instant::now();
        session.artifacts_mut().clear();

        let result = self.compute_labels(&volume, &seeds);
        let strategy = result.strategy;
        let unique_labels = result.unique_labels();
        let voxel_counts = result.voxel_counts.clone();

        let report = match persist(session, &volume, result) {
            Ok(path) => {
                info!(
                    "Session {}: segmentation saved to {:?} ({} segments, {})",
                    session.id(),
                    path,
                    unique_labels.len(),
                    strategy
                );
                SegmentationReport {
                    status: RunStatus::Success,
                    message: format!(
                        "Segmentation completed using {}. {} segments created.",
                        strategy,
                        unique_labels.len()
                    ),
                    strategy,
                    file_path: Some(path.display().to_string()),
                    unique_labels,
                    voxel_counts,
                }
            }
            Err(e) => {
                error!("Session {}: failed to save segmentation: {}", session.id(), e);
                SegmentationReport {
                    status: RunStatus::Error,
                    message: format!("Segmentation failed: {}", e),
                    strategy,
                    file_path: None,
                    unique_labels: Vec::new(),
                    voxel_counts: BTreeMap::new(),
                }
            }
        };

        let status = match report.status {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        };
        counter!(
            "seedseg_segmentation_runs_total",
            "strategy" => strategy.as_str(),
            "status" => status
        )
        .increment(1);
        histogram!("seedseg_segmentation_duration_seconds").record(start.elapsed());
        Ok(report)
    }
}

fn interactive_candidate(
    producer: &mut dyn MaskProducer,
    volume: &Volume,
    seed: &SeedPoint,
) -> Result<CandidateMask, SegmenterError> {
    let mask = producer.segment(volume.data(), seed.voxel)?;
    let (d0, d1, d2) = mask.dim();
    if [d0, d1, d2] != volume.shape() {
        return Err(SegmenterError::ShapeMismatch {
            expected: volume.shape(),
            got: [d0, d1, d2],
        });
    }
    Ok(CandidateMask::full(mask))
}

/// Apply seed candidates in order; each seed only claims unlabeled voxels
fn merge<E, F>(
    shape: [usize; 3],
    seeds: &[SeedPoint],
    mut candidate: F,
) -> Result<(Array3<Label>, BTreeMap<Label, usize>), E>
where
    F: FnMut(&SeedPoint) -> Result<CandidateMask, E>,
{
    let mut labels = Array3::<Label>::zeros(shape);
    let mut voxel_counts = BTreeMap::new();

    for seed in seeds {
        let mask = candidate(seed)?;
        let claimed = mask.claim(&mut labels, seed.label);
        debug!(
            "Seed {} at {}: {} candidates, {} claimed",
            seed.label,
            seed.voxel,
            mask.count(),
            claimed
        );
        voxel_counts.insert(seed.label, claimed);
    }
    Ok((labels, voxel_counts))
}

fn output_file_name(session_id: &str) -> String {
    let short_id: String = session_id.chars().take(8).collect();
    format!(
        "segmented_{}_{}.nii.gz",
        Local::now().format("%Y%m%d_%H%M%S"),
        short_id
    )
}

/// Save the label volume and its description, registering both as artifacts
fn persist(
    session: &mut SessionState,
    volume: &Volume,
    result: LabelVolume,
) -> Result<PathBuf, VolumeError> {
    let unique_labels = result.unique_labels();
    let dir = session.output_dir();
    std::fs::create_dir_all(&dir)?;

    let path = dir.join(output_file_name(session.id()));
    let description = label_description_path(&path);
    let labels = reorient_for_source(result.labels, volume.source());

    let written = save_label_volume(&labels, volume, &path)
        .and_then(|()| write_label_description(&unique_labels, &description));
    if let Err(e) = written {
        remove_partial(&path);
        remove_partial(&description);
        return Err(e);
    }

    session
        .artifacts_mut()
        .add(ArtifactKind::Segmentation, path.clone());
    session.artifacts_mut().add(ArtifactKind::Labels, description);
    Ok(path)
}

fn remove_partial(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!("Could not remove partial output {:?}: {}", path, e);
    }
}
