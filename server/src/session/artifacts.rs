//! Output files produced by segmentation runs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Kind of a downloadable output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Label volume (`.nii.gz`)
    Segmentation,
    /// ITK-SNAP label description (`.txt`)
    Labels,
}

impl ArtifactKind {
    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Segmentation => "application/octet-stream",
            ArtifactKind::Labels => "text/plain",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Segmentation => f.write_str("segmentation"),
            ArtifactKind::Labels => f.write_str("labels"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "segmentation" => Ok(ArtifactKind::Segmentation),
            "labels" => Ok(ArtifactKind::Labels),
            other => Err(other.to_string()),
        }
    }
}

/// One generated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

impl Artifact {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    }
}

/// Ordered list of a session's output files (oldest first)
#[derive(Debug, Default)]
pub struct ArtifactManager {
    artifacts: Vec<Artifact>,
}

impl ArtifactManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ArtifactKind, path: impl Into<PathBuf>) {
        self.artifacts.push(Artifact {
            kind,
            path: path.into(),
        });
    }

    /// Most recently added artifact of `kind`
    pub fn latest(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().rev().find(|a| a.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    /// Delete every tracked file and forget them
    pub fn clear(&mut self) {
        for artifact in self.artifacts.drain(..) {
            remove_file_quietly(&artifact.path);
        }
    }
}

fn remove_file_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed old output file: {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove file {:?}: {}", path, e),
    }
}
