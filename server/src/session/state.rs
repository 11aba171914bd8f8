use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::artifacts::{Artifact, ArtifactKind, ArtifactManager};
use super::store::SessionError;
use crate::points::{Axis, Label, Pixel, PointError, PointRegistry};
use crate::volume::{self, Volume};

/// Session ID: hyphenated UUID v4
pub type SessionId = String;

pub fn generate_session_id() -> SessionId {
    Uuid::new_v4().to_string()
}

/// Get current timestamp in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn millis_to_datetime(millis: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or_default()
}

/// Slice the user is currently looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub axis: Axis,
    pub slice_index: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            axis: Axis::Axial,
            slice_index: 0,
        }
    }
}

/// A registered session. Timestamps live outside the state lock so the
/// sweeper can read them without waiting on a running request.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub created_at: u64,
    last_activity: AtomicU64,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(id: SessionId, workspace: PathBuf) -> Self {
        let now = now_millis();
        Self {
            state: Arc::new(Mutex::new(SessionState::new(id.clone(), workspace))),
            id,
            created_at: now,
            last_activity: AtomicU64::new(now),
        }
    }

    pub fn touch(&self) {
        self.last_activity.store(now_millis(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Inactivity exceeds `timeout` as of `now`
    pub fn is_expired(&self, now: u64, timeout: Duration) -> bool {
        now.saturating_sub(self.last_activity()) > timeout.as_millis() as u64
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Guard only if no request currently holds the session
    pub fn try_lock(&self) -> Option<MutexGuard<'_, SessionState>> {
        self.state.try_lock().ok()
    }

    /// Guard that can move into a blocking task
    pub async fn lock_owned(&self) -> OwnedMutexGuard<SessionState> {
        self.state.clone().lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, by: Duration) {
        let shifted = self.last_activity().saturating_sub(by.as_millis() as u64);
        self.last_activity.store(shifted, Ordering::Relaxed);
    }
}

/// Everything a session owns: the loaded volume, its seed points, the
/// current view and generated files.
#[derive(Debug)]
pub struct SessionState {
    id: SessionId,
    workspace: PathBuf,
    volume: Option<Arc<Volume>>,
    source_dir: Option<PathBuf>,
    points: PointRegistry,
    view: ViewState,
    artifacts: ArtifactManager,
    closed: bool,
}

impl SessionState {
    pub fn new(id: SessionId, workspace: PathBuf) -> Self {
        Self {
            id,
            workspace,
            volume: None,
            source_dir: None,
            points: PointRegistry::new(),
            view: ViewState::default(),
            artifacts: ArtifactManager::new(),
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Per-session directory for staged uploads and outputs
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Torn down after leaving the store; nothing may be written for it
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// `NotFound` once the session has been torn down
    pub fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::NotFound(self.id.clone()));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.workspace.join("output")
    }

    pub fn volume(&self) -> Option<&Arc<Volume>> {
        self.volume.as_ref()
    }

    pub fn require_volume(&self) -> Result<&Arc<Volume>, SessionError> {
        self.volume.as_ref().ok_or(SessionError::NoVolume)
    }

    pub fn points(&self) -> &PointRegistry {
        &self.points
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut ArtifactManager {
        &mut self.artifacts
    }

    /// Decode an upload and make it the session's volume. The size limit is
    /// checked first; on any failure the previous state is kept.
    pub fn upload(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        limit: usize,
    ) -> Result<Arc<Volume>, SessionError> {
        self.ensure_open()?;
        volume::check_size(bytes.len(), limit)?;

        let staging = self
            .workspace
            .join(format!("upload-{}", &Uuid::new_v4().simple().to_string()[..8]));
        let loaded = match volume::load_upload(file_name, bytes, limit, &staging) {
            Ok(v) => v,
            Err(e) => {
                remove_dir_quietly(&staging);
                return Err(e.into());
            }
        };

        self.clear();
        self.source_dir = Some(staging);
        let loaded = Arc::new(loaded);
        self.volume = Some(loaded.clone());
        info!(
            "Session {}: loaded {} with shape {:?}",
            self.id,
            loaded.file_name(),
            loaded.shape()
        );
        Ok(loaded)
    }

    /// Replace the volume directly (no staged files)
    pub fn install_volume(&mut self, volume: Volume) -> Arc<Volume> {
        self.clear();
        let volume = Arc::new(volume);
        self.volume = Some(volume.clone());
        volume
    }

    /// Validate a slice request and make it the current view
    pub fn select_slice(
        &mut self,
        axis: u64,
        slice_index: usize,
    ) -> Result<(Arc<Volume>, Axis), SessionError> {
        let volume = self.require_volume()?.clone();
        let axis = parse_axis(axis)?;
        check_slice(&volume, axis, slice_index)?;
        self.view = ViewState { axis, slice_index };
        Ok((volume, axis))
    }

    /// Register a point clicked at `pixel` on the given slice
    pub fn mark_point(
        &mut self,
        axis: u64,
        slice_index: usize,
        pixel: Pixel,
        label: Option<u64>,
    ) -> Result<Label, SessionError> {
        let label = label
            .map(|n| Label::try_from(n).map_err(|_| PointError::InvalidLabel(n)))
            .transpose()?;
        let volume = self.require_volume()?;
        let axis = parse_axis(axis)?;
        check_slice(volume, axis, slice_index)?;

        let voxel = axis.to_voxel(slice_index, pixel);
        if !volume.contains(voxel) {
            return Err(SessionError::PixelOutOfBounds {
                axis,
                slice_index,
                x: pixel.x,
                y: pixel.y,
            });
        }

        let label = self.points.mark(axis, slice_index, pixel, label)?;
        debug!("Session {}: point {} at {}", self.id, label, voxel);
        Ok(label)
    }

    pub fn remove_point(&mut self, label: u64) -> Result<(), SessionError> {
        match Label::try_from(label) {
            Ok(label) if self.points.remove(label) => {
                debug!("Session {}: removed point {}", self.id, label);
                Ok(())
            }
            _ => Err(SessionError::PointNotFound(label)),
        }
    }

    pub fn clear_points(&mut self) {
        self.points.clear();
    }

    pub fn download(&self, kind: ArtifactKind) -> Result<&Artifact, SessionError> {
        self.artifacts
            .latest(kind)
            .filter(|a| a.path.exists())
            .ok_or(SessionError::NoArtifact(kind))
    }

    /// Drop the volume, points, view and outputs
    pub fn clear(&mut self) {
        self.volume = None;
        self.points.clear();
        self.view = ViewState::default();
        self.artifacts.clear();
        if let Some(dir) = self.source_dir.take() {
            remove_dir_quietly(&dir);
        }
    }

    /// Release everything including the workspace directory
    pub fn teardown(&mut self) {
        self.closed = true;
        self.clear();
        remove_dir_quietly(&self.workspace);
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            volume_loaded: self.volume.is_some(),
            file_name: self.volume.as_ref().map(|v| v.file_name().to_string()),
            file_type: self.volume.as_ref().map(|v| v.source().file_type()),
            volume_shape: self.volume.as_ref().map(|v| v.shape()),
            total_points: self.points.len(),
            last_point_number: self.points.last_label(),
            highest_point_number: self.points.highest_label(),
            current_view: self.view,
            has_segmentation: self.artifacts.latest(ArtifactKind::Segmentation).is_some(),
        }
    }
}

/// Snapshot of a session's contents for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub volume_loaded: bool,
    pub file_name: Option<String>,
    pub file_type: Option<&'static str>,
    pub volume_shape: Option<[usize; 3]>,
    pub total_points: usize,
    pub last_point_number: Label,
    pub highest_point_number: Label,
    pub current_view: ViewState,
    pub has_segmentation: bool,
}

fn parse_axis(raw: u64) -> Result<Axis, SessionError> {
    u8::try_from(raw)
        .ok()
        .and_then(|axis| Axis::try_from(axis).ok())
        .ok_or(SessionError::InvalidAxis(raw))
}

fn check_slice(volume: &Volume, axis: Axis, slice_index: usize) -> Result<(), SessionError> {
    let count = volume.shape()[axis.index()];
    if slice_index >= count {
        return Err(SessionError::SliceOutOfRange {
            axis,
            slice_index,
            count,
        });
    }
    Ok(())
}

fn remove_dir_quietly(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove directory {:?}: {}", dir, e),
    }
}
