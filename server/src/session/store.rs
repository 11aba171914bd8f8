use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::artifacts::ArtifactKind;
use super::state::{
    Session, SessionId, SessionSummary, generate_session_id, millis_to_datetime, now_millis,
};
use crate::points::{Axis, PointError};
use crate::volume::VolumeError;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("No volume loaded")]
    NoVolume,

    #[error("Axis must be 0, 1 or 2 (got {0})")]
    InvalidAxis(u64),

    #[error("Slice index {slice_index} out of range for axis {axis} ({count} slices)")]
    SliceOutOfRange {
        axis: Axis,
        slice_index: usize,
        count: usize,
    },

    #[error("Point ({x}, {y}) lies outside slice {slice_index} of axis {axis}")]
    PixelOutOfBounds {
        axis: Axis,
        slice_index: usize,
        x: usize,
        y: usize,
    },

    #[error("Point {0} not found")]
    PointNotFound(u64),

    #[error("No {0} file available")]
    NoArtifact(ArtifactKind),

    #[error(transparent)]
    Point(#[from] PointError),

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity after which a session is swept
    pub timeout: Duration,
    /// Parent of the per-session workspaces
    pub data_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(24 * 60 * 60),
            data_dir: std::env::temp_dir().join("seedseg"),
        }
    }
}

/// Session listing entry
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// A request holds the session; its contents are not reported
    pub busy: bool,
    #[serde(flatten)]
    pub summary: Option<SessionSummary>,
}

#[derive(Debug, Clone, Copy)]
enum DeleteReason {
    Explicit,
    Expired,
}

impl DeleteReason {
    fn as_str(self) -> &'static str {
        match self {
            DeleteReason::Explicit => "explicit",
            DeleteReason::Expired => "expired",
        }
    }
}

/// Registry of live sessions keyed by ID
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create and register an empty session
    pub async fn create(&self) -> Arc<Session> {
        let id = generate_session_id();
        let session = Arc::new(Session::new(id.clone(), self.config.data_dir.join(&id)));

        self.sessions.write().await.insert(id.clone(), session.clone());
        counter!("seedseg_sessions_created_total").increment(1);
        info!("Created new session: {}", id);
        session
    }

    /// Look up a session and record activity on it
    pub async fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        let session = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Remove a session and release its resources. Returns false if it was
    /// not registered (already deleted or swept).
    pub async fn delete(&self, id: &str) -> bool {
        let detached = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id)
        };
        match detached {
            Some(session) => {
                release(session, DeleteReason::Explicit).await;
                true
            }
            None => false,
        }
    }

    /// Delete every session idle for longer than the configured timeout.
    /// Returns the number removed.
    pub async fn sweep(&self) -> usize {
        let now = now_millis();
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, session)| session.is_expired(now, self.config.timeout))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        let count = expired.len();
        for session in expired {
            release(session, DeleteReason::Expired).await;
        }
        if count > 0 {
            info!("Swept {} expired session(s)", count);
        }
        count
    }

    /// Run `sweep` every `period` until the returned task is aborted
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep().await;
            }
        })
    }

    /// Describe every live session. Sessions held by a running request are
    /// listed as busy without their contents.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|session| {
                let summary = session.try_lock().map(|state| state.summary());
                SessionInfo {
                    session_id: session.id.clone(),
                    created_at: millis_to_datetime(session.created_at),
                    last_activity: millis_to_datetime(session.last_activity()),
                    busy: summary.is_none(),
                    summary,
                }
            })
            .collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Tear down a session already detached from the map. Waits for any
/// request still holding the session.
async fn release(session: Arc<Session>, reason: DeleteReason) {
    session.lock().await.teardown();
    counter!("seedseg_sessions_deleted_total", "reason" => reason.as_str()).increment(1);
    match reason {
        DeleteReason::Explicit => info!("Deleted session: {}", session.id),
        DeleteReason::Expired => info!("Cleaned up expired session: {}", session.id),
    }
    debug!("Session {} released", session.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::Pixel;
    use crate::volume::{SourceKind, Volume};
    use ndarray::Array3;

    fn test_store(dir: &tempfile::TempDir, timeout: Duration) -> SessionStore {
        SessionStore::with_config(SessionConfig {
            timeout,
            data_dir: dir.path().to_path_buf(),
        })
    }

    fn test_volume() -> Volume {
        Volume::new(
            Array3::zeros((8, 8, 8)),
            SourceKind::PackedFile,
            "test.nii.gz",
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));

        let session = store.create().await;
        let fetched = store.get(&session.id).await.unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let store = SessionStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let a = store.create().await;
        let b = store.create().await;
        assert_ne!(a.id, b.id);

        {
            let mut state = a.lock().await;
            state.install_volume(test_volume());
            state.mark_point(2, 3, Pixel::new(1, 1), None).unwrap();
        }

        let state_b = b.lock().await;
        assert!(state_b.volume().is_none());
        assert!(state_b.points().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let session = store.create().await;

        assert!(store.delete(&session.id).await);
        assert!(!store.delete(&session.id).await);
        assert!(store.get(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let session = store.create().await;

        let workspace = session.lock().await.workspace().to_path_buf();
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join("scan.nii"), b"x").unwrap();

        store.delete(&session.id).await;
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_idle_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let idle = store.create().await;
        let active = store.create().await;

        idle.backdate(Duration::from_secs(120));
        assert_eq!(store.sweep().await, 1);

        assert!(store.get(&idle.id).await.is_err());
        assert!(store.get(&active.id).await.is_ok());
        // Sweeping again finds nothing
        assert_eq!(store.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_get_refreshes_activity() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let session = store.create().await;

        session.backdate(Duration::from_secs(120));
        store.get(&session.id).await.unwrap();
        assert_eq!(store.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_millis(1));
        store.create().await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        store.sweep().await;

        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_reports_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let session = store.create().await;
        store.create().await;
        {
            let mut state = session.lock().await;
            state.install_volume(test_volume());
            state.mark_point(0, 1, Pixel::new(2, 2), None).unwrap();
        }

        let infos = store.list().await;
        assert_eq!(infos.len(), 2);
        let info = infos.iter().find(|i| i.session_id == session.id).unwrap();
        assert!(!info.busy);
        let summary = info.summary.as_ref().unwrap();
        assert!(summary.volume_loaded);
        assert_eq!(summary.volume_shape, Some([8, 8, 8]));
        assert_eq!(summary.total_points, 1);
    }

    #[tokio::test]
    async fn test_list_reports_held_session_as_busy() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let held = store.create().await;
        let free = store.create().await;

        let _guard = held.lock().await;
        let infos = store.list().await;
        assert_eq!(infos.len(), 2);

        let held_info = infos.iter().find(|i| i.session_id == held.id).unwrap();
        assert!(held_info.busy);
        assert!(held_info.summary.is_none());
        let free_info = infos.iter().find(|i| i.session_id == free.id).unwrap();
        assert!(!free_info.busy);
        assert!(free_info.summary.is_some());
    }

    #[tokio::test]
    async fn test_deleted_session_refuses_late_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, Duration::from_secs(60));
        let session = store.create().await;
        let workspace = session.lock().await.workspace().to_path_buf();

        // A request resolved the session before it was deleted
        let late = store.get(&session.id).await.unwrap();
        store.delete(&session.id).await;

        let mut state = late.lock().await;
        assert!(state.is_closed());
        let err = state.upload("scan.nii", b"junk", 1024).unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
        assert!(!workspace.exists());
    }
}
