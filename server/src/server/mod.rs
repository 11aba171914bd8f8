//! HTTP API: shared state, routes and error responses

mod error;
mod extract;
mod routes;
mod types;

pub use error::ApiErrorResponse;
pub use extract::{ApiJson, ApiPath, CurrentSession, SESSION_HEADER};
pub use routes::api_routes;
pub use types::*;

use std::sync::Arc;

use crate::config::Config;
use crate::segmentation::{InteractiveSegmenter, SegmentationOrchestrator};
use crate::session::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub orchestrator: Arc<SegmentationOrchestrator>,
    /// Maximum upload size in bytes
    pub max_upload_size: usize,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionStore>,
        orchestrator: Arc<SegmentationOrchestrator>,
        max_upload_size: usize,
    ) -> Self {
        Self {
            sessions,
            orchestrator,
            max_upload_size,
        }
    }

    /// Build the state described by `config`, segmenting with `segmenter`
    pub fn from_config(config: &Config, segmenter: Arc<dyn InteractiveSegmenter>) -> Self {
        Self::new(
            Arc::new(SessionStore::with_config(config.session_config())),
            Arc::new(SegmentationOrchestrator::new(segmenter, config.fallback)),
            config.upload.max_upload_size,
        )
    }

    /// Number of live sessions
    pub async fn get_stats(&self) -> usize {
        self.sessions.session_count().await
    }
}
