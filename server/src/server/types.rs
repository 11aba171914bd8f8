//! Request and response bodies of the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::points::{Axis, Label, PaletteEntry, ProjectedPoint, Rgb};
use crate::session::{SessionId, SessionInfo, SessionSummary};

/// Response for POST /api/session
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response for GET /api/sessions
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
    pub total: usize,
}

/// Query parameters for POST /api/upload
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
}

/// Response for POST /api/upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub session_id: SessionId,
    pub file_name: String,
    pub file_type: &'static str,
    pub shape: [usize; 3],
    pub intensity_range: (f32, f32),
}

/// Response for GET /api/slice/:axis/:slice_index
#[derive(Debug, Serialize)]
pub struct SliceResponse {
    /// Display-normalized intensities, row-major (`slice_data[y][x]`)
    pub slice_data: Vec<Vec<u8>>,
    /// (width, height) of the slice
    pub shape: (usize, usize),
    pub axis: Axis,
    pub slice_index: usize,
    pub max_slices: usize,
    pub marked_points: Vec<ProjectedPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointCoords {
    pub x: usize,
    pub y: usize,
}

/// Request for POST /api/mark_point
#[derive(Debug, Deserialize)]
pub struct MarkPointRequest {
    pub axis: u64,
    pub slice_index: usize,
    pub point: PointCoords,
    /// Explicit label; relocates the point that owns it
    #[serde(default)]
    pub point_number: Option<u64>,
}

/// Response for POST /api/mark_point
#[derive(Debug, Serialize)]
pub struct MarkPointResponse {
    pub message: String,
    pub point_number: Label,
    pub color: Rgb,
    pub total_points: usize,
}

/// One seed point in volume coordinates
#[derive(Debug, Serialize)]
pub struct PointEntry {
    pub point_number: Label,
    pub z: usize,
    pub y: usize,
    pub x: usize,
    pub color: Rgb,
}

/// Response for GET /api/points
#[derive(Debug, Serialize)]
pub struct PointsResponse {
    /// Points in the order they were marked
    pub points: Vec<PointEntry>,
    /// Per-slice projections keyed `"<axis>_<slice_index>"`
    pub by_slice: BTreeMap<String, Vec<ProjectedPoint>>,
    pub total_points: usize,
}

/// Response for point deletions
#[derive(Debug, Serialize)]
pub struct RemovePointResponse {
    pub message: String,
    pub total_points: usize,
}

#[derive(Debug, Serialize)]
pub struct SegmenterStatus {
    pub name: String,
    pub available: bool,
}

/// Response for GET /api/status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub segmenter: SegmenterStatus,
}

/// Response for GET /api/color_template
#[derive(Debug, Serialize)]
pub struct ColorTemplateResponse {
    pub colors: Vec<PaletteEntry>,
    pub total_colors: usize,
}
