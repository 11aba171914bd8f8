//! HTTP route handlers for the segmentation API

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use tracing::{debug, error, info, warn};

use super::AppState;
use super::error::ApiErrorResponse;
use super::extract::{ApiJson, ApiPath, CurrentSession};
use super::types::{
    ColorTemplateResponse, CreateSessionResponse, MarkPointRequest, MarkPointResponse,
    MessageResponse, PointEntry, PointsResponse, RemovePointResponse, SegmenterStatus,
    SessionListResponse, SliceResponse, StatusResponse, UploadParams, UploadResponse,
};
use crate::points::{Pixel, color_for, palette};
use crate::segmentation::SegmentationReport;
use crate::session::{ArtifactKind, millis_to_datetime};
use crate::volume::{VolumeError, normalize_for_display, slice_view};

/// POST /api/session - Create a new session
pub async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session = state.sessions.create().await;
    Json(CreateSessionResponse {
        session_id: session.id.clone(),
        message: "Session created successfully".to_string(),
    })
}

/// DELETE /api/session/:session_id - Delete a session and its files
pub async fn delete_session(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<String>,
) -> Result<Json<MessageResponse>, ApiErrorResponse> {
    if state.sessions.delete(&session_id).await {
        Ok(Json(MessageResponse::new(format!(
            "Session {} deleted successfully",
            session_id
        ))))
    } else {
        Err(ApiErrorResponse::new(
            "session_not_found",
            format!("Session not found: {}", session_id),
        ))
    }
}

/// GET /api/sessions - List active sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions = state.sessions.list().await;
    Json(SessionListResponse {
        total: sessions.len(),
        sessions,
    })
}

/// POST /api/upload?filename=<name> - Upload a volume (raw request body)
pub async fn upload(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, ApiErrorResponse> {
    let limit = state.max_upload_size;
    let file_name = params
        .filename
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiErrorResponse::new("missing_filename", "filename query parameter required"))?;

    // Refuse oversized uploads before reading the body
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if let Some(size) = declared
        && size > limit
    {
        warn!("Rejected upload {} of {} bytes", file_name, size);
        return Err(VolumeError::TooLarge { size, limit }.into());
    }
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|_| {
        ApiErrorResponse::from(VolumeError::TooLarge {
            size: declared.unwrap_or(limit + 1),
            limit,
        })
    })?;

    let mut guard = session.lock_owned().await;
    let name = file_name.clone();
    let volume = tokio::task::spawn_blocking(move || guard.upload(&name, &bytes, limit))
        .await
        .map_err(|e| {
            error!("Upload task failed: {}", e);
            ApiErrorResponse::internal("upload processing failed")
        })??;

    Ok(Json(UploadResponse {
        message: format!("File {} uploaded successfully", file_name),
        session_id: session.id.clone(),
        file_name: volume.file_name().to_string(),
        file_type: volume.source().file_type(),
        shape: volume.shape(),
        intensity_range: volume.intensity_range(),
    }))
}

/// GET /api/slice/:axis/:slice_index - Display-ready slice with its marked points
pub async fn get_slice(
    CurrentSession(session): CurrentSession,
    ApiPath((axis, slice_index)): ApiPath<(u64, usize)>,
) -> Result<Json<SliceResponse>, ApiErrorResponse> {
    let mut state = session.lock().await;
    let (volume, axis) = state.select_slice(axis, slice_index)?;

    let view = slice_view(&volume, axis, slice_index);
    let (height, width) = view.dim();
    let slice_data = normalize_for_display(view);

    Ok(Json(SliceResponse {
        slice_data,
        shape: (width, height),
        axis,
        slice_index,
        max_slices: volume.shape()[axis.index()],
        marked_points: state.points().list_slice(axis, slice_index).to_vec(),
    }))
}

/// POST /api/mark_point - Add or relocate a seed point
pub async fn mark_point(
    CurrentSession(session): CurrentSession,
    ApiJson(request): ApiJson<MarkPointRequest>,
) -> Result<Json<MarkPointResponse>, ApiErrorResponse> {
    let mut state = session.lock().await;
    let label = state.mark_point(
        request.axis,
        request.slice_index,
        Pixel::new(request.point.x, request.point.y),
        request.point_number,
    )?;

    metrics::counter!("seedseg_points_marked_total").increment(1);
    Ok(Json(MarkPointResponse {
        message: format!("Point {} marked", label),
        point_number: label,
        color: color_for(label),
        total_points: state.points().len(),
    }))
}

/// GET /api/points - All seed points and their per-slice projections
pub async fn get_points(CurrentSession(session): CurrentSession) -> Json<PointsResponse> {
    let state = session.lock().await;
    let registry = state.points();

    let points = registry
        .list_all()
        .into_iter()
        .map(|p| PointEntry {
            point_number: p.label,
            z: p.voxel.z,
            y: p.voxel.y,
            x: p.voxel.x,
            color: color_for(p.label),
        })
        .collect();
    let by_slice = registry
        .projections()
        .map(|(key, points)| (key.to_string(), points.to_vec()))
        .collect();

    Json(PointsResponse {
        points,
        by_slice,
        total_points: registry.len(),
    })
}

/// DELETE /api/points - Remove every seed point
pub async fn clear_points(CurrentSession(session): CurrentSession) -> Json<RemovePointResponse> {
    let mut state = session.lock().await;
    state.clear_points();
    debug!("Session {}: cleared all points", session.id);
    Json(RemovePointResponse {
        message: "All points cleared".to_string(),
        total_points: 0,
    })
}

/// DELETE /api/remove_point/:point_number - Remove one seed point
pub async fn remove_point(
    CurrentSession(session): CurrentSession,
    ApiPath(point_number): ApiPath<u64>,
) -> Result<Json<RemovePointResponse>, ApiErrorResponse> {
    let mut state = session.lock().await;
    state.remove_point(point_number)?;
    Ok(Json(RemovePointResponse {
        message: format!("Point {} removed", point_number),
        total_points: state.points().len(),
    }))
}

/// POST /api/run_segmentation - Segment the volume from the current points
pub async fn run_segmentation(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<SegmentationReport>, ApiErrorResponse> {
    let mut guard = session.lock_owned().await;
    let orchestrator = state.orchestrator.clone();

    info!("Session {}: starting segmentation", session.id);
    let report = tokio::task::spawn_blocking(move || orchestrator.run(&mut guard))
        .await
        .map_err(|e| {
            error!("Segmentation task failed: {}", e);
            ApiErrorResponse::internal("segmentation task failed")
        })??;

    Ok(Json(report))
}

/// GET /api/download/:file_type - Latest output file of the given type
pub async fn download(
    CurrentSession(session): CurrentSession,
    ApiPath(file_type): ApiPath<String>,
) -> Result<Response, ApiErrorResponse> {
    let kind: ArtifactKind = file_type.parse().map_err(|other| {
        ApiErrorResponse::new(
            "invalid_file_type",
            format!("Invalid file type: {} (use segmentation or labels)", other),
        )
    })?;

    let (path, file_name) = {
        let state = session.lock().await;
        let artifact = state.download(kind)?;
        (artifact.path.clone(), artifact.file_name().to_string())
    };

    let contents = tokio::fs::read(&path).await.map_err(|e| {
        warn!("Failed to read {:?}: {}", path, e);
        ApiErrorResponse::new("file_not_found", format!("No {} file available", kind))
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        contents,
    )
        .into_response())
}

/// GET /api/status - Summary of the session's contents
pub async fn status(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Json<StatusResponse> {
    let summary = session.lock().await.summary();
    let segmenter = state.orchestrator.segmenter();
    Json(StatusResponse {
        session_id: session.id.clone(),
        created_at: millis_to_datetime(session.created_at),
        last_activity: millis_to_datetime(session.last_activity()),
        summary,
        segmenter: SegmenterStatus {
            name: segmenter.name().to_string(),
            available: segmenter.is_available(),
        },
    })
}

/// POST /api/reset - Drop the session's volume, points and outputs
pub async fn reset(CurrentSession(session): CurrentSession) -> Json<MessageResponse> {
    session.lock().await.clear();
    info!("Session {}: reset", session.id);
    Json(MessageResponse::new("Session reset successfully"))
}

/// GET /api/color_template - Label color palette
pub async fn color_template() -> Json<ColorTemplateResponse> {
    let colors = palette();
    Json(ColorTemplateResponse {
        total_colors: colors.len(),
        colors,
    })
}

/// Create the API router (mounted under `/api`)
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/session", post(create_session))
        .route("/session/:session_id", delete(delete_session))
        .route("/sessions", get(list_sessions))
        .route("/upload", post(upload))
        .route("/slice/:axis/:slice_index", get(get_slice))
        .route("/mark_point", post(mark_point))
        .route("/points", get(get_points).delete(clear_points))
        .route("/remove_point/:point_number", delete(remove_point))
        .route("/run_segmentation", post(run_segmentation))
        .route("/download/:file_type", get(download))
        .route("/status", get(status))
        .route("/reset", post(reset))
        .route("/color_template", get(color_template))
        .with_state(state)
}
