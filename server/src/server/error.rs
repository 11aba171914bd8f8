//! JSON error responses for the HTTP API

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::points::PointError;
use crate::segmentation::SegmentationError;
use crate::session::SessionError;
use crate::volume::VolumeError;

/// Error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiErrorResponse {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
        }
    }

    pub fn missing_session_id() -> Self {
        Self::new(
            "missing_session_id",
            "Session ID header required. Create a session first with POST /api/session",
        )
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new("internal_error", error)
    }

    fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "session_not_found" | "point_not_found" | "file_not_found" => StatusCode::NOT_FOUND,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            "io_error" | "internal_error" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

fn volume_error_code(e: &VolumeError) -> &'static str {
    match e {
        VolumeError::TooLarge { .. } => "payload_too_large",
        VolumeError::UnsupportedFormat(_) => "unsupported_format",
        VolumeError::Decode(_) => "decode_error",
        VolumeError::Encode(_) | VolumeError::Io(_) => "io_error",
    }
}

fn session_error_code(e: &SessionError) -> &'static str {
    match e {
        SessionError::NotFound(_) => "session_not_found",
        SessionError::NoVolume => "no_volume",
        SessionError::InvalidAxis(_) => "invalid_axis",
        SessionError::SliceOutOfRange { .. } => "slice_out_of_range",
        SessionError::PixelOutOfBounds { .. } => "point_out_of_bounds",
        SessionError::PointNotFound(_) => "point_not_found",
        SessionError::NoArtifact(_) => "file_not_found",
        SessionError::Point(PointError::InvalidLabel(_)) => "invalid_point_number",
        SessionError::Point(PointError::LabelsExhausted) => "labels_exhausted",
        SessionError::Volume(volume_error) => volume_error_code(volume_error),
    }
}

impl From<VolumeError> for ApiErrorResponse {
    fn from(e: VolumeError) -> Self {
        Self::new(volume_error_code(&e), e.to_string())
    }
}

impl From<SessionError> for ApiErrorResponse {
    fn from(e: SessionError) -> Self {
        Self::new(session_error_code(&e), e.to_string())
    }
}

impl From<SegmentationError> for ApiErrorResponse {
    fn from(e: SegmentationError) -> Self {
        let code = match &e {
            SegmentationError::NoVolume => "no_volume",
            SegmentationError::NoPoints => "no_points",
            SegmentationError::SessionClosed(_) => "session_not_found",
        };
        Self::new(code, e.to_string())
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::Axis;
    use crate::session::ArtifactKind;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SessionError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (SessionError::NoVolume, StatusCode::BAD_REQUEST),
            (SessionError::InvalidAxis(4), StatusCode::BAD_REQUEST),
            (
                SessionError::SliceOutOfRange {
                    axis: Axis::Axial,
                    slice_index: 9,
                    count: 9,
                },
                StatusCode::BAD_REQUEST,
            ),
            (SessionError::PointNotFound(3), StatusCode::NOT_FOUND),
            (
                SessionError::NoArtifact(ArtifactKind::Labels),
                StatusCode::NOT_FOUND,
            ),
            (
                SessionError::Point(PointError::InvalidLabel(0)),
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::Volume(VolumeError::TooLarge { size: 2, limit: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                SessionError::Volume(VolumeError::UnsupportedFormat("a.raw".into())),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, status) in cases {
            let response = ApiErrorResponse::from(error);
            assert_eq!(response.status(), status, "code {}", response.code);
        }
    }

    #[test]
    fn test_segmentation_error_codes() {
        let response = ApiErrorResponse::from(SegmentationError::NoPoints);
        assert_eq!(response.code, "no_points");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiErrorResponse::from(SegmentationError::SessionClosed("x".into()));
        assert_eq!(response.code, "session_not_found");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
