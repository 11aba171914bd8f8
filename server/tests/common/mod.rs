//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use ndarray::{Array2, Array3};
use nifti::writer::WriterOptions;
use seedseg_server::server::SESSION_HEADER;
use seedseg_server::{AppState, Config, NoSegmenter, api_routes};
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;
use tower_http::cors::{Any, CorsLayer};

/// Application under test. The data directory lives as long as this value.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _data_dir: TempDir,
}

/// Create a test application with the given upload limit
pub fn create_test_app_with_limit(max_upload_size: usize) -> TestApp {
    create_test_app_with_config(|config| config.upload.max_upload_size = max_upload_size)
}

/// Create a test application whose sessions expire after `timeout` idle
pub fn create_test_app_with_timeout(timeout: Duration) -> TestApp {
    create_test_app_with_config(|config| config.session.timeout = timeout)
}

fn create_test_app_with_config(customize: impl FnOnce(&mut Config)) -> TestApp {
    let data_dir = tempfile::tempdir().unwrap();
    let mut config = Config {
        data_dir: data_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.upload.max_upload_size = 16 * 1024 * 1024;
    customize(&mut config);

    let state = AppState::from_config(&config, Arc::new(NoSegmenter));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .nest("/api", api_routes(state.clone()))
        .layer(cors);

    TestApp {
        router,
        state,
        _data_dir: data_dir,
    }
}

/// Create a test application with all routes configured
pub fn create_test_app() -> TestApp {
    create_test_app_with_limit(16 * 1024 * 1024)
}

impl TestApp {
    /// Send a request, returning the status and the JSON body (Null if not JSON)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    /// Send a request and return the raw response body
    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let disposition = response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec(), disposition)
    }

    pub async fn create_session(&self) -> String {
        let (status, json) = self.send(post("/api/session", None)).await;
        assert_eq!(status, StatusCode::OK);
        json["session_id"].as_str().unwrap().to_string()
    }

    pub async fn upload(
        &self,
        session_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/upload?filename={}", file_name))
            .header(SESSION_HEADER, session_id)
            .header("content-type", "application/octet-stream")
            .body(Body::from(bytes))
            .unwrap();
        self.send(request).await
    }

    pub async fn mark(
        &self,
        session_id: &str,
        axis: u8,
        slice_index: usize,
        x: usize,
        y: usize,
        point_number: Option<u16>,
    ) -> (StatusCode, serde_json::Value) {
        let mut body = serde_json::json!({
            "axis": axis,
            "slice_index": slice_index,
            "point": {"x": x, "y": y},
        });
        if let Some(n) = point_number {
            body["point_number"] = n.into();
        }
        self.send(post_json("/api/mark_point", session_id, body)).await
    }
}

pub fn get(uri: &str, session_id: Option<&str>) -> Request<Body> {
    request("GET", uri, session_id)
}

pub fn post(uri: &str, session_id: Option<&str>) -> Request<Body> {
    request("POST", uri, session_id)
}

pub fn delete(uri: &str, session_id: Option<&str>) -> Request<Body> {
    request("DELETE", uri, session_id)
}

fn request(method: &str, uri: &str, session_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = session_id {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, session_id: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(SESSION_HEADER, session_id)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Volume of shape `(16, 18, 20)`: 1000 inside the box `4..12` on every axis, 0 elsewhere
pub fn bright_block() -> Array3<f32> {
    Array3::from_shape_fn((16, 18, 20), |(z, y, x)| {
        let inside = (4..12).contains(&z) && (4..12).contains(&y) && (4..12).contains(&x);
        if inside { 1000.0 } else { 0.0 }
    })
}

/// Encode `data` as an uncompressed NIfTI-1 file
pub fn nifti_bytes(data: &Array3<f32>) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.nii");
    WriterOptions::new(&path).write_nifti(data).unwrap();
    std::fs::read(&path).unwrap()
}

/// Zip archive of 16-bit PNG slices named `slice_<n>.png`
pub fn series_zip(slices: &[Array2<u16>]) -> Vec<u8> {
    let mut archive = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();

    for (i, slice) in slices.iter().enumerate() {
        let (height, width) = slice.dim();
        let pixels: Vec<u16> = slice.iter().copied().collect();
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
            width as u32,
            height as u32,
            pixels,
        )
        .unwrap();
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        archive
            .start_file(format!("series/slice_{}.png", i + 1), options)
            .unwrap();
        archive.write_all(&png).unwrap();
    }
    archive.finish().unwrap().into_inner()
}

/// Initialize test logging for detailed output
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seedseg_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
