//! Seedseg Server Library
//!
//! Session-scoped seed-point annotation and segmentation of 3D volumes.
//! This module exports the server components for use in integration tests
//! and external tooling.

pub mod config;
pub mod points;
pub mod segmentation;
pub mod server;
pub mod session;
pub mod volume;

// Re-export commonly used types
pub use config::Config;
pub use segmentation::{InteractiveSegmenter, NoSegmenter, SegmentationOrchestrator};
pub use server::{AppState, api_routes};
pub use session::{SessionStore, SessionError};
