//! Segmentation of a volume from its seed points
//!
//! - `InteractiveSegmenter` trait for point-prompted model backends
//! - Threshold fallback used when no model can serve a run
//! - `SegmentationOrchestrator` producing and saving label volumes

mod capability;
pub mod fallback;
mod mask;
mod orchestrator;

pub use capability::{Capability, InteractiveSegmenter, MaskProducer, NoSegmenter, SegmenterError};
pub use fallback::FallbackParams;
pub use mask::CandidateMask;
pub use orchestrator::{
    LabelVolume, RunStatus, SegmentationError, SegmentationOrchestrator, SegmentationReport,
    Strategy,
};
