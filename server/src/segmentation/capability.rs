//! Interactive segmentation backend trait definition

use ndarray::{Array3, ArrayView3};
use thiserror::Error;

use crate::points::Voxel;

/// Errors raised by an interactive segmentation backend
#[derive(Debug, Error)]
pub enum SegmenterError {
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Mask shape {got:?} does not match volume shape {expected:?}")]
    ShapeMismatch { expected: [usize; 3], got: [usize; 3] },
}

/// A ready-to-use model instance, held for the duration of one run
pub trait MaskProducer: Send {
    /// Predict the foreground mask of the structure containing `seed`.
    /// The mask must have the same shape as `volume`.
    fn segment(
        &mut self,
        volume: ArrayView3<'_, f32>,
        seed: Voxel,
    ) -> Result<Array3<bool>, SegmenterError>;
}

/// Outcome of probing a segmenter at the start of a run
pub enum Capability {
    Available(Box<dyn MaskProducer>),
    Unavailable(String),
}

/// Trait for interactive segmentation backends (point-prompted models)
pub trait InteractiveSegmenter: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `acquire` is expected to succeed
    fn is_available(&self) -> bool;

    /// Prepare a producer for one run. Called once per run.
    fn acquire(&self) -> Capability;
}

/// Backend used when no model is configured: always unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSegmenter;

impl InteractiveSegmenter for NoSegmenter {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn acquire(&self) -> Capability {
        Capability::Unavailable("no interactive segmentation model configured".to_string())
    }
}
