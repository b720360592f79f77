//! Pipeline error taxonomy.
//!
//! Initialization failures abort startup; a size mismatch is recoverable by
//! reallocating the state textures and reseeding; an invariant violation is
//! a programming defect and must surface instead of producing a visually
//! wrong but "successful" frame.

use thiserror::Error;
use vulkano::format::Format;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Shader compilation or pipeline construction failed. Fatal at startup.
    #[error("pipeline initialization failed: {0}")]
    Initialization(String),

    /// Seed image dimensions disagree with the allocated state textures.
    /// Recoverable: reallocate the state pair for the new size and reseed.
    #[error("seed image is {actual_w}x{actual_h} but state textures are {expected_w}x{expected_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    /// The device cannot render to the requested color/depth format pair.
    #[error("render target format {0:?} is not supported by this device")]
    UnsupportedFormat(Format),

    /// A pass observed state inconsistent with the ping-pong discipline.
    #[error("pipeline invariant violated: {0}")]
    InvariantViolation(String),
}

impl PipelineError {
    /// Whether a full reallocate-and-reseed recovers from this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::SizeMismatch { .. })
    }
}
