//! Processing stages: pure `Tensor -> Tensor` mappings composed into
//! pipelines by the predictor.
//!
//! Each stage is a small struct holding its closed-over configuration and
//! implementing [`Processor`]. Stages are built from
//! [`StageConfig`](crate::core::metadata::StageConfig) records at predictor
//! construction time; their order within a pipeline is significant and
//! fixed from then on.

pub mod detection;
pub mod normalization;
pub mod resize;
pub mod transpose;

pub use detection::{BoxGeometry, CoordTransform, DecodeConfig, DetectedBox, format_detected_box};
pub use normalization::Normalize;
pub use resize::{Letterbox, Resize};
pub use transpose::{ChannelOrder, Transpose};

use crate::core::errors::{InferError, InferResult};
use crate::core::metadata::StageConfig;
use crate::core::tensor::Tensor;

/// A pure processing stage mapping one tensor to another.
///
/// Stages have no side effects beyond producing a new tensor (in-place
/// edits of the consumed input are allowed since the stage owns it).
pub trait Processor: std::fmt::Debug + Send {
    /// Applies the stage to the input tensor.
    fn apply(&self, input: Tensor) -> InferResult<Tensor>;

    /// A short name for tracing and error context.
    fn name(&self) -> &'static str;
}

/// Builds a boxed stage from its configuration.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, or an
/// `InvalidMetadata` error for a `DecodeDetection` config: the decoder
/// terminates a detection pipeline and is handled by the predictor, not
/// run as an in-line tensor stage.
pub fn build_stage(config: &StageConfig) -> InferResult<Box<dyn Processor>> {
    match config {
        StageConfig::Resize { height, width } => Ok(Box::new(Resize::new(*height, *width)?)),
        StageConfig::Letterbox {
            height,
            width,
            fill,
        } => Ok(Box::new(Letterbox::new(*height, *width, *fill)?)),
        StageConfig::Normalize { scale, mean, std } => Ok(Box::new(Normalize::new(
            *scale,
            mean.clone(),
            std.clone(),
        )?)),
        StageConfig::Transpose { order } => Ok(Box::new(Transpose::new(*order))),
        StageConfig::DecodeDetection(_) => Err(InferError::invalid_metadata(
            "decode stage cannot run as an in-line tensor stage",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_stage_constructs_tensor_stages() {
        let stage = build_stage(&StageConfig::Resize {
            height: 8,
            width: 8,
        })
        .unwrap();
        assert_eq!(stage.name(), "resize");
    }

    #[test]
    fn build_stage_rejects_decode_configs() {
        let config = StageConfig::DecodeDetection(DecodeConfig {
            score_threshold: 0.5,
            transform: CoordTransform::Direct,
        });
        assert!(build_stage(&config).is_err());
    }
}
