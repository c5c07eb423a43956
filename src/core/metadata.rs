//! The parsed model metadata record that drives predictor construction.
//!
//! Parsing a metadata file from disk is out of scope for the runtime; the
//! types here are the already-parsed form, deserializable with serde from
//! whatever carrier format the caller uses. A record names the task, the
//! class labels, the expected input shape, and the ordered pre- and
//! post-processing stage configurations.

use crate::core::errors::{InferError, InferResult};
use crate::processors::detection::DecodeConfig;
use crate::processors::transpose::ChannelOrder;
use serde::{Deserialize, Serialize};

/// The kind of task a model performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Image classification: output stays a tensor of class scores.
    Classification,
    /// Object detection: output decodes to a list of boxes.
    Detection,
    /// Semantic segmentation: output stays a tensor of per-pixel scores.
    Segmentation,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Classification => write!(f, "classification"),
            TaskKind::Detection => write!(f, "detection"),
            TaskKind::Segmentation => write!(f, "segmentation"),
        }
    }
}

/// Configuration for a single processing stage.
///
/// An ordered list of these describes a pipeline; the order is fixed at
/// predictor construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageConfig {
    /// Bilinear resize of an HWC tensor to the given size.
    Resize {
        /// Target height in pixels.
        height: usize,
        /// Target width in pixels.
        width: usize,
    },
    /// Aspect-preserving resize with constant-value padding.
    Letterbox {
        /// Target height in pixels.
        height: usize,
        /// Target width in pixels.
        width: usize,
        /// Padding value (default 0.0).
        #[serde(default)]
        fill: f32,
    },
    /// Per-channel normalization `(v * scale - mean) / std`.
    Normalize {
        /// Scaling factor applied before mean/std (default 1/255).
        scale: Option<f32>,
        /// Per-channel mean values.
        mean: Option<Vec<f32>>,
        /// Per-channel standard deviations.
        std: Option<Vec<f32>>,
    },
    /// Reorder channels to the given layout.
    Transpose {
        /// Target channel order.
        order: ChannelOrder,
    },
    /// Decode the raw output tensor into detected boxes. Only valid as the
    /// final post-processing stage of a detection task.
    DecodeDetection(DecodeConfig),
}

/// The parsed metadata record supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// The task the model performs.
    pub task: TaskKind,
    /// Ordered class labels; the index is the class id.
    pub classes: Vec<String>,
    /// The input shape the pipeline is expected to produce, e.g.
    /// `[height, width, channels]` or `[1, channels, height, width]`.
    pub expected_input_shape: Vec<usize>,
    /// Original-image dimensions as `[height, width]`, used for box
    /// coordinate rescaling. Defaults to the leading two dimensions of
    /// `expected_input_shape` when absent.
    #[serde(default)]
    pub image_size: Option<[usize; 2]>,
    /// Ordered preprocessing stage configurations.
    #[serde(default)]
    pub pre_process: Vec<StageConfig>,
    /// Ordered postprocessing stage configurations.
    #[serde(default)]
    pub post_process: Vec<StageConfig>,
}

impl ModelMetadata {
    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidMetadata` error if the class list is empty for a
    /// task that needs one, if the expected input shape is empty or
    /// contains a zero dimension, or if a decode stage appears anywhere
    /// other than the end of the post-processing list.
    pub fn validate(&self) -> InferResult<()> {
        if self.expected_input_shape.is_empty() {
            return Err(InferError::invalid_metadata("expected_input_shape is empty"));
        }
        if self.expected_input_shape.contains(&0) {
            return Err(InferError::invalid_metadata(format!(
                "expected_input_shape {:?} contains a zero dimension",
                self.expected_input_shape
            )));
        }
        if self.classes.is_empty() && self.task != TaskKind::Segmentation {
            return Err(InferError::invalid_metadata(format!(
                "class list is empty for {} task",
                self.task
            )));
        }
        if let Some([h, w]) = self.image_size {
            if h == 0 || w == 0 {
                return Err(InferError::invalid_metadata(format!(
                    "image_size [{h}, {w}] contains a zero dimension"
                )));
            }
        }
        if self
            .pre_process
            .iter()
            .any(|s| matches!(s, StageConfig::DecodeDetection(_)))
        {
            return Err(InferError::invalid_metadata(
                "decode stage is not allowed in pre_process",
            ));
        }
        for (i, stage) in self.post_process.iter().enumerate() {
            if matches!(stage, StageConfig::DecodeDetection(_)) {
                if i != self.post_process.len() - 1 {
                    return Err(InferError::invalid_metadata(
                        "decode stage must be the final post_process stage",
                    ));
                }
                if self.task != TaskKind::Detection {
                    return Err(InferError::invalid_metadata(format!(
                        "decode stage requires a detection task, got {}",
                        self.task
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns the image dimensions used for box rescaling, falling back
    /// to the leading two dimensions of the expected input shape.
    pub fn resolved_image_size(&self) -> [usize; 2] {
        match self.image_size {
            Some(size) => size,
            None => {
                let h = self.expected_input_shape.first().copied().unwrap_or(1);
                let w = self.expected_input_shape.get(1).copied().unwrap_or(1);
                [h, w]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::detection::CoordTransform;

    fn detection_metadata() -> ModelMetadata {
        ModelMetadata {
            task: TaskKind::Detection,
            classes: vec!["car".into(), "person".into()],
            expected_input_shape: vec![32, 32, 3],
            image_size: Some([480, 640]),
            pre_process: vec![
                StageConfig::Resize {
                    height: 32,
                    width: 32,
                },
                StageConfig::Normalize {
                    scale: None,
                    mean: None,
                    std: None,
                },
            ],
            post_process: vec![StageConfig::DecodeDetection(DecodeConfig {
                score_threshold: 0.5,
                transform: CoordTransform::Direct,
            })],
        }
    }

    #[test]
    fn valid_metadata_passes_validation() {
        assert!(detection_metadata().validate().is_ok());
    }

    #[test]
    fn empty_classes_are_rejected() {
        let mut meta = detection_metadata();
        meta.classes.clear();
        assert!(matches!(
            meta.validate(),
            Err(InferError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn zero_dimension_input_shape_is_rejected() {
        let mut meta = detection_metadata();
        meta.expected_input_shape = vec![32, 0, 3];
        assert!(meta.validate().is_err());
    }

    #[test]
    fn decode_stage_must_be_last() {
        let mut meta = detection_metadata();
        meta.post_process.push(StageConfig::Transpose {
            order: ChannelOrder::Chw,
        });
        assert!(meta.validate().is_err());
    }

    #[test]
    fn decode_stage_requires_detection_task() {
        let mut meta = detection_metadata();
        meta.task = TaskKind::Classification;
        assert!(meta.validate().is_err());
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let meta = detection_metadata();
        let json = serde_json::to_string(&meta).unwrap();
        let back: ModelMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task, TaskKind::Detection);
        assert_eq!(back.classes, meta.classes);
        assert_eq!(back.expected_input_shape, meta.expected_input_shape);
        assert_eq!(back.pre_process.len(), 2);
    }

    #[test]
    fn image_size_falls_back_to_input_shape() {
        let mut meta = detection_metadata();
        meta.image_size = None;
        assert_eq!(meta.resolved_image_size(), [32, 32]);
    }
}
