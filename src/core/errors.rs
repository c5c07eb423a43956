//! Error types for the inference runtime.
//!
//! This module defines the error types that can occur while building a
//! predictor or running the inference pipeline: shape mismatches, engine
//! initialization failures, metadata validation problems, and processing
//! stage failures. Constructor helpers are provided for creating errors
//! with appropriate context.

use thiserror::Error;

/// Enum representing different stages of processing in the inference pipeline.
///
/// This enum is used to identify which stage of the pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during tensor operations.
    TensorOperation,
    /// Error occurred during image resizing or letterboxing.
    Resize,
    /// Error occurred during normalization.
    Normalization,
    /// Error occurred during channel reordering.
    Transpose,
    /// Error occurred while decoding detection output.
    Decode,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Transpose => write!(f, "transpose"),
            ProcessingStage::Decode => write!(f, "decode"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Enum representing the errors that can occur in the inference runtime.
#[derive(Error, Debug)]
pub enum InferError {
    /// A tensor shape disagrees with what an operation requires.
    ///
    /// Covers data-length vs. declared-volume disagreements as well as
    /// pipeline handoffs (e.g. the final preprocessed shape not matching
    /// the engine's input shape).
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// The shape (or length) the operation required.
        expected: Vec<usize>,
        /// The shape (or length) that was actually supplied.
        actual: Vec<usize>,
    },

    /// `allequal`/`allclose` was invoked on tensors of differing shape.
    #[error("cannot compare tensors of different shapes: {left:?} vs {right:?}")]
    ComparisonShapeMismatch {
        /// Shape of the left-hand tensor.
        left: Vec<usize>,
        /// Shape of the right-hand tensor.
        right: Vec<usize>,
    },

    /// The inference engine failed to initialize.
    ///
    /// This error is terminal for the predictor being constructed: no
    /// predictor value is produced and the engine is never run.
    #[error("engine initialization failed: {message}")]
    EngineInit {
        /// A message describing the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The metadata record is missing or malformed.
    #[error("invalid metadata: {message}")]
    InvalidMetadata {
        /// A message describing the problem.
        message: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error occurred while executing a processing stage.
    #[error("{stage} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        stage: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred while loading an image.
    #[error("image load")]
    Image(#[from] image::ImageError),

    /// Error from ndarray view construction.
    #[error("tensor view")]
    Tensor(#[from] ndarray::ShapeError),

    /// Error from the ONNX Runtime session.
    #[cfg(feature = "ort")]
    #[error(transparent)]
    Session(#[from] ort::Error),
}

/// Convenient result alias for runtime operations.
pub type InferResult<T> = Result<T, InferError>;

/// A plain string error for wrapping messages where no underlying
/// error value exists.
#[derive(Debug)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    /// Creates a new SimpleError with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SimpleError {}

impl InferError {
    /// Creates an InferError for a shape mismatch.
    ///
    /// # Arguments
    ///
    /// * `context` - Where the mismatch was detected.
    /// * `expected` - The required shape or length.
    /// * `actual` - The supplied shape or length.
    pub fn shape_mismatch(context: &str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates an InferError for a tensor comparison on mismatched shapes.
    pub fn comparison_shape_mismatch(left: &[usize], right: &[usize]) -> Self {
        Self::ComparisonShapeMismatch {
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }

    /// Creates an InferError for an engine initialization failure.
    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::EngineInit {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an InferError for an engine initialization failure with an
    /// underlying cause.
    pub fn engine_init_with_source(
        message: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::EngineInit {
            message: message.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Creates an InferError for invalid metadata.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            message: message.into(),
        }
    }

    /// Creates an InferError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an InferError for a processing stage failure.
    ///
    /// # Arguments
    ///
    /// * `stage` - The stage where the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    pub fn processing(
        stage: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            stage,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an InferError for a processing stage failure described only
    /// by a message.
    pub fn processing_msg(stage: ProcessingStage, context: impl Into<String>) -> Self {
        let context = context.into();
        Self::Processing {
            stage,
            source: Box::new(SimpleError::new(context.clone())),
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_message_carries_both_shapes() {
        let err = InferError::shape_mismatch("preprocessed input", &[1, 3, 32, 32], &[1, 3, 64, 64]);
        let text = err.to_string();
        assert!(text.contains("[1, 3, 32, 32]"));
        assert!(text.contains("[1, 3, 64, 64]"));
        assert!(text.contains("preprocessed input"));
    }

    #[test]
    fn processing_msg_preserves_stage() {
        let err = InferError::processing_msg(ProcessingStage::Resize, "zero output width");
        assert!(err.to_string().starts_with("resize failed"));
    }
}
