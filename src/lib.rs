//! # visionrt
//!
//! An inference-time runtime for vision models: it takes a precompiled
//! model behind a narrow engine boundary, threads image tensors through a
//! configurable preprocessing pipeline, executes inference, and decodes
//! raw output tensors into task-specific results such as detection boxes.
//!
//! ## Components
//!
//! - [`Tensor`](core::tensor::Tensor): an owning, shape-aware N-dimensional
//!   `f32` buffer with row-major indexing, iteration, and tolerance-based
//!   comparison.
//! - [`Predictor`](predictor::Predictor): configuration-driven composition
//!   of pre/post-processing stages around a black-box inference call.
//! - [`format_detected_box`](processors::detection::format_detected_box):
//!   the decoder turning a raw detection tensor into scored, classified
//!   boxes.
//!
//! The neural-network execution engine itself is an external collaborator:
//! anything implementing [`InferenceEngine`](core::inference::InferenceEngine)
//! plugs in. The `ort` feature provides an ONNX Runtime backend.
//!
//! ## Quick start
//!
//! ```rust
//! use visionrt::prelude::*;
//!
//! # #[derive(Debug)]
//! # struct MyEngine { shape: Vec<usize> }
//! # impl InferenceEngine for MyEngine {
//! #     fn init(&mut self) -> InferResult<()> { Ok(()) }
//! #     fn input_shape(&self) -> &[usize] { &self.shape }
//! #     fn output_shape(&self) -> &[usize] { &self.shape }
//! #     fn run(&mut self, input: &[f32], output: &mut [f32]) -> InferResult<()> {
//! #         output.copy_from_slice(input);
//! #         Ok(())
//! #     }
//! # }
//! # fn main() -> InferResult<()> {
//! let metadata: ModelMetadata = serde_json::from_str(
//!     r#"{
//!         "task": "classification",
//!         "classes": ["cat", "dog"],
//!         "expected_input_shape": [2, 2]
//!     }"#,
//! )
//! .map_err(|e| InferError::invalid_metadata(e.to_string()))?;
//!
//! let engine = Box::new(MyEngine { shape: vec![2, 2] });
//! let mut predictor = Predictor::new(metadata, engine)?;
//!
//! let image = Tensor::from_vec(vec![2, 2], vec![0.1, 0.2, 0.3, 0.4])?;
//! match predictor.run(image)? {
//!     Prediction::Tensor(scores) => println!("{scores}"),
//!     Prediction::Boxes { boxes, .. } => println!("{} boxes", boxes.len()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod predictor;
pub mod processors;

/// Prelude module for convenient imports.
///
/// Brings the essentials into scope with a single use statement:
///
/// ```rust
/// use visionrt::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::errors::{InferError, InferResult};
    pub use crate::core::inference::InferenceEngine;
    pub use crate::core::metadata::{ModelMetadata, StageConfig, TaskKind};
    pub use crate::core::tensor::Tensor;
    pub use crate::predictor::{Prediction, Predictor};
    pub use crate::processors::detection::{
        BoxGeometry, CoordTransform, DecodeConfig, DetectedBox, format_detected_box,
    };

    #[cfg(feature = "ort")]
    pub use crate::core::inference::OrtEngine;
}
