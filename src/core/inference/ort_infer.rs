//! ONNX Runtime implementation of the inference-engine boundary.
//!
//! Enabled with the `ort` feature. Wraps a single session per engine
//! handle; the owning predictor serializes access, so no internal locking
//! is needed.

use super::InferenceEngine;
use crate::core::errors::{InferError, InferResult};
use ndarray::{ArrayViewD, IxDyn};
use ort::{
    session::Session,
    value::{TensorRef, ValueType},
};
use std::path::{Path, PathBuf};

/// An [`InferenceEngine`] backed by an ONNX Runtime session.
pub struct OrtEngine {
    session: Session,
    model_path: PathBuf,
    input_name: String,
    output_name: String,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
}

impl std::fmt::Debug for OrtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEngine")
            .field("model_path", &self.model_path)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_shape", &self.input_shape)
            .field("output_shape", &self.output_shape)
            .finish()
    }
}

/// Converts a declared ONNX tensor shape into concrete dimensions.
///
/// Dynamic dimensions (negative values) are rejected: the runtime sizes
/// its buffers from the declared shapes and cannot work with unknowns.
fn concrete_dims(shape: &[i64], which: &str) -> InferResult<Vec<usize>> {
    shape
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| {
                InferError::engine_init(format!(
                    "model declares a dynamic {which} dimension ({d}); static shapes are required"
                ))
            })
        })
        .collect()
}

impl OrtEngine {
    /// Creates an engine from a model file. Shapes are discovered during
    /// [`init`](InferenceEngine::init).
    pub fn from_file(model_path: impl AsRef<Path>) -> InferResult<Self> {
        let model_path = model_path.as_ref().to_path_buf();
        let session = Session::builder()?.commit_from_file(&model_path)?;
        Ok(Self {
            session,
            model_path,
            input_name: String::new(),
            output_name: String::new(),
            input_shape: Vec::new(),
            output_shape: Vec::new(),
        })
    }

    /// Returns the model path associated with this engine.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl InferenceEngine for OrtEngine {
    fn init(&mut self) -> InferResult<()> {
        let input = self.session.inputs.first().ok_or_else(|| {
            InferError::engine_init("model declares no inputs - the file may be invalid")
        })?;
        self.input_name = input.name.clone();
        self.input_shape = match &input.input_type {
            ValueType::Tensor { shape, .. } => concrete_dims(shape, "input")?,
            other => {
                return Err(InferError::engine_init(format!(
                    "unsupported input type {other:?}; expected an f32 tensor"
                )));
            }
        };

        let output = self.session.outputs.first().ok_or_else(|| {
            InferError::engine_init("model declares no outputs - the file may be invalid")
        })?;
        self.output_name = output.name.clone();
        self.output_shape = match &output.output_type {
            ValueType::Tensor { shape, .. } => concrete_dims(shape, "output")?,
            other => {
                return Err(InferError::engine_init(format!(
                    "unsupported output type {other:?}; expected an f32 tensor"
                )));
            }
        };

        tracing::debug!(
            model = %self.model_path.display(),
            input_shape = ?self.input_shape,
            output_shape = ?self.output_shape,
            "ONNX session initialized"
        );
        Ok(())
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn run(&mut self, input: &[f32], output: &mut [f32]) -> InferResult<()> {
        let view = ArrayViewD::from_shape(IxDyn(&self.input_shape), input)?;
        let input_tensor = TensorRef::from_array_view(view)?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];
        let outputs = self.session.run(inputs)?;

        let (_shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        if data.len() != output.len() {
            return Err(InferError::shape_mismatch(
                "engine output extraction",
                &[output.len()],
                &[data.len()],
            ));
        }
        output.copy_from_slice(data);
        Ok(())
    }
}
