//! The narrow boundary to the inference engine.
//!
//! The runtime never looks inside the engine: it initializes it once,
//! queries its input and output shapes, and feeds it flat buffers. Any
//! backend that can satisfy [`InferenceEngine`] plugs into a
//! [`Predictor`](crate::predictor::Predictor), which takes exclusive
//! ownership of the handle and releases it on drop.

use crate::core::errors::{InferError, InferResult};

#[cfg(feature = "ort")]
mod ort_infer;
#[cfg(feature = "ort")]
pub use ort_infer::OrtEngine;

/// A synchronous, blocking inference engine.
///
/// `input_shape` and `output_shape` are only meaningful after a successful
/// [`init`](InferenceEngine::init). `run` must write exactly
/// `output_shape` volume floats into the caller-provided buffer and have
/// no side effects beyond that.
pub trait InferenceEngine: std::fmt::Debug + Send {
    /// Initializes the engine. Must be called exactly once before any
    /// other operation; failure is terminal for the handle.
    fn init(&mut self) -> InferResult<()>;

    /// Returns the input shape the engine expects.
    fn input_shape(&self) -> &[usize];

    /// Returns the output shape the engine produces.
    fn output_shape(&self) -> &[usize];

    /// Runs inference: reads `input` (sized to the input shape's volume)
    /// and fills `output` (sized to the output shape's volume).
    fn run(&mut self, input: &[f32], output: &mut [f32]) -> InferResult<()>;
}

/// Checks that the caller-side buffers agree with the engine's declared
/// shapes before handing them over.
pub fn validate_io_buffers(
    engine: &dyn InferenceEngine,
    input_len: usize,
    output_len: usize,
) -> InferResult<()> {
    let expected_in: usize = engine.input_shape().iter().product();
    if input_len != expected_in {
        return Err(InferError::shape_mismatch(
            "engine input buffer",
            &[expected_in],
            &[input_len],
        ));
    }
    let expected_out: usize = engine.output_shape().iter().product();
    if output_len != expected_out {
        return Err(InferError::shape_mismatch(
            "engine output buffer",
            &[expected_out],
            &[output_len],
        ));
    }
    Ok(())
}
