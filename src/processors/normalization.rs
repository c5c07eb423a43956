//! Per-channel pixel normalization.
//!
//! The configured `(v * scale - mean) / std` is folded at construction
//! into `v * alpha + beta` with `alpha = scale / std` and
//! `beta = -mean / std`, so the hot loop is a single fused multiply-add
//! per element.

use super::Processor;
use crate::core::errors::{InferError, InferResult};
use crate::core::tensor::Tensor;
use rayon::prelude::*;

/// Per-channel normalization of an HWC tensor.
#[derive(Debug, Clone)]
pub struct Normalize {
    /// Scaling factors for each channel (alpha = scale / std).
    alpha: Vec<f32>,
    /// Offset values for each channel (beta = -mean / std).
    beta: Vec<f32>,
}

impl Normalize {
    /// Creates a normalization stage.
    ///
    /// # Arguments
    ///
    /// * `scale` - Optional scaling factor (defaults to 1.0/255.0).
    /// * `mean` - Optional per-channel means (defaults to [0.485, 0.456, 0.406]).
    /// * `std` - Optional per-channel standard deviations (defaults to
    ///   [0.229, 0.224, 0.225]).
    ///
    /// # Errors
    ///
    /// Returns an error if the scale is not positive, if mean and std
    /// lengths differ, or if any standard deviation is not positive.
    pub fn new(
        scale: Option<f32>,
        mean: Option<Vec<f32>>,
        std: Option<Vec<f32>>,
    ) -> InferResult<Self> {
        let scale = scale.unwrap_or(1.0 / 255.0);
        let mean = mean.unwrap_or_else(|| vec![0.485, 0.456, 0.406]);
        let std = std.unwrap_or_else(|| vec![0.229, 0.224, 0.225]);

        if scale <= 0.0 || !scale.is_finite() {
            return Err(InferError::invalid_metadata(format!(
                "normalization scale must be a positive finite number, got {scale}"
            )));
        }
        if mean.len() != std.len() {
            return Err(InferError::invalid_metadata(format!(
                "normalization mean has {} entries but std has {}",
                mean.len(),
                std.len()
            )));
        }
        if mean.is_empty() {
            return Err(InferError::invalid_metadata(
                "normalization needs at least one channel",
            ));
        }
        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 || !s.is_finite() {
                return Err(InferError::invalid_metadata(format!(
                    "standard deviation at index {i} must be positive, got {s}"
                )));
            }
        }

        let alpha: Vec<f32> = std.iter().map(|s| scale / s).collect();
        let beta: Vec<f32> = mean.iter().zip(&std).map(|(m, s)| -m / s).collect();
        Ok(Self { alpha, beta })
    }

    /// Returns the number of channels this stage is configured for.
    pub fn channels(&self) -> usize {
        self.alpha.len()
    }
}

impl Processor for Normalize {
    fn apply(&self, mut input: Tensor) -> InferResult<Tensor> {
        let shape = input.shape().to_vec();
        if shape.len() != 3 {
            return Err(InferError::shape_mismatch(
                "normalize input (expected HWC)",
                &[3],
                &[shape.len()],
            ));
        }
        let channels = shape[2];
        if channels != self.alpha.len() {
            return Err(InferError::shape_mismatch(
                "normalize channel count",
                &[self.alpha.len()],
                &[channels],
            ));
        }

        input
            .data_mut()
            .par_chunks_mut(channels)
            .for_each(|pixel| {
                for (i, v) in pixel.iter_mut().enumerate() {
                    *v = *v * self.alpha[i] + self.beta[i];
                }
            });
        Ok(input)
    }

    fn name(&self) -> &'static str {
        "normalize"
    }
}
