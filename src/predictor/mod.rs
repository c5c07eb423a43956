//! The predictor: metadata-driven orchestration of preprocessing,
//! inference, and postprocessing.
//!
//! A [`Predictor`] is constructed once from a parsed
//! [`ModelMetadata`](crate::core::metadata::ModelMetadata) record and an
//! engine handle. Construction validates the metadata, initializes the
//! engine, queries its shapes, and builds the configured stage lists; a
//! predictor value therefore only ever exists in a ready state, and an
//! engine that fails to initialize never produces one. Dropping the
//! predictor drops the engine and releases its resources.

use crate::core::errors::{InferError, InferResult};
use crate::core::inference::InferenceEngine;
use crate::core::metadata::{ModelMetadata, StageConfig, TaskKind};
use crate::core::tensor::Tensor;
use crate::processors::detection::{DecodeConfig, DetectedBox, format_detected_box};
use crate::processors::{Processor, build_stage};

/// The result of a [`Predictor::run`] call.
///
/// The runtime returns task-polymorphic results rather than re-encoding
/// decoded structures back into tensor form: classification and
/// segmentation produce the postprocessed tensor, detection produces the
/// decoded box list alongside the class labels it indexes into.
#[derive(Debug)]
pub enum Prediction {
    /// The postprocessed output tensor.
    Tensor(Tensor),
    /// Decoded detection boxes, with the label list `class_id` indexes.
    Boxes {
        /// The surviving boxes, ordered by descending score.
        boxes: Vec<DetectedBox>,
        /// The class labels from the model metadata.
        labels: Vec<String>,
    },
}

/// A ready-to-run inference pipeline around an exclusively owned engine.
///
/// `run` is blocking and synchronous end to end; a predictor is used from
/// one thread at a time, and independent predictors may run concurrently.
#[derive(Debug)]
pub struct Predictor {
    task: TaskKind,
    classes: Vec<String>,
    expected_input_shape: Vec<usize>,
    engine: Box<dyn InferenceEngine>,
    network_input_shape: Vec<usize>,
    network_output_shape: Vec<usize>,
    image_size: [usize; 2],
    pre_process: Vec<Box<dyn Processor>>,
    post_process: Vec<Box<dyn Processor>>,
    decode: Option<DecodeConfig>,
}

impl Predictor {
    /// Builds a predictor from a metadata record and an engine handle.
    ///
    /// The engine is initialized here; on failure the error is terminal
    /// and no predictor is produced, so the engine's run operation can
    /// never be reached.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidMetadata` error for a malformed record, an
    /// `EngineInit` error if the engine fails to initialize, or any error
    /// produced while constructing the configured stages.
    pub fn new(
        metadata: ModelMetadata,
        mut engine: Box<dyn InferenceEngine>,
    ) -> InferResult<Self> {
        metadata.validate()?;

        engine.init().map_err(|e| match e {
            err @ InferError::EngineInit { .. } => err,
            other => InferError::engine_init_with_source("engine reported a failure", other),
        })?;
        let network_input_shape = engine.input_shape().to_vec();
        let network_output_shape = engine.output_shape().to_vec();
        let expected_volume: usize = metadata.expected_input_shape.iter().product();
        let network_volume: usize = network_input_shape.iter().product();
        if expected_volume != network_volume {
            // Layouts may legitimately differ (HWC vs. batched NCHW), but
            // the element counts cannot.
            tracing::warn!(
                expected = ?metadata.expected_input_shape,
                network = ?network_input_shape,
                "expected input shape volume disagrees with the engine's input shape"
            );
        }
        tracing::debug!(
            task = %metadata.task,
            input_shape = ?network_input_shape,
            output_shape = ?network_output_shape,
            "engine initialized"
        );

        let pre_process = metadata
            .pre_process
            .iter()
            .map(build_stage)
            .collect::<InferResult<Vec<_>>>()?;

        let mut decode = None;
        let mut post_process = Vec::new();
        for stage in &metadata.post_process {
            match stage {
                StageConfig::DecodeDetection(config) => {
                    // validate() already pinned this to the final slot.
                    config.validate()?;
                    decode = Some(config.clone());
                }
                other => post_process.push(build_stage(other)?),
            }
        }

        Ok(Self {
            task: metadata.task,
            image_size: metadata.resolved_image_size(),
            classes: metadata.classes,
            expected_input_shape: metadata.expected_input_shape,
            engine,
            network_input_shape,
            network_output_shape,
            pre_process,
            post_process,
            decode,
        })
    }

    /// Returns the task kind.
    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Returns the ordered class labels; the index is the class id.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Returns the input shape the preprocessing pipeline is expected to
    /// produce.
    pub fn expected_input_shape(&self) -> &[usize] {
        &self.expected_input_shape
    }

    /// Returns the engine's queried input shape.
    pub fn network_input_shape(&self) -> &[usize] {
        &self.network_input_shape
    }

    /// Returns the engine's queried output shape.
    pub fn network_output_shape(&self) -> &[usize] {
        &self.network_output_shape
    }

    /// Runs the full pipeline on one image tensor.
    ///
    /// The tensor is threaded through the preprocessing stages in their
    /// declared order, handed to the engine, and the engine's output is
    /// threaded through the postprocessing stages. For detection tasks
    /// whose pipeline ends in a decode stage, the decoded box list is
    /// returned; otherwise the postprocessed tensor is.
    ///
    /// # Errors
    ///
    /// Returns a `ShapeMismatch` error if the preprocessed tensor's shape
    /// disagrees with the engine's input shape, or any error produced by
    /// a stage or the engine. No partially processed tensor is ever
    /// returned on failure.
    pub fn run(&mut self, image: Tensor) -> InferResult<Prediction> {
        let span = tracing::span!(
            tracing::Level::DEBUG,
            "predictor_run",
            task = %self.task,
            input_shape = ?image.shape()
        );
        let _enter = span.enter();

        let mut x = image;
        for stage in &self.pre_process {
            x = stage.apply(x).inspect_err(|e| {
                tracing::error!(stage = stage.name(), "preprocessing failed: {e}");
            })?;
        }

        if x.shape() != self.network_input_shape.as_slice() {
            return Err(InferError::shape_mismatch(
                "preprocessed input vs engine input",
                &self.network_input_shape,
                x.shape(),
            ));
        }

        let mut output = Tensor::zeros(self.network_output_shape.clone());
        crate::core::inference::validate_io_buffers(
            self.engine.as_ref(),
            x.as_slice().len(),
            output.data().len(),
        )?;
        self.engine.run(x.as_slice(), output.data_mut())?;

        for stage in &self.post_process {
            output = stage.apply(output).inspect_err(|e| {
                tracing::error!(stage = stage.name(), "postprocessing failed: {e}");
            })?;
        }

        match &self.decode {
            Some(config) => {
                let boxes =
                    format_detected_box(&output, config, self.classes.len(), self.image_size)?;
                tracing::debug!(boxes = boxes.len(), "run complete");
                Ok(Prediction::Boxes {
                    boxes,
                    labels: self.classes.clone(),
                })
            }
            None => {
                tracing::debug!(output_shape = ?output.shape(), "run complete");
                Ok(Prediction::Tensor(output))
            }
        }
    }
}
