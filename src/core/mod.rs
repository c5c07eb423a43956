//! Core types: the tensor, the error taxonomy, the parsed metadata record,
//! and the inference-engine boundary.

pub mod errors;
pub mod inference;
pub mod metadata;
pub mod tensor;

pub use errors::{InferError, InferResult, ProcessingStage, SimpleError};
pub use inference::InferenceEngine;
pub use metadata::{ModelMetadata, StageConfig, TaskKind};
pub use tensor::{ATOL, RTOL, Tensor};
