//! Channel reordering between HWC and CHW layouts.

use super::Processor;
use crate::core::errors::{InferError, InferResult};
use crate::core::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Memory layout of an image tensor's channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    /// Height, width, channels (interleaved pixels).
    Hwc,
    /// Channels, height, width (planar).
    Chw,
}

/// Reorders a rank-3 tensor into the target channel layout.
///
/// The input is assumed to be in the opposite layout; transposing to the
/// layout the tensor is already in would require carrying layout metadata
/// the tensor does not have.
#[derive(Debug, Clone)]
pub struct Transpose {
    order: ChannelOrder,
}

impl Transpose {
    /// Creates a transpose stage targeting the given layout.
    pub fn new(order: ChannelOrder) -> Self {
        Self { order }
    }
}

impl Processor for Transpose {
    fn apply(&self, input: Tensor) -> InferResult<Tensor> {
        let shape = input.shape();
        if shape.len() != 3 {
            return Err(InferError::shape_mismatch(
                "transpose input",
                &[3],
                &[shape.len()],
            ));
        }
        let src = input.as_slice();
        match self.order {
            ChannelOrder::Chw => {
                // HWC -> CHW
                let (h, w, c) = (shape[0], shape[1], shape[2]);
                let mut out = Tensor::zeros(vec![c, h, w]);
                let dst = out.data_mut();
                for y in 0..h {
                    for x in 0..w {
                        for ch in 0..c {
                            dst[ch * h * w + y * w + x] = src[(y * w + x) * c + ch];
                        }
                    }
                }
                Ok(out)
            }
            ChannelOrder::Hwc => {
                // CHW -> HWC
                let (c, h, w) = (shape[0], shape[1], shape[2]);
                let mut out = Tensor::zeros(vec![h, w, c]);
                let dst = out.data_mut();
                for ch in 0..c {
                    for y in 0..h {
                        for x in 0..w {
                            dst[(y * w + x) * c + ch] = src[ch * h * w + y * w + x];
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn name(&self) -> &'static str {
        "transpose"
    }
}
