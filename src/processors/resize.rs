//! Resize stages for HWC image tensors.
//!
//! [`Resize`] is a plain bilinear resize to a fixed size. [`Letterbox`]
//! preserves aspect ratio by scaling to fit and padding the remainder with
//! a constant value, the usual preprocessing for detection models.

use super::Processor;
use crate::core::errors::{InferError, InferResult, ProcessingStage};
use crate::core::tensor::Tensor;

/// Bilinear-resamples a rank-3 HWC tensor to `out_h` x `out_w`.
fn bilinear_resize(input: &Tensor, out_h: usize, out_w: usize) -> InferResult<Tensor> {
    let shape = input.shape();
    if shape.len() != 3 {
        return Err(InferError::shape_mismatch(
            "resize input (expected HWC)",
            &[3],
            &[shape.len()],
        ));
    }
    let (h, w, c) = (shape[0], shape[1], shape[2]);
    if h == 0 || w == 0 {
        return Err(InferError::processing_msg(
            ProcessingStage::Resize,
            format!("cannot resize from empty image {h}x{w}"),
        ));
    }

    let src = input.as_slice();
    let mut out = Tensor::zeros(vec![out_h, out_w, c]);
    let scale_y = h as f32 / out_h as f32;
    let scale_x = w as f32 / out_w as f32;

    let dst = out.data_mut();
    for oy in 0..out_h {
        let sy = ((oy as f32 + 0.5) * scale_y - 0.5).max(0.0);
        let y0 = (sy.floor() as usize).min(h - 1);
        let y1 = (y0 + 1).min(h - 1);
        let fy = sy - y0 as f32;
        for ox in 0..out_w {
            let sx = ((ox as f32 + 0.5) * scale_x - 0.5).max(0.0);
            let x0 = (sx.floor() as usize).min(w - 1);
            let x1 = (x0 + 1).min(w - 1);
            let fx = sx - x0 as f32;
            for ch in 0..c {
                let p00 = src[(y0 * w + x0) * c + ch];
                let p01 = src[(y0 * w + x1) * c + ch];
                let p10 = src[(y1 * w + x0) * c + ch];
                let p11 = src[(y1 * w + x1) * c + ch];
                let top = p00 + (p01 - p00) * fx;
                let bottom = p10 + (p11 - p10) * fx;
                dst[(oy * out_w + ox) * c + ch] = top + (bottom - top) * fy;
            }
        }
    }
    Ok(out)
}

/// Bilinear resize of an HWC tensor to a fixed size.
#[derive(Debug, Clone)]
pub struct Resize {
    height: usize,
    width: usize,
}

impl Resize {
    /// Creates a resize stage.
    ///
    /// # Errors
    ///
    /// Returns an error if either target dimension is zero.
    pub fn new(height: usize, width: usize) -> InferResult<Self> {
        if height == 0 || width == 0 {
            return Err(InferError::invalid_metadata(format!(
                "resize target {height}x{width} has a zero dimension"
            )));
        }
        Ok(Self { height, width })
    }
}

impl Processor for Resize {
    fn apply(&self, input: Tensor) -> InferResult<Tensor> {
        bilinear_resize(&input, self.height, self.width)
    }

    fn name(&self) -> &'static str {
        "resize"
    }
}

/// Aspect-preserving resize with constant padding.
///
/// The image is scaled by `min(out_w / w, out_h / h)` and centered; the
/// surrounding area is filled with `fill`.
#[derive(Debug, Clone)]
pub struct Letterbox {
    height: usize,
    width: usize,
    fill: f32,
}

impl Letterbox {
    /// Creates a letterbox stage.
    ///
    /// # Errors
    ///
    /// Returns an error if either target dimension is zero or the fill
    /// value is not finite.
    pub fn new(height: usize, width: usize, fill: f32) -> InferResult<Self> {
        if height == 0 || width == 0 {
            return Err(InferError::invalid_metadata(format!(
                "letterbox target {height}x{width} has a zero dimension"
            )));
        }
        if !fill.is_finite() {
            return Err(InferError::invalid_metadata(format!(
                "letterbox fill value {fill} is not finite"
            )));
        }
        Ok(Self {
            height,
            width,
            fill,
        })
    }
}

impl Processor for Letterbox {
    fn apply(&self, input: Tensor) -> InferResult<Tensor> {
        let shape = input.shape();
        if shape.len() != 3 {
            return Err(InferError::shape_mismatch(
                "letterbox input (expected HWC)",
                &[3],
                &[shape.len()],
            ));
        }
        let (h, w, c) = (shape[0], shape[1], shape[2]);
        if h == 0 || w == 0 {
            return Err(InferError::processing_msg(
                ProcessingStage::Resize,
                format!("cannot letterbox an empty image {h}x{w}"),
            ));
        }

        let scale = (self.width as f32 / w as f32).min(self.height as f32 / h as f32);
        let resized_h = ((h as f32 * scale).round() as usize).clamp(1, self.height);
        let resized_w = ((w as f32 * scale).round() as usize).clamp(1, self.width);
        let resized = bilinear_resize(&input, resized_h, resized_w)?;

        let mut out = Tensor::zeros(vec![self.height, self.width, c]);
        out.data_mut().fill(self.fill);
        let dy = (self.height - resized_h) / 2;
        let dx = (self.width - resized_w) / 2;
        let src = resized.as_slice();
        let row_len = resized_w * c;
        let out_w = self.width;
        let dst = out.data_mut();
        for y in 0..resized_h {
            let src_start = y * row_len;
            let dst_start = ((dy + y) * out_w + dx) * c;
            dst[dst_start..dst_start + row_len]
                .copy_from_slice(&src[src_start..src_start + row_len]);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "letterbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_resize_preserves_values() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let input = Tensor::from_vec(vec![2, 2, 3], data.clone()).unwrap();
        let out = Resize::new(2, 2).unwrap().apply(input).unwrap();
        assert_eq!(out.shape(), &[2, 2, 3]);
        assert_eq!(out.data(), data.as_slice());
    }

    #[test]
    fn upscale_of_constant_image_stays_constant() {
        let input = Tensor::from_vec(vec![2, 2, 1], vec![7.0; 4]).unwrap();
        let out = Resize::new(4, 6).unwrap().apply(input).unwrap();
        assert_eq!(out.shape(), &[4, 6, 1]);
        assert!(out.iter().all(|&v| (v - 7.0).abs() < 1e-6));
    }

    #[test]
    fn downscale_averages_neighbors() {
        // 1x2 -> 1x1: the single output pixel samples the midpoint.
        let input = Tensor::from_vec(vec![1, 2, 1], vec![0.0, 2.0]).unwrap();
        let out = Resize::new(1, 1).unwrap().apply(input).unwrap();
        assert!((out.data()[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn resize_rejects_non_hwc_input() {
        let input = Tensor::zeros(vec![4, 4]);
        assert!(Resize::new(2, 2).unwrap().apply(input).is_err());
    }

    #[test]
    fn letterbox_centers_and_pads() {
        // 2x4 source into a 4x4 target: scale 1, pasted at row offset 1.
        let data: Vec<f32> = (1..=8).map(|v| v as f32).collect();
        let input = Tensor::from_vec(vec![2, 4, 1], data).unwrap();
        let out = Letterbox::new(4, 4, -1.0).unwrap().apply(input).unwrap();
        assert_eq!(out.shape(), &[4, 4, 1]);
        // Padding rows.
        assert_eq!(out.slice_at(&[0]).unwrap(), &[-1.0; 4]);
        assert_eq!(out.slice_at(&[3]).unwrap(), &[-1.0; 4]);
        // Content rows land in the middle, unscaled.
        assert_eq!(out.slice_at(&[1]).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.slice_at(&[2]).unwrap(), &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn zero_target_dimension_is_rejected_at_construction() {
        assert!(Resize::new(0, 4).is_err());
        assert!(Letterbox::new(4, 0, 0.0).is_err());
    }
}
