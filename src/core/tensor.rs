//! The owning N-dimensional float tensor used throughout the pipeline.
//!
//! A [`Tensor`] pairs a shape with a flat, row-major `f32` buffer and keeps
//! the invariant that the buffer length always equals the product of the
//! shape dimensions (the volume). Processing stages consume and produce
//! tensors by value; copies are deep and independent.

use crate::core::errors::{InferError, InferResult};
use image::DynamicImage;
use ndarray::{ArrayViewD, IxDyn};

/// Default relative tolerance for [`Tensor::allclose`].
pub const RTOL: f32 = 1e-4;
/// Default absolute tolerance for [`Tensor::allclose`].
pub const ATOL: f32 = 1e-7;

/// Returns the product of all dimensions in a shape: the required length
/// of the flat data buffer.
fn volume(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Like [`volume`], but reports overflow instead of wrapping.
fn checked_volume(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// An owning N-dimensional `f32` tensor with row-major storage.
///
/// The flat buffer always holds exactly `volume(shape)` elements; every
/// constructor enforces this and no operation can break it. `Clone`
/// produces a deep, independent copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a zero-filled tensor with the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let data = vec![0.0; volume(&shape)];
        Self { shape, data }
    }

    /// Creates a tensor from a shape and a flat data buffer.
    ///
    /// # Errors
    ///
    /// Returns a `ShapeMismatch` error if `data.len()` does not equal the
    /// volume of `shape`, or an `InvalidInput` error if the volume would
    /// overflow `usize`.
    pub fn from_vec(shape: impl Into<Vec<usize>>, data: Vec<f32>) -> InferResult<Self> {
        let shape = shape.into();
        let expected = checked_volume(&shape).ok_or_else(|| {
            InferError::invalid_input(format!(
                "tensor shape {shape:?} would cause integer overflow"
            ))
        })?;
        if data.len() != expected {
            return Err(InferError::shape_mismatch(
                "tensor construction",
                &[expected],
                &[data.len()],
            ));
        }
        Ok(Self { shape, data })
    }

    /// Converts an image into an HWC tensor of shape `[height, width, 3]`.
    ///
    /// Pixel values are kept in their raw `0..=255` range; scaling belongs
    /// to the normalization stage.
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let data = rgb.as_raw().iter().map(|&v| v as f32).collect();
        Self {
            shape: vec![height as usize, width as usize, 3],
            data,
        }
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn volume(&self) -> usize {
        self.data.len()
    }

    /// Returns the flat data buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the flat data buffer for in-place edits by pipeline stages.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns the full contiguous buffer in storage order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the row-major strides derived from the shape, with the last
    /// dimension varying fastest.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.shape.len()];
        for i in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.shape[i + 1];
        }
        strides
    }

    /// Resolves a full or partial multi-index into a flat offset.
    ///
    /// The offset is `sum(index[i] * stride[i])` over the given indices.
    /// For shape `[2, 3, 4]`, the index `[1, 2, 3]` resolves to offset 35.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidInput` error if more indices are given than the
    /// tensor has dimensions, or if any index is out of range.
    pub fn offset_of(&self, indices: &[usize]) -> InferResult<usize> {
        if indices.len() > self.shape.len() {
            return Err(InferError::invalid_input(format!(
                "index {:?} has more dimensions than shape {:?}",
                indices, self.shape
            )));
        }
        let strides = self.strides();
        let mut offset = 0;
        for (dim, (&idx, (&size, &stride))) in indices
            .iter()
            .zip(self.shape.iter().zip(strides.iter()))
            .enumerate()
        {
            if idx >= size {
                return Err(InferError::invalid_input(format!(
                    "index {idx} out of range for dimension {dim} of size {size}"
                )));
            }
            offset += idx * stride;
        }
        Ok(offset)
    }

    /// Returns the sub-tensor block starting at the given full or partial
    /// multi-index, without copying.
    ///
    /// A partial index selects a whole block: for a tensor of shape
    /// `[2, 3, 4]`, `slice_at(&[1])` returns the 12 elements of the second
    /// outermost slice, and `slice_at(&[1, 2, 3])` returns a single element.
    pub fn slice_at(&self, indices: &[usize]) -> InferResult<&[f32]> {
        let offset = self.offset_of(indices)?;
        let block = volume(&self.shape[indices.len()..]);
        Ok(&self.data[offset..offset + block])
    }

    /// Mutable variant of [`Tensor::slice_at`].
    pub fn slice_at_mut(&mut self, indices: &[usize]) -> InferResult<&mut [f32]> {
        let offset = self.offset_of(indices)?;
        let block = volume(&self.shape[indices.len()..]);
        Ok(&mut self.data[offset..offset + block])
    }

    /// Returns an iterator over the flat buffer in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, f32> {
        self.data.iter()
    }

    /// Returns an ndarray view over the tensor for consumers that want
    /// ndarray semantics.
    pub fn view(&self) -> InferResult<ArrayViewD<'_, f32>> {
        Ok(ArrayViewD::from_shape(IxDyn(&self.shape), &self.data)?)
    }

    /// Tests exact element-wise equality.
    ///
    /// # Errors
    ///
    /// Returns a `ComparisonShapeMismatch` error if the shapes differ;
    /// a shape mismatch is never reported as a silent `false`.
    pub fn allequal(&self, other: &Tensor) -> InferResult<bool> {
        if self.shape != other.shape {
            return Err(InferError::comparison_shape_mismatch(
                &self.shape,
                &other.shape,
            ));
        }
        Ok(self.data == other.data)
    }

    /// Tests element-wise closeness with the default tolerances
    /// [`RTOL`] and [`ATOL`].
    pub fn allclose(&self, other: &Tensor) -> InferResult<bool> {
        self.allclose_with(other, RTOL, ATOL)
    }

    /// Tests element-wise closeness: every element pair must satisfy
    /// `|a - b| <= atol + rtol * |b|`.
    ///
    /// # Errors
    ///
    /// Returns a `ComparisonShapeMismatch` error if the shapes differ.
    pub fn allclose_with(&self, other: &Tensor, rtol: f32, atol: f32) -> InferResult<bool> {
        if self.shape != other.shape {
            return Err(InferError::comparison_shape_mismatch(
                &self.shape,
                &other.shape,
            ));
        }
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .all(|(&a, &b)| (a - b).abs() <= atol + rtol * b.abs()))
    }
}

impl<'a> IntoIterator for &'a Tensor {
    type Item = &'a f32;
    type IntoIter = std::slice::Iter<'a, f32>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl std::fmt::Display for Tensor {
    /// Renders the shape and a preview of the buffer, truncated past 16
    /// elements.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const PREVIEW: usize = 16;
        write!(f, "Tensor{:?} [", self.shape)?;
        for (i, v) in self.data.iter().take(PREVIEW).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        if self.data.len() > PREVIEW {
            write!(f, ", ... {} more", self.data.len() - PREVIEW)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_round_trips_shape_and_data() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let t = Tensor::from_vec(vec![2, 3], data.clone()).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.data(), data.as_slice());
        assert_eq!(t.volume(), 6);
    }

    #[test]
    fn construction_rejects_length_volume_mismatch() {
        let result = Tensor::from_vec(vec![2, 3], vec![1.0; 5]);
        assert!(matches!(result, Err(InferError::ShapeMismatch { .. })));
    }

    #[test]
    fn zeros_fills_the_full_volume() {
        let t = Tensor::zeros(vec![2, 3, 4]);
        assert_eq!(t.volume(), 24);
        assert!(t.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn strides_are_row_major() {
        let t = Tensor::zeros(vec![2, 3, 4]);
        assert_eq!(t.strides(), vec![12, 4, 1]);
    }

    #[test]
    fn multi_index_resolves_row_major_offset() {
        let t = Tensor::zeros(vec![2, 3, 4]);
        assert_eq!(t.offset_of(&[1, 2, 3]).unwrap(), 35);
        assert_eq!(t.offset_of(&[0, 0, 0]).unwrap(), 0);
    }

    #[test]
    fn partial_index_slices_a_block() {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let t = Tensor::from_vec(vec![2, 3, 4], data).unwrap();
        let block = t.slice_at(&[1]).unwrap();
        assert_eq!(block.len(), 12);
        assert_eq!(block[0], 12.0);
        let row = t.slice_at(&[1, 2]).unwrap();
        assert_eq!(row, &[20.0, 21.0, 22.0, 23.0]);
        let single = t.slice_at(&[1, 2, 3]).unwrap();
        assert_eq!(single, &[23.0]);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let t = Tensor::zeros(vec![2, 3]);
        assert!(t.offset_of(&[2, 0]).is_err());
        assert!(t.offset_of(&[0, 0, 0]).is_err());
    }

    #[test]
    fn iteration_is_in_storage_order() {
        let t = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let collected: Vec<f32> = t.iter().copied().collect();
        assert_eq!(collected, vec![1.0, 2.0, 3.0, 4.0]);
        // Restartable.
        assert_eq!(t.iter().count(), 4);
    }

    #[test]
    fn clones_are_independent() {
        let mut a = Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap();
        let b = a.clone();
        a.data_mut()[0] = 99.0;
        assert_eq!(b.data()[0], 1.0);
    }

    #[test]
    fn allequal_is_exact() {
        let a = Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap();
        let b = Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap();
        let c = Tensor::from_vec(vec![2], vec![1.0, 2.0 + 1e-6]).unwrap();
        assert!(a.allequal(&b).unwrap());
        assert!(!a.allequal(&c).unwrap());
    }

    #[test]
    fn comparison_on_different_shapes_is_an_error() {
        let a = Tensor::zeros(vec![2, 3]);
        let b = Tensor::zeros(vec![3, 2]);
        assert!(matches!(
            a.allequal(&b),
            Err(InferError::ComparisonShapeMismatch { .. })
        ));
        assert!(matches!(
            a.allclose(&b),
            Err(InferError::ComparisonShapeMismatch { .. })
        ));
    }

    #[test]
    fn allclose_is_reflexive_with_default_tolerances() {
        let t = Tensor::from_vec(vec![4], vec![0.0, -1.5, 3.25, 1e6]).unwrap();
        assert!(t.allclose(&t).unwrap());
    }

    #[test]
    fn allclose_matches_the_tolerance_formula() {
        let a = Tensor::from_vec(vec![2], vec![1.0, 100.0]).unwrap();
        // |a - b| <= atol + rtol * |b| with rtol = 0.01, atol = 0.0:
        // element 1 passes (1.0 vs 1.005), element 0 governs the outcome.
        let within = Tensor::from_vec(vec![2], vec![1.005, 100.5]).unwrap();
        assert!(a.allclose_with(&within, 0.01, 0.0).unwrap());
        // A single violating element makes the whole comparison false.
        let outside = Tensor::from_vec(vec![2], vec![1.02, 100.5]).unwrap();
        assert!(!a.allclose_with(&outside, 0.01, 0.0).unwrap());
    }

    #[test]
    fn ndarray_view_sees_the_same_layout() {
        let t = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let view = t.view().unwrap();
        assert_eq!(view[[1, 0]], 3.0);
    }

    #[test]
    fn display_truncates_long_buffers() {
        let t = Tensor::zeros(vec![100]);
        let text = t.to_string();
        assert!(text.contains("... 84 more"));
    }
}
