//! Detection-box decoding.
//!
//! Converts a raw detection output tensor into scored, classified boxes.
//! The tensor's trailing dimension holds, per cell/anchor: four geometry
//! values, one objectness score, and one probability per class. The
//! geometry convention varies by model and is supplied as a
//! [`CoordTransform`] in the decode configuration rather than hardcoded.

use crate::core::errors::{InferError, InferResult};
use crate::core::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// An axis-aligned box: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

/// A decoded detection: geometry plus class id and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBox {
    /// The box geometry in image-pixel coordinates.
    pub geometry: BoxGeometry,
    /// Index into the task's class list.
    pub class_id: usize,
    /// Confidence score (objectness times class probability).
    pub score: f32,
}

/// The coordinate-space transform a model's raw geometry values require.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordTransform {
    /// Raw values are already `(x, y, w, h)` in the final coordinate
    /// space; passed through untouched.
    Direct,
    /// Grid-cell convention: sigmoid center offsets within the cell,
    /// exponential size, all normalized by the grid and scaled to the
    /// image.
    GridSigmoid {
        /// Grid width in cells.
        grid_w: usize,
        /// Grid height in cells.
        grid_h: usize,
    },
    /// Anchor convention: sigmoid centers in normalized image space,
    /// exponential size relative to the anchor assigned round-robin by
    /// cell index. Anchors are `[w, h]` pairs normalized to the image.
    Anchors {
        /// The anchor set.
        anchors: Vec<[f32; 2]>,
    },
}

impl CoordTransform {
    fn validate(&self) -> InferResult<()> {
        match self {
            CoordTransform::Direct => Ok(()),
            CoordTransform::GridSigmoid { grid_w, grid_h } => {
                if *grid_w == 0 || *grid_h == 0 {
                    return Err(InferError::invalid_metadata(format!(
                        "decode grid {grid_w}x{grid_h} has a zero dimension"
                    )));
                }
                Ok(())
            }
            CoordTransform::Anchors { anchors } => {
                if anchors.is_empty() {
                    return Err(InferError::invalid_metadata("decode anchor set is empty"));
                }
                Ok(())
            }
        }
    }

    /// Decodes the four raw geometry values for the given cell into a
    /// top-left box in image-pixel coordinates.
    fn decode(&self, cell: usize, raw: [f32; 4], image_size: [usize; 2]) -> BoxGeometry {
        let img_h = image_size[0] as f32;
        let img_w = image_size[1] as f32;
        match self {
            CoordTransform::Direct => BoxGeometry {
                x: raw[0],
                y: raw[1],
                w: raw[2],
                h: raw[3],
            },
            CoordTransform::GridSigmoid { grid_w, grid_h } => {
                let gw = *grid_w as f32;
                let gh = *grid_h as f32;
                let cx = (cell % grid_w) as f32;
                let cy = ((cell / grid_w) % grid_h) as f32;
                let center_x = (sigmoid(raw[0]) + cx) / gw;
                let center_y = (sigmoid(raw[1]) + cy) / gh;
                let w = raw[2].exp() / gw;
                let h = raw[3].exp() / gh;
                BoxGeometry {
                    x: (center_x - w / 2.0) * img_w,
                    y: (center_y - h / 2.0) * img_h,
                    w: w * img_w,
                    h: h * img_h,
                }
            }
            CoordTransform::Anchors { anchors } => {
                let anchor = anchors[cell % anchors.len()];
                let center_x = sigmoid(raw[0]);
                let center_y = sigmoid(raw[1]);
                let w = raw[2].exp() * anchor[0];
                let h = raw[3].exp() * anchor[1];
                BoxGeometry {
                    x: (center_x - w / 2.0) * img_w,
                    y: (center_y - h / 2.0) * img_h,
                    w: w * img_w,
                    h: h * img_h,
                }
            }
        }
    }
}

/// Configuration for the detection decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Boxes whose best class score falls below this are dropped.
    pub score_threshold: f32,
    /// The geometry transform the model's raw values require.
    pub transform: CoordTransform,
}

impl DecodeConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> InferResult<()> {
        if !self.score_threshold.is_finite() || self.score_threshold < 0.0 {
            return Err(InferError::invalid_metadata(format!(
                "score threshold must be non-negative and finite, got {}",
                self.score_threshold
            )));
        }
        self.transform.validate()
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Decodes a raw detection output tensor into a list of boxes.
///
/// Each row of `5 + num_classes` values (geometry, objectness, class
/// probabilities) is decoded, scored as `objectness * best class
/// probability`, and dropped if below the threshold. Survivors are
/// returned in descending score order; equal scores keep their relative
/// raster order.
///
/// An empty tensor yields an empty list, not an error.
///
/// # Errors
///
/// Returns a `ShapeMismatch` error if the tensor's trailing dimension
/// does not equal `5 + num_classes`, or an `InvalidMetadata` error for an
/// invalid decode configuration.
pub fn format_detected_box(
    output: &Tensor,
    config: &DecodeConfig,
    num_classes: usize,
    image_size: [usize; 2],
) -> InferResult<Vec<DetectedBox>> {
    config.validate()?;
    if num_classes == 0 {
        return Err(InferError::invalid_metadata(
            "detection decoding requires at least one class",
        ));
    }
    let data = output.as_slice();
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let row_len = 5 + num_classes;
    let trailing = output.shape().last().copied().unwrap_or(0);
    if trailing != row_len {
        return Err(InferError::shape_mismatch(
            "detection output layout",
            &[row_len],
            &[trailing],
        ));
    }

    let mut boxes = Vec::new();
    for (cell, row) in data.chunks_exact(row_len).enumerate() {
        let objectness = row[4];
        let (class_id, class_prob) = row[5..].iter().enumerate().fold(
            (0usize, f32::MIN),
            |(best_id, best_prob), (id, &prob)| {
                if prob > best_prob {
                    (id, prob)
                } else {
                    (best_id, best_prob)
                }
            },
        );
        let score = objectness * class_prob;
        if score < config.score_threshold {
            continue;
        }
        let raw = [row[0], row[1], row[2], row[3]];
        boxes.push(DetectedBox {
            geometry: config.transform.decode(cell, raw, image_size),
            class_id,
            score,
        });
    }

    // Stable sort: equal scores keep raster order.
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));
    tracing::debug!(
        kept = boxes.len(),
        cells = data.len() / row_len,
        "decoded detection output"
    );
    Ok(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_config(threshold: f32) -> DecodeConfig {
        DecodeConfig {
            score_threshold: threshold,
            transform: CoordTransform::Direct,
        }
    }

    /// One row: geometry, objectness, then class probabilities.
    fn row(geom: [f32; 4], objectness: f32, probs: &[f32]) -> Vec<f32> {
        let mut v = geom.to_vec();
        v.push(objectness);
        v.extend_from_slice(probs);
        v
    }

    #[test]
    fn empty_tensor_decodes_to_empty_list() {
        let output = Tensor::zeros(vec![0, 8]);
        let boxes = format_detected_box(&output, &direct_config(0.5), 3, [64, 64]).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn all_below_threshold_decodes_to_empty_list() {
        let data = row([1.0, 2.0, 3.0, 4.0], 0.2, &[0.1, 0.3, 0.2]);
        let output = Tensor::from_vec(vec![1, 8], data).unwrap();
        let boxes = format_detected_box(&output, &direct_config(0.5), 3, [64, 64]).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn best_class_is_selected_and_scored_by_objectness() {
        // Class scores [0.1, 0.9, 0.05], objectness 0.8 -> class 1, 0.72.
        let data = row([10.0, 20.0, 30.0, 40.0], 0.8, &[0.1, 0.9, 0.05]);
        let output = Tensor::from_vec(vec![1, 8], data).unwrap();
        let boxes = format_detected_box(&output, &direct_config(0.5), 3, [64, 64]).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_id, 1);
        assert!((boxes[0].score - 0.72).abs() < 1e-6);
        assert_eq!(
            boxes[0].geometry,
            BoxGeometry {
                x: 10.0,
                y: 20.0,
                w: 30.0,
                h: 40.0
            }
        );
    }

    #[test]
    fn output_is_score_descending_and_stable_on_ties() {
        let mut data = Vec::new();
        data.extend(row([0.0; 4], 0.6, &[1.0])); // score 0.6, cell 0
        data.extend(row([1.0; 4], 0.9, &[1.0])); // score 0.9, cell 1
        data.extend(row([2.0; 4], 0.6, &[1.0])); // score 0.6, cell 2
        let output = Tensor::from_vec(vec![3, 6], data).unwrap();
        let boxes = format_detected_box(&output, &direct_config(0.1), 1, [64, 64]).unwrap();
        let xs: Vec<f32> = boxes.iter().map(|b| b.geometry.x).collect();
        // Highest score first; the two ties keep raster order (cell 0 then 2).
        assert_eq!(xs, vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn layout_mismatch_is_an_error() {
        let output = Tensor::zeros(vec![2, 7]);
        let result = format_detected_box(&output, &direct_config(0.5), 3, [64, 64]);
        assert!(matches!(result, Err(InferError::ShapeMismatch { .. })));
    }

    #[test]
    fn grid_sigmoid_centers_land_in_their_cells() {
        // Raw zeros: sigmoid(0) = 0.5, so the center sits mid-cell; cell 3
        // of a 2x2 grid is the bottom-right cell.
        let data = row([0.0, 0.0, 0.0, 0.0], 1.0, &[1.0]);
        let mut all = Vec::new();
        for _ in 0..4 {
            all.extend(data.clone());
        }
        let output = Tensor::from_vec(vec![4, 6], all).unwrap();
        let config = DecodeConfig {
            score_threshold: 0.1,
            transform: CoordTransform::GridSigmoid {
                grid_w: 2,
                grid_h: 2,
            },
        };
        let boxes = format_detected_box(&output, &config, 1, [100, 100]).unwrap();
        assert_eq!(boxes.len(), 4);
        // All scores tie, so raster order survives; cell 0 center = (0.25, 0.25),
        // size exp(0)/2 = 0.5 of the image.
        let b0 = &boxes[0].geometry;
        assert!((b0.x - 0.0).abs() < 1e-4);
        assert!((b0.y - 0.0).abs() < 1e-4);
        assert!((b0.w - 50.0).abs() < 1e-4);
        // Cell 3 center = (0.75, 0.75).
        let b3 = &boxes[3].geometry;
        assert!((b3.x - 50.0).abs() < 1e-4);
        assert!((b3.y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn anchor_sizes_scale_the_raw_extents() {
        let data = row([0.0, 0.0, 0.0, 0.0], 1.0, &[1.0]);
        let output = Tensor::from_vec(vec![1, 6], data).unwrap();
        let config = DecodeConfig {
            score_threshold: 0.1,
            transform: CoordTransform::Anchors {
                anchors: vec![[0.2, 0.4]],
            },
        };
        let boxes = format_detected_box(&output, &config, 1, [100, 100]).unwrap();
        // exp(0) * anchor, scaled to a 100px image.
        assert!((boxes[0].geometry.w - 20.0).abs() < 1e-4);
        assert!((boxes[0].geometry.h - 40.0).abs() < 1e-4);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let output = Tensor::zeros(vec![1, 6]);
        let empty_anchors = DecodeConfig {
            score_threshold: 0.5,
            transform: CoordTransform::Anchors {
                anchors: Vec::new(),
            },
        };
        assert!(format_detected_box(&output, &empty_anchors, 1, [64, 64]).is_err());
        let negative = DecodeConfig {
            score_threshold: -1.0,
            transform: CoordTransform::Direct,
        };
        assert!(format_detected_box(&output, &negative, 1, [64, 64]).is_err());
    }
}
