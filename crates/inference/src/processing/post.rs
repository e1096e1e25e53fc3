use crate::detection::Detection;
use common::span;

/// Letterbox parameters needed to map model coordinates back to the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections,
        }
    }

    /// Decode YOLOv8 output and apply per-class non-maximum suppression.
    ///
    /// `predictions` is `[1, 4 + num_classes, num_anchors]`: rows 0..4 hold
    /// `cx, cy, w, h` in letterboxed input pixels, the remaining rows hold
    /// per-class scores that are already sigmoid-activated.
    ///
    /// Returned detections are sorted by descending confidence.
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ndarray::ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        let shape = predictions.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            anyhow::bail!(
                "Unexpected model output shape {:?}, expected [1, 4 + num_classes, num_anchors]",
                shape
            );
        }

        let num_attrs = shape[1];
        let num_anchors = shape[2];

        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            let mut confidence = f32::NEG_INFINITY;
            let mut class_idx = 0usize;
            for c in 4..num_attrs {
                let score = predictions[[0, c, i]];
                if score > confidence {
                    confidence = score;
                    class_idx = c - 4;
                }
            }

            if !(confidence >= self.confidence_threshold) {
                continue;
            }

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(
                predictions[[0, 0, i]],
                predictions[[0, 1, i]],
                predictions[[0, 2, i]],
                predictions[[0, 3, i]],
            );

            let (x1, y1, x2, y2) = transform.to_original(x1, y1, x2, y2);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            candidates.push(Detection::new(x1, y1, x2, y2, confidence, class_idx as u32));
        }

        tracing::trace!(
            anchors = num_anchors,
            candidates = candidates.len(),
            "Decoded candidates"
        );

        Ok(self.non_maximum_suppression(candidates))
    }

    fn non_maximum_suppression(&self, mut candidates: Vec<Detection>) -> Vec<Detection> {
        let _s = span!("non_maximum_suppression");

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<Detection> = Vec::new();
        for candidate in candidates {
            if kept.len() >= self.max_detections {
                break;
            }

            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id && k.iou(&candidate) > self.iou_threshold
            });

            if !suppressed {
                kept.push(candidate);
            }
        }

        kept
    }
}

impl TransformParams {
    /// Undo the letterbox and clamp to the source image bounds.
    pub fn to_original(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32, f32, f32) {
        let w = self.orig_width as f32;
        let h = self.orig_height as f32;
        (
            ((x1 - self.offset_x) / self.scale).clamp(0.0, w),
            ((y1 - self.offset_y) / self.scale).clamp(0.0, h),
            ((x2 - self.offset_x) / self.scale).clamp(0.0, w),
            ((y2 - self.offset_y) / self.scale).clamp(0.0, h),
        )
    }
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn test_postprocessor() -> PostProcessor {
        PostProcessor::new(0.25, 0.7, 300)
    }

    fn identity_transform(width: u32, height: u32) -> TransformParams {
        TransformParams {
            orig_width: width,
            orig_height: height,
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Build a `[1, 4 + num_classes, n]` YOLOv8 output.
    /// Each entry is (cx, cy, w, h, class, score); other class scores are 0.
    fn create_yolo_output(
        anchors: &[(f32, f32, f32, f32, usize, f32)],
        num_classes: usize,
    ) -> Array<f32, IxDyn> {
        let n = anchors.len();
        let mut out = Array::zeros(IxDyn(&[1, 4 + num_classes, n]));
        for (i, &(cx, cy, w, h, class, score)) in anchors.iter().enumerate() {
            out[[0, 0, i]] = cx;
            out[[0, 1, i]] = cy;
            out[[0, 2, i]] = w;
            out[[0, 3, i]] = h;
            out[[0, 4 + class, i]] = score;
        }
        out
    }

    #[test]
    fn test_cxcywh_to_xyxy() {
        let (x1, y1, x2, y2) = cxcywh_to_xyxy(50.0, 50.0, 40.0, 20.0);
        assert_eq!((x1, y1, x2, y2), (30.0, 40.0, 70.0, 60.0));
    }

    #[test]
    fn test_confidence_threshold_filtering() {
        let output = create_yolo_output(
            &[
                (100.0, 100.0, 20.0, 20.0, 0, 0.10),
                (200.0, 200.0, 20.0, 20.0, 0, 0.25),
                (300.0, 300.0, 20.0, 20.0, 0, 0.90),
            ],
            1,
        );

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(640, 640))
            .unwrap();

        assert_eq!(detections.len(), 2, "Should filter out confidence < 0.25");
        assert!((detections[0].confidence - 0.90).abs() < 1e-6);
        assert!((detections[1].confidence - 0.25).abs() < 1e-6, "Boundary included");
    }

    #[test]
    fn test_best_class_is_selected() {
        let mut output = create_yolo_output(&[(100.0, 100.0, 20.0, 20.0, 0, 0.4)], 3);
        output[[0, 6, 0]] = 0.8; // class 2

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(640, 640))
            .unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 2);
        assert!((detections[0].confidence - 0.8).abs() < 1e-6);
    }

    /// Original 800x600 letterboxed into 640: scale 0.8, offset_y 80
    #[test]
    fn test_coordinate_inverse_transformation() {
        // Input box xyxy = (300, 300, 340, 380)
        // x1 = 300 / 0.8 = 375, y1 = (300 - 80) / 0.8 = 275
        // x2 = 340 / 0.8 = 425, y2 = (380 - 80) / 0.8 = 375
        let output = create_yolo_output(&[(320.0, 340.0, 40.0, 80.0, 0, 0.9)], 1);
        let transform = TransformParams {
            orig_width: 800,
            orig_height: 600,
            scale: 0.8,
            offset_x: 0.0,
            offset_y: 80.0,
        };

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &transform)
            .unwrap();

        assert_eq!(detections.len(), 1);
        let [x1, y1, x2, y2] = detections[0].bbox;
        assert!((x1 - 375.0).abs() < 0.01, "x1 incorrect: {}", x1);
        assert!((y1 - 275.0).abs() < 0.01, "y1 incorrect: {}", y1);
        assert!((x2 - 425.0).abs() < 0.01, "x2 incorrect: {}", x2);
        assert!((y2 - 375.0).abs() < 0.01, "y2 incorrect: {}", y2);
    }

    #[test]
    fn test_coordinates_clamped_to_image_bounds() {
        let output = create_yolo_output(
            &[
                (5.0, 5.0, 40.0, 40.0, 0, 0.9),
                (395.0, 395.0, 40.0, 40.0, 0, 0.8),
            ],
            1,
        );

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(400, 400))
            .unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].bbox[0], 0.0, "Negative x1 should be clamped to 0");
        assert_eq!(detections[0].bbox[1], 0.0, "Negative y1 should be clamped to 0");
        assert_eq!(detections[1].bbox[2], 400.0, "x2 exceeding width should be clamped");
        assert_eq!(detections[1].bbox[3], 400.0, "y2 exceeding height should be clamped");
    }

    #[test]
    fn test_box_entirely_in_padding_is_dropped() {
        // Lies in the top padding band, collapses to zero height after clamping
        let output = create_yolo_output(&[(320.0, 20.0, 40.0, 20.0, 0, 0.9)], 1);
        let transform = TransformParams {
            orig_width: 800,
            orig_height: 600,
            scale: 0.8,
            offset_x: 0.0,
            offset_y: 80.0,
        };

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &transform)
            .unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_nms_suppresses_overlapping_same_class() {
        let output = create_yolo_output(
            &[
                (100.0, 100.0, 40.0, 40.0, 0, 0.80),
                (102.0, 101.0, 40.0, 40.0, 0, 0.95),
                (300.0, 300.0, 40.0, 40.0, 0, 0.60),
            ],
            1,
        );

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(640, 640))
            .unwrap();

        assert_eq!(detections.len(), 2);
        assert!((detections[0].confidence - 0.95).abs() < 1e-6, "Highest score kept");
        assert!((detections[1].confidence - 0.60).abs() < 1e-6, "Disjoint box kept");
    }

    #[test]
    fn test_nms_keeps_overlapping_different_classes() {
        let output = create_yolo_output(
            &[
                (100.0, 100.0, 40.0, 40.0, 0, 0.9),
                (100.0, 100.0, 40.0, 40.0, 1, 0.8),
            ],
            2,
        );

        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(640, 640))
            .unwrap();

        assert_eq!(detections.len(), 2, "NMS is per class");
    }

    #[test]
    fn test_max_detections_truncates() {
        let anchors: Vec<_> = (0..10)
            .map(|i| (20.0 + i as f32 * 50.0, 20.0, 10.0, 10.0, 0, 0.5 + i as f32 * 0.01))
            .collect();
        let output = create_yolo_output(&anchors, 1);

        let post = PostProcessor::new(0.25, 0.7, 3);
        let detections = post
            .parse_detections(&output.view(), &identity_transform(640, 640))
            .unwrap();

        assert_eq!(detections.len(), 3);
        assert!((detections[0].confidence - 0.59).abs() < 1e-6);
    }

    #[test]
    fn test_empty_output_yields_no_detections() {
        let output = Array::<f32, _>::zeros(IxDyn(&[1, 5, 0]));
        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(10, 10))
            .unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_malformed_shape_rejected() {
        let output = Array::<f32, _>::zeros(IxDyn(&[1, 4, 8400]));
        let err = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(10, 10))
            .unwrap_err();
        assert!(err.to_string().contains("Unexpected model output shape"));

        let output = Array::<f32, _>::zeros(IxDyn(&[8400, 5]));
        assert!(
            test_postprocessor()
                .parse_detections(&output.view(), &identity_transform(10, 10))
                .is_err()
        );
    }

    #[test]
    fn test_nan_scores_are_ignored() {
        let output = create_yolo_output(&[(100.0, 100.0, 20.0, 20.0, 0, f32::NAN)], 1);
        let detections = test_postprocessor()
            .parse_detections(&output.view(), &identity_transform(640, 640))
            .unwrap();
        assert!(detections.is_empty());
    }
}
