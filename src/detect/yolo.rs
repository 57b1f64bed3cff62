//! YOLOv8 person detection via OpenCV DNN.
//!
//! Used when face detection comes up empty, typically when the subject is
//! turned away from the camera. Only the person class is consulted, and
//! the detected full-body box is trimmed to a head-and-shoulders region so
//! the camera centers where a face would be.

use opencv::core::{Mat, Scalar, Size, CV_32F};
use opencv::dnn::{self, Net};
use opencv::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::error::{ReframeError, ReframeResult};
use crate::models::BoundingBox;

/// Network input edge length.
const INPUT_SIZE: i32 = 640;

/// Row index of the person class score in the YOLOv8 output tensor.
const PERSON_ROW: i32 = 4;

/// Fraction of the body height kept, roughly head and shoulders.
const HEAD_FRACTION: f64 = 0.4;

pub struct YoloPersonDetector {
    net: Net,
    confidence: f32,
}

impl YoloPersonDetector {
    pub fn new(onnx: impl AsRef<Path>, confidence: f32) -> ReframeResult<Self> {
        let onnx = onnx.as_ref();
        let net = dnn::read_net_from_onnx(&onnx.to_string_lossy()).map_err(|e| {
            ReframeError::detection_failed(format!(
                "Could not load person detector from {}: {}",
                onnx.display(),
                e
            ))
        })?;

        Ok(Self { net, confidence })
    }

    /// Largest detected person, as a head-and-shoulders box, if any.
    pub fn detect(&mut self, frame: &Mat) -> ReframeResult<Option<BoundingBox>> {
        let x_scale = frame.cols() as f64 / f64::from(INPUT_SIZE);
        let y_scale = frame.rows() as f64 / f64::from(INPUT_SIZE);

        let blob = dnn::blob_from_image(
            frame,
            1.0 / 255.0,
            Size::new(INPUT_SIZE, INPUT_SIZE),
            Scalar::default(),
            true,
            false,
            CV_32F,
        )?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;
        let output = self.net.forward_single("")?;

        // Output layout is [1, 4 + classes, anchors]: rows 0..4 are
        // cx, cy, w, h in input coordinates, row 4 is the person score.
        let anchors = output.mat_size()[2];
        let mut best: Option<(f64, BoundingBox)> = None;

        for j in 0..anchors {
            let score = *output.at_nd::<f32>(&[0, PERSON_ROW, j])?;
            if score < self.confidence {
                continue;
            }

            let cx = f64::from(*output.at_nd::<f32>(&[0, 0, j])?) * x_scale;
            let cy = f64::from(*output.at_nd::<f32>(&[0, 1, j])?) * y_scale;
            let w = f64::from(*output.at_nd::<f32>(&[0, 2, j])?) * x_scale;
            let h = f64::from(*output.at_nd::<f32>(&[0, 3, j])?) * y_scale;
            if w <= 0.0 || h <= 0.0 {
                continue;
            }

            let area = w * h;
            if best.map_or(true, |(best_area, _)| area > best_area) {
                let bbox = BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h * HEAD_FRACTION);
                best = Some((area, bbox));
            }
        }

        if let Some((area, bbox)) = best {
            debug!(area, cx = bbox.cx(), "Person fallback hit");
            return Ok(Some(bbox));
        }
        Ok(None)
    }
}
