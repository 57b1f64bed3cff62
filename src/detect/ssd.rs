//! Caffe-SSD face detection (res10 300x300).

use opencv::core::{Mat, Scalar, Size, CV_32F};
use opencv::dnn::{self, Net};
use opencv::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::error::{ReframeError, ReframeResult};
use crate::models::{BoundingBox, FaceCandidate};

/// Network input edge length.
const INPUT_SIZE: i32 = 300;

/// BGR channel means baked into the res10 training setup.
const MEAN: (f64, f64, f64) = (104.0, 177.0, 123.0);

/// Single-shot face detector. Not thread safe; one instance per pipeline.
pub struct SsdFaceDetector {
    net: Net,
    confidence: f32,
}

impl SsdFaceDetector {
    pub fn new(
        proto: impl AsRef<Path>,
        weights: impl AsRef<Path>,
        confidence: f32,
    ) -> ReframeResult<Self> {
        let proto = proto.as_ref();
        let weights = weights.as_ref();
        for path in [proto, weights] {
            if !path.exists() {
                return Err(ReframeError::ModelNotFound(path.to_path_buf()));
            }
        }
        let net = dnn::read_net_from_caffe(
            &proto.to_string_lossy(),
            &weights.to_string_lossy(),
        )
        .map_err(|e| {
            ReframeError::detection_failed(format!(
                "Could not load face detector from {}: {}",
                weights.display(),
                e
            ))
        })?;

        Ok(Self { net, confidence })
    }

    /// Detect faces in a BGR frame.
    ///
    /// Candidate scores are raw pixel areas, so bigger (closer) faces
    /// naturally outrank background ones.
    pub fn detect(&mut self, frame: &Mat) -> ReframeResult<Vec<FaceCandidate>> {
        let width = frame.cols() as f64;
        let height = frame.rows() as f64;

        let blob = dnn::blob_from_image(
            frame,
            1.0,
            Size::new(INPUT_SIZE, INPUT_SIZE),
            Scalar::new(MEAN.0, MEAN.1, MEAN.2, 0.0),
            false,
            false,
            CV_32F,
        )?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;
        let detections = self.net.forward_single("")?;

        // Output layout is [1, 1, N, 7]:
        // [image_id, label, confidence, x1, y1, x2, y2] with normalized coords.
        let count = detections.mat_size()[2];
        let mut candidates = Vec::new();

        for i in 0..count {
            let conf = *detections.at_nd::<f32>(&[0, 0, i, 2])?;
            if conf < self.confidence {
                continue;
            }

            let x1 = f64::from(*detections.at_nd::<f32>(&[0, 0, i, 3])?) * width;
            let y1 = f64::from(*detections.at_nd::<f32>(&[0, 0, i, 4])?) * height;
            let x2 = f64::from(*detections.at_nd::<f32>(&[0, 0, i, 5])?) * width;
            let y2 = f64::from(*detections.at_nd::<f32>(&[0, 0, i, 6])?) * height;

            let w = x2 - x1;
            let h = y2 - y1;
            if w <= 0.0 || h <= 0.0 {
                continue;
            }

            candidates.push(FaceCandidate::from_box(BoundingBox::new(x1, y1, w, h)));
        }

        debug!(faces = candidates.len(), "Face detection pass");
        Ok(candidates)
    }
}
