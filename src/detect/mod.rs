//! Subject detection backends.
//!
//! The pipeline talks to detection through [`DetectionAdapter`] so the
//! neural backends can be swapped out, e.g. with scripted detections in
//! tests. The production adapter pairs a Caffe-SSD face detector with a
//! YOLO person detector used as a fallback when no face is visible.

pub mod ssd;
pub mod yolo;

use opencv::core::Mat;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ReframeConfig;
use crate::error::ReframeResult;
use crate::models::{BoundingBox, FaceCandidate};

pub use ssd::SsdFaceDetector;
pub use yolo::YoloPersonDetector;

/// Face and person detection as the pipeline consumes it.
pub trait DetectionAdapter {
    /// All faces in the frame, unfiltered and unordered.
    fn detect_faces(&mut self, frame: &Mat) -> ReframeResult<Vec<FaceCandidate>>;

    /// Head-and-shoulders box of the most prominent person, if any.
    fn detect_person(&mut self, frame: &Mat) -> ReframeResult<Option<BoundingBox>>;
}

/// On-disk locations of the detection models.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Caffe prototxt for the SSD face detector
    pub face_proto: PathBuf,
    /// Caffe weights for the SSD face detector
    pub face_weights: PathBuf,
    /// YOLOv8 ONNX person model; optional, person fallback degrades without it
    pub person_onnx: Option<PathBuf>,
}

impl ModelPaths {
    /// Resolve the standard model filenames under a models directory.
    ///
    /// The person model is only used when it exists; the face model paths
    /// are resolved unconditionally and checked at load time.
    pub fn discover(models_dir: impl AsRef<Path>) -> Self {
        let dir = models_dir.as_ref();
        let person_onnx = dir.join("yolov8n.onnx");
        let person_onnx = person_onnx.exists().then_some(person_onnx);

        Self {
            face_proto: dir.join("deploy.prototxt"),
            face_weights: dir.join("res10_300x300_ssd_iter_140000.caffemodel"),
            person_onnx,
        }
    }
}

/// Production adapter backed by OpenCV DNN models.
///
/// Model load failures never abort a run. An unavailable face or person
/// model puts the adapter into a degraded mode where the corresponding
/// call reports nothing and the camera simply stays put.
pub struct NeuralDetectionAdapter {
    face: Option<SsdFaceDetector>,
    person: Option<YoloPersonDetector>,
}

impl NeuralDetectionAdapter {
    pub fn new(paths: &ModelPaths, config: &ReframeConfig) -> Self {
        let face = match SsdFaceDetector::new(
            &paths.face_proto,
            &paths.face_weights,
            config.face_confidence as f32,
        ) {
            Ok(detector) => Some(detector),
            Err(err) => {
                warn!(error = %err, "Face detector unavailable, detection degraded");
                None
            }
        };

        let person = match &paths.person_onnx {
            Some(path) => match YoloPersonDetector::new(path, config.person_confidence as f32) {
                Ok(detector) => {
                    info!(model = %path.display(), "Person detector loaded");
                    Some(detector)
                }
                Err(err) => {
                    warn!(error = %err, "Person detector unavailable");
                    None
                }
            },
            None => {
                warn!("Person model not found, running without person fallback");
                None
            }
        };

        Self { face, person }
    }

    /// Whether the person fallback is available.
    pub fn has_person_fallback(&self) -> bool {
        self.person.is_some()
    }
}

impl DetectionAdapter for NeuralDetectionAdapter {
    fn detect_faces(&mut self, frame: &Mat) -> ReframeResult<Vec<FaceCandidate>> {
        match &mut self.face {
            Some(detector) => detector.detect(frame),
            None => Ok(Vec::new()),
        }
    }

    fn detect_person(&mut self, frame: &Mat) -> ReframeResult<Option<BoundingBox>> {
        match &mut self.person {
            Some(detector) => detector.detect(frame),
            None => Ok(None),
        }
    }
}
