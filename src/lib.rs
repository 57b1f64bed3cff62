#![deny(unreachable_patterns)]
//! Speaker-tracking vertical video reframing.
//!
//! This crate turns landscape footage into 9:16 vertical video:
//! - Scene segmentation via FFmpeg's scene-change filter
//! - Per-scene strategy: track a single subject, or letterbox a general
//!   shot over a blurred background
//! - Face detection (Caffe-SSD) with a YOLO person fallback
//! - Stable speaker selection with hysteresis and a smoothed virtual
//!   camera that pans like a tripod head
//! - Raw-frame streaming into an FFmpeg encoder, with the source audio
//!   stream-copied back onto the result

pub mod camera;
pub mod compose;
pub mod config;
pub mod detect;
pub mod encoder;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod probe;
pub mod scene;
pub mod tracker;

pub use camera::{CropRect, SmoothedCameraman};
pub use config::ReframeConfig;
pub use detect::{DetectionAdapter, ModelPaths, NeuralDetectionAdapter};
pub use error::{ReframeError, ReframeResult};
pub use models::{AspectRatio, BoundingBox, FaceCandidate, Scene, SceneStrategy};
pub use pipeline::{FramePipeline, RenderReport};
pub use probe::{probe_video, VideoInfo};
pub use tracker::SpeakerTracker;

use std::path::Path;

/// Reframe a clip with the default configuration and neural detectors.
///
/// Convenience wrapper over [`FramePipeline`]; `models_dir` must hold the
/// detection models (see [`ModelPaths::discover`]).
pub async fn reframe_video(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    models_dir: impl AsRef<Path>,
    range: Option<(f64, f64)>,
) -> ReframeResult<RenderReport> {
    let config = ReframeConfig::default();
    let paths = ModelPaths::discover(models_dir);
    let adapter = NeuralDetectionAdapter::new(&paths, &config);
    let mut pipeline = FramePipeline::new(config, adapter);
    pipeline.run(input, output, range).await
}
