//! Scene segmentation and per-scene framing strategy.

pub mod segmenter;
pub mod strategy;

pub use segmenter::detect_scene_ranges;
pub use strategy::{classify_scenes, SceneStrategyClassifier};
