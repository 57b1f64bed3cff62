//! Configuration for the reframing pipeline.
//!
//! All numeric defaults are empirically tuned constants; they are kept as
//! configuration rather than re-derived.

use crate::models::AspectRatio;
use serde::{Deserialize, Serialize};

/// Configuration for the reframing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReframeConfig {
    // === Output ===
    /// Target output aspect ratio (default: 9:16)
    pub aspect_ratio: AspectRatio,

    /// Output frame height in pixels (default: 1920); width follows the
    /// aspect ratio, rounded to an even pixel count
    pub output_height: u32,

    // === Encoding ===
    /// FFmpeg x264 preset (default: "fast")
    pub encoder_preset: String,

    /// FFmpeg CRF quality, 0-51 (default: 23)
    pub encoder_crf: u32,

    // === Detection ===
    /// Run face detection every N frames in TRACK scenes (default: 2)
    pub detect_every: u64,

    /// Minimum face detection confidence (default: 0.5)
    pub face_confidence: f64,

    /// Minimum person detection confidence (default: 0.25)
    pub person_confidence: f64,

    // === Identity tracking ===
    /// Face-to-identity match radius as a fraction of frame width (default: 0.15)
    pub match_distance_ratio: f64,

    /// Frames an identity stays matchable without a detection (default: 30)
    pub identity_window: u64,

    /// Minimum frames between active-speaker switches (default: 30)
    pub switch_cooldown: u64,

    /// Per-frame multiplicative score decay (default: 0.85)
    pub score_decay: f64,

    /// Scores below this are dropped (default: 0.1)
    pub score_floor: f64,

    /// Multiplier applied to the incumbent speaker's score (default: 3.0)
    pub incumbency_bonus: f64,

    /// Area normalizer: candidate area is divided by `width² × this`
    /// before accumulating (default: 0.05)
    pub area_normalizer: f64,

    // === Virtual camera ===
    /// Dead zone radius as a fraction of crop width (default: 0.25)
    pub dead_zone_ratio: f64,

    /// Slow pan speed in pixels per frame (default: 3.0)
    pub pan_speed_slow: f64,

    /// Fast reframe speed in pixels per frame (default: 15.0)
    pub pan_speed_fast: f64,

    /// Target offsets beyond this fraction of crop width trigger the fast
    /// speed (default: 0.5)
    pub large_jump_ratio: f64,

    // === Scene segmentation ===
    /// FFmpeg scene-change score threshold (default: 0.35)
    pub scene_change_threshold: f64,
}

impl Default for ReframeConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::PORTRAIT,
            output_height: 1920,

            encoder_preset: "fast".to_string(),
            encoder_crf: 23,

            detect_every: 2,
            face_confidence: 0.5,
            person_confidence: 0.25,

            match_distance_ratio: 0.15,
            identity_window: 30,
            switch_cooldown: 30,
            score_decay: 0.85,
            score_floor: 0.1,
            incumbency_bonus: 3.0,
            area_normalizer: 0.05,

            dead_zone_ratio: 0.25,
            pan_speed_slow: 3.0,
            pan_speed_fast: 15.0,
            large_jump_ratio: 0.5,

            scene_change_threshold: 0.35,
        }
    }
}

impl ReframeConfig {
    /// Fast configuration for quick previews.
    pub fn fast() -> Self {
        Self {
            encoder_preset: "ultrafast".to_string(),
            detect_every: 4,
            ..Default::default()
        }
    }

    /// Quality configuration for final output.
    pub fn quality() -> Self {
        Self {
            encoder_preset: "slow".to_string(),
            encoder_crf: 18,
            detect_every: 1,
            ..Default::default()
        }
    }

    /// Output width for a given output height, rounded to an even pixel count.
    pub fn output_width(&self) -> u32 {
        let w = (self.output_height as f64 * self.aspect_ratio.ratio()).round() as u32;
        w & !1
    }
}
