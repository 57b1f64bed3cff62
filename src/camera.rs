//! Smoothed virtual camera for jitter-free horizontal reframing.
//!
//! Models a "heavy tripod": the camera holds still while the subject stays
//! inside a centered dead zone, and otherwise pans linearly at one of two
//! fixed speeds: slow for steady corrections, fast for large reframes.

use crate::config::ReframeConfig;
use crate::models::BoundingBox;

/// Integer crop rectangle in source-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl CropRect {
    /// Width of the rectangle in pixels.
    #[inline]
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    /// Height of the rectangle in pixels.
    #[inline]
    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Whether the rectangle has no area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Virtual camera holding the horizontal pan state for one clip.
#[derive(Debug)]
pub struct SmoothedCameraman {
    video_width: f64,
    video_height: i32,
    crop_width: f64,
    current_center_x: f64,
    target_center_x: f64,
    dead_zone_radius: f64,
    pan_speed_slow: f64,
    pan_speed_fast: f64,
    large_jump_threshold: f64,
}

impl SmoothedCameraman {
    /// Create a camera centered on the source frame.
    ///
    /// Crop dimensions are fixed at construction: full source height at the
    /// target aspect ratio, clamped to the source width for unusually
    /// narrow inputs.
    pub fn new(config: &ReframeConfig, video_width: u32, video_height: u32) -> Self {
        let aspect = config.aspect_ratio.ratio();
        let mut crop_width = (video_height as f64 * aspect).floor();
        if crop_width > video_width as f64 {
            crop_width = video_width as f64;
        }

        Self {
            video_width: video_width as f64,
            video_height: video_height as i32,
            crop_width,
            current_center_x: video_width as f64 / 2.0,
            target_center_x: video_width as f64 / 2.0,
            dead_zone_radius: crop_width * config.dead_zone_ratio,
            pan_speed_slow: config.pan_speed_slow,
            pan_speed_fast: config.pan_speed_fast,
            large_jump_threshold: crop_width * config.large_jump_ratio,
        }
    }

    /// Aim the camera at a subject box; `None` holds the last target.
    pub fn update_target(&mut self, subject: Option<BoundingBox>) {
        if let Some(bbox) = subject {
            self.target_center_x = bbox.cx();
        }
    }

    /// Advance the camera one frame and return the crop rectangle.
    ///
    /// With `force_snap` the center jumps straight to the target (scene
    /// boundaries). Otherwise the camera holds inside the dead zone, steps
    /// at the fast speed past the large-jump threshold and at the slow
    /// speed below it, and never overshoots the target.
    pub fn crop_box(&mut self, force_snap: bool) -> CropRect {
        if force_snap {
            self.current_center_x = self.target_center_x;
        } else {
            let diff = self.target_center_x - self.current_center_x;
            if diff.abs() > self.dead_zone_radius {
                let speed = if diff.abs() > self.large_jump_threshold {
                    self.pan_speed_fast
                } else {
                    self.pan_speed_slow
                };
                let step = speed.min(diff.abs());
                self.current_center_x += step * diff.signum();
            }
        }

        // Keep the crop inside the frame.
        let half = self.crop_width / 2.0;
        self.current_center_x = self
            .current_center_x
            .clamp(half, self.video_width - half);

        let x1 = ((self.current_center_x - half) as i32).max(0);
        let x2 = ((self.current_center_x + half) as i32).min(self.video_width as i32);

        CropRect {
            x1,
            y1: 0,
            x2,
            y2: self.video_height,
        }
    }

    /// Current camera center (for diagnostics and tests).
    pub fn center_x(&self) -> f64 {
        self.current_center_x
    }
}
