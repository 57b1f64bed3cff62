//! Data models shared across the reframing pipeline.

use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A single face detection within one frame.
///
/// `score` is proportional to the detected pixel area; the tracker
/// normalizes it against the frame size before accumulating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCandidate {
    /// Face bounding box in pixel coordinates
    pub bbox: BoundingBox,
    /// Area-proportional detection score
    pub score: f64,
}

impl FaceCandidate {
    /// Create a candidate scored by its own pixel area.
    pub fn from_box(bbox: BoundingBox) -> Self {
        Self {
            score: bbox.area(),
            bbox,
        }
    }
}

/// Per-scene framing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneStrategy {
    /// Follow a single subject with the virtual camera
    Track,
    /// Fixed wide composition with blurred background
    General,
}

impl std::fmt::Display for SceneStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneStrategy::Track => write!(f, "TRACK"),
            SceneStrategy::General => write!(f, "GENERAL"),
        }
    }
}

/// A contiguous run of frames with one framing strategy.
///
/// Frame ranges are half-open: a frame belongs to the scene whose
/// `end_frame` it has not yet reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// First frame index of the scene (inclusive)
    pub start_frame: u64,
    /// End frame index of the scene (exclusive)
    pub end_frame: u64,
    /// Framing strategy for the scene
    pub strategy: SceneStrategy,
}

impl Scene {
    /// Create a new scene.
    pub fn new(start_frame: u64, end_frame: u64, strategy: SceneStrategy) -> Self {
        Self {
            start_frame,
            end_frame,
            strategy,
        }
    }

    /// Whether a frame index falls inside this scene.
    #[inline]
    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start_frame && frame < self.end_frame
    }
}

/// Target aspect ratio for the output video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Width component
    pub width: u32,
    /// Height component
    pub height: u32,
}

impl AspectRatio {
    /// Create a new aspect ratio.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns width/height as float.
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Portrait 9:16 (TikTok, Instagram Reels)
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_center_and_area() {
        let bbox = BoundingBox::new(100.0, 50.0, 200.0, 100.0);
        assert_eq!(bbox.cx(), 200.0);
        assert_eq!(bbox.cy(), 100.0);
        assert_eq!(bbox.area(), 20000.0);
    }

    #[test]
    fn test_candidate_score_is_area() {
        let cand = FaceCandidate::from_box(BoundingBox::new(0.0, 0.0, 40.0, 60.0));
        assert_eq!(cand.score, 2400.0);
    }

    #[test]
    fn test_scene_boundary_is_half_open() {
        let scene = Scene::new(10, 20, SceneStrategy::Track);
        assert!(scene.contains(10));
        assert!(scene.contains(19));
        assert!(!scene.contains(20));
    }

    #[test]
    fn test_portrait_ratio() {
        assert!((AspectRatio::PORTRAIT.ratio() - 0.5625).abs() < 1e-9);
        assert_eq!(AspectRatio::PORTRAIT.to_string(), "9:16");
    }
}
