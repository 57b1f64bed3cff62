//! Per-scene framing strategy classification.
//!
//! Each scene is sampled at three points and classified by how many faces
//! show up: a steady single face means the camera should track it, while
//! no faces (b-roll, landscapes) or a crowd means the scene is better
//! served by the blurred-background general composition.

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, CAP_ANY, CAP_PROP_POS_FRAMES};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ReframeResult;
use crate::models::{FaceCandidate, SceneStrategy};

/// Frames skipped from each scene edge when sampling, to avoid frames
/// still blending across the cut.
const EDGE_OFFSET: u64 = 5;

/// Below this average face count a scene has no reliable subject.
const MIN_TRACKABLE_FACES: f64 = 0.5;

/// Above this average face count a scene is a group shot.
const MAX_TRACKABLE_FACES: f64 = 1.2;

/// Classifies scenes as TRACK or GENERAL from sampled face counts.
///
/// Face detection is injected so the classifier stays decoupled from any
/// particular detector backend.
pub struct SceneStrategyClassifier;

impl SceneStrategyClassifier {
    /// Classify every scene range, one strategy per range.
    ///
    /// Degrades rather than fails: an unopenable video or a detector error
    /// fills the remaining scenes with `Track`, and unreadable sample
    /// frames are simply skipped.
    pub fn classify<F>(
        video_path: impl AsRef<Path>,
        ranges: &[(u64, u64)],
        mut detect_faces: F,
    ) -> Vec<SceneStrategy>
    where
        F: FnMut(&Mat) -> ReframeResult<Vec<FaceCandidate>>,
    {
        let video_path = video_path.as_ref();
        let mut cap = match VideoCapture::from_file(&video_path.to_string_lossy(), CAP_ANY) {
            Ok(cap) => cap,
            Err(err) => {
                warn!(error = %err, "Could not open video for strategy analysis");
                return vec![SceneStrategy::Track; ranges.len()];
            }
        };

        let mut strategies = Vec::with_capacity(ranges.len());

        'scenes: for &(start, end) in ranges {
            let samples = [
                start + EDGE_OFFSET,
                (start + end) / 2,
                end.saturating_sub(EDGE_OFFSET),
            ];

            let mut face_counts = Vec::with_capacity(samples.len());
            for frame_idx in samples {
                let mut frame = Mat::default();
                let seeked = cap
                    .set(CAP_PROP_POS_FRAMES, frame_idx as f64)
                    .unwrap_or(false);
                let grabbed = seeked && cap.read(&mut frame).unwrap_or(false);
                if !grabbed || frame.empty() {
                    continue;
                }

                match detect_faces(&frame) {
                    Ok(candidates) => face_counts.push(candidates.len()),
                    Err(err) => {
                        warn!(error = %err, "Face detection failed during strategy analysis");
                        strategies.resize(ranges.len(), SceneStrategy::Track);
                        break 'scenes;
                    }
                }
            }

            let strategy = decide(&face_counts);
            debug!(start, end, counts = ?face_counts, %strategy, "Scene classified");
            strategies.push(strategy);
        }

        strategies.resize(ranges.len(), SceneStrategy::Track);
        strategies
    }
}

/// Classify scenes with the default classifier.
pub fn classify_scenes<F>(
    video_path: impl AsRef<Path>,
    ranges: &[(u64, u64)],
    detect_faces: F,
) -> Vec<SceneStrategy>
where
    F: FnMut(&Mat) -> ReframeResult<Vec<FaceCandidate>>,
{
    SceneStrategyClassifier::classify(video_path, ranges, detect_faces)
}

/// Strategy decision from sampled face counts.
///
/// Around one face on average means a trackable subject. A scene where no
/// sample frame could be read gives no evidence either way and defaults
/// to tracking.
fn decide(face_counts: &[usize]) -> SceneStrategy {
    if face_counts.is_empty() {
        return SceneStrategy::Track;
    }
    let avg = face_counts.iter().sum::<usize>() as f64 / face_counts.len() as f64;

    if avg < MIN_TRACKABLE_FACES || avg > MAX_TRACKABLE_FACES {
        SceneStrategy::General
    } else {
        SceneStrategy::Track
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_face_is_track() {
        assert_eq!(decide(&[1, 1, 1]), SceneStrategy::Track);
    }

    #[test]
    fn test_no_faces_is_general() {
        assert_eq!(decide(&[0, 0, 0]), SceneStrategy::General);
    }

    #[test]
    fn test_crowd_is_general() {
        assert_eq!(decide(&[2, 2, 1]), SceneStrategy::General);
    }

    #[test]
    fn test_intermittent_face_boundaries() {
        // avg 0.67 is trackable, avg 0.33 is not.
        assert_eq!(decide(&[1, 1, 0]), SceneStrategy::Track);
        assert_eq!(decide(&[1, 0, 0]), SceneStrategy::General);
    }

    #[test]
    fn test_no_samples_defaults_to_track() {
        assert_eq!(decide(&[]), SceneStrategy::Track);
    }

    #[test]
    fn test_exactly_one_point_two_is_track() {
        // avg 1.2 sits on the boundary and stays trackable.
        assert_eq!(decide(&[1, 1, 1, 1, 2]), SceneStrategy::Track);
    }
}
