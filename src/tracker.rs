//! Active-speaker tracking with hysteresis.
//!
//! Converts per-frame face detections into a stable "who is on camera"
//! decision. Identity comes from horizontal-center matching against
//! recently seen faces; the active speaker is chosen by a decaying score
//! accumulator with an incumbency bonus and a switch cooldown, so momentary
//! detection noise or a brief occlusion does not yank the camera around.

use crate::config::ReframeConfig;
use crate::models::{BoundingBox, FaceCandidate};
use std::collections::HashMap;
use tracing::debug;

/// One recurring face across frames. Not a verified person identity.
#[derive(Debug, Clone, Copy)]
struct IdentityRecord {
    /// Last known horizontal center
    center_x: f64,
    /// Frame the identity was last detected in
    last_seen_frame: u64,
}

/// A candidate resolved to an identity for the current frame.
#[derive(Debug, Clone, Copy)]
struct ResolvedCandidate {
    id: u64,
    bbox: BoundingBox,
    score: f64,
}

/// Cross-frame speaker tracker for one clip.
#[derive(Debug)]
pub struct SpeakerTracker {
    match_distance_ratio: f64,
    identity_window: u64,
    switch_cooldown: u64,
    score_decay: f64,
    score_floor: f64,
    incumbency_bonus: f64,
    area_normalizer: f64,

    identities: HashMap<u64, IdentityRecord>,
    scores: HashMap<u64, f64>,
    next_id: u64,

    active_speaker: Option<u64>,
    locked_frames: u64,
    last_switch_frame: Option<u64>,
}

impl SpeakerTracker {
    /// Create a tracker with the configured hysteresis parameters.
    pub fn new(config: &ReframeConfig) -> Self {
        Self {
            match_distance_ratio: config.match_distance_ratio,
            identity_window: config.identity_window,
            switch_cooldown: config.switch_cooldown,
            score_decay: config.score_decay,
            score_floor: config.score_floor,
            incumbency_bonus: config.incumbency_bonus,
            area_normalizer: config.area_normalizer,
            identities: HashMap::new(),
            scores: HashMap::new(),
            next_id: 0,
            active_speaker: None,
            locked_frames: 0,
            last_switch_frame: None,
        }
    }

    /// Decide which face to focus on for this frame.
    ///
    /// Returns the box of the speaker the camera should follow, or `None`
    /// when no face is visible (the caller falls back to person detection).
    pub fn get_target(
        &mut self,
        candidates: &[FaceCandidate],
        frame_number: u64,
        frame_width: f64,
    ) -> Option<BoundingBox> {
        let resolved = self.resolve_identities(candidates, frame_number, frame_width);
        self.update_scores(&resolved, frame_width);

        if resolved.is_empty() {
            return None;
        }

        let winner = self.pick_winner(&resolved)?;

        if Some(winner.id) == self.active_speaker {
            self.locked_frames += 1;
            return Some(winner.bbox);
        }

        // A different identity won the score race; honor the cooldown as
        // long as the incumbent is still visible.
        if let Some(last_switch) = self.last_switch_frame {
            if frame_number.saturating_sub(last_switch) < self.switch_cooldown {
                if let Some(incumbent) = resolved
                    .iter()
                    .find(|c| Some(c.id) == self.active_speaker)
                {
                    return Some(incumbent.bbox);
                }
            }
        }

        debug!(
            from = ?self.active_speaker,
            to = winner.id,
            frame = frame_number,
            "Active speaker switch"
        );
        self.active_speaker = Some(winner.id);
        self.last_switch_frame = Some(frame_number);
        self.locked_frames = 0;
        Some(winner.bbox)
    }

    /// Match candidates to known identities by horizontal center.
    ///
    /// Identities outside the match window are evicted here: they can
    /// never be matched again, so removal is behavior-preserving and
    /// bounds memory on long inputs.
    fn resolve_identities(
        &mut self,
        candidates: &[FaceCandidate],
        frame_number: u64,
        frame_width: f64,
    ) -> Vec<ResolvedCandidate> {
        self.identities
            .retain(|_, rec| frame_number.saturating_sub(rec.last_seen_frame) <= self.identity_window);

        let mut resolved = Vec::with_capacity(candidates.len());

        for cand in candidates {
            let center_x = cand.bbox.cx();
            let mut best_id = None;
            let mut best_dist = frame_width * self.match_distance_ratio;

            for (&id, rec) in &self.identities {
                let dist = (center_x - rec.center_x).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best_id = Some(id);
                }
            }

            let id = best_id.unwrap_or_else(|| {
                let id = self.next_id;
                self.next_id += 1;
                id
            });

            self.identities.insert(
                id,
                IdentityRecord {
                    center_x,
                    last_seen_frame: frame_number,
                },
            );

            resolved.push(ResolvedCandidate {
                id,
                bbox: cand.bbox,
                score: cand.score,
            });
        }

        resolved
    }

    /// Decay all accumulators, then add each visible candidate's detection
    /// score, normalized against the frame size.
    fn update_scores(&mut self, resolved: &[ResolvedCandidate], frame_width: f64) {
        let floor = self.score_floor;
        let decay = self.score_decay;
        self.scores.retain(|_, score| {
            *score *= decay;
            *score >= floor
        });

        let norm = frame_width * frame_width * self.area_normalizer;
        for cand in resolved {
            let contribution = cand.score / norm;
            *self.scores.entry(cand.id).or_insert(0.0) += contribution;
        }
    }

    /// Highest-scoring visible candidate, with the incumbency bonus applied.
    fn pick_winner(&self, resolved: &[ResolvedCandidate]) -> Option<ResolvedCandidate> {
        let mut best: Option<(f64, ResolvedCandidate)> = None;

        for cand in resolved {
            let mut score = self.scores.get(&cand.id).copied().unwrap_or(0.0);
            if Some(cand.id) == self.active_speaker {
                score *= self.incumbency_bonus;
            }
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, *cand)),
            }
        }

        best.map(|(_, cand)| cand)
    }

    /// Currently active speaker identity, if any.
    pub fn active_speaker(&self) -> Option<u64> {
        self.active_speaker
    }

    /// Number of identities currently inside the match window.
    pub fn known_identities(&self) -> usize {
        self.identities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SpeakerTracker {
        SpeakerTracker::new(&ReframeConfig::default())
    }

    fn face(cx: f64, size: f64) -> FaceCandidate {
        FaceCandidate::from_box(BoundingBox::new(cx - size / 2.0, 100.0, size, size))
    }

    const WIDTH: f64 = 1920.0;

    #[test]
    fn test_single_face_becomes_active() {
        let mut t = tracker();
        let target = t.get_target(&[face(500.0, 200.0)], 0, WIDTH);
        assert!(target.is_some());
        assert_eq!(t.active_speaker(), Some(0));
    }

    #[test]
    fn test_nearby_face_keeps_identity() {
        let mut t = tracker();
        t.get_target(&[face(500.0, 200.0)], 0, WIDTH);
        // 0.15 × 1920 = 288; a 100px move stays the same identity.
        t.get_target(&[face(600.0, 200.0)], 1, WIDTH);
        assert_eq!(t.known_identities(), 1);
    }

    #[test]
    fn test_distant_face_gets_new_id() {
        let mut t = tracker();
        t.get_target(&[face(300.0, 200.0)], 0, WIDTH);
        // 300 → 900 is past the 288px match radius.
        t.get_target(&[face(900.0, 200.0)], 1, WIDTH);
        assert_eq!(t.known_identities(), 2);
    }

    #[test]
    fn test_stale_identity_is_not_matched() {
        let mut t = tracker();
        t.get_target(&[face(500.0, 200.0)], 0, WIDTH);
        assert_eq!(t.active_speaker(), Some(0));
        // Same position 31 frames later: the old record is outside the
        // match window, so this is a brand-new identity.
        t.get_target(&[face(500.0, 200.0)], 31, WIDTH);
        assert_eq!(t.known_identities(), 1);
        assert_eq!(t.active_speaker(), Some(1));
    }

    #[test]
    fn test_no_candidates_returns_none() {
        let mut t = tracker();
        t.get_target(&[face(500.0, 200.0)], 0, WIDTH);
        assert!(t.get_target(&[], 1, WIDTH).is_none());
    }

    #[test]
    fn test_cooldown_holds_incumbent_while_visible() {
        let mut t = tracker();
        // A becomes active at frame 0 (switch recorded at 0).
        t.get_target(&[face(300.0, 200.0)], 0, WIDTH);
        assert_eq!(t.active_speaker(), Some(0));

        // B appears much bigger while A stays visible: B wins the raw
        // score race soon, but the switch is held for the cooldown.
        for frame in 1..20 {
            let target = t
                .get_target(&[face(300.0, 100.0), face(1200.0, 500.0)], frame, WIDTH)
                .unwrap();
            assert!(
                (target.cx() - 300.0).abs() < 1.0,
                "frame {}: expected to hold A, got cx {}",
                frame,
                target.cx()
            );
            assert_eq!(t.active_speaker(), Some(0));
        }
    }

    #[test]
    fn test_switch_allowed_after_cooldown() {
        let mut t = tracker();
        t.get_target(&[face(300.0, 200.0)], 0, WIDTH);

        let mut switched_at = None;
        for frame in 1..120 {
            t.get_target(&[face(300.0, 100.0), face(1200.0, 500.0)], frame, WIDTH);
            if t.active_speaker() == Some(1) {
                switched_at = Some(frame);
                break;
            }
        }

        let frame = switched_at.expect("tracker never switched to the louder face");
        assert!(frame >= 30, "switched during cooldown at frame {}", frame);
    }

    #[test]
    fn test_switch_immediate_when_incumbent_absent() {
        let mut t = tracker();
        // A active, switch recorded at frame 50.
        t.get_target(&[face(300.0, 200.0)], 50, WIDTH);
        assert_eq!(t.active_speaker(), Some(0));

        t.get_target(&[face(300.0, 200.0)], 60, WIDTH);
        // Frame 65 is still inside the cooldown (15 < 30 frames since the
        // switch), but A is gone and only a new face B is visible, so B
        // becomes active immediately.
        t.get_target(&[face(1200.0, 400.0)], 65, WIDTH);
        assert_eq!(t.active_speaker(), Some(1));
    }

    #[test]
    fn test_incumbency_bonus_resists_slightly_larger_face() {
        let mut t = tracker();
        // Let A accumulate; cooldown expires well before frame 200.
        for frame in 0..100 {
            t.get_target(&[face(300.0, 300.0)], frame, WIDTH);
        }
        // B is modestly larger; with the 3× incumbent bonus A still wins.
        for frame in 100..140 {
            t.get_target(&[face(300.0, 300.0), face(1200.0, 360.0)], frame, WIDTH);
        }
        assert_eq!(t.active_speaker(), Some(0));
    }

    #[test]
    fn test_candidate_score_drives_selection_over_area() {
        let mut t = tracker();
        // Same box size, but B carries an externally boosted score. The
        // accumulator must follow the score field, not the raw area.
        let a = face(300.0, 200.0);
        let b = FaceCandidate {
            score: a.score * 100.0,
            ..face(1200.0, 200.0)
        };
        for frame in 0..80 {
            t.get_target(&[a, b], frame, WIDTH);
        }
        assert_eq!(t.active_speaker(), Some(1));
    }

    #[test]
    fn test_scores_decay_below_floor_are_dropped() {
        let mut t = tracker();
        t.get_target(&[face(300.0, 300.0)], 0, WIDTH);
        assert!(!t.scores.is_empty());
        // Decay with no detections: 0.85^n drops any accumulator below 0.1.
        for frame in 1..60 {
            t.get_target(&[], frame, WIDTH);
        }
        assert!(t.scores.is_empty());
    }
}
