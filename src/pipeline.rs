//! End-to-end reframing pipeline.
//!
//! Decode, detect, track, compose, encode. One pass over the source: each
//! frame is classified by the scene it falls in, framed either by the
//! tracking camera or the general composition, and streamed straight into
//! the encoder. The video-only intermediate gets the source audio muxed
//! back in at the end.

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{
    VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
    CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_FRAMES,
};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::camera::SmoothedCameraman;
use crate::compose;
use crate::config::ReframeConfig;
use crate::detect::DetectionAdapter;
use crate::encoder::{mux_audio, RawFrameSink};
use crate::error::{ReframeError, ReframeResult};
use crate::models::{Scene, SceneStrategy};
use crate::probe::probe_video;
use crate::scene::{classify_scenes, detect_scene_ranges};
use crate::tracker::SpeakerTracker;

/// Outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct RenderReport {
    /// Frames written to the output
    pub frames_written: u64,
    /// Scenes the clip was segmented into, with their strategies
    pub scenes: Vec<Scene>,
}

/// Reframing pipeline over an injected detection backend.
pub struct FramePipeline<A: DetectionAdapter> {
    config: ReframeConfig,
    adapter: A,
}

impl<A: DetectionAdapter> FramePipeline<A> {
    pub fn new(config: ReframeConfig, adapter: A) -> Self {
        Self { config, adapter }
    }

    /// Reframe `input` into a vertical `output`.
    ///
    /// `range` optionally restricts processing to a start/end time in
    /// seconds; scene boundaries are still computed over the whole clip so
    /// cuts land in the same places regardless of the range.
    pub async fn run(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        range: Option<(f64, f64)>,
    ) -> ReframeResult<RenderReport> {
        let input = input.as_ref();
        let output = output.as_ref();

        // INIT: validate the source, segment it, set up decode and encode.
        let info = probe_video(input).await?;
        let mut cap = VideoCapture::from_file(&input.to_string_lossy(), CAP_ANY)
            .map_err(|e| ReframeError::source_open(format!("{}: {}", input.display(), e)))?;
        if !cap.is_opened()? {
            return Err(ReframeError::source_open(input.display().to_string()));
        }

        let fps = cap.get(CAP_PROP_FPS)?;
        let fps = if fps > 0.0 { fps } else { info.fps };
        let width = cap.get(CAP_PROP_FRAME_WIDTH)? as u32;
        let height = cap.get(CAP_PROP_FRAME_HEIGHT)? as u32;
        let total_frames = cap.get(CAP_PROP_FRAME_COUNT)? as u64;

        let (start_frame, end_frame) = compute_frame_range(range, fps, total_frames);
        if start_frame >= end_frame {
            return Err(ReframeError::InvalidVideo(format!(
                "Empty frame range {}..{} for {}",
                start_frame,
                end_frame,
                input.display()
            )));
        }

        let ranges = detect_scene_ranges(
            input,
            fps,
            total_frames,
            self.config.scene_change_threshold,
        )
        .await;
        let strategies = classify_scenes(input, &ranges, |frame| self.adapter.detect_faces(frame));
        let scenes: Vec<Scene> = ranges
            .iter()
            .zip(strategies)
            .map(|(&(start, end), strategy)| Scene {
                start_frame: start,
                end_frame: end,
                strategy,
            })
            .collect();

        info!(
            input = %input.display(),
            scenes = scenes.len(),
            frames = end_frame - start_frame,
            "Reframing started"
        );

        let out_width = self.config.output_width() as i32;
        let out_height = self.config.output_height as i32;

        let tmp = tempfile::tempdir()?;
        let video_only = tmp.path().join("video.mp4");
        let mut sink = RawFrameSink::spawn(&video_only, out_width, out_height, fps, &self.config)?;

        // RUNNING: frames go through in strict order; any failure kills
        // the encoder before the error propagates.
        let run = self
            .process_frames(
                &mut cap,
                &scenes,
                start_frame,
                end_frame,
                width,
                height,
                &mut sink,
            )
            .await;

        if let Err(err) = run {
            sink.abort().await;
            return Err(err);
        }

        // DRAIN: flush the encoder, then restore audio.
        let frames_written = sink.finish().await?;
        if info.has_audio {
            mux_audio(&video_only, input, output).await?;
        } else {
            debug!("Source has no audio stream, skipping remux");
            tokio::fs::copy(&video_only, output).await?;
        }

        info!(output = %output.display(), frames_written, "Reframing complete");
        Ok(RenderReport {
            frames_written,
            scenes,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_frames(
        &mut self,
        cap: &mut VideoCapture,
        scenes: &[Scene],
        start_frame: u64,
        end_frame: u64,
        width: u32,
        height: u32,
        sink: &mut RawFrameSink,
    ) -> ReframeResult<()> {
        let out_width = self.config.output_width() as i32;
        let out_height = self.config.output_height as i32;

        let mut cameraman = SmoothedCameraman::new(&self.config, width, height);
        let mut tracker = SpeakerTracker::new(&self.config);

        cap.set(CAP_PROP_POS_FRAMES, start_frame as f64)?;

        let mut scene_idx = scene_index_for(scenes, start_frame, 0);
        let mut snap_pending = true;
        let mut frame = Mat::default();

        for frame_idx in start_frame..end_frame {
            if !cap.read(&mut frame)? || frame.empty() {
                warn!(frame_idx, "Decoder ran out of frames early");
                break;
            }

            let next_idx = scene_index_for(scenes, frame_idx, scene_idx);
            if next_idx != scene_idx {
                scene_idx = next_idx;
                snap_pending = true;
                debug!(
                    frame_idx,
                    strategy = %scenes[scene_idx].strategy,
                    "Scene boundary"
                );
            }

            let composed = match scenes.get(scene_idx).map(|s| s.strategy) {
                Some(SceneStrategy::General) => {
                    compose::general_frame(&frame, out_width, out_height)?
                }
                _ => {
                    let scene_start = scenes.get(scene_idx).map_or(0, |s| s.start_frame);
                    let on_cadence =
                        (frame_idx - scene_start) % self.config.detect_every == 0;

                    if on_cadence {
                        let candidates = self.adapter.detect_faces(&frame)?;
                        let target = if candidates.is_empty() {
                            None
                        } else {
                            tracker.get_target(&candidates, frame_idx, f64::from(width))
                        };
                        let target = match target {
                            Some(bbox) => Some(bbox),
                            None => self.adapter.detect_person(&frame)?,
                        };
                        cameraman.update_target(target);
                    }

                    let crop = cameraman.crop_box(snap_pending);
                    compose::crop_and_resize(&frame, crop, out_width, out_height)?
                }
            };
            snap_pending = false;

            sink.write_frame(&composed).await?;
        }

        Ok(())
    }
}

/// Convert an optional time range to a clamped half-open frame range.
fn compute_frame_range(range: Option<(f64, f64)>, fps: f64, total_frames: u64) -> (u64, u64) {
    let (start_time, end_time) = match range {
        Some((s, e)) => (s.max(0.0), e),
        None => return (0, total_frames),
    };
    let start = ((start_time * fps) as u64).min(total_frames);
    let end = ((end_time * fps) as u64).min(total_frames);
    (start, end)
}

/// Index of the scene containing `frame`, scanning forward from `hint`.
///
/// Frames past the last boundary stay in the last scene.
fn scene_index_for(scenes: &[Scene], frame: u64, hint: usize) -> usize {
    let mut idx = hint;
    while idx + 1 < scenes.len() && frame >= scenes[idx].end_frame {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(start: u64, end: u64, strategy: SceneStrategy) -> Scene {
        Scene {
            start_frame: start,
            end_frame: end,
            strategy,
        }
    }

    #[test]
    fn test_compute_frame_range_full_clip() {
        assert_eq!(compute_frame_range(None, 30.0, 900), (0, 900));
    }

    #[test]
    fn test_compute_frame_range_clamps_to_clip() {
        assert_eq!(compute_frame_range(Some((2.0, 60.0)), 30.0, 900), (60, 900));
        assert_eq!(compute_frame_range(Some((-1.0, 5.0)), 30.0, 900), (0, 150));
    }

    #[test]
    fn test_scene_index_advances_at_boundary() {
        let scenes = vec![
            scene(0, 100, SceneStrategy::Track),
            scene(100, 250, SceneStrategy::General),
            scene(250, 300, SceneStrategy::Track),
        ];
        assert_eq!(scene_index_for(&scenes, 0, 0), 0);
        assert_eq!(scene_index_for(&scenes, 99, 0), 0);
        assert_eq!(scene_index_for(&scenes, 100, 0), 1);
        assert_eq!(scene_index_for(&scenes, 250, 1), 2);
    }

    #[test]
    fn test_scene_index_sticks_to_last_scene() {
        let scenes = vec![scene(0, 100, SceneStrategy::Track)];
        assert_eq!(scene_index_for(&scenes, 5000, 0), 0);
    }
}
