//! Scene cut detection via FFmpeg's scene-change filter.
//!
//! Runs a decode-only pass with `select='gt(scene,T)',showinfo` and reads
//! the cut timestamps out of the showinfo log on stderr. Cuts are mapped to
//! frame numbers and turned into contiguous half-open ranges covering the
//! whole clip. Any failure degrades to a single whole-clip range so the
//! pipeline always has scenes to work with.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Detect scene cuts and return half-open `[start, end)` frame ranges.
///
/// The ranges partition `0..total_frames` exactly, in order. Segmentation
/// failure is never an error: a missing ffmpeg, a failed spawn, or a
/// non-zero exit all degrade to a single whole-clip range.
pub async fn detect_scene_ranges(
    video_path: impl AsRef<Path>,
    fps: f64,
    total_frames: u64,
    threshold: f64,
) -> Vec<(u64, u64)> {
    let video_path = video_path.as_ref();
    let whole_clip = vec![(0, total_frames)];

    if which::which("ffmpeg").is_err() {
        warn!("FFmpeg not found, treating clip as a single scene");
        return whole_clip;
    }

    let filter = format!("select='gt(scene,{})',showinfo", threshold);

    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-i"])
        .arg(video_path)
        .args(["-vf", &filter, "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(_) | Err(_) => {
            warn!(
                path = %video_path.display(),
                "Scene detection pass failed, treating clip as a single scene"
            );
            return whole_clip;
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    let cut_times = parse_cut_times(&stderr);
    let ranges = ranges_from_cuts(&cut_times, fps, total_frames);

    debug!(scenes = ranges.len(), "Scene segmentation complete");
    ranges
}

/// Extract `pts_time:` values from showinfo log lines.
fn parse_cut_times(stderr: &str) -> Vec<f64> {
    let mut times = Vec::new();
    for line in stderr.lines() {
        if !line.contains("showinfo") || !line.contains("pts_time:") {
            continue;
        }
        let Some(rest) = line.split("pts_time:").nth(1) else {
            continue;
        };
        let token = rest.split_whitespace().next().unwrap_or("");
        if let Ok(t) = token.parse::<f64>() {
            times.push(t);
        }
    }
    times
}

/// Convert cut timestamps into frame ranges partitioning the clip.
fn ranges_from_cuts(cut_times: &[f64], fps: f64, total_frames: u64) -> Vec<(u64, u64)> {
    let mut cuts: Vec<u64> = cut_times
        .iter()
        .map(|t| (t * fps).round() as u64)
        .filter(|&f| f > 0 && f < total_frames)
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut ranges = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0u64;
    for cut in cuts {
        ranges.push((start, cut));
        start = cut;
    }
    ranges.push((start, total_frames));
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cut_times() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x55] n:   0 pts:  90090 pts_time:3.003   pos: 12 fmt:yuv420p\n\
some unrelated ffmpeg noise\n\
[Parsed_showinfo_1 @ 0x55] n:   1 pts: 270270 pts_time:9.009   pos: 99 fmt:yuv420p\n";
        let times = parse_cut_times(stderr);
        assert_eq!(times.len(), 2);
        assert!((times[0] - 3.003).abs() < 1e-9);
        assert!((times[1] - 9.009).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ignores_lines_without_pts_time() {
        let stderr = "[Parsed_showinfo_1 @ 0x55] config in time_base: 1/30000\n";
        assert!(parse_cut_times(stderr).is_empty());
    }

    #[test]
    fn test_ranges_partition_clip() {
        let ranges = ranges_from_cuts(&[2.0, 5.0], 30.0, 300);
        assert_eq!(ranges, vec![(0, 60), (60, 150), (150, 300)]);
    }

    #[test]
    fn test_no_cuts_yields_whole_clip() {
        assert_eq!(ranges_from_cuts(&[], 30.0, 300), vec![(0, 300)]);
    }

    #[test]
    fn test_out_of_range_cuts_dropped() {
        // A cut at t=0 and one past the end both collapse away.
        let ranges = ranges_from_cuts(&[0.0, 4.0, 99.0], 30.0, 300);
        assert_eq!(ranges, vec![(0, 120), (120, 300)]);
    }

    #[test]
    fn test_duplicate_cuts_deduped() {
        let ranges = ranges_from_cuts(&[4.0, 4.001], 30.0, 300);
        assert_eq!(ranges, vec![(0, 120), (120, 300)]);
    }

    #[tokio::test]
    async fn test_segmentation_failure_degrades_to_whole_clip() {
        // Unreadable input (or no ffmpeg at all) must never surface an
        // error; the clip becomes one scene.
        let ranges = detect_scene_ranges("/nonexistent/input.mp4", 30.0, 300, 0.35).await;
        assert_eq!(ranges, vec![(0, 300)]);
    }
}
