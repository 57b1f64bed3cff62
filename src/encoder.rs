//! Raw frame encoding and audio remux.
//!
//! Composed frames are streamed to a long-lived FFmpeg child as raw BGR24
//! over stdin, producing a video-only intermediate. A second, stream-copy
//! pass muxes the original audio back in.

use opencv::core::Mat;
use opencv::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ReframeConfig;
use crate::error::{ReframeError, ReframeResult};

/// Streaming encoder for composed output frames.
///
/// Frames must be written in presentation order. `finish` must be called
/// to close the stream and collect the encoder's exit status; `abort`
/// kills the child on the error path so no orphan survives.
pub struct RawFrameSink {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: JoinHandle<Vec<u8>>,
    frame_bytes: usize,
    frames_written: u64,
    output: PathBuf,
}

impl RawFrameSink {
    /// Spawn the FFmpeg encoder for `width`x`height` BGR24 input.
    pub fn spawn(
        output: impl AsRef<Path>,
        width: i32,
        height: i32,
        fps: f64,
        config: &ReframeConfig,
    ) -> ReframeResult<Self> {
        let output = output.as_ref().to_path_buf();
        which::which("ffmpeg").map_err(|_| ReframeError::FfmpegNotFound)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "-s",
            &format!("{}x{}", width, height),
            "-r",
            &format!("{:.6}", fps),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            &config.encoder_preset,
            "-crf",
            &config.encoder_crf.to_string(),
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(&output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            ReframeError::ffmpeg_failed(format!("Failed to spawn FFmpeg encoder: {}", e), None, None)
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ReframeError::ffmpeg_failed("Failed to open FFmpeg encoder stdin", None, None)
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            ReframeError::ffmpeg_failed("Failed to open FFmpeg encoder stderr", None, None)
        })?;

        // Drain stderr concurrently. The child blocks on a full stderr
        // pipe and then stops reading stdin, wedging write_frame, so the
        // log must be consumed while frames are still streaming in.
        let stderr_drain = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_drain,
            frame_bytes: (width as usize) * (height as usize) * 3,
            frames_written: 0,
            output,
        })
    }

    /// Write one composed BGR frame.
    ///
    /// Backpressure comes for free: the write blocks when the encoder's
    /// pipe is full, so frames are never buffered unboundedly.
    pub async fn write_frame(&mut self, frame: &Mat) -> ReframeResult<()> {
        let data = frame.data_bytes()?;
        if data.len() != self.frame_bytes {
            return Err(ReframeError::ffmpeg_failed(
                format!(
                    "Frame size mismatch: got {} bytes, expected {}",
                    data.len(),
                    self.frame_bytes
                ),
                None,
                None,
            ));
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| {
            ReframeError::ffmpeg_failed("Encoder stream already closed", None, None)
        })?;
        stdin.write_all(data).await?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the stream and wait for the encoder to finish the file.
    pub async fn finish(mut self) -> ReframeResult<u64> {
        // Dropping stdin sends EOF so the encoder can flush and exit.
        drop(self.stdin.take());

        let status = self.child.wait().await?;
        let stderr = self.stderr_drain.await.unwrap_or_default();
        if !status.success() {
            return Err(ReframeError::ffmpeg_failed(
                format!("FFmpeg encoder failed for {}", self.output.display()),
                Some(String::from_utf8_lossy(&stderr).to_string()),
                status.code(),
            ));
        }

        debug!(frames = self.frames_written, output = %self.output.display(), "Encode complete");
        Ok(self.frames_written)
    }

    /// Kill the encoder without waiting for a clean finish.
    pub async fn abort(mut self) {
        drop(self.stdin.take());
        if let Err(err) = self.child.kill().await {
            warn!(error = %err, "Failed to kill FFmpeg encoder");
        }
        self.stderr_drain.abort();
    }

    /// Frames accepted so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

/// Remux audio from `source` onto the video-only `video` file.
///
/// Streams are copied, never re-encoded. The audio mapping is optional on
/// the FFmpeg side so a silent source still produces a valid output.
pub async fn mux_audio(
    video: impl AsRef<Path>,
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> ReframeResult<()> {
    let video = video.as_ref();
    let source = source.as_ref();
    let output = output.as_ref();
    which::which("ffmpeg").map_err(|_| ReframeError::FfmpegNotFound)?;

    let result = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(video)
        .arg("-i")
        .arg(source)
        .args(["-map", "0:v", "-map", "1:a?", "-c", "copy", "-shortest"])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        return Err(ReframeError::ffmpeg_failed(
            format!("Audio remux failed for {}", output.display()),
            Some(String::from_utf8_lossy(&result.stderr).to_string()),
            result.status.code(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReframeConfig;
    use opencv::core::{Scalar, CV_8UC3};
    use std::time::Duration;

    fn tiny_frame() -> Mat {
        Mat::new_rows_cols_with_default(16, 16, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    #[tokio::test]
    async fn test_finish_surfaces_encoder_stderr() {
        if which::which("ffmpeg").is_err() {
            return;
        }
        let config = ReframeConfig::default();
        // Unwritable output makes the encoder fail and explain itself on
        // stderr.
        let sink =
            RawFrameSink::spawn("/nonexistent-dir/out.mp4", 16, 16, 30.0, &config).unwrap();
        let err = sink.finish().await.unwrap_err();
        match err {
            ReframeError::FfmpegFailed { stderr, .. } => {
                assert!(!stderr.unwrap_or_default().is_empty());
            }
            other => panic!("expected FfmpegFailed, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_encoder_does_not_wedge_writes() {
        if which::which("ffmpeg").is_err() {
            return;
        }
        let config = ReframeConfig::default();
        let mut sink =
            RawFrameSink::spawn("/nonexistent-dir/out.mp4", 16, 16, 30.0, &config).unwrap();
        let frame = tiny_frame();

        // A dead child stops reading stdin. With stderr drained off-task
        // the writes must fail promptly instead of blocking forever; the
        // timeout turns a wedge into a test failure.
        let result = tokio::time::timeout(Duration::from_secs(30), async move {
            for _ in 0..512 {
                if sink.write_frame(&frame).await.is_err() {
                    return Err(());
                }
            }
            sink.finish().await.map(|_| ()).map_err(|_| ())
        })
        .await
        .expect("encoder pipe wedged");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_write_frame_rejects_wrong_size() {
        if which::which("ffmpeg").is_err() {
            return;
        }
        let config = ReframeConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RawFrameSink::spawn(dir.path().join("out.mp4"), 32, 32, 30.0, &config)
            .unwrap();
        // 16x16 frame against a 32x32 sink.
        assert!(sink.write_frame(&tiny_frame()).await.is_err());
        sink.abort().await;
    }
}
