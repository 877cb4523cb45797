use std::io::Write;
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::codec::Frame;
use crate::video::{FrameSink, VideoParams};

/// Streams RGB24 frames into an `ffmpeg` child that writes lossless FFV1.
///
/// Frames are black/white only, so the stream is stored as 8-bit gray.
pub struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    params: VideoParams,
    frames: u64,
}

impl FfmpegSink {
    pub fn spawn(output_path: &Path, params: &VideoParams) -> Result<Self> {
        info!(
            "opening ffmpeg writer: {} ({}x{} @ {} fps)",
            output_path.display(),
            params.width,
            params.height,
            params.fps
        );

        // Scale FFV1 slice count to available threads, clamped to 16.
        let ffv1_slices = rayon::current_num_threads().min(16).to_string();

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pixel_format",
                "rgb24",
                "-video_size",
                &format!("{}x{}", params.width, params.height),
                "-framerate",
                &params.fps.to_string(),
                "-i",
                "pipe:0",
                "-c:v",
                "ffv1",
                "-level",
                "3",
                "-slices",
                &ffv1_slices,
                "-pix_fmt",
                "gray",
            ])
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg process, is ffmpeg installed?")?;

        let stdin = child.stdin.take().context("ffmpeg stdin unavailable")?;

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            params: *params,
            frames: 0,
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width != self.params.width || frame.height != self.params.height {
            anyhow::bail!(
                "frame is {}x{}, stream is {}x{}",
                frame.width,
                frame.height,
                self.params.width,
                self.params.height
            );
        }
        let stdin = self.stdin.as_mut().context("ffmpeg writer already closed")?;
        stdin
            .write_all(&frame.data)
            .context("failed to write frame data to ffmpeg")?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());
        let mut child = self.child.take().context("ffmpeg writer already closed")?;
        let status = child.wait().context("ffmpeg process failed")?;
        if !status.success() {
            anyhow::bail!("ffmpeg exited with status: {}", status);
        }
        debug!("ffmpeg wrote {} frames", self.frames);
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
