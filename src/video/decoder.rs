use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};
use log::debug;

use crate::codec::Frame;
use crate::config::BYTES_PER_PIXEL;
use crate::video::{read_exact_or_eof, FrameSource};

/// Stream properties reported by `ffprobe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamInfo {
    width: u32,
    height: u32,
    frame_count: u64,
}

/// Parse `key=value` lines from `ffprobe -of default=noprint_wrappers=1`.
fn parse_probe(output: &str) -> Result<StreamInfo> {
    let mut width = None;
    let mut height = None;
    let mut frame_count = None;

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse().ok(),
            "height" => height = value.parse().ok(),
            "nb_read_frames" => frame_count = value.parse().ok(),
            _ => {}
        }
    }

    Ok(StreamInfo {
        width: width.context("ffprobe reported no width")?,
        height: height.context("ffprobe reported no height")?,
        frame_count: frame_count.context("ffprobe reported no frame count")?,
    })
}

fn probe(path: &Path) -> Result<StreamInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_frames",
            "-show_entries",
            "stream=width,height,nb_read_frames",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .context("failed to run ffprobe, is ffmpeg installed?")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe exited with status: {}", output.status);
    }
    parse_probe(&String::from_utf8_lossy(&output.stdout))
}

/// Reads RGB24 frames from any video `ffmpeg` can decode.
///
/// Seeking restarts the `ffmpeg` child with a `select` filter so the first
/// frame it emits is exactly the requested index.
pub struct FfmpegSource {
    path: PathBuf,
    info: StreamInfo,
    start: u64,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let info = probe(path)?;
        debug!(
            "probed {}: {}x{}, {} frames",
            path.display(),
            info.width,
            info.height,
            info.frame_count
        );
        Ok(Self {
            path: path.to_path_buf(),
            info,
            start: 0,
            child: None,
            stdout: None,
        })
    }

    fn spawn(&mut self) -> Result<()> {
        let select = format!("select=gte(n\\,{})", self.start);
        let mut child = Command::new("ffmpeg")
            .args(["-loglevel", "error", "-i"])
            .arg(&self.path)
            .args([
                "-vf",
                &select,
                "-fps_mode",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg for decoding")?;

        self.stdout = child.stdout.take();
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for FfmpegSource {
    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        self.stop();
        self.start = index;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.child.is_none() {
            self.spawn()?;
        }
        let stdout = self.stdout.as_mut().context("ffmpeg stdout unavailable")?;

        let frame_len = self.info.width as usize * self.info.height as usize * BYTES_PER_PIXEL;
        let mut data = vec![0u8; frame_len];
        if !read_exact_or_eof(stdout, &mut data)? {
            return Ok(None);
        }
        Ok(Some(Frame::new(self.info.width, self.info.height, data)?))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop();
    }
}
