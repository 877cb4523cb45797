//! Frame sources and sinks backing the save/load pipelines.
//!
//! The pipelines only ever see [`VideoBackend`]; container formats plug in
//! behind it.

pub mod decoder;
pub mod encoder;
pub mod raw;

use std::io::{self, Read};
use std::path::Path;

use anyhow::Result;

use crate::codec::Frame;

pub use decoder::FfmpegSource;
pub use encoder::FfmpegSink;
pub use raw::{RawBackend, RawSink, RawSource};

/// Output stream parameters for a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoParams {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

/// Random-access reader over a video's frames.
pub trait FrameSource {
    /// Total frames in the container.
    fn frame_count(&self) -> u64;

    /// Position the reader so the next [`read_frame`](Self::read_frame)
    /// returns frame `index`.
    fn seek(&mut self, index: u64) -> Result<()>;

    /// Read the next frame, or `None` at end of stream.
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

/// Append-only frame writer.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the container. Dropping a sink without calling this
    /// abandons the output.
    fn finish(self) -> Result<()>;
}

/// Opens sources and sinks for a container format.
///
/// Load opens one source per decode worker concurrently, so backends must be
/// shareable across threads and hand out sources that can move between them.
pub trait VideoBackend: Sync {
    type Source: FrameSource + Send;
    type Sink: FrameSink;

    fn open_read(&self, path: &Path) -> Result<Self::Source>;
    fn open_write(&self, path: &Path, params: &VideoParams) -> Result<Self::Sink>;
}

/// Lossless FFV1 video through the `ffmpeg`/`ffprobe` command-line tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl VideoBackend for FfmpegBackend {
    type Source = FfmpegSource;
    type Sink = FfmpegSink;

    fn open_read(&self, path: &Path) -> Result<FfmpegSource> {
        FfmpegSource::open(path)
    }

    fn open_write(&self, path: &Path, params: &VideoParams) -> Result<FfmpegSink> {
        FfmpegSink::spawn(path, params)
    }
}

/// Read exactly `buf.len()` bytes, returning Ok(false) on clean EOF.
pub(crate) fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false); // Clean EOF
                } else {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "partial frame read",
                    ));
                }
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
