//! Uncompressed frame container.
//!
//! Layout (little-endian):
//!
//! ```text
//! magic "STVR" (4) | version (1) | width (4) | height (4) | fps (4) | frame_count (4)
//! frame_count x (width * height * 3) RGB24 bytes
//! ```
//!
//! `frame_count` is written as zero and patched when the sink finishes, so a
//! container from an interrupted save reads as empty.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use thiserror::Error;

use crate::codec::Frame;
use crate::config::BYTES_PER_PIXEL;
use crate::video::{read_exact_or_eof, FrameSink, FrameSource, VideoBackend, VideoParams};

pub const RAW_MAGIC: [u8; 4] = *b"STVR";
pub const RAW_VERSION: u8 = 1;
pub const RAW_HEADER_SIZE: usize = 21;

// Header field offsets
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_WIDTH: usize = 5;
const OFF_HEIGHT: usize = 9;
const OFF_FPS: usize = 13;
const OFF_FRAME_COUNT: usize = 17;

#[derive(Error, Debug)]
pub enum RawContainerError {
    #[error("invalid magic: expected {expected:?}, got {got:?}")]
    InvalidMagic { expected: [u8; 4], got: [u8; 4] },
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("file too short for a container header")]
    Truncated,
    #[error("frame is {got_width}x{got_height}, container is {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error("frame count exceeds the container limit")]
    TooManyFrames,
    #[error("container declares a {width}x{height} frame")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("{width}x{height} frames are too large to address")]
    FrameTooLarge { width: u32, height: u32 },
    #[error("container declares {declared} bytes but the file holds {actual}")]
    ShortFile { declared: u64, actual: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawHeader {
    width: u32,
    height: u32,
    fps: u32,
    frame_count: u32,
}

impl RawHeader {
    fn frame_len(&self) -> Result<u64, RawContainerError> {
        (self.width as u64)
            .checked_mul(self.height as u64)
            .and_then(|px| px.checked_mul(BYTES_PER_PIXEL as u64))
            .ok_or(RawContainerError::FrameTooLarge {
                width: self.width,
                height: self.height,
            })
    }

    /// Check the declared layout against the real file length. Nothing is
    /// allocated on behalf of a header that fails here.
    fn validate(&self, file_len: u64) -> Result<usize, RawContainerError> {
        if self.width == 0 || self.height == 0 {
            return Err(RawContainerError::ZeroDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let frame_len = self.frame_len()?;
        let too_large = || RawContainerError::FrameTooLarge {
            width: self.width,
            height: self.height,
        };
        let declared = frame_len
            .checked_mul(self.frame_count as u64)
            .and_then(|body| body.checked_add(RAW_HEADER_SIZE as u64))
            .ok_or_else(too_large)?;
        if declared > file_len {
            return Err(RawContainerError::ShortFile {
                declared,
                actual: file_len,
            });
        }
        usize::try_from(frame_len).map_err(|_| too_large())
    }

    fn serialize(&self) -> [u8; RAW_HEADER_SIZE] {
        let mut header = [0u8; RAW_HEADER_SIZE];
        header[OFF_MAGIC..OFF_VERSION].copy_from_slice(&RAW_MAGIC);
        header[OFF_VERSION] = RAW_VERSION;
        LittleEndian::write_u32(&mut header[OFF_WIDTH..], self.width);
        LittleEndian::write_u32(&mut header[OFF_HEIGHT..], self.height);
        LittleEndian::write_u32(&mut header[OFF_FPS..], self.fps);
        LittleEndian::write_u32(&mut header[OFF_FRAME_COUNT..], self.frame_count);
        header
    }

    fn deserialize(header: &[u8; RAW_HEADER_SIZE]) -> Result<Self, RawContainerError> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[OFF_MAGIC..OFF_VERSION]);
        if magic != RAW_MAGIC {
            return Err(RawContainerError::InvalidMagic {
                expected: RAW_MAGIC,
                got: magic,
            });
        }

        let version = header[OFF_VERSION];
        if version != RAW_VERSION {
            return Err(RawContainerError::UnsupportedVersion(version));
        }

        Ok(Self {
            width: LittleEndian::read_u32(&header[OFF_WIDTH..]),
            height: LittleEndian::read_u32(&header[OFF_HEIGHT..]),
            fps: LittleEndian::read_u32(&header[OFF_FPS..]),
            frame_count: LittleEndian::read_u32(&header[OFF_FRAME_COUNT..]),
        })
    }
}

/// Backend for the uncompressed container. Reads are true random access, so
/// any number of sources may be open on one file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBackend;

impl VideoBackend for RawBackend {
    type Source = RawSource;
    type Sink = RawSink;

    fn open_read(&self, path: &Path) -> Result<RawSource> {
        RawSource::open(path)
    }

    fn open_write(&self, path: &Path, params: &VideoParams) -> Result<RawSink> {
        RawSink::create(path, params)
    }
}

pub struct RawSource {
    reader: BufReader<File>,
    header: RawHeader,
    frame_len: usize,
}

impl RawSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let file_len = file
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let mut reader = BufReader::new(file);

        let mut buf = [0u8; RAW_HEADER_SIZE];
        if !read_exact_or_eof(&mut reader, &mut buf).map_err(|_| RawContainerError::Truncated)? {
            return Err(RawContainerError::Truncated.into());
        }
        let header = RawHeader::deserialize(&buf)?;
        let frame_len = header.validate(file_len)?;

        Ok(Self {
            reader,
            header,
            frame_len,
        })
    }

    pub fn fps(&self) -> u32 {
        self.header.fps
    }
}

impl FrameSource for RawSource {
    fn frame_count(&self) -> u64 {
        self.header.frame_count as u64
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        let offset = index
            .checked_mul(self.frame_len as u64)
            .and_then(|body| body.checked_add(RAW_HEADER_SIZE as u64))
            .with_context(|| format!("frame {} is beyond any addressable offset", index))?;
        self.reader
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("failed to seek to frame {}", index))?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut data = vec![0u8; self.frame_len];
        if !read_exact_or_eof(&mut self.reader, &mut data)? {
            return Ok(None);
        }
        Ok(Some(Frame::new(self.header.width, self.header.height, data)?))
    }
}

pub struct RawSink {
    writer: BufWriter<File>,
    header: RawHeader,
}

impl RawSink {
    pub fn create(path: &Path, params: &VideoParams) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let header = RawHeader {
            width: params.width,
            height: params.height,
            fps: params.fps,
            frame_count: 0,
        };
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.serialize())?;
        Ok(Self { writer, header })
    }
}

impl FrameSink for RawSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width != self.header.width || frame.height != self.header.height {
            return Err(RawContainerError::FrameSize {
                width: self.header.width,
                height: self.header.height,
                got_width: frame.width,
                got_height: frame.height,
            }
            .into());
        }
        self.header.frame_count = self
            .header
            .frame_count
            .checked_add(1)
            .ok_or(RawContainerError::TooManyFrames)?;
        self.writer
            .write_all(&frame.data)
            .context("failed to write frame")?;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.writer.seek(SeekFrom::Start(OFF_FRAME_COUNT as u64))?;
        self.writer.write_u32::<LittleEndian>(self.header.frame_count)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("storage_tube_test_raw");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(width, height, vec![value; (width * height * 3) as usize]).unwrap()
    }

    #[test]
    fn test_header_roundtrip() {
        let header = RawHeader {
            width: 1280,
            height: 720,
            fps: 20,
            frame_count: 42,
        };
        let bytes = header.serialize();
        assert_eq!(&bytes[..4], b"STVR");
        assert_eq!(RawHeader::deserialize(&bytes).unwrap(), header);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = RawHeader {
            width: 1,
            height: 1,
            fps: 1,
            frame_count: 0,
        }
        .serialize();
        bytes[0] = b'X';
        assert!(matches!(
            RawHeader::deserialize(&bytes),
            Err(RawContainerError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_write_then_random_access() {
        let path = scratch("random_access.stvr");
        let params = VideoParams {
            fps: 20,
            width: 4,
            height: 2,
        };
        let mut sink = RawSink::create(&path, &params).unwrap();
        for value in [10u8, 20, 30] {
            sink.write_frame(&solid(4, 2, value)).unwrap();
        }
        sink.finish().unwrap();

        let mut a = RawSource::open(&path).unwrap();
        let mut b = RawSource::open(&path).unwrap();
        assert_eq!(a.frame_count(), 3);
        assert_eq!(a.fps(), 20);

        b.seek(2).unwrap();
        assert_eq!(b.read_frame().unwrap().unwrap().data[0], 30);
        assert!(b.read_frame().unwrap().is_none());

        a.seek(1).unwrap();
        assert_eq!(a.read_frame().unwrap().unwrap().data[0], 20);
        a.seek(0).unwrap();
        assert_eq!(a.read_frame().unwrap().unwrap().data[0], 10);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_frame_size_mismatch() {
        let path = scratch("mismatch.stvr");
        let params = VideoParams {
            fps: 20,
            width: 4,
            height: 2,
        };
        let mut sink = RawSink::create(&path, &params).unwrap();
        let err = sink.write_frame(&solid(2, 2, 0)).unwrap_err();
        assert!(err.downcast_ref::<RawContainerError>().is_some());
        drop(sink);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unfinished_sink_reads_empty() {
        let path = scratch("unfinished.stvr");
        let params = VideoParams {
            fps: 20,
            width: 4,
            height: 2,
        };
        let mut sink = RawSink::create(&path, &params).unwrap();
        sink.write_frame(&solid(4, 2, 1)).unwrap();
        drop(sink);

        let source = RawSource::open(&path).unwrap();
        assert_eq!(source.frame_count(), 0);
        std::fs::remove_file(&path).ok();
    }

    fn write_header(name: &str, width: u32, height: u32, frame_count: u32) -> std::path::PathBuf {
        let path = scratch(name);
        let header = RawHeader {
            width,
            height,
            fps: 20,
            frame_count,
        };
        std::fs::write(&path, header.serialize()).unwrap();
        path
    }

    fn open_error(path: &Path) -> RawContainerError {
        let err = RawSource::open(path).err().unwrap();
        let kind = err.downcast::<RawContainerError>().unwrap();
        std::fs::remove_file(path).ok();
        kind
    }

    #[test]
    fn test_huge_dimensions_rejected() {
        let path = write_header("huge.stvr", u32::MAX, u32::MAX, 2);
        assert!(matches!(
            open_error(&path),
            RawContainerError::FrameTooLarge { .. }
        ));
    }

    #[test]
    fn test_declared_frames_beyond_file_rejected() {
        // 4096x4096 frames would need 96 MiB of body; the file has none
        let path = write_header("short_body.stvr", 4096, 4096, 2);
        match open_error(&path) {
            RawContainerError::ShortFile { declared, actual } => {
                assert_eq!(declared, 21 + 2 * 4096 * 4096 * 3);
                assert_eq!(actual, 21);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let path = write_header("zero.stvr", 0, 720, 3);
        assert!(matches!(
            open_error(&path),
            RawContainerError::ZeroDimensions { width: 0, height: 720 }
        ));
    }

    #[test]
    fn test_seek_past_addressable_range() {
        let path = scratch("seek_far.stvr");
        let params = VideoParams {
            fps: 20,
            width: 4,
            height: 2,
        };
        let mut sink = RawSink::create(&path, &params).unwrap();
        sink.write_frame(&solid(4, 2, 7)).unwrap();
        sink.finish().unwrap();

        let mut source = RawSource::open(&path).unwrap();
        assert!(source.seek(u64::MAX).is_err());
        source.seek(0).unwrap();
        assert_eq!(source.read_frame().unwrap().unwrap().data[0], 7);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_truncated_header() {
        let path = scratch("short.stvr");
        std::fs::write(&path, b"STVR\x01").unwrap();
        let err = RawSource::open(&path).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<RawContainerError>(),
            Some(RawContainerError::Truncated)
        ));
        std::fs::remove_file(&path).ok();
    }
}
