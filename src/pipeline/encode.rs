use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::chunker::ChunkReader;
use crate::codec;
use crate::config::{FrameGeometry, TubeConfig};
use crate::error::StorageError;
use crate::header::{HeaderError, HeaderRecord};
use crate::pipeline::progress::frame_bar;
use crate::video::{FrameSink, VideoBackend, VideoParams};

/// Outcome of a successful [`save_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub file_name: String,
    pub total_bytes: u64,
    /// Frames written, header included.
    pub frames: u64,
}

/// Save pipeline: file -> header frame + one frame per `chunk_bytes` read -> video.
///
/// Strictly sequential. If anything fails after the video is created, the
/// partial video is removed.
pub fn save_file<B: VideoBackend>(
    input_path: &Path,
    output_path: &Path,
    cfg: &TubeConfig,
    backend: &B,
) -> Result<SaveReport> {
    let geo = cfg.geometry().map_err(StorageError::from)?;

    let file_name = match input_path.file_name() {
        Some(name) => name
            .to_str()
            .ok_or(StorageError::UnencodableHeader(HeaderError::NameNotUtf8))?,
        None => {
            let name = input_path.display().to_string();
            return Err(StorageError::UnencodableHeader(HeaderError::InvalidName(name)).into());
        }
    };

    let metadata = fs::metadata(input_path)
        .map_err(StorageError::Io)
        .with_context(|| format!("failed to read {}", input_path.display()))?;
    if !metadata.is_file() {
        let err = io::Error::new(io::ErrorKind::InvalidInput, "not a regular file");
        return Err(StorageError::Io(err))
            .with_context(|| format!("cannot save {}", input_path.display()));
    }
    let total_bytes = metadata.len();

    let header = HeaderRecord::new(file_name, total_bytes)
        .and_then(|h| h.to_bytes(geo.chunk_bytes))
        .map_err(StorageError::UnencodableHeader)?;
    let frames = geo.frames_for(total_bytes);

    // Open the input before creating anything on disk.
    let chunks = ChunkReader::open(input_path, geo.chunk_bytes)
        .map_err(StorageError::Io)
        .with_context(|| format!("failed to open {}", input_path.display()))?;

    info!(
        "saving {} ({} bytes) into {} frames at scale {}",
        file_name, total_bytes, frames, geo.scale
    );

    let params = VideoParams {
        fps: cfg.fps,
        width: geo.pixel_width,
        height: geo.pixel_height,
    };

    let written = backend
        .open_write(output_path, &params)
        .and_then(|sink| write_frames(sink, &header, chunks, &geo, total_bytes, frames, cfg));

    match written {
        Ok(()) => {
            info!("save complete: {}", output_path.display());
            Ok(SaveReport {
                file_name: file_name.to_string(),
                total_bytes,
                frames,
            })
        }
        Err(e) => {
            if output_path.exists() {
                if let Err(rm) = fs::remove_file(output_path) {
                    warn!("failed to remove partial video {}: {}", output_path.display(), rm);
                }
            }
            Err(e)
        }
    }
}

fn write_frames<S: FrameSink, R: io::Read>(
    mut sink: S,
    header: &[u8],
    chunks: ChunkReader<R>,
    geo: &FrameGeometry,
    total_bytes: u64,
    frames: u64,
    cfg: &TubeConfig,
) -> Result<()> {
    let progress = frame_bar("Save", frames, cfg.show_progress);

    let header_grid = codec::encode(header, geo).map_err(StorageError::Codec)?;
    sink.write_frame(&codec::to_pixels(&header_grid, geo.scale))
        .context("failed to write header frame")?;
    progress.inc(1);

    let mut bytes_read = 0u64;
    for chunk in chunks {
        let chunk = chunk.map_err(StorageError::Io).context("failed to read input")?;
        bytes_read += chunk.data.len() as u64;

        let grid = codec::encode(&chunk.data, geo).map_err(StorageError::Codec)?;
        sink.write_frame(&codec::to_pixels(&grid, geo.scale))
            .with_context(|| format!("failed to write frame {}", chunk.index + 1))?;
        progress.inc(1);
    }

    if bytes_read != total_bytes {
        let err = io::Error::new(
            io::ErrorKind::InvalidData,
            format!("input changed during save: expected {total_bytes} bytes, read {bytes_read}"),
        );
        return Err(StorageError::Io(err).into());
    }

    sink.finish().context("failed to finalize video")?;
    progress.finish();
    debug!("wrote {} frames", frames);
    Ok(())
}
