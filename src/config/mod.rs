use thiserror::Error;

// Video parameters
pub const BASE_FRAME_WIDTH: u32 = 1280;
pub const BASE_FRAME_HEIGHT: u32 = 720;
pub const DEFAULT_SCALE_FACTOR: u32 = 4;
pub const DEFAULT_FPS: u32 = 20;

// Decode parameters
pub const DEFAULT_WORKERS: usize = 2;

/// Luma values strictly above this are read as a set bit.
pub const BINARIZE_THRESHOLD: u32 = 128;

pub const PIXEL_ON: u8 = 255;
pub const PIXEL_OFF: u8 = 0;
pub const BYTES_PER_PIXEL: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("scale factor must be positive")]
    ZeroScale,
    #[error("scale factor {scale} leaves a {width}x{height} grid with no byte capacity")]
    NoCapacity { scale: u32, width: u32, height: u32 },
}

/// Logical grid and pixel dimensions derived from a scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub scale: u32,
    /// Logical grid width in cells.
    pub width: u32,
    /// Logical grid height in cells.
    pub height: u32,
    /// Payload bytes carried by one full frame.
    pub chunk_bytes: usize,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl FrameGeometry {
    pub fn from_scale(scale: u32) -> Result<Self, GeometryError> {
        if scale == 0 {
            return Err(GeometryError::ZeroScale);
        }

        let width = BASE_FRAME_WIDTH / scale;
        let height = BASE_FRAME_HEIGHT / scale;
        let chunk_bytes = width as usize * height as usize / 8;
        if chunk_bytes == 0 {
            return Err(GeometryError::NoCapacity {
                scale,
                width,
                height,
            });
        }

        Ok(Self {
            scale,
            width,
            height,
            chunk_bytes,
            pixel_width: width * scale,
            pixel_height: height * scale,
        })
    }

    /// Number of cells in the logical grid.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of one RGB24 frame in bytes.
    pub fn frame_len(&self) -> usize {
        self.pixel_width as usize * self.pixel_height as usize * BYTES_PER_PIXEL
    }

    /// Total frames needed for a file of `file_size` bytes, header included.
    pub fn frames_for(&self, file_size: u64) -> u64 {
        1 + file_size.div_ceil(self.chunk_bytes as u64)
    }

    /// Meaningful bytes in the final payload frame of a `frame_count`-frame
    /// video declaring `total_bytes`, or `None` when the two disagree.
    ///
    /// `total - chunk * (frames - 2)` must land in `1..=chunk_bytes`.
    pub fn last_frame_size(&self, total_bytes: u64, frame_count: u64) -> Option<usize> {
        let full_frames = frame_count.checked_sub(2)?;
        let full_bytes = (self.chunk_bytes as u64).checked_mul(full_frames)?;
        let last = total_bytes.checked_sub(full_bytes)?;
        if last == 0 || last > self.chunk_bytes as u64 {
            return None;
        }
        Some(last as usize)
    }
}

/// Runtime configuration for a save/load operation.
#[derive(Debug, Clone)]
pub struct TubeConfig {
    pub scale_factor: u32,
    pub fps: u32,
    /// Requested decode workers; clamped to the number of payload frames and
    /// to the available parallelism.
    pub workers: usize,
    pub show_progress: bool,
}

impl TubeConfig {
    pub fn geometry(&self) -> Result<FrameGeometry, GeometryError> {
        FrameGeometry::from_scale(self.scale_factor)
    }
}

/// Default worker count, bounded by the threads rayon would use.
pub fn default_workers() -> usize {
    rayon::current_num_threads().clamp(1, DEFAULT_WORKERS)
}

impl Default for TubeConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            fps: DEFAULT_FPS,
            workers: default_workers(),
            show_progress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let geo = FrameGeometry::from_scale(DEFAULT_SCALE_FACTOR).unwrap();
        assert_eq!(geo.width, 320);
        assert_eq!(geo.height, 180);
        assert_eq!(geo.chunk_bytes, 7200);
        assert_eq!(geo.pixel_width, 1280);
        assert_eq!(geo.pixel_height, 720);
    }

    #[test]
    fn test_uneven_scale_truncates_pixels() {
        let geo = FrameGeometry::from_scale(7).unwrap();
        assert_eq!(geo.width, 182);
        assert_eq!(geo.height, 102);
        // 18564 cells, the trailing 4 bits carry nothing
        assert_eq!(geo.chunk_bytes, 2320);
        assert_eq!(geo.pixel_width, 1274);
        assert_eq!(geo.pixel_height, 714);
    }

    #[test]
    fn test_zero_scale_rejected() {
        assert_eq!(FrameGeometry::from_scale(0), Err(GeometryError::ZeroScale));
    }

    #[test]
    fn test_oversized_scale_rejected() {
        assert!(matches!(
            FrameGeometry::from_scale(721),
            Err(GeometryError::NoCapacity { height: 0, .. })
        ));
        // 2x1 grid still has no whole byte
        assert!(matches!(
            FrameGeometry::from_scale(640),
            Err(GeometryError::NoCapacity { .. })
        ));
    }

    #[test]
    fn test_frames_for() {
        let geo = FrameGeometry::from_scale(4).unwrap();
        assert_eq!(geo.frames_for(0), 1);
        assert_eq!(geo.frames_for(1), 2);
        assert_eq!(geo.frames_for(7200), 2);
        assert_eq!(geo.frames_for(7201), 3);
        assert_eq!(geo.frames_for(3 * 7200), 4);
    }

    #[test]
    fn test_last_frame_size() {
        let geo = FrameGeometry::from_scale(4).unwrap();
        assert_eq!(geo.last_frame_size(1, 2), Some(1));
        assert_eq!(geo.last_frame_size(7200, 2), Some(7200));
        assert_eq!(geo.last_frame_size(3 * 7200, 4), Some(7200));
        assert_eq!(geo.last_frame_size(2 * 7200 + 5, 4), Some(5));
    }

    #[test]
    fn test_last_frame_size_agrees_with_frames_for() {
        let geo = FrameGeometry::from_scale(16).unwrap();
        let chunk = geo.chunk_bytes as u64;
        for size in [1, 2, chunk - 1, chunk, chunk + 1, 5 * chunk, 5 * chunk + 17] {
            let frames = geo.frames_for(size);
            let last = geo.last_frame_size(size, frames).unwrap() as u64;
            assert!((1..=chunk).contains(&last));
            assert_eq!(chunk * (frames - 2) + last, size);
        }
    }

    #[test]
    fn test_last_frame_size_inconsistent() {
        let geo = FrameGeometry::from_scale(4).unwrap();
        // header only, or nothing to put in the final frame
        assert_eq!(geo.last_frame_size(0, 1), None);
        assert_eq!(geo.last_frame_size(0, 2), None);
        assert_eq!(geo.last_frame_size(7200, 3), None);
        // more bytes than the frames can hold
        assert_eq!(geo.last_frame_size(7201, 2), None);
        assert_eq!(geo.last_frame_size(u64::MAX, u64::MAX), None);
    }
}
