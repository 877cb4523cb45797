use crate::codec::{BitGrid, CodecError};
use crate::config::{FrameGeometry, BINARIZE_THRESHOLD, BYTES_PER_PIXEL, PIXEL_OFF, PIXEL_ON};

/// An RGB24 image, row-major, three bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CodecError> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(CodecError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Luma scaled by 1000 (BT.601 weights).
    fn luma_milli(&self, offset: usize) -> u64 {
        let px = &self.data[offset..offset + BYTES_PER_PIXEL];
        299 * px[0] as u64 + 587 * px[1] as u64 + 114 * px[2] as u64
    }
}

/// Upscale a grid by nearest-neighbour: every cell becomes a `scale x scale`
/// block of white (1) or black (0).
pub fn to_pixels(grid: &BitGrid, scale: u32) -> Frame {
    let scale = scale as usize;
    let width = grid.width() as usize * scale;
    let height = grid.height() as usize * scale;
    let row_len = width * BYTES_PER_PIXEL;
    let block_len = scale * BYTES_PER_PIXEL;
    let mut data = vec![PIXEL_OFF; row_len * height];

    for gy in 0..grid.height() {
        let first_row = gy as usize * scale * row_len;
        let row = &mut data[first_row..first_row + row_len];
        for gx in 0..grid.width() {
            if grid.get(gx, gy) == 1 {
                let start = gx as usize * block_len;
                row[start..start + block_len].fill(PIXEL_ON);
            }
        }
        for r in 1..scale {
            data.copy_within(first_row..first_row + row_len, first_row + r * row_len);
        }
    }

    Frame {
        width: width as u32,
        height: height as u32,
        data,
    }
}

/// Map each pixel coordinate onto the grid cell covering it.
fn cell_index(pixels: u32, cells: u32) -> Vec<usize> {
    let (pixels, cells) = (pixels as usize, cells as usize);
    (0..pixels).map(|p| p * cells / pixels).collect()
}

/// Downscale a frame onto the logical grid and binarize it.
///
/// Each cell averages the luma of every pixel it covers, so frames at any
/// resolution at least as large as the grid are accepted. A cell is 1 when its
/// average is above [`BINARIZE_THRESHOLD`].
pub fn from_pixels(frame: &Frame, geo: &FrameGeometry) -> Result<BitGrid, CodecError> {
    let expected = frame.width as usize * frame.height as usize * BYTES_PER_PIXEL;
    if frame.data.len() != expected {
        return Err(CodecError::BufferSize {
            expected,
            actual: frame.data.len(),
        });
    }
    if frame.width < geo.width || frame.height < geo.height {
        return Err(CodecError::FrameTooSmall {
            width: frame.width,
            height: frame.height,
            grid_width: geo.width,
            grid_height: geo.height,
        });
    }

    let cols = cell_index(frame.width, geo.width);
    let rows = cell_index(frame.height, geo.height);
    let mut sums = vec![0u64; geo.cells()];
    let mut counts = vec![0u64; geo.cells()];

    let mut offset = 0;
    for &cy in &rows {
        let row_base = cy * geo.width as usize;
        for &cx in &cols {
            let cell = row_base + cx;
            sums[cell] += frame.luma_milli(offset);
            counts[cell] += 1;
            offset += BYTES_PER_PIXEL;
        }
    }

    let threshold = BINARIZE_THRESHOLD as u64 * 1000;
    let mut grid = BitGrid::zeroed(geo.width, geo.height);
    for y in 0..geo.height {
        for x in 0..geo.width {
            let cell = y as usize * geo.width as usize + x as usize;
            grid.set(x, y, sums[cell] > threshold * counts[cell]);
        }
    }
    Ok(grid)
}
