//! Conversion between byte spans, bit grids and pixel frames.
//!
//! Bytes are laid into the grid MSB-first in row-major order. Everything here
//! is pure; reading and writing actual video lives in [`crate::video`].

pub mod pixels;

use thiserror::Error;

use crate::config::FrameGeometry;

pub use pixels::{from_pixels, to_pixels, Frame};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("{len} bytes exceed the {capacity}-byte frame capacity")]
    Overflow { len: usize, capacity: usize },
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("{width}x{height} frame is smaller than the {grid_width}x{grid_height} grid")]
    FrameTooSmall {
        width: u32,
        height: u32,
        grid_width: u32,
        grid_height: u32,
    },
}

/// How many bytes to unpack from a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteLimit {
    /// Every whole byte the grid can hold.
    Frame,
    /// At most this many bytes; used for the zero-padded final frame.
    Bytes(usize),
}

/// A `height x width` matrix of 0/1 cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitGrid {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl BitGrid {
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.bits[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, bit: bool) {
        let idx = y as usize * self.width as usize + x as usize;
        self.bits[idx] = bit as u8;
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// Whole bytes this grid can carry.
    pub fn byte_capacity(&self) -> usize {
        self.bits.len() / 8
    }
}

/// Lay `data` into a fresh grid, zero-padding the remainder.
pub fn encode(data: &[u8], geo: &FrameGeometry) -> Result<BitGrid, CodecError> {
    if data.len() > geo.chunk_bytes {
        return Err(CodecError::Overflow {
            len: data.len(),
            capacity: geo.chunk_bytes,
        });
    }

    let mut grid = BitGrid::zeroed(geo.width, geo.height);
    for (cells, &byte) in grid.bits.chunks_exact_mut(8).zip(data) {
        for (bit_pos, cell) in cells.iter_mut().enumerate() {
            *cell = (byte >> (7 - bit_pos)) & 1; // MSB first
        }
    }
    Ok(grid)
}

/// Pack grid cells back into bytes, stopping at `limit`.
pub fn decode(grid: &BitGrid, limit: ByteLimit) -> Vec<u8> {
    let capacity = grid.byte_capacity();
    let len = match limit {
        ByteLimit::Frame => capacity,
        ByteLimit::Bytes(n) => n.min(capacity),
    };

    grid.bits
        .chunks_exact(8)
        .take(len)
        .map(|cells| cells.iter().fold(0u8, |acc, &bit| (acc << 1) | bit))
        .collect()
}
