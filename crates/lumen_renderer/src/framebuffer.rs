//! Shared RGBA float framebuffer.
//!
//! Pixels are stored as `f32` bit patterns in atomics so render bands can
//! write while other threads read a snapshot, without locks and without
//! `unsafe`. Bands write disjoint rows; relaxed ordering is enough because
//! a finished frame is published by joining the band tasks.

use crate::Color;
use std::sync::atomic::{AtomicU32, Ordering};

/// Channels per pixel: R, G, B, A.
pub const CHANNELS: usize = 4;

/// Row-major RGBA32F image, row 0 at the bottom.
pub struct Framebuffer {
    width: u32,
    height: u32,
    data: Box<[AtomicU32]>,
}

impl Framebuffer {
    /// Create a buffer of `width * height` transparent black pixels.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * CHANNELS;
        let data = (0..len).map(|_| AtomicU32::new(0)).collect();
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Offset of the red channel of pixel `(row, col)`.
    #[inline]
    pub fn offset(&self, row: u32, col: u32) -> usize {
        (row as usize * self.width as usize + col as usize) * CHANNELS
    }

    /// Write an opaque pixel.
    pub fn set_pixel(&self, row: u32, col: u32, color: Color) {
        let base = self.offset(row, col);
        let rgba = [color.x, color.y, color.z, 1.0];
        for (slot, value) in self.data[base..base + CHANNELS].iter().zip(rgba) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Read pixel `(row, col)` as RGBA.
    pub fn pixel(&self, row: u32, col: u32) -> [f32; 4] {
        let base = self.offset(row, col);
        let mut rgba = [0.0; 4];
        for (value, slot) in rgba.iter_mut().zip(&self.data[base..base + CHANNELS]) {
            *value = f32::from_bits(slot.load(Ordering::Relaxed));
        }
        rgba
    }

    /// Copy of the whole buffer as interleaved RGBA floats.
    pub fn snapshot(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
            .collect()
    }

    /// Reset every channel to zero.
    pub fn clear(&self) {
        for slot in self.data.iter() {
            slot.store(0, Ordering::Relaxed);
        }
    }

    /// Number of pixels written since the last clear (alpha set).
    pub fn written_pixels(&self) -> usize {
        self.data
            .chunks_exact(CHANNELS)
            .filter(|px| f32::from_bits(px[3].load(Ordering::Relaxed)) == 1.0)
            .count()
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
