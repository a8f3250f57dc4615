//! Luminance Sampler - mean perceptual luminance of one grid cell
//!
//! Reads an `S × S` lattice of points inside a cell and averages
//! `L = 0.299R + 0.587G + 0.114B` over the points the buffer can actually
//! address. Capture buffers may be a few bytes shorter than their declared
//! geometry near the end of the backing store, so unaddressable points are
//! skipped rather than treated as errors.

use crate::frame::FrameView;

/// Rec. 601 luma weights.
const RED_WEIGHT: f64 = 0.299;
const GREEN_WEIGHT: f64 = 0.587;
const BLUE_WEIGHT: f64 = 0.114;

/// Perceptual luminance of one pixel on a 0-255 scale.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    RED_WEIGHT * f64::from(r) + GREEN_WEIGHT * f64::from(g) + BLUE_WEIGHT * f64::from(b)
}

/// Rectangular region of a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl CellRect {
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Samples cells on a fixed `samples_per_axis × samples_per_axis` lattice.
#[derive(Debug, Clone, Copy)]
pub struct LuminanceSampler {
    samples_per_axis: usize,
}

impl LuminanceSampler {
    pub const fn new(samples_per_axis: usize) -> Self {
        Self { samples_per_axis }
    }

    pub const fn samples_per_axis(&self) -> usize {
        self.samples_per_axis
    }

    /// Mean luminance of the cell, or `None` when no sample point is addressable.
    ///
    /// Sample coordinates are `start + (extent / S) * i`, so cells smaller
    /// than `S` pixels collapse their lattice onto the cell origin.
    pub fn sample(&self, frame: &FrameView<'_>, cell: CellRect) -> Option<f64> {
        if cell.is_empty() || self.samples_per_axis == 0 {
            return None;
        }

        let step_x = cell.width / self.samples_per_axis;
        let step_y = cell.height / self.samples_per_axis;

        let mut total = 0.0;
        let mut count = 0usize;

        for sy in 0..self.samples_per_axis {
            let Some(y) = step_y.checked_mul(sy).and_then(|d| cell.y.checked_add(d)) else {
                continue;
            };
            for sx in 0..self.samples_per_axis {
                let Some(x) = step_x.checked_mul(sx).and_then(|d| cell.x.checked_add(d)) else {
                    continue;
                };
                if let Some((r, g, b)) = frame.rgb_at(x, y) {
                    total += luminance(r, g, b);
                    count += 1;
                }
            }
        }

        if count == 0 {
            None
        } else {
            Some(total / count as f64)
        }
    }
}
