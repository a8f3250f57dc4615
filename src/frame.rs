//! Frame Model - borrowed and owned pixel buffers handed over by the capture layer
//!
//! A [`FrameView`] borrows the capture layer's bytes for exactly one engine
//! call, so the engine can never retain a pooled buffer past that call.
//! [`OwnedFrame`] is what frame sources produce; it lends out views.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum bytes per pixel: one byte each for the three colour channels.
pub const MIN_PIXEL_STRIDE: usize = 3;

/// Byte order of the first three channels of each pixel.
///
/// Any trailing channel (alpha, padding) is ignored; only the pixel stride
/// has to account for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// R, G, B (also RGBA / RGBX)
    #[default]
    Rgb,
    /// B, G, R (also BGRA / BGRX)
    Bgr,
}

impl ChannelOrder {
    /// Byte offsets of the (red, green, blue) channels within a pixel.
    pub const fn offsets(self) -> (usize, usize, usize) {
        match self {
            ChannelOrder::Rgb => (0, 1, 2),
            ChannelOrder::Bgr => (2, 1, 0),
        }
    }
}

impl std::fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelOrder::Rgb => write!(f, "rgb"),
            ChannelOrder::Bgr => write!(f, "bgr"),
        }
    }
}

/// Frame geometry, independent of the pixel bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub width: usize,
    pub height: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
    #[serde(default)]
    pub channel_order: ChannelOrder,
}

impl FrameLayout {
    /// Tightly packed layout: `row_stride = width * pixel_stride`.
    pub const fn packed(width: usize, height: usize, pixel_stride: usize) -> Self {
        Self {
            width,
            height,
            row_stride: width * pixel_stride,
            pixel_stride,
            channel_order: ChannelOrder::Rgb,
        }
    }

    /// Bytes a source must deliver for one frame of this layout.
    pub fn buffer_len(&self) -> Option<usize> {
        self.row_stride.checked_mul(self.height)
    }

    /// Smallest buffer that still reaches the first pixel of the last row.
    ///
    /// Anything shorter cannot address the declared geometry at all; anything
    /// at least this long is analyzable with edge points skipped.
    fn min_addressable_len(&self) -> Option<usize> {
        self.row_stride
            .checked_mul(self.height.saturating_sub(1))?
            .checked_add(MIN_PIXEL_STRIDE)
    }

    /// Check the geometry against a buffer of `len` bytes.
    pub fn validate(&self, len: usize) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::EmptyGeometry {
                width: self.width,
                height: self.height,
            });
        }
        if self.pixel_stride < MIN_PIXEL_STRIDE {
            return Err(FrameError::PixelStrideTooSmall(self.pixel_stride));
        }
        let min_row = self
            .width
            .checked_mul(self.pixel_stride)
            .ok_or(FrameError::GeometryOverflow)?;
        if self.row_stride < min_row {
            return Err(FrameError::RowStrideTooSmall {
                row_stride: self.row_stride,
                required: min_row,
            });
        }
        let required = self
            .min_addressable_len()
            .ok_or(FrameError::GeometryOverflow)?;
        if len < required {
            return Err(FrameError::BufferTooSmall { len, required });
        }
        Ok(())
    }
}

/// Reasons a frame cannot be analyzed at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame has empty geometry ({width}x{height})")]
    EmptyGeometry { width: usize, height: usize },

    #[error("Pixel stride {0} is smaller than 3 colour channels")]
    PixelStrideTooSmall(usize),

    #[error("Row stride {row_stride} is smaller than width * pixel_stride ({required})")]
    RowStrideTooSmall { row_stride: usize, required: usize },

    #[error("Buffer of {len} bytes cannot address declared geometry (need at least {required})")]
    BufferTooSmall { len: usize, required: usize },

    #[error("Frame geometry overflows addressable memory")]
    GeometryOverflow,
}

/// A frame borrowed from the capture layer for the duration of one call.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    layout: FrameLayout,
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub const fn new(layout: FrameLayout, data: &'a [u8]) -> Self {
        Self { layout, data }
    }

    pub const fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub const fn width(&self) -> usize {
        self.layout.width
    }

    pub const fn height(&self) -> usize {
        self.layout.height
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        self.layout.validate(self.data.len())
    }

    /// Red, green and blue bytes of the pixel at (x, y).
    ///
    /// Returns `None` when any of the three bytes lies outside the buffer,
    /// including when the offset arithmetic itself would overflow.
    pub fn rgb_at(&self, x: usize, y: usize) -> Option<(u8, u8, u8)> {
        let base = y
            .checked_mul(self.layout.row_stride)?
            .checked_add(x.checked_mul(self.layout.pixel_stride)?)?;
        let (r, g, b) = self.layout.channel_order.offsets();
        let px = self.data.get(base..base.checked_add(MIN_PIXEL_STRIDE)?)?;
        Some((px[r], px[g], px[b]))
    }
}

/// A frame that owns its bytes (produced by frame sources).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub layout: FrameLayout,
    pub data: Vec<u8>,
}

impl OwnedFrame {
    pub const fn new(layout: FrameLayout, data: Vec<u8>) -> Self {
        Self { layout, data }
    }

    /// Packed RGB frame filled with a single grey level.
    pub fn solid(width: usize, height: usize, level: u8) -> Self {
        let layout = FrameLayout::packed(width, height, 3);
        Self {
            layout,
            data: vec![level; width * height * 3],
        }
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView::new(self.layout, &self.data)
    }
}
