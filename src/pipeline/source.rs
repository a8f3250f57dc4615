//! Frame source abstraction for the analysis worker.
//!
//! Provides a unified trait for pulling frames from different producers:
//! a synthetic pattern generator (demo / soak testing) and a raw byte stream
//! of header-prefixed frames (stdin or a capture dump on disk).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, warn};

use crate::config::defaults;
use crate::frame::{FrameLayout, OwnedFrame};

/// Largest single frame a raw stream may declare (8K RGBA is ~132 MiB).
pub const MAX_RAW_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// A frame plus the instant it should be analyzed at.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame: OwnedFrame,
    pub captured_at: Instant,
}

/// Events produced by a frame source.
#[derive(Debug)]
pub enum FrameEvent {
    /// A frame is ready for analysis.
    Frame(CapturedFrame),
    /// Source has no more frames.
    Eof,
}

/// Trait abstracting where frames come from.
///
/// Implementations handle format parsing and pacing internally. The
/// processing loop calls [`next_frame`](FrameSource::next_frame) in a
/// `select!` with cancellation.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Produce the next frame, or `FrameEvent::Eof` when exhausted.
    ///
    /// Returns `Err` only for unrecoverable stream errors.
    async fn next_frame(&mut self) -> Result<FrameEvent>;

    /// Human-readable name for logging (e.g. "synthetic:strobe", "stdin").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Synthetic Source
// ============================================================================

/// What the synthetic generator draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pattern {
    /// Flat mid-grey
    Static,
    /// Centred square alternating bright/dark at `strobe_hz`
    #[default]
    Strobe,
    /// Triangle-wave gradient band drifting left to right
    Scroll,
    /// Scrolling background with a strobing square on top
    Mixed,
}

impl Pattern {
    pub const fn as_str(self) -> &'static str {
        match self {
            Pattern::Static => "static",
            Pattern::Strobe => "strobe",
            Pattern::Scroll => "scroll",
            Pattern::Mixed => "mixed",
        }
    }

    const fn strobes(self) -> bool {
        matches!(self, Pattern::Strobe | Pattern::Mixed)
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Pattern::Static),
            "strobe" => Ok(Pattern::Strobe),
            "scroll" => Ok(Pattern::Scroll),
            "mixed" => Ok(Pattern::Mixed),
            other => Err(format!(
                "unknown pattern '{other}' (expected static, strobe, scroll or mixed)"
            )),
        }
    }
}

/// Parameters for [`SyntheticSource`].
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
    pub duration: Duration,
    pub pattern: Pattern,
    /// Full bright/dark cycles per second for strobing patterns
    pub strobe_hz: f64,
    /// Uniform per-channel noise amplitude (0 = none)
    pub noise: u8,
    /// Sleep between frames to emulate a live capture. When `false`, frames
    /// are stamped on a virtual clock and emitted as fast as possible.
    pub paced: bool,
    /// Fixed RNG seed for reproducible noise
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: defaults::SYNTHETIC_WIDTH,
            height: defaults::SYNTHETIC_HEIGHT,
            fps: defaults::SYNTHETIC_FPS,
            duration: Duration::from_secs(10),
            pattern: Pattern::default(),
            strobe_hz: 5.0,
            noise: 0,
            paced: true,
            seed: None,
        }
    }
}

const STROBE_BRIGHT: u8 = 230;
const STROBE_DARK: u8 = 20;
const STATIC_LEVEL: u8 = 128;

/// Generates RGB frames on the fly.
pub struct SyntheticSource {
    config: SyntheticConfig,
    name: String,
    total_frames: u64,
    emitted: u64,
    interval: Duration,
    started_at: Option<Instant>,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let fps = config.fps.max(1);
        let total_frames = (config.duration.as_secs_f64() * f64::from(fps)).round() as u64;
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            name: format!("synthetic:{}", config.pattern),
            interval: Duration::from_secs(1) / fps,
            total_frames,
            emitted: 0,
            started_at: None,
            rng,
            config,
        }
    }

    pub const fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Strobe level for frame `index`: two phases per cycle.
    fn strobe_level(&self, index: u64) -> u8 {
        let fps = f64::from(self.config.fps.max(1));
        let phase = (index as f64 * 2.0 * self.config.strobe_hz / fps).floor() as u64;
        if phase % 2 == 0 {
            STROBE_BRIGHT
        } else {
            STROBE_DARK
        }
    }

    /// Grey level of the scroll band at column `x` for frame `index`.
    ///
    /// A triangle wave one frame-width long, drifting a quarter width per
    /// second, so any fixed point changes slowly.
    fn scroll_level(&self, x: usize, index: u64) -> u8 {
        let width = self.config.width.max(1) as f64;
        let seconds = index as f64 / f64::from(self.config.fps.max(1));
        let offset = seconds * width / 4.0;
        let position = ((x as f64 + offset) % width) / width;
        let triangle = 1.0 - (2.0 * position - 1.0).abs();
        (triangle * 255.0).round() as u8
    }

    fn render(&mut self, index: u64) -> OwnedFrame {
        let SyntheticConfig {
            width,
            height,
            pattern,
            noise,
            ..
        } = self.config;

        let side = width.min(height) / 2;
        let (sx, sy) = ((width - side) / 2, (height - side) / 2);
        let strobe = pattern.strobes().then(|| self.strobe_level(index));

        let mut frame = OwnedFrame::solid(width, height, STATIC_LEVEL);
        let row_stride = frame.layout.row_stride;
        for y in 0..height {
            for x in 0..width {
                let base = match pattern {
                    Pattern::Static => STATIC_LEVEL,
                    Pattern::Strobe => STROBE_DARK,
                    Pattern::Scroll | Pattern::Mixed => self.scroll_level(x, index),
                };
                let in_square = (sx..sx + side).contains(&x) && (sy..sy + side).contains(&y);
                let level = match strobe {
                    Some(level) if in_square => level,
                    _ => base,
                };
                let offset = y * row_stride + x * 3;
                for byte in &mut frame.data[offset..offset + 3] {
                    *byte = if noise == 0 {
                        level
                    } else {
                        let jitter = self.rng.gen_range(-i16::from(noise)..=i16::from(noise));
                        (i16::from(level) + jitter).clamp(0, 255) as u8
                    };
                }
            }
        }
        frame
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn next_frame(&mut self) -> Result<FrameEvent> {
        if self.emitted >= self.total_frames {
            return Ok(FrameEvent::Eof);
        }
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        let index = self.emitted;
        let scheduled = started_at + self.interval * u32::try_from(index).unwrap_or(u32::MAX);

        let captured_at = if self.config.paced {
            tokio::time::sleep_until(scheduled.into()).await;
            Instant::now()
        } else {
            scheduled
        };

        let frame = self.render(index);
        self.emitted += 1;
        Ok(FrameEvent::Frame(CapturedFrame { frame, captured_at }))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Raw Frame Source (header line + pixel bytes)
// ============================================================================

/// Reads header-prefixed raw frames from any async byte stream.
///
/// Each frame is one JSON line describing a [`FrameLayout`], e.g.
/// `{"width":640,"height":360,"row_stride":1920,"pixel_stride":3}`,
/// followed by exactly `row_stride * height` bytes of pixel data.
pub struct RawFrameSource<R> {
    reader: BufReader<R>,
    name: String,
    header: String,
    frames_read: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> RawFrameSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(reader),
            name: name.into(),
            header: String::with_capacity(256),
            frames_read: 0,
        }
    }

    pub const fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Parse one header line into a layout and payload size.
    fn parse_header(&self, line: &str) -> Result<(FrameLayout, usize)> {
        let layout: FrameLayout = serde_json::from_str(line).with_context(|| {
            format!("Invalid frame header after {} frames", self.frames_read)
        })?;
        let len = layout
            .buffer_len()
            .context("Frame header geometry overflows")?;
        if len > MAX_RAW_FRAME_BYTES {
            bail!(
                "Frame header declares {} bytes (limit {})",
                len,
                MAX_RAW_FRAME_BYTES
            );
        }
        Ok((layout, len))
    }
}

impl RawFrameSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin(), "stdin")
    }
}

impl RawFrameSource<tokio::fs::File> {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open frame file {}", path.display()))?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send + 'static> FrameSource for RawFrameSource<R> {
    async fn next_frame(&mut self) -> Result<FrameEvent> {
        let line = loop {
            self.header.clear();
            let bytes = self
                .reader
                .read_line(&mut self.header)
                .await
                .context("Failed to read frame header")?;
            if bytes == 0 {
                return Ok(FrameEvent::Eof);
            }
            let line = self.header.trim();
            if !line.is_empty() {
                break line.to_string();
            }
        };

        let (layout, len) = self.parse_header(&line)?;
        let mut data = vec![0u8; len];
        if let Err(e) = self.reader.read_exact(&mut data).await {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                warn!(
                    source = %self.name,
                    frames = self.frames_read,
                    "Stream ended inside a frame payload, discarding partial frame"
                );
                return Ok(FrameEvent::Eof);
            }
            return Err(e).context("Failed to read frame payload");
        }

        self.frames_read += 1;
        debug!(
            width = layout.width,
            height = layout.height,
            bytes = len,
            "Raw frame read"
        );
        Ok(FrameEvent::Frame(CapturedFrame {
            frame: OwnedFrame::new(layout, data),
            captured_at: Instant::now(),
        }))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
