//! Detection Scenario Tests
//!
//! Drive the flash detection engine with scripted luminance sequences on a
//! virtual clock and check which frames trigger.

use flash_guard::config::DetectionConfig;
use flash_guard::detection::{
    CellRect, FlashDetected, FlashDetectionEngine, LuminanceSampler, OscillationThresholds,
    RegionTracker, Verdict,
};
use flash_guard::frame::{ChannelOrder, FrameLayout, FrameView, OwnedFrame};
use std::time::{Duration, Instant};

const SIZE: usize = 64;

fn engine(grid_size: usize) -> FlashDetectionEngine {
    FlashDetectionEngine::new(DetectionConfig {
        grid_size,
        ..DetectionConfig::default()
    })
}

/// Feed one solid frame per level, `step` apart, returning (frame index, event).
fn feed(
    engine: &mut FlashDetectionEngine,
    t0: Instant,
    levels: &[u8],
    step: Duration,
) -> Vec<(usize, FlashDetected)> {
    let mut events = Vec::new();
    for (i, &level) in levels.iter().enumerate() {
        let frame = OwnedFrame::solid(SIZE, SIZE, level);
        let now = t0 + step * i as u32;
        events.extend(engine.analyze_at(&frame.view(), now).into_iter().map(|e| (i, e)));
    }
    events
}

/// Square wave: bright/dark phases of `1 / (2 * hz)` seconds sampled at `fps`.
fn square_wave(hz: u32, fps: u32, frames: u32) -> Vec<u8> {
    (0..frames)
        .map(|n| if (n * 2 * hz / fps) % 2 == 0 { 220 } else { 30 })
        .collect()
}

/// Frame of `SIZE` with the given cells of a `grid` grid set to `level`.
fn frame_with_cells(
    grid: usize,
    cells: &[(usize, usize)],
    level: u8,
    background: u8,
) -> OwnedFrame {
    let mut frame = OwnedFrame::solid(SIZE, SIZE, background);
    let cell = SIZE / grid;
    let stride = frame.layout.row_stride;
    for &(row, col) in cells {
        for y in row * cell..(row + 1) * cell {
            for x in col * cell..(col + 1) * cell {
                let offset = y * stride + x * 3;
                frame.data[offset..offset + 3].fill(level);
            }
        }
    }
    frame
}

// ============================================================================
// Reference Scenarios
// ============================================================================

#[test]
fn alternating_200_10_at_100ms_fires_once_then_clears() {
    let mut engine = engine(1);
    let t0 = Instant::now();
    let levels: Vec<u8> = (0..10).map(|i| if i % 2 == 0 { 200 } else { 10 }).collect();

    let events = feed(&mut engine, t0, &levels[..8], Duration::from_millis(100));
    assert_eq!(events.len(), 1, "expected exactly one trigger: {events:?}");
    let (index, event) = events[0];
    assert_eq!(index, 7);
    assert_eq!(event.timestamp, t0 + Duration::from_millis(700));
    assert_eq!(event.reversal_count, 6);
    assert_eq!((event.cell_row, event.cell_col), (0, 0));
    assert_eq!(engine.region(0, 0).map(RegionTracker::reversal_count), Some(0));

    // the two remaining frames only rebuild history
    let rest = feed(
        &mut engine,
        t0 + Duration::from_millis(800),
        &levels[8..],
        Duration::from_millis(100),
    );
    assert!(rest.is_empty());
    assert_eq!(engine.region(0, 0).map(RegionTracker::reversal_count), Some(2));
}

#[test]
fn alternating_200_10_on_8x8_fires_every_cell_on_eighth_frame() {
    let mut engine = engine(8);
    let t0 = Instant::now();
    let levels: Vec<u8> = (0..8).map(|i| if i % 2 == 0 { 200 } else { 10 }).collect();

    let events = feed(&mut engine, t0, &levels, Duration::from_millis(100));
    assert_eq!(events.len(), 64);
    assert!(events.iter().all(|(index, _)| *index == 7));
    for row in 0..8 {
        for col in 0..8 {
            assert_eq!(engine.region(row, col).map(RegionTracker::reversal_count), Some(0));
        }
    }
}

#[test]
fn ramp_10_to_150_on_8x8_never_triggers() {
    let mut engine = engine(8);
    let ramp: Vec<u8> = (0..8).map(|i| 10 + 20 * i).collect();
    assert_eq!(ramp, [10, 30, 50, 70, 90, 110, 130, 150]);

    let events = feed(&mut engine, Instant::now(), &ramp, Duration::from_millis(100));
    assert!(events.is_empty());
    for row in 0..8 {
        for col in 0..8 {
            let region = engine.region(row, col).expect("cell exists");
            assert_eq!(region.reversal_count(), 0);
        }
    }
}

#[test]
fn six_slow_reversals_then_a_fast_one_never_trigger_on_8x8() {
    let mut engine = engine(8);
    let t0 = Instant::now();
    let ms = Duration::from_millis;

    // prime at 0, direction at 900, reversals at 1800..=6300 then 6500
    let mut times: Vec<u64> = (0..8).map(|i| i * 900).collect();
    times.push(6500);

    let mut events = Vec::new();
    for (i, &t) in times.iter().enumerate() {
        let level = if i % 2 == 0 { 200 } else { 10 };
        let frame = OwnedFrame::solid(SIZE, SIZE, level);
        events.extend(engine.analyze_at(&frame.view(), t0 + ms(t)));
    }

    assert!(events.is_empty(), "{events:?}");
    let kept: Vec<Instant> = engine
        .region(0, 0)
        .expect("cell exists")
        .reversal_timestamps()
        .copied()
        .collect();
    assert_eq!(kept, vec![t0 + ms(6300), t0 + ms(6500)]);
}

#[test]
fn monotonic_ramp_never_triggers() {
    let mut engine = engine(1);
    let ramp = [0u8, 60, 120, 180, 240, 250, 255];
    let events = feed(&mut engine, Instant::now(), &ramp, Duration::from_millis(50));
    assert!(events.is_empty());
    assert_eq!(engine.region(0, 0).map(RegionTracker::reversal_count), Some(0));
}

#[test]
fn sub_threshold_oscillation_never_triggers() {
    let mut engine = engine(1);
    let levels: Vec<u8> = (0..60).map(|i| if i % 2 == 0 { 100 } else { 140 }).collect();
    let events = feed(&mut engine, Instant::now(), &levels, Duration::from_secs(1) / 30);
    assert!(events.is_empty());
}

#[test]
fn three_hz_square_wave_triggers() {
    let mut engine = engine(1);
    let levels = square_wave(3, 30, 60);
    let events = feed(&mut engine, Instant::now(), &levels, Duration::from_secs(1) / 30);
    assert!(!events.is_empty(), "3 Hz strobe must be detected");
}

/// 2.5 Hz sits on the window edge: the first counted reversal is exactly
/// one window old when the sixth lands, and is kept.
#[test]
fn two_and_a_half_hz_fires_on_inclusive_window_edge() {
    let mut engine = engine(1);
    let t0 = Instant::now();
    let levels: Vec<u8> = (0..8).map(|i| if i % 2 == 0 { 220 } else { 30 }).collect();

    let events = feed(&mut engine, t0, &levels, Duration::from_millis(200));
    assert_eq!(events.len(), 1, "{events:?}");
    let (index, event) = events[0];
    assert_eq!(index, 7);
    assert_eq!(event.timestamp, t0 + Duration::from_millis(1400));
    assert_eq!(event.reversal_count, 6);
}

#[test]
fn two_hz_and_slower_square_waves_never_trigger() {
    for hz in [1, 2] {
        let mut engine = engine(1);
        let levels = square_wave(hz, 30, 150);
        let events = feed(&mut engine, Instant::now(), &levels, Duration::from_secs(1) / 30);
        assert!(events.is_empty(), "{hz} Hz must not trigger: {events:?}");
    }
}

#[test]
fn aged_out_reversals_are_excluded() {
    let thresholds = OscillationThresholds::default();
    let mut tracker = RegionTracker::new();
    let t0 = Instant::now();
    let ms = Duration::from_millis;

    // toggles every 900 ms: reversals at 1800, 2700, 3600
    for (i, t) in [0u64, 900, 1800, 2700, 3600].into_iter().enumerate() {
        let level = if i % 2 == 0 { 200.0 } else { 20.0 };
        assert!(!tracker.update(level, t0 + ms(t), &thresholds).is_flashing());
    }
    assert_eq!(tracker.reversal_count(), 2);

    // +200 ms: the 2700 ms reversal is now 1100 ms old
    assert!(!tracker.update(20.0, t0 + ms(3800), &thresholds).is_flashing());
    let kept: Vec<Instant> = tracker.reversal_timestamps().copied().collect();
    assert_eq!(kept, vec![t0 + ms(3600), t0 + ms(3800)]);
}

#[test]
fn first_sample_only_primes() {
    let mut tracker = RegionTracker::new();
    let verdict = tracker.update(120.0, Instant::now(), &OscillationThresholds::default());
    assert_eq!(verdict, Verdict::Primed);
    assert_eq!(tracker.previous_luminance(), Some(120.0));
    assert!(tracker.last_direction().is_none());
}

// ============================================================================
// Grid Behaviour
// ============================================================================

#[test]
fn strobing_cell_does_not_affect_neighbours() {
    let mut engine = engine(2);
    let t0 = Instant::now();
    let step = Duration::from_millis(100);

    let mut events = Vec::new();
    for i in 0..8u32 {
        let level = if i % 2 == 0 { 220 } else { 20 };
        let frame = frame_with_cells(2, &[(1, 0)], level, 90);
        events.extend(engine.analyze_at(&frame.view(), t0 + step * i));
    }

    assert_eq!(events.len(), 1);
    assert_eq!((events[0].cell_row, events[0].cell_col), (1, 0));
    for (row, col) in [(0, 0), (0, 1), (1, 1)] {
        let region = engine.region(row, col).expect("cell exists");
        assert_eq!(region.reversal_count(), 0);
        assert!(region.last_direction().is_none());
    }
}

#[test]
fn independent_cells_fire_in_the_same_frame() {
    let mut engine = engine(2);
    let t0 = Instant::now();
    let step = Duration::from_millis(100);

    let mut last = Vec::new();
    for i in 0..8u32 {
        let level = if i % 2 == 0 { 220 } else { 20 };
        let frame = frame_with_cells(2, &[(0, 0), (1, 1)], level, 90);
        last = engine.analyze_at(&frame.view(), t0 + step * i);
    }

    let cells: Vec<(usize, usize)> = last.iter().map(|e| (e.cell_row, e.cell_col)).collect();
    assert_eq!(cells, vec![(0, 0), (1, 1)]);
    assert_eq!(engine.stats().events_emitted, 2);
}

#[test]
fn resolution_change_resets_all_regions() {
    let mut engine = engine(1);
    let t0 = Instant::now();
    feed(&mut engine, t0, &[200, 10, 200, 10, 200], Duration::from_millis(100));
    assert_eq!(engine.region(0, 0).map(RegionTracker::reversal_count), Some(3));

    let smaller = OwnedFrame::solid(SIZE / 2, SIZE / 2, 10);
    let events = engine.analyze_at(&smaller.view(), t0 + Duration::from_millis(500));
    assert!(events.is_empty());

    let region = engine.region(0, 0).expect("cell exists");
    assert_eq!(region.reversal_count(), 0);
    assert!(region.last_direction().is_none());
    assert!(region.previous_luminance().is_some());
    assert_eq!(engine.stats().session_resets, 1);
}

#[test]
fn malformed_frame_leaves_state_untouched() {
    let mut engine = engine(1);
    let t0 = Instant::now();
    feed(&mut engine, t0, &[200, 10, 200], Duration::from_millis(100));
    let before = engine.region(0, 0).cloned().expect("cell exists");

    let layout = FrameLayout {
        width: SIZE,
        height: SIZE,
        row_stride: SIZE * 3,
        pixel_stride: 3,
        channel_order: ChannelOrder::Rgb,
    };
    let truncated = vec![0u8; SIZE * 3];
    let view = FrameView::new(layout, &truncated);
    let events = engine.analyze_at(&view, t0 + Duration::from_millis(300));

    assert!(events.is_empty());
    assert_eq!(engine.stats().frames_rejected, 1);
    assert!(engine.last_rejection().is_some());
    let after = engine.region(0, 0).expect("cell exists");
    assert_eq!(after.reversal_count(), before.reversal_count());
    assert_eq!(after.previous_luminance(), before.previous_luminance());
}

#[test]
fn shutdown_engine_ignores_frames_until_restart() {
    let mut engine = engine(1);
    engine.shutdown();
    engine.shutdown();
    assert!(!engine.is_running());

    let frame = OwnedFrame::solid(SIZE, SIZE, 100);
    assert!(engine.analyze(&frame.view()).is_empty());
    assert_eq!(engine.stats().frames_ignored, 1);
    assert!(engine.region(0, 0).is_none());

    engine.restart();
    assert!(engine.is_running());
    assert!(engine.analyze(&frame.view()).is_empty());
    assert_eq!(engine.stats().frames_analyzed, 1);
}

// ============================================================================
// Sampling
// ============================================================================

#[test]
fn bgr_padded_pixels_use_channel_order() {
    // 4x4 BGRX, pure blue
    let width = 4;
    let layout = FrameLayout {
        width,
        height: 4,
        row_stride: width * 4,
        pixel_stride: 4,
        channel_order: ChannelOrder::Bgr,
    };
    let data: Vec<u8> = std::iter::repeat([255u8, 0, 0, 0]).take(16).flatten().collect();
    let view = FrameView::new(layout, &data);

    let sampler = LuminanceSampler::new(2);
    let cell = CellRect { x: 0, y: 0, width: 4, height: 4 };
    let lum = sampler.sample(&view, cell).expect("cell has samples");
    assert!((lum - 0.114 * 255.0).abs() < 1e-9, "got {lum}");
}
