//! End-to-end scenarios: raw serial lines in, published telemetry out.
//!
//! Each test feeds the byte lines the monitor would send through the line
//! parser and the aggregator, then checks the published snapshot. Event
//! timestamps are set explicitly so the timing-sensitive behaviour
//! (paddle-turning, reset) is deterministic.

use std::sync::Arc;

use wrowfusion::s4::protocol::S4Event;
use wrowfusion::s4::rower::CategoryGates;
use wrowfusion::state::aggregator::{MetricSources, RowerState};
use wrowfusion::state::snapshot::RowerSnapshot;

/// Feeds wire lines to an aggregator with an explicit clock.
struct Harness {
    state: RowerState,
    now_ms: u64,
}

impl Harness {
    fn new() -> Self {
        Harness {
            state: RowerState::new(MetricSources::default(), Arc::new(CategoryGates::default())),
            now_ms: 0,
        }
    }

    /// Parse `line` and process it `delta_ms` after the previous one.
    fn feed_after(&mut self, delta_ms: u64, line: &str) {
        self.now_ms += delta_ms;
        let mut event = S4Event::parse_line(line)
            .unwrap_or_else(|| panic!("line should parse: {line:?}"));
        event.at = self.now_ms;
        self.state.handle_event(&event);
    }

    /// Parse and process `line` 10 ms after the previous one.
    fn feed(&mut self, line: &str) {
        self.feed_after(10, line);
    }

    /// A line the codec must reject; the stream simply continues.
    fn feed_noise(&mut self, line: &str) {
        self.now_ms += 10;
        assert!(
            S4Event::parse_line(line).is_none(),
            "noise line should be dropped: {line:?}"
        );
    }

    fn snapshot(&self) -> RowerSnapshot {
        self.state.snapshot()
    }
}

#[test]
fn scenario_distance_increments_monotonically() {
    let mut h = Harness::new();
    h.feed("P01");

    // 138.95 m: the cm component is read just before the metres component
    h.feed("IDS0545F"); // 0x5F = 95 cm
    h.feed("IDD055008A"); // 0x8A = 138 m
    // The distance ticked to 139.00 m between the reads
    h.feed("IDS05400");
    h.feed("IDD055008B"); // 0x8B = 139 m

    let snapshot = h.snapshot();
    assert_eq!(snapshot.total_distance_m, 139);
}

#[test]
fn scenario_stroke_rate_from_average_stroke_period() {
    let mut h = Harness::new();
    h.feed("P01");

    // 0x60 = 96 periods of 25 ms = 2400 ms per whole stroke
    h.feed("IDS14260");
    assert_eq!(h.snapshot().stroke_rate_pm, 25.0);
}

#[test]
fn scenario_rolling_average_watts_over_four_strokes() {
    let mut h = Harness::new();

    let strokes: [&[&str]; 4] = [
        &["IDD08800C8", "IDD088012C"], // 200 then 300 W
        &["IDD08801F4"],               // 500 W
        &["IDD0880190"],               // 400 W
        &["IDD0880064"],               // 100 W
    ];
    for watts_lines in strokes {
        h.feed("P01"); // keep the paddle turning
        h.feed("SS");
        for &line in watts_lines {
            h.feed("P01");
            h.feed(line);
        }
        h.feed("SE");
    }

    // Per-stroke maxima 300, 500, 400, 100 average to 325
    assert_eq!(h.snapshot().instant_watts, 325);
}

#[test]
fn scenario_paddle_turning_timeout() {
    let mut h = Harness::new();

    h.feed_after(0, "P01");
    h.feed_after(5, "IDD14A0190"); // speed 400 cm/s while rowing
    assert!(h.snapshot().paddle_turning);
    assert_eq!(h.snapshot().speed_cmps, 400);

    // An unrelated event inside the 300 ms window keeps the live view
    h.feed_after(285, "PING");
    assert!(h.snapshot().paddle_turning);

    // One beyond it flips publication to the standstill variant
    h.feed_after(60, "PING");
    let snapshot = h.snapshot();
    assert!(!snapshot.paddle_turning);
    assert_eq!(snapshot.speed_cmps, 0);
    assert_eq!(snapshot.instant_watts, 0);
    assert_eq!(snapshot.stroke_rate_pm, 0.0);
}

#[test]
fn scenario_reset_via_keypad() {
    let mut h = Harness::new();

    h.feed("P01");
    h.feed("IDD1400032"); // 50 strokes
    h.feed("IDT08A0003E8"); // 1000 calories
    assert_eq!(h.snapshot().stroke_count, 50);

    h.feed("AKR");
    assert_eq!(h.snapshot(), RowerSnapshot::default());

    // Still zeroed while stale polls trickle in
    h.feed("IDD1400032");
    assert_eq!(h.snapshot(), RowerSnapshot::default());

    // The next pulse ends the reset window
    h.feed("P01");
    let snapshot = h.snapshot();
    assert!(snapshot.paddle_turning);
    assert_eq!(snapshot.stroke_count, 50);
}

#[test]
fn scenario_little_endian_500m_pace() {
    let mut h = Harness::new();
    h.feed("P01");

    // Bytes 7C 00 in a little-endian register decode to 0x007C = 124 s
    h.feed("IDD1A57C00");
    h.feed("IDD14A0190");
    assert_eq!(h.snapshot().instant_500m_pace_secs, 124);
}

#[test]
fn scenario_elapsed_time_and_clock_rollover() {
    let mut h = Harness::new();
    h.feed("P01");

    for line in ["IDS1E301", "IDS1E259", "IDS1E159", "IDS1E009"] {
        h.feed(line);
    }
    assert_eq!(h.snapshot().elapsed_time_secs, 7199);

    // Second ticks between the hour and minute reads; compiled time
    // collapses to 1:00:00.0 but the published value holds
    for line in ["IDS1E301", "IDS1E200", "IDS1E100", "IDS1E000"] {
        h.feed(line);
    }
    assert_eq!(h.snapshot().elapsed_time_secs, 7199);
}

#[test]
fn scenario_full_rowing_session() {
    let mut h = Harness::new();

    // A few strokes of steady rowing
    h.feed("P01");
    h.feed("SS");
    h.feed_noise("IDD0880aut"); // malformed value is dropped, stream continues
    h.feed("P01");
    h.feed("IDD08800C8");
    h.feed("SE");
    h.feed("P01");
    h.feed("IDS14260"); // 25 spm
    h.feed("IDS14320"); // pull = 32 periods = 800 ms
    h.feed("IDD14A0190"); // 400 cm/s
    h.feed("IDD055008A");
    h.feed("IDS1A08C"); // HR 140 from the rower's own register
    h.feed("IDD1400032");

    let snapshot = h.snapshot();
    assert!(snapshot.paddle_turning);
    assert_eq!(snapshot.stroke_rate_pm, 25.0);
    assert_eq!(snapshot.stroke_ratio, 1.6);
    assert_eq!(snapshot.total_distance_m, 138);
    assert_eq!(snapshot.instant_500m_pace_secs, 125);
    assert_eq!(snapshot.heart_rate_bpm, 140);
    assert_eq!(snapshot.stroke_count, 50);
    assert_eq!(snapshot.instant_watts, 200);
}
