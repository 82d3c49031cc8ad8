//! The rower state aggregator: single writer, many readers.
//!
//! Every event captured from the monitor passes through
//! [`RowerState::handle_event`], which first runs the pulse monitor
//! (paddle-turning
//! detection) and then dispatches the event to its field handler in one
//! exhaustive match. Readers take a copy of the published snapshot; which
//! variant they see is derived on read from the reset and paddle state, so
//! no parallel snapshot needs to be kept in sync.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::s4::memory::{Category, FieldKind};
use crate::s4::protocol::{EventKind, S4Event};
use crate::s4::rower::CategoryGates;
use crate::state::snapshot::RowerSnapshot;
use crate::state::workout::{WorkoutBuilder, WorkoutDefinition};
use crate::state::zone::{ZoneBuilder, ZoneDefinition};

/// Pulse gap beyond which the paddle is assumed stationary.
pub const NO_ROWING_PULSE_GAP_MS: u64 = 300;

/// Strokes over which the reported power is averaged. The monitor itself
/// smooths over something like 16 strokes; four tracks its display closely
/// while responding much faster to changes in effort.
pub const NUM_STROKES_FOR_ROLLING_AVG_WATTS: usize = 4;

/// Where `instant_watts` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    /// Rolling average of per-stroke power maxima reported by the monitor.
    #[default]
    RollingAverage,
    /// The Concept2 formula applied to the instantaneous speed. Yields
    /// markedly different (roughly double) figures from the monitor's own.
    Concept2,
}

/// Where `instant_500m_pace_secs` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceSource {
    /// Prefer the monitor's pace register when it is non-zero (it reads
    /// zero unless the 500 m split is the selected intensity display),
    /// falling back to derivation from speed.
    #[default]
    Monitor,
    /// Always derive the pace from the instantaneous speed.
    Derived,
}

/// Metric derivation choices, set once at startup from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSources {
    pub power: PowerSource,
    pub pace: PaceSource,
}

#[derive(Debug, Default)]
struct StateInner {
    live: RowerSnapshot,
    /// Reads return the zeroed snapshot from a reset until the next pulse.
    reset_pending: bool,
    /// True between stroke-start and stroke-end.
    drive_phase: bool,
    /// Largest watts reading seen during the current drive.
    stroke_max_power: u32,
    /// Per-stroke maxima feeding the rolling average.
    recent_strokes_max_power: VecDeque<u32>,
    /// Last pace reported by the monitor's own register.
    monitor_pace_secs: u32,
    last_pulse_ms: Option<u64>,
    display_hours: u32,
    display_minutes: u32,
    display_seconds: u32,
    display_sec_dec: u32,
    /// Elapsed time with tenths, kept for the monotonic guard.
    elapsed_time: f64,
    total_distance_m: u32,
    total_distance_dec: u32,
    /// Monotonic total distance in centimetres.
    total_distance_cm: u32,
    stroke_duration_ms: u32,
    drive_duration_ms: u32,
    tank_volume_dl: u32,
    workout_builder: WorkoutBuilder,
    workout: Option<WorkoutDefinition>,
    zone_builder: ZoneBuilder,
    zone: Option<ZoneDefinition>,
    /// Last value seen per field, for change logging.
    observed: HashMap<FieldKind, u32>,
}

/// Shared, lock-guarded aggregate of everything the monitor reports.
pub struct RowerState {
    inner: Mutex<StateInner>,
    gates: Arc<CategoryGates>,
    sources: MetricSources,
}

impl RowerState {
    pub fn new(sources: MetricSources, gates: Arc<CategoryGates>) -> Self {
        RowerState {
            inner: Mutex::new(StateInner::default()),
            gates,
            sources,
        }
    }

    /// Process one event from the monitor. Called on the capture path in
    /// arrival order; never panics on unexpected input.
    pub fn handle_event(&self, event: &S4Event) {
        let mut inner = self.inner.lock().unwrap();

        self.monitor_pulse(&mut inner, event);

        match event.kind {
            EventKind::StrokeStart => inner.drive_phase = true,
            EventKind::StrokeEnd => {
                inner.drive_phase = false;
                self.close_out_stroke(&mut inner);
            }
            EventKind::Reset => {
                tracing::info!("reset key pressed on monitor; zeroing state");
                Self::zero_inner(&mut inner);
                inner.reset_pending = true;
            }
            EventKind::Error => {
                tracing::warn!(raw = %event.raw, "error packet from S4");
            }
            // Liveness traffic with no field content.
            EventKind::Pulse | EventKind::Ping | EventKind::Ok | EventKind::Model
            | EventKind::WrHello => {}
            EventKind::MemoryRead(field) => {
                let Some(value) = event.value else {
                    tracing::warn!(?field, "memory read without a value");
                    return;
                };
                self.log_observation(&mut inner, field, value);
                self.handle_field(&mut inner, field, value);
            }
        }
    }

    /// Paddle-turning detection, run for every event. The monitor sends
    /// pings at least once a second even at rest, so the gap since the last
    /// pulse is re-evaluated continuously while the link is up.
    fn monitor_pulse(&self, inner: &mut StateInner, event: &S4Event) {
        if event.kind == EventKind::Pulse {
            inner.last_pulse_ms = Some(event.at);
            inner.reset_pending = false;
        }

        let turning = match inner.last_pulse_ms {
            Some(at) => event.at.saturating_sub(at) <= NO_ROWING_PULSE_GAP_MS,
            None => false,
        };

        if !turning && inner.live.paddle_turning {
            // Rowing stopped: abandon the stroke in progress and let the
            // power average restart from the next stroke.
            inner.drive_phase = false;
            inner.stroke_max_power = 0;
            inner.recent_strokes_max_power.clear();
        }
        inner.live.paddle_turning = turning;
    }

    fn handle_field(&self, inner: &mut StateInner, field: FieldKind, value: u32) {
        match field {
            FieldKind::TotalDistance => {
                inner.total_distance_m = value;
                inner.live.total_distance_m = value;
                Self::update_distance_cm(inner);
            }
            FieldKind::TotalDistanceDec => {
                inner.total_distance_dec = value;
                Self::update_distance_cm(inner);
            }
            FieldKind::Watts => self.handle_watts(inner, value),
            FieldKind::TotalCalories => inner.live.total_calories = value,
            FieldKind::StrokeCount => inner.live.stroke_count = value,
            FieldKind::AvgTimeStrokeWhole => {
                let duration_ms = value * 25;
                inner.stroke_duration_ms = duration_ms;
                inner.live.stroke_rate_pm = if duration_ms > 0 {
                    round2(60_000.0 / duration_ms as f64)
                } else {
                    0.0
                };
                Self::update_stroke_ratio(inner);
            }
            FieldKind::AvgTimeStrokePull => {
                inner.drive_duration_ms = value * 25;
                Self::update_stroke_ratio(inner);
            }
            FieldKind::AvgSpeedCmps => self.handle_speed(inner, value),
            FieldKind::HeartRate => inner.live.heart_rate_bpm = value,
            FieldKind::Pace500m => self.handle_monitor_pace(inner, value),
            FieldKind::StrokeRateInt => {
                // Integer strokes/min; the whole-stroke period gives a
                // finer-grained rate, so this register is not used.
            }
            FieldKind::DisplayHours => inner.display_hours = value,
            FieldKind::DisplayMinutes => inner.display_minutes = value,
            FieldKind::DisplaySeconds => inner.display_seconds = value,
            FieldKind::DisplaySecDec => {
                inner.display_sec_dec = value;
                // The tenths register is polled last, so a full set of
                // components is in hand when it arrives.
                Self::update_elapsed_time(inner);
            }
            FieldKind::WorkoutFlags => self.handle_workout_flags(inner, value),
            FieldKind::MiscDisplayFlags => {
                if inner.zone_builder.apply_misc_flags(value as u8) {
                    inner.zone = None;
                    self.gates.set(Category::Zone, true);
                    self.gates.set(Category::Intensity, true);
                }
            }
            FieldKind::DistanceDisplayFlags
            | FieldKind::WorkoutIntervals
            | FieldKind::WorkoutWork(_)
            | FieldKind::WorkoutRest(_) => {
                inner.workout_builder.observe(field, value);
                self.try_publish_workout(inner);
            }
            FieldKind::IntensityDisplayFlags
            | FieldKind::ZoneHrUpper
            | FieldKind::ZoneHrLower
            | FieldKind::ZoneMpsUpper
            | FieldKind::ZoneMpsLower
            | FieldKind::ZoneMphUpper
            | FieldKind::ZoneMphLower
            | FieldKind::Zone500mUpper
            | FieldKind::Zone500mLower
            | FieldKind::Zone2kmUpper
            | FieldKind::Zone2kmLower
            | FieldKind::ZoneStrokeRateUpper
            | FieldKind::ZoneStrokeRateLower => {
                inner.zone_builder.observe(field, value);
                self.try_publish_zone(inner);
            }
            FieldKind::TankVolume => inner.tank_volume_dl = value,
            // Observed for the data log but with no derived effect.
            FieldKind::ScreenMode
            | FieldKind::ScreenSubMode
            | FieldKind::IntervalsRemaining
            | FieldKind::FunctionFlags
            | FieldKind::ProgramDisplayFlags
            | FieldKind::WorkoutTotalTime
            | FieldKind::WorkoutTotalMetres
            | FieldKind::WorkoutTotalStrokes => {}
        }
    }

    /// Centimetre distance combines the metres and centimetres registers.
    /// The components arrive in separate frames, so the combined figure is
    /// clamped to be non-decreasing rather than trusting any single pairing.
    fn update_distance_cm(inner: &mut StateInner) {
        let combined = inner.total_distance_m * 100 + inner.total_distance_dec;
        inner.total_distance_cm = inner.total_distance_cm.max(combined);
    }

    /// Non-zero watts show up for only a reading or two per stroke. Track
    /// the maximum over the drive, bank it when the stroke closes, and
    /// publish the mean of the last few banked strokes.
    fn handle_watts(&self, inner: &mut StateInner, value: u32) {
        if inner.drive_phase {
            inner.stroke_max_power = inner.stroke_max_power.max(value);
        } else {
            self.close_out_stroke(inner);
        }
    }

    fn close_out_stroke(&self, inner: &mut StateInner) {
        if inner.stroke_max_power > 0 {
            inner.recent_strokes_max_power.push_back(inner.stroke_max_power);
            inner.stroke_max_power = 0;
            while inner.recent_strokes_max_power.len() > NUM_STROKES_FOR_ROLLING_AVG_WATTS {
                inner.recent_strokes_max_power.pop_front();
            }
        }
        // Report from the first banked stroke rather than waiting for the
        // window to fill.
        if !inner.recent_strokes_max_power.is_empty()
            && self.sources.power == PowerSource::RollingAverage
        {
            let sum: u32 = inner.recent_strokes_max_power.iter().sum();
            let avg = sum as f64 / inner.recent_strokes_max_power.len() as f64;
            inner.live.instant_watts = avg.round() as u32;
        }
    }

    fn handle_speed(&self, inner: &mut StateInner, speed_cmps: u32) {
        if speed_cmps == 0 {
            inner.live.instant_500m_pace_secs = 0;
            inner.live.speed_cmps = 0;
            if self.sources.power == PowerSource::Concept2 {
                inner.live.instant_watts = 0;
            }
            return;
        }

        inner.live.speed_cmps = speed_cmps;

        let use_derived_pace = match self.sources.pace {
            PaceSource::Derived => true,
            PaceSource::Monitor => inner.monitor_pace_secs == 0,
        };
        if use_derived_pace {
            inner.live.instant_500m_pace_secs =
                (50_000.0 / speed_cmps as f64).round() as u32;
        }

        if self.sources.power == PowerSource::Concept2 {
            let pace_per_m = 100.0 / speed_cmps as f64;
            inner.live.instant_watts = (2.80 / pace_per_m.powi(3)).round() as u32;
        }
    }

    fn handle_monitor_pace(&self, inner: &mut StateInner, value: u32) {
        if self.sources.pace == PaceSource::Derived {
            return;
        }
        inner.monitor_pace_secs = value;
        if value > 0 {
            inner.live.instant_500m_pace_secs = value;
        }
    }

    /// Recombine the clock components. A tick between component reads can
    /// make the compiled time jump backwards (1:59:59.9 read as 1:00:00.0),
    /// so the published time is the max of old and new.
    fn update_elapsed_time(inner: &mut StateInner) {
        let compiled = inner.display_hours as f64 * 3600.0
            + inner.display_minutes as f64 * 60.0
            + inner.display_seconds as f64
            + inner.display_sec_dec as f64 / 10.0;
        inner.elapsed_time = inner.elapsed_time.max(compiled);
        inner.live.elapsed_time_secs = inner.elapsed_time as u32;
    }

    fn update_stroke_ratio(inner: &mut StateInner) {
        if inner.stroke_duration_ms > 0 && inner.drive_duration_ms > 0 {
            let ratio = (inner.stroke_duration_ms as f64 - inner.drive_duration_ms as f64)
                / (inner.drive_duration_ms as f64 * 1.25);
            inner.live.stroke_ratio = round2(ratio);
        }
    }

    fn handle_workout_flags(&self, inner: &mut StateInner, value: u32) {
        let flags = value as u8;
        if inner.workout_builder.apply_flags(flags) {
            tracing::info!(flags = format!("{flags:#010b}"), "workout mode changed");
            inner.workout = None;
            self.gates.set(Category::Workout, true);
            self.gates.set(Category::Distance, true);
        }
        if inner.zone_builder.apply_flags(flags) {
            tracing::info!(flags = format!("{flags:#010b}"), "zone selection changed");
            inner.zone = None;
            self.gates.set(Category::Zone, true);
            self.gates.set(Category::Intensity, true);
        }
    }

    fn try_publish_workout(&self, inner: &mut StateInner) {
        if let Some(workout) = inner.workout_builder.definition() {
            if inner.workout.as_ref() != Some(&workout) {
                tracing::info!(kind = ?workout.kind, units = ?workout.units, "workout program assembled");
            }
            inner.workout = Some(workout);
            // Layout captured; stop burning request bandwidth on it.
            self.gates.set(Category::Workout, false);
            self.gates.set(Category::Distance, false);
        }
    }

    fn try_publish_zone(&self, inner: &mut StateInner) {
        if let Some(zone) = inner.zone_builder.definition() {
            if inner.zone.as_ref() != Some(&zone) {
                tracing::info!(kind = ?zone.kind, units = ?zone.units, "zone configuration assembled");
            }
            inner.zone = Some(zone);
            self.gates.set(Category::Zone, false);
            self.gates.set(Category::Intensity, false);
        }
    }

    fn log_observation(&self, inner: &mut StateInner, field: FieldKind, value: u32) {
        match inner.observed.insert(field, value) {
            None => {
                tracing::debug!(target: "s4data", ?field, value, "initialised");
            }
            Some(old) if old != value => {
                tracing::debug!(target: "s4data", ?field, from = old, to = value, "updated");
            }
            Some(_) => {}
        }
    }

    fn zero_inner(inner: &mut StateInner) {
        let observed = std::mem::take(&mut inner.observed);
        *inner = StateInner::default();
        // Keep the change log's memory of what was seen; values restart
        // from zero but the log keys are still valid.
        inner.observed = observed;
        inner.observed.clear();
    }

    /// Zero all derived state, as when the monitor's reset key is pressed.
    /// Reads return the zeroed snapshot until rowing resumes.
    pub fn zero(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::zero_inner(&mut inner);
        inner.reset_pending = true;
    }

    /// The snapshot a consumer should publish right now.
    ///
    /// Selection rule: a pending reset dominates and yields the all-zero
    /// snapshot; an actively turning paddle yields the live values; a
    /// stationary paddle yields the live totals with instantaneous
    /// quantities zeroed.
    pub fn snapshot(&self) -> RowerSnapshot {
        let inner = self.inner.lock().unwrap();
        if inner.reset_pending {
            RowerSnapshot::default()
        } else if inner.live.paddle_turning {
            inner.live.clone()
        } else {
            inner.live.standstill()
        }
    }

    pub fn paddle_turning(&self) -> bool {
        self.inner.lock().unwrap().live.paddle_turning
    }

    /// The live workout program, if a complete one has been assembled.
    pub fn workout(&self) -> Option<WorkoutDefinition> {
        self.inner.lock().unwrap().workout.clone()
    }

    /// The live zone configuration, if a complete one has been assembled.
    pub fn zone(&self) -> Option<ZoneDefinition> {
        self.inner.lock().unwrap().zone.clone()
    }

    /// Tank volume in decilitres, zero until reported.
    pub fn tank_volume_dl(&self) -> u32 {
        self.inner.lock().unwrap().tank_volume_dl
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
