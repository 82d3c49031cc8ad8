//! Reassembly of the monitor's workout program from fragmented reads.
//!
//! A workout definition is spread over the workout-mode flag register, up
//! to nine work legs and eight rest legs, the interval-count register and
//! the distance display register (which records the selected unit). The
//! builder collects those pieces in any order and reports a definition only
//! once they form a coherent whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::s4::flags::{masked_change, DistanceDisplayFlags, WorkoutModeFlags};
use crate::s4::memory::FieldKind;

/// Shape of the programmed workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutKind {
    /// No programmed target
    JustRow,
    /// Single timed piece
    Duration,
    /// Single distance piece
    Distance,
    /// Alternating timed work and rest legs
    DurationInterval,
    /// Alternating distance work legs and timed rest legs
    DistanceInterval,
}

impl WorkoutKind {
    pub fn is_interval(self) -> bool {
        matches!(self, WorkoutKind::DurationInterval | WorkoutKind::DistanceInterval)
    }

    fn from_flags(flags: WorkoutModeFlags) -> WorkoutKind {
        if !flags.has_workout() {
            WorkoutKind::JustRow
        } else if flags.is_duration() {
            if flags.is_interval() {
                WorkoutKind::DurationInterval
            } else {
                WorkoutKind::Duration
            }
        } else if flags.is_interval() {
            WorkoutKind::DistanceInterval
        } else {
            WorkoutKind::Distance
        }
    }
}

/// Unit of the work targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutUnits {
    Seconds,
    Metres,
    Miles,
    Kilometres,
    Strokes,
}

/// A fully assembled workout program.
///
/// Work targets are keyed by 1-based leg index (1..=9), rest durations
/// (always seconds) by the index of the rest leg (1..=8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutDefinition {
    pub kind: WorkoutKind,
    pub units: WorkoutUnits,
    /// Number of work plus rest legs; present only for interval kinds.
    pub interval_count: Option<u32>,
    pub work_targets: BTreeMap<u8, u32>,
    pub rest_durations: BTreeMap<u8, u32>,
    /// The raw workout-mode byte this definition was decoded from.
    pub workout_flags_snapshot: u8,
}

impl WorkoutDefinition {
    /// Work targets and rest durations in leg order.
    pub fn as_ordered_lists(&self) -> (Vec<u32>, Vec<u32>) {
        (
            self.work_targets.values().copied().collect(),
            self.rest_durations.values().copied().collect(),
        )
    }

    pub fn is_valid(&self) -> bool {
        let legs = self.work_targets.len() + self.rest_durations.len();
        match self.kind {
            WorkoutKind::DurationInterval | WorkoutKind::DistanceInterval => {
                self.interval_count == Some(legs as u32)
            }
            _ => {
                self.interval_count.is_none()
                    && self.work_targets.len() == 1
                    && self.rest_durations.is_empty()
            }
        }
    }
}

/// Collects workout fragments until they form a valid definition.
#[derive(Debug, Default)]
pub struct WorkoutBuilder {
    flags: Option<u8>,
    kind: Option<WorkoutKind>,
    units: Option<WorkoutUnits>,
    interval_count: Option<u32>,
    work_targets: BTreeMap<u8, u32>,
    rest_durations: BTreeMap<u8, u32>,
}

impl WorkoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed the workout-mode register. Returns true when the workout bits
    /// changed, in which case collected state is discarded and the caller
    /// should re-enable polling of the workout registers.
    pub fn apply_flags(&mut self, flags: u8) -> bool {
        if let Some(old) = self.flags {
            if !masked_change(old, flags, WorkoutModeFlags::WORKOUT_MASK) {
                return false;
            }
        }

        self.reset();
        let mode = WorkoutModeFlags(flags);
        let kind = WorkoutKind::from_flags(mode);
        if mode.is_duration() {
            self.units = Some(WorkoutUnits::Seconds);
        }
        self.kind = Some(kind);
        self.flags = Some(flags);
        true
    }

    /// Feed one decoded register value.
    pub fn observe(&mut self, kind: FieldKind, value: u32) {
        match kind {
            FieldKind::WorkoutIntervals => {
                // The register reports the number of legs plus one.
                self.interval_count = Some(value.saturating_sub(1));
            }
            FieldKind::DistanceDisplayFlags => self.observe_distance_flags(value),
            FieldKind::WorkoutWork(leg) => {
                self.work_targets.insert(leg, value);
            }
            FieldKind::WorkoutRest(leg) => {
                self.rest_durations.insert(leg, value);
            }
            _ => {}
        }
    }

    fn observe_distance_flags(&mut self, value: u32) {
        // Duration workouts are always in seconds; the distance display
        // units do not apply to them.
        if matches!(
            self.kind,
            Some(WorkoutKind::Duration) | Some(WorkoutKind::DurationInterval)
        ) {
            return;
        }

        let flags = DistanceDisplayFlags(value as u8);
        let Some(unit_bit) = flags.single_unit() else {
            // Unit selection still in progress; wait for a settled value.
            return;
        };

        self.units = match unit_bit {
            DistanceDisplayFlags::UNITS_METRES => Some(WorkoutUnits::Metres),
            DistanceDisplayFlags::UNITS_MILES => Some(WorkoutUnits::Miles),
            DistanceDisplayFlags::UNITS_KM => Some(WorkoutUnits::Kilometres),
            DistanceDisplayFlags::UNITS_STROKES => Some(WorkoutUnits::Strokes),
            _ => {
                tracing::debug!(bit = unit_bit, "distance unit bit with no workout meaning");
                self.units
            }
        };
    }

    /// The assembled definition, once the collected pieces are coherent.
    pub fn definition(&self) -> Option<WorkoutDefinition> {
        let kind = self.kind?;
        let units = self.units?;

        // Units must agree with the workout shape.
        match kind {
            WorkoutKind::Duration | WorkoutKind::DurationInterval => {
                if units != WorkoutUnits::Seconds {
                    tracing::warn!(?units, "duration workout with non-second units");
                    return None;
                }
            }
            _ => {
                if units == WorkoutUnits::Seconds {
                    return None;
                }
            }
        }

        if kind.is_interval() {
            let count = self.interval_count?;
            if count == 0 {
                tracing::warn!("interval workout with an interval count of zero");
                return None;
            }
            let legs = (self.work_targets.len() + self.rest_durations.len()) as u32;
            // Firmware revisions disagree on whether the count includes an
            // extra leg; treat any mismatch as incomplete and keep polling.
            if legs != count {
                if legs > count {
                    tracing::warn!(legs, count, "more workout legs than the reported interval count");
                }
                return None;
            }
        } else if self.interval_count.map_or(false, |c| c > 1) {
            tracing::warn!("non-interval workout reports multiple intervals");
            return None;
        } else if self.work_targets.len() != 1 || !self.rest_durations.is_empty() {
            return None;
        }

        let definition = WorkoutDefinition {
            kind,
            units,
            interval_count: if kind.is_interval() { self.interval_count } else { None },
            work_targets: self.work_targets.clone(),
            rest_durations: self.rest_durations.clone(),
            workout_flags_snapshot: self.flags.unwrap_or(0),
        };
        debug_assert!(definition.is_valid());
        Some(definition)
    }
}
