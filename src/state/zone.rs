//! Reassembly of the monitor's zone configuration.
//!
//! A zone is a target band on one physiological variable. The zone kind
//! comes from the workout-mode register; the band edges live in twelve
//! dedicated bound registers, one (lower, upper) pair per displayable unit.
//! User edits to the bounds do not flip workout-mode bits, so the misc
//! display register is watched as a change proxy: any change there while a
//! zone is active forces the bounds table to be re-read.

use serde::{Deserialize, Serialize};

use crate::s4::flags::{masked_change, IntensityDisplayFlags, WorkoutModeFlags};
use crate::s4::memory::FieldKind;

/// Which variable the zone bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    HeartRate,
    Intensity,
    StrokeRate,
}

/// Unit of the active zone's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneUnits {
    Bpm,
    Spm,
    Mps,
    Mph,
    SecsPer500m,
    SecsPer2km,
}

/// A (lower, upper) band edge pair; either edge may not have arrived yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundPair {
    pub lower: Option<u32>,
    pub upper: Option<u32>,
}

impl BoundPair {
    fn is_complete(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }
}

/// Band edges per unit, as stored in the monitor's bound registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneBounds {
    pub heart_rate: BoundPair,
    pub mps: BoundPair,
    pub mph: BoundPair,
    pub pace_500m: BoundPair,
    pub pace_2km: BoundPair,
    pub stroke_rate: BoundPair,
}

impl ZoneBounds {
    fn is_complete(&self) -> bool {
        self.heart_rate.is_complete()
            && self.mps.is_complete()
            && self.mph.is_complete()
            && self.pace_500m.is_complete()
            && self.pace_2km.is_complete()
            && self.stroke_rate.is_complete()
    }

    /// The pair relevant to `units`.
    pub fn for_units(&self, units: ZoneUnits) -> BoundPair {
        match units {
            ZoneUnits::Bpm => self.heart_rate,
            ZoneUnits::Spm => self.stroke_rate,
            ZoneUnits::Mps => self.mps,
            ZoneUnits::Mph => self.mph,
            ZoneUnits::SecsPer500m => self.pace_500m,
            ZoneUnits::SecsPer2km => self.pace_2km,
        }
    }
}

/// A fully assembled zone configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub kind: ZoneKind,
    pub units: ZoneUnits,
    pub bounds: ZoneBounds,
}

/// Collects zone fragments until they form a valid definition.
#[derive(Debug, Default)]
pub struct ZoneBuilder {
    workout_flags: Option<u8>,
    misc_flags: Option<u8>,
    kind: Option<ZoneKind>,
    units: Option<ZoneUnits>,
    bounds: ZoneBounds,
}

impl ZoneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed the workout-mode register. Returns true when the zone bits
    /// changed; collected state is discarded and the caller should
    /// re-enable polling of the zone registers.
    pub fn apply_flags(&mut self, flags: u8) -> bool {
        if let Some(old) = self.workout_flags {
            if !masked_change(old, flags, WorkoutModeFlags::ZONE_MASK) {
                return false;
            }
        }

        self.reset();
        // When several zone bits are set the monitor gives intensity
        // precedence over heart rate, and heart rate over stroke rate.
        self.kind = if flags & WorkoutModeFlags::ZONE_INTENSITY != 0 {
            Some(ZoneKind::Intensity)
        } else if flags & WorkoutModeFlags::ZONE_HEART_RATE != 0 {
            Some(ZoneKind::HeartRate)
        } else if flags & WorkoutModeFlags::ZONE_STROKE_RATE != 0 {
            Some(ZoneKind::StrokeRate)
        } else {
            None
        };

        // Heart-rate and stroke-rate zones have only one possible unit.
        self.units = match self.kind {
            Some(ZoneKind::HeartRate) => Some(ZoneUnits::Bpm),
            Some(ZoneKind::StrokeRate) => Some(ZoneUnits::Spm),
            _ => None,
        };

        self.workout_flags = Some(flags);
        true
    }

    /// Feed the misc display register. Bound edits on the monitor do not
    /// flip workout-mode bits, so any change here while a zone is active
    /// clears the collected bounds. Returns true when that happened.
    pub fn apply_misc_flags(&mut self, flags: u8) -> bool {
        let changed = match self.misc_flags {
            Some(old) => masked_change(old, flags, 0xFF),
            None => false,
        };
        self.misc_flags = Some(flags);

        if changed && self.kind.is_some() {
            self.bounds = ZoneBounds::default();
            return true;
        }
        false
    }

    /// Feed one decoded register value.
    pub fn observe(&mut self, kind: FieldKind, value: u32) {
        match kind {
            FieldKind::IntensityDisplayFlags => self.observe_intensity_flags(value),
            FieldKind::ZoneHrUpper => self.bounds.heart_rate.upper = Some(value),
            FieldKind::ZoneHrLower => self.bounds.heart_rate.lower = Some(value),
            FieldKind::ZoneMpsUpper => self.bounds.mps.upper = Some(value),
            FieldKind::ZoneMpsLower => self.bounds.mps.lower = Some(value),
            FieldKind::ZoneMphUpper => self.bounds.mph.upper = Some(value),
            FieldKind::ZoneMphLower => self.bounds.mph.lower = Some(value),
            FieldKind::Zone500mUpper => self.bounds.pace_500m.upper = Some(value),
            FieldKind::Zone500mLower => self.bounds.pace_500m.lower = Some(value),
            FieldKind::Zone2kmUpper => self.bounds.pace_2km.upper = Some(value),
            FieldKind::Zone2kmLower => self.bounds.pace_2km.lower = Some(value),
            FieldKind::ZoneStrokeRateUpper => self.bounds.stroke_rate.upper = Some(value),
            FieldKind::ZoneStrokeRateLower => self.bounds.stroke_rate.lower = Some(value),
            _ => {}
        }
    }

    fn observe_intensity_flags(&mut self, value: u32) {
        if self.kind != Some(ZoneKind::Intensity) {
            return;
        }
        let flags = IntensityDisplayFlags(value as u8);
        let Some(unit_bit) = flags.single_unit() else {
            return;
        };
        self.units = match unit_bit {
            IntensityDisplayFlags::UNITS_MPS => Some(ZoneUnits::Mps),
            IntensityDisplayFlags::UNITS_MPH => Some(ZoneUnits::Mph),
            IntensityDisplayFlags::UNITS_500M => Some(ZoneUnits::SecsPer500m),
            IntensityDisplayFlags::UNITS_2KM => Some(ZoneUnits::SecsPer2km),
            _ => {
                // Watts and Cal/Hr displays carry no zone bounds.
                tracing::debug!(bit = unit_bit, "intensity unit without zone bounds");
                self.units
            }
        };
    }

    /// The assembled definition, once kind, units and every bound pair are
    /// in hand.
    pub fn definition(&self) -> Option<ZoneDefinition> {
        let kind = self.kind?;
        let units = self.units?;
        if !self.bounds.is_complete() {
            return None;
        }
        Some(ZoneDefinition {
            kind,
            units,
            bounds: self.bounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_bounds(builder: &mut ZoneBuilder) {
        builder.observe(FieldKind::ZoneHrUpper, 160);
        builder.observe(FieldKind::ZoneHrLower, 120);
        builder.observe(FieldKind::ZoneMpsUpper, 45);
        builder.observe(FieldKind::ZoneMpsLower, 30);
        builder.observe(FieldKind::ZoneMphUpper, 10);
        builder.observe(FieldKind::ZoneMphLower, 7);
        builder.observe(FieldKind::Zone500mUpper, 150);
        builder.observe(FieldKind::Zone500mLower, 110);
        builder.observe(FieldKind::Zone2kmUpper, 620);
        builder.observe(FieldKind::Zone2kmLower, 450);
        builder.observe(FieldKind::ZoneStrokeRateUpper, 30);
        builder.observe(FieldKind::ZoneStrokeRateLower, 18);
    }

    #[test]
    fn test_heart_rate_zone() {
        let mut builder = ZoneBuilder::new();
        assert!(builder.apply_flags(WorkoutModeFlags::ZONE_HEART_RATE));
        assert!(builder.definition().is_none());

        fill_bounds(&mut builder);
        let zone = builder.definition().expect("zone should be complete");
        assert_eq!(zone.kind, ZoneKind::HeartRate);
        assert_eq!(zone.units, ZoneUnits::Bpm);
        assert_eq!(
            zone.bounds.for_units(ZoneUnits::Bpm),
            BoundPair { lower: Some(120), upper: Some(160) }
        );
    }

    #[test]
    fn test_intensity_zone_needs_units_from_display() {
        let mut builder = ZoneBuilder::new();
        builder.apply_flags(WorkoutModeFlags::ZONE_INTENSITY);
        fill_bounds(&mut builder);
        // Units unknown until the intensity display register arrives
        assert!(builder.definition().is_none());

        builder.observe(
            FieldKind::IntensityDisplayFlags,
            IntensityDisplayFlags::UNITS_500M as u32,
        );
        let zone = builder.definition().expect("zone should be complete");
        assert_eq!(zone.kind, ZoneKind::Intensity);
        assert_eq!(zone.units, ZoneUnits::SecsPer500m);
        assert_eq!(
            zone.bounds.for_units(zone.units),
            BoundPair { lower: Some(110), upper: Some(150) }
        );
    }

    #[test]
    fn test_intensity_precedence_over_other_kinds() {
        let mut builder = ZoneBuilder::new();
        builder.apply_flags(
            WorkoutModeFlags::ZONE_INTENSITY | WorkoutModeFlags::ZONE_HEART_RATE,
        );
        fill_bounds(&mut builder);
        builder.observe(
            FieldKind::IntensityDisplayFlags,
            IntensityDisplayFlags::UNITS_MPS as u32,
        );
        assert_eq!(builder.definition().unwrap().kind, ZoneKind::Intensity);
    }

    #[test]
    fn test_zone_bit_change_resets() {
        let mut builder = ZoneBuilder::new();
        builder.apply_flags(WorkoutModeFlags::ZONE_HEART_RATE);
        fill_bounds(&mut builder);
        assert!(builder.definition().is_some());

        // Workout-only bit changes leave the zone untouched
        assert!(!builder.apply_flags(
            WorkoutModeFlags::ZONE_HEART_RATE | WorkoutModeFlags::WORKOUT_DISTANCE
        ));
        assert!(builder.definition().is_some());

        assert!(builder.apply_flags(WorkoutModeFlags::ZONE_STROKE_RATE));
        assert!(builder.definition().is_none());
    }

    #[test]
    fn test_misc_flag_change_forces_bound_rebuild() {
        let mut builder = ZoneBuilder::new();
        builder.apply_flags(WorkoutModeFlags::ZONE_HEART_RATE);

        // First observation of the register is a baseline, not a change
        assert!(!builder.apply_misc_flags(0x10));
        fill_bounds(&mut builder);
        assert!(builder.definition().is_some());

        // User edited a bound: misc register moved, bounds are stale
        assert!(builder.apply_misc_flags(0x11));
        assert!(builder.definition().is_none());

        fill_bounds(&mut builder);
        assert!(builder.definition().is_some());
    }

    #[test]
    fn test_no_zone_bits_means_no_zone() {
        let mut builder = ZoneBuilder::new();
        builder.apply_flags(WorkoutModeFlags::WORKOUT_DISTANCE);
        fill_bounds(&mut builder);
        assert!(builder.definition().is_none());
    }
}
