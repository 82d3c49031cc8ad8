//! The publish contract between the core and the BLE front end.
//!
//! A [`TelemetryHub`] is the only surface the GATT services touch: it hands
//! out fused snapshots, already-encoded characteristic payloads, and the
//! control operations (reset, category gating, inbound heart rate). The
//! GATT plumbing itself lives outside this crate.

use std::sync::Arc;

use crate::ble::{control_point, hrs, rower_data};
use crate::ble::rower_data::{ExpendedEnergy, RowerDataFields, StrokeInfo};
use crate::hr::monitor::{HeartRateMonitor, HeartRateSample, HeartRateSource};
use crate::s4::memory::Category;
use crate::s4::rower::{CategoryGates, Rower};
use crate::state::aggregator::RowerState;
use crate::state::snapshot::RowerSnapshot;
use crate::state::workout::WorkoutDefinition;
use crate::state::zone::ZoneDefinition;

/// Device Information Service strings (0x180A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInformation {
    pub manufacturer: String,
    pub model_number: String,
    pub serial_number: String,
    pub hardware_revision: String,
    pub firmware_revision: String,
    pub software_revision: String,
}

impl Default for DeviceInformation {
    fn default() -> Self {
        DeviceInformation {
            manufacturer: "WaterRower".into(),
            model_number: "S4".into(),
            serial_number: "WRowFusion".into(),
            hardware_revision: "-".into(),
            firmware_revision: "-".into(),
            software_revision: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

impl DeviceInformation {
    /// Fill model and firmware from the monitor's `IV?` response.
    pub fn with_model_info(mut self, info: &crate::s4::protocol::ModelInfo) -> Self {
        self.model_number = format!("S{}", info.model);
        self.firmware_revision = info.firmware.clone();
        self
    }
}

/// Thread-safe handle the BLE services use to reach the core.
#[derive(Clone)]
pub struct TelemetryHub {
    rower: Arc<Rower>,
    gates: Arc<CategoryGates>,
    state: Arc<RowerState>,
    hrm: Arc<HeartRateMonitor>,
}

impl TelemetryHub {
    pub fn new(rower: Arc<Rower>, state: Arc<RowerState>, hrm: Arc<HeartRateMonitor>) -> Self {
        let gates = rower.gates();
        TelemetryHub {
            rower,
            gates,
            state,
            hrm,
        }
    }

    /// The current telemetry with the external heart rate fused in.
    /// Non-blocking beyond the state lock; returns a copy.
    pub fn snapshot(&self) -> RowerSnapshot {
        let mut snapshot = self.state.snapshot();
        self.hrm.inject(&mut snapshot);
        snapshot
    }

    /// Reset the monitor and the derived state. Idempotent.
    pub fn request_reset(&self) {
        tracing::info!("reset requested via publish adapter");
        self.rower.request_reset();
        self.state.zero();
    }

    /// Switch polling of a register family on or off.
    pub fn set_category_enabled(&self, category: Category, enabled: bool) {
        self.gates.set(category, enabled);
    }

    /// Inbound heart rate from an external source.
    pub fn on_hr_update(&self, sample: HeartRateSample) {
        self.hrm.record(sample);
    }

    pub fn current_workout(&self) -> Option<WorkoutDefinition> {
        self.state.workout()
    }

    pub fn current_zone(&self) -> Option<ZoneDefinition> {
        self.state.zone()
    }

    /// The current Rower Data notification payload.
    pub fn rower_data_payload(&self) -> Vec<u8> {
        rower_data::encode(&fields_from_snapshot(&self.snapshot()))
    }

    /// The current Heart Rate Measurement payload. Uses the external
    /// sample's descriptors when it is fresh, otherwise just the fused BPM.
    pub fn heart_rate_payload(&self) -> Vec<u8> {
        let sample = self.hrm.current_sample().unwrap_or_else(|| {
            HeartRateSample::new(self.snapshot().heart_rate_bpm, HeartRateSource::Rower)
        });
        hrs::encode_measurement(&sample)
    }

    /// Handle a Fitness Machine Control Point write; returns the
    /// indication to send back, if any.
    pub fn handle_control_point(&self, request: &[u8]) -> Option<Vec<u8>> {
        control_point::handle_request(request, || self.request_reset())
    }
}

/// Map a snapshot onto the Rower Data field set, deriving the averages the
/// profile wants but the monitor does not supply. Every derived average
/// guards its division and reports zero instead.
pub fn fields_from_snapshot(snapshot: &RowerSnapshot) -> RowerDataFields {
    let elapsed = snapshot.elapsed_time_secs;

    let avg_stroke_rate = if elapsed > 0 {
        60.0 * snapshot.stroke_count as f64 / elapsed as f64
    } else {
        0.0
    };
    let avg_pace = if snapshot.total_distance_m > 0 {
        500.0 * elapsed as f64 / snapshot.total_distance_m as f64
    } else {
        0.0
    };
    let (energy_per_hour, energy_per_min) = if elapsed > 0 {
        let per_second = snapshot.total_calories as f64 / elapsed as f64;
        (3.6 * per_second, 0.06 * per_second)
    } else {
        (0.0, 0.0)
    };

    RowerDataFields {
        stroke: Some(StrokeInfo {
            // BLE stroke rate is in 0.5 strokes/minute
            rate_half_spm: clamp_u8(snapshot.stroke_rate_pm * 2.0),
            count: clamp_u16(snapshot.stroke_count as f64),
        }),
        avg_stroke_rate_half_spm: Some(clamp_u8(avg_stroke_rate * 2.0)),
        total_distance_m: Some(snapshot.total_distance_m),
        instant_pace_secs: Some(clamp_u16(snapshot.instant_500m_pace_secs as f64)),
        avg_pace_secs: Some(clamp_u16(avg_pace)),
        instant_power_watts: Some(clamp_i16(snapshot.instant_watts as f64)),
        avg_power_watts: None,
        resistance_level: None,
        energy: Some(ExpendedEnergy {
            total_kcal: Some(clamp_u16(snapshot.total_calories as f64)),
            per_hour_kcal: Some(clamp_u16(energy_per_hour)),
            per_minute_kcal: Some(clamp_u8(energy_per_min)),
        }),
        heart_rate_bpm: Some(clamp_u8(snapshot.heart_rate_bpm as f64)),
        metabolic_equivalent: None,
        elapsed_time_secs: Some(clamp_u16(elapsed as f64)),
        remaining_time_secs: None,
    }
}

fn clamp_u8(value: f64) -> u8 {
    value.round().clamp(0.0, u8::MAX as f64) as u8
}

fn clamp_u16(value: f64) -> u16 {
    value.round().clamp(0.0, u16::MAX as f64) as u16
}

fn clamp_i16(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}
