//! Freshness-gated heart-rate store and the fusion rule.
//!
//! One monitor instance holds the most recent externally sourced reading
//! (BLE strap, ANT+ bridge, or the rower's own register) together with the
//! descriptors the source advertises. Readings older than [`HRM_TIMEOUT`]
//! are treated as absent.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::state::snapshot::RowerSnapshot;

/// Age beyond which a stored reading no longer counts.
pub const HRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a heart-rate reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartRateSource {
    Ble,
    AntPlus,
    Rower,
}

/// One reading from a heart-rate source.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateSample {
    pub bpm: u32,
    pub source: HeartRateSource,
    /// RR intervals in 1/1024 s units, as carried by the HRS measurement.
    pub rr_intervals: Option<Vec<u16>>,
    /// Cumulative energy expended in kJ.
    pub energy_expended: Option<u16>,
    pub skin_contact: Option<bool>,
}

impl HeartRateSample {
    pub fn new(bpm: u32, source: HeartRateSource) -> Self {
        HeartRateSample {
            bpm,
            source,
            rr_intervals: None,
            energy_expended: None,
            skin_contact: None,
        }
    }
}

/// Descriptors advertised by the connected heart-rate device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: Option<String>,
    pub address: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub body_sensor_location: Option<String>,
}

#[derive(Debug, Default)]
struct MonitorInner {
    sample: Option<HeartRateSample>,
    /// Monotonic seconds at which the sample was recorded.
    measured_at: f64,
    device: DeviceDescriptor,
    battery_level: Option<u8>,
}

/// Thread-safe holder of the latest heart-rate reading.
#[derive(Debug)]
pub struct HeartRateMonitor {
    inner: Mutex<MonitorInner>,
    timeout: Duration,
}

impl Default for HeartRateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartRateMonitor {
    pub fn new() -> Self {
        Self::with_timeout(HRM_TIMEOUT)
    }

    /// A monitor with a non-default freshness window.
    pub fn with_timeout(timeout: Duration) -> Self {
        HeartRateMonitor {
            inner: Mutex::new(MonitorInner::default()),
            timeout,
        }
    }

    /// Store a new reading, stamping it with the monotonic clock.
    pub fn record(&self, sample: HeartRateSample) {
        self.record_at(sample, clock::now_secs());
    }

    fn record_at(&self, sample: HeartRateSample, at_secs: f64) {
        let mut inner = self.inner.lock().unwrap();
        tracing::debug!(bpm = sample.bpm, source = ?sample.source, "heart rate updated");
        inner.sample = Some(sample);
        inner.measured_at = at_secs;
    }

    pub fn update_device(&self, device: DeviceDescriptor) {
        let mut inner = self.inner.lock().unwrap();
        tracing::debug!(?device, "heart-rate device descriptor updated");
        inner.device = device;
    }

    pub fn update_battery(&self, level: u8) {
        self.inner.lock().unwrap().battery_level = Some(level);
    }

    pub fn device(&self) -> DeviceDescriptor {
        self.inner.lock().unwrap().device.clone()
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.inner.lock().unwrap().battery_level
    }

    /// The current BPM, or zero when no reading has been received within
    /// the freshness window.
    pub fn heart_rate(&self) -> u32 {
        self.heart_rate_at(clock::now_secs())
    }

    /// The stored sample, if it is still fresh and non-zero.
    pub fn current_sample(&self) -> Option<HeartRateSample> {
        if self.heart_rate() == 0 {
            return None;
        }
        self.inner.lock().unwrap().sample.clone()
    }

    fn heart_rate_at(&self, now_secs: f64) -> u32 {
        let inner = self.inner.lock().unwrap();
        let Some(sample) = &inner.sample else {
            return 0;
        };
        if sample.bpm == 0 {
            return 0;
        }
        let age = now_secs - inner.measured_at;
        if age < self.timeout.as_secs_f64() {
            sample.bpm
        } else {
            tracing::debug!(age_secs = age, "heart-rate reading is stale");
            0
        }
    }

    /// Fill the snapshot's heart rate from the external source when the
    /// rower itself reported none. Idempotent.
    pub fn inject(&self, snapshot: &mut RowerSnapshot) {
        if snapshot.heart_rate_bpm == 0 {
            let external = self.heart_rate();
            if external > 0 {
                snapshot.heart_rate_bpm = external;
            }
        }
    }
}
