//! The published telemetry tuple.

use serde::{Deserialize, Serialize};

/// One reading of the rower's derived telemetry.
///
/// This is the unit handed to the BLE publisher and any other consumer; it
/// is copied out of the aggregator under its lock, never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowerSnapshot {
    /// True while pulley pulses have been seen within the last 300 ms.
    pub paddle_turning: bool,
    /// Strokes per minute, derived from the whole-stroke period.
    pub stroke_rate_pm: f64,
    /// Strokes since reset.
    pub stroke_count: u32,
    /// Metres since reset.
    pub total_distance_m: u32,
    /// Instantaneous 500 m split in seconds.
    pub instant_500m_pace_secs: u32,
    /// Instantaneous average speed in cm/s.
    pub speed_cmps: u32,
    /// Smoothed instantaneous power in watts.
    pub instant_watts: u32,
    /// Calories since reset.
    pub total_calories: u32,
    /// Heart rate in BPM; zero until the fusion layer fills it in.
    pub heart_rate_bpm: u32,
    /// Whole seconds on the monitor's clock.
    pub elapsed_time_secs: u32,
    /// Recovery-to-drive stroke ratio.
    pub stroke_ratio: f64,
}

impl RowerSnapshot {
    /// The snapshot published while the paddle is stationary: totals are
    /// kept, instantaneous quantities are forced to zero.
    pub fn standstill(&self) -> RowerSnapshot {
        RowerSnapshot {
            paddle_turning: false,
            stroke_rate_pm: 0.0,
            instant_500m_pace_secs: 0,
            speed_cmps: 0,
            instant_watts: 0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_zero() {
        let snapshot = RowerSnapshot::default();
        assert!(!snapshot.paddle_turning);
        assert_eq!(snapshot.stroke_rate_pm, 0.0);
        assert_eq!(snapshot.stroke_count, 0);
        assert_eq!(snapshot.total_distance_m, 0);
        assert_eq!(snapshot.instant_500m_pace_secs, 0);
        assert_eq!(snapshot.speed_cmps, 0);
        assert_eq!(snapshot.instant_watts, 0);
        assert_eq!(snapshot.total_calories, 0);
        assert_eq!(snapshot.heart_rate_bpm, 0);
        assert_eq!(snapshot.elapsed_time_secs, 0);
        assert_eq!(snapshot.stroke_ratio, 0.0);
    }

    #[test]
    fn test_snapshot_serialises_for_side_channels() {
        let snapshot = RowerSnapshot {
            stroke_count: 12,
            total_distance_m: 250,
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"stroke_count\":12"));

        let back: RowerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_standstill_zeroes_instantaneous_fields_only() {
        let live = RowerSnapshot {
            paddle_turning: true,
            stroke_rate_pm: 24.5,
            stroke_count: 120,
            total_distance_m: 1500,
            instant_500m_pace_secs: 125,
            speed_cmps: 400,
            instant_watts: 180,
            total_calories: 90,
            heart_rate_bpm: 140,
            elapsed_time_secs: 360,
            stroke_ratio: 1.1,
        };

        let still = live.standstill();
        assert_eq!(still.stroke_rate_pm, 0.0);
        assert_eq!(still.instant_500m_pace_secs, 0);
        assert_eq!(still.speed_cmps, 0);
        assert_eq!(still.instant_watts, 0);
        assert!(!still.paddle_turning);

        assert_eq!(still.stroke_count, 120);
        assert_eq!(still.total_distance_m, 1500);
        assert_eq!(still.total_calories, 90);
        assert_eq!(still.heart_rate_bpm, 140);
        assert_eq!(still.elapsed_time_secs, 360);
        assert_eq!(still.stroke_ratio, 1.1);
    }
}
