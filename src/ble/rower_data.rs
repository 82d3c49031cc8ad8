//! FTMS Rower Data payload encoding.
//!
//! The Rower Data characteristic (0x2AD1) carries two little-endian flag
//! bytes followed by the enabled fields in the order the flag bitmap
//! declares them. The stroke group's flag bit has inverted meaning in the
//! spec: a cleared bit means the stroke fields are present.

/// Flag bits of the Rower Data characteristic.
pub mod flags {
    /// Stroke rate and stroke count; inverted, cleared means present.
    pub const STROKE_INFO: u16 = 1 << 0;
    pub const AVERAGE_STROKE_RATE: u16 = 1 << 1;
    pub const TOTAL_DISTANCE: u16 = 1 << 2;
    pub const INSTANT_PACE: u16 = 1 << 3;
    pub const AVERAGE_PACE: u16 = 1 << 4;
    pub const INSTANT_POWER: u16 = 1 << 5;
    pub const AVERAGE_POWER: u16 = 1 << 6;
    pub const RESISTANCE_LEVEL: u16 = 1 << 7;
    /// Total energy, energy/hour and energy/min travel together.
    pub const EXPENDED_ENERGY: u16 = 1 << 8;
    pub const HEART_RATE: u16 = 1 << 9;
    pub const METABOLIC_EQUIVALENT: u16 = 1 << 10;
    pub const ELAPSED_TIME: u16 = 1 << 11;
    pub const REMAINING_TIME: u16 = 1 << 12;
}

/// Sentinels for energy sub-fields the machine does not report.
const ENERGY_SENTINEL_U16: u16 = 0xFFFF;
const ENERGY_SENTINEL_U8: u8 = 0xFF;

/// Stroke rate and count, always transmitted together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeInfo {
    /// Strokes per minute in 0.5 spm resolution.
    pub rate_half_spm: u8,
    pub count: u16,
}

/// The expended-energy group. Sub-fields the machine cannot supply are
/// encoded as the spec's sentinel values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpendedEnergy {
    pub total_kcal: Option<u16>,
    pub per_hour_kcal: Option<u16>,
    pub per_minute_kcal: Option<u8>,
}

/// Field values for one Rower Data notification. Absent fields are left
/// out of the payload and their flag bits cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowerDataFields {
    pub stroke: Option<StrokeInfo>,
    /// Average strokes per minute in 0.5 spm resolution.
    pub avg_stroke_rate_half_spm: Option<u8>,
    /// Metres, encoded as uint24.
    pub total_distance_m: Option<u32>,
    /// Seconds per 500 m.
    pub instant_pace_secs: Option<u16>,
    pub avg_pace_secs: Option<u16>,
    pub instant_power_watts: Option<i16>,
    pub avg_power_watts: Option<i16>,
    pub resistance_level: Option<u8>,
    pub energy: Option<ExpendedEnergy>,
    pub heart_rate_bpm: Option<u8>,
    pub metabolic_equivalent: Option<u8>,
    pub elapsed_time_secs: Option<u16>,
    pub remaining_time_secs: Option<u16>,
}

/// Encode one notification payload.
pub fn encode(fields: &RowerDataFields) -> Vec<u8> {
    let mut flag_bits: u16 = 0;
    let mut body: Vec<u8> = Vec::with_capacity(28);

    if let Some(stroke) = fields.stroke {
        flag_bits |= flags::STROKE_INFO;
        body.push(stroke.rate_half_spm);
        body.extend_from_slice(&stroke.count.to_le_bytes());
    }
    if let Some(rate) = fields.avg_stroke_rate_half_spm {
        flag_bits |= flags::AVERAGE_STROKE_RATE;
        body.push(rate);
    }
    if let Some(distance) = fields.total_distance_m {
        flag_bits |= flags::TOTAL_DISTANCE;
        body.extend_from_slice(&distance.to_le_bytes()[..3]);
    }
    if let Some(pace) = fields.instant_pace_secs {
        flag_bits |= flags::INSTANT_PACE;
        body.extend_from_slice(&pace.to_le_bytes());
    }
    if let Some(pace) = fields.avg_pace_secs {
        flag_bits |= flags::AVERAGE_PACE;
        body.extend_from_slice(&pace.to_le_bytes());
    }
    if let Some(power) = fields.instant_power_watts {
        flag_bits |= flags::INSTANT_POWER;
        body.extend_from_slice(&power.to_le_bytes());
    }
    if let Some(power) = fields.avg_power_watts {
        flag_bits |= flags::AVERAGE_POWER;
        body.extend_from_slice(&power.to_le_bytes());
    }
    if let Some(level) = fields.resistance_level {
        flag_bits |= flags::RESISTANCE_LEVEL;
        body.push(level);
    }
    if let Some(energy) = fields.energy {
        flag_bits |= flags::EXPENDED_ENERGY;
        body.extend_from_slice(
            &energy.total_kcal.unwrap_or(ENERGY_SENTINEL_U16).to_le_bytes(),
        );
        body.extend_from_slice(
            &energy.per_hour_kcal.unwrap_or(ENERGY_SENTINEL_U16).to_le_bytes(),
        );
        body.push(energy.per_minute_kcal.unwrap_or(ENERGY_SENTINEL_U8));
    }
    if let Some(bpm) = fields.heart_rate_bpm {
        flag_bits |= flags::HEART_RATE;
        body.push(bpm);
    }
    if let Some(met) = fields.metabolic_equivalent {
        flag_bits |= flags::METABOLIC_EQUIVALENT;
        body.push(met);
    }
    if let Some(elapsed) = fields.elapsed_time_secs {
        flag_bits |= flags::ELAPSED_TIME;
        body.extend_from_slice(&elapsed.to_le_bytes());
    }
    if let Some(remaining) = fields.remaining_time_secs {
        flag_bits |= flags::REMAINING_TIME;
        body.extend_from_slice(&remaining.to_le_bytes());
    }

    // The stroke bit means "more data" on the wire, so its sense flips.
    flag_bits ^= flags::STROKE_INFO;

    let mut payload = Vec::with_capacity(2 + body.len());
    payload.extend_from_slice(&flag_bits.to_le_bytes());
    payload.extend_from_slice(&body);
    payload
}

/// Fitness Machine Feature bits (characteristic 0x2ACC, octets 0..1).
pub mod feature {
    pub const AVERAGE_SPEED: u64 = 1 << 0;
    pub const CADENCE: u64 = 1 << 1;
    pub const TOTAL_DISTANCE: u64 = 1 << 2;
    pub const INCLINATION: u64 = 1 << 3;
    pub const ELEVATION_GAIN: u64 = 1 << 4;
    pub const PACE: u64 = 1 << 5;
    pub const STEP_COUNT: u64 = 1 << 6;
    pub const RESISTANCE_LEVEL: u64 = 1 << 7;
    pub const STRIDE_COUNT: u64 = 1 << 8;
    pub const EXPENDED_ENERGY: u64 = 1 << 9;
    pub const HEART_RATE_MEASUREMENT: u64 = 1 << 10;
    pub const METABOLIC_EQUIVALENT: u64 = 1 << 11;
    pub const ELAPSED_TIME: u64 = 1 << 12;
    pub const REMAINING_TIME: u64 = 1 << 13;
    pub const POWER_MEASUREMENT: u64 = 1 << 14;
    pub const FORCE_MEASUREMENT: u64 = 1 << 15;
}

/// The feature set matching the fields [`encode`] is fed by this daemon:
/// cadence (stroke rate), distance, pace, power, energy, heart rate and
/// elapsed time.
pub fn supported_features() -> u64 {
    feature::CADENCE
        | feature::TOTAL_DISTANCE
        | feature::PACE
        | feature::EXPENDED_ENERGY
        | feature::HEART_RATE_MEASUREMENT
        | feature::ELAPSED_TIME
        | feature::POWER_MEASUREMENT
}

/// Encode the Fitness Machine Feature characteristic value: an 8-byte
/// little-endian bitfield (machine features only, no target settings).
pub fn encode_features(features: u64) -> [u8; 8] {
    features.to_le_bytes()
}

/// Service data for the FTMS advertisement: flags byte declaring the
/// machine available, then the machine-type bitfield with the rower bit
/// set, little endian.
pub fn advertisement_service_data() -> [u8; 3] {
    [0x01, 0x10, 0x00]
}
