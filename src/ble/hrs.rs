//! Heart Rate Service measurement encoding (characteristic 0x2A37).

use crate::hr::monitor::HeartRateSample;

mod flag {
    pub const HR_FORMAT_U16: u8 = 1 << 0;
    pub const SENSOR_CONTACT_DETECTED: u8 = 1 << 1;
    pub const SENSOR_CONTACT_SUPPORTED: u8 = 1 << 2;
    pub const ENERGY_EXPENDED: u8 = 1 << 3;
    pub const RR_INTERVAL: u8 = 1 << 4;
}

/// Encode one Heart Rate Measurement notification.
///
/// The BPM is carried as uint8 when it fits, uint16 otherwise; skin
/// contact, energy expended and RR intervals are included when the sample
/// carries them.
pub fn encode_measurement(sample: &HeartRateSample) -> Vec<u8> {
    let mut flags = 0u8;
    let wide = sample.bpm > u8::MAX as u32;
    if wide {
        flags |= flag::HR_FORMAT_U16;
    }
    if let Some(contact) = sample.skin_contact {
        flags |= flag::SENSOR_CONTACT_SUPPORTED;
        if contact {
            flags |= flag::SENSOR_CONTACT_DETECTED;
        }
    }
    if sample.energy_expended.is_some() {
        flags |= flag::ENERGY_EXPENDED;
    }
    let has_rr = sample.rr_intervals.as_ref().is_some_and(|rr| !rr.is_empty());
    if has_rr {
        flags |= flag::RR_INTERVAL;
    }

    let mut payload = vec![flags];
    if wide {
        payload.extend_from_slice(&(sample.bpm.min(u16::MAX as u32) as u16).to_le_bytes());
    } else {
        payload.push(sample.bpm as u8);
    }
    if let Some(energy) = sample.energy_expended {
        payload.extend_from_slice(&energy.to_le_bytes());
    }
    if let Some(rr_intervals) = &sample.rr_intervals {
        for rr in rr_intervals {
            payload.extend_from_slice(&rr.to_le_bytes());
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr::monitor::HeartRateSource;

    #[test]
    fn test_plain_u8_measurement() {
        let sample = HeartRateSample::new(145, HeartRateSource::Ble);
        assert_eq!(encode_measurement(&sample), vec![0x00, 145]);
    }

    #[test]
    fn test_wide_bpm_uses_u16_format() {
        let sample = HeartRateSample::new(300, HeartRateSource::Ble);
        assert_eq!(encode_measurement(&sample), vec![0x01, 0x2C, 0x01]);
    }

    #[test]
    fn test_contact_and_energy_and_rr() {
        let sample = HeartRateSample {
            skin_contact: Some(true),
            energy_expended: Some(51),
            rr_intervals: Some(vec![818, 824]),
            ..HeartRateSample::new(145, HeartRateSource::Ble)
        };
        let payload = encode_measurement(&sample);
        // contact supported + detected + energy + RR
        assert_eq!(payload[0], 0x02 | 0x04 | 0x08 | 0x10);
        assert_eq!(payload[1], 145);
        assert_eq!(&payload[2..4], &51u16.to_le_bytes());
        assert_eq!(&payload[4..6], &818u16.to_le_bytes());
        assert_eq!(&payload[6..8], &824u16.to_le_bytes());
    }

    #[test]
    fn test_contact_supported_but_absent() {
        let sample = HeartRateSample {
            skin_contact: Some(false),
            ..HeartRateSample::new(90, HeartRateSource::AntPlus)
        };
        assert_eq!(encode_measurement(&sample), vec![0x04, 90]);
    }
}
