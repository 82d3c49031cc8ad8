//! S4 wire protocol: the command/response alphabet and the line codec.
//!
//! Everything on the wire is CRLF-terminated ASCII. Requests are upper-cased
//! before transmission; memory reads carry a size prefix chosen from the
//! memory map entry for the address.

use crate::clock;
use crate::s4::memory::{self, Endian, FieldKind, MemoryField, Size};

// Requests sent to the monitor.
pub const USB_REQUEST: &str = "USB";
pub const MODEL_INFORMATION_REQUEST: &str = "IV?";
pub const RESET_REQUEST: &str = "RESET";
pub const EXIT_REQUEST: &str = "EXIT";

// Responses received from the monitor.
pub const WR_RESPONSE: &str = "_WR_";
pub const MODEL_INFORMATION_RESPONSE: &str = "IV";
pub const READ_MEMORY_RESPONSE: &str = "ID";
pub const STROKE_START_RESPONSE: &str = "SS";
pub const STROKE_END_RESPONSE: &str = "SE";
pub const PULSE_COUNT_RESPONSE: &str = "P";
pub const OK_RESPONSE: &str = "OK";
pub const PING_RESPONSE: &str = "PING";
pub const ERROR_RESPONSE: &str = "ERROR";
pub const KEYPAD_RESET_RESPONSE: &str = "AKR";
pub const KEYPAD_RESPONSE_PREFIX: &str = "AK";

/// Distance unit codes used by the workout configuration commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Metres = 1,
    Miles = 2,
    Kilometres = 3,
    Strokes = 4,
}

/// Intensity-window display selections (`DI…` command family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityDisplay {
    MetresPerSec,
    MilesPerHour,
    Pace500m,
    Pace2km,
    Watts,
    CaloriesPerHour,
}

impl IntensityDisplay {
    pub fn command(self) -> &'static str {
        match self {
            IntensityDisplay::MetresPerSec => "DIMS",
            IntensityDisplay::MilesPerHour => "DIMPH",
            IntensityDisplay::Pace500m => "DI500",
            IntensityDisplay::Pace2km => "DI2KM",
            IntensityDisplay::Watts => "DIWA",
            IntensityDisplay::CaloriesPerHour => "DICH",
        }
    }
}

/// Distance-window display selections (`DD…` command family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceDisplay {
    Metres,
    Miles,
    Kilometres,
    Strokes,
}

impl DistanceDisplay {
    pub fn command(self) -> &'static str {
        match self {
            DistanceDisplay::Metres => "DDME",
            DistanceDisplay::Miles => "DDMI",
            DistanceDisplay::Kilometres => "DDKM",
            DistanceDisplay::Strokes => "DDST",
        }
    }
}

/// Build the memory-read request for a mapped register.
pub fn read_request(field: &MemoryField) -> String {
    format!("{}{}", field.size.request_prefix(), field.address)
}

/// Build the expected response prefix for a memory-read request.
pub fn read_response_prefix(field: &MemoryField) -> String {
    format!("{}{}", field.size.response_prefix(), field.address)
}

/// Define a single-distance workout of `target` in `unit`.
pub fn set_distance_workout(unit: DistanceUnit, target: u16) -> String {
    format!("WSI{}{:04X}", unit as u8, target)
}

/// Define a single-duration workout of `seconds`.
pub fn set_duration_workout(seconds: u16) -> String {
    format!("WSU{:04X}", seconds)
}

/// Begin defining a distance-interval workout with its first work leg.
pub fn begin_distance_intervals(unit: DistanceUnit, target: u16) -> String {
    format!("WII{}{:04X}", unit as u8, target)
}

/// Begin defining a duration-interval workout with its first work leg.
pub fn begin_duration_intervals(seconds: u16) -> String {
    format!("WIU{:04X}", seconds)
}

/// Append an interval: a rest period followed by the next work leg.
pub fn add_interval(rest_seconds: u16, work_target: u16) -> String {
    format!("WIN{:04X}{:04X}", rest_seconds, work_target)
}

/// Terminate the interval definition after a final rest period.
pub fn end_intervals(rest_seconds: u16) -> String {
    format!("WINFFFF{:04X}", rest_seconds)
}

/// Model and firmware reported by the `IV?` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Monitor series, `4` or `5`.
    pub model: char,
    /// Firmware version as `major.minor`, e.g. `02.10`.
    pub firmware: String,
}

impl ModelInfo {
    /// Parse an `IV{M}{HH}{LL}` response line.
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(MODEL_INFORMATION_RESPONSE)?;
        let model = rest.chars().next()?;
        let major = rest.get(1..3)?;
        let minor = rest.get(3..5)?;
        Some(ModelInfo {
            model,
            firmware: format!("{major}.{minor}"),
        })
    }
}

/// Identity of a parsed response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StrokeStart,
    StrokeEnd,
    Pulse,
    Ping,
    Ok,
    Model,
    Error,
    WrHello,
    Reset,
    MemoryRead(FieldKind),
}

/// One decoded line from the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S4Event {
    pub kind: EventKind,
    /// Decoded register value; present only for memory reads.
    pub value: Option<u32>,
    /// The verbatim decoded text line.
    pub raw: String,
    /// Monotonic milliseconds captured at parse time.
    pub at: u64,
}

impl S4Event {
    pub fn new(kind: EventKind, raw: &str) -> Self {
        S4Event {
            kind,
            value: None,
            raw: raw.to_string(),
            at: clock::now_ms(),
        }
    }

    /// Parse one CRLF-stripped line from the monitor.
    ///
    /// Unrecognised lines (including the interactive keypad family other
    /// than `AKR`) are logged and dropped; a single bad frame never stops
    /// the stream.
    pub fn parse_line(line: &str) -> Option<S4Event> {
        let cmd = line.trim_end_matches(['\r', '\n']).trim();
        if cmd.is_empty() {
            return None;
        }

        match cmd {
            STROKE_START_RESPONSE => Some(S4Event::new(EventKind::StrokeStart, cmd)),
            STROKE_END_RESPONSE => Some(S4Event::new(EventKind::StrokeEnd, cmd)),
            OK_RESPONSE => Some(S4Event::new(EventKind::Ok, cmd)),
            PING_RESPONSE => Some(S4Event::new(EventKind::Ping, cmd)),
            ERROR_RESPONSE => Some(S4Event::new(EventKind::Error, cmd)),
            WR_RESPONSE => Some(S4Event::new(EventKind::WrHello, cmd)),
            KEYPAD_RESET_RESPONSE => Some(S4Event::new(EventKind::Reset, cmd)),
            _ if cmd.starts_with(READ_MEMORY_RESPONSE) => decode_read_reply(cmd),
            _ if cmd.starts_with(MODEL_INFORMATION_RESPONSE) => {
                Some(S4Event::new(EventKind::Model, cmd))
            }
            _ if cmd.starts_with(PULSE_COUNT_RESPONSE) => {
                Some(S4Event::new(EventKind::Pulse, cmd))
            }
            _ if cmd.starts_with(KEYPAD_RESPONSE_PREFIX) => {
                tracing::debug!(line = cmd, "ignoring interactive keypad response");
                None
            }
            _ => {
                tracing::warn!(line = cmd, "unrecognised line from S4");
                None
            }
        }
    }
}

/// Decode an `ID{S|D|T}{AAA}{digits}` memory-read response.
fn decode_read_reply(cmd: &str) -> Option<S4Event> {
    let Some(address) = cmd.get(3..6) else {
        tracing::warn!(line = cmd, "memory-read response too short to contain an address");
        return None;
    };
    let Some(field) = memory::field_at(address) else {
        tracing::warn!(address, line = cmd, "memory-read response for unmapped address");
        return None;
    };

    let digits = field.size.digits();
    let Some(value_str) = cmd.get(6..6 + digits) else {
        tracing::warn!(line = cmd, ?field.kind, "memory-read response truncated");
        return None;
    };

    let value = match decode_value(value_str, field) {
        Some(v) => v,
        None => {
            tracing::warn!(line = cmd, value = value_str, "invalid number in memory-read response");
            return None;
        }
    };

    Some(S4Event {
        kind: EventKind::MemoryRead(field.kind),
        value: Some(value),
        raw: cmd.to_string(),
        at: clock::now_ms(),
    })
}

/// Parse the digit run of a memory-read response, reversing byte order for
/// little-endian registers.
fn decode_value(value_str: &str, field: &MemoryField) -> Option<u32> {
    if field.endian == Endian::Little && field.size != Size::Single {
        // Parse byte by byte and recombine low byte first.
        let mut value: u32 = 0;
        for (i, chunk) in value_str.as_bytes().chunks(2).enumerate() {
            let byte = u32::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
            value |= byte << (8 * i);
        }
        Some(value)
    } else {
        u32::from_str_radix(value_str, field.base.radix()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> S4Event {
        S4Event::parse_line(line).expect("line should parse")
    }

    #[test]
    fn test_parse_simple_responses() {
        assert_eq!(parse("SS").kind, EventKind::StrokeStart);
        assert_eq!(parse("SE").kind, EventKind::StrokeEnd);
        assert_eq!(parse("OK").kind, EventKind::Ok);
        assert_eq!(parse("PING").kind, EventKind::Ping);
        assert_eq!(parse("ERROR").kind, EventKind::Error);
        assert_eq!(parse("_WR_").kind, EventKind::WrHello);
        assert_eq!(parse("AKR").kind, EventKind::Reset);
        assert_eq!(parse("P01").kind, EventKind::Pulse);
        assert_eq!(parse("IV40210").kind, EventKind::Model);
    }

    #[test]
    fn test_parse_strips_crlf() {
        let event = parse("SS\r\n");
        assert_eq!(event.kind, EventKind::StrokeStart);
        assert_eq!(event.raw, "SS");
    }

    #[test]
    fn test_parse_drops_noise() {
        assert!(S4Event::parse_line("").is_none());
        assert!(S4Event::parse_line("BOGUS").is_none());
        // Keypad responses other than reset are ignored
        assert!(S4Event::parse_line("AK5").is_none());
    }

    #[test]
    fn test_decode_single_hex() {
        let event = parse("IDS05460");
        assert_eq!(event.kind, EventKind::MemoryRead(FieldKind::TotalDistanceDec));
        assert_eq!(event.value, Some(0x60));
    }

    #[test]
    fn test_decode_stroke_period() {
        // 0x60 = 96 quarter-25ms periods = 2400 ms whole-stroke time
        let event = parse("IDS14260");
        assert_eq!(event.kind, EventKind::MemoryRead(FieldKind::AvgTimeStrokeWhole));
        assert_eq!(event.value, Some(96));
    }

    #[test]
    fn test_decode_double_big_endian() {
        let event = parse("IDD05500B0");
        assert_eq!(event.kind, EventKind::MemoryRead(FieldKind::TotalDistance));
        assert_eq!(event.value, Some(176));
    }

    #[test]
    fn test_decode_triple_big_endian() {
        let event = parse("IDT08A0003E8");
        assert_eq!(event.kind, EventKind::MemoryRead(FieldKind::TotalCalories));
        assert_eq!(event.value, Some(1000));
    }

    #[test]
    fn test_decode_little_endian_pace() {
        // Register 1A5 is little endian: bytes 7C 00 decode as 0x007C = 124
        let event = parse("IDD1A57C00");
        assert_eq!(event.kind, EventKind::MemoryRead(FieldKind::Pace500m));
        assert_eq!(event.value, Some(124));
    }

    #[test]
    fn test_decode_little_endian_zone_bound() {
        let event = parse("IDD0920102");
        assert_eq!(event.kind, EventKind::MemoryRead(FieldKind::ZoneMpsUpper));
        assert_eq!(event.value, Some(0x0201));
    }

    #[test]
    fn test_decode_decimal_clock_component() {
        let event = parse("IDS1E159");
        assert_eq!(event.kind, EventKind::MemoryRead(FieldKind::DisplaySeconds));
        assert_eq!(event.value, Some(59));
    }

    #[test]
    fn test_decode_rejects_bad_responses() {
        // Unmapped address
        assert!(S4Event::parse_line("IDS77701").is_none());
        // Truncated value
        assert!(S4Event::parse_line("IDD05500").is_none());
        // Non-numeric digits
        assert!(S4Event::parse_line("IDS1E1XZ").is_none());
        // Too short to hold an address
        assert!(S4Event::parse_line("IDS05").is_none());
    }

    #[test]
    fn test_memory_read_round_trips() {
        for line in ["IDS05460", "IDD05500B0", "IDT08A0003E8", "IDD1A57C00"] {
            let first = parse(line);
            let second = parse(&first.raw);
            assert_eq!(first.kind, second.kind);
            assert_eq!(first.value, second.value);
            assert_eq!(first.raw, second.raw);
        }
    }

    #[test]
    fn test_read_request_uses_size_prefix() {
        let field = memory::field_at("055").unwrap();
        assert_eq!(read_request(field), "IRD055");
        assert_eq!(read_response_prefix(field), "IDD055");

        let field = memory::field_at("08A").unwrap();
        assert_eq!(read_request(field), "IRT08A");

        let field = memory::field_at("1E0").unwrap();
        assert_eq!(read_request(field), "IRS1E0");
    }

    #[test]
    fn test_workout_commands() {
        assert_eq!(set_distance_workout(DistanceUnit::Metres, 2000), "WSI107D0");
        assert_eq!(set_duration_workout(1200), "WSU04B0");
        assert_eq!(begin_duration_intervals(300), "WIU012C");
        assert_eq!(add_interval(60, 300), "WIN003C012C");
        assert_eq!(end_intervals(60), "WINFFFF003C");
        assert_eq!(IntensityDisplay::Pace500m.command(), "DI500");
        assert_eq!(DistanceDisplay::Kilometres.command(), "DDKM");
    }

    #[test]
    fn test_model_info_parse() {
        let info = ModelInfo::parse("IV40210").unwrap();
        assert_eq!(info.model, '4');
        assert_eq!(info.firmware, "02.10");

        assert!(ModelInfo::parse("IV4").is_none());
        assert!(ModelInfo::parse("SS").is_none());
    }
}
