//! Static description of the S4 memory registers.
//!
//! The memory map records, for every register the daemon knows about, how
//! many bytes the datum occupies, the numerical base of its ASCII encoding,
//! the byte order, and which polling loop (if any) should request it.
//!
//! Note: the vendor protocol document suggests double-byte primary data is
//! little endian and computed data big endian. Observed behaviour on real
//! monitors is exactly the opposite, and the table below reflects that.

use std::fmt;

/// Number of bytes a register occupies, and therefore which read command
/// (`IRS`/`IRD`/`IRT`) requests it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Single,
    Double,
    Triple,
}

impl Size {
    /// Bytes occupied by the register.
    pub fn bytes(self) -> usize {
        match self {
            Size::Single => 1,
            Size::Double => 2,
            Size::Triple => 3,
        }
    }

    /// ASCII digits used to encode the value on the wire (two per byte).
    pub fn digits(self) -> usize {
        self.bytes() * 2
    }

    /// Request prefix for this size.
    pub fn request_prefix(self) -> &'static str {
        match self {
            Size::Single => "IRS",
            Size::Double => "IRD",
            Size::Triple => "IRT",
        }
    }

    /// Response prefix for this size.
    pub fn response_prefix(self) -> &'static str {
        match self {
            Size::Single => "IDS",
            Size::Double => "IDD",
            Size::Triple => "IDT",
        }
    }
}

/// Numerical base of the ASCII-coded register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Decimal,
    Hex,
}

impl Base {
    pub fn radix(self) -> u32 {
        match self {
            Base::Decimal => 10,
            Base::Hex => 16,
        }
    }
}

/// Byte order of multi-byte registers as delivered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Which request loop polls the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    High,
    Low,
}

/// Register family, used to gate polling on and off as a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Rowing,
    State,
    Workout,
    WorkoutStat,
    Zone,
    Intensity,
    Distance,
    Duration,
    Program,
    HeartRate,
    StrokeRate,
    Miscellaneous,
    Display,
}

impl Category {
    /// All categories, in a stable order (used to size/iterate gate tables).
    pub const ALL: [Category; 13] = [
        Category::Rowing,
        Category::State,
        Category::Workout,
        Category::WorkoutStat,
        Category::Zone,
        Category::Intensity,
        Category::Distance,
        Category::Duration,
        Category::Program,
        Category::HeartRate,
        Category::StrokeRate,
        Category::Miscellaneous,
        Category::Display,
    ];

    /// Categories polled by default at startup. The rest are enabled on
    /// demand when the aggregator detects a workout or zone flag change.
    pub fn enabled_by_default(self) -> bool {
        matches!(self, Category::Rowing | Category::State | Category::Program)
    }

    pub(crate) fn index(self) -> usize {
        Category::ALL.iter().position(|c| *c == self).unwrap_or(0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Rowing => "rowing",
            Category::State => "state",
            Category::Workout => "workout",
            Category::WorkoutStat => "workout_stat",
            Category::Zone => "zone",
            Category::Intensity => "intensity",
            Category::Distance => "distance",
            Category::Duration => "duration",
            Category::Program => "program",
            Category::HeartRate => "heart_rate",
            Category::StrokeRate => "stroke_rate",
            Category::Miscellaneous => "miscellaneous",
            Category::Display => "display",
        };
        write!(f, "{name}")
    }
}

/// Identity of a decoded register value.
///
/// Workout legs carry their 1-based leg index so downstream code can place
/// them without re-parsing names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    ScreenMode,
    ScreenSubMode,
    IntervalsRemaining,
    WorkoutFlags,
    FunctionFlags,
    IntensityDisplayFlags,
    DistanceDisplayFlags,
    ProgramDisplayFlags,
    MiscDisplayFlags,
    TotalDistance,
    TotalDistanceDec,
    Watts,
    TotalCalories,
    ZoneHrUpper,
    ZoneHrLower,
    ZoneMpsUpper,
    ZoneMpsLower,
    ZoneMphUpper,
    ZoneMphLower,
    Zone500mUpper,
    Zone500mLower,
    Zone2kmUpper,
    Zone2kmLower,
    ZoneStrokeRateUpper,
    ZoneStrokeRateLower,
    TankVolume,
    StrokeCount,
    AvgTimeStrokeWhole,
    AvgTimeStrokePull,
    AvgSpeedCmps,
    HeartRate,
    Pace500m,
    StrokeRateInt,
    DisplayHours,
    DisplayMinutes,
    DisplaySeconds,
    DisplaySecDec,
    WorkoutTotalTime,
    WorkoutTotalMetres,
    WorkoutTotalStrokes,
    WorkoutWork(u8),
    WorkoutRest(u8),
    WorkoutIntervals,
}

/// Static description of one S4 register.
#[derive(Debug, Clone, Copy)]
pub struct MemoryField {
    /// Three-hex-digit register address.
    pub address: &'static str,
    pub kind: FieldKind,
    pub size: Size,
    pub base: Base,
    pub endian: Endian,
    pub frequency: Frequency,
    pub category: Category,
    /// Readable on demand but skipped by the polling loops.
    pub exclude_from_poll_loop: bool,
}

macro_rules! field {
    ($addr:literal, $kind:expr, $size:ident, $base:ident, $endian:ident, $freq:ident, $cat:ident) => {
        field!($addr, $kind, $size, $base, $endian, $freq, $cat, false)
    };
    ($addr:literal, $kind:expr, $size:ident, $base:ident, $endian:ident, $freq:ident, $cat:ident, $excl:expr) => {
        MemoryField {
            address: $addr,
            kind: $kind,
            size: Size::$size,
            base: Base::$base,
            endian: Endian::$endian,
            frequency: Frequency::$freq,
            category: Category::$cat,
            exclude_from_poll_loop: $excl,
        }
    };
}

/// The register map, in polling order.
///
/// Declaration order matters: the clock components are listed most
/// significant first (hours before tenths) so that a tick between component
/// reads cannot produce a large apparent jump, and the metres component of
/// distance precedes the centimetres component.
pub static MEMORY_MAP: &[MemoryField] = &[
    // Screen state
    field!("00D", FieldKind::ScreenMode, Single, Hex, Big, Low, State),
    field!("00E", FieldKind::ScreenSubMode, Single, Hex, Big, Low, State),
    field!("00F", FieldKind::IntervalsRemaining, Single, Hex, Big, Low, State),
    // Flag registers
    field!("03E", FieldKind::WorkoutFlags, Single, Hex, Big, Low, State),
    field!("03F", FieldKind::FunctionFlags, Single, Hex, Big, Low, State),
    field!("041", FieldKind::IntensityDisplayFlags, Single, Hex, Big, Low, Intensity),
    field!("042", FieldKind::DistanceDisplayFlags, Single, Hex, Big, Low, Distance),
    field!("044", FieldKind::ProgramDisplayFlags, Single, Hex, Big, Low, Program, true),
    // Polled so zone-bound edits, which flip no workout-mode bits, are
    // still noticed.
    field!("047", FieldKind::MiscDisplayFlags, Single, Hex, Big, Low, State),
    // Fundamental rowing data
    field!("055", FieldKind::TotalDistance, Double, Hex, Big, High, Rowing),
    field!("054", FieldKind::TotalDistanceDec, Single, Hex, Big, High, Rowing),
    field!("088", FieldKind::Watts, Double, Hex, Big, High, Rowing),
    field!("08A", FieldKind::TotalCalories, Triple, Hex, Big, High, Rowing),
    // Zone boundary values
    field!("090", FieldKind::ZoneHrUpper, Single, Hex, Big, Low, Zone),
    field!("091", FieldKind::ZoneHrLower, Single, Hex, Big, Low, Zone),
    field!("092", FieldKind::ZoneMpsUpper, Double, Hex, Little, Low, Zone),
    field!("094", FieldKind::ZoneMpsLower, Double, Hex, Little, Low, Zone),
    field!("096", FieldKind::ZoneMphUpper, Double, Hex, Little, Low, Zone),
    field!("098", FieldKind::ZoneMphLower, Double, Hex, Little, Low, Zone),
    field!("09A", FieldKind::Zone500mUpper, Double, Hex, Little, Low, Zone),
    field!("09C", FieldKind::Zone500mLower, Double, Hex, Little, Low, Zone),
    field!("09E", FieldKind::Zone2kmUpper, Double, Hex, Little, Low, Zone),
    field!("0A0", FieldKind::Zone2kmLower, Double, Hex, Little, Low, Zone),
    field!("0A2", FieldKind::ZoneStrokeRateUpper, Single, Hex, Big, Low, Zone),
    field!("0A3", FieldKind::ZoneStrokeRateLower, Single, Hex, Big, Low, Zone),
    // Tank volume in decilitres
    field!("0A9", FieldKind::TankVolume, Single, Hex, Big, Low, Miscellaneous),
    // Stroke counters
    field!("140", FieldKind::StrokeCount, Double, Hex, Big, High, Rowing),
    field!("142", FieldKind::AvgTimeStrokeWhole, Single, Hex, Big, High, Rowing),
    field!("143", FieldKind::AvgTimeStrokePull, Single, Hex, Big, High, Rowing),
    // Speed
    field!("14A", FieldKind::AvgSpeedCmps, Double, Hex, Big, High, Rowing),
    // Zone maths inputs
    field!("1A0", FieldKind::HeartRate, Single, Hex, Big, High, Rowing),
    // Available only while the corresponding unit is shown on the monitor;
    // polled on demand and normally derived from speed instead.
    field!("1A5", FieldKind::Pace500m, Double, Hex, Little, High, Rowing, true),
    // Integer strokes/min; derived from the whole-stroke period instead.
    field!("1A9", FieldKind::StrokeRateInt, Single, Hex, Big, High, Rowing, true),
    // Clock display, most significant component first
    field!("1E3", FieldKind::DisplayHours, Single, Decimal, Big, High, Rowing),
    field!("1E2", FieldKind::DisplayMinutes, Single, Decimal, Big, High, Rowing),
    field!("1E1", FieldKind::DisplaySeconds, Single, Decimal, Big, High, Rowing),
    field!("1E0", FieldKind::DisplaySecDec, Single, Decimal, Big, High, Rowing),
    // Workout tallies, updated at the end of each work interval
    field!("1E8", FieldKind::WorkoutTotalTime, Double, Hex, Big, Low, WorkoutStat),
    field!("1EA", FieldKind::WorkoutTotalMetres, Double, Hex, Big, Low, WorkoutStat),
    field!("1EC", FieldKind::WorkoutTotalStrokes, Double, Hex, Big, Low, WorkoutStat),
    // Workout work/rest legs
    field!("1B0", FieldKind::WorkoutWork(1), Double, Hex, Big, Low, Workout),
    field!("1B2", FieldKind::WorkoutRest(1), Double, Hex, Big, Low, Workout),
    field!("1B4", FieldKind::WorkoutWork(2), Double, Hex, Big, Low, Workout),
    field!("1B6", FieldKind::WorkoutRest(2), Double, Hex, Big, Low, Workout),
    field!("1B8", FieldKind::WorkoutWork(3), Double, Hex, Big, Low, Workout),
    field!("1BA", FieldKind::WorkoutRest(3), Double, Hex, Big, Low, Workout),
    field!("1BC", FieldKind::WorkoutWork(4), Double, Hex, Big, Low, Workout),
    field!("1BE", FieldKind::WorkoutRest(4), Double, Hex, Big, Low, Workout),
    field!("1C0", FieldKind::WorkoutWork(5), Double, Hex, Big, Low, Workout),
    field!("1C2", FieldKind::WorkoutRest(5), Double, Hex, Big, Low, Workout),
    field!("1C4", FieldKind::WorkoutWork(6), Double, Hex, Big, Low, Workout),
    field!("1C6", FieldKind::WorkoutRest(6), Double, Hex, Big, Low, Workout),
    field!("1C8", FieldKind::WorkoutWork(7), Double, Hex, Big, Low, Workout),
    field!("1CA", FieldKind::WorkoutRest(7), Double, Hex, Big, Low, Workout),
    field!("1CC", FieldKind::WorkoutWork(8), Double, Hex, Big, Low, Workout),
    field!("1CE", FieldKind::WorkoutRest(8), Double, Hex, Big, Low, Workout),
    field!("1D0", FieldKind::WorkoutWork(9), Double, Hex, Big, Low, Workout),
    // Total number of work and rest periods, plus one
    field!("1D9", FieldKind::WorkoutIntervals, Single, Hex, Big, Low, Workout),
];

/// Look up the register at `address` (three hex digits, upper case).
pub fn field_at(address: &str) -> Option<&'static MemoryField> {
    MEMORY_MAP.iter().find(|f| f.address == address)
}

/// Look up the register holding `kind`.
pub fn field_for(kind: FieldKind) -> Option<&'static MemoryField> {
    MEMORY_MAP.iter().find(|f| f.kind == kind)
}
