//! Derived rower state: the aggregator, its published snapshot, and the
//! workout and zone builders it drives.

pub mod aggregator;
pub mod snapshot;
pub mod workout;
pub mod zone;

pub use aggregator::{MetricSources, PaceSource, PowerSource, RowerState};
pub use snapshot::RowerSnapshot;
pub use workout::{WorkoutDefinition, WorkoutKind, WorkoutUnits};
pub use zone::{ZoneDefinition, ZoneKind, ZoneUnits};
