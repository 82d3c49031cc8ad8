//! Heart-rate fusion and the analog heartbeat output.

pub mod monitor;
pub mod pulse;

pub use monitor::{DeviceDescriptor, HeartRateMonitor, HeartRateSample, HeartRateSource, HRM_TIMEOUT};
pub use pulse::{HeartbeatPulse, NullPulsePin, PulsePin};
