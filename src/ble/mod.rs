//! BLE publish surface: the payload encoders for the FTMS and HRS
//! profiles, and the adapter contract the GATT front end consumes.

pub mod adapter;
pub mod control_point;
pub mod hrs;
pub mod rower_data;
pub mod uuids;

pub use adapter::{DeviceInformation, TelemetryHub};
pub use rower_data::RowerDataFields;
