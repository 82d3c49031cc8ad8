//! WaterRower S4 serial interface.
//!
//! Layered bottom-up: [`memory`] describes the monitor's registers,
//! [`protocol`] translates between byte lines and typed events, [`flags`]
//! decodes the flag registers, [`connection`] owns the USB serial device,
//! and [`rower`] runs the capture and request-scheduler threads.

pub mod connection;
pub mod flags;
pub mod memory;
pub mod protocol;
pub mod rower;

use thiserror::Error;

/// Errors from the serial interface.
#[derive(Debug, Error)]
pub enum S4Error {
    /// Serial I/O failed
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port enumeration or open failed
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    /// Operation attempted while the port is closed
    #[error("serial port is not connected")]
    NotConnected,

    /// An on-demand request got no matching response in time
    #[error("timed out waiting for response with prefix {0}")]
    ResponseTimeout(String),

    /// A read was requested for a register the memory map does not list
    #[error("register for {0} is not in the memory map")]
    UnmappedField(String),

    /// Shutdown was requested while waiting
    #[error("shutdown in progress")]
    ShuttingDown,
}
