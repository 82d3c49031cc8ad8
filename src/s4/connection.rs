//! Ownership of the USB serial device.
//!
//! The monitor enumerates as a USB-CDC device whose descriptor contains
//! "WR-S4". The link runs at 19200 8N1 with CRLF-terminated ASCII lines in
//! both directions. Reads are bounded by a short timeout so the connection
//! lock is never held long; the blocking scan-and-retry cycle lives in the
//! supervisor loop, not here, for the same reason.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};

use crate::s4::protocol;
use crate::s4::S4Error;

/// Marker in the USB descriptor identifying the monitor.
const PORT_MARKER: &str = "WR-S4";

/// Delay between port-scan attempts while no monitor is plugged in.
pub const PORT_SCAN_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on a single blocking read, which also bounds how long the
/// reader holds the connection lock.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

const BAUD_RATE: u32 = 19_200;

/// One pass over the system's serial ports looking for the monitor.
pub fn scan_port() -> Option<String> {
    let ports = serialport::available_ports().ok()?;
    ports.into_iter().find(port_matches).map(|p| {
        tracing::info!(path = %p.port_name, "S4 serial port found");
        p.port_name
    })
}

fn port_matches(port: &serialport::SerialPortInfo) -> bool {
    if port.port_name.contains(PORT_MARKER) {
        return true;
    }
    if let SerialPortType::UsbPort(usb) = &port.port_type {
        if let Some(product) = &usb.product {
            return product.contains(PORT_MARKER);
        }
    }
    false
}

/// The serial link to the monitor.
///
/// Owned behind a mutex shared by the capture thread and both request
/// loops. All methods assume the caller holds that lock, and none of them
/// blocks beyond the read timeout.
pub struct S4Connection {
    port: Option<Box<dyn SerialPort>>,
    /// Bytes read ahead of the next complete line.
    buffer: Vec<u8>,
}

impl Default for S4Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl S4Connection {
    pub fn new() -> Self {
        S4Connection {
            port: None,
            buffer: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Open `path` and send the USB handshake. Any existing port is closed
    /// first. The `_WR_` acknowledgement arrives through the normal
    /// capture path; its absence is not fatal.
    pub fn open_path(&mut self, path: &str) -> Result<(), S4Error> {
        if self.port.is_some() {
            tracing::debug!("closing existing serial connection before reopen");
            self.port = None;
        }
        self.buffer.clear();

        let port = serialport::new(path, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()?;
        tracing::info!(path = %path, "serial port open");
        self.port = Some(port);

        tracing::info!("initiating communication with S4 monitor");
        self.write_line(protocol::USB_REQUEST)
    }

    /// Upper-case `line`, append CRLF, write and flush.
    pub fn write_line(&mut self, line: &str) -> Result<(), S4Error> {
        let port = self.port.as_mut().ok_or(S4Error::NotConnected)?;
        let framed = format!("{}\r\n", line.to_uppercase());
        port.write_all(framed.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    /// Return the next complete line, or `None` if nothing arrived within
    /// the read timeout. CR/LF framing is stripped.
    pub fn read_line(&mut self) -> Result<Option<String>, S4Error> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(Some(line));
        }

        let port = self.port.as_mut().ok_or(S4Error::NotConnected)?;
        let mut chunk = [0u8; 64];
        match port.read(&mut chunk) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(self.take_buffered_line())
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(S4Error::Io(e)),
        }
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
        while matches!(line.last(), Some(b'\r') | Some(b'\n')) {
            line.pop();
        }
        match String::from_utf8(line) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %e, "dropping non-UTF8 line from S4");
                None
            }
        }
    }

    /// Discard any unread input, after a read error left it suspect.
    pub fn reset_input(&mut self) {
        self.buffer.clear();
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
                tracing::error!(error = %e, "could not reset serial input buffer");
            }
        }
    }

    /// Drop the port after an unrecoverable I/O error; the connection
    /// supervisor will bring it back up.
    pub fn drop_port(&mut self) {
        self.port = None;
        self.buffer.clear();
    }

    /// Send EXIT, give the monitor a moment to stop transmitting, then drop
    /// the port.
    pub fn close(&mut self) {
        if self.port.is_some() {
            tracing::debug!("closing serial communications with S4");
            if let Err(e) = self.write_line(protocol::EXIT_REQUEST) {
                tracing::warn!(error = %e, "failed to send EXIT before close");
            }
            std::thread::sleep(Duration::from_millis(100));
            self.port = None;
        }
        self.buffer.clear();
    }
}
