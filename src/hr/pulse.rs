//! Heartbeat pulse train for the rower's analog HR input.
//!
//! The S4's 3.5 mm jack expects the short periodic edge an ANT+ chest-strap
//! receiver would produce. Driving it from the fused heart rate makes the
//! monitor display the same BPM the daemon publishes over BLE.

use std::sync::Arc;
use std::time::Duration;

use crate::hr::monitor::HeartRateMonitor;
use crate::shutdown::Shutdown;

/// Width of each high pulse.
const PULSE_WIDTH: Duration = Duration::from_millis(10);

/// Re-query interval while no heart rate is available.
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// A single digital output line.
pub trait PulsePin: Send {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Pulse output on a Raspberry Pi GPIO line.
#[cfg(feature = "gpio")]
pub struct GpioPulsePin {
    pin: rppal::gpio::OutputPin,
}

#[cfg(feature = "gpio")]
impl GpioPulsePin {
    /// Claim the BCM-numbered GPIO line, initially low.
    pub fn new(bcm_pin: u8) -> Result<Self, rppal::gpio::Error> {
        let mut pin = rppal::gpio::Gpio::new()?.get(bcm_pin)?.into_output();
        pin.set_low();
        Ok(GpioPulsePin { pin })
    }
}

#[cfg(feature = "gpio")]
impl PulsePin for GpioPulsePin {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }
}

/// Pulse output that goes nowhere, for hosts without a wired HR jack.
#[derive(Debug, Default)]
pub struct NullPulsePin;

impl PulsePin for NullPulsePin {
    fn set_high(&mut self) {}
    fn set_low(&mut self) {}
}

/// Milliseconds between beats at `bpm`.
fn period_ms(bpm: u32) -> u64 {
    60_000 / bpm as u64
}

/// Emits one 10 ms pulse per heartbeat at whatever rate the fusion layer
/// currently reports. The line idles low while no heart rate is known.
pub struct HeartbeatPulse {
    monitor: Arc<HeartRateMonitor>,
    pin: Box<dyn PulsePin>,
    shutdown: Shutdown,
}

impl HeartbeatPulse {
    pub fn new(monitor: Arc<HeartRateMonitor>, pin: Box<dyn PulsePin>, shutdown: Shutdown) -> Self {
        HeartbeatPulse {
            monitor,
            pin,
            shutdown,
        }
    }

    /// Run until shutdown. All waits are interruptible.
    pub fn run(mut self) {
        while !self.shutdown.is_triggered() {
            let bpm = self.monitor.heart_rate();
            if bpm > 0 {
                self.pin.set_high();
                self.shutdown.wait(PULSE_WIDTH);
                self.pin.set_low();
                let period = Duration::from_millis(period_ms(bpm));
                self.shutdown.wait(period.saturating_sub(PULSE_WIDTH));
            } else {
                self.pin.set_low();
                self.shutdown.wait(IDLE_WAIT);
            }
        }
        self.pin.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr::monitor::{HeartRateSample, HeartRateSource};
    use std::sync::Mutex;

    #[test]
    fn test_period_from_bpm() {
        assert_eq!(period_ms(60), 1000);
        assert_eq!(period_ms(120), 500);
        assert_eq!(period_ms(150), 400);
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Edge {
        High,
        Low,
    }

    /// Records edges and trips the shutdown after the first high pulse so
    /// the loop finishes without real-time sleeps.
    struct RecordingPin {
        edges: Arc<Mutex<Vec<Edge>>>,
        shutdown: Shutdown,
    }

    impl PulsePin for RecordingPin {
        fn set_high(&mut self) {
            self.edges.lock().unwrap().push(Edge::High);
            self.shutdown.trigger();
        }

        fn set_low(&mut self) {
            self.edges.lock().unwrap().push(Edge::Low);
        }
    }

    #[test]
    fn test_pulses_when_heart_rate_known() {
        let monitor = Arc::new(HeartRateMonitor::new());
        monitor.record(HeartRateSample::new(120, HeartRateSource::Ble));

        let edges = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Shutdown::new();
        let pin = RecordingPin {
            edges: Arc::clone(&edges),
            shutdown: shutdown.clone(),
        };

        HeartbeatPulse::new(monitor, Box::new(pin), shutdown).run();

        // One rising edge, the matching fall, and the final park-low
        let seen = edges.lock().unwrap().clone();
        assert_eq!(seen, vec![Edge::High, Edge::Low, Edge::Low]);
    }

    #[test]
    fn test_line_stays_low_without_heart_rate() {
        let monitor = Arc::new(HeartRateMonitor::new());
        let edges = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let pin = RecordingPin {
            edges: Arc::clone(&edges),
            shutdown: shutdown.clone(),
        };

        HeartbeatPulse::new(monitor, Box::new(pin), shutdown).run();

        let seen = edges.lock().unwrap().clone();
        assert_eq!(seen, vec![Edge::Low]);
    }
}
