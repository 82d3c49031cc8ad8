//! Daemon assembly: owns every component and the threads that drive them.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};

use crate::ble::adapter::{DeviceInformation, TelemetryHub};
use crate::config::Config;
use crate::hr::monitor::HeartRateMonitor;
use crate::hr::pulse::{HeartbeatPulse, NullPulsePin, PulsePin};
use crate::s4::rower::Rower;
use crate::shutdown::Shutdown;
use crate::state::aggregator::RowerState;

/// How long the aggregator drain blocks per receive before re-checking the
/// stop flag.
const EVENT_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// The running daemon.
///
/// Construction wires the serial interface into the aggregator, the
/// heart-rate monitor into the heartbeat output, and exposes the whole
/// core through a [`TelemetryHub`] for the BLE front end.
pub struct WRowFusion {
    shutdown: Shutdown,
    rower: Arc<Rower>,
    hub: TelemetryHub,
    threads: Vec<JoinHandle<()>>,
}

impl WRowFusion {
    /// Build the component graph and start every core thread. The serial
    /// link is brought up in the background; until a monitor is plugged in
    /// the daemon idles and publishes zeroed telemetry.
    pub fn start(config: Config) -> Self {
        let shutdown = Shutdown::new();

        let rower = Arc::new(Rower::new(config.rower_options(), shutdown.clone()));
        let state = Arc::new(RowerState::new(config.metric_sources(), rower.gates()));
        let hrm = Arc::new(HeartRateMonitor::with_timeout(config.hr_timeout()));
        let hub = TelemetryHub::new(Arc::clone(&rower), Arc::clone(&state), Arc::clone(&hrm));

        let (events_tx, events_rx) = channel::unbounded();
        let mut threads = rower.spawn(events_tx);

        // Drain captured events into the aggregator, preserving arrival order.
        threads.push(
            thread::Builder::new()
                .name("aggregator".into())
                .spawn({
                    let state = Arc::clone(&state);
                    let shutdown = shutdown.clone();
                    move || {
                        while !shutdown.is_triggered() {
                            match events_rx.recv_timeout(EVENT_RECV_TIMEOUT) {
                                Ok(event) => state.handle_event(&event),
                                Err(RecvTimeoutError::Timeout) => {}
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                    }
                })
                .expect("spawn aggregator"),
        );

        // The supervisor inside the rower brings the link up; once it is,
        // report the monitor's model and firmware.
        threads.push(
            thread::Builder::new()
                .name("s4-hello".into())
                .spawn({
                    let rower = Arc::clone(&rower);
                    let shutdown = shutdown.clone();
                    move || {
                        while !rower.is_connected() {
                            if shutdown.wait(Duration::from_millis(500)) {
                                return;
                            }
                        }
                        match rower.model_info() {
                            Ok(info) => {
                                tracing::info!(
                                    model = %info.model,
                                    firmware = %info.firmware,
                                    "S4 monitor connected"
                                );
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "model info not available yet");
                            }
                        }
                    }
                })
                .expect("spawn s4-hello"),
        );

        if config.heartbeat.enabled {
            let pin = heartbeat_pin(&config);
            let pulse = HeartbeatPulse::new(Arc::clone(&hrm), pin, shutdown.clone());
            threads.push(
                thread::Builder::new()
                    .name("heartbeat".into())
                    .spawn(move || pulse.run())
                    .expect("spawn heartbeat"),
            );
        }

        WRowFusion {
            shutdown,
            rower,
            hub,
            threads,
        }
    }

    /// The publish surface for the BLE front end.
    pub fn hub(&self) -> &TelemetryHub {
        &self.hub
    }

    /// The stop flag; trigger it to begin an orderly shutdown.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Device Information Service strings, enriched with the monitor's
    /// model once it has answered an `IV?` request.
    pub fn device_information(&self) -> DeviceInformation {
        match self.rower.model_info() {
            Ok(info) => DeviceInformation::default().with_model_info(&info),
            Err(_) => DeviceInformation::default(),
        }
    }

    /// Trigger shutdown, send EXIT, and join every core thread. No
    /// in-flight work is abandoned silently.
    pub fn join(mut self) {
        self.shutdown.trigger();
        self.rower.close();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("?").to_string();
            if handle.join().is_err() {
                tracing::error!(thread = %name, "thread panicked");
            }
        }
        tracing::info!("all core threads stopped");
    }
}

fn heartbeat_pin(config: &Config) -> Box<dyn PulsePin> {
    #[cfg(feature = "gpio")]
    {
        match crate::hr::pulse::GpioPulsePin::new(config.heartbeat.gpio_pin) {
            Ok(pin) => return Box::new(pin),
            Err(e) => {
                tracing::error!(
                    pin = config.heartbeat.gpio_pin,
                    error = %e,
                    "GPIO unavailable; heartbeat output disabled"
                );
            }
        }
    }
    #[cfg(not(feature = "gpio"))]
    {
        tracing::info!(
            pin = config.heartbeat.gpio_pin,
            "built without GPIO support; heartbeat output is a no-op"
        );
    }
    Box::new(NullPulsePin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr::monitor::{HeartRateSample, HeartRateSource};

    fn test_config() -> Config {
        let mut config = Config::default();
        // Keep the port scanner off real hardware in tests
        config.serial.port = Some("/dev/null".into());
        config.heartbeat.enabled = false;
        config
    }

    #[test]
    fn test_daemon_starts_and_joins() {
        let app = WRowFusion::start(test_config());
        assert_eq!(app.hub().snapshot().stroke_count, 0);
        app.join();
    }

    #[test]
    fn test_hub_survives_daemon_lifecycle() {
        let app = WRowFusion::start(test_config());
        let hub = app.hub().clone();
        hub.on_hr_update(HeartRateSample::new(150, HeartRateSource::Ble));
        assert_eq!(hub.snapshot().heart_rate_bpm, 150);
        app.join();
    }
}
