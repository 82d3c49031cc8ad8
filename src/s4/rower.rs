//! The rower interface: connection supervisor, capture thread, and the two
//! request-scheduler loops, sharing one serial connection.
//!
//! The supervisor owns bringing the link up and back up after failures,
//! with a 5 s backoff between port scans; write failures simply drop the
//! port and leave reconnection to it. The capture thread parses every
//! incoming line into an [`S4Event`] and forwards it, in arrival order,
//! over a channel to the aggregator. The high-frequency loop sweeps the
//! rowing registers continuously at the monitor's ~25 ms per-request
//! floor; the low-frequency loop sweeps configuration registers with a
//! 2 s pause between sweeps. Category gates let the aggregator switch
//! register families on and off so the workout and zone layouts are only
//! re-read when their flags change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Sender};

use crate::s4::connection::{self, S4Connection, PORT_SCAN_RETRY_DELAY};
use crate::s4::memory::{self, Category, FieldKind, Frequency, MemoryField, MEMORY_MAP};
use crate::s4::protocol::{self, ModelInfo, S4Event};
use crate::s4::S4Error;
use crate::shutdown::Shutdown;

/// Observed per-request gap the monitor tolerates.
pub const SERIAL_REQUEST_DELAY: Duration = Duration::from_millis(25);

/// Pause between successive sweeps of the low-frequency register set.
pub const LOW_FREQ_PAUSE: Duration = Duration::from_secs(2);

/// Wait before re-checking the port when it is closed.
const RECONNECT_POLL: Duration = Duration::from_millis(100);

/// Idle wait in the capture loop when no bytes are available.
const CAPTURE_IDLE_WAIT: Duration = Duration::from_millis(5);

/// Supervisor poll interval while the link is healthy.
const SUPERVISOR_POLL: Duration = Duration::from_millis(500);

/// Window for an on-demand request to see its response.
const ON_DEMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-category polling switches, shared between the scheduler loops and
/// the aggregator.
#[derive(Debug)]
pub struct CategoryGates {
    gates: [AtomicBool; CATEGORY_COUNT],
}

const CATEGORY_COUNT: usize = Category::ALL.len();

impl Default for CategoryGates {
    fn default() -> Self {
        let gates = std::array::from_fn(|i| AtomicBool::new(Category::ALL[i].enabled_by_default()));
        CategoryGates { gates }
    }
}

impl CategoryGates {
    pub fn enabled(&self, category: Category) -> bool {
        self.gates[category.index()].load(Ordering::Relaxed)
    }

    pub fn set(&self, category: Category, enabled: bool) {
        let was = self.gates[category.index()].swap(enabled, Ordering::Relaxed);
        if was != enabled {
            tracing::debug!(%category, enabled, "request category gate changed");
        }
    }
}

/// A waiting on-demand request: the response prefix to watch for and where
/// to deliver the match.
struct PendingResponse {
    prefix: String,
    tx: Sender<S4Event>,
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct RowerOptions {
    /// Explicit serial device path; discovered by USB descriptor when unset.
    pub port: Option<String>,
    /// Extra pause inserted every 10 high-frequency requests. Zero disables
    /// it; set a small value if incoming data looks starved.
    pub high_freq_pause: Duration,
}

/// Handle on the S4 monitor.
pub struct Rower {
    conn: Arc<Mutex<S4Connection>>,
    gates: Arc<CategoryGates>,
    shutdown: Shutdown,
    options: RowerOptions,
    pending: Arc<Mutex<Option<PendingResponse>>>,
}

impl Rower {
    pub fn new(options: RowerOptions, shutdown: Shutdown) -> Self {
        Rower {
            conn: Arc::new(Mutex::new(S4Connection::new())),
            gates: Arc::new(CategoryGates::default()),
            shutdown,
            options,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn gates(&self) -> Arc<CategoryGates> {
        Arc::clone(&self.gates)
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().unwrap().is_open()
    }

    /// Block until the serial link is open and the USB handshake is sent,
    /// or shutdown triggers.
    pub fn open(&self) -> Result<(), S4Error> {
        connect_with_backoff(&self.conn, &self.options.port, &self.shutdown)
    }

    /// Start the supervisor, the capture thread and both request loops.
    /// Parsed events are delivered to `events_tx` in arrival order. The
    /// returned handles are joined by the daemon after shutdown triggers.
    pub fn spawn(&self, events_tx: Sender<S4Event>) -> Vec<JoinHandle<()>> {
        tracing::debug!("starting S4 supervisor, capture and request threads");

        let supervisor = {
            let conn = Arc::clone(&self.conn);
            let port = self.options.port.clone();
            let shutdown = self.shutdown.clone();
            thread::Builder::new()
                .name("s4-supervisor".into())
                .spawn(move || supervisor_loop(conn, port, shutdown))
                .expect("spawn s4-supervisor")
        };

        let capture = {
            let conn = Arc::clone(&self.conn);
            let pending = Arc::clone(&self.pending);
            let shutdown = self.shutdown.clone();
            thread::Builder::new()
                .name("s4-capture".into())
                .spawn(move || capture_loop(conn, pending, events_tx, shutdown))
                .expect("spawn s4-capture")
        };

        let high = self.spawn_request_loop("s4-request-high", Frequency::High);
        let low = self.spawn_request_loop("s4-request-low", Frequency::Low);

        vec![supervisor, capture, high, low]
    }

    fn spawn_request_loop(&self, name: &str, frequency: Frequency) -> JoinHandle<()> {
        let conn = Arc::clone(&self.conn);
        let gates = Arc::clone(&self.gates);
        let shutdown = self.shutdown.clone();
        let high_freq_pause = self.options.high_freq_pause;
        thread::Builder::new()
            .name(name.into())
            .spawn(move || request_loop(conn, gates, shutdown, frequency, high_freq_pause))
            .unwrap_or_else(|e| panic!("spawn {name}: {e}"))
    }

    /// Ask the monitor to reset, as if the user held the reset key.
    pub fn request_reset(&self) {
        tracing::debug!("sending reset request to S4");
        let mut conn = self.conn.lock().unwrap();
        write_or_drop(&mut conn, protocol::RESET_REQUEST);
    }

    /// Issue a one-off read for a mapped register, regardless of its
    /// polling category. The response arrives through the event stream.
    pub fn request_field(&self, kind: FieldKind) -> Result<(), S4Error> {
        let field =
            memory::field_for(kind).ok_or_else(|| S4Error::UnmappedField(format!("{kind:?}")))?;
        let mut conn = self.conn.lock().unwrap();
        write_or_drop(&mut conn, &protocol::read_request(field));
        Ok(())
    }

    /// Send `request` and wait up to 2 s for a response line starting with
    /// `expected_prefix`. The matched event is also forwarded to the normal
    /// event stream.
    pub fn request_on_demand(
        &self,
        request: &str,
        expected_prefix: &str,
    ) -> Result<S4Event, S4Error> {
        let (tx, rx) = bounded(1);
        *self.pending.lock().unwrap() = Some(PendingResponse {
            prefix: expected_prefix.to_string(),
            tx,
        });

        {
            let mut conn = self.conn.lock().unwrap();
            write_or_drop(&mut conn, request);
        }

        match rx.recv_timeout(ON_DEMAND_TIMEOUT) {
            Ok(event) => Ok(event),
            Err(_) => {
                self.pending.lock().unwrap().take();
                tracing::warn!(prefix = expected_prefix, "timeout waiting for on-demand response");
                Err(S4Error::ResponseTimeout(expected_prefix.to_string()))
            }
        }
    }

    /// Read a one-off register value, e.g. the tank volume, bypassing the
    /// polling loops.
    pub fn read_field_on_demand(&self, kind: FieldKind) -> Result<S4Event, S4Error> {
        let field =
            memory::field_for(kind).ok_or_else(|| S4Error::UnmappedField(format!("{kind:?}")))?;
        self.request_on_demand(
            &protocol::read_request(field),
            &protocol::read_response_prefix(field),
        )
    }

    /// Query the monitor's model and firmware version.
    pub fn model_info(&self) -> Result<ModelInfo, S4Error> {
        let event = self.request_on_demand(
            protocol::MODEL_INFORMATION_REQUEST,
            protocol::MODEL_INFORMATION_RESPONSE,
        )?;
        ModelInfo::parse(&event.raw)
            .ok_or_else(|| S4Error::ResponseTimeout(protocol::MODEL_INFORMATION_RESPONSE.into()))
    }

    /// Send EXIT and close the port. Called once shutdown has triggered.
    pub fn close(&self) {
        self.conn.lock().unwrap().close();
    }
}

/// Scan for the monitor and open it, retrying every 5 s until success or
/// shutdown. The connection lock is held only for the open attempt itself.
fn connect_with_backoff(
    conn: &Mutex<S4Connection>,
    port_override: &Option<String>,
    shutdown: &Shutdown,
) -> Result<(), S4Error> {
    let mut attempts: u64 = 0;
    loop {
        if shutdown.is_triggered() {
            return Err(S4Error::ShuttingDown);
        }

        let path = match port_override {
            Some(path) => Some(path.clone()),
            None => connection::scan_port(),
        };

        match path {
            Some(path) => match conn.lock().unwrap().open_path(&path) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "failed to open serial port; retrying");
                }
            },
            None => {
                // Reminder roughly every 30 minutes at the 5 s scan cadence.
                if attempts % 360 == 0 {
                    tracing::warn!(
                        attempts = attempts + 1,
                        "S4 serial port not found; retrying every {}s",
                        PORT_SCAN_RETRY_DELAY.as_secs()
                    );
                }
            }
        }

        attempts += 1;
        if shutdown.wait(PORT_SCAN_RETRY_DELAY) {
            return Err(S4Error::ShuttingDown);
        }
    }
}

/// Keeps the serial link alive: opens it at startup and reopens it after a
/// write failure dropped the port.
fn supervisor_loop(conn: Arc<Mutex<S4Connection>>, port: Option<String>, shutdown: Shutdown) {
    while !shutdown.is_triggered() {
        let is_open = conn.lock().unwrap().is_open();
        if !is_open {
            if connect_with_backoff(&conn, &port, &shutdown).is_err() {
                return; // shutting down
            }
            tracing::info!("S4 link up");
        }
        shutdown.wait(SUPERVISOR_POLL);
    }
}

/// Write a line; on an I/O failure drop the port so the supervisor
/// reopens it.
fn write_or_drop(conn: &mut S4Connection, line: &str) {
    match conn.write_line(line) {
        Ok(()) => {}
        Err(S4Error::NotConnected) => {
            tracing::debug!(line, "dropping write; serial not connected");
        }
        Err(e) => {
            tracing::error!(error = %e, "serial write failed; dropping port for reconnect");
            conn.drop_port();
        }
    }
}

fn capture_loop(
    conn: Arc<Mutex<S4Connection>>,
    pending: Arc<Mutex<Option<PendingResponse>>>,
    events_tx: Sender<S4Event>,
    shutdown: Shutdown,
) {
    while !shutdown.is_triggered() {
        let line = {
            let mut conn = conn.lock().unwrap();
            if !conn.is_open() {
                drop(conn);
                shutdown.wait(RECONNECT_POLL);
                continue;
            }
            match conn.read_line() {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "serial read failed; resetting input buffer");
                    conn.reset_input();
                    None
                }
            }
        };

        let Some(line) = line else {
            shutdown.wait(CAPTURE_IDLE_WAIT);
            continue;
        };

        let Some(event) = S4Event::parse_line(&line) else {
            continue;
        };

        // Route to a waiting on-demand request first, then fan out.
        {
            let mut slot = pending.lock().unwrap();
            let matched = matches!(slot.as_ref(), Some(w) if event.raw.starts_with(&w.prefix));
            if matched {
                if let Some(waiting) = slot.take() {
                    let _ = waiting.tx.send(event.clone());
                }
            }
        }

        if events_tx.send(event).is_err() {
            // Receiver gone; the daemon is coming down.
            return;
        }
    }
}

fn request_loop(
    conn: Arc<Mutex<S4Connection>>,
    gates: Arc<CategoryGates>,
    shutdown: Shutdown,
    frequency: Frequency,
    high_freq_pause: Duration,
) {
    let mut request_count: u32 = 0;
    while !shutdown.is_triggered() {
        let is_open = conn.lock().unwrap().is_open();
        if !is_open {
            shutdown.wait(RECONNECT_POLL);
            continue;
        }

        for field in MEMORY_MAP {
            if shutdown.is_triggered() {
                return;
            }
            if !should_poll(field, frequency, &gates) {
                continue;
            }

            {
                let mut conn = conn.lock().unwrap();
                write_or_drop(&mut conn, &protocol::read_request(field));
            }
            shutdown.wait(SERIAL_REQUEST_DELAY);

            if frequency == Frequency::High && !high_freq_pause.is_zero() {
                request_count += 1;
                if request_count % 10 == 0 {
                    // Yield to the capture thread if it looks starved.
                    shutdown.wait(high_freq_pause);
                }
            }
        }

        if frequency == Frequency::Low {
            shutdown.wait(LOW_FREQ_PAUSE);
        }
    }
}

fn should_poll(field: &MemoryField, frequency: Frequency, gates: &CategoryGates) -> bool {
    field.frequency == frequency
        && !field.exclude_from_poll_loop
        && gates.enabled(field.category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_defaults() {
        let gates = CategoryGates::default();
        assert!(gates.enabled(Category::Rowing));
        assert!(gates.enabled(Category::State));
        assert!(gates.enabled(Category::Program));
        assert!(!gates.enabled(Category::Workout));
        assert!(!gates.enabled(Category::Zone));
        assert!(!gates.enabled(Category::Intensity));
        assert!(!gates.enabled(Category::Distance));
    }

    #[test]
    fn test_gate_toggle() {
        let gates = CategoryGates::default();
        gates.set(Category::Workout, true);
        assert!(gates.enabled(Category::Workout));
        gates.set(Category::Workout, false);
        assert!(!gates.enabled(Category::Workout));
    }

    #[test]
    fn test_should_poll_filters() {
        let gates = CategoryGates::default();

        let distance = memory::field_at("055").unwrap();
        assert!(should_poll(distance, Frequency::High, &gates));
        assert!(!should_poll(distance, Frequency::Low, &gates));

        // Excluded from the loop even though its category is enabled
        let pace = memory::field_at("1A5").unwrap();
        assert!(!should_poll(pace, Frequency::High, &gates));

        // Gated off by default, polled once enabled
        let work1 = memory::field_at("1B0").unwrap();
        assert!(!should_poll(work1, Frequency::Low, &gates));
        gates.set(Category::Workout, true);
        assert!(should_poll(work1, Frequency::Low, &gates));
    }

    #[test]
    fn test_high_sweep_covers_rowing_registers() {
        let gates = CategoryGates::default();
        let polled: Vec<FieldKind> = MEMORY_MAP
            .iter()
            .filter(|f| should_poll(f, Frequency::High, &gates))
            .map(|f| f.kind)
            .collect();

        assert!(polled.contains(&FieldKind::TotalDistance));
        assert!(polled.contains(&FieldKind::Watts));
        assert!(polled.contains(&FieldKind::DisplaySecDec));
        // Derived instead of polled
        assert!(!polled.contains(&FieldKind::Pace500m));
        assert!(!polled.contains(&FieldKind::StrokeRateInt));
    }

    #[test]
    fn test_unmapped_field_request_is_an_error() {
        let rower = Rower::new(RowerOptions::default(), Shutdown::new());
        // WorkoutRest(9) does not exist on the monitor (legs end at work 9)
        assert!(matches!(
            rower.request_field(FieldKind::WorkoutRest(9)),
            Err(S4Error::UnmappedField(_))
        ));
    }
}
