//! Process-wide stop flag.
//!
//! Every loop in the daemon sleeps through [`Shutdown::wait`] so that a
//! SIGINT or an explicit shutdown interrupts the wait instead of letting the
//! loop run out its current sleep.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    stopped: Mutex<bool>,
    cond: Condvar,
}

/// Cloneable handle on the daemon-wide stop flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter.
    pub fn trigger(&self) {
        let mut stopped = self.inner.stopped.lock().unwrap();
        *stopped = true;
        self.inner.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.stopped.lock().unwrap()
    }

    /// Sleep for up to `timeout`, returning early if shutdown is triggered.
    ///
    /// Returns true if shutdown was triggered.
    pub fn wait(&self, timeout: Duration) -> bool {
        let stopped = self.inner.stopped.lock().unwrap();
        if *stopped {
            return true;
        }
        let (stopped, _) = self
            .inner
            .cond
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap();
        *stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_times_out_when_not_triggered() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait(Duration::from_millis(10)));
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn test_trigger_wakes_waiter() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let handle = thread::spawn(move || waiter.wait(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_returns_immediately_after_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.wait(Duration::from_secs(10)));
    }
}
