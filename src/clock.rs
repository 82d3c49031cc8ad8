//! Monotonic process clock.
//!
//! Event timestamps and freshness checks all use milliseconds since process
//! start so they are immune to wall-clock adjustments.

use std::sync::OnceLock;
use std::time::Instant;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Milliseconds elapsed since the process clock was first read.
pub fn now_ms() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Seconds elapsed since the process clock was first read.
pub fn now_secs() -> f64 {
    epoch().elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_monotonic() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
