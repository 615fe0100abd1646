//! Execution-engine clock used for transport timing.

use std::time::Instant;

/// Monotonic time source, in seconds.
pub trait Clock: Send + Sync {
    fn now_seconds(&self) -> f64;
}

/// Wall clock anchored at construction.
#[derive(Debug, Clone)]
pub struct EngineClock {
    origin: Instant,
}

impl EngineClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for EngineClock {
    fn now_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use std::sync::Mutex;

    use super::Clock;

    /// Clock that only moves when told to.
    #[derive(Debug, Default)]
    pub struct ManualClock {
        now: Mutex<f64>,
    }

    impl ManualClock {
        pub fn advance(&self, seconds: f64) {
            *self.now.lock().unwrap() += seconds;
        }

        pub fn set(&self, seconds: f64) {
            *self.now.lock().unwrap() = seconds;
        }
    }

    impl Clock for ManualClock {
        fn now_seconds(&self) -> f64 {
            *self.now.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_clock_is_monotonic() {
        let clock = EngineClock::new();
        let first = clock.now_seconds();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now_seconds();
        assert!(second > first);
        assert!(first >= 0.0);
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let clock = manual::ManualClock::default();
        assert_eq!(clock.now_seconds(), 0.0);
        clock.advance(2.5);
        assert_eq!(clock.now_seconds(), 2.5);
        clock.set(1.0);
        assert_eq!(clock.now_seconds(), 1.0);
    }
}
