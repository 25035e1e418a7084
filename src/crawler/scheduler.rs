//! Politeness delay between processed pages
//!
//! The delay is drawn uniformly from `[min, max)` at millisecond resolution.
//! The RNG is owned by the scheduler and seeded once, so a fixed seed
//! reproduces the same sequence of delays.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Draws politeness delays from an owned RNG
#[derive(Debug)]
pub struct Politeness {
    min: Duration,
    max: Duration,
    rng: Mutex<StdRng>,
}

impl Politeness {
    /// Creates a delay source; `seed` fixes the RNG, `None` seeds from the OS
    pub fn new(min: Duration, max: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            min,
            max,
            rng: Mutex::new(rng),
        }
    }

    /// Returns true when every delay is skipped
    pub fn is_disabled(&self) -> bool {
        self.max_ms() <= self.min_ms()
    }

    /// Draws the next delay, or `None` when the range is empty or inverted
    pub fn next_delay(&self) -> Option<Duration> {
        if self.is_disabled() {
            return None;
        }

        let millis = match self.rng.lock() {
            Ok(mut rng) => rng.random_range(self.min_ms()..self.max_ms()),
            Err(poisoned) => poisoned
                .into_inner()
                .random_range(self.min_ms()..self.max_ms()),
        };
        Some(Duration::from_millis(millis))
    }

    fn min_ms(&self) -> u64 {
        self.min.as_millis() as u64
    }

    fn max_ms(&self) -> u64 {
        self.max.as_millis() as u64
    }
}
