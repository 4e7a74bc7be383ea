//! Injectable source of random integer ratings.
//!
//! Cold-start queries are scored from a synthetic rating vector. The draws
//! come from a [`RandomSource`] passed in by the caller, so tests can use
//! a fixed seed or a scripted sequence instead of process-wide state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies uniform integer draws in an inclusive range
pub trait RandomSource {
    /// Draw an integer uniformly from `low..=high`
    fn draw(&mut self, low: u32, high: u32) -> u32;
}

/// [`RandomSource`] backed by any `rand` generator
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    /// Deterministic source for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Source seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn draw(&mut self, low: u32, high: u32) -> u32 {
        self.rng.random_range(low..=high)
    }
}
