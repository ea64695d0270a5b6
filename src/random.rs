//! Injectable randomness.
//!
//! Spintax choices, warmup pairing and thinking-time delays all draw from a
//! [`RandomSource`] so tests can supply a seeded or scripted source.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform random choices.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..upper`. `upper` must be non-zero.
    fn index(&self, upper: usize) -> usize;

    /// Uniform integer in `low..=high`.
    fn between(&self, low: u64, high: u64) -> u64;
}

/// Thread-local OS-seeded generator. The default for production callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }

    fn between(&self, low: u64, high: u64) -> u64 {
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Deterministic generator seeded from a `u64`.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn index(&self, upper: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..upper)
    }

    fn between(&self, low: u64, high: u64) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(low..=high)
    }
}
