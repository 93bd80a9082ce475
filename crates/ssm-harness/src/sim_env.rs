//! Deterministic Environment on tokio's clock.
//!
//! Under `#[tokio::test(start_paused = true)]` time only moves when every task
//! is idle, so retry spacing and handshake deadlines are exact.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ssm_core::Environment;

/// Default wall-clock origin: 2024-01-01T00:00:00Z.
pub const DEFAULT_WALL_CLOCK_BASE: u64 = 1_704_067_200;

/// Simulated environment.
///
/// Randomness comes from a seeded ChaCha8 stream shared by all clones, so a
/// test run with the same seed sees the same bytes in the same order.
#[derive(Debug, Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    wall_clock_base: u64,
    start: tokio::time::Instant,
}

impl SimEnv {
    /// Seeded environment starting at [`DEFAULT_WALL_CLOCK_BASE`].
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            wall_clock_base: DEFAULT_WALL_CLOCK_BASE,
            start: tokio::time::Instant::now(),
        }
    }

    /// Start the wall clock at `secs`.
    #[must_use]
    pub fn with_wall_clock(mut self, secs: u64) -> Self {
        self.wall_clock_base = secs;
        self
    }

    /// Fill `buffer` from the seeded stream.
    ///
    /// The simulated peripheral draws its session random codes here.
    pub fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    /// Time since the environment was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_secs(&self) -> u64 {
        self.wall_clock_base + self.start.elapsed().as_secs()
    }
}
