//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system time. The client runs on the system
//! clock; tests run on tokio's paused clock so retry spacing and handshake
//! deadlines are exact. The client draws no randomness of its own: the
//! session random code comes from the peripheral.

use std::time::Duration;

/// Abstract environment providing time and async sleep.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; the state machines never do.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Wall-clock time in unix seconds.
    ///
    /// Used to stamp decoded status records. Not monotonic.
    fn wall_clock_secs(&self) -> u64;
}
