//! Client configuration.

use std::time::Duration;

use ssm_core::SessionConfig;

/// Default bound on a transport connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default period of the handshake deadline check.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default time `stop` waits for the background task before aborting it.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session configuration (handshake timeout, framing bounds)
    pub session: SessionConfig,
    /// Bound on each transport connect
    pub connect_timeout: Duration,
    /// Period of the handshake deadline check
    pub tick_interval: Duration,
    /// Wait for the background task on stop before aborting it
    pub stop_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}
