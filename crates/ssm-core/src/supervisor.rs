//! Reconnection policy.
//!
//! The supervisor outlives individual sessions. It never sleeps or connects
//! itself: it only answers "what now?" when a session closes, and the driver
//! carries out the answer.
//!
//! The initial attempt after an explicit connect is not a retry. With
//! `max_retries = 3` a peripheral that never answers sees one initial attempt
//! and three retries before the supervisor gives up. Failures a fresh session
//! cannot fix (see [`crate::SessionError::is_recoverable`]) give up at once.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::error::CloseReason;

/// Default number of retries after a failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait between a failure and the next attempt.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Invalid reconnection settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Interval must be positive
    #[error("retry interval must be positive")]
    ZeroInterval,
}

/// Bounded retry with a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries after the initial attempt. Zero disables recovery.
    pub max_retries: u32,
    /// Wait before each retry
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, interval: DEFAULT_RETRY_INTERVAL }
    }
}

impl ReconnectPolicy {
    /// Check the policy is usable.
    ///
    /// # Errors
    ///
    /// - `PolicyError::ZeroInterval` if `interval` is zero
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        Ok(())
    }
}

/// What the driver should do after a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing: the close was requested or the supervisor is disarmed
    Idle,
    /// Wait, then open a new session
    RetryAfter(Duration),
    /// Stop trying and report failure
    GiveUp {
        /// Retries made
        attempts: u32,
    },
}

/// Retry bookkeeping across sessions.
#[derive(Debug, Clone)]
pub struct Supervisor {
    policy: ReconnectPolicy,
    attempts: u32,
    armed: bool,
}

impl Supervisor {
    /// New, disarmed supervisor.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0, armed: false }
    }

    /// Policy in force.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Retries made since the last arm or ready session.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True while failures lead to retries or a final give-up.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Start supervising after an explicit connect. Resets the counter.
    pub fn arm(&mut self) {
        self.attempts = 0;
        self.armed = true;
    }

    /// Replace the policy and re-arm.
    pub fn rearm(&mut self, policy: ReconnectPolicy) {
        self.policy = policy;
        self.arm();
    }

    /// A session reached ready. Resets the counter.
    pub fn on_ready(&mut self) {
        self.attempts = 0;
    }

    /// A session closed. Decide whether to retry.
    pub fn on_closed(&mut self, reason: &CloseReason) -> Decision {
        if !self.armed || reason.is_requested() {
            return Decision::Idle;
        }

        if matches!(reason, CloseReason::Failed(err) if !err.is_recoverable()) {
            error!(attempts = self.attempts, %reason, "unrecoverable failure, giving up");
            self.armed = false;
            return Decision::GiveUp { attempts: self.attempts };
        }

        if self.attempts >= self.policy.max_retries {
            error!(attempts = self.attempts, %reason, "recovery failed, giving up");
            self.armed = false;
            return Decision::GiveUp { attempts: self.attempts };
        }

        self.attempts += 1;
        info!(
            attempt = self.attempts,
            max_retries = self.policy.max_retries,
            interval = ?self.policy.interval,
            %reason,
            "session lost, scheduling retry"
        );
        Decision::RetryAfter(self.policy.interval)
    }

    /// Stop supervising. Later closes yield [`Decision::Idle`].
    pub fn stop(&mut self) {
        self.armed = false;
    }
}
