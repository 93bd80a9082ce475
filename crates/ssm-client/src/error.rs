//! Client error types.

use ssm_core::{KeyError, PolicyError};
use thiserror::Error;

/// Errors from [`crate::Client::connect`].
///
/// Only caller input is reported this way. Connection failures surface
/// through [`crate::EventHandler::on_connect`] after retries run out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Secret key is not 32 hex characters.
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(#[from] KeyError),

    /// Reconnection policy is unusable.
    #[error("invalid reconnect policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    /// Client was stopped.
    #[error("client stopped")]
    Stopped,

    /// Called outside a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}
