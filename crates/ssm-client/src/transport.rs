//! Transport abstraction.
//!
//! The client drives any link that can write chunks to the lock's write
//! characteristic and stream notifications from its notify characteristic.
//! Production uses BLE (feature `btleplug`); tests use the simulated
//! peripheral in `ssm-harness`.

use std::future::Future;

use bytes::Bytes;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Link could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connect did not finish in time.
    #[error("connection timed out")]
    Timeout,

    /// Write to the link failed.
    #[error("write failed: {0}")]
    Write(String),

    /// Link is gone.
    #[error("link closed")]
    Closed,
}

/// Opens links to a device.
///
/// # Implementations
///
/// - **BLE**: `ssm_client::ble::BleTransport` (feature `btleplug`)
/// - **Simulation**: `ssm_harness::SimTransport`
pub trait Transport: Send + Sync + 'static {
    /// Link type produced by [`Transport::connect`].
    type Link: Link;

    /// Connect to `address` and enable notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unreachable or notifications cannot
    /// be enabled.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// One established connection.
///
/// Dropping the link releases its notification channel, so nothing from a
/// torn-down link reaches a later session.
pub trait Link: Send + 'static {
    /// Largest chunk the link accepts, header included.
    fn max_write_len(&self) -> usize;

    /// Write one chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is down.
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next notification, in arrival order. `None` once the link is lost.
    ///
    /// Must be cancel safe: the driver polls it inside `tokio::select!`.
    fn recv(&mut self) -> impl Future<Output = Option<Bytes>> + Send;

    /// Tear the link down. Idempotent.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}
