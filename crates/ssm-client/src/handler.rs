//! Caller-facing callbacks.

use std::fmt;

use ssm_core::MechStatus;
use ssm_proto::RawMechStatus;

/// Receives client events.
///
/// Called from the client's background task, so implementations must be
/// `Send + Sync`. Keep them short: the task does not process notifications
/// while a callback runs.
pub trait EventHandler: Send + Sync + 'static {
    /// An authenticated status record arrived.
    fn on_status_changed(&self, status: &MechStatus, raw: &RawMechStatus) {
        let _ = (status, raw);
    }

    /// `true` when a session reaches ready; `false` once reconnection gives up.
    fn on_connect(&self, connected: bool) {
        let _ = connected;
    }
}

impl<H: EventHandler + ?Sized> EventHandler for std::sync::Arc<H> {
    fn on_status_changed(&self, status: &MechStatus, raw: &RawMechStatus) {
        (**self).on_status_changed(status, raw);
    }

    fn on_connect(&self, connected: bool) {
        (**self).on_connect(connected);
    }
}

/// Handler that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl EventHandler for NoopHandler {}

type StatusFn = Box<dyn Fn(&MechStatus, &RawMechStatus) + Send + Sync>;
type ConnectFn = Box<dyn Fn(bool) + Send + Sync>;

/// Closure-based [`EventHandler`].
///
/// ```
/// use ssm_client::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .on_status(|status, _raw| tracing::info!(lock = ?status.status, "status"))
///     .on_connect(|connected| tracing::info!(connected, "connect"));
/// ```
#[derive(Default)]
pub struct Callbacks {
    status: Option<StatusFn>,
    connect: Option<ConnectFn>,
}

impl Callbacks {
    /// No callbacks registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status callback.
    #[must_use]
    pub fn on_status(
        mut self,
        callback: impl Fn(&MechStatus, &RawMechStatus) + Send + Sync + 'static,
    ) -> Self {
        self.status = Some(Box::new(callback));
        self
    }

    /// Set the connect callback.
    #[must_use]
    pub fn on_connect(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.connect = Some(Box::new(callback));
        self
    }
}

impl EventHandler for Callbacks {
    fn on_status_changed(&self, status: &MechStatus, raw: &RawMechStatus) {
        if let Some(callback) = &self.status {
            callback(status, raw);
        }
    }

    fn on_connect(&self, connected: bool) {
        if let Some(callback) = &self.connect {
            callback(connected);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("status", &self.status.is_some())
            .field("connect", &self.connect.is_some())
            .finish()
    }
}
