//! Client facade.
//!
//! The only type callers touch. All protocol work happens in a background
//! task spawned by the first [`Client::connect`]; the facade only validates
//! input, enqueues requests, and exposes read-only snapshots.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ssm_core::{
    DeviceIdentity, Environment, MechStatus, ReconnectPolicy, SecretKey, SessionState,
};
use ssm_proto::{Command, HistoryTag};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Instrument, Span, debug, instrument::WithSubscriber, warn};

use crate::{
    config::ClientConfig,
    driver::{Channels, Driver, Request},
    error::ClientError,
    handler::EventHandler,
    system_env::SystemEnv,
    transport::Transport,
};

enum Task<T> {
    /// Not spawned yet
    Pending {
        transport: T,
        state: watch::Sender<SessionState>,
        status: watch::Sender<Option<MechStatus>>,
    },
    Running {
        requests: mpsc::UnboundedSender<Request>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Client for one lock.
///
/// # Lifecycle
///
/// ```text
/// new ──> connect ──> (lock | unlock)* ──> stop
///            │
///            └── background task: connect, login, notifications, retries
/// ```
///
/// `connect`, `lock`, `unlock`, and `stop` take `&self` and may be called
/// from any thread. Events reach the [`EventHandler`] from the background
/// task.
pub struct Client<T: Transport, E: Environment = SystemEnv> {
    task: Mutex<Task<T>>,
    env: E,
    config: ClientConfig,
    handler: Arc<dyn EventHandler>,
    span: Span,
    dispatch: Option<Dispatch>,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    status: watch::Receiver<Option<MechStatus>>,
}

impl<T: Transport> Client<T, SystemEnv> {
    /// Client on the system clock with default configuration.
    pub fn new(transport: T, handler: impl EventHandler) -> Self {
        Self::with_env(transport, SystemEnv::new(), ClientConfig::default(), handler)
    }
}

impl<T: Transport, E: Environment> Client<T, E> {
    /// Client with an explicit environment and configuration.
    pub fn with_env(transport: T, env: E, config: ClientConfig, handler: impl EventHandler) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (status_tx, status_rx) = watch::channel(None);

        Self {
            task: Mutex::new(Task::Pending { transport, state: state_tx, status: status_tx }),
            env,
            config,
            handler: Arc::new(handler),
            span: Span::none(),
            dispatch: None,
            cancel: CancellationToken::new(),
            state: state_rx,
            status: status_rx,
        }
    }

    /// Run the background task inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Send the background task's events to `dispatch` instead of the
    /// global subscriber.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Connect to a lock and keep the session alive.
    ///
    /// Returns once the request is queued. The outcome arrives through
    /// [`EventHandler::on_connect`]: `true` when a session is ready, `false`
    /// after `policy.max_retries` retries have failed. Ignored with a warning
    /// while a session is already active.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidSecretKey` if `secret_key` is not 32 hex chars
    /// - `ClientError::InvalidPolicy` if the retry interval is zero
    /// - `ClientError::Stopped` after [`Client::stop`]
    /// - `ClientError::NoRuntime` outside a tokio runtime
    pub fn connect(
        &self,
        address: impl Into<String>,
        secret_key: &str,
        policy: ReconnectPolicy,
    ) -> Result<(), ClientError> {
        let secret = SecretKey::from_hex(secret_key)?;
        policy.validate()?;
        let identity = DeviceIdentity::new(address, secret);

        let mut task = self.lock_task();
        if matches!(*task, Task::Pending { .. }) {
            self.spawn(&mut task)?;
        }

        match &*task {
            Task::Running { requests, .. } => requests
                .send(Request::Connect { identity, policy })
                .map_err(|_| ClientError::Stopped),
            Task::Pending { .. } | Task::Stopped => Err(ClientError::Stopped),
        }
    }

    /// Lock, recording `history` as the actor in the device log.
    ///
    /// Dropped with a debug log unless a session is ready.
    pub fn lock(&self, history: &str) {
        self.submit(Command::Lock(HistoryTag::new(history)));
    }

    /// Unlock, recording `history` as the actor in the device log.
    ///
    /// Dropped with a debug log unless a session is ready.
    pub fn unlock(&self, history: &str) {
        self.submit(Command::Unlock(HistoryTag::new(history)));
    }

    /// Stop the background task and disconnect.
    ///
    /// Idempotent. Interrupts any connect or retry wait, then waits up to the
    /// configured grace period for the task to close the link before
    /// aborting it.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let handle = {
            let mut task = self.lock_task();
            match std::mem::replace(&mut *task, Task::Stopped) {
                Task::Running { handle, .. } => Some(handle),
                Task::Pending { .. } | Task::Stopped => None,
            }
        };

        let Some(mut handle) = handle else {
            return;
        };

        tokio::select! {
            _ = &mut handle => debug!("client stopped"),
            () = self.env.sleep(self.config.stop_grace) => {
                warn!(grace = ?self.config.stop_grace, "driver did not stop in time, aborting");
                handle.abort();
            },
        }
    }

    /// Session state snapshots.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Most recent decoded status, if any.
    pub fn latest_status(&self) -> Option<MechStatus> {
        *self.status.borrow()
    }

    fn submit(&self, command: Command) {
        let task = self.lock_task();
        let Task::Running { requests, .. } = &*task else {
            debug!(item = ?command.item(), "client not running, dropping command");
            return;
        };

        if requests.send(Request::Command(command)).is_err() {
            debug!("driver gone, dropping command");
        }
    }

    fn spawn(&self, task: &mut Task<T>) -> Result<(), ClientError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let Task::Pending { transport, state, status } = std::mem::replace(task, Task::Stopped)
        else {
            return Ok(());
        };

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let channels =
            Channels { requests: requests_rx, state, status, cancel: self.cancel.clone() };
        let driver = Driver::new(
            transport,
            self.env.clone(),
            self.config.clone(),
            Arc::clone(&self.handler),
            channels,
        );

        let future = driver.run().instrument(self.span.clone());
        let handle = match &self.dispatch {
            Some(dispatch) => runtime.spawn(future.with_subscriber(dispatch.clone())),
            None => runtime.spawn(future),
        };

        *task = Task::Running { requests: requests_tx, handle };
        Ok(())
    }

    fn lock_task(&self) -> MutexGuard<'_, Task<T>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport, E: Environment> Drop for Client<T, E> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Task::Running { handle, .. } = &*self.lock_task() {
            handle.abort();
        }
    }
}

impl<T: Transport, E: Environment> fmt::Debug for Client<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &*self.state.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
