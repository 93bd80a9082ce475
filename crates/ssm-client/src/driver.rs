//! Background driver.
//!
//! Runs in one tokio task per client. Owns the session state machine, the
//! supervisor, key material, and the active link; executes the actions the
//! state machine returns and feeds it transport events, requests, and ticks.
//!
//! # Phases
//!
//! Each loop iteration runs exactly one phase, chosen from current state:
//!
//! - **Linked**: link up; notifications, requests, and deadline ticks
//! - **Connecting**: transport connect bounded by the connect timeout
//! - **Backoff**: supervisor asked for a wait before the next attempt
//! - **Idle**: nothing to do until the caller connects
//!
//! Cancellation interrupts every phase. The driver then closes the session
//! and disconnects the link before returning.

use std::{collections::VecDeque, ops::ControlFlow, sync::Arc, time::Duration};

use ssm_core::{
    Decision, DeviceIdentity, Environment, MechStatus, ReconnectPolicy, Session, SessionAction,
    SessionError, SessionState, Supervisor, translate,
};
use ssm_proto::Command;
use tokio::{
    sync::{mpsc, watch},
    time::{Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    handler::EventHandler,
    transport::{Link, Transport, TransportError},
};

/// Requests from the facade.
#[derive(Debug)]
pub(crate) enum Request {
    Connect { identity: DeviceIdentity, policy: ReconnectPolicy },
    Command(Command),
}

/// Channels shared with the facade.
pub(crate) struct Channels {
    pub requests: mpsc::UnboundedReceiver<Request>,
    pub state: watch::Sender<SessionState>,
    pub status: watch::Sender<Option<MechStatus>>,
    pub cancel: CancellationToken,
}

enum LinkedEvent {
    Notification(Option<bytes::Bytes>),
    Request(Option<Request>),
    Tick,
}

pub(crate) struct Driver<T: Transport, E: Environment> {
    transport: T,
    env: E,
    config: ClientConfig,
    session: Session<E::Instant>,
    supervisor: Supervisor,
    identity: Option<DeviceIdentity>,
    link: Option<T::Link>,
    backoff: Option<Duration>,
    handler: Arc<dyn EventHandler>,
    requests: mpsc::UnboundedReceiver<Request>,
    state: watch::Sender<SessionState>,
    status: watch::Sender<Option<MechStatus>>,
    cancel: CancellationToken,
}

impl<T: Transport, E: Environment> Driver<T, E> {
    pub(crate) fn new(
        transport: T,
        env: E,
        config: ClientConfig,
        handler: Arc<dyn EventHandler>,
        channels: Channels,
    ) -> Self {
        Self {
            transport,
            env,
            session: Session::new(config.session.clone()),
            config,
            supervisor: Supervisor::new(ReconnectPolicy::default()),
            identity: None,
            link: None,
            backoff: None,
            handler,
            requests: channels.requests,
            state: channels.state,
            status: channels.status,
            cancel: channels.cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("driver started");

        let period = self.config.tick_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let flow = if self.link.is_some() {
                self.step_linked(&mut ticker).await
            } else if self.session.state() == SessionState::Connecting {
                self.step_connect().await
            } else if let Some(delay) = self.backoff.take() {
                self.step_backoff(delay).await
            } else {
                self.step_idle().await
            };

            if flow.is_break() {
                break;
            }
        }

        self.shutdown().await;
        debug!("driver stopped");
    }

    async fn step_idle(&mut self) -> ControlFlow<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => ControlFlow::Break(()),
            request = self.requests.recv() => self.handle_request(request).await,
        }
    }

    async fn step_connect(&mut self) -> ControlFlow<()> {
        let Some(address) = self.session.address().map(str::to_owned) else {
            let actions = self.session.transport_failed("no device address");
            self.execute(actions).await;
            return ControlFlow::Continue(());
        };

        info!(%address, "connecting");

        let result = {
            let connect = self.transport.connect(&address);
            let deadline = self.env.sleep(self.config.connect_timeout);
            tokio::pin!(connect, deadline);

            loop {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return ControlFlow::Break(()),
                    result = &mut connect => break result,
                    () = &mut deadline => break Err(TransportError::Timeout),
                    request = self.requests.recv() => match request {
                        None => return ControlFlow::Break(()),
                        Some(Request::Connect { .. }) => {
                            warn!(%address, "connect already in progress, ignoring");
                        },
                        Some(Request::Command(command)) => {
                            debug!(item = ?command.item(), "not connected, dropping command");
                        },
                    },
                }
            }
        };

        match result {
            Ok(link) => {
                let write_len = link.max_write_len();
                self.link = Some(link);

                match self.session.transport_connected(write_len, self.env.now()) {
                    Ok(actions) => self.execute(actions).await,
                    Err(err) => {
                        warn!(error = %err, "link up in unexpected state");
                        self.drop_link().await;
                    },
                }
            },
            Err(err) => {
                warn!(%address, error = %err, "connect failed");
                let actions = self.session.transport_failed(err.to_string());
                self.execute(actions).await;
            },
        }

        ControlFlow::Continue(())
    }

    async fn step_backoff(&mut self, delay: Duration) -> ControlFlow<()> {
        debug!(?delay, "waiting before retry");

        let interrupted = {
            let sleep = self.env.sleep(delay);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return ControlFlow::Break(()),
                    () = &mut sleep => break None,
                    request = self.requests.recv() => match request {
                        None => return ControlFlow::Break(()),
                        Some(Request::Command(command)) => {
                            debug!(item = ?command.item(), "not connected, dropping command");
                        },
                        Some(other) => break Some(other),
                    },
                }
            }
        };

        match interrupted {
            // Manual connect during the wait starts over with a fresh counter
            Some(request) => self.handle_request(Some(request)).await,
            None => {
                self.open_session().await;
                ControlFlow::Continue(())
            },
        }
    }

    async fn step_linked(&mut self, ticker: &mut Interval) -> ControlFlow<()> {
        let Some(link) = self.link.as_mut() else {
            return ControlFlow::Continue(());
        };

        let event = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return ControlFlow::Break(()),
            chunk = link.recv() => LinkedEvent::Notification(chunk),
            request = self.requests.recv() => LinkedEvent::Request(request),
            _ = ticker.tick() => LinkedEvent::Tick,
        };

        match event {
            LinkedEvent::Notification(Some(chunk)) => {
                match self.session.receive(&chunk, self.env.now()) {
                    Ok(actions) => self.execute(actions).await,
                    Err(err) => warn!(error = %err, "dropping inbound message"),
                }
            },
            LinkedEvent::Notification(None) => {
                warn!("link lost");
                let actions = self.session.transport_failed("link lost");
                self.execute(actions).await;
            },
            LinkedEvent::Request(request) => return self.handle_request(request).await,
            LinkedEvent::Tick => {
                let actions = self.session.tick(self.env.now());
                self.execute(actions).await;
            },
        }

        ControlFlow::Continue(())
    }

    async fn handle_request(&mut self, request: Option<Request>) -> ControlFlow<()> {
        match request {
            None => return ControlFlow::Break(()),
            Some(Request::Command(command)) => match self.session.send(&command) {
                Ok(actions) => self.execute(actions).await,
                Err(err) => debug!(item = ?command.item(), error = %err, "dropping command"),
            },
            Some(Request::Connect { identity, policy }) => {
                let state = self.session.state();
                if matches!(state, SessionState::Idle | SessionState::Closed) {
                    self.supervisor.rearm(policy);
                    self.backoff = None;
                    self.identity = Some(identity);
                    self.open_session().await;
                } else {
                    warn!(address = %identity.address, ?state, "already connected, ignoring connect");
                }
            },
        }

        ControlFlow::Continue(())
    }

    async fn open_session(&mut self) {
        let Some(identity) = self.identity.clone() else {
            return;
        };

        match self.session.open(identity) {
            Ok(actions) => self.execute(actions).await,
            Err(err) => warn!(error = %err, "cannot open session"),
        }
    }

    /// Execute session actions in order.
    ///
    /// Actions produced while executing (a failed write closing the session)
    /// are appended to the queue.
    async fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut pending: VecDeque<SessionAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            match action {
                SessionAction::ConnectTransport { address } => {
                    debug!(%address, "transport connect requested");
                },
                SessionAction::Write(chunk) => {
                    let Some(link) = self.link.as_mut() else {
                        continue;
                    };
                    if let Err(err) = link.write(chunk).await {
                        warn!(error = %err, "write failed");
                        pending.retain(|action| !matches!(action, SessionAction::Write(_)));
                        pending.extend(self.session.transport_failed(err.to_string()));
                    }
                },
                SessionAction::Connected { login_timestamp } => {
                    self.supervisor.on_ready();
                    self.publish_state();
                    info!(login_timestamp, "session ready");
                    self.handler.on_connect(true);
                },
                SessionAction::StatusDecoded(raw) => {
                    let status = translate(&raw, self.env.wall_clock_secs());
                    debug!(status = ?status.status, battery = status.battery_percentage, "status");
                    self.status.send_replace(Some(status));
                    self.handler.on_status_changed(&status, &raw);
                },
                SessionAction::Disconnect => self.drop_link().await,
                SessionAction::Close { reason } => {
                    // A closed session never keeps a link
                    self.drop_link().await;
                    self.publish_state();
                    match self.supervisor.on_closed(&reason) {
                        Decision::Idle => debug!(%reason, "session closed"),
                        Decision::RetryAfter(delay) => self.backoff = Some(delay),
                        Decision::GiveUp { attempts } => {
                            let error = SessionError::ExhaustedRetries { attempts };
                            info!(%error, "reporting connect failure");
                            self.handler.on_connect(false);
                        },
                    }
                },
            }
        }

        self.publish_state();
    }

    async fn drop_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.disconnect().await;
        }
    }

    async fn shutdown(&mut self) {
        self.supervisor.stop();
        self.backoff = None;

        let actions = self.session.close();
        self.execute(actions).await;
        let actions = self.session.finish_close();
        self.execute(actions).await;

        self.drop_link().await;
        self.identity = None;
        self.publish_state();
    }

    fn publish_state(&self) {
        let current = self.session.state();
        self.state.send_if_modified(|state| {
            let changed = *state != current;
            *state = current;
            changed
        });
    }
}
