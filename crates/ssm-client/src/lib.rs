//! Async client for SESAME OS3 smart locks.
//!
//! Wraps the sans-IO [`ssm_core`] state machines in one background tokio task
//! per lock: connecting, logging in, decoding notifications, and rebuilding
//! the session after failures.
//!
//! # Architecture
//!
//! ```text
//! Client ──requests──> driver task ──> Session ──> Link::write
//!   ▲                      │  ▲
//!   │                      │  └── Link::recv (notifications)
//!   └── watch snapshots ───┤
//!                          └──> EventHandler callbacks
//! ```
//!
//! The [`Transport`] trait is the seam to the radio. With the `btleplug`
//! feature enabled, [`ble::BleTransport`] talks to real hardware.
//!
//! # Observability
//!
//! The crate only emits `tracing` events and never installs a subscriber.
//! Callers route them with [`Client::with_span`] and
//! [`Client::with_dispatch`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod driver;
mod error;
mod handler;
mod system_env;
mod transport;

#[cfg(feature = "btleplug")]
pub mod ble;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_STOP_GRACE, DEFAULT_TICK_INTERVAL};
pub use error::ClientError;
pub use handler::{Callbacks, EventHandler, NoopHandler};
pub use ssm_core::{
    DeviceIdentity, Environment, LockStatus, MechStatus, ReconnectPolicy, SessionState,
};
pub use ssm_proto::RawMechStatus;
pub use system_env::SystemEnv;
pub use transport::{Link, Transport, TransportError};
