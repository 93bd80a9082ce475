//! Protocol core for SESAME OS3 smart locks.
//!
//! Everything here is pure: no sockets, no timers, no tasks. The [`Session`]
//! state machine takes time as input and returns [`SessionAction`]s for a
//! driver to execute; the [`Supervisor`] decides whether a closed session is
//! rebuilt; [`translate`] turns raw status records into the normalized form
//! callers see.
//!
//! ```text
//! open ──> Connecting ──> Authenticating ──> Ready ──> Closing ──> Closed
//!              │                │              │                     ▲
//!              └────────────────┴──────────────┴── failure ──────────┘
//! ```
//!
//! Time comes from an [`Environment`] so the same code runs on the system
//! clock in production and on a paused clock in tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod identity;
pub mod session;
pub mod status;
pub mod supervisor;

pub use env::Environment;
pub use error::{CloseReason, SessionError};
pub use identity::{DeviceIdentity, KeyError, SecretKey};
pub use session::{Session, SessionAction, SessionConfig, SessionState};
pub use status::{LockStatus, MechStatus, battery_percentage, battery_voltage, translate};
pub use supervisor::{Decision, PolicyError, ReconnectPolicy, Supervisor};
