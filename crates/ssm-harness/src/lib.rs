//! Deterministic simulation harness for SESAME OS3 client testing.
//!
//! [`SimEnv`] runs on tokio's pausable clock with a seeded RNG;
//! [`SimPeripheral`] implements the lock's side of the protocol; and
//! [`SimTransport`] joins the two with injectable faults (unreachable device,
//! refused or hanging connects, failed writes, lost links, tampered frames).
//!
//! ```text
//! Client ──> driver ──> SimLink ──write──> SimPeripheral
//!                          ▲                    │
//!                          └──── notifications ─┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;
pub mod sim_peripheral;
pub mod sim_transport;

pub use sim_env::SimEnv;
pub use sim_peripheral::{PeripheralBehavior, SimPeripheral};
pub use sim_transport::{Faults, SimLink, SimTransport};
