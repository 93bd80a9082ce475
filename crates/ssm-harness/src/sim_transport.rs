//! In-memory transport with fault injection.
//!
//! Connects the client to a [`SimPeripheral`]. Each connect opens a fresh
//! notification channel; disconnecting or dropping the link closes it, so
//! notifications never leak from one link into the next.
//!
//! The transport handle is cloneable. Tests keep one clone to inject faults
//! and inspect what the peripheral saw while the client owns the other.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use ssm_client::{Link, Transport, TransportError};
use ssm_core::Environment;
use ssm_proto::{Command, DEFAULT_WRITE_LEN, RawMechStatus};
use tokio::{sync::mpsc, time::Instant};
use tracing::debug;

use crate::{
    sim_env::SimEnv,
    sim_peripheral::{PeripheralBehavior, SimPeripheral},
};

/// Injected transport faults.
#[derive(Debug, Clone)]
pub struct Faults {
    /// Every connect fails
    pub unreachable: bool,
    /// Fail this many connects, then succeed
    pub fail_connects: u32,
    /// Connects never complete
    pub hang_connects: bool,
    /// Delay before each connect completes
    pub connect_delay: Duration,
    /// Writes fail
    pub fail_writes: bool,
    /// Link write size
    pub max_write_len: usize,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            unreachable: false,
            fail_connects: 0,
            hang_connects: false,
            connect_delay: Duration::ZERO,
            fail_writes: false,
            max_write_len: DEFAULT_WRITE_LEN,
        }
    }
}

#[derive(Debug)]
struct Shared {
    peripheral: SimPeripheral,
    faults: Faults,
    connects: Vec<Instant>,
    disconnects: u32,
    generation: u64,
    active: Option<mpsc::UnboundedSender<Bytes>>,
}

impl Shared {
    fn deliver(&self, chunks: Vec<Bytes>) {
        let Some(active) = &self.active else {
            return;
        };
        for chunk in chunks {
            if active.send(chunk).is_err() {
                return;
            }
        }
    }
}

/// Simulated transport.
#[derive(Debug, Clone)]
pub struct SimTransport {
    env: SimEnv,
    shared: Arc<Mutex<Shared>>,
}

impl SimTransport {
    /// Transport to a lock registered with `secret`.
    pub fn new(env: SimEnv, secret: [u8; 16]) -> Self {
        let shared = Shared {
            peripheral: SimPeripheral::new(secret),
            faults: Faults::default(),
            connects: Vec::new(),
            disconnects: 0,
            generation: 0,
            active: None,
        };
        Self { env, shared: Arc::new(Mutex::new(shared)) }
    }

    /// Change fault settings.
    pub fn set_faults(&self, update: impl FnOnce(&mut Faults)) {
        update(&mut self.lock().faults);
    }

    /// Change peripheral behavior.
    pub fn set_behavior(&self, update: impl FnOnce(&mut PeripheralBehavior)) {
        update(self.lock().peripheral.behavior_mut());
    }

    /// Times at which connects were attempted.
    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.lock().connects.clone()
    }

    /// Links torn down by the client.
    pub fn disconnects(&self) -> u32 {
        self.lock().disconnects
    }

    /// True while a link is up.
    pub fn is_linked(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Commands the peripheral executed.
    pub fn commands(&self) -> Vec<Command> {
        self.lock().peripheral.commands().to_vec()
    }

    /// Change the mechanical status and publish it on the active link.
    pub fn publish_status(&self, status: RawMechStatus) {
        let mut shared = self.lock();
        shared.peripheral.set_status(status);
        let chunks = shared.peripheral.publish_status();
        shared.deliver(chunks);
    }

    /// Seal a status publish under the current session keys without
    /// delivering it. Empty unless logged in.
    pub fn seal_status(&self, status: RawMechStatus) -> Vec<Bytes> {
        let mut shared = self.lock();
        shared.peripheral.set_status(status);
        shared.peripheral.publish_status()
    }

    /// Publish a status frame whose tag fails authentication.
    pub fn publish_tampered_status(&self) {
        let mut shared = self.lock();
        let chunks = shared.peripheral.tampered_status();
        shared.deliver(chunks);
    }

    /// Deliver raw chunks on the active link.
    pub fn inject(&self, chunks: Vec<Bytes>) {
        self.lock().deliver(chunks);
    }

    /// Drop the active link as if the radio lost it.
    pub fn drop_link(&self) {
        let mut shared = self.lock();
        shared.active = None;
        shared.peripheral.disconnect();
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for SimTransport {
    type Link = SimLink;

    async fn connect(&self, address: &str) -> Result<SimLink, TransportError> {
        let faults = {
            let mut shared = self.lock();
            shared.connects.push(Instant::now());
            shared.faults.clone()
        };

        if faults.hang_connects {
            std::future::pending::<()>().await;
        }
        if !faults.connect_delay.is_zero() {
            self.env.sleep(faults.connect_delay).await;
        }

        let mut shared = self.lock();
        if shared.faults.unreachable {
            return Err(TransportError::Connect(format!("{address} unreachable")));
        }
        if shared.faults.fail_connects > 0 {
            shared.faults.fail_connects -= 1;
            return Err(TransportError::Connect(format!("{address} refused")));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        shared.generation += 1;
        shared.active = Some(tx);

        let mut random_code = [0u8; 4];
        self.env.random_bytes(&mut random_code);
        let chunks = shared.peripheral.connect(random_code);
        shared.deliver(chunks);

        debug!(%address, generation = shared.generation, "sim link up");
        Ok(SimLink {
            shared: Arc::clone(&self.shared),
            notifications: rx,
            generation: shared.generation,
            max_write_len: faults.max_write_len,
        })
    }
}

/// One simulated link.
#[derive(Debug)]
pub struct SimLink {
    shared: Arc<Mutex<Shared>>,
    notifications: mpsc::UnboundedReceiver<Bytes>,
    generation: u64,
    max_write_len: usize,
}

impl SimLink {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Link for SimLink {
    fn max_write_len(&self) -> usize {
        self.max_write_len
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        let mut shared = self.lock();
        if shared.generation != self.generation || shared.active.is_none() {
            return Err(TransportError::Closed);
        }
        if shared.faults.fail_writes {
            return Err(TransportError::Write("injected write failure".to_string()));
        }

        let chunks = shared.peripheral.write(&chunk);
        shared.deliver(chunks);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Bytes> {
        self.notifications.recv().await
    }

    async fn disconnect(&mut self) {
        let mut shared = self.lock();
        if shared.generation == self.generation && shared.active.is_some() {
            shared.active = None;
            shared.peripheral.disconnect();
            shared.disconnects += 1;
        }
    }
}
