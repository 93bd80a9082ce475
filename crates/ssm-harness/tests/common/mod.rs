//! Shared fixtures: a client wired to a simulated lock, and an event recorder.

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use ssm_client::{
    Client, ClientConfig, EventHandler, MechStatus, RawMechStatus, ReconnectPolicy, SessionState,
};
use ssm_harness::{SimEnv, SimTransport};
use tokio::time::Instant;

pub const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
pub const SECRET_HEX: &str = "00112233445566778899aabbccddeeff";
pub const SECRET: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect(bool),
    Status(MechStatus, RawMechStatus),
}

#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<(Instant, Event)>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<(Instant, Event)> {
        self.events.lock().unwrap().clone()
    }

    pub fn connects(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|(_, event)| match event {
                Event::Connect(connected) => Some(connected),
                Event::Status(..) => None,
            })
            .collect()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.events()
            .into_iter()
            .filter(|(_, event)| matches!(event, Event::Connect(_)))
            .map(|(at, _)| at)
            .collect()
    }

    pub fn statuses(&self) -> Vec<(MechStatus, RawMechStatus)> {
        self.events()
            .into_iter()
            .filter_map(|(_, event)| match event {
                Event::Status(status, raw) => Some((status, raw)),
                Event::Connect(_) => None,
            })
            .collect()
    }
}

impl EventHandler for Recorder {
    fn on_status_changed(&self, status: &MechStatus, raw: &RawMechStatus) {
        self.events.lock().unwrap().push((Instant::now(), Event::Status(*status, *raw)));
    }

    fn on_connect(&self, connected: bool) {
        self.events.lock().unwrap().push((Instant::now(), Event::Connect(connected)));
    }
}

pub struct Rig {
    pub env: SimEnv,
    pub transport: SimTransport,
    pub recorder: Arc<Recorder>,
    pub client: Client<SimTransport, SimEnv>,
    pub start: Instant,
}

/// Client with default configuration wired to a simulated lock.
///
/// Call from inside a paused tokio runtime.
pub fn rig() -> Rig {
    rig_with(ClientConfig::default())
}

pub fn rig_with(config: ClientConfig) -> Rig {
    let env = SimEnv::new(42);
    let transport = SimTransport::new(env.clone(), SECRET);
    let recorder = Arc::new(Recorder::default());
    let client =
        Client::with_env(transport.clone(), env.clone(), config, Arc::clone(&recorder));

    Rig { env, transport, recorder, client, start: Instant::now() }
}

pub fn policy(max_retries: u32, interval_secs: u64) -> ReconnectPolicy {
    ReconnectPolicy { max_retries, interval: Duration::from_secs(interval_secs) }
}

/// Poll `condition` on virtual time until it holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(300);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in virtual time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_state(client: &Client<SimTransport, SimEnv>, state: SessionState) {
    let mut rx = client.state();
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|current| *current == state))
        .await
        .expect("state not reached")
        .expect("driver gone");
}

/// Connect with the default policy and wait for the session to be ready.
pub async fn connected_rig() -> Rig {
    let rig = rig();
    rig.client.connect(ADDRESS, SECRET_HEX, ReconnectPolicy::default()).unwrap();
    wait_for_state(&rig.client, SessionState::Ready).await;
    rig
}

/// Let queued work run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
