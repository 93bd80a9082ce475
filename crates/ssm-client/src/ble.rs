//! BLE transport over btleplug.
//!
//! Resolves the configured address with a service-filtered scan, connects,
//! discovers the SESAME OS3 GATT service, and subscribes to the notify
//! characteristic. Scanning only ever looks for the one address given.

use std::{pin::Pin, time::Duration};

use btleplug::{
    api::{
        Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
        ValueNotification, WriteType,
    },
    platform::{Adapter, Manager, Peripheral, PeripheralId},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use ssm_proto::DEFAULT_WRITE_LEN;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::transport::{Link, Transport, TransportError};

/// SESAME OS3 primary service.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_fd81_0000_1000_8000_0080_5f9b_34fb);

/// Characteristic the client writes segments to.
pub const WRITE_UUID: Uuid = Uuid::from_u128(0x1686_0002_a5ae_9856_b6d3_dbb4_c676_993e);

/// Characteristic the lock notifies segments on.
pub const NOTIFY_UUID: Uuid = Uuid::from_u128(0x1686_0003_a5ae_9856_b6d3_dbb4_c676_993e);

/// Default time spent resolving an address before giving up.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(8);

const DISCOVERY_POLL: Duration = Duration::from_millis(250);

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;
type EventStream = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

fn connect_error(err: btleplug::Error) -> TransportError {
    TransportError::Connect(err.to_string())
}

/// BLE transport on the first local adapter.
#[derive(Debug, Clone)]
pub struct BleTransport {
    adapter: Adapter,
    discovery_timeout: Duration,
}

impl BleTransport {
    /// Open the first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connect` if no adapter is available.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await.map_err(connect_error)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(connect_error)?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Connect("no bluetooth adapter".to_string()))?;

        Ok(Self { adapter, discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT })
    }

    /// Bound on address resolution.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    async fn resolve(&self, address: &str) -> Result<Peripheral, TransportError> {
        self.adapter
            .start_scan(ScanFilter { services: vec![SERVICE_UUID] })
            .await
            .map_err(connect_error)?;

        let found = self.poll_for(address).await;

        if let Err(err) = self.adapter.stop_scan().await {
            debug!(error = %err, "stop scan failed");
        }
        found
    }

    async fn poll_for(&self, address: &str) -> Result<Peripheral, TransportError> {
        let started = tokio::time::Instant::now();

        loop {
            for peripheral in self.adapter.peripherals().await.map_err(connect_error)? {
                if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                    return Ok(peripheral);
                }
            }

            if started.elapsed() >= self.discovery_timeout {
                return Err(TransportError::Connect(format!("device {address} not found")));
            }
            tokio::time::sleep(DISCOVERY_POLL).await;
        }
    }

    async fn open(&self, peripheral: &Peripheral) -> Result<BleLink, TransportError> {
        peripheral.discover_services().await.map_err(connect_error)?;

        let characteristics = peripheral.characteristics();
        let find = |uuid: Uuid| {
            characteristics.iter().find(|c| c.uuid == uuid).cloned().ok_or_else(|| {
                TransportError::Connect(format!("characteristic {uuid} not found"))
            })
        };
        let write = find(WRITE_UUID)?;
        let notify = find(NOTIFY_UUID)?;

        let events = self.adapter.events().await.map_err(connect_error)?;
        let notifications = peripheral.notifications().await.map_err(connect_error)?;
        peripheral.subscribe(&notify).await.map_err(connect_error)?;

        Ok(BleLink {
            id: peripheral.id(),
            peripheral: peripheral.clone(),
            write,
            notifications,
            events,
        })
    }
}

impl Transport for BleTransport {
    type Link = BleLink;

    async fn connect(&self, address: &str) -> Result<BleLink, TransportError> {
        let peripheral = self.resolve(address).await?;
        peripheral.connect().await.map_err(connect_error)?;

        match self.open(&peripheral).await {
            Ok(link) => Ok(link),
            Err(err) => {
                if let Err(disconnect) = peripheral.disconnect().await {
                    debug!(error = %disconnect, "disconnect after failed setup");
                }
                Err(err)
            },
        }
    }
}

/// Connected BLE peripheral.
pub struct BleLink {
    id: PeripheralId,
    peripheral: Peripheral,
    write: Characteristic,
    notifications: NotificationStream,
    events: EventStream,
}

impl Link for BleLink {
    fn max_write_len(&self) -> usize {
        DEFAULT_WRITE_LEN
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        self.peripheral
            .write(&self.write, &chunk, WriteType::WithResponse)
            .await
            .map_err(|err| TransportError::Write(err.to_string()))
    }

    async fn recv(&mut self) -> Option<Bytes> {
        loop {
            tokio::select! {
                notification = self.notifications.next() => match notification {
                    Some(notification) if notification.uuid == NOTIFY_UUID => {
                        return Some(Bytes::from(notification.value));
                    },
                    Some(_) => {},
                    None => return None,
                },
                event = self.events.next() => match event {
                    Some(CentralEvent::DeviceDisconnected(id)) if id == self.id => return None,
                    Some(_) => {},
                    None => return None,
                },
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Err(err) = self.peripheral.disconnect().await {
            warn!(error = %err, "disconnect failed");
        }
    }
}
