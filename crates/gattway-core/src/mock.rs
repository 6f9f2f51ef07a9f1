//! Mock radio implementation for testing.
//!
//! This module provides an in-memory radio that can be used for unit
//! testing without real BLE hardware.
//!
//! [`MockDriver`] implements [`RadioDriver`] and [`MockLink`] implements
//! [`DeviceLink`], so they slot in anywhere the real radio does.
//!
//! # Features
//!
//! - **Scripted attribute trees**: Build a device's services and
//!   characteristics with [`MockLinkBuilder`]
//! - **Failure injection**: Fail connects, subscriptions, or
//!   unsubscriptions on demand
//! - **Latency simulation**: Add artificial connect delay to exercise
//!   timeouts
//! - **Push delivery**: [`MockLink::push`] feeds the notification stream,
//!   delivered only while the (service, characteristic) tuple is
//!   subscribed

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use gattway_types::{AdvertisedDevice, CharacteristicInfo, ScanSelector, ServiceInfo};

use crate::driver::{DeviceLink, NotificationStream, RadioDriver, RawNotification};
use crate::error::{Error, Result};

/// An in-memory radio holding a fixed set of mock devices.
pub struct MockDriver {
    devices: Mutex<HashMap<String, Arc<MockLink>>>,
    advertised: Mutex<Vec<AdvertisedDevice>>,
    connect_count: AtomicU32,
    fail_connect: AtomicBool,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create an empty mock radio.
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            advertised: Mutex::new(Vec::new()),
            connect_count: AtomicU32::new(0),
            fail_connect: AtomicBool::new(false),
            connect_latency_ms: AtomicU64::new(0),
        }
    }

    /// Register a connectable device under an address.
    pub fn add_device(&self, address: &str, link: Arc<MockLink>) {
        self.devices
            .lock()
            .unwrap()
            .insert(address.to_string(), link);
    }

    /// Make an advertisement visible to [`RadioDriver::scan`].
    pub fn advertise(&self, device: AdvertisedDevice) {
        self.advertised.lock().unwrap().push(device);
    }

    /// The mock link registered under an address.
    pub fn link(&self, address: &str) -> Option<Arc<MockLink>> {
        self.devices.lock().unwrap().get(address).cloned()
    }

    /// How many connects have been attempted, successful or not.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Make every connect fail with a hardware error.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Delay every connect by the given duration.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }
}

#[async_trait]
impl RadioDriver for MockDriver {
    async fn scan(
        &self,
        selector: &ScanSelector,
        _duration: Duration,
    ) -> Result<Vec<AdvertisedDevice>> {
        let advertised = self.advertised.lock().unwrap().clone();
        Ok(advertised
            .into_iter()
            .filter(|device| selector.matches(device.name.as_deref()))
            .collect())
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn DeviceLink>> {
        self.connect_count.fetch_add(1, Ordering::Relaxed);

        let latency = self.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::hardware("mock connect failure"));
        }

        let link = self
            .link(address)
            .ok_or_else(|| Error::device_not_found(address))?;
        // A fresh connection gets a fresh notification stream, like a real
        // radio re-establishing the link.
        link.reset_stream();
        link.connected.store(true, Ordering::Relaxed);
        Ok(link as Arc<dyn DeviceLink>)
    }
}

/// One mock device connection with a scripted attribute tree.
pub struct MockLink {
    services: Vec<ServiceInfo>,
    characteristics: HashMap<Uuid, Vec<CharacteristicInfo>>,
    connected: AtomicBool,
    values: Mutex<HashMap<(Uuid, Uuid), Bytes>>,
    writes: Mutex<HashMap<(Uuid, Uuid), Vec<Bytes>>>,
    subscribed: Mutex<HashSet<(Uuid, Uuid)>>,
    subscribe_counts: Mutex<HashMap<(Uuid, Uuid), u32>>,
    unsubscribe_counts: Mutex<HashMap<(Uuid, Uuid), u32>>,
    discovery_count: AtomicU32,
    fail_subscribe: AtomicBool,
    fail_unsubscribe: AtomicBool,
    push_tx: Mutex<mpsc::UnboundedSender<RawNotification>>,
    push_rx: Mutex<Option<mpsc::UnboundedReceiver<RawNotification>>>,
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLink")
            .field("service_count", &self.services.len())
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MockLink {
    /// Start building a mock link's attribute tree.
    pub fn builder() -> MockLinkBuilder {
        MockLinkBuilder::default()
    }

    /// Set the value [`DeviceLink::read_value`] returns for a tuple.
    pub fn set_value(&self, service: Uuid, characteristic: Uuid, value: &[u8]) {
        self.values
            .lock()
            .unwrap()
            .insert((service, characteristic), Bytes::copy_from_slice(value));
    }

    /// Payloads written to a tuple, in order.
    pub fn written(&self, service: Uuid, characteristic: Uuid) -> Vec<Bytes> {
        self.writes
            .lock()
            .unwrap()
            .get(&(service, characteristic))
            .cloned()
            .unwrap_or_default()
    }

    /// How many times a tuple has been subscribed.
    pub fn subscribe_count(&self, service: Uuid, characteristic: Uuid) -> u32 {
        self.subscribe_counts
            .lock()
            .unwrap()
            .get(&(service, characteristic))
            .copied()
            .unwrap_or(0)
    }

    /// How many times a tuple's unsubscription has been attempted.
    pub fn unsubscribe_count(&self, service: Uuid, characteristic: Uuid) -> u32 {
        self.unsubscribe_counts
            .lock()
            .unwrap()
            .get(&(service, characteristic))
            .copied()
            .unwrap_or(0)
    }

    /// How many service enumerations have run.
    pub fn discovery_count(&self) -> u32 {
        self.discovery_count.load(Ordering::Relaxed)
    }

    /// Make [`DeviceLink::subscribe`] fail with a hardware error.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    /// Make [`DeviceLink::unsubscribe`] fail with a hardware error.
    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.fail_unsubscribe.store(fail, Ordering::Relaxed);
    }

    /// Force the reported connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Emit a push from a (service, characteristic) tuple.
    ///
    /// Delivered to the notification stream only while the tuple is
    /// subscribed, matching how a real peripheral behaves.
    pub async fn push(&self, service: Uuid, characteristic: Uuid, payload: &[u8]) {
        if !self
            .subscribed
            .lock()
            .unwrap()
            .contains(&(service, characteristic))
        {
            return;
        }
        let _ = self.push_tx.lock().unwrap().send(RawNotification {
            service_uuid: service,
            characteristic_uuid: characteristic,
            payload: Bytes::copy_from_slice(payload),
        });
    }

    /// Replace the notification channel, dropping anything undelivered.
    fn reset_stream(&self) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.push_tx.lock().unwrap() = tx;
        *self.push_rx.lock().unwrap() = Some(rx);
        self.subscribed.lock().unwrap().clear();
    }
}

#[async_trait]
impl DeviceLink for MockLink {
    async fn list_primary_services(&self) -> Result<Vec<ServiceInfo>> {
        self.discovery_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.services.clone())
    }

    async fn list_characteristics(&self, service: Uuid) -> Result<Vec<CharacteristicInfo>> {
        Ok(self
            .characteristics
            .get(&service)
            .cloned()
            .unwrap_or_default())
    }

    async fn read_value(&self, service: Uuid, characteristic: Uuid) -> Result<Bytes> {
        self.values
            .lock()
            .unwrap()
            .get(&(service, characteristic))
            .cloned()
            .ok_or_else(|| Error::hardware("no value scripted for characteristic"))
    }

    async fn write_without_response(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .entry((service, characteristic))
            .or_default()
            .push(Bytes::copy_from_slice(payload));
        Ok(())
    }

    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(Error::hardware("mock subscribe failure"));
        }
        *self
            .subscribe_counts
            .lock()
            .unwrap()
            .entry((service, characteristic))
            .or_insert(0) += 1;
        self.subscribed
            .lock()
            .unwrap()
            .insert((service, characteristic));
        Ok(())
    }

    async fn unsubscribe(&self, service: Uuid, characteristic: Uuid) -> Result<()> {
        *self
            .unsubscribe_counts
            .lock()
            .unwrap()
            .entry((service, characteristic))
            .or_insert(0) += 1;
        if self.fail_unsubscribe.load(Ordering::Relaxed) {
            return Err(Error::hardware("mock unsubscribe failure"));
        }
        self.subscribed
            .lock()
            .unwrap()
            .remove(&(service, characteristic));
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let rx = self
            .push_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::hardware("notification stream already taken"))?;
        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|raw| (raw, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Builder for a [`MockLink`]'s attribute tree.
#[derive(Default)]
pub struct MockLinkBuilder {
    services: Vec<ServiceInfo>,
    characteristics: HashMap<Uuid, Vec<CharacteristicInfo>>,
}

impl MockLinkBuilder {
    /// Add a service and its characteristics.
    #[must_use]
    pub fn service(
        mut self,
        service: ServiceInfo,
        characteristics: Vec<CharacteristicInfo>,
    ) -> Self {
        self.characteristics.insert(service.uuid, characteristics);
        self.services.push(service);
        self
    }

    /// Finish the tree and produce a shareable link.
    pub fn build(self) -> Arc<MockLink> {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        Arc::new(MockLink {
            services: self.services,
            characteristics: self.characteristics,
            connected: AtomicBool::new(false),
            values: Mutex::new(HashMap::new()),
            writes: Mutex::new(HashMap::new()),
            subscribed: Mutex::new(HashSet::new()),
            subscribe_counts: Mutex::new(HashMap::new()),
            unsubscribe_counts: Mutex::new(HashMap::new()),
            discovery_count: AtomicU32::new(0),
            fail_subscribe: AtomicBool::new(false),
            fail_unsubscribe: AtomicBool::new(false),
            push_tx: Mutex::new(push_tx),
            push_rx: Mutex::new(Some(push_rx)),
        })
    }
}
