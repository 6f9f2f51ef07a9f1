//! The gateway facade: every attribute operation against any device.
//!
//! [`Gateway`] is the one entry point callers use. Each operation resolves
//! the target device through the [`SessionCache`] (establishing the
//! session on first touch), validates the addressed attribute against the
//! cached [`AttributeIndex`], and only then talks to the radio. Callers
//! never see connection or discovery as separate steps.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::driver::RadioDriver;
use crate::error::{Error, Result};
use crate::session::{DeviceSession, SessionCache};

use gattway_types::{
    AdvertisedDevice, CharacteristicInfo, NotificationRecord, ScanSelector, ServiceInfo,
};

/// Synchronous facade over cached device sessions.
pub struct Gateway {
    cache: SessionCache,
    driver: Arc<dyn RadioDriver>,
    config: LinkConfig,
}

impl Gateway {
    /// Create a gateway over a radio driver.
    pub fn new(driver: Arc<dyn RadioDriver>, config: LinkConfig) -> Self {
        Self {
            cache: SessionCache::new(Arc::clone(&driver), config.clone()),
            driver,
            config,
        }
    }

    /// Scan for advertising devices matching a selector.
    ///
    /// Scanning never touches the session cache; it reports what the radio
    /// hears right now, whether or not a device is already cached.
    pub async fn scan(&self, selector: &ScanSelector) -> Result<Vec<AdvertisedDevice>> {
        info!(?selector, "scanning for devices");
        let devices = self.driver.scan(selector, self.config.scan_duration).await?;
        info!(count = devices.len(), "scan finished");
        Ok(devices)
    }

    /// Whether a device currently answers on its link.
    ///
    /// Establishes the session if needed, then asks the link itself rather
    /// than trusting cache presence.
    pub async fn check_connection(&self, address: &str) -> Result<bool> {
        let session = self.cache.resolve(address).await?;
        Ok(session.link().is_connected().await)
    }

    /// List a device's primary services.
    pub async fn list_services(&self, address: &str) -> Result<Vec<ServiceInfo>> {
        let session = self.cache.resolve(address).await?;
        Ok(session.index().services().to_vec())
    }

    /// List the characteristics under one of a device's services.
    pub async fn list_characteristics(
        &self,
        address: &str,
        service: Uuid,
    ) -> Result<Vec<CharacteristicInfo>> {
        let session = self.cache.resolve(address).await?;
        Ok(session.index().characteristics_of(service)?.to_vec())
    }

    /// Read a characteristic's current value.
    pub async fn read(&self, address: &str, service: Uuid, characteristic: Uuid) -> Result<Bytes> {
        let session = self.cache.resolve(address).await?;
        session.index().find_characteristic(service, characteristic)?;

        let value = self
            .bounded(
                "read",
                self.config.read_timeout,
                session.link().read_value(service, characteristic),
            )
            .await?;
        debug!(%characteristic, len = value.len(), "read value");
        Ok(value)
    }

    /// Write a payload to a characteristic, without response.
    pub async fn write(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<()> {
        let session = self.cache.resolve(address).await?;
        session.index().find_characteristic(service, characteristic)?;

        self.bounded(
            "write",
            self.config.write_timeout,
            session
                .link()
                .write_without_response(service, characteristic, payload),
        )
        .await?;
        debug!(%characteristic, len = payload.len(), "wrote value");
        Ok(())
    }

    /// Start buffering pushes from a characteristic.
    ///
    /// Fails with [`Error::Unsupported`] when the characteristic declares
    /// neither the notify nor the indicate capability. Safe to repeat; a
    /// second registration for the same tuple is a no-op.
    pub async fn register_notify(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        let session = self.cache.resolve(address).await?;
        let info = session.index().find_characteristic(service, characteristic)?;
        if !info.properties.supports_push() {
            return Err(Error::unsupported(characteristic));
        }

        let newly_armed = session.buffer().arm(service, characteristic).await;
        if !newly_armed {
            debug!(%characteristic, "already registered");
            return Ok(());
        }

        // Arm first so nothing pushed between subscribe and arm is lost;
        // roll back if the radio refuses the subscription.
        if let Err(e) = session.link().subscribe(service, characteristic).await {
            session.buffer().disarm_tuple(service, characteristic).await;
            return Err(e);
        }
        info!(%address, %service, %characteristic, "registered for notifications");
        Ok(())
    }

    /// Stop buffering pushes for the whole device and discard its queue.
    ///
    /// Disarms every registered tuple on the device, not just the addressed
    /// one, and drops all buffered-but-undrained records. The addressed
    /// characteristic must still carry a push capability, mirroring
    /// [`register_notify`](Self::register_notify).
    pub async fn unregister_notify(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        let session = self.cache.resolve(address).await?;
        let info = session.index().find_characteristic(service, characteristic)?;
        if !info.properties.supports_push() {
            return Err(Error::unsupported(characteristic));
        }

        let armed = session.buffer().disarm_all().await;
        // Best-effort across all tuples: one failed unsubscription must not
        // leave the rest subscribed at the radio with nothing armed.
        let mut first_err = None;
        for (armed_service, armed_characteristic) in &armed {
            if let Err(e) = session
                .link()
                .unsubscribe(*armed_service, *armed_characteristic)
                .await
            {
                warn!(
                    %address,
                    characteristic = %armed_characteristic,
                    "unsubscribe failed: {e}"
                );
                first_err.get_or_insert(e);
            }
        }
        if !armed.is_empty() {
            info!(%address, disarmed = armed.len(), "unregistered from notifications");
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Remove and return every buffered notification for a tuple, oldest
    /// first.
    ///
    /// Drained records are gone; a repeat drain only ever sees newer
    /// arrivals. An empty buffer is an error so pollers can tell "nothing
    /// yet" apart from an empty payload.
    pub async fn drain_notifications(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<NotificationRecord>> {
        let session = self.cache.resolve(address).await?;
        session.index().find_characteristic(service, characteristic)?;

        let records = session.buffer().drain(service, characteristic).await;
        if records.is_empty() {
            return Err(Error::no_data(service, characteristic));
        }
        debug!(%characteristic, count = records.len(), "drained notifications");
        Ok(records)
    }

    /// Drop a device's cached session; the next operation re-establishes
    /// it from scratch.
    pub async fn invalidate(&self, address: &str) -> bool {
        self.cache.invalidate(address).await
    }

    /// Addresses with an established session.
    pub async fn cached_addresses(&self) -> Vec<String> {
        self.cache.addresses().await
    }

    /// The session for an address, if one is established.
    pub async fn session(&self, address: &str) -> Option<Arc<DeviceSession>> {
        self.cache.get(address).await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        limit: Duration,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        timeout(limit, fut)
            .await
            .map_err(|_| Error::timeout(operation, limit))?
    }
}
