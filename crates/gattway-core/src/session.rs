//! Device sessions and the session cache.
//!
//! A [`DeviceSession`] binds one established radio connection to its
//! discovered [`AttributeIndex`] and its [`NotificationBuffer`]; the
//! [`SessionCache`] maps device addresses to sessions and owns the lazy
//! connect-and-discover path. Discovery is expensive (a radio round trip
//! plus two enumeration passes), so it runs at most once per address:
//! concurrent resolvers for the same address await a single in-flight
//! establishment, while resolvers for different addresses proceed
//! independently.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{OnceCell, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::driver::{DeviceLink, RadioDriver};
use crate::error::{Error, Result};
use crate::index::AttributeIndex;
use crate::notify::NotificationBuffer;

use gattway_types::NotificationRecord;

/// One cached device session: connection, attribute snapshot, and
/// notification buffer.
///
/// Sessions are created by [`SessionCache::resolve`] and shared as
/// `Arc<DeviceSession>`; exactly one session exists per address until it
/// is explicitly invalidated.
pub struct DeviceSession {
    address: String,
    link: Arc<dyn DeviceLink>,
    index: AttributeIndex,
    buffer: Arc<NotificationBuffer>,
    /// Cancels the appender task when the session goes away.
    appender: CancellationToken,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("address", &self.address)
            .field("service_count", &self.index.services().len())
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// The device address this session is cached under.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The established connection.
    pub fn link(&self) -> &Arc<dyn DeviceLink> {
        &self.link
    }

    /// The discovered attribute snapshot.
    pub fn index(&self) -> &AttributeIndex {
        &self.index
    }

    /// The device's notification buffer.
    pub fn buffer(&self) -> &NotificationBuffer {
        &self.buffer
    }

    /// Spawn the appender task that moves raw pushes from the link's
    /// notification stream into the buffer.
    ///
    /// The driver callback context never touches cache state directly:
    /// pushes travel through the stream and are applied by this single
    /// task, so no lock is held across the driver boundary.
    async fn start_appender(&self) -> Result<()> {
        let mut stream = self.link.notifications().await?;
        let buffer = Arc::clone(&self.buffer);
        let token = self.appender.clone();
        let address = self.address.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(address = %address, "appender cancelled");
                        break;
                    }
                    next = stream.next() => match next {
                        Some(raw) => {
                            let record = NotificationRecord::now(
                                raw.service_uuid,
                                raw.characteristic_uuid,
                                raw.payload,
                            );
                            buffer.append(record).await;
                        }
                        None => {
                            debug!(address = %address, "notification stream ended");
                            break;
                        }
                    }
                }
            }
        });

        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.appender.cancel();
    }
}

/// Address-keyed cache of device sessions with single-flight establishment.
///
/// Each address maps to a `OnceCell` slot: the first resolver to reach an
/// empty slot runs connect-and-discover while later resolvers for the same
/// address await the same initialization and observe the same session. A
/// failed establishment removes the slot again, so the next resolver tries
/// from scratch and bad addresses leave no trace behind. The map lock is
/// only held to fetch or insert a
/// slot, never across driver I/O, so a slow discovery for one device never
/// blocks operations on unrelated devices.
pub struct SessionCache {
    driver: Arc<dyn RadioDriver>,
    config: LinkConfig,
    sessions: RwLock<HashMap<String, Arc<OnceCell<Arc<DeviceSession>>>>>,
}

impl SessionCache {
    /// Create a cache over a radio driver.
    pub fn new(driver: Arc<dyn RadioDriver>, config: LinkConfig) -> Self {
        Self {
            driver,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the session for an address, establishing it on first use.
    ///
    /// Idempotent: an existing session is returned as-is. On a miss the
    /// cache connects, discovers the attribute tree, starts the
    /// notification appender, and caches the session before returning it.
    pub async fn resolve(&self, address: &str) -> Result<Arc<DeviceSession>> {
        let slot = {
            let mut sessions = self.sessions.write().await;
            Arc::clone(sessions.entry(address.to_string()).or_default())
        };

        match slot.get_or_try_init(|| self.establish(address)).await {
            Ok(session) => Ok(Arc::clone(session)),
            Err(e) => {
                // Drop the empty slot so repeated bad addresses do not
                // accumulate map entries.
                let mut sessions = self.sessions.write().await;
                if let Some(current) = sessions.get(address) {
                    if Arc::ptr_eq(current, &slot) && current.get().is_none() {
                        sessions.remove(address);
                    }
                }
                Err(e)
            }
        }
    }

    /// Get an address's session without establishing one.
    pub async fn get(&self, address: &str) -> Option<Arc<DeviceSession>> {
        let sessions = self.sessions.read().await;
        sessions.get(address).and_then(|slot| slot.get().cloned())
    }

    /// Drop an address's session, if any.
    ///
    /// The next [`resolve`](Self::resolve) for the address re-establishes
    /// from scratch. Returns whether a session existed. Nothing calls this
    /// automatically on physical disconnect; it is the explicit
    /// invalidation hook.
    pub async fn invalidate(&self, address: &str) -> bool {
        let removed = self.sessions.write().await.remove(address);
        match removed {
            Some(slot) => {
                let had_session = slot.get().is_some();
                if had_session {
                    info!(address = %address, "invalidated session");
                }
                had_session
            }
            None => false,
        }
    }

    /// Addresses with an established session.
    pub async fn addresses(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn establish(&self, address: &str) -> Result<Arc<DeviceSession>> {
        info!("establishing device session");

        let link = timeout(self.config.connect_timeout, self.driver.connect(address))
            .await
            .map_err(|_| Error::timeout("connect", self.config.connect_timeout))??;

        let index = timeout(
            self.config.discovery_timeout,
            AttributeIndex::discover(link.as_ref()),
        )
        .await
        .map_err(|_| Error::timeout("attribute discovery", self.config.discovery_timeout))??;

        info!(service_count = index.services().len(), "discovery complete");

        let session = Arc::new(DeviceSession {
            address: address.to_string(),
            link,
            index,
            buffer: Arc::new(NotificationBuffer::new()),
            appender: CancellationToken::new(),
        });
        session.start_appender().await?;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockLink};
    use gattway_types::{CharProp, CharacteristicProps, ServiceInfo};
    use std::time::Duration;
    use uuid::{uuid, Uuid};

    const SVC: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");
    const CHR: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

    fn driver_with_device(address: &str) -> Arc<MockDriver> {
        let link = MockLink::builder()
            .service(
                ServiceInfo {
                    uuid: SVC,
                    is_primary: true,
                },
                vec![gattway_types::CharacteristicInfo::new(
                    CHR,
                    CharacteristicProps::from_props(&[CharProp::Read, CharProp::Notify]),
                )],
            )
            .build();
        let driver = Arc::new(MockDriver::new());
        driver.add_device(address, link);
        driver
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let driver = driver_with_device("AA:BB");
        let cache = SessionCache::new(driver.clone(), LinkConfig::default());

        let first = cache.resolve("AA:BB").await.unwrap();
        let second = cache.resolve("AA:BB").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(driver.connect_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_resolves_are_single_flight() {
        let driver = driver_with_device("AA:BB");
        driver.set_connect_latency(Duration::from_millis(50));
        let cache = Arc::new(SessionCache::new(driver.clone(), LinkConfig::default()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(
                async move { cache.resolve("AA:BB").await },
            ));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(driver.connect_count(), 1);
        let link = driver.link("AA:BB").unwrap();
        assert_eq!(link.discovery_count(), 1);
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], session));
        }
    }

    #[tokio::test]
    async fn different_addresses_resolve_independently() {
        let driver = Arc::new(MockDriver::new());
        for address in ["AA:BB", "CC:DD"] {
            let link = MockLink::builder()
                .service(
                    ServiceInfo {
                        uuid: SVC,
                        is_primary: true,
                    },
                    vec![],
                )
                .build();
            driver.add_device(address, link);
        }
        let cache = SessionCache::new(driver.clone(), LinkConfig::default());

        let a = cache.resolve("AA:BB").await.unwrap();
        let b = cache.resolve("CC:DD").await.unwrap();
        assert_ne!(a.address(), b.address());
        assert_eq!(driver.connect_count(), 2);
    }

    #[tokio::test]
    async fn failed_establish_reverts_to_unknown() {
        let driver = driver_with_device("AA:BB");
        driver.set_fail_connect(true);
        let cache = SessionCache::new(driver.clone(), LinkConfig::default());

        let err = cache.resolve("AA:BB").await.unwrap_err();
        assert!(matches!(err, Error::Hardware { .. }));
        assert!(cache.get("AA:BB").await.is_none());

        // a later attempt starts over and can succeed
        driver.set_fail_connect(false);
        assert!(cache.resolve("AA:BB").await.is_ok());
        assert_eq!(driver.connect_count(), 2);
    }

    #[tokio::test]
    async fn unknown_address_is_device_not_found() {
        let driver = Arc::new(MockDriver::new());
        let cache = SessionCache::new(driver, LinkConfig::default());

        let err = cache.resolve("00:00").await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn connect_timeout_surfaces_as_timeout() {
        let driver = driver_with_device("AA:BB");
        driver.set_connect_latency(Duration::from_secs(5));
        let config = LinkConfig::default().connect_timeout(Duration::from_millis(20));
        let cache = SessionCache::new(driver, config);

        let err = cache.resolve("AA:BB").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn invalidate_forces_rediscovery() {
        let driver = driver_with_device("AA:BB");
        let cache = SessionCache::new(driver.clone(), LinkConfig::default());

        cache.resolve("AA:BB").await.unwrap();
        assert!(cache.invalidate("AA:BB").await);
        assert!(cache.get("AA:BB").await.is_none());
        assert!(!cache.invalidate("AA:BB").await);

        cache.resolve("AA:BB").await.unwrap();
        assert_eq!(driver.connect_count(), 2);
    }

    #[tokio::test]
    async fn addresses_lists_established_sessions() {
        let driver = driver_with_device("AA:BB");
        let cache = SessionCache::new(driver, LinkConfig::default());

        assert!(cache.addresses().await.is_empty());
        cache.resolve("AA:BB").await.unwrap();
        assert_eq!(cache.addresses().await, vec!["AA:BB".to_string()]);
    }

    #[tokio::test]
    async fn appender_moves_pushes_into_buffer() {
        let driver = driver_with_device("AA:BB");
        let cache = SessionCache::new(driver.clone(), LinkConfig::default());
        let session = cache.resolve("AA:BB").await.unwrap();

        session.buffer().arm(SVC, CHR).await;
        session.link().subscribe(SVC, CHR).await.unwrap();

        let link = driver.link("AA:BB").unwrap();
        link.push(SVC, CHR, &[42]).await;

        // give the appender task a chance to run
        tokio::time::sleep(Duration::from_millis(20)).await;

        let drained = session.buffer().drain(SVC, CHR).await;
        assert_eq!(drained.len(), 1);
        assert_eq!(&drained[0].payload[..], &[42]);
        assert_eq!(drained[0].service_uuid, SVC);
    }

    #[tokio::test]
    async fn reestablished_session_buffers_pushes_again() {
        let driver = driver_with_device("AA:BB");
        let cache = SessionCache::new(driver.clone(), LinkConfig::default());

        let first = cache.resolve("AA:BB").await.unwrap();
        first.buffer().arm(SVC, CHR).await;
        first.link().subscribe(SVC, CHR).await.unwrap();
        drop(first);

        assert!(cache.invalidate("AA:BB").await);

        // the fresh session owns a fresh stream and appender
        let second = cache.resolve("AA:BB").await.unwrap();
        second.buffer().arm(SVC, CHR).await;
        second.link().subscribe(SVC, CHR).await.unwrap();

        let link = driver.link("AA:BB").unwrap();
        link.push(SVC, CHR, &[5]).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let drained = second.buffer().drain(SVC, CHR).await;
        assert_eq!(drained.len(), 1);
        assert_eq!(&drained[0].payload[..], &[5]);
        assert_eq!(driver.connect_count(), 2);
    }

    #[tokio::test]
    async fn failed_resolve_leaves_no_map_entry() {
        let driver = Arc::new(MockDriver::new());
        let cache = SessionCache::new(driver, LinkConfig::default());

        for _ in 0..3 {
            assert!(cache.resolve("00:00").await.is_err());
        }
        assert!(cache.sessions.read().await.is_empty());
    }
}
