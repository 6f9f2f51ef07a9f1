//! End-to-end tests for the gateway over the mock radio.
//!
//! These exercise whole operation flows (cold establishment, notification
//! lifecycle, invalidation) rather than single modules; module-level edge
//! cases live in the unit tests next to each module.

use std::sync::Arc;
use std::time::Duration;

use gattway_core::{Error, Gateway, LinkConfig, MockDriver, MockLink};
use gattway_types::{
    AdvertisedDevice, CharProp, CharacteristicInfo, CharacteristicProps, ScanSelector, ServiceInfo,
};
use uuid::{uuid, Uuid};

const BATTERY_SVC: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");
const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");
const CUSTOM_SVC: Uuid = uuid!("12345678-0000-1000-8000-00805f9b34fb");
const CUSTOM_STREAM: Uuid = uuid!("12345678-0001-1000-8000-00805f9b34fb");
const CUSTOM_CTRL: Uuid = uuid!("12345678-0002-1000-8000-00805f9b34fb");

const ADDR: &str = "AA:BB:CC:DD:EE:FF";

fn two_service_link() -> Arc<MockLink> {
    MockLink::builder()
        .service(
            ServiceInfo {
                uuid: BATTERY_SVC,
                is_primary: true,
            },
            vec![CharacteristicInfo::new(
                BATTERY_LEVEL,
                CharacteristicProps::from_props(&[CharProp::Read, CharProp::Notify]),
            )],
        )
        .service(
            ServiceInfo {
                uuid: CUSTOM_SVC,
                is_primary: true,
            },
            vec![
                CharacteristicInfo::new(
                    CUSTOM_STREAM,
                    CharacteristicProps::from_props(&[CharProp::Indicate]),
                ),
                CharacteristicInfo::new(
                    CUSTOM_CTRL,
                    CharacteristicProps::from_props(&[CharProp::WriteWithoutResponse]),
                ),
            ],
        )
        .build()
}

fn gateway() -> (Gateway, Arc<MockDriver>) {
    let driver = Arc::new(MockDriver::new());
    driver.add_device(ADDR, two_service_link());
    (Gateway::new(driver.clone(), LinkConfig::default()), driver)
}

#[tokio::test]
async fn first_touch_establishes_once_then_serves_from_cache() {
    let (gw, driver) = gateway();

    let services = gw.list_services(ADDR).await.unwrap();
    assert_eq!(services.len(), 2);

    let chars = gw.list_characteristics(ADDR, CUSTOM_SVC).await.unwrap();
    assert_eq!(chars.len(), 2);

    let link = driver.link(ADDR).unwrap();
    link.set_value(BATTERY_SVC, BATTERY_LEVEL, &[96]);
    let value = gw.read(ADDR, BATTERY_SVC, BATTERY_LEVEL).await.unwrap();
    assert_eq!(&value[..], &[96]);

    assert_eq!(driver.connect_count(), 1);
    assert_eq!(link.discovery_count(), 1);
}

#[tokio::test]
async fn concurrent_cold_operations_share_one_establishment() {
    let (gw, driver) = gateway();
    driver.set_connect_latency(Duration::from_millis(40));
    driver
        .link(ADDR)
        .unwrap()
        .set_value(BATTERY_SVC, BATTERY_LEVEL, &[50]);
    let gw = Arc::new(gw);

    let mut handles = Vec::new();
    for i in 0..6 {
        let gw = Arc::clone(&gw);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                gw.read(ADDR, BATTERY_SVC, BATTERY_LEVEL).await.map(|_| ())
            } else {
                gw.list_services(ADDR).await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(driver.connect_count(), 1);
    assert_eq!(driver.link(ADDR).unwrap().discovery_count(), 1);
}

#[tokio::test]
async fn unknown_device_fails_every_operation_the_same_way() {
    let (gw, _) = gateway();

    let err = gw.list_services("00:00:00:00:00:00").await.unwrap_err();
    assert!(err.is_not_found());
    let err = gw
        .read("00:00:00:00:00:00", BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn attribute_lookups_are_exact() {
    let (gw, _) = gateway();

    // short-form 180f and the full 128-bit form are the same service;
    // a different 128-bit uuid with matching low bits is not
    let near_miss = uuid!("0000180f-0000-1000-8000-00805f9b34fc");
    let err = gw.list_characteristics(ADDR, near_miss).await.unwrap_err();
    assert!(matches!(err, Error::ServiceNotFound { .. }));

    // right characteristic, wrong service
    let err = gw.read(ADDR, BATTERY_SVC, CUSTOM_STREAM).await.unwrap_err();
    assert!(matches!(err, Error::CharacteristicNotFound { .. }));
}

#[tokio::test]
async fn notification_lifecycle_across_two_tuples() {
    let (gw, driver) = gateway();
    let link = driver.link(ADDR).unwrap();

    gw.register_notify(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap();
    gw.register_notify(ADDR, CUSTOM_SVC, CUSTOM_STREAM)
        .await
        .unwrap();

    link.push(BATTERY_SVC, BATTERY_LEVEL, &[1]).await;
    link.push(CUSTOM_SVC, CUSTOM_STREAM, &[2]).await;
    link.push(BATTERY_SVC, BATTERY_LEVEL, &[3]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let battery = gw
        .drain_notifications(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap();
    assert_eq!(battery.len(), 2);
    assert_eq!(&battery[0].payload[..], &[1]);
    assert_eq!(&battery[1].payload[..], &[3]);
    assert_eq!(battery[0].service_uuid, BATTERY_SVC);

    let stream = gw
        .drain_notifications(ADDR, CUSTOM_SVC, CUSTOM_STREAM)
        .await
        .unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(&stream[0].payload[..], &[2]);
}

#[tokio::test]
async fn duplicate_characteristic_uuid_routes_by_service() {
    // One vendor characteristic UUID reused under two services; records must
    // land in the buffer slot of the service they arrived on.
    let shared = uuid!("0000fff1-0000-1000-8000-00805f9b34fb");
    let svc_a = uuid!("0000aaaa-0000-1000-8000-00805f9b34fb");
    let svc_b = uuid!("0000bbbb-0000-1000-8000-00805f9b34fb");
    let link = MockLink::builder()
        .service(
            ServiceInfo {
                uuid: svc_a,
                is_primary: true,
            },
            vec![CharacteristicInfo::new(
                shared,
                CharacteristicProps::from_props(&[CharProp::Notify]),
            )],
        )
        .service(
            ServiceInfo {
                uuid: svc_b,
                is_primary: true,
            },
            vec![CharacteristicInfo::new(
                shared,
                CharacteristicProps::from_props(&[CharProp::Notify]),
            )],
        )
        .build();
    let driver = Arc::new(MockDriver::new());
    driver.add_device(ADDR, link);
    let gw = Gateway::new(driver.clone(), LinkConfig::default());

    gw.register_notify(ADDR, svc_b, shared).await.unwrap();

    let link = driver.link(ADDR).unwrap();
    link.push(svc_b, shared, &[7]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let records = gw.drain_notifications(ADDR, svc_b, shared).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].service_uuid, svc_b);
    assert_eq!(records[0].characteristic_uuid, shared);

    // the sibling tuple under the other service stays unarmed
    let err = gw.drain_notifications(ADDR, svc_a, shared).await.unwrap_err();
    assert!(matches!(err, Error::NoData { .. }));
}

#[tokio::test]
async fn unregister_clears_every_tuple_on_the_device() {
    let (gw, driver) = gateway();
    let link = driver.link(ADDR).unwrap();

    gw.register_notify(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap();
    gw.register_notify(ADDR, CUSTOM_SVC, CUSTOM_STREAM)
        .await
        .unwrap();

    link.push(CUSTOM_SVC, CUSTOM_STREAM, &[9]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    // unregistering via one tuple tears down the whole device's buffering
    gw.unregister_notify(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap();

    for (svc, chr) in [(BATTERY_SVC, BATTERY_LEVEL), (CUSTOM_SVC, CUSTOM_STREAM)] {
        let err = gw.drain_notifications(ADDR, svc, chr).await.unwrap_err();
        assert!(matches!(err, Error::NoData { .. }));
    }

    // pushes after unregister are dropped at the link (unsubscribed)
    link.push(CUSTOM_SVC, CUSTOM_STREAM, &[10]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let err = gw
        .drain_notifications(ADDR, CUSTOM_SVC, CUSTOM_STREAM)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoData { .. }));
}

#[tokio::test]
async fn failed_unsubscribe_does_not_skip_other_tuples() {
    let (gw, driver) = gateway();
    let link = driver.link(ADDR).unwrap();

    gw.register_notify(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap();
    gw.register_notify(ADDR, CUSTOM_SVC, CUSTOM_STREAM)
        .await
        .unwrap();

    link.set_fail_unsubscribe(true);
    let err = gw
        .unregister_notify(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Hardware { .. }));

    // both tuples were attempted despite the first failure
    assert_eq!(link.unsubscribe_count(BATTERY_SVC, BATTERY_LEVEL), 1);
    assert_eq!(link.unsubscribe_count(CUSTOM_SVC, CUSTOM_STREAM), 1);

    for (svc, chr) in [(BATTERY_SVC, BATTERY_LEVEL), (CUSTOM_SVC, CUSTOM_STREAM)] {
        let err = gw.drain_notifications(ADDR, svc, chr).await.unwrap_err();
        assert!(matches!(err, Error::NoData { .. }));
    }
}

#[tokio::test]
async fn register_notify_rejects_write_only_characteristic() {
    let (gw, _) = gateway();
    let err = gw
        .register_notify(ADDR, CUSTOM_SVC, CUSTOM_CTRL)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported { .. }));
}

#[tokio::test]
async fn write_then_notify_round_trip() {
    let (gw, driver) = gateway();
    let link = driver.link(ADDR).unwrap();

    gw.register_notify(ADDR, CUSTOM_SVC, CUSTOM_STREAM)
        .await
        .unwrap();
    gw.write(ADDR, CUSTOM_SVC, CUSTOM_CTRL, &[0x01, 0x02])
        .await
        .unwrap();
    assert_eq!(link.written(CUSTOM_SVC, CUSTOM_CTRL).len(), 1);

    // device answers the command with an indication
    link.push(CUSTOM_SVC, CUSTOM_STREAM, &[0xAA]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let records = gw
        .drain_notifications(ADDR, CUSTOM_SVC, CUSTOM_STREAM)
        .await
        .unwrap();
    assert_eq!(&records[0].payload[..], &[0xAA]);
}

#[tokio::test]
async fn invalidate_drops_registrations_with_the_session() {
    let (gw, driver) = gateway();
    gw.register_notify(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap();

    assert!(gw.invalidate(ADDR).await);
    assert_eq!(gw.cached_addresses().await.len(), 0);

    // the fresh session has no armed tuples
    gw.list_services(ADDR).await.unwrap();
    let err = gw
        .drain_notifications(ADDR, BATTERY_SVC, BATTERY_LEVEL)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoData { .. }));
    assert_eq!(driver.connect_count(), 2);
}

#[tokio::test]
async fn scan_matches_by_exact_name_or_prefix() {
    let (gw, driver) = gateway();
    for (name, address) in [
        (Some("Thermo-1"), "11:11"),
        (Some("Thermo-2"), "22:22"),
        (Some("Lamp"), "33:33"),
        (None, "44:44"),
    ] {
        driver.advertise(AdvertisedDevice {
            name: name.map(String::from),
            address: address.to_string(),
            paired: false,
            rssi: Some(-60),
        });
    }

    let all = gw.scan(&ScanSelector::any()).await.unwrap();
    assert_eq!(all.len(), 4);

    let exact = gw
        .scan(&ScanSelector {
            name: Some("Lamp".into()),
            name_prefix: None,
        })
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].address, "33:33");

    let prefixed = gw
        .scan(&ScanSelector {
            name: None,
            name_prefix: Some("Thermo".into()),
        })
        .await
        .unwrap();
    assert_eq!(prefixed.len(), 2);

    // nameless advertisements only match the empty selector
    let named = gw
        .scan(&ScanSelector {
            name: Some("Ghost".into()),
            name_prefix: None,
        })
        .await
        .unwrap();
    assert!(named.is_empty());
}

#[tokio::test]
async fn establish_timeout_leaves_device_uncached() {
    let driver = Arc::new(MockDriver::new());
    driver.add_device(ADDR, two_service_link());
    driver.set_connect_latency(Duration::from_millis(200));
    let config = LinkConfig::default().connect_timeout(Duration::from_millis(20));
    let gw = Gateway::new(driver.clone(), config);

    let err = gw.list_services(ADDR).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(gw.session(ADDR).await.is_none());

    // next touch retries from scratch
    driver.set_connect_latency(Duration::ZERO);
    gw.list_services(ADDR).await.unwrap();
    assert_eq!(driver.connect_count(), 2);
}
