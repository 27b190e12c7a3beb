//! Cache expiry, coalescing and invalidation.

mod common;

use common::{harness, harness_with, DEVICE};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use swport_netconf::mock::MockDevice;
use swport_netconf::CommitOptions;
use swport_test::{ConfigFixture, InterfaceFixture, OperFixture};
use swport_types::RecordSource;
use swportd::CacheTtls;

fn device() -> MockDevice {
    MockDevice::new()
        .with_configuration(
            ConfigFixture::new()
                .interface(InterfaceFixture::new("ge-0/0/1").access("10"))
                .interface(InterfaceFixture::new("ge-0/0/2").trunk(&["10", "20"], Some("10")))
                .build(),
        )
        .with_operational(OperFixture::new().port("ge-0/0/1", true, true).build())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_fetch() {
    let h = harness(device());
    h.device.set_delay("get-config", Duration::from_millis(200));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&h.services.cache);
            tokio::spawn(async move { cache.get_interfaces(DEVICE).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(h.device.rpc_count("get-config"), 1);
    assert_eq!(h.device.connects(), 3);
    for result in &results[1..] {
        assert_eq!(result, &results[0]);
    }
    assert_eq!(results[0].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_boundary() {
    let ttls = CacheTtls {
        interfaces: Duration::from_secs(30),
        live: Duration::from_secs(10),
        aggregates: Duration::from_secs(300),
    };
    let h = harness_with(device(), ttls, CommitOptions::default());
    let cache = &h.services.cache;

    cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 1);

    tokio::time::advance(Duration::from_secs(30) - Duration::from_millis(1)).await;
    let hit = cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 1);
    assert!(hit.iter().all(|r| r.source == RecordSource::Cache));

    tokio::time::advance(Duration::from_millis(2)).await;
    let miss = cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 2);
    assert!(miss.iter().all(|r| r.source == RecordSource::Live));
}

#[tokio::test(start_paused = true)]
async fn test_spaces_expire_independently() {
    let h = harness(device());
    let cache = &h.services.cache;

    cache.get_interfaces(DEVICE).await.unwrap();
    cache.get_live(DEVICE, "ge-0/0/1").await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 2);

    // past the live window, inside the interface-list window
    tokio::time::advance(Duration::from_secs(15)).await;
    cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 2);
    let live = cache.get_live(DEVICE, "ge-0/0/1").await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 3);
    assert_eq!(live.source, RecordSource::Live);
    assert!(live.oper_up);
}

#[tokio::test]
async fn test_cached_copies_are_independent() {
    let h = harness(device());
    let cache = &h.services.cache;

    let mut first = cache.get_interfaces(DEVICE).await.unwrap();
    first[0].description = Some("scribbled".to_string());

    let second = cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(second[0].description, None);
}

#[tokio::test]
async fn test_invalidate_is_per_device() {
    let h = harness(device());
    let cache = &h.services.cache;

    cache.get_interfaces(DEVICE).await.unwrap();
    cache.invalidate("other-sw").await;
    cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 1);

    cache.invalidate(DEVICE).await;
    cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(h.device.rpc_count("get-config"), 2);
}

#[tokio::test]
async fn test_unknown_live_interface() {
    let h = harness(device());
    let err = h
        .services
        .cache
        .get_live(DEVICE, "ge-0/0/40")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "interface 'ge-0/0/40' not found");
}

#[tokio::test]
async fn test_warm_populates_cache_and_snapshot() {
    let h = harness(device());
    let sync = h.services.sync_service(Duration::from_secs(180));

    assert_eq!(sync.warm().await, 1);
    assert!(h.services.cache.last_refresh(DEVICE).await.unwrap().is_some());

    let records = h.services.cache.get_interfaces(DEVICE).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(h.device.rpc_count("get-config"), 1);
}
