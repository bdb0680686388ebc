// Tests for the relay service surface
use crate::{
    logger, BlockingRelay, RelayConfig, RelayError, RelayService, SentinelMatcher, SessionState,
};

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

// Initialize the logger before any test runs, but allow it to be safely called multiple times
#[ctor::ctor]
fn init() {
    let _ = logger::initialize_logger("test", true);
}

fn fast_reap_config() -> RelayConfig {
    RelayConfig {
        idle_session_timeout: Duration::from_millis(100),
        reap_interval: Duration::from_millis(25),
        ..RelayConfig::default()
    }
}

#[tokio::test]
async fn ping_reports_liveness() {
    let service = RelayService::new(RelayConfig::default());
    service.push_sync("s1", Bytes::from_static(b"a")).await.unwrap();

    let liveness = service.ping().await;
    assert!(!liveness.instance_id.is_empty());
    assert_eq!(liveness.active_sessions, 1);
    service.shutdown().await;
}

#[tokio::test]
async fn push_sync_acknowledges_with_sequence() {
    let service = RelayService::new(RelayConfig::default());
    assert_eq!(
        service.push_sync("s1", Bytes::from_static(b"a")).await.unwrap(),
        1
    );
    assert_eq!(
        service.push_sync("s1", Bytes::from_static(b"b")).await.unwrap(),
        2
    );
    // Another session numbers independently.
    assert_eq!(
        service.push_sync("s2", Bytes::from_static(b"c")).await.unwrap(),
        1
    );
    service.shutdown().await;
}

#[tokio::test]
async fn full_queue_fails_fast_when_push_timeout_is_zero() {
    // capacity=2, non-blocking pushes throughout.
    let service = RelayService::new(RelayConfig {
        queue_capacity: 2,
        push_timeout: Duration::ZERO,
        ..RelayConfig::default()
    });

    service.push_async("s", Bytes::from_static(b"a")).await;
    service.push_async("s", Bytes::from_static(b"b")).await;
    assert!(matches!(
        service.push_sync("s", Bytes::from_static(b"c")).await,
        Err(RelayError::QueueFull { .. })
    ));

    let drained = service.pull("s", 10, false, None).await.unwrap();
    let payloads: Vec<&[u8]> = drained.iter().map(|e| e.payload().as_ref()).collect();
    assert_eq!(payloads, vec![&b"a"[..], b"b"]);

    let stats = service.stats();
    assert_eq!(stats.packets_pushed, 2);
    assert_eq!(stats.async_dropped_full, 0);
    service.shutdown().await;
}

#[tokio::test]
async fn push_async_swallows_failures_and_counts_them() {
    let service = RelayService::new(RelayConfig {
        queue_capacity: 1,
        max_payload_size: 8,
        ..RelayConfig::default()
    });

    service.push_async("s", Bytes::from_static(b"kept")).await;
    service.push_async("s", Bytes::from_static(b"dropped")).await; // full
    service
        .push_async("s", Bytes::from_static(b"way too large payload"))
        .await; // oversize
    service.push_async("", Bytes::from_static(b"x")).await; // invalid id

    let stats = service.stats();
    assert_eq!(stats.packets_pushed, 1);
    assert_eq!(stats.async_dropped_full, 1);
    assert_eq!(stats.async_dropped_oversize, 1);
    assert_eq!(stats.async_dropped_other, 1);

    let drained = service.pull("s", 10, false, None).await.unwrap();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].payload().as_ref(), b"kept");
    service.shutdown().await;
}

#[tokio::test]
async fn oversize_push_sync_consumes_no_sequence_number() {
    let service = RelayService::new(RelayConfig {
        max_payload_size: 4,
        ..RelayConfig::default()
    });

    service.push_sync("s", Bytes::from_static(b"ok")).await.unwrap();
    assert!(matches!(
        service.push_sync("s", Bytes::from_static(b"oversize")).await,
        Err(RelayError::PayloadTooLarge { .. })
    ));
    // The failed push did not consume a sequence number.
    assert_eq!(
        service.push_sync("s", Bytes::from_static(b"next")).await.unwrap(),
        2
    );
    service.shutdown().await;
}

#[tokio::test]
async fn sentinel_ends_the_stream_for_producers_and_consumers() {
    let service = RelayService::new(RelayConfig {
        sentinel: SentinelMatcher::exact(&b"END"[..]),
        ..RelayConfig::default()
    });

    service.push_sync("s", Bytes::from_static(b"data")).await.unwrap();
    service.push_sync("s", Bytes::from_static(b"END")).await.unwrap();
    assert!(matches!(
        service.push_sync("s", Bytes::from_static(b"late")).await,
        Err(RelayError::QueueClosed { .. })
    ));

    // The consumer drains through the sentinel, then observes the closed,
    // empty session and stops polling.
    let drained = service.pull("s", 10, false, None).await.unwrap();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[1].payload().as_ref(), b"END");
    assert_eq!(
        service.session_state("s").await,
        Some(SessionState::Closed)
    );
    assert!(service.pull("s", 10, false, None).await.unwrap().is_empty());
    service.shutdown().await;
}

#[tokio::test]
async fn blocking_pull_waits_for_a_producer() {
    let service = RelayService::new(RelayConfig::default());
    let consumer = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .pull("s", 10, true, Some(Duration::from_secs(5)))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    service.push_sync("s", Bytes::from_static(b"awaited")).await.unwrap();

    let drained = consumer.await.unwrap().unwrap();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].payload().as_ref(), b"awaited");
    service.shutdown().await;
}

#[tokio::test]
async fn idle_sessions_are_reaped_and_lookups_respect_creation_policy() {
    let service = RelayService::new(RelayConfig {
        pull_creates_session: false,
        ..fast_reap_config()
    });

    service.push_sync("s2", Bytes::from_static(b"abandoned")).await.unwrap();
    assert!(service.registry().contains("s2").await);

    // Twice the idle threshold with no activity.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!service.registry().contains("s2").await);
    assert!(matches!(
        service.pull("s2", 1, false, None).await,
        Err(RelayError::SessionNotFound(_))
    ));
    assert!(service.stats().sessions_reaped >= 1);
    service.shutdown().await;
}

#[tokio::test]
async fn pull_creates_a_fresh_session_when_policy_allows() {
    let service = RelayService::new(fast_reap_config());

    service.push_sync("s2", Bytes::from_static(b"abandoned")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!service.registry().contains("s2").await);

    // Default policy mirrors push: the pull creates an empty session.
    let drained = service.pull("s2", 1, false, None).await.unwrap();
    assert!(drained.is_empty());
    assert!(service.registry().contains("s2").await);
    // The fresh queue numbers from the start again.
    assert_eq!(
        service.push_sync("s2", Bytes::from_static(b"new")).await.unwrap(),
        1
    );
    service.shutdown().await;
}

#[tokio::test]
async fn close_session_stops_pushes_but_drains_remainder() {
    let service = RelayService::new(RelayConfig::default());
    service.push_sync("s", Bytes::from_static(b"pending")).await.unwrap();
    service.close_session("s").await.unwrap();

    assert_eq!(
        service.session_state("s").await,
        Some(SessionState::Draining)
    );
    assert!(matches!(
        service.push_sync("s", Bytes::from_static(b"late")).await,
        Err(RelayError::QueueClosed { .. })
    ));
    let drained = service.pull("s", 10, false, None).await.unwrap();
    assert_eq!(drained.len(), 1);
    assert_eq!(
        service.session_state("s").await,
        Some(SessionState::Closed)
    );
    service.shutdown().await;
}

#[tokio::test]
async fn close_session_on_unknown_id_errors() {
    let service = RelayService::new(RelayConfig::default());
    assert!(matches!(
        service.close_session("absent").await,
        Err(RelayError::SessionNotFound(_))
    ));
    service.shutdown().await;
}

#[tokio::test]
async fn sessions_do_not_serialize_behind_one_another() {
    let service = RelayService::new(RelayConfig {
        queue_capacity: 1,
        ..RelayConfig::default()
    });

    // Fill s1 so its producers would block; s2 must be unaffected.
    service.push_sync("s1", Bytes::from_static(b"full")).await.unwrap();
    let blocked = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.push_sync("s1", Bytes::from_static(b"wait")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    service.push_sync("s2", Bytes::from_static(b"flows")).await.unwrap();
    assert_eq!(service.pull("s2", 10, false, None).await.unwrap().len(), 1);

    // Unblock s1.
    service.pull("s1", 1, false, None).await.unwrap();
    blocked.await.unwrap().unwrap();
    service.shutdown().await;
}

#[test]
fn blocking_facade_round_trips() {
    let relay = BlockingRelay::new(RelayConfig::default());

    let liveness = relay.ping();
    assert!(!liveness.instance_id.is_empty());

    let seq = relay.push_sync("sync", Bytes::from_static(b"hello")).unwrap();
    relay.push_async("sync", Bytes::from_static(b"world"));

    let drained = relay.pull("sync", 10, false, None).unwrap();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].sequence(), seq);
    assert_eq!(drained[0].payload().as_ref(), b"hello");
    assert_eq!(drained[1].payload().as_ref(), b"world");

    relay.close_session("sync").unwrap();
    assert_eq!(relay.session_state("sync"), Some(SessionState::Closed));
    relay.shutdown();
}
