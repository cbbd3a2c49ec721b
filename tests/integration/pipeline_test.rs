//! Feed-to-store pipeline tests over the in-process broker and store

use crate::support::{trade, wait_until, FeedServer};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use trade_relay::broker::{EventPublisher, MemoryBroker};
use trade_relay::config::ConsumerConfig;
use trade_relay::consumer::{run_workers, ConsumerError, ConsumerStats};
use trade_relay::event::PriceEvent;
use trade_relay::ingest::FeedIngester;
use trade_relay::store::{FailureKind, MemoryTradeStore};

const PARTITIONS: usize = 3;

fn consumer_config(max_consecutive_failures: u32) -> ConsumerConfig {
    ConsumerConfig {
        workers: 1,
        poll_timeout_ms: 10,
        retry_delay_ms: 1,
        max_consecutive_failures,
    }
}

fn fully_committed(broker: &MemoryBroker) -> bool {
    (0..PARTITIONS as i32).all(|p| broker.committed(p) == broker.records(p).len() as i64)
}

/// Consume until every partition is committed to its end, then shut down
async fn drain(
    broker: &Arc<MemoryBroker>,
    store: &Arc<MemoryTradeStore>,
    config: ConsumerConfig,
) -> Result<ConsumerStats, ConsumerError> {
    let shutdown = CancellationToken::new();
    let run = tokio::spawn(run_workers(
        vec![broker.clone()],
        store.clone(),
        config,
        shutdown.clone(),
    ));

    let watched = broker.clone();
    let watcher = shutdown.clone();
    tokio::spawn(async move {
        wait_until(Duration::from_secs(5), || fully_committed(&watched)).await;
        watcher.cancel();
    });

    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("consumer did not stop")
        .unwrap()
}

#[tokio::test]
async fn test_feed_to_store_absorbs_duplicate_delivery() {
    let frames = vec![
        trade("ETHUSDT", "2500.10", 1_700_000_000_123),
        trade("ETHUSDT", "2500.10", 1_700_000_000_123),
        trade("BTCUSDT", "43000.5", 1_700_000_000_500),
        r#"{"e":"trade","s":"ETHUSDT","T":1700000000999}"#.to_string(),
        trade("ETHUSDT", "2501.00", 1_700_000_002_000),
    ];
    let server = FeedServer::spawn(0, frames).await;
    let broker = Arc::new(MemoryBroker::new("crypto_prices", PARTITIONS));
    let store = Arc::new(MemoryTradeStore::new());

    let ingest_shutdown = CancellationToken::new();
    let ingester = FeedIngester::new(broker.clone(), server.feed_config(&["ethusdt"]));
    let ingest = tokio::spawn({
        let shutdown = ingest_shutdown.clone();
        async move { ingester.run(shutdown).await }
    });

    wait_until(Duration::from_secs(5), || broker.len() == 4).await;
    ingest_shutdown.cancel();
    let ingested = ingest.await.unwrap();
    assert_eq!(ingested.published, 4);
    assert_eq!(ingested.decode_errors, 1);

    let stats = assert_ok!(drain(&broker, &store, consumer_config(3)).await);
    assert_eq!(stats.consumed, 4);
    assert_eq!(stats.persisted, 3);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.commits, 4);

    let eth = store.get("ETHUSDT", 1_700_000_000).unwrap();
    assert_eq!(eth.price, dec!(2500.10));
    assert!(eth.processed_at >= eth.event_time);
    assert_eq!(store.get("ETHUSDT", 1_700_000_002).unwrap().price, dec!(2501.00));
    assert_eq!(store.get("BTCUSDT", 1_700_000_000).unwrap().price, dec!(43000.5));
    assert_eq!(store.row_count(), 3);
}

#[tokio::test]
async fn test_store_outage_recovers_without_loss() {
    let broker = Arc::new(MemoryBroker::new("crypto_prices", PARTITIONS));
    let store = Arc::new(MemoryTradeStore::new());
    for second in 0..5 {
        let event = PriceEvent::new("SOLUSDT", dec!(101.25), 1_700_000_000 + second, 1_700_000_010)
            .unwrap();
        assert_ok!(broker.publish(&event).await);
    }
    store.fail_next(4, FailureKind::Unavailable);

    let stats = assert_ok!(drain(&broker, &store, consumer_config(10)).await);
    assert_eq!(stats.persist_failures, 4);
    assert_eq!(stats.persisted, 5);
    assert_eq!(store.row_count(), 5);

    // Nothing skipped: the first event was retried until it landed
    let attempts = store.attempts();
    assert_eq!(attempts.len(), 9);
    assert!(attempts[..5].iter().all(|key| key.1 == 1_700_000_000));
}

#[tokio::test]
async fn test_worker_stops_on_outage_and_resumes_from_committed_offset() {
    let broker = Arc::new(MemoryBroker::new("crypto_prices", PARTITIONS));
    let store = Arc::new(MemoryTradeStore::new());
    let events: Vec<_> = (0..3)
        .map(|second| {
            PriceEvent::new("ADAUSDT", dec!(0.3512), 1_700_000_000 + second, 1_700_000_010).unwrap()
        })
        .collect();
    for event in &events {
        assert_ok!(broker.publish(event).await);
    }
    let partition = broker.partition_for(events[0].key());
    store.fail_next(2, FailureKind::Unavailable);

    let result = run_workers(
        vec![broker.clone()],
        store.clone(),
        consumer_config(2),
        CancellationToken::new(),
    )
    .await;
    match result {
        Err(ConsumerError::StoreUnavailable { failures, .. }) => assert_eq!(failures, 2),
        other => panic!("expected store outage, got {other:?}"),
    }
    assert_eq!(broker.committed(partition), 0);
    assert_eq!(store.row_count(), 0);

    // A restarted worker resumes from the last committed offset
    broker.rejoin();
    let stats = assert_ok!(drain(&broker, &store, consumer_config(2)).await);
    assert_eq!(stats.persisted, 3);
    assert_eq!(broker.committed(partition), 3);
    assert_eq!(store.row_count(), 3);
}
