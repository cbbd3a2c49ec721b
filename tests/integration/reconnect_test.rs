//! Subscription reconnect tests against a local feed server

use crate::support::{trade, wait_until, FeedServer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trade_relay::broker::MemoryBroker;
use trade_relay::ingest::FeedIngester;
use trade_relay::ws::{ReconnectPolicy, WsClient, WsConfig, WsMessage};

#[tokio::test]
async fn test_client_reconnects_until_server_accepts() {
    let server = FeedServer::spawn(2, vec![trade("BTCUSDT", "43000.50", 1_700_000_000_000)]).await;
    let config = WsConfig::new(format!("{}/btcusdt@trade", server.base_url))
        .reconnect(ReconnectPolicy::Fixed { delay_ms: 10 })
        .ping_interval(Duration::from_secs(60));

    let shutdown = CancellationToken::new();
    let mut rx = WsClient::new(config).connect(shutdown.clone());

    let mut attempts = Vec::new();
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no message from client")
            .expect("channel closed early");
        match msg {
            WsMessage::Reconnecting { attempt, delay } => {
                assert_eq!(delay, Duration::from_millis(10));
                attempts.push(attempt);
            }
            WsMessage::Connected => break,
            other => panic!("unexpected message before connect: {other:?}"),
        }
    }
    assert_eq!(attempts, vec![1, 2]);

    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(WsMessage::Text(text))) => assert!(text.contains("43000.50")),
        other => panic!("expected trade frame, got {other:?}"),
    }

    shutdown.cancel();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(WsMessage::Disconnected)) => break,
            Ok(Some(_)) => continue,
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }
    assert_eq!(server.connections(), 3);
}

#[tokio::test]
async fn test_ingester_publishes_after_reconnect() {
    let frames = vec![
        trade("ETHUSDT", "2500.10", 1_700_000_000_123),
        trade("ETHUSDT", "2500.20", 1_700_000_001_456),
    ];
    let server = FeedServer::spawn(3, frames).await;
    let broker = Arc::new(MemoryBroker::new("crypto_prices", 1));
    let ingester = FeedIngester::new(broker.clone(), server.feed_config(&["ethusdt"]));

    let shutdown = CancellationToken::new();
    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { ingester.run(shutdown).await }
    });

    wait_until(Duration::from_secs(5), || broker.len() == 2).await;
    shutdown.cancel();
    let stats = run.await.unwrap();

    assert_eq!(stats.reconnects, 3);
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.published, 2);
    assert_eq!(stats.decode_errors, 0);

    let keys: Vec<_> = broker
        .records(0)
        .into_iter()
        .map(|r| r.key.unwrap())
        .collect();
    assert_eq!(keys, vec!["ETHUSDT", "ETHUSDT"]);
}

#[tokio::test]
async fn test_unanswered_ping_forces_reconnect() {
    let frames = vec![trade("BTCUSDT", "43000.50", 1_700_000_000_000)];
    let server = FeedServer::spawn_unresponsive(frames).await;
    let config = WsConfig::new(format!("{}/btcusdt@trade", server.base_url))
        .reconnect(ReconnectPolicy::Fixed { delay_ms: 10 })
        .ping_interval(Duration::from_secs(60))
        .pong_timeout(Duration::from_millis(100));

    let shutdown = CancellationToken::new();
    let mut rx = WsClient::new(config).connect(shutdown.clone());

    // The first ping goes out on connect; the deadline fires well before
    // the next ping tick
    let mut connected = false;
    let mut frames = 0;
    let attempt = loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("pong timeout not detected")
            .expect("channel closed early");
        match msg {
            WsMessage::Connected => connected = true,
            WsMessage::Text(_) => frames += 1,
            WsMessage::Reconnecting { attempt, .. } => break attempt,
            other => panic!("unexpected message: {other:?}"),
        }
    };

    assert!(connected);
    assert_eq!(frames, 1);
    assert_eq!(attempt, 1);
    shutdown.cancel();
}
