//! Local trade feed server and polling helpers

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use trade_relay::config::FeedConfig;
use trade_relay::ws::ReconnectPolicy;

/// Binance-shaped trade frame
pub fn trade(symbol: &str, price: &str, trade_time_ms: i64) -> String {
    format!(
        r#"{{"e":"trade","E":{t},"s":"{symbol}","t":12345,"p":"{price}","q":"0.5","T":{t},"m":true,"M":true}}"#,
        t = trade_time_ms
    )
}

/// WebSocket server that drops the first `reject_first` connections before the
/// handshake, then sends `frames` on every accepted connection and holds it open
///
/// An unresponsive server stops reading after its frames, so pings go unanswered.
pub struct FeedServer {
    pub base_url: String,
    accepted: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl FeedServer {
    pub async fn spawn(reject_first: usize, frames: Vec<String>) -> Self {
        Self::start(reject_first, frames, true).await
    }

    pub async fn spawn_unresponsive(frames: Vec<String>) -> Self {
        Self::start(0, frames, false).await
    }

    async fn start(reject_first: usize, frames: Vec<String>, answer_pings: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if seen <= reject_first {
                    drop(stream);
                    continue;
                }

                let frames = frames.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else { return };
                    for frame in frames {
                        if ws.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                    if !answer_pings {
                        std::future::pending::<()>().await;
                    }
                    while let Some(Ok(msg)) = ws.next().await {
                        if msg.is_close() {
                            break;
                        }
                    }
                });
            }
        });

        Self {
            base_url: format!("ws://{addr}/ws"),
            accepted,
            handle,
        }
    }

    /// TCP connections seen so far, rejected ones included
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Feed configuration pointing at this server with a short fixed backoff
    pub fn feed_config(&self, symbols: &[&str]) -> FeedConfig {
        FeedConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            base_url: self.base_url.clone(),
            reconnect: ReconnectPolicy::Fixed { delay_ms: 10 },
            connect_timeout_secs: 5,
            ping_interval_secs: 60,
            pong_timeout_secs: 60,
            flush_timeout_secs: 1,
        }
    }
}

impl Drop for FeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll `condition` every few milliseconds, panicking after `limit`
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
