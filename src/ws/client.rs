//! WebSocket client with automatic reconnection

use super::backoff::Backoff;
use super::types::{SubscriptionState, WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reusable WebSocket client with automatic reconnection and ping/pong handling
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Create a new client with just a URL using default config
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Connect and return a receiver for messages
    ///
    /// This spawns a background task that owns the subscription: it connects,
    /// streams frames, and on any transport failure or protocol timeout waits
    /// according to the reconnect policy before trying again. The task ends
    /// when `shutdown` is cancelled, when the receiver is dropped, or when
    /// `max_reconnect_attempts` is exhausted; [`WsMessage::Disconnected`] is
    /// always the last message sent.
    pub fn connect(&self, shutdown: CancellationToken) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(1024);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection_loop(&config, &tx, &shutdown).await {
                tracing::error!(url = %config.url, error = %e, "WebSocket connection loop failed");
            }
            let _ = tx.send(WsMessage::Disconnected).await;
        });

        rx
    }

    /// Drive the subscription state machine until it reaches `Closed`
    async fn run_connection_loop(
        config: &WsConfig,
        tx: &mpsc::Sender<WsMessage>,
        shutdown: &CancellationToken,
    ) -> Result<(), WsError> {
        let mut backoff = Backoff::new(config.reconnect);
        let mut stream: Option<WsStream> = None;
        let mut state = SubscriptionState::Disconnected;

        loop {
            tracing::trace!(url = %config.url, ?state, "Subscription state");
            state = match state {
                SubscriptionState::Disconnected => match Self::open(config, shutdown).await {
                    Ok(Some(ws)) => {
                        tracing::info!(url = %config.url, "WebSocket connected");
                        backoff.reset();
                        stream = Some(ws);
                        if tx.send(WsMessage::Connected).await.is_err() {
                            SubscriptionState::Closed
                        } else {
                            SubscriptionState::Connected
                        }
                    }
                    Ok(None) => SubscriptionState::Closed,
                    Err(e) => Self::after_failure(config, &mut backoff, &e)?,
                },
                SubscriptionState::Connected => match stream.take() {
                    Some(ws) => match Self::stream_messages(ws, config, tx, shutdown).await {
                        Ok(()) => SubscriptionState::Closed,
                        Err(e) => Self::after_failure(config, &mut backoff, &e)?,
                    },
                    None => SubscriptionState::Disconnected,
                },
                SubscriptionState::Backoff { attempt, delay } => {
                    if tx
                        .send(WsMessage::Reconnecting { attempt, delay })
                        .await
                        .is_err()
                    {
                        tracing::info!("Receiver dropped, stopping reconnection");
                        SubscriptionState::Closed
                    } else {
                        tokio::select! {
                            _ = shutdown.cancelled() => SubscriptionState::Closed,
                            _ = sleep(delay) => SubscriptionState::Disconnected,
                        }
                    }
                }
                SubscriptionState::Closed => break,
            };
        }

        tracing::info!(url = %config.url, "WebSocket subscription closed");
        Ok(())
    }

    /// Decide the next state after a failed connect or a dropped connection
    fn after_failure(
        config: &WsConfig,
        backoff: &mut Backoff,
        error: &WsError,
    ) -> Result<SubscriptionState, WsError> {
        let delay = backoff.next_delay();
        let attempt = backoff.attempt();

        tracing::warn!(
            url = %config.url,
            error = %error,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "WebSocket connection error, reconnecting..."
        );

        // Check max reconnects (0 = infinite)
        if config.max_reconnect_attempts > 0 && attempt >= config.max_reconnect_attempts {
            tracing::error!(url = %config.url, "Max reconnection attempts reached");
            return Err(WsError::MaxReconnectsExceeded);
        }

        Ok(SubscriptionState::Backoff { attempt, delay })
    }

    /// Open a connection, giving up on timeout or shutdown
    async fn open(
        config: &WsConfig,
        shutdown: &CancellationToken,
    ) -> Result<Option<WsStream>, WsError> {
        tracing::info!(url = %config.url, "Connecting to WebSocket");

        let attempt =
            tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str()));

        tokio::select! {
            _ = shutdown.cancelled() => Ok(None),
            result = attempt => match result {
                Ok(Ok((ws, _response))) => Ok(Some(ws)),
                Ok(Err(e)) => Err(WsError::ConnectionFailed(e.to_string())),
                Err(_) => Err(WsError::ConnectTimeout(config.connect_timeout)),
            }
        }
    }

    /// Forward frames until shutdown (`Ok`) or a transport failure (`Err`)
    async fn stream_messages(
        ws: WsStream,
        config: &WsConfig,
        tx: &mpsc::Sender<WsMessage>,
        shutdown: &CancellationToken,
    ) -> Result<(), WsError> {
        let (mut write, mut read) = ws.split();

        let mut ping_interval = tokio::time::interval(config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut awaiting_pong: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if tx.send(WsMessage::Binary(data)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            awaiting_pong = None;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Received close frame");
                            return Err(WsError::ClosedByPeer);
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed(
                                "Stream ended unexpectedly".into(),
                            ));
                        }
                    }
                }

                _ = pong_deadline(awaiting_pong, config.pong_timeout) => {
                    return Err(WsError::PongTimeout);
                }

                _ = ping_interval.tick() => {
                    if awaiting_pong.is_none() {
                        write.send(Message::Ping(Vec::new())).await
                            .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        awaiting_pong = Some(Instant::now());
                    }
                }
            }
        }
    }
}

/// Resolves once an outstanding ping has gone unanswered for `timeout`
async fn pong_deadline(sent: Option<Instant>, timeout: Duration) {
    match sent {
        Some(sent) => sleep_until(sent + timeout).await,
        None => std::future::pending().await,
    }
}
