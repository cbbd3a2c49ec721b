//! WebSocket client library
//!
//! Provides a reusable WebSocket client with automatic reconnection,
//! ping/pong handling, and a configurable backoff policy.

mod backoff;
mod client;
mod types;

pub use backoff::{Backoff, ReconnectPolicy};
pub use client::WsClient;
pub use types::{SubscriptionState, WsConfig, WsError, WsMessage};
