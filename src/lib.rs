//! trade-relay: exchange trade events into a deduplicated store via Kafka
//!
//! This library provides the core components for:
//! - Normalizing Binance trade stream messages
//! - Reconnecting per-symbol WebSocket ingestion
//! - Publishing keyed events to Kafka with an idempotent producer
//! - Consuming with manual offset commits after idempotent Postgres upserts
//! - Logging and Prometheus metrics

pub mod broker;
pub mod cli;
pub mod config;
pub mod consumer;
pub mod event;
pub mod feed;
pub mod ingest;
pub mod store;
pub mod telemetry;
pub mod ws;
