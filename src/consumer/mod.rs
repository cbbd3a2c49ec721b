//! Trade consumer
//!
//! At-least-once delivery from the broker with idempotent persistence:
//! an offset is committed only after its event is durably stored.

mod group;
mod types;
mod worker;

pub use group::run_workers;
pub use types::{ConsumerError, ConsumerStats};
pub use worker::TradeConsumer;
