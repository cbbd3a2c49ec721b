//! Exchange feed normalization
//!
//! Maps raw Binance trade stream messages into [`PriceEvent`](crate::event::PriceEvent)

mod binance;
mod types;

pub use binance::{normalize, normalize_at, stream_url, BINANCE_WS_URL};
