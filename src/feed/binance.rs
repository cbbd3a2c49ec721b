//! Binance trade stream normalizer

use super::types::{NumberOrString, RawTrade};
use crate::event::{DecodeError, PriceEvent};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Binance WebSocket base URL
pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Build the trade stream URL for a symbol
pub fn stream_url(base_url: &str, symbol: &str) -> String {
    format!(
        "{}/{}@trade",
        base_url.trim_end_matches('/'),
        symbol.to_lowercase()
    )
}

/// Normalize a raw trade message, stamping `processed_at` with the current time
pub fn normalize(raw: &str) -> Result<PriceEvent, DecodeError> {
    normalize_at(raw, Utc::now())
}

/// Normalize a raw trade message with an explicit processing time
pub fn normalize_at(raw: &str, now: DateTime<Utc>) -> Result<PriceEvent, DecodeError> {
    let trade: RawTrade = serde_json::from_str(raw)?;

    if let Some(event_type) = trade.event_type.as_deref() {
        if event_type != "trade" {
            return Err(DecodeError::UnexpectedEvent(event_type.to_string()));
        }
    }

    let symbol = trade
        .symbol
        .ok_or(DecodeError::MissingField("s"))?
        .trim()
        .to_uppercase();
    let price = parse_price(trade.price.as_ref().ok_or(DecodeError::MissingField("p"))?)?;
    let trade_time_ms =
        parse_millis(trade.trade_time.as_ref().ok_or(DecodeError::MissingField("T"))?)?;

    PriceEvent::new(symbol, price, trade_time_ms / 1000, now.timestamp())
}

fn parse_price(value: &NumberOrString) -> Result<Decimal, DecodeError> {
    let text = value.as_text();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| DecodeError::InvalidPrice(text))
}

fn parse_millis(value: &NumberOrString) -> Result<i64, DecodeError> {
    let text = value.as_text();
    match text.parse::<i64>() {
        Ok(ms) if ms >= 0 => Ok(ms),
        _ => Err(DecodeError::InvalidTimestamp(text)),
    }
}
