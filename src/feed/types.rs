//! Raw feed message types

use serde::Deserialize;

/// Binance `@trade` stream message
///
/// Every field is optional so that a missing field is reported by name
/// instead of as a generic parse failure.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTrade {
    /// Event type
    #[serde(rename = "e")]
    pub event_type: Option<String>,
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: Option<String>,
    /// Price
    #[serde(rename = "p")]
    pub price: Option<NumberOrString>,
    /// Trade time (milliseconds)
    #[serde(rename = "T")]
    pub trade_time: Option<NumberOrString>,
}

/// Binance sends decimals as strings; other producers send numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

impl NumberOrString {
    pub fn as_text(&self) -> String {
        match self {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::Text(s) => s.trim().to_string(),
        }
    }
}
