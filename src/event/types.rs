//! Price event types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A normalized trade event
///
/// `(symbol, event_time)` identifies the trade; repeated deliveries of the
/// same pair describe the same trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEvent {
    /// Uppercase ticker (e.g., "ETHUSDT")
    pub symbol: String,
    /// Trade price, always positive
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Exchange trade time (seconds since epoch)
    pub event_time: i64,
    /// Local normalization time (seconds since epoch)
    pub processed_at: i64,
}

/// Errors raised when a raw feed message or a broker payload
/// cannot be turned into a [`PriceEvent`]
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected event type: {0}")]
    UnexpectedEvent(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl PriceEvent {
    /// Build a validated event
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        event_time: i64,
        processed_at: i64,
    ) -> Result<Self, DecodeError> {
        let event = Self {
            symbol: symbol.into(),
            price,
            event_time,
            processed_at,
        };
        event.validate()?;
        Ok(event)
    }

    /// Check the field constraints
    pub fn validate(&self) -> Result<(), DecodeError> {
        if !is_valid_symbol(&self.symbol) {
            return Err(DecodeError::InvalidSymbol(self.symbol.clone()));
        }
        if self.price <= Decimal::ZERO {
            return Err(DecodeError::InvalidPrice(self.price.to_string()));
        }
        if self.event_time < 0 {
            return Err(DecodeError::InvalidTimestamp(self.event_time.to_string()));
        }
        if self.processed_at < 0 {
            return Err(DecodeError::InvalidTimestamp(
                self.processed_at.to_string(),
            ));
        }
        Ok(())
    }

    /// Broker partition key
    pub fn key(&self) -> &str {
        &self.symbol
    }

    /// Encode for the broker
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode and validate a broker payload
    pub fn from_json_slice(payload: &[u8]) -> Result<Self, DecodeError> {
        let event: PriceEvent = serde_json::from_slice(payload)?;
        event.validate()?;
        Ok(event)
    }
}

fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth() -> PriceEvent {
        PriceEvent::new("ETHUSDT", dec!(2500.10), 1_700_000_000, 1_700_000_001).unwrap()
    }

    #[test]
    fn test_new_valid_event() {
        let event = eth();
        assert_eq!(event.symbol, "ETHUSDT");
        assert_eq!(event.key(), "ETHUSDT");
        assert_eq!(event.price, dec!(2500.10));
    }

    #[test]
    fn test_rejects_lowercase_symbol() {
        let err = PriceEvent::new("ethusdt", dec!(1), 1, 1).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSymbol(_)));
    }

    #[test]
    fn test_rejects_empty_symbol() {
        let err = PriceEvent::new("", dec!(1), 1, 1).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSymbol(_)));
    }

    #[test]
    fn test_rejects_non_positive_price() {
        assert!(matches!(
            PriceEvent::new("BTCUSDT", dec!(0), 1, 1),
            Err(DecodeError::InvalidPrice(_))
        ));
        assert!(matches!(
            PriceEvent::new("BTCUSDT", dec!(-3.5), 1, 1),
            Err(DecodeError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_rejects_negative_timestamp() {
        let err = PriceEvent::new("BTCUSDT", dec!(1), -1, 1).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_wire_field_names() {
        let bytes = eth().to_json_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["symbol"], "ETHUSDT");
        assert_eq!(json["price"].as_f64(), Some(2500.1));
        assert_eq!(json["event_time"], 1_700_000_000i64);
        assert_eq!(json["processed_at"], 1_700_000_001i64);
    }

    #[test]
    fn test_decode_broker_payload() {
        let payload =
            br#"{"symbol":"ETHUSDT","price":2500.1,"event_time":1700000000,"processed_at":1700000001}"#;
        let event = PriceEvent::from_json_slice(payload).unwrap();
        assert_eq!(event, eth());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = PriceEvent::from_json_slice(b"\x00\x01not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_invalid_content() {
        let payload = br#"{"symbol":"ETHUSDT","price":-1.0,"event_time":1,"processed_at":1}"#;
        let err = PriceEvent::from_json_slice(payload).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPrice(_)));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::MissingField("p");
        assert_eq!(err.to_string(), "missing required field `p`");
    }
}
