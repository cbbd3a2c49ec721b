//! Canonical trade event
//!
//! The single event shape carried across the broker boundary

mod types;

pub use types::{DecodeError, PriceEvent};
