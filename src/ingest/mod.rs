//! Feed ingestion
//!
//! One cancellable task per symbol, all publishing through one shared
//! broker producer

mod ingester;

pub use ingester::{run_message_loop, FeedIngester, IngestStats};
