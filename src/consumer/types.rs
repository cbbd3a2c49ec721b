//! Consumer types

use crate::store::StoreError;

/// Consumer counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub consumed: u64,
    pub persisted: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub persist_failures: u64,
    pub commits: u64,
    pub commit_errors: u64,
    pub broker_errors: u64,
}

impl ConsumerStats {
    pub fn merge(&mut self, other: &ConsumerStats) {
        self.consumed += other.consumed;
        self.persisted += other.persisted;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
        self.persist_failures += other.persist_failures;
        self.commits += other.commits;
        self.commit_errors += other.commit_errors;
        self.broker_errors += other.broker_errors;
    }
}

/// Worker-level failures
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("worker {worker}: trade store unavailable after {failures} consecutive failures: {source}")]
    StoreUnavailable {
        worker: usize,
        failures: u32,
        #[source]
        source: StoreError,
    },
    #[error("consumer worker task failed: {0}")]
    WorkerPanicked(String),
}
