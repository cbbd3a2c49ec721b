//! Prometheus metrics

use ::metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Raw messages received from the feed
    FeedMessages,
    /// Raw messages that failed normalization
    DecodeErrors,
    /// Events accepted by the broker producer
    Published,
    /// Events the producer could not deliver
    PublishErrors,
    /// Feed reconnect attempts
    Reconnects,
    /// Records read from the broker
    Consumed,
    /// New rows written
    Persisted,
    /// Redeliveries that hit an existing row
    Duplicates,
    /// Broker records skipped as undecodable
    Skipped,
    /// Failed persistence units of work
    PersistFailures,
    /// Successful offset commits
    OffsetCommits,
    /// Failed offset commits
    CommitErrors,
    /// Errors reported by the broker on poll
    BrokerErrors,
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::FeedMessages => "trade_relay_feed_messages_total",
            CounterMetric::DecodeErrors => "trade_relay_decode_errors_total",
            CounterMetric::Published => "trade_relay_published_total",
            CounterMetric::PublishErrors => "trade_relay_publish_errors_total",
            CounterMetric::Reconnects => "trade_relay_feed_reconnects_total",
            CounterMetric::Consumed => "trade_relay_consumed_total",
            CounterMetric::Persisted => "trade_relay_persisted_total",
            CounterMetric::Duplicates => "trade_relay_duplicates_total",
            CounterMetric::Skipped => "trade_relay_skipped_total",
            CounterMetric::PersistFailures => "trade_relay_persist_failures_total",
            CounterMetric::OffsetCommits => "trade_relay_offset_commits_total",
            CounterMetric::CommitErrors => "trade_relay_commit_errors_total",
            CounterMetric::BrokerErrors => "trade_relay_broker_errors_total",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CounterMetric::FeedMessages => "Raw feed messages received",
            CounterMetric::DecodeErrors => "Raw feed messages dropped as undecodable",
            CounterMetric::Published => "Events accepted by the producer",
            CounterMetric::PublishErrors => "Events dropped after producer retries",
            CounterMetric::Reconnects => "Feed reconnect attempts",
            CounterMetric::Consumed => "Records read from the broker",
            CounterMetric::Persisted => "Rows inserted",
            CounterMetric::Duplicates => "Duplicate deliveries ignored",
            CounterMetric::Skipped => "Undecodable broker records skipped",
            CounterMetric::PersistFailures => "Rolled back persistence attempts",
            CounterMetric::OffsetCommits => "Offsets committed",
            CounterMetric::CommitErrors => "Offset commits that failed",
            CounterMetric::BrokerErrors => "Broker-reported consume errors",
        }
    }

    const ALL: [CounterMetric; 13] = [
        CounterMetric::FeedMessages,
        CounterMetric::DecodeErrors,
        CounterMetric::Published,
        CounterMetric::PublishErrors,
        CounterMetric::Reconnects,
        CounterMetric::Consumed,
        CounterMetric::Persisted,
        CounterMetric::Duplicates,
        CounterMetric::Skipped,
        CounterMetric::PersistFailures,
        CounterMetric::OffsetCommits,
        CounterMetric::CommitErrors,
        CounterMetric::BrokerErrors,
    ];
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One persistence unit of work
    Persist,
    /// One synchronous offset commit
    OffsetCommit,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::Persist => "trade_relay_persist_seconds",
            LatencyMetric::OffsetCommit => "trade_relay_offset_commit_seconds",
        }
    }
}

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    for metric in CounterMetric::ALL {
        describe_counter!(metric.name(), metric.description());
    }
    describe_histogram!(
        LatencyMetric::Persist.name(),
        "Duration of one persistence transaction"
    );
    describe_histogram!(
        LatencyMetric::OffsetCommit.name(),
        "Duration of one synchronous offset commit"
    );
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    counter!(metric.name()).increment(1);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    histogram!(metric.name()).record(duration.as_secs_f64());
}
