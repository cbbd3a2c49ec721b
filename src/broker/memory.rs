//! In-process partitioned log

use super::{BrokerConsumer, BrokerError, BrokerRecord, EventPublisher};
use crate::event::PriceEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::Notify;

/// Partitioned, ordered-per-key log with one consumer position per partition
///
/// Mirrors the broker contract the relay depends on: records with the same
/// key land in the same partition in publish order, offsets are committed
/// manually, and a consumer that rejoins resumes from the committed offsets.
pub struct MemoryBroker {
    topic: String,
    log: Mutex<Log>,
    notify: Notify,
}

#[derive(Debug)]
struct Log {
    partitions: Vec<Vec<BrokerRecord>>,
    positions: Vec<i64>,
    committed: Vec<i64>,
    reported_errors: VecDeque<String>,
    next_partition: usize,
}

impl MemoryBroker {
    /// Create a topic with `partitions` partitions (at least one)
    pub fn new(topic: impl Into<String>, partitions: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            topic: topic.into(),
            log: Mutex::new(Log {
                partitions: vec![Vec::new(); partitions],
                positions: vec![0; partitions],
                committed: vec![0; partitions],
                reported_errors: VecDeque::new(),
                next_partition: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Partition a key routes to
    pub fn partition_for(&self, key: &str) -> i32 {
        let count = self.log.lock().partitions.len();
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % count as u64) as i32
    }

    /// Append a raw record, returning its partition and offset
    pub fn append(&self, key: &str, payload: Vec<u8>) -> (i32, i64) {
        let partition = self.partition_for(key);
        let offset = {
            let mut log = self.log.lock();
            let records = &mut log.partitions[partition as usize];
            let offset = records.len() as i64;
            records.push(BrokerRecord {
                topic: self.topic.clone(),
                partition,
                offset,
                key: Some(key.to_string()),
                payload: Some(payload),
            });
            offset
        };
        self.notify.notify_waiters();
        (partition, offset)
    }

    /// Make the next poll return a broker-reported error
    pub fn report_error(&self, message: impl Into<String>) {
        self.log.lock().reported_errors.push_back(message.into());
        self.notify.notify_waiters();
    }

    /// Committed offset (next offset to consume) of a partition
    pub fn committed(&self, partition: i32) -> i64 {
        self.log
            .lock()
            .committed
            .get(partition as usize)
            .copied()
            .unwrap_or(0)
    }

    /// All records in a partition, in offset order
    pub fn records(&self, partition: i32) -> Vec<BrokerRecord> {
        self.log
            .lock()
            .partitions
            .get(partition as usize)
            .cloned()
            .unwrap_or_default()
    }

    /// Total records across partitions
    pub fn len(&self) -> usize {
        self.log.lock().partitions.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset consumer positions to the committed offsets, as after a restart
    pub fn rejoin(&self) {
        let mut log = self.log.lock();
        log.positions = log.committed.clone();
    }

    fn take_next(&self) -> Result<Option<BrokerRecord>, BrokerError> {
        let mut log = self.log.lock();
        if let Some(message) = log.reported_errors.pop_front() {
            return Err(BrokerError::Reported(message));
        }

        let count = log.partitions.len();
        for i in 0..count {
            let partition = (log.next_partition + i) % count;
            let position = log.positions[partition];
            if let Some(record) = log.partitions[partition].get(position as usize).cloned() {
                log.positions[partition] = position + 1;
                log.next_partition = (partition + 1) % count;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn check_partition(&self, partition: i32) -> Result<usize, BrokerError> {
        let count = self.log.lock().partitions.len();
        usize::try_from(partition)
            .ok()
            .filter(|p| *p < count)
            .ok_or(BrokerError::UnknownPartition(partition))
    }
}

#[async_trait]
impl EventPublisher for MemoryBroker {
    async fn publish(&self, event: &PriceEvent) -> Result<(), BrokerError> {
        let payload = event.to_json_bytes()?;
        self.append(event.key(), payload);
        Ok(())
    }
}

#[async_trait]
impl BrokerConsumer for MemoryBroker {
    async fn poll(&self, wait: Duration) -> Result<Option<BrokerRecord>, BrokerError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            // Register before checking so an append in between is not missed
            let notified = self.notify.notified();
            if let Some(record) = self.take_next()? {
                return Ok(Some(record));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn commit(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        let partition = self.check_partition(record.partition)?;
        self.log.lock().committed[partition] = record.offset + 1;
        Ok(())
    }

    async fn rewind(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        let partition = self.check_partition(record.partition)?;
        self.log.lock().positions[partition] = record.offset;
        Ok(())
    }
}
