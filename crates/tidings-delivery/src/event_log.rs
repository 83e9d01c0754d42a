//! Keyed, partitioned, append-only event log.
//!
//! A record's partition is a pure function of its key, so every record for
//! one mailbox lands in one partition and keeps publish order there.

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::errors::PublishError;

/// Where a published record landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordPosition {
    /// Partition index.
    pub partition: u32,
    /// Offset within the partition.
    pub offset: u64,
}

/// A record as stored in the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedRecord {
    /// Topic name.
    pub topic: String,
    /// Position in the topic.
    pub position: RecordPosition,
    /// Mailbox key.
    pub key: String,
    /// Encoded record body. Never modified after publish.
    pub value: Vec<u8>,
}

/// Producer side of the event log.
#[async_trait]
pub trait EventLogProducer: Send + Sync {
    /// Append `value` under `key`. Returns once the record is durable.
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<RecordPosition, PublishError>;
}

/// Partition for `key` among `partitions` (a count of zero is treated as one).
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    let digest = Sha256::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(head);
    u32::try_from(hash % u64::from(partitions.max(1))).unwrap_or(0)
}

/// Single-topic log held in memory.
pub struct MemoryEventLog {
    topic: String,
    partitions: Vec<Mutex<Vec<PublishedRecord>>>,
}

impl MemoryEventLog {
    /// Empty log for `topic` with `partitions` partitions (at least one).
    pub fn new(topic: impl Into<String>, partitions: u32) -> Self {
        Self {
            topic: topic.into(),
            partitions: (0..partitions.max(1)).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Topic this log serves.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Number of partitions.
    pub fn partition_count(&self) -> u32 {
        u32::try_from(self.partitions.len()).unwrap_or(u32::MAX)
    }

    /// Copy of one partition, in offset order.
    pub fn partition(&self, partition: u32) -> Vec<PublishedRecord> {
        self.partitions
            .get(partition as usize)
            .map(|p| p.lock().clone())
            .unwrap_or_default()
    }

    /// Every record published under `key`, in publish order.
    pub fn records_for_key(&self, key: &str) -> Vec<PublishedRecord> {
        self.partition(partition_for(key, self.partition_count()))
            .into_iter()
            .filter(|r| r.key == key)
            .collect()
    }

    /// Total records across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.lock().len()).sum()
    }

    /// Whether nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventLogProducer for MemoryEventLog {
    async fn publish(&self, topic: &str, key: &str, value: Vec<u8>) -> Result<RecordPosition, PublishError> {
        if topic != self.topic {
            return Err(PublishError::UnknownTopic(topic.to_owned()));
        }
        let partition = partition_for(key, self.partition_count());
        let mut records = self
            .partitions
            .get(partition as usize)
            .ok_or_else(|| PublishError::Unavailable(format!("partition {partition} missing")))?
            .lock();
        let position = RecordPosition {
            partition,
            offset: records.len() as u64,
        };
        records.push(PublishedRecord {
            topic: self.topic.clone(),
            position,
            key: key.to_owned(),
            value,
        });
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn partition_is_stable_and_in_range() {
        for key in ["u1", "u2", "alice", "", "a-much-longer-user-identifier"] {
            let p = partition_for(key, 4);
            assert!(p < 4);
            assert_eq!(p, partition_for(key, 4));
        }
    }

    #[test]
    fn zero_partitions_means_one() {
        assert_eq!(partition_for("u1", 0), 0);
        assert_eq!(MemoryEventLog::new("t", 0).partition_count(), 1);
    }

    #[tokio::test]
    async fn offsets_grow_per_partition() {
        let log = MemoryEventLog::new("chat", 4);
        let first = log.publish("chat", "u1", b"a".to_vec()).await.unwrap();
        let second = log.publish("chat", "u1", b"b".to_vec()).await.unwrap();
        assert_eq!(first.partition, second.partition);
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
    }

    #[tokio::test]
    async fn records_for_key_keep_publish_order() {
        let log = MemoryEventLog::new("chat", 2);
        for i in 0..10u8 {
            let key = if i % 2 == 0 { "u1" } else { "u2" };
            let _ = log.publish("chat", key, vec![i]).await.unwrap();
        }
        let values: Vec<u8> = log.records_for_key("u1").iter().map(|r| r.value[0]).collect();
        assert_eq!(values, vec![0, 2, 4, 6, 8]);
        assert_eq!(log.len(), 10);
    }

    #[tokio::test]
    async fn wrong_topic_rejected() {
        let log = MemoryEventLog::new("chat", 1);
        let err = log.publish("other", "u1", Vec::new()).await.unwrap_err();
        assert_matches!(err, PublishError::UnknownTopic(t) if t == "other");
        assert!(log.is_empty());
    }
}
