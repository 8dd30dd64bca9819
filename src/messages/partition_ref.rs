use std::fmt::Display;

use crate::error::{ScribeError, ScribeResult};

/// The topic/partition combination being consumed.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct PartitionRef {
    /// The topic name.
    pub topic: String,
    /// The partition index, never negative.
    pub partition: i32,
}

impl PartitionRef {
    /// Creates a new PartitionRef, rejecting negative partition numbers.
    pub fn new(topic: impl Into<String>, partition: i32) -> ScribeResult<Self> {
        if partition < 0 {
            return Err(ScribeError::InvalidPartition(partition.into()));
        }

        Ok(Self {
            topic: topic.into(),
            partition,
        })
    }

    /// The identity string this consumer tags its broker requests with.
    pub fn client_id(&self) -> ClientId {
        ClientId(format!("scribe_{}_{}", self.topic, self.partition))
    }
}

impl Display for PartitionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Client identity sent in every request header, used by the broker for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(String);

impl ClientId {
    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
