//! Process configuration: command line flags, each with an environment variable fallback.
use std::{fmt::Display, str::FromStr, time::Duration};

use clap::Parser;

use crate::{
    broker_client::kafka::ConnectionConfiguration,
    consumer::{ConsumeSettings, ErroredBatchPolicy},
    error::{ScribeError, ScribeResult},
    messages::{OffsetSelection, PartitionRef},
};

/// A broker address written as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl FromStr for HostPort {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScribeError::InvalidHostPort(s.to_string());

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;

        if host.is_empty() {
            return Err(invalid());
        }

        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl Display for HostPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Consume a single partition of a Kafka topic from its leader broker.
#[derive(Debug, Clone, Parser)]
#[command(name = "scribe", version, about, long_about = None)]
pub struct ConsumerConfiguration {
    /// Topic to consume.
    #[arg(long, env = "SCRIBE_TOPIC")]
    pub topic: String,

    /// Leader broker for the partition, as host:port.
    #[arg(long, env = "SCRIBE_LEADER")]
    pub leader: HostPort,

    /// Partition to consume.
    #[arg(long, env = "SCRIBE_PARTITION", value_parser = clap::value_parser!(i32).range(0..))]
    pub partition: i32,

    /// Replica brokers for the partition. Accepted for completeness, not used for failover.
    #[arg(long = "replica", env = "SCRIBE_REPLICAS", value_delimiter = ',', num_args = 0..)]
    pub replicas: Vec<HostPort>,

    /// Where to start: latest, earliest, timestamp:<ms> or offset:<n>.
    #[arg(long, env = "SCRIBE_START_FROM", default_value = "latest")]
    pub start_from: OffsetSelection,

    /// Where to go after the broker reports the cursor out of range.
    #[arg(long, env = "SCRIBE_RESET_TO", default_value = "latest")]
    pub reset_to: OffsetSelection,

    /// Upper bound on the data returned by one fetch.
    #[arg(long, env = "SCRIBE_MAX_BYTES", default_value_t = ConsumeSettings::DEFAULT_MAX_BYTES)]
    pub max_bytes: i32,

    /// How long the broker may hold a fetch open waiting for data.
    #[arg(long, env = "SCRIBE_MAX_WAIT_MS", default_value_t = 0)]
    pub max_wait_ms: u64,

    /// Pause after a fetch that delivered nothing.
    #[arg(long, env = "SCRIBE_IDLE_INTERVAL_MS", default_value_t = 1000)]
    pub idle_interval_ms: u64,

    /// Pause after a retriable broker error.
    #[arg(long, env = "SCRIBE_ERROR_BACKOFF_MS", default_value_t = 1000)]
    pub error_backoff_ms: u64,

    /// Timeout for connecting and for each broker request.
    #[arg(long, env = "SCRIBE_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// What to do with records that arrive together with a retriable broker error.
    #[arg(long, env = "SCRIBE_ERRORED_BATCH", value_enum, default_value_t = ErroredBatchPolicy::Discard)]
    pub errored_batch: ErroredBatchPolicy,
}

impl ConsumerConfiguration {
    /// The partition this process consumes.
    pub fn partition_ref(&self) -> ScribeResult<PartitionRef> {
        PartitionRef::new(self.topic.clone(), self.partition)
    }

    /// Settings for the broker connection.
    pub fn connection(&self) -> ScribeResult<ConnectionConfiguration> {
        Ok(ConnectionConfiguration {
            client_id: self.partition_ref()?.client_id(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_wait: Duration::from_millis(self.max_wait_ms),
        })
    }

    /// Settings for the consume loop.
    pub fn consume_settings(&self) -> ConsumeSettings {
        ConsumeSettings {
            start_from: self.start_from,
            reset_to: self.reset_to,
            max_bytes: self.max_bytes,
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            errored_batch: self.errored_batch,
        }
    }
}
