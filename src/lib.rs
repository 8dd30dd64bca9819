//! Scribe
//!
//! A single-partition Kafka consumer. It positions a cursor in one partition of a topic,
//! fetches from the partition leader in a loop and hands every record, in offset order, to
//! a delivery sink. There is no group membership and nothing is committed back to the broker.
//!
//! example usage:
//!
//! ```rust,no_run
//! use clap::Parser;
//! use scribe::{
//!     config::ConsumerConfiguration, consume, sink::ConsoleSink,
//!     utils::shutdown::shutdown_channel,
//! };
//!
//! # async fn example() -> scribe::error::ScribeResult<()> {
//! let config = ConsumerConfiguration::parse();
//! let (trigger, shutdown) = shutdown_channel();
//!
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     trigger.trigger();
//! });
//!
//! consume(&config, ConsoleSink::stdout(), shutdown).await?;
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::unwrap_used)]

pub mod broker_client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod messages;
pub mod sink;
pub mod utils;

use broker_client::kafka::KafkaConnection;
use config::ConsumerConfiguration;
use consumer::Consumer;
use error::ScribeResult;
use sink::DeliverySink;
use utils::shutdown::Shutdown;

/// Consumes the configured partition into `sink` until `shutdown` fires.
///
/// Connects to the leader, positions the cursor and runs the consume loop. Replica
/// addresses in the configuration are logged and otherwise ignored.
///
/// # Errors
/// Fails if the leader cannot be reached, if the starting offset cannot be resolved, and
/// on any error that ends the consume loop.
#[tracing::instrument(skip_all, name = "consume", fields(topic = %config.topic, partition = config.partition))]
pub async fn consume<S>(
    config: &ConsumerConfiguration,
    sink: S,
    shutdown: Shutdown,
) -> ScribeResult<()>
where
    S: DeliverySink,
{
    let partition = config.partition_ref()?;

    if !config.replicas.is_empty() {
        tracing::info!(
            "Ignoring {} replica addresses, only the leader {} is used.",
            config.replicas.len(),
            config.leader
        );
    }

    let connection = KafkaConnection::connect(&config.leader, config.connection()?).await?;

    tracing::info!("Connected to leader {} for {}.", connection.addr(), partition);

    let mut consumer = Consumer::new(connection, sink, partition, config.consume_settings());

    consumer.run(shutdown).await
}
