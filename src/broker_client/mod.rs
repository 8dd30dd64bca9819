//! The two broker operations the consume loop depends on.
//!
//! Both are traits so the loop can be driven against any broker implementation. The
//! [`kafka`] submodule implements them over the Kafka wire protocol.

pub mod kafka;

use crate::{
    error::ScribeResult,
    messages::{FetchBatch, PartitionRef, TimeSelector},
};

/// The Offset Resolver.
///
/// Translates a time selector into a concrete log offset for a partition.
#[async_trait::async_trait]
pub trait ResolveOffset
where
    Self: Send + std::fmt::Debug,
{
    /// Sends a single offset lookup for the partition and time selector, returning the
    /// offset the broker reports.
    ///
    /// # Errors
    /// Returns [`crate::error::ScribeError::BrokerUnavailable`] if the broker reports an error
    /// for the partition, or a transport error if the request itself failed. There is no retry.
    async fn resolve(
        &mut self,
        partition: &PartitionRef,
        selector: TimeSelector,
    ) -> ScribeResult<i64>;
}

/// The Fetch Client.
///
/// Reads a bounded amount of log data starting at an offset.
#[async_trait::async_trait]
pub trait FetchRecords
where
    Self: Send + std::fmt::Debug,
{
    /// Issues one fetch for up to `max_bytes` of data at `offset`.
    ///
    /// Broker reported partition errors are returned inside the [`FetchBatch`], they are
    /// not an `Err`; interpreting them is left to the caller.
    ///
    /// # Errors
    /// Returns an error if the request could not be sent or the response could not be decoded.
    async fn fetch(
        &mut self,
        partition: &PartitionRef,
        offset: i64,
        max_bytes: i32,
    ) -> ScribeResult<FetchBatch>;
}

/// Anything that can both resolve offsets and fetch records for a partition.
pub trait PartitionClient: ResolveOffset + FetchRecords {}

impl<T> PartitionClient for T where T: ResolveOffset + FetchRecords {}
