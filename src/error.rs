//! Error type shared by every layer of the consumer.
use std::{array::TryFromSliceError, num::TryFromIntError};

use thiserror::Error;

use crate::messages::{BrokerErrorCode, OffsetSelection, PartitionRef, Record};

/// Result alias used throughout the crate.
pub type ScribeResult<T> = Result<T, ScribeError>;

/// Everything that can go wrong while resolving, fetching or delivering.
#[derive(Error, Debug)]
pub enum ScribeError {
    /// Generic Error for arbitrary errors that are generally not classified but should still convey information.
    #[error("{0}")]
    Generic(String),

    // Inferred
    /// Socket level failure talking to the broker.
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    /// A broker request did not complete within the request timeout.
    #[error("Request timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),
    /// Integer narrowing failed.
    #[error("TryFromInt Conversion Error")]
    TryFromIntConversionError(#[from] TryFromIntError),
    /// Fixed size slice conversion failed.
    #[error("TryFromSlice Conversion Error")]
    TryFromSliceConversionError(#[from] TryFromSliceError),
    /// The sink's receiving half is gone.
    #[error("Sink closed: {0}")]
    SinkClosed(String),

    // Wire protocol errors.
    /// Encoding a request or decoding a response failed.
    #[error("Codec Error: {0}")]
    Codec(String),
    /// The broker hung up while a response was outstanding.
    #[error("Connection to broker closed")]
    ConnectionClosed,
    /// The response did not answer the request that was sent.
    #[error("Correlation id mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch {
        /// The id sent with the request.
        expected: i32,
        /// The id found in the response header.
        actual: i32,
    },

    // Broker reported errors.
    /// The broker could not answer an offset lookup for the partition.
    #[error("Broker unavailable for {partition}: {code}")]
    BrokerUnavailable {
        /// Partition the lookup was for.
        partition: PartitionRef,
        /// Code reported by the broker.
        code: BrokerErrorCode,
    },
    /// The broker response did not mention the requested partition.
    #[error("Partition {0} missing from broker response")]
    MissingPartition(PartitionRef),
    /// An offset selection produced no offset to fetch from, such as a timestamp past
    /// the end of the log.
    #[error("No usable offset for {partition} at {selection}: got {offset}")]
    UnusableOffset {
        /// Partition being positioned.
        partition: PartitionRef,
        /// Selection that was resolved.
        selection: OffsetSelection,
        /// Offset it resolved to.
        offset: i64,
    },
    /// A fetch failed with a code the consume loop cannot recover from.
    #[error("Unhandled broker fault for {partition} at offset {offset}: {code}")]
    UnhandledBrokerFault {
        /// Partition being consumed.
        partition: PartitionRef,
        /// Code reported by the broker.
        code: BrokerErrorCode,
        /// Cursor at the time of the fetch.
        offset: i64,
    },

    // Configuration errors.
    /// Partition numbers are non-negative.
    #[error("Invalid partition: {0}")]
    InvalidPartition(i64),
    /// Broker addresses are written as `host:port`.
    #[error("Invalid host:port: {0}")]
    InvalidHostPort(String),
    /// Offset selections are `latest`, `earliest`, `timestamp:<ms>` or `offset:<n>`.
    #[error("Invalid offset selection: {0}")]
    InvalidOffsetSelection(String),
}

impl From<tokio::sync::mpsc::error::SendError<Record>> for ScribeError {
    fn from(value: tokio::sync::mpsc::error::SendError<Record>) -> Self {
        ScribeError::SinkClosed(value.to_string())
    }
}

/// Maps a `kafka-protocol` encode/decode failure into [`ScribeError::Codec`].
pub(crate) fn codec_error(err: impl std::fmt::Display) -> ScribeError {
    ScribeError::Codec(err.to_string())
}
