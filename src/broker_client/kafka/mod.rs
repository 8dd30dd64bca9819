//! Kafka wire protocol implementation of [`ResolveOffset`] and [`FetchRecords`].
//!
//! Holds one TCP connection to the partition leader for its whole lifetime. Requests are
//! strictly sequential: each one is written, then its response is awaited before anything
//! else is sent, so a single correlation id check per response is enough.
mod records;

use std::time::Duration;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use kafka_protocol::{
    messages::{
        BrokerId, FetchRequest, ListOffsetsRequest, RequestHeader, ResponseHeader, TopicName,
        fetch_request::{FetchPartition, FetchTopic},
        list_offsets_request::{ListOffsetsPartition, ListOffsetsTopic},
    },
    protocol::{Decodable, Encodable, HeaderVersion, Request, StrBytes},
};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    broker_client::{FetchRecords, ResolveOffset},
    config::HostPort,
    error::{ScribeError, ScribeResult, codec_error},
    messages::{BrokerErrorCode, ClientId, FetchBatch, PartitionRef, TimeSelector},
};

use records::{DecodedEntries, decode_records};

/// ListOffsets v1 returns a single offset per partition instead of a list.
pub const LIST_OFFSETS_VERSION: i16 = 1;

/// Fetch v4 is the first version carrying record batches (magic 2) and isolation levels.
pub const FETCH_VERSION: i16 = 4;

/// Upper bound for a single response frame.
const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Consumers identify themselves with replica id -1.
const CONSUMER_REPLICA_ID: i32 = -1;

/// Settings for a [`KafkaConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfiguration {
    /// The identity sent in each request header.
    pub client_id: ClientId,
    /// How long a connect attempt or a single request may take.
    pub request_timeout: Duration,
    /// How long the broker may hold a fetch open waiting for data.
    pub max_wait: Duration,
}

/// A connection to a single broker.
#[derive(Debug)]
pub struct KafkaConnection {
    addr: HostPort,
    config: ConnectionConfiguration,
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    correlation_id: i32,
}

impl KafkaConnection {
    /// Opens the connection to the broker at `addr`.
    #[tracing::instrument(skip_all, name = "connect", fields(broker = %addr))]
    pub async fn connect(addr: &HostPort, config: ConnectionConfiguration) -> ScribeResult<Self> {
        let stream = tokio::time::timeout(
            config.request_timeout,
            TcpStream::connect((addr.host.as_str(), addr.port)),
        )
        .await??;

        stream.set_nodelay(true)?;

        tracing::info!("Connected to {} as {}.", addr, config.client_id);

        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_LENGTH)
            .new_codec();

        Ok(Self {
            addr: addr.clone(),
            config,
            framed: Framed::new(stream, codec),
            correlation_id: 0,
        })
    }

    /// The broker this connection talks to.
    pub fn addr(&self) -> &HostPort {
        &self.addr
    }

    /// Sends one request and waits for its response.
    async fn send<R: Request>(&mut self, api_version: i16, body: &R) -> ScribeResult<R::Response> {
        self.correlation_id = self.correlation_id.wrapping_add(1);
        let correlation_id = self.correlation_id;

        let mut header = RequestHeader::default();
        header.request_api_key = R::KEY;
        header.request_api_version = api_version;
        header.correlation_id = correlation_id;
        header.client_id = Some(StrBytes::from_string(
            self.config.client_id.as_str().to_string(),
        ));

        let mut buf = BytesMut::new();
        header
            .encode(&mut buf, R::header_version(api_version))
            .map_err(codec_error)?;
        body.encode(&mut buf, api_version).map_err(codec_error)?;

        tokio::time::timeout(self.config.request_timeout, self.framed.send(buf.freeze())).await??;

        let frame = tokio::time::timeout(self.config.request_timeout, self.framed.next())
            .await?
            .ok_or(ScribeError::ConnectionClosed)??;

        let mut frame = frame.freeze();

        let response_header = ResponseHeader::decode(
            &mut frame,
            <R::Response as HeaderVersion>::header_version(api_version),
        )
        .map_err(codec_error)?;

        if response_header.correlation_id != correlation_id {
            return Err(ScribeError::CorrelationMismatch {
                expected: correlation_id,
                actual: response_header.correlation_id,
            });
        }

        R::Response::decode(&mut frame, api_version).map_err(codec_error)
    }
}

fn topic_name(partition: &PartitionRef) -> TopicName {
    TopicName(StrBytes::from_string(partition.topic.clone()))
}

#[async_trait::async_trait]
impl ResolveOffset for KafkaConnection {
    #[tracing::instrument(skip_all, name = "resolve_offset", fields(partition = %partition))]
    async fn resolve(
        &mut self,
        partition: &PartitionRef,
        selector: TimeSelector,
    ) -> ScribeResult<i64> {
        let mut request_partition = ListOffsetsPartition::default();
        request_partition.partition_index = partition.partition;
        request_partition.timestamp = selector.as_timestamp();

        let mut topic = ListOffsetsTopic::default();
        topic.name = topic_name(partition);
        topic.partitions = vec![request_partition];

        let mut request = ListOffsetsRequest::default();
        request.replica_id = BrokerId(CONSUMER_REPLICA_ID);
        request.topics = vec![topic];

        let response = self.send(LIST_OFFSETS_VERSION, &request).await?;

        let partition_response = response
            .topics
            .into_iter()
            .filter(|topic| topic.name.0.to_string() == partition.topic)
            .flat_map(|topic| topic.partitions)
            .find(|p| p.partition_index == partition.partition)
            .ok_or_else(|| ScribeError::MissingPartition(partition.clone()))?;

        if let Some(code) = BrokerErrorCode::from_code(partition_response.error_code) {
            tracing::warn!("Offset lookup for {:?} failed: {}", selector, code);

            return Err(ScribeError::BrokerUnavailable {
                partition: partition.clone(),
                code,
            });
        }

        tracing::debug!(
            "Offset lookup for {:?} returned {}.",
            selector,
            partition_response.offset
        );

        Ok(partition_response.offset)
    }
}

#[async_trait::async_trait]
impl FetchRecords for KafkaConnection {
    #[tracing::instrument(skip_all, name = "fetch", fields(partition = %partition, offset = offset))]
    async fn fetch(
        &mut self,
        partition: &PartitionRef,
        offset: i64,
        max_bytes: i32,
    ) -> ScribeResult<FetchBatch> {
        let mut request_partition = FetchPartition::default();
        request_partition.partition = partition.partition;
        request_partition.fetch_offset = offset;
        request_partition.partition_max_bytes = max_bytes;

        let mut topic = FetchTopic::default();
        topic.topic = topic_name(partition);
        topic.partitions = vec![request_partition];

        let mut request = FetchRequest::default();
        request.replica_id = BrokerId(CONSUMER_REPLICA_ID);
        request.max_wait_ms = self.config.max_wait.as_millis().try_into()?;
        request.min_bytes = 1;
        request.max_bytes = max_bytes;
        request.isolation_level = 0;
        request.topics = vec![topic];

        let response = self.send(FETCH_VERSION, &request).await?;

        let partition_data = response
            .responses
            .into_iter()
            .filter(|topic| topic.topic.0.to_string() == partition.topic)
            .flat_map(|topic| topic.partitions)
            .find(|p| p.partition_index == partition.partition)
            .ok_or_else(|| ScribeError::MissingPartition(partition.clone()))?;

        let decoded = match partition_data.records {
            Some(bytes) => decode_records(bytes)?,
            None => DecodedEntries::default(),
        };

        tracing::debug!(
            "Fetched {} records, error code {}, high watermark {}.",
            decoded.records.len(),
            partition_data.error_code,
            partition_data.high_watermark
        );

        Ok(FetchBatch {
            records: decoded.records,
            error: BrokerErrorCode::from_code(partition_data.error_code),
            next_offset: decoded.next_offset,
            high_watermark: partition_data.high_watermark,
        })
    }
}
