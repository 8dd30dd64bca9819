//! Decoding of the `records` field of a fetch response.
//!
//! A fetch response carries a concatenation of log entries. Every entry, whatever its
//! format, starts with `offset: i64, length: i32` and has its magic byte at position 16.
//! Each complete entry goes through `kafka-protocol`'s decoder, which handles record
//! batches (magic 2) as well as legacy message sets (magic 0/1) and checks their CRCs.
//!
//! The broker cuts the response at `max_bytes`, so the last entry may be incomplete. That
//! entry is dropped here and fetched again from its start offset on the next request.
use bytes::Bytes;
use kafka_protocol::records::RecordBatchDecoder;

use crate::{
    error::{ScribeError, ScribeResult, codec_error},
    messages::Record,
};

/// Offset plus length prefix shared by all log entry formats.
const LOG_OVERHEAD: usize = 12;

/// Position of the magic byte in every log entry format.
const MAGIC_POSITION: usize = 16;

/// Position of `lastOffsetDelta` in a record batch.
const LAST_OFFSET_DELTA_POSITION: usize = 23;

/// Records of every complete entry in a fetch response.
#[derive(Debug, Default)]
pub(crate) struct DecodedEntries {
    /// Records in log order.
    pub(crate) records: Vec<Record>,
    /// The offset following the last complete entry, `None` without one.
    pub(crate) next_offset: Option<i64>,
}

/// Decodes every complete log entry in `buf`.
pub(crate) fn decode_records(mut buf: Bytes) -> ScribeResult<DecodedEntries> {
    let mut decoded = DecodedEntries::default();

    while buf.len() >= LOG_OVERHEAD {
        let base_offset = i64::from_be_bytes(buf[0..8].try_into()?);
        let length: usize = i32::from_be_bytes(buf[8..12].try_into()?).try_into()?;

        if buf.len() - LOG_OVERHEAD < length {
            tracing::debug!(
                "Dropping partial entry at offset {}: {} of {} bytes present.",
                base_offset,
                buf.len() - LOG_OVERHEAD,
                length
            );
            break;
        }

        let mut entry = buf.split_to(LOG_OVERHEAD + length);
        let next_offset = entry_end(base_offset, &entry)?;

        let record_set = RecordBatchDecoder::decode(&mut entry).map_err(codec_error)?;

        decoded
            .records
            .extend(record_set.records.into_iter().map(|record| Record {
                offset: record.offset,
                key: record.key,
                payload: record.value.unwrap_or_default(),
                timestamp: record.timestamp,
                control: record.control,
            }));
        decoded.next_offset = Some(next_offset);
    }

    Ok(decoded)
}

/// The offset after an entry.
///
/// A record batch spans `base_offset..=base_offset + lastOffsetDelta` even when compaction
/// removed records from it. A legacy entry carries the offset of its last message.
fn entry_end(base_offset: i64, entry: &[u8]) -> ScribeResult<i64> {
    match entry.get(MAGIC_POSITION) {
        Some(2) => {
            let delta = entry
                .get(LAST_OFFSET_DELTA_POSITION..LAST_OFFSET_DELTA_POSITION + 4)
                .ok_or_else(|| {
                    ScribeError::Codec(format!(
                        "Record batch at offset {} is too short for its header",
                        base_offset
                    ))
                })?;

            Ok(base_offset + i64::from(i32::from_be_bytes(delta.try_into()?)) + 1)
        }
        Some(_) => Ok(base_offset + 1),
        None => Err(ScribeError::Codec(format!(
            "Log entry at offset {} is too short to carry a magic byte",
            base_offset
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use kafka_protocol::records::{
        Compression, RecordBatchEncoder, RecordEncodeOptions, TimestampType,
    };

    /// Start of the CRC and of the CRC-covered region in a record batch.
    const CRC_POSITION: usize = 17;
    const ATTRIBUTES_POSITION: usize = 21;

    fn encode(version: i8, first_offset: i64, values: &[&'static str]) -> BytesMut {
        let records = values
            .iter()
            .enumerate()
            .map(|(i, value)| kafka_protocol::records::Record {
                transactional: false,
                control: false,
                partition_leader_epoch: 0,
                producer_id: -1,
                producer_epoch: -1,
                timestamp_type: TimestampType::Creation,
                offset: first_offset + i as i64,
                sequence: -1,
                timestamp: 1_700_000_000_000,
                key: None,
                value: Some(Bytes::from_static(value.as_bytes())),
                headers: Default::default(),
            })
            .collect::<Vec<_>>();

        let mut buf = BytesMut::new();
        RecordBatchEncoder::encode(
            &mut buf,
            records.iter(),
            &RecordEncodeOptions {
                version,
                compression: Compression::None,
            },
        )
        .expect("");

        buf
    }

    fn encode_batch(first_offset: i64, values: &[&'static str]) -> BytesMut {
        encode(2, first_offset, values)
    }

    #[test]
    fn test_empty_buffer_has_no_records() {
        let decoded = decode_records(Bytes::new()).expect("");

        assert!(decoded.records.is_empty());
        assert_eq!(decoded.next_offset, None);
    }

    #[test]
    fn test_decodes_record_batch() {
        let buf = encode_batch(42, &["a", "b", "c"]);

        let decoded = decode_records(buf.freeze()).expect("");

        assert_eq!(
            decoded.records.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![42, 43, 44]
        );
        assert_eq!(decoded.records[1].payload, Bytes::from_static(b"b"));
        assert_eq!(decoded.records[2].timestamp, 1_700_000_000_000);
        assert!(decoded.records.iter().all(|r| !r.control));
        assert_eq!(decoded.next_offset, Some(45));
    }

    #[test]
    fn test_decodes_consecutive_batches() {
        let mut buf = encode_batch(0, &["first"]);
        buf.extend_from_slice(&encode_batch(1, &["second", "third"]));

        let decoded = decode_records(buf.freeze()).expect("");

        assert_eq!(decoded.records.len(), 3);
        assert_eq!(decoded.records[2].payload, Bytes::from_static(b"third"));
        assert_eq!(decoded.next_offset, Some(3));
    }

    #[test]
    fn test_partial_trailing_batch_is_dropped() {
        let mut buf = encode_batch(10, &["whole"]);
        let second = encode_batch(11, &["cut short"]);
        buf.extend_from_slice(&second[..second.len() - 4]);

        let decoded = decode_records(buf.freeze()).expect("");

        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].offset, 10);
        assert_eq!(decoded.next_offset, Some(11));
    }

    #[test]
    fn test_truncated_header_is_dropped() {
        let mut buf = encode_batch(10, &["whole"]);
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

        let decoded = decode_records(buf.freeze()).expect("");

        assert_eq!(decoded.records.len(), 1);
    }

    #[test]
    fn test_compacted_batch_ends_at_last_offset_delta() {
        // One surviving record at 10 in a batch that originally spanned 10..=11.
        let mut buf = encode_batch(10, &["survivor"]);
        buf[LAST_OFFSET_DELTA_POSITION..LAST_OFFSET_DELTA_POSITION + 4]
            .copy_from_slice(&1i32.to_be_bytes());
        let crc = crc32c::crc32c(&buf[ATTRIBUTES_POSITION..]);
        buf[CRC_POSITION..CRC_POSITION + 4].copy_from_slice(&crc.to_be_bytes());

        let decoded = decode_records(buf.freeze()).expect("");

        assert_eq!(
            decoded.records.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![10]
        );
        assert_eq!(decoded.next_offset, Some(12));
    }

    #[test]
    fn test_decodes_legacy_messages() {
        let mut buf = encode(0, 7, &["v0 value"]);
        buf.extend_from_slice(&encode(1, 8, &["v1 value", "another"]));

        let decoded = decode_records(buf.freeze()).expect("");

        assert_eq!(
            decoded.records.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![7, 8, 9]
        );
        assert_eq!(decoded.records[0].payload, Bytes::from_static(b"v0 value"));
        assert_eq!(decoded.records[1].timestamp, 1_700_000_000_000);
        assert_eq!(decoded.records[1].key, None);
        assert_eq!(decoded.next_offset, Some(10));
    }

    #[test]
    fn test_corrupt_legacy_message_is_rejected() {
        let mut buf = encode(1, 7, &["intact value"]);
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let result = decode_records(buf.freeze());

        assert!(matches!(result, Err(ScribeError::Codec(_))));
    }

    #[test]
    fn test_corrupt_record_batch_is_rejected() {
        let mut buf = encode_batch(7, &["intact value"]);
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let result = decode_records(buf.freeze());

        assert!(matches!(result, Err(ScribeError::Codec(_))));
    }

    #[test]
    fn test_unknown_magic_is_rejected() {
        let mut buf = encode(1, 7, &["value"]);
        buf[MAGIC_POSITION] = 5;

        let result = decode_records(buf.freeze());

        assert!(matches!(result, Err(ScribeError::Codec(_))));
    }
}
