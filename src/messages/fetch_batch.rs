use super::{BrokerErrorCode, Record};

/// The outcome of one fetch against a single partition.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    /// Records in the order the broker returned them.
    pub records: Vec<Record>,
    /// The partition level error, if the broker reported one.
    pub error: Option<BrokerErrorCode>,
    /// The partition's high watermark, -1 when the broker did not report one.
    pub high_watermark: i64,
    /// The offset following the last complete log entry in the response.
    ///
    /// Can lie past the last record when compaction removed the tail of a batch.
    pub next_offset: Option<i64>,
}

impl FetchBatch {
    /// A batch carrying records and no error.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records,
            error: None,
            high_watermark: -1,
            next_offset: None,
        }
    }

    /// A batch carrying only an error code.
    pub fn with_error(code: BrokerErrorCode) -> Self {
        Self {
            records: vec![],
            error: Some(code),
            high_watermark: -1,
            next_offset: None,
        }
    }

    /// Sets the offset following the batch's last log entry.
    pub fn ending_at(mut self, next_offset: i64) -> Self {
        self.next_offset = Some(next_offset);
        self
    }
}
