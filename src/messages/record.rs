use bytes::Bytes;

/// A single log entry decoded from a fetch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Position of this record in the partition.
    pub offset: i64,
    /// The record key, if the producer set one.
    pub key: Option<Bytes>,
    /// The record value. A null value decodes to an empty payload.
    pub payload: Bytes,
    /// Timestamp carried by the record, -1 when the log format has none.
    pub timestamp: i64,
    /// Transaction markers occupy an offset but carry no user data.
    pub control: bool,
}

impl Record {
    /// Creates a plain data record.
    pub fn new(offset: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            offset,
            key: None,
            payload: payload.into(),
            timestamp: -1,
            control: false,
        }
    }

    /// The offset of the record that follows this one.
    #[inline]
    pub fn next_offset(&self) -> i64 {
        self.offset + 1
    }
}
