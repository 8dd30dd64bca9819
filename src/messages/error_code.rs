use std::fmt::Display;

/// What a consumer does about a [`BrokerErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-position the cursor before fetching again.
    ResetOffset,
    /// Wait and repeat the same fetch.
    Retry,
    /// Give up; operator action is needed.
    Fail,
}

/// Partition level error codes a broker can report, as far as this consumer tells them apart.
///
/// Code `0` means "no error" and is represented by the absence of a code, see [`BrokerErrorCode::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerErrorCode {
    /// The server experienced an unexpected error.
    UnknownServerError,
    /// The requested offset is not within the range of offsets retained by the broker.
    OffsetOutOfRange,
    /// The message failed its CRC check or is otherwise corrupt.
    CorruptMessage,
    /// The broker does not host this topic/partition.
    UnknownTopicOrPartition,
    /// The requested fetch size is invalid.
    InvalidFetchSize,
    /// The partition has no leader right now, usually during an election.
    LeaderNotAvailable,
    /// The broker is not the leader (or a follower) for the partition.
    NotLeaderOrFollower,
    /// The request timed out on the broker.
    RequestTimedOut,
    /// The broker is not available.
    BrokerNotAvailable,
    /// The replica is not available for the requested partition.
    ReplicaNotAvailable,
    /// The message is larger than the broker allows.
    MessageTooLarge,
    /// The controller moved to another broker.
    StaleControllerEpoch,
    /// The offset commit metadata was too large.
    OffsetMetadataTooLarge,
    /// The broker disconnected before a response was produced.
    NetworkException,
    /// The client is not authorized to read the topic.
    TopicAuthorizationFailed,
    /// The broker does not support the request version.
    UnsupportedVersion,
    /// The broker failed to access its log directory.
    KafkaStorageError,
    /// The leader epoch in the request is older than the broker's.
    FencedLeaderEpoch,
    /// The leader epoch in the request is newer than the broker's.
    UnknownLeaderEpoch,
    /// The leader high watermark has not caught up yet.
    OffsetNotAvailable,
    /// Any code this consumer does not distinguish.
    Other(i16),
}

impl BrokerErrorCode {
    /// Maps a wire error code, returning `None` for `0` (no error).
    pub fn from_code(code: i16) -> Option<Self> {
        let code = match code {
            0 => return None,
            -1 => Self::UnknownServerError,
            1 => Self::OffsetOutOfRange,
            2 => Self::CorruptMessage,
            3 => Self::UnknownTopicOrPartition,
            4 => Self::InvalidFetchSize,
            5 => Self::LeaderNotAvailable,
            6 => Self::NotLeaderOrFollower,
            7 => Self::RequestTimedOut,
            8 => Self::BrokerNotAvailable,
            9 => Self::ReplicaNotAvailable,
            10 => Self::MessageTooLarge,
            11 => Self::StaleControllerEpoch,
            12 => Self::OffsetMetadataTooLarge,
            13 => Self::NetworkException,
            29 => Self::TopicAuthorizationFailed,
            35 => Self::UnsupportedVersion,
            56 => Self::KafkaStorageError,
            74 => Self::FencedLeaderEpoch,
            75 => Self::UnknownLeaderEpoch,
            78 => Self::OffsetNotAvailable,
            other => Self::Other(other),
        };

        Some(code)
    }

    /// The wire representation of this code.
    pub fn code(&self) -> i16 {
        match self {
            Self::UnknownServerError => -1,
            Self::OffsetOutOfRange => 1,
            Self::CorruptMessage => 2,
            Self::UnknownTopicOrPartition => 3,
            Self::InvalidFetchSize => 4,
            Self::LeaderNotAvailable => 5,
            Self::NotLeaderOrFollower => 6,
            Self::RequestTimedOut => 7,
            Self::BrokerNotAvailable => 8,
            Self::ReplicaNotAvailable => 9,
            Self::MessageTooLarge => 10,
            Self::StaleControllerEpoch => 11,
            Self::OffsetMetadataTooLarge => 12,
            Self::NetworkException => 13,
            Self::TopicAuthorizationFailed => 29,
            Self::UnsupportedVersion => 35,
            Self::KafkaStorageError => 56,
            Self::FencedLeaderEpoch => 74,
            Self::UnknownLeaderEpoch => 75,
            Self::OffsetNotAvailable => 78,
            Self::Other(code) => *code,
        }
    }

    /// How a consumer gets past this code.
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::OffsetOutOfRange => Recovery::ResetOffset,
            Self::UnknownTopicOrPartition
            | Self::LeaderNotAvailable
            | Self::NotLeaderOrFollower
            | Self::RequestTimedOut
            | Self::BrokerNotAvailable
            | Self::ReplicaNotAvailable
            | Self::NetworkException
            | Self::KafkaStorageError
            | Self::FencedLeaderEpoch
            | Self::UnknownLeaderEpoch
            | Self::OffsetNotAvailable => Recovery::Retry,
            Self::UnknownServerError
            | Self::CorruptMessage
            | Self::InvalidFetchSize
            | Self::MessageTooLarge
            | Self::StaleControllerEpoch
            | Self::OffsetMetadataTooLarge
            | Self::TopicAuthorizationFailed
            | Self::UnsupportedVersion
            | Self::Other(_) => Recovery::Fail,
        }
    }
}

impl Display for BrokerErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(code) => write!(f, "unrecognised error code {}", code),
            known => write!(f, "{:?} ({})", known, known.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_no_error() {
        assert_eq!(BrokerErrorCode::from_code(0), None);
    }

    #[test]
    fn test_known_codes_map_back_to_wire_value() {
        for code in [-1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 29, 35, 56, 74, 75, 78] {
            let mapped = BrokerErrorCode::from_code(code).expect("");

            assert!(!matches!(mapped, BrokerErrorCode::Other(_)));
            assert_eq!(mapped.code(), code);
        }
    }

    #[test]
    fn test_unrecognised_code_is_kept() {
        let mapped = BrokerErrorCode::from_code(87);

        assert_eq!(mapped, Some(BrokerErrorCode::Other(87)));
        assert_eq!(mapped.expect("").code(), 87);
        assert_eq!(mapped.expect("").recovery(), Recovery::Fail);
    }

    #[test]
    fn test_recovery() {
        assert_eq!(
            BrokerErrorCode::OffsetOutOfRange.recovery(),
            Recovery::ResetOffset
        );
        assert_eq!(
            BrokerErrorCode::FencedLeaderEpoch.recovery(),
            Recovery::Retry
        );
        assert_eq!(
            BrokerErrorCode::TopicAuthorizationFailed.recovery(),
            Recovery::Fail
        );
        assert_eq!(BrokerErrorCode::Other(-42).recovery(), Recovery::Fail);
    }

    #[test]
    fn test_offset_out_of_range_is_reset_not_retried() {
        assert_ne!(BrokerErrorCode::OffsetOutOfRange.recovery(), Recovery::Retry);
        assert_eq!(
            BrokerErrorCode::LeaderNotAvailable.recovery(),
            Recovery::Retry
        );
        assert_eq!(
            BrokerErrorCode::NotLeaderOrFollower.recovery(),
            Recovery::Retry
        );
        assert_eq!(BrokerErrorCode::CorruptMessage.recovery(), Recovery::Fail);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BrokerErrorCode::OffsetOutOfRange.to_string(),
            "OffsetOutOfRange (1)"
        );
        assert_eq!(
            BrokerErrorCode::Other(99).to_string(),
            "unrecognised error code 99"
        );
    }
}
