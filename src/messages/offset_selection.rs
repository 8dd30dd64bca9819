use std::{fmt::Display, str::FromStr};

use crate::error::ScribeError;

/// The time an offset lookup asks the broker about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSelector {
    /// The oldest offset still retained.
    Earliest,
    /// The offset the next produced record will get.
    Latest,
    /// The first offset whose timestamp is at or after the given unix time in milliseconds.
    Timestamp(i64),
}

impl TimeSelector {
    /// Wire value of the earliest marker.
    pub const EARLIEST_TIMESTAMP: i64 = -2;
    /// Wire value of the latest marker.
    pub const LATEST_TIMESTAMP: i64 = -1;

    /// The timestamp field sent in the offset lookup request.
    pub fn as_timestamp(&self) -> i64 {
        match self {
            Self::Earliest => Self::EARLIEST_TIMESTAMP,
            Self::Latest => Self::LATEST_TIMESTAMP,
            Self::Timestamp(ts) => *ts,
        }
    }
}

/// Where the consume loop positions its cursor, both at startup and after an offset reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSelection {
    /// Ask the broker for the offset at the given time.
    Time(TimeSelector),
    /// Use this offset as is, without asking the broker.
    Explicit(i64),
}

impl Default for OffsetSelection {
    fn default() -> Self {
        Self::Time(TimeSelector::Latest)
    }
}

impl FromStr for OffsetSelection {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScribeError::InvalidOffsetSelection(s.to_string());

        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Time(TimeSelector::Latest)),
            "earliest" => Ok(Self::Time(TimeSelector::Earliest)),
            other => match other.split_once(':') {
                Some(("timestamp", ts)) => {
                    let ts = ts.parse::<i64>().map_err(|_| invalid())?;

                    if ts < 0 {
                        return Err(invalid());
                    }

                    Ok(Self::Time(TimeSelector::Timestamp(ts)))
                }
                Some(("offset", offset)) => {
                    let offset = offset.parse::<i64>().map_err(|_| invalid())?;

                    if offset < 0 {
                        return Err(invalid());
                    }

                    Ok(Self::Explicit(offset))
                }
                _ => Err(invalid()),
            },
        }
    }
}

impl Display for OffsetSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Time(TimeSelector::Latest) => f.write_str("latest"),
            Self::Time(TimeSelector::Earliest) => f.write_str("earliest"),
            Self::Time(TimeSelector::Timestamp(ts)) => write!(f, "timestamp:{}", ts),
            Self::Explicit(offset) => write!(f, "offset:{}", offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_timestamps() {
        assert_eq!(TimeSelector::Latest.as_timestamp(), -1);
        assert_eq!(TimeSelector::Earliest.as_timestamp(), -2);
        assert_eq!(
            TimeSelector::Timestamp(1_700_000_000_000).as_timestamp(),
            1_700_000_000_000
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "latest".parse::<OffsetSelection>().expect(""),
            OffsetSelection::Time(TimeSelector::Latest)
        );
        assert_eq!(
            "EARLIEST".parse::<OffsetSelection>().expect(""),
            OffsetSelection::Time(TimeSelector::Earliest)
        );
        assert_eq!(
            "timestamp:1700000000000".parse::<OffsetSelection>().expect(""),
            OffsetSelection::Time(TimeSelector::Timestamp(1_700_000_000_000))
        );
        assert_eq!(
            "offset:42".parse::<OffsetSelection>().expect(""),
            OffsetSelection::Explicit(42)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "newest", "offset:", "offset:-3", "offset:abc", "timestamp:-5"] {
            assert!(
                matches!(
                    input.parse::<OffsetSelection>(),
                    Err(ScribeError::InvalidOffsetSelection(_))
                ),
                "{input} should not parse"
            );
        }
    }
}
