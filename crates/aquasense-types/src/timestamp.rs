//! Backend timestamp handling.
//!
//! The backend emits timestamps in two shapes: RFC 3339 with an explicit
//! offset, or naive ISO-8601 wall-clock values such as
//! `2024-05-01T10:15:00.123456`. Naive values carry no zone, so they are
//! interpreted in whatever display offset the consumer uses (which is how a
//! browser treats them).

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{ParseError, ParseResult};

/// A timestamp as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendTime {
    /// Timestamp with an explicit UTC offset.
    Zoned(OffsetDateTime),
    /// Wall-clock timestamp without zone information.
    Naive(PrimitiveDateTime),
}

impl BackendTime {
    /// Parse either an RFC 3339 or a naive ISO-8601 timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use aquasense_types::BackendTime;
    ///
    /// assert!(BackendTime::parse("2024-05-01T10:15:00+07:00").is_ok());
    /// assert!(BackendTime::parse("2024-05-01T10:15:00.123456").is_ok());
    /// assert!(BackendTime::parse("yesterday").is_err());
    /// ```
    pub fn parse(input: &str) -> ParseResult<Self> {
        let input = input.trim();
        if let Ok(zoned) = OffsetDateTime::parse(input, &Rfc3339) {
            return Ok(BackendTime::Zoned(zoned));
        }

        let naive_format = format_description!(
            "[year]-[month]-[day][first [T] [ ]][hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(input, &naive_format)
            .map(BackendTime::Naive)
            .map_err(|_| ParseError::InvalidTimestamp(input.to_string()))
    }

    /// Resolve the timestamp to an instant shown at `offset`.
    ///
    /// Zoned timestamps are converted; naive timestamps are assumed to
    /// already be wall-clock time at `offset`.
    #[must_use]
    pub fn at_offset(self, offset: UtcOffset) -> OffsetDateTime {
        match self {
            BackendTime::Zoned(t) => t.to_offset(offset),
            BackendTime::Naive(t) => t.assume_offset(offset),
        }
    }
}

impl fmt::Display for BackendTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendTime::Zoned(t) => match t.format(&Rfc3339) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{t}"),
            },
            BackendTime::Naive(t) => {
                let naive_format =
                    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
                match t.format(&naive_format) {
                    Ok(s) => f.write_str(&s),
                    Err(_) => write!(f, "{t}"),
                }
            }
        }
    }
}

impl Serialize for BackendTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BackendTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BackendTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}
