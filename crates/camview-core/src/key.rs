//! Key partition codec for `YYYY/MM/DD/filename.ext` object keys.
//!
//! The object store is flat; every grouping by year, month or day is derived
//! from this key convention. Nothing in this module performs I/O.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;

/// Separator between partition levels in an object key.
pub const DELIMITER: &str = "/";

/// Suffix of objects that count as videos. Matched exactly and case-sensitively.
pub const MEDIA_SUFFIX: &str = ".mp4";

/// Date rendered for keys that do not follow the partition convention.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Length of the `YYYY/MM/DD/` prefix.
const PREFIX_LEN: usize = 11;

/// Failure to decompose a key into its partitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key does not match `YYYY/MM/DD/name`.
    #[error("key `{0}` does not follow the YYYY/MM/DD/name convention")]
    Unparseable(String),
}

impl From<KeyError> for CoreError {
    fn from(err: KeyError) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

/// A key decomposed into its year/month/day partitions and the trailing filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    /// Four-digit year.
    pub year: u16,
    /// Month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Everything after the day partition.
    pub filename: String,
}

impl PartitionKey {
    /// Decompose `key` into partitions.
    ///
    /// Only keys of at least 11 characters with `/` at offsets 4, 7 and 10,
    /// digits in the date positions and a non-empty filename are accepted.
    pub fn decode(key: &str) -> Result<Self, KeyError> {
        let unparseable = || KeyError::Unparseable(key.to_string());
        let bytes = key.as_bytes();

        if bytes.len() <= PREFIX_LEN
            || bytes[4] != b'/'
            || bytes[7] != b'/'
            || bytes[10] != b'/'
        {
            return Err(unparseable());
        }

        let digits = |range: std::ops::Range<usize>| -> Option<u16> {
            let slice = &bytes[range];
            if !slice.iter().all(u8::is_ascii_digit) {
                return None;
            }
            slice
                .iter()
                .try_fold(0u16, |acc, b| acc.checked_mul(10)?.checked_add(u16::from(b - b'0')))
        };

        let year = digits(0..4).ok_or_else(unparseable)?;
        let month = digits(5..7).ok_or_else(unparseable)?;
        let day = digits(8..10).ok_or_else(unparseable)?;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(unparseable());
        }

        Ok(Self {
            year,
            month: month as u8,
            day: day as u8,
            filename: key[PREFIX_LEN..].to_string(),
        })
    }

    /// Canonical `YYYY/MM/DD/` prefix of this key's day partition.
    pub fn prefix(&self) -> String {
        encode(self.year, self.month, self.day)
    }

    /// `YYYY-MM-DD` rendering of the partition date.
    pub fn date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Calendar date, if the partition names a real day (rejects e.g. 02/31).
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))
    }
}

impl FromStr for PartitionKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.filename)
    }
}

/// Build the zero-padded `YYYY/MM/DD/` prefix used for day-scoped listings.
pub fn encode(year: u16, month: u8, day: u8) -> String {
    format!("{year:04}/{month:02}/{day:02}/")
}

/// Day prefix for a calendar date.
pub fn prefix_for_date(date: NaiveDate) -> String {
    format!(
        "{:04}/{:02}/{:02}/",
        date.year(),
        date.month(),
        date.day()
    )
}

/// True when the key names a video object.
pub fn is_media_key(key: &str) -> bool {
    key.ends_with(MEDIA_SUFFIX)
}

/// `YYYY-MM-DD` for partitioned keys, [`UNKNOWN_DATE`] otherwise.
pub fn derived_date(key: &str) -> String {
    PartitionKey::decode(key)
        .map(|parsed| parsed.date_string())
        .unwrap_or_else(|_| UNKNOWN_DATE.to_string())
}

/// Filename portion of a partitioned key, or the whole key when it is not partitioned.
pub fn display_name(key: &str) -> &str {
    match PartitionKey::decode(key) {
        Ok(_) => &key[PREFIX_LEN..],
        Err(_) => key,
    }
}
