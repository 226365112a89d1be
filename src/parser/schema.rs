//! Typed records decoded from instrumentation traces.
//!
//! Every observation carries a validated [`SizeTag`], so a record that
//! made it out of the decoder is known to be a 4-byte or 8-byte float.

use crate::utils::config::{SDN_MAX_BITS_BINARY32, SDN_MAX_BITS_BINARY64};
use crate::utils::error::ConfigError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Width of the observed floating-point value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeTag {
    /// IEEE binary32 (`float`)
    Binary32,
    /// IEEE binary64 (`double`)
    Binary64,
}

impl SizeTag {
    /// Build a size tag from the byte count stored in the trace.
    ///
    /// Returns `None` for anything other than 4 or 8.
    pub fn from_bytes(bytes: u32) -> Option<Self> {
        match bytes {
            4 => Some(SizeTag::Binary32),
            8 => Some(SizeTag::Binary64),
            _ => None,
        }
    }

    /// Map the first field of a text record (`binary32`, `binary64`, ...)
    pub fn from_format_token(token: &str) -> Option<Self> {
        if token.contains("32") {
            Some(SizeTag::Binary32)
        } else if token.contains("64") {
            Some(SizeTag::Binary64)
        } else {
            None
        }
    }

    pub fn bytes(self) -> u32 {
        match self {
            SizeTag::Binary32 => 4,
            SizeTag::Binary64 => 8,
        }
    }

    /// Mantissa bits credited when all runs agree exactly
    pub fn max_bits(self) -> u32 {
        match self {
            SizeTag::Binary32 => SDN_MAX_BITS_BINARY32,
            SizeTag::Binary64 => SDN_MAX_BITS_BINARY64,
        }
    }

    /// Token written in the first column of a text record
    pub fn format_token(self) -> &'static str {
        match self {
            SizeTag::Binary32 => "binary32",
            SizeTag::Binary64 => "binary64",
        }
    }
}

impl fmt::Display for SizeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

impl Serialize for SizeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bytes())
    }
}

/// Address of the observed variable.
///
/// Opaque to the analysis; kept so records survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub u64);

impl Address {
    /// Sentinel for a `(nil)` pointer
    pub const NULL: Address = Address(0);

    /// Parse the address column of a text record.
    ///
    /// Accepts `(nil)`, `0x`-prefixed hex and plain hex.
    pub fn parse(token: &str) -> Option<Self> {
        if token == "(nil)" {
            return Some(Address::NULL);
        }
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        u64::from_str_radix(digits, 16).ok().map(Address)
    }

    pub fn is_null(self) -> bool {
        self == Address::NULL
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "(nil)")
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// One observed value at one program point in one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub size_tag: SizeTag,
    /// Microseconds since the epoch when the value was observed
    pub timestamp: u64,
    pub address: Address,
    pub call_site_hash: u64,
    pub value: f64,
}

impl Observation {
    /// Create an observation.
    ///
    /// Binary32 values are rounded through `f32` so that text and binary
    /// traces of the same run decode to identical observations.
    pub fn new(
        size_tag: SizeTag,
        timestamp: u64,
        address: Address,
        call_site_hash: u64,
        value: f64,
    ) -> Self {
        let value = match size_tag {
            SizeTag::Binary32 => value as f32 as f64,
            SizeTag::Binary64 => value,
        };
        Self {
            size_tag,
            timestamp,
            address,
            call_site_hash,
            value,
        }
    }
}

/// On-disk encoding of a trace file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Packed 36-byte records
    #[default]
    Binary,
    /// One whitespace-separated record per line
    Text,
}

impl FromStr for Encoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Encoding::Binary),
            "text" => Ok(Encoding::Text),
            _ => Err(ConfigError::UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Binary => write!(f, "binary"),
            Encoding::Text => write!(f, "text"),
        }
    }
}

/// Contiguous range of records inside one trace file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRange {
    /// Index of the first record in the range
    pub first: u64,
    /// Number of records, `None` meaning "up to end of file"
    pub count: Option<u64>,
}

impl RecordRange {
    /// The whole file
    pub const ALL: RecordRange = RecordRange {
        first: 0,
        count: None,
    };

    /// Whether the record at `index` falls inside the range
    pub fn contains(&self, index: u64) -> bool {
        index >= self.first && self.count.map_or(true, |count| index - self.first < count)
    }

    /// Whether no record at or after `index` can fall inside the range
    pub fn is_past(&self, index: u64) -> bool {
        self.count
            .map_or(false, |count| index >= self.first.saturating_add(count))
    }
}

/// Where a decode pass stopped inside a trace file.
///
/// `offset` always falls on a record boundary, so the next pass can seek
/// straight to it instead of rescanning the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Index of the next record
    pub record: u64,
    /// Byte offset of the next record
    pub offset: u64,
}

impl Cursor {
    pub const START: Cursor = Cursor {
        record: 0,
        offset: 0,
    };
}

/// Records read by one decode pass and where the pass stopped
#[derive(Debug, Clone, PartialEq)]
pub struct TraceWindow {
    pub observations: Vec<Observation>,
    pub next: Cursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_tag_from_bytes() {
        assert_eq!(SizeTag::from_bytes(4), Some(SizeTag::Binary32));
        assert_eq!(SizeTag::from_bytes(8), Some(SizeTag::Binary64));
        assert_eq!(SizeTag::from_bytes(2), None);
        assert_eq!(SizeTag::from_bytes(16), None);
    }

    #[test]
    fn test_size_tag_from_format_token() {
        assert_eq!(SizeTag::from_format_token("binary32"), Some(SizeTag::Binary32));
        assert_eq!(SizeTag::from_format_token("binary64"), Some(SizeTag::Binary64));
        assert_eq!(SizeTag::from_format_token("float"), None);
    }

    #[test]
    fn test_address_parse() {
        assert_eq!(Address::parse("(nil)"), Some(Address::NULL));
        assert_eq!(Address::parse("0x7ffd1234"), Some(Address(0x7ffd_1234)));
        assert_eq!(Address::parse("zz"), None);
        assert_eq!(Address::NULL.to_string(), "(nil)");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("binary".parse::<Encoding>().unwrap(), Encoding::Binary);
        assert_eq!("TEXT".parse::<Encoding>().unwrap(), Encoding::Text);
        assert!("json".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_binary32_value_is_rounded() {
        let obs = Observation::new(SizeTag::Binary32, 0, Address::NULL, 1, 0.1);
        assert_eq!(obs.value, 0.1f32 as f64);
    }

    #[test]
    fn test_record_range() {
        let range = RecordRange { first: 10, count: Some(5) };
        assert!(!range.contains(9));
        assert!(range.contains(10));
        assert!(range.contains(14));
        assert!(!range.contains(15));
        assert!(range.is_past(15));
        assert!(!RecordRange::ALL.is_past(u64::MAX));
    }
}
