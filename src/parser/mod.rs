//! Trace decoding and record definitions.
//!
//! This module handles:
//! - Decoding packed binary traces
//! - Decoding text traces with hex-float values
//! - Defining the typed observation records

pub mod binary;
pub mod schema;
pub mod text;

use crate::utils::config::BINARY_RECORD_BYTES;
use crate::utils::error::DecodeError;
use std::path::Path;

// Re-export main types
pub use binary::{decode_binary, decode_binary_record, encode_binary_record};
pub use schema::{Address, Cursor, Encoding, Observation, RecordRange, SizeTag, TraceWindow};
pub use text::{
    decode_text, decode_text_window, format_hex_float, parse_hex_float, parse_text_record,
    write_text_record,
};

/// Decode a trace from byte `offset` to end of file
///
/// **Public** - main entry point for whole-file decoding
///
/// For binary traces the offset must fall on a record boundary.
pub fn decode(path: &Path, encoding: Encoding, offset: u64) -> Result<Vec<Observation>, DecodeError> {
    match encoding {
        Encoding::Binary => {
            let record_bytes = BINARY_RECORD_BYTES as u64;
            if offset % record_bytes != 0 {
                return Err(DecodeError::Format {
                    path: path.to_path_buf(),
                    record: offset / record_bytes,
                    reason: format!("offset {} is not on a record boundary", offset),
                });
            }
            decode_binary(
                path,
                RecordRange {
                    first: offset / record_bytes,
                    count: None,
                },
            )
        }
        Encoding::Text => text::decode_text_from_offset(path, offset),
    }
}

/// Decode only the records inside `range`
///
/// **Public** - used by the aggregator for each slice
pub fn decode_range(
    path: &Path,
    encoding: Encoding,
    range: RecordRange,
) -> Result<Vec<Observation>, DecodeError> {
    match encoding {
        Encoding::Binary => decode_binary(path, range),
        Encoding::Text => decode_text(path, range),
    }
}

/// Decode up to `count` records from `start`, reporting where to resume
///
/// **Public** - used by the aggregator so that every slice picks up where
/// the previous one stopped
pub fn decode_window(
    path: &Path,
    encoding: Encoding,
    start: Cursor,
    count: Option<u64>,
) -> Result<TraceWindow, DecodeError> {
    match encoding {
        Encoding::Binary => {
            let observations = decode_binary(
                path,
                RecordRange {
                    first: start.record,
                    count,
                },
            )?;
            let record = start.record + observations.len() as u64;
            Ok(TraceWindow {
                observations,
                next: Cursor {
                    record,
                    offset: record * BINARY_RECORD_BYTES as u64,
                },
            })
        }
        Encoding::Text => text::decode_text_window(path, start, count),
    }
}
