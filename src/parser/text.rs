//! Decoder for the line-oriented text trace encoding.
//!
//! Each line holds `<format> <time> <hash> <address> <value>`, where the
//! value is a C99 hexadecimal float (`%a`), e.g.
//!
//! ```text
//! binary64 1699999999000001 8812346251 0x7ffc8a1c 0x1.921fb54442d18p+1
//! ```

use super::schema::{Address, Cursor, Observation, RecordRange, SizeTag, TraceWindow};
use crate::utils::config::TEXT_COMMENT_MARKER;
use crate::utils::error::DecodeError;
use log::debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;

/// Decode the records of `range` from a text trace file.
///
/// Ranges count records, not bytes: comment and blank lines are skipped
/// and do not take an index.
pub fn decode_text(path: &Path, range: RecordRange) -> Result<Vec<Observation>, DecodeError> {
    let reader = open_text(path, 0)?;
    debug!(
        "Decoding text records from {} starting at record {}",
        path.display(),
        range.first
    );
    collect_records(path, reader, range, 0).map(|(observations, _)| observations)
}

/// Decode every record starting at byte `offset` up to end of file.
///
/// An offset landing inside a line skips the rest of that line, so the
/// first decoded record is always a complete one.
pub fn decode_text_from_offset(path: &Path, offset: u64) -> Result<Vec<Observation>, DecodeError> {
    let reader = open_text(path, offset)?;
    collect_records(path, reader, RecordRange::ALL, 0).map(|(observations, _)| observations)
}

/// Decode up to `count` records starting at `start`.
///
/// `start` must come from a previous window (or be [`Cursor::START`]):
/// the file is read from `start.offset` on, never from its beginning.
pub fn decode_text_window(
    path: &Path,
    start: Cursor,
    count: Option<u64>,
) -> Result<TraceWindow, DecodeError> {
    let reader = open_text(path, start.offset)?;
    debug!(
        "Decoding text records from {} at byte {} (record {})",
        path.display(),
        start.offset,
        start.record
    );
    let range = RecordRange { first: 0, count };
    let (observations, consumed) = collect_records(path, reader, range, start.record)?;
    let next = Cursor {
        record: start.record + observations.len() as u64,
        offset: start.offset + consumed,
    };
    Ok(TraceWindow { observations, next })
}

fn open_text(path: &Path, offset: u64) -> Result<BufReader<File>, DecodeError> {
    let io_err = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    if file.metadata().map_err(io_err)?.len() == 0 {
        return Err(DecodeError::EmptyTrace(path.to_path_buf()));
    }

    if offset == 0 {
        return Ok(BufReader::new(file));
    }

    // Look at the byte before the offset to know whether we start mid-line
    file.seek(SeekFrom::Start(offset - 1)).map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let mut previous = [0u8; 1];
    let at_line_start = match io::Read::read(&mut reader, &mut previous).map_err(io_err)? {
        0 => true,
        _ => previous[0] == b'\n',
    };
    if !at_line_start {
        let mut partial = Vec::new();
        reader.read_until(b'\n', &mut partial).map_err(io_err)?;
    }
    Ok(reader)
}

/// Read the records of `range`, numbering them from `base`.
///
/// Returns the records and the bytes consumed up to the end of the last
/// line read. Reading stops right after the last wanted record.
fn collect_records(
    path: &Path,
    mut reader: impl BufRead,
    range: RecordRange,
    base: u64,
) -> Result<(Vec<Observation>, u64), DecodeError> {
    let mut observations = Vec::new();
    let mut line = Vec::new();
    let mut index: u64 = 0;
    let mut consumed: u64 = 0;

    loop {
        if range.is_past(index) {
            break;
        }

        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| DecodeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        consumed += read as u64;

        let format_err = |reason: String| DecodeError::Format {
            path: path.to_path_buf(),
            record: base + index,
            reason,
        };

        let text = std::str::from_utf8(&line)
            .map_err(|e| format_err(format!("line is not valid UTF-8: {}", e)))?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with(TEXT_COMMENT_MARKER) {
            continue;
        }

        if range.contains(index) {
            observations.push(parse_text_record(trimmed).map_err(format_err)?);
        }
        index += 1;
    }

    Ok((observations, consumed))
}

/// Parse one text record
///
/// **Public** - exposed for tests and tooling
pub fn parse_text_record(line: &str) -> Result<Observation, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [format, time, hash, address, value] = fields.as_slice() else {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    };

    if format.starts_with("int") {
        return Err(format!("integer format {} is not supported, expected binary32 or binary64", format));
    }
    let size_tag =
        SizeTag::from_format_token(format).ok_or_else(|| format!("unknown format {}", format))?;

    let timestamp = time
        .parse::<u64>()
        .map_err(|e| format!("invalid time {}: {}", time, e))?;
    let call_site_hash = hash
        .parse::<u64>()
        .map_err(|e| format!("invalid hash {}: {}", hash, e))?;
    let address = Address::parse(address).ok_or_else(|| format!("invalid address {}", address))?;
    let value = parse_hex_float(value)?;

    Ok(Observation::new(
        size_tag,
        timestamp,
        address,
        call_site_hash,
        value,
    ))
}

/// Parse a C99 hexadecimal floating-point literal
///
/// Accepts `[+-]0x<hex>[.<hex>][p[+-]<dec>]` as well as `inf` and `nan`.
pub fn parse_hex_float(literal: &str) -> Result<f64, String> {
    let invalid = || format!("invalid hex float {}", literal);

    let (negative, body) = match literal.as_bytes().first() {
        Some(b'-') => (true, &literal[1..]),
        Some(b'+') => (false, &literal[1..]),
        _ => (false, literal),
    };
    let sign = if negative { -1.0 } else { 1.0 };

    let lower = body.to_ascii_lowercase();
    match lower.as_str() {
        "inf" | "infinity" => return Ok(sign * f64::INFINITY),
        "nan" => return Ok(f64::NAN),
        _ => {}
    }

    let digits = lower.strip_prefix("0x").ok_or_else(invalid)?;
    let (mantissa_part, exponent) = match digits.split_once('p') {
        Some((m, e)) => (m, e.parse::<i32>().map_err(|_| invalid())?),
        None => (digits, 0),
    };
    let (int_part, frac_part) = mantissa_part.split_once('.').unwrap_or((mantissa_part, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }

    // Keep at most 15 significant hex digits (57 to 60 bits) in the
    // accumulator. Extra digits only shift the exponent, and any nonzero one
    // sets the lowest bit as a sticky bit, several places below the last
    // bit an f64 keeps, so the final conversion rounds to nearest.
    // Subnormal results may still round twice.
    let mut mantissa: u64 = 0;
    let mut kept: u32 = 0;
    let mut sticky = false;
    let mut shift: i32 = exponent;
    for (is_frac, c) in int_part
        .chars()
        .map(|c| (false, c))
        .chain(frac_part.chars().map(|c| (true, c)))
    {
        let digit = c.to_digit(16).ok_or_else(invalid)? as u64;
        if kept < 15 {
            if mantissa != 0 || digit != 0 {
                kept += 1;
            }
            mantissa = mantissa * 16 + digit;
            if is_frac {
                shift -= 4;
            }
        } else {
            sticky |= digit != 0;
            if !is_frac {
                shift += 4;
            }
        }
    }
    if sticky {
        mantissa |= 1;
    }

    Ok(sign * scale_by_pow2(mantissa as f64, shift))
}

/// `x * 2^exp` without overflowing the intermediate power
fn scale_by_pow2(mut x: f64, mut exp: i32) -> f64 {
    while exp > 1000 {
        x *= 2f64.powi(1000);
        exp -= 1000;
    }
    while exp < -1000 {
        x *= 2f64.powi(-1000);
        exp += 1000;
    }
    x * 2f64.powi(exp)
}

/// Write one observation as a text record
///
/// **Public** - used to build fixtures
pub fn write_text_record(writer: &mut impl Write, observation: &Observation) -> io::Result<()> {
    writeln!(
        writer,
        "{} {} {} {} {}",
        observation.size_tag.format_token(),
        observation.timestamp,
        observation.call_site_hash,
        observation.address,
        format_hex_float(observation.value)
    )
}

/// Format a float the way `%a` does for normal numbers
pub fn format_hex_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    if value == 0.0 {
        return format!("{}0x0p+0", sign);
    }

    let bits = value.to_bits();
    let raw_exponent = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (lead, exponent) = if raw_exponent == 0 {
        (0, -1022)
    } else {
        (1, raw_exponent - 1023)
    };
    format!("{}0x{}.{:013x}p{:+}", sign, lead, fraction, exponent)
}
