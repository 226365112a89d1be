//! Decoder for the packed binary trace encoding.
//!
//! Record layout (36 bytes, little-endian, no padding between fields):
//!
//! | offset | size | field                          |
//! |--------|------|--------------------------------|
//! | 0      | 4    | size tag (4 or 8)              |
//! | 4      | 8    | timestamp                      |
//! | 12     | 8    | address of the variable        |
//! | 20     | 8    | call-site hash                 |
//! | 28     | 4/8  | `f32` + 4 zero bytes, or `f64` |

use super::schema::{Address, Observation, RecordRange, SizeTag};
use crate::utils::config::BINARY_RECORD_BYTES;
use crate::utils::error::DecodeError;
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Decode the records of `range` from a binary trace file
///
/// # Errors
/// * `DecodeError::Io` - file cannot be opened or read
/// * `DecodeError::EmptyTrace` - file has zero length
/// * `DecodeError::Format` - unknown size tag or truncated record
pub fn decode_binary(path: &Path, range: RecordRange) -> Result<Vec<Observation>, DecodeError> {
    let io_err = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();
    if len == 0 {
        return Err(DecodeError::EmptyTrace(path.to_path_buf()));
    }

    let record_bytes = BINARY_RECORD_BYTES as u64;
    let available = (len / record_bytes).saturating_sub(range.first);
    let wanted = range.count.map_or(available, |count| count.min(available));

    debug!(
        "Decoding {} binary records from {} starting at record {}",
        wanted,
        path.display(),
        range.first
    );

    file.seek(SeekFrom::Start(range.first * record_bytes))
        .map_err(io_err)?;
    let mut reader = BufReader::new(file);

    let mut observations = Vec::with_capacity(wanted as usize);
    let mut buf = [0u8; BINARY_RECORD_BYTES];
    let mut index = range.first;

    while range.count.map_or(true, |count| index - range.first < count) {
        match read_record(&mut reader, &mut buf).map_err(io_err)? {
            RecordRead::Full => {}
            RecordRead::Eof => break,
            RecordRead::Partial(got) => {
                return Err(DecodeError::Format {
                    path: path.to_path_buf(),
                    record: index,
                    reason: format!(
                        "truncated record ({} of {} bytes)",
                        got, BINARY_RECORD_BYTES
                    ),
                });
            }
        }

        let observation = decode_binary_record(&buf).map_err(|reason| DecodeError::Format {
            path: path.to_path_buf(),
            record: index,
            reason,
        })?;
        observations.push(observation);
        index += 1;
    }

    Ok(observations)
}

/// Decode one 36-byte record
///
/// **Public** - used by tests and by the streaming decoder
pub fn decode_binary_record(buf: &[u8; BINARY_RECORD_BYTES]) -> Result<Observation, String> {
    let size = u32::from_le_bytes(field(buf, 0));
    let size_tag =
        SizeTag::from_bytes(size).ok_or_else(|| format!("Unknown size : {}o", size))?;

    let timestamp = u64::from_le_bytes(field(buf, 4));
    let address = Address(u64::from_le_bytes(field(buf, 12)));
    let hash = u64::from_le_bytes(field(buf, 20));
    let value = match size_tag {
        SizeTag::Binary32 => f32::from_le_bytes(field(buf, 28)) as f64,
        SizeTag::Binary64 => f64::from_le_bytes(field(buf, 28)),
    };

    Ok(Observation::new(size_tag, timestamp, address, hash, value))
}

/// Encode one observation as a 36-byte record
///
/// **Public** - used to build fixtures; the analyzer itself never writes traces
pub fn encode_binary_record(observation: &Observation) -> [u8; BINARY_RECORD_BYTES] {
    let mut buf = [0u8; BINARY_RECORD_BYTES];
    buf[0..4].copy_from_slice(&observation.size_tag.bytes().to_le_bytes());
    buf[4..12].copy_from_slice(&observation.timestamp.to_le_bytes());
    buf[12..20].copy_from_slice(&observation.address.0.to_le_bytes());
    buf[20..28].copy_from_slice(&observation.call_site_hash.to_le_bytes());
    match observation.size_tag {
        SizeTag::Binary32 => buf[28..32].copy_from_slice(&(observation.value as f32).to_le_bytes()),
        SizeTag::Binary64 => buf[28..36].copy_from_slice(&observation.value.to_le_bytes()),
    }
    buf
}

fn field<const N: usize>(buf: &[u8; BINARY_RECORD_BYTES], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

enum RecordRead {
    Full,
    Eof,
    Partial(usize),
}

/// Fill `buf` from the reader, telling a clean end of file from a short record
fn read_record(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<RecordRead> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(match filled {
        0 => RecordRead::Eof,
        n if n == buf.len() => RecordRead::Full,
        n => RecordRead::Partial(n),
    })
}
