//! Backtrace descriptor parsing.
//!
//! The instrumentation runtime appends one block per call site to the
//! descriptor: the symbolized frames, one per line, followed by a line
//! holding the 20-digit call-site hash (or several, joined by `.`, for
//! vectorized call sites).
//!
//! ```text
//! ./app(compute+0x2a)[0x401136]
//! ./app(main+0x11)[0x401190]
//! 00000000008812346251
//! ```

use fnv::FnvHasher;
use std::collections::BTreeMap;
use std::hash::Hasher;

const HASH_DIGITS: usize = 20;

/// Call sites recorded by one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacktraceDescriptor {
    /// Call-site hash to the frames that led to it
    pub call_sites: BTreeMap<u64, Vec<String>>,
}

impl BacktraceDescriptor {
    /// Signature shared by runs that went through the same call sites.
    ///
    /// FNV-1a over the sorted hash set, as 16 hex digits. Frame text is
    /// left out since addresses move between runs under ASLR.
    pub fn signature(&self) -> String {
        let mut hasher = FnvHasher::default();
        for hash in self.call_sites.keys() {
            hasher.write(&hash.to_le_bytes());
        }
        format!("{:016x}", hasher.finish())
    }

    pub fn len(&self) -> usize {
        self.call_sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.call_sites.is_empty()
    }
}

/// Parse the content of a backtrace descriptor
///
/// # Errors
/// Returns a description of the problem when a hash line overflows `u64`
/// or when no hash line is present at all.
pub fn parse_descriptor(content: &str) -> Result<BacktraceDescriptor, String> {
    let mut descriptor = BacktraceDescriptor::default();
    let mut frames: Vec<String> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_hash_line(line) {
            Some(Ok(hashes)) => {
                for hash in hashes {
                    descriptor
                        .call_sites
                        .entry(hash)
                        .or_insert_with(|| frames.clone());
                }
                frames.clear();
            }
            Some(Err(e)) => return Err(format!("line {}: {}", line_no + 1, e)),
            None => frames.push(line.to_string()),
        }
    }

    if descriptor.is_empty() {
        return Err("no call-site hash found".to_string());
    }

    Ok(descriptor)
}

/// Recognize a hash terminator line.
///
/// `None` means the line is a frame, not a terminator.
fn parse_hash_line(line: &str) -> Option<Result<Vec<u64>, String>> {
    let end = line
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(line.len());
    let (head, rest) = line.split_at(end);

    // Anything after the hashes must be separator punctuation
    if head.is_empty() || rest.chars().any(|c| c.is_alphanumeric()) {
        return None;
    }

    let groups: Vec<&str> = head.split('.').collect();
    if groups.iter().any(|g| g.len() != HASH_DIGITS) {
        return None;
    }

    Some(
        groups
            .iter()
            .map(|g| {
                g.parse::<u64>()
                    .map_err(|e| format!("invalid call-site hash {}: {}", g, e))
            })
            .collect(),
    )
}
