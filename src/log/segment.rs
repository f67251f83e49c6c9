//! Segment framing
//!
//! A segment is a 4-byte layout version followed by records, optionally
//! terminated by an OP_INVALID end marker and INVALID fill bytes.

use serde::{Deserialize, Serialize};

use crate::opcode::INVALID_BYTE;

/// Header size: layout version (4)
pub const SEGMENT_HEADER_SIZE: usize = 4;

/// On-disk layout version, written big-endian as the segment header.
/// Versions are negative and decrease as the format evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutVersion(pub i32);

impl LayoutVersion {
    /// Records carry a transaction id but no checksum
    pub const UNCHECKSUMMED: LayoutVersion = LayoutVersion(-38);

    /// Records carry a transaction id and a trailing CRC32
    pub const CHECKSUMMED: LayoutVersion = LayoutVersion(-40);

    pub const CURRENT: LayoutVersion = Self::CHECKSUMMED;

    /// Every version this crate reads and writes
    pub const SUPPORTED: [LayoutVersion; 2] = [Self::UNCHECKSUMMED, Self::CHECKSUMMED];

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    pub fn has_checksum(self) -> bool {
        self.0 <= Self::CHECKSUMMED.0
    }

    pub fn header_bytes(self) -> [u8; SEGMENT_HEADER_SIZE] {
        self.0.to_be_bytes()
    }

    /// Parse the header from the front of a segment, if enough bytes exist
    pub fn from_header(bytes: &[u8]) -> Option<Self> {
        let header: [u8; SEGMENT_HEADER_SIZE] = bytes.get(..SEGMENT_HEADER_SIZE)?.try_into().ok()?;
        Some(LayoutVersion(i32::from_be_bytes(header)))
    }
}

impl std::fmt::Display for LayoutVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True if every byte is INVALID fill
pub fn is_fill(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == INVALID_BYTE)
}

/// Compare two binary segments, ignoring trailing INVALID fill
///
/// The shorter segment must be a prefix of the longer one, and every byte
/// the longer one carries beyond that prefix must be fill.
pub fn segments_equal_ignoring_fill(a: &[u8], b: &[u8]) -> bool {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    large.starts_with(small) && is_fill(&large[small.len()..])
}
