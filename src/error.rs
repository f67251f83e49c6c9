//! Error types for editlog
//!
//! Provides a unified error type for all operations, plus the cloneable
//! `DecodeError` that the log reader records in its scan results.

use thiserror::Error;

/// Result type alias using EditLogError
pub type Result<T> = std::result::Result<T, EditLogError>;

/// Unified error type for edit log operations
#[derive(Debug, Error)]
pub enum EditLogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Log Format Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported log format version: {version}")]
    UnsupportedFormat { version: i32 },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Log write failed: {0}")]
    Write(String),

    // -------------------------------------------------------------------------
    // Transcoding Errors
    // -------------------------------------------------------------------------
    #[error("Textual form error: {0}")]
    Text(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Checkpoint Errors
    // -------------------------------------------------------------------------
    #[error("Checkpoint round aborted: {outcome}")]
    IncompleteCheckpoint { outcome: String },

    #[error("Transfer error: {0}")]
    Transfer(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EditLogError {
    fn from(e: serde_json::Error) -> Self {
        EditLogError::Text(e.to_string())
    }
}

impl From<bincode::Error> for EditLogError {
    fn from(e: bincode::Error) -> Self {
        EditLogError::Serialization(e.to_string())
    }
}

/// A malformed record, located by the absolute offset of its first byte
///
/// The offset names the record, not the damaged byte within it: a flipped
/// body byte and a bad checksum both report where the record starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode error in record starting at offset {offset}: {kind}")]
pub struct DecodeError {
    /// Offset of the first byte of the record that failed to decode
    pub offset: u64,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(offset: u64, kind: DecodeErrorKind) -> Self {
        Self { offset, kind }
    }

    /// True if the segment simply ran out of bytes mid-record
    pub fn is_truncation(&self) -> bool {
        matches!(self.kind, DecodeErrorKind::Truncated { .. })
    }
}

/// Why a record failed to decode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("segment ends mid-record (needed {needed} bytes, {available} available)")]
    Truncated { needed: usize, available: usize },

    #[error("checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("transaction id {found} follows {last}")]
    OutOfOrder { last: u64, found: u64 },

    #[error("non-fill bytes after end-of-segment marker")]
    TrailingGarbage,

    #[error("unsupported layout version {0}")]
    UnsupportedVersion(i32),
}
