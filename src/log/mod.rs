//! Edit Log Module
//!
//! Append-only segments of opcode-tagged records.
//!
//! ## Responsibilities
//! - Append records before the namespace mutation is acknowledged
//! - CRC32 checksums for corruption detection (checksummed layouts)
//! - Transaction ids for ordering
//! - Strict and recovery-mode scanning
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Layout version (4, big-endian i32)      │
//! ├─────────────────────────────────────────┤
//! │ Record 1                                │
//! │ ┌────┬─────────┬────────┬──────┬──────┐ │
//! │ │ Op │ Len (4) │TxId (8)│ Body │CRC(4)│ │
//! │ └────┴─────────┴────────┴──────┴──────┘ │
//! ├─────────────────────────────────────────┤
//! │ ...                                     │
//! ├─────────────────────────────────────────┤
//! │ 0xFF end marker (clean close)           │
//! │ 0xFF fill ... (optional preallocation)  │
//! └─────────────────────────────────────────┘
//! ```

mod reader;
mod segment;
mod writer;

pub use reader::{LogReader, ScanMode, ScanResult};
pub use segment::{is_fill, segments_equal_ignoring_fill, LayoutVersion, SEGMENT_HEADER_SIZE};
pub use writer::{LogWriter, SyncWrite};
