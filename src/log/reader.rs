//! Log Reader
//!
//! Sequential scanner over a binary segment, feeding decoded records to a
//! visitor.
//!
//! ## Scan State Machine
//! ```text
//!            ┌──────────── record emitted ───────────┐
//!            ▼                                       │
//!   ──▶ Scanning ──────────────────────────────────────┘
//!        │   │ end marker / clean end of buffer ──▶ Done
//!        │   │
//!        │   └─ decode error ─┬─ strict ────────────▶ Fatal
//!        │                    └─ recovery ──▶ RecoverySearch
//!        │                                      │  found run ──▶ Scanning
//!        │                                      └─ exhausted ──▶ Done
//! ```
//!
//! In recovery mode the search advances byte by byte from the failure and
//! accepts the smallest offset where `min_resync_run` consecutive records
//! decode with non-decreasing transaction ids (or a run ends on a clean
//! end-of-segment marker). A lone decodable record is never trusted.

use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::{Config, RecoveryConfig};
use crate::error::{DecodeError, DecodeErrorKind, EditLogError, Result};
use crate::opcode::INVALID_BYTE;
use crate::record::{decode_record, Record};
use crate::visitor::{LogVisitor, RecordCollector};

use super::segment::is_fill;
use super::{LayoutVersion, SEGMENT_HEADER_SIZE};

/// How a scan reacts to a malformed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Stop at the first decode failure
    Strict,
    /// Skip past damage and resume at the next trustworthy record boundary
    Recovery,
}

/// Outcome of scanning a segment
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub mode: ScanMode,

    /// Layout version the records were decoded with
    pub layout_version: LayoutVersion,

    /// Number of records handed to the visitor
    pub records_consumed: u64,

    /// End of the trusted byte range `[0, trusted_end)`: the end offset of
    /// the last emitted record (or of the header when none was emitted)
    pub trusted_end: u64,

    /// Whether recovery had to skip or give up on any bytes
    pub recovery_invoked: bool,

    /// The first decode failure, if any, located at the start of the
    /// record that failed
    pub first_error: Option<DecodeError>,

    /// Transaction id of the last emitted record
    pub last_txid: Option<u64>,

    /// Whether the segment ended with an end-of-segment marker
    pub cleanly_closed: bool,

    /// Byte ranges skipped while resynchronizing
    pub skipped: Vec<Range<u64>>,
}

impl ScanResult {
    fn new(mode: ScanMode, layout_version: LayoutVersion) -> Self {
        Self {
            mode,
            layout_version,
            records_consumed: 0,
            trusted_end: 0,
            recovery_invoked: false,
            first_error: None,
            last_txid: None,
            cleanly_closed: false,
            skipped: Vec::new(),
        }
    }

    pub fn trusted_range(&self) -> Range<u64> {
        0..self.trusted_end
    }

    /// A strict scan that stopped on a decode failure
    pub fn is_fatal(&self) -> bool {
        self.mode == ScanMode::Strict && self.first_error.is_some()
    }

    /// Turn a fatal scan into its decode error
    pub fn check(self) -> Result<Self> {
        match (&self.first_error, self.mode) {
            (Some(e), ScanMode::Strict) => Err(EditLogError::Decode(e.clone())),
            _ => Ok(self),
        }
    }
}

enum ScanState {
    Scanning,
    RecoverySearch { from: usize },
    Done,
    Fatal,
}

/// Reads records from a segment held in memory
pub struct LogReader {
    data: Bytes,
    recovery: RecoveryConfig,
    require_end_marker: bool,
}

impl LogReader {
    /// Open a finalized segment file
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        debug!(path = %path.display(), bytes = data.len(), "Opened log segment for reading");
        Ok(Self::from_bytes(data, config))
    }

    /// Open a segment that is still being written, reading only the prefix
    /// the writer has confirmed durable
    pub fn open_in_progress(path: &Path, flushed_offset: u64, config: &Config) -> Result<Self> {
        let mut data = Vec::new();
        File::open(path)?
            .take(flushed_offset)
            .read_to_end(&mut data)?;
        debug!(path = %path.display(), flushed_offset, "Opened in-progress log segment");
        let mut reader = Self::from_bytes(data, config);
        reader.require_end_marker = false;
        Ok(reader)
    }

    pub fn from_bytes(data: impl Into<Bytes>, config: &Config) -> Self {
        Self {
            data: data.into(),
            recovery: config.recovery,
            require_end_marker: config.require_end_marker,
        }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode every record into memory
    pub fn read_all(&self, mode: ScanMode) -> Result<(Vec<Record>, ScanResult)> {
        let mut collector = RecordCollector::new();
        let result = self.scan(mode, &mut collector)?;
        Ok((collector.into_records(), result))
    }

    /// Walk the segment, handing each record to `visitor`
    ///
    /// A strict scan over an unsupported layout version fails before the
    /// visitor is opened. Otherwise `on_close` always runs, and decode
    /// failures are reported through the returned `ScanResult` rather than
    /// as `Err`; use `ScanResult::check` to treat a fatal scan as an error.
    pub fn scan<V: LogVisitor>(&self, mode: ScanMode, mut visitor: V) -> Result<ScanResult> {
        let mut result = self.read_header(mode)?;
        visitor.on_open(result.layout_version)?;

        match self.run(&mut result, &mut visitor) {
            Ok(()) => {
                visitor.on_close(result.first_error.as_ref())?;
                Ok(result)
            }
            Err(e) => {
                // The visitor failed mid-stream; still let it release its output
                if let Err(close_err) = visitor.on_close(result.first_error.as_ref()) {
                    warn!(error = %close_err, "Visitor failed to close after scan error");
                }
                Err(e)
            }
        }
    }

    fn read_header(&self, mode: ScanMode) -> Result<ScanResult> {
        match LayoutVersion::from_header(&self.data) {
            Some(version) if version.is_supported() => {
                let mut result = ScanResult::new(mode, version);
                result.trusted_end = SEGMENT_HEADER_SIZE as u64;
                Ok(result)
            }
            found => {
                let kind = match found {
                    Some(version) => DecodeErrorKind::UnsupportedVersion(version.0),
                    None => DecodeErrorKind::Truncated {
                        needed: SEGMENT_HEADER_SIZE,
                        available: self.data.len(),
                    },
                };
                if mode == ScanMode::Strict {
                    return Err(match found {
                        Some(version) => EditLogError::UnsupportedFormat { version: version.0 },
                        None => EditLogError::Decode(DecodeError::new(0, kind)),
                    });
                }
                warn!(?kind, "Unreadable segment header, assuming current layout");
                let mut result = ScanResult::new(mode, LayoutVersion::CURRENT);
                result.recovery_invoked = true;
                result.first_error = Some(DecodeError::new(0, kind));
                Ok(result)
            }
        }
    }

    fn run<V: LogVisitor>(&self, result: &mut ScanResult, visitor: &mut V) -> Result<()> {
        let data = &self.data[..];
        let version = result.layout_version;
        let mut pos = SEGMENT_HEADER_SIZE.min(data.len());
        let mut state = ScanState::Scanning;

        loop {
            state = match state {
                ScanState::Scanning => {
                    match self.next_record(data, pos, result) {
                        Ok(Some((record, used))) => {
                            visitor.consume(&record)?;
                            pos += used;
                            result.records_consumed += 1;
                            result.trusted_end = pos as u64;
                            result.last_txid = Some(record.txid);
                            ScanState::Scanning
                        }
                        Ok(None) => ScanState::Done,
                        Err(e) => {
                            warn!(
                                offset = e.offset,
                                last_txid = ?result.last_txid,
                                error = %e.kind,
                                "Failed to decode log record"
                            );
                            let from = e.offset as usize + 1;
                            if result.first_error.is_none() {
                                result.first_error = Some(e);
                            }
                            match result.mode {
                                ScanMode::Strict => ScanState::Fatal,
                                ScanMode::Recovery => {
                                    result.recovery_invoked = true;
                                    ScanState::RecoverySearch { from }
                                }
                            }
                        }
                    }
                }
                ScanState::RecoverySearch { from } => {
                    match resync(data, from, result.last_txid, version, &self.recovery) {
                        Some(found) => {
                            debug!(from = from - 1, resumed_at = found, "Resynchronized log scan");
                            result.skipped.push((from - 1) as u64..found as u64);
                            pos = found;
                            ScanState::Scanning
                        }
                        None => {
                            warn!(
                                from = from - 1,
                                trusted_end = result.trusted_end,
                                "No resynchronization point found, ending scan"
                            );
                            result.skipped.push((from - 1) as u64..data.len() as u64);
                            ScanState::Done
                        }
                    }
                }
                ScanState::Done | ScanState::Fatal => return Ok(()),
            };
        }
    }

    /// Decode the record at `pos`; `Ok(None)` at a clean end of segment
    fn next_record(
        &self,
        data: &[u8],
        pos: usize,
        result: &mut ScanResult,
    ) -> std::result::Result<Option<(Record, usize)>, DecodeError> {
        if pos >= data.len() {
            if result.mode == ScanMode::Strict && self.require_end_marker {
                return Err(DecodeError::new(
                    pos as u64,
                    DecodeErrorKind::Truncated { needed: 1, available: 0 },
                ));
            }
            return Ok(None);
        }

        if data[pos] == INVALID_BYTE {
            if is_fill(&data[pos + 1..]) {
                result.cleanly_closed = true;
                return Ok(None);
            }
            return Err(DecodeError::new(pos as u64, DecodeErrorKind::TrailingGarbage));
        }

        let (record, used) = decode_record(&data[pos..], pos as u64, result.layout_version)?;
        if let Some(last) = result.last_txid {
            if record.txid < last {
                return Err(DecodeError::new(
                    pos as u64,
                    DecodeErrorKind::OutOfOrder { last, found: record.txid },
                ));
            }
        }
        Ok(Some((record, used)))
    }
}

/// Find the smallest offset in `[from, from + window)` that starts a
/// trustworthy run of records
fn resync(
    data: &[u8],
    from: usize,
    last_txid: Option<u64>,
    version: LayoutVersion,
    recovery: &RecoveryConfig,
) -> Option<usize> {
    let end = from.saturating_add(recovery.resync_window).min(data.len());
    (from..end).find(|&candidate| confirms_run(data, candidate, last_txid, version, recovery))
}

fn confirms_run(
    data: &[u8],
    start: usize,
    last_txid: Option<u64>,
    version: LayoutVersion,
    recovery: &RecoveryConfig,
) -> bool {
    let mut pos = start;
    let mut prev = last_txid;
    let mut run = 0;

    while run < recovery.min_resync_run {
        if pos < data.len() && data[pos] == INVALID_BYTE && is_fill(&data[pos + 1..]) {
            // A run that lands exactly on the end marker is confirmed,
            // but the marker alone is not a record
            return run > 0 || pos == start;
        }
        match decode_record(&data[pos.min(data.len())..], pos as u64, version) {
            Ok((record, used)) if prev.map_or(true, |p| record.txid >= p) => {
                prev = Some(record.txid);
                pos += used;
                run += 1;
            }
            _ => return false,
        }
    }
    true
}
