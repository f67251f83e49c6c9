//! Log Writer
//!
//! Appends records to a segment. Append-only: no byte is ever rewritten, so
//! a prefix of the segment stays valid even if its suffix is lost.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::config::{Config, SyncStrategy};
use crate::error::{EditLogError, Result};
use crate::opcode::INVALID_BYTE;
use crate::record::{encode_record, Op, Record};

use super::{LayoutVersion, SEGMENT_HEADER_SIZE};

/// A sink that can make written bytes durable
pub trait SyncWrite: Write {
    /// Flush buffers and force data to stable storage
    fn sync(&mut self) -> io::Result<()>;
}

impl SyncWrite for BufWriter<File> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_ref().sync_data()
    }
}

impl SyncWrite for Vec<u8> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes records to a segment
///
/// Single writer: exactly one `LogWriter` may append to a segment at a time.
/// Readers of an in-progress segment must stop at `flushed_offset()`.
pub struct LogWriter<W: SyncWrite> {
    /// Underlying sink
    inner: W,
    /// Layout version written in the header
    version: LayoutVersion,
    sync_strategy: SyncStrategy,
    preallocation_chunk: Option<usize>,
    /// Bytes written so far, header included
    offset: u64,
    /// Bytes known to be durable
    flushed_offset: u64,
    /// Records appended since the last sync
    unsynced: usize,
    last_txid: Option<u64>,
    next_txid: u64,
}

impl LogWriter<BufWriter<File>> {
    /// Create a new segment file, truncating any existing file
    pub fn create(path: &Path, config: &Config) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        debug!(path = %path.display(), version = %config.layout_version, "Created log segment");
        Self::new(BufWriter::new(file), config)
    }
}

impl<W: SyncWrite> LogWriter<W> {
    /// Start a segment on `inner`, writing the header immediately
    pub fn new(inner: W, config: &Config) -> Result<Self> {
        let version = config.layout_version;
        if !version.is_supported() {
            return Err(EditLogError::UnsupportedFormat { version: version.0 });
        }
        if config.preallocation_chunk == Some(0) {
            return Err(EditLogError::Config(
                "preallocation_chunk must be non-zero".to_string(),
            ));
        }

        let mut writer = Self {
            inner,
            version,
            sync_strategy: config.sync_strategy,
            preallocation_chunk: config.preallocation_chunk,
            offset: 0,
            flushed_offset: 0,
            unsynced: 0,
            last_txid: None,
            next_txid: 1,
        };
        writer.inner.write_all(&version.header_bytes())?;
        writer.offset = SEGMENT_HEADER_SIZE as u64;
        writer.flush()?;
        Ok(writer)
    }

    /// Set the transaction id the next `append` assigns
    pub fn starting_at(mut self, txid: u64) -> Self {
        self.next_txid = txid;
        self
    }

    /// Append an operation under the next transaction id
    pub fn append(&mut self, op: Op) -> Result<u64> {
        let txid = self.next_txid;
        self.append_record(&Record::new(txid, op))?;
        Ok(txid)
    }

    /// Append a record that already carries its transaction id
    ///
    /// The id must not be lower than the last appended one.
    pub fn append_record(&mut self, record: &Record) -> Result<()> {
        if let Some(last) = self.last_txid {
            if record.txid < last {
                return Err(EditLogError::Write(format!(
                    "transaction id {} follows {}",
                    record.txid, last
                )));
            }
        }

        let bytes = encode_record(record, self.version)?;
        self.inner.write_all(&bytes)?;
        self.offset += bytes.len() as u64;
        self.last_txid = Some(record.txid);
        self.next_txid = self.next_txid.max(record.txid + 1);
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNRecords { count } => self.unsynced >= count,
        };
        if due {
            self.flush()?;
        }
        Ok(())
    }

    /// Force everything appended so far to stable storage
    pub fn flush(&mut self) -> Result<()> {
        self.inner.sync()?;
        self.flushed_offset = self.offset;
        self.unsynced = 0;
        Ok(())
    }

    /// Write the end-of-segment marker, pad with fill, sync, and hand back the sink
    pub fn close(mut self) -> Result<W> {
        let mut trailer = vec![INVALID_BYTE];
        if let Some(chunk) = self.preallocation_chunk {
            let end = self.offset as usize + 1;
            let padded = end.div_ceil(chunk) * chunk;
            trailer.resize(padded - self.offset as usize, INVALID_BYTE);
        }
        self.inner.write_all(&trailer)?;
        self.offset += trailer.len() as u64;
        self.flush()?;

        debug!(
            bytes = self.offset,
            last_txid = ?self.last_txid,
            "Closed log segment"
        );
        Ok(self.inner)
    }

    pub fn version(&self) -> LayoutVersion {
        self.version
    }

    /// Bytes written so far, header included
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset up to which readers may safely scan
    pub fn flushed_offset(&self) -> u64 {
        self.flushed_offset
    }

    pub fn last_txid(&self) -> Option<u64> {
        self.last_txid
    }

    pub fn next_txid(&self) -> u64 {
        self.next_txid
    }
}
