//! Textual form
//!
//! A JSON document listing records in order, one per line, so that two
//! independently produced documents can be diffed:
//!
//! ```text
//! {
//!   "version": -40,
//!   "records": [
//!     {"txid":1,"opcode":"OP_START_LOG_SEGMENT","data":{}},
//!     {"txid":2,"opcode":"OP_MKDIR","data":{"path":"/a",...}}
//!   ]
//! }
//! ```

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DecodeError, EditLogError, Result};
use crate::log::LayoutVersion;
use crate::record::Record;
use crate::visitor::LogVisitor;

/// The whole textual document
#[derive(Debug, Serialize, Deserialize)]
pub struct TextDocument {
    pub version: LayoutVersion,
    pub records: Vec<Record>,
}

// =============================================================================
// Textual Emitter
// =============================================================================

/// Visitor that streams records out as the textual document
pub struct TextEmitter<W: Write> {
    out: W,
    records: u64,
    open: bool,
}

impl<W: Write> TextEmitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            records: 0,
            open: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LogVisitor for TextEmitter<W> {
    fn on_open(&mut self, version: LayoutVersion) -> Result<()> {
        write!(self.out, "{{\n  \"version\": {},\n  \"records\": [", version.0)?;
        self.open = true;
        Ok(())
    }

    fn consume(&mut self, record: &Record) -> Result<()> {
        let sep = if self.records == 0 { "\n    " } else { ",\n    " };
        self.out.write_all(sep.as_bytes())?;
        serde_json::to_writer(&mut self.out, record)?;
        self.records += 1;
        Ok(())
    }

    fn on_close(&mut self, _error: Option<&DecodeError>) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        if self.records > 0 {
            self.out.write_all(b"\n  ")?;
        }
        self.out.write_all(b"]\n}\n")?;
        self.out.flush()?;
        self.open = false;
        Ok(())
    }
}

// =============================================================================
// Textual Parser
// =============================================================================

/// Reads the textual document back and replays it into a visitor
pub struct TextParser {
    document: TextDocument,
}

impl TextParser {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let document: TextDocument = serde_json::from_reader(reader)?;
        Self::validate(document)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let document: TextDocument = serde_json::from_slice(bytes)?;
        Self::validate(document)
    }

    fn validate(document: TextDocument) -> Result<Self> {
        if !document.version.is_supported() {
            return Err(EditLogError::UnsupportedFormat {
                version: document.version.0,
            });
        }
        // Visitors are promised non-decreasing transaction ids
        for (index, pair) in document.records.windows(2).enumerate() {
            if pair[1].txid < pair[0].txid {
                return Err(EditLogError::Text(format!(
                    "record {} has txid {} after txid {}",
                    index + 1,
                    pair[1].txid,
                    pair[0].txid
                )));
            }
        }
        Ok(Self { document })
    }

    pub fn version(&self) -> LayoutVersion {
        self.document.version
    }

    pub fn records(&self) -> &[Record] {
        &self.document.records
    }

    /// Feed every record to `visitor`; returns the number consumed
    pub fn feed<V: LogVisitor>(&self, mut visitor: V) -> Result<u64> {
        visitor.on_open(self.document.version)?;
        let mut consumed = 0;
        for record in &self.document.records {
            if let Err(e) = visitor.consume(record) {
                if let Err(close_err) = visitor.on_close(None) {
                    warn!(error = %close_err, "Visitor failed to close after feed error");
                }
                return Err(e);
            }
            consumed += 1;
        }
        visitor.on_close(None)?;
        Ok(consumed)
    }
}
