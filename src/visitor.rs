//! Visitor Protocol
//!
//! Consumers of a decoded record stream. A visitor never sees bytes, only
//! typed records, so format knowledge stays in the reader and codec.
//!
//! The reader calls `on_open` once, `consume` for each record in
//! transaction-id order, then `on_close` exactly once, including when the
//! scan ended on a fatal error or an exhausted recovery search.

use crate::error::{DecodeError, Result};
use crate::log::LayoutVersion;
use crate::record::Record;

/// A consumer of the record stream
pub trait LogVisitor {
    /// Called once before the first record
    fn on_open(&mut self, _version: LayoutVersion) -> Result<()> {
        Ok(())
    }

    /// Called for every emitted record, in order
    fn consume(&mut self, record: &Record) -> Result<()>;

    /// Called once after the last record; `error` is the scan's first
    /// decode failure, if any
    fn on_close(&mut self, _error: Option<&DecodeError>) -> Result<()> {
        Ok(())
    }
}

impl<V: LogVisitor + ?Sized> LogVisitor for &mut V {
    fn on_open(&mut self, version: LayoutVersion) -> Result<()> {
        (**self).on_open(version)
    }

    fn consume(&mut self, record: &Record) -> Result<()> {
        (**self).consume(record)
    }

    fn on_close(&mut self, error: Option<&DecodeError>) -> Result<()> {
        (**self).on_close(error)
    }
}

/// Keeps every record it is handed
#[derive(Debug, Default)]
pub struct RecordCollector {
    version: Option<LayoutVersion>,
    records: Vec<Record>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout version announced by `on_open`
    pub fn version(&self) -> Option<LayoutVersion> {
        self.version
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl LogVisitor for RecordCollector {
    fn on_open(&mut self, version: LayoutVersion) -> Result<()> {
        self.version = Some(version);
        Ok(())
    }

    fn consume(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
