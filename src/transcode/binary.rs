//! Binary Emitter
//!
//! Re-encodes each record through a `LogWriter`. The output segment takes
//! the layout version announced by `on_open`, so an unmodified stream comes
//! back byte for byte.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::Config;
use crate::error::{DecodeError, EditLogError, Result};
use crate::log::{LayoutVersion, LogWriter, SyncWrite};
use crate::record::Record;
use crate::visitor::LogVisitor;

enum Stage<W: SyncWrite> {
    Pending(W),
    Writing(LogWriter<W>),
    Closed(W),
    Poisoned,
}

/// Visitor that writes the records it consumes as a binary segment
pub struct BinaryEmitter<W: SyncWrite> {
    stage: Stage<W>,
    config: Config,
    records: u64,
}

impl BinaryEmitter<BufWriter<File>> {
    /// Emit into a new file at `path`
    pub fn create(path: &Path, config: &Config) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), config))
    }
}

impl<W: SyncWrite> BinaryEmitter<W> {
    pub fn new(sink: W, config: &Config) -> Self {
        Self {
            stage: Stage::Pending(sink),
            config: config.clone(),
            records: 0,
        }
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// The sink, once the emitter has been closed
    pub fn into_inner(self) -> Option<W> {
        match self.stage {
            Stage::Closed(sink) => Some(sink),
            _ => None,
        }
    }
}

impl<W: SyncWrite> LogVisitor for BinaryEmitter<W> {
    fn on_open(&mut self, version: LayoutVersion) -> Result<()> {
        let sink = match std::mem::replace(&mut self.stage, Stage::Poisoned) {
            Stage::Pending(sink) => sink,
            _ => return Err(EditLogError::Write("binary emitter opened twice".to_string())),
        };
        let mut config = self.config.clone();
        config.layout_version = version;
        self.stage = Stage::Writing(LogWriter::new(sink, &config)?);
        Ok(())
    }

    fn consume(&mut self, record: &Record) -> Result<()> {
        match &mut self.stage {
            Stage::Writing(writer) => {
                writer.append_record(record)?;
                self.records += 1;
                Ok(())
            }
            _ => Err(EditLogError::Write("binary emitter is not open".to_string())),
        }
    }

    fn on_close(&mut self, _error: Option<&DecodeError>) -> Result<()> {
        // Partial output is still closed cleanly so every emitted record is readable
        match std::mem::replace(&mut self.stage, Stage::Poisoned) {
            Stage::Writing(writer) => {
                self.stage = Stage::Closed(writer.close()?);
                Ok(())
            }
            other => {
                self.stage = other;
                Ok(())
            }
        }
    }
}
