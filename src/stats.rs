//! Statistics Collector
//!
//! Tallies records per opcode. Used to check that a log exercises every
//! live operation, not for production monitoring.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{DecodeError, Result};
use crate::opcode::OpCode;
use crate::record::Record;
use crate::visitor::LogVisitor;

/// Serializable summary: per-opcode counts plus the completeness flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsReport {
    pub counts: BTreeMap<String, u64>,
    pub complete: bool,
    pub missing: Vec<String>,
}

/// Visitor counting records per opcode
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    tally: BTreeMap<OpCode, u64>,
    finalized: bool,
    scan_error: Option<DecodeError>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, opcode: OpCode) -> u64 {
        self.tally.get(&opcode).copied().unwrap_or(0)
    }

    pub fn tally(&self) -> &BTreeMap<OpCode, u64> {
        &self.tally
    }

    pub fn total(&self) -> u64 {
        self.tally.values().sum()
    }

    /// Whether `on_close` has run
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The decode failure the scan ended with, if any
    pub fn scan_error(&self) -> Option<&DecodeError> {
        self.scan_error.as_ref()
    }

    /// Live opcodes never seen; INVALID is always skipped
    pub fn missing(&self, excluded: &BTreeSet<OpCode>) -> Vec<OpCode> {
        OpCode::ALL
            .iter()
            .copied()
            .filter(|op| *op != OpCode::Invalid && !excluded.contains(op))
            .filter(|op| self.count(*op) == 0)
            .collect()
    }

    /// True iff every opcode outside `excluded` (and INVALID) was seen
    pub fn is_complete(&self, excluded: &BTreeSet<OpCode>) -> bool {
        self.missing(excluded).is_empty()
    }

    pub fn report(&self, excluded: &BTreeSet<OpCode>) -> StatisticsReport {
        let counts = OpCode::ALL
            .iter()
            .filter(|op| **op != OpCode::Invalid)
            .map(|op| (op.name().to_string(), self.count(*op)))
            .collect();
        let missing: Vec<String> = self
            .missing(excluded)
            .into_iter()
            .map(|op| op.name().to_string())
            .collect();
        StatisticsReport {
            counts,
            complete: missing.is_empty(),
            missing,
        }
    }

    /// One line per opcode: name, code, count
    pub fn statistics_string(&self) -> String {
        let mut out = String::new();
        for op in OpCode::ALL.iter().filter(|op| **op != OpCode::Invalid) {
            let _ = writeln!(
                out,
                "    {:<30} ({:3}): {}",
                op.name(),
                op.as_byte(),
                self.count(*op)
            );
        }
        out
    }
}

impl LogVisitor for StatisticsCollector {
    fn consume(&mut self, record: &Record) -> Result<()> {
        *self.tally.entry(record.opcode()).or_insert(0) += 1;
        Ok(())
    }

    fn on_close(&mut self, error: Option<&DecodeError>) -> Result<()> {
        self.scan_error = error.cloned();
        self.finalized = true;
        Ok(())
    }
}
