//! Conversion driver
//!
//! Reads a segment in either form and routes it through the chosen
//! processor. Output is staged in a temporary file next to the destination
//! and only moved into place when the conversion succeeds.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{EditLogError, Result};
use crate::log::{LogReader, ScanMode, ScanResult};
use crate::opcode::OpCode;
use crate::stats::{StatisticsCollector, StatisticsReport};
use crate::visitor::LogVisitor;

use super::{BinaryEmitter, TextEmitter, TextParser};

/// What the conversion produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    /// A binary segment
    Binary,
    /// The textual document
    Text,
    /// A JSON statistics report
    Stats,
}

impl FromStr for ProcessorKind {
    type Err = EditLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(ProcessorKind::Binary),
            "text" | "json" => Ok(ProcessorKind::Text),
            "stats" => Ok(ProcessorKind::Stats),
            other => Err(EditLogError::Config(format!("unknown processor: {}", other))),
        }
    }
}

/// Which form an input file is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Binary,
    Text,
}

/// Textual documents open with `{`; binary segments open with a negative
/// big-endian layout version, so their first byte is never `{`
pub fn sniff_input(bytes: &[u8]) -> InputKind {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => InputKind::Text,
        _ => InputKind::Binary,
    }
}

/// Summary of a finished conversion
#[derive(Debug)]
pub struct ConversionReport {
    pub input_kind: InputKind,
    pub records: u64,
    /// Present when the input was binary
    pub scan: Option<ScanResult>,
    /// Present for the stats processor
    pub statistics: Option<StatisticsReport>,
}

/// Convert `input` into `output` with the given processor
///
/// A strict scan that hits a malformed record fails with the decode error
/// and leaves no output file behind. Recovery scans succeed and report the
/// trusted range they used.
pub fn convert(
    input: &Path,
    output: &Path,
    processor: ProcessorKind,
    mode: ScanMode,
    config: &Config,
) -> Result<ConversionReport> {
    let data = fs::read(input)?;
    let input_kind = sniff_input(&data);
    info!(
        input = %input.display(),
        output = %output.display(),
        ?input_kind,
        ?processor,
        ?mode,
        "Converting edit log"
    );

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = NamedTempFile::new_in(dir)?;
    let sink = BufWriter::new(staged.reopen()?);

    let data = Bytes::from(data);
    let (records, scan, statistics) = match processor {
        ProcessorKind::Binary => {
            let emitter = BinaryEmitter::new(sink, config);
            let (records, scan) = drive(&data, input_kind, mode, config, emitter)?;
            (records, scan, None)
        }
        ProcessorKind::Text => {
            let emitter = TextEmitter::new(sink);
            let (records, scan) = drive(&data, input_kind, mode, config, emitter)?;
            (records, scan, None)
        }
        ProcessorKind::Stats => {
            let mut collector = StatisticsCollector::new();
            let (records, scan) = drive(&data, input_kind, mode, config, &mut collector)?;
            let report = collector.report(&OpCode::obsolete_set());
            let mut sink = sink;
            serde_json::to_writer_pretty(&mut sink, &report)?;
            sink.write_all(b"\n")?;
            sink.flush()?;
            (records, scan, Some(report))
        }
    };

    staged.persist(output).map_err(|e| e.error)?;

    if let Some(scan) = scan.as_ref().filter(|s| s.recovery_invoked) {
        warn!(
            trusted_end = scan.trusted_end,
            skipped = scan.skipped.len(),
            "Conversion used recovery; output covers only the trusted range"
        );
    }

    Ok(ConversionReport {
        input_kind,
        records,
        scan,
        statistics,
    })
}

/// Tally the records of `input` without writing any output
pub fn collect_statistics(
    input: &Path,
    mode: ScanMode,
    config: &Config,
) -> Result<(StatisticsCollector, Option<ScanResult>)> {
    let data = Bytes::from(fs::read(input)?);
    let mut collector = StatisticsCollector::new();
    let (_, scan) = drive(&data, sniff_input(&data), mode, config, &mut collector)?;
    Ok((collector, scan))
}

fn drive<V: LogVisitor>(
    data: &Bytes,
    kind: InputKind,
    mode: ScanMode,
    config: &Config,
    visitor: V,
) -> Result<(u64, Option<ScanResult>)> {
    match kind {
        InputKind::Text => {
            let records = TextParser::from_slice(data)?.feed(visitor)?;
            Ok((records, None))
        }
        InputKind::Binary => {
            let scan = LogReader::from_bytes(data.clone(), config)
                .scan(mode, visitor)?
                .check()?;
            Ok((scan.records_consumed, Some(scan)))
        }
    }
}

