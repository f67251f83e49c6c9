//! Tests against stored reference edits
//!
//! `tests/fixtures/edits_stored` and `edits_stored.json` are a checked-in
//! segment and its textual form. Both were produced once and must keep
//! decoding and re-encoding to exactly these bytes, so any change to field
//! encoding or JSON layout shows up here.

use std::fs;
use std::path::{Path, PathBuf};

use editlog::generator::generate_segment;
use editlog::stats::StatisticsCollector;
use editlog::transcode::{BinaryEmitter, TextEmitter, TextParser};
use editlog::{Config, LayoutVersion, LogReader, OpCode, ScanMode};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn stored_binary() -> Vec<u8> {
    fs::read(fixture("edits_stored")).unwrap()
}

fn stored_text() -> String {
    fs::read_to_string(fixture("edits_stored.json")).unwrap()
}

// =============================================================================
// Stored Form Tests
// =============================================================================

#[test]
fn test_stored_binary_emits_stored_text() {
    let mut emitter = TextEmitter::new(Vec::new());
    let scan = LogReader::from_bytes(stored_binary(), &Config::default())
        .scan(ScanMode::Strict, &mut emitter)
        .unwrap()
        .check()
        .unwrap();

    assert_eq!(scan.layout_version, LayoutVersion::CHECKSUMMED);
    assert!(scan.cleanly_closed);
    assert_eq!(scan.records_consumed, 22);
    assert_eq!(String::from_utf8(emitter.into_inner()).unwrap(), stored_text());
}

#[test]
fn test_stored_text_encodes_stored_binary() {
    let parser = TextParser::from_slice(stored_text().as_bytes()).unwrap();
    let mut emitter = BinaryEmitter::new(Vec::new(), &Config::default());
    parser.feed(&mut emitter).unwrap();

    assert_eq!(emitter.into_inner().unwrap(), stored_binary());
}

#[test]
fn test_stored_edits_cover_every_live_opcode() {
    let mut stats = StatisticsCollector::new();
    LogReader::from_bytes(stored_binary(), &Config::default())
        .scan(ScanMode::Strict, &mut stats)
        .unwrap();

    assert!(stats.is_complete(&OpCode::obsolete_set()));
    assert_eq!(stats.total(), 22);
}

#[test]
fn test_generator_reproduces_stored_edits() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("edits");
    let last = generate_segment(&path, &Config::default()).unwrap();

    assert_eq!(last, 22);
    assert_eq!(fs::read(&path).unwrap(), stored_binary());
}
