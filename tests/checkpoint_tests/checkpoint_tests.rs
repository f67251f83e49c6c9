//! Tests for checkpoint rounds
//!
//! These tests verify:
//! - A clean round folds finalized segments into a new image
//! - Short or corrupted transfers abort without touching the image
//! - Every hook can reject a round, and staged files never linger
//! - Hooks fire in round order

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use editlog::checkpoint::{
    package, CheckpointCoordinator, CheckpointFaultInjector, CheckpointOutcome, CheckpointState,
    ImageMerger, InjectedFault, NoFaults, Primary, TransferFault,
};
use editlog::record::{DeleteOp, SetGenstampOp};
use editlog::{Config, EditLogError, LogReader, Op, OpCode, Record, ScanMode};
use parking_lot::Mutex;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Which transferred file a fault applies to
#[derive(Debug, Clone, Copy)]
enum Target {
    /// The primary's image, on download
    Image,
    /// A finalized segment, on download
    Segment,
    /// The merged image, on upload
    Upload,
}

/// Injector driven by a fixed plan, recording every hook it sees
struct ScriptedFaults {
    primary_dir: PathBuf,
    fail_hook: Option<&'static str>,
    truncate: Option<Target>,
    corrupt: Option<Target>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFaults {
    fn new(primary_dir: &Path) -> Self {
        Self {
            primary_dir: primary_dir.to_path_buf(),
            fail_hook: None,
            truncate: None,
            corrupt: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn matches(&self, target: Option<Target>, file: &Path) -> bool {
        let name = file.file_name().unwrap().to_string_lossy();
        let local = file.starts_with(&self.primary_dir);
        match target {
            Some(Target::Image) => local && name.starts_with("image_"),
            Some(Target::Segment) => local && name.starts_with("edits_"),
            Some(Target::Upload) => !local,
            None => false,
        }
    }

    fn hit(&self, hook: &'static str) -> editlog::Result<()> {
        self.calls.lock().push(hook.to_string());
        if self.fail_hook == Some(hook) {
            return Err(EditLogError::Transfer(format!("injected failure in {}", hook)));
        }
        Ok(())
    }
}

impl CheckpointFaultInjector for ScriptedFaults {
    fn before_header(&self) -> editlog::Result<()> {
        self.hit("before_header")
    }

    fn after_log_roll(&self) -> editlog::Result<()> {
        self.hit("after_log_roll")
    }

    fn during_merge(&self) -> editlog::Result<()> {
        self.hit("during_merge")
    }

    fn after_image_upload(&self) -> editlog::Result<()> {
        self.hit("after_image_upload")
    }

    fn before_file_send(&self, file: &Path) -> editlog::Result<()> {
        let kind = if file.starts_with(&self.primary_dir) {
            "download"
        } else {
            "upload"
        };
        self.calls.lock().push(format!("before_file_send {}", kind));
        if self.fail_hook == Some("before_file_send") {
            return Err(EditLogError::Transfer("injected send failure".to_string()));
        }
        Ok(())
    }

    fn should_truncate(&self, file: &Path) -> bool {
        self.matches(self.truncate, file)
    }

    fn should_corrupt_byte(&self, file: &Path) -> bool {
        self.matches(self.corrupt, file)
    }
}

struct Cluster {
    _temp: TempDir,
    primary_dir: PathBuf,
    work_dir: PathBuf,
    primary: Primary,
}

fn setup_cluster() -> Cluster {
    let temp = TempDir::new().unwrap();
    let primary_dir = temp.path().join("primary");
    let work_dir = temp.path().join("secondary");
    let primary = Primary::format(&primary_dir, Config::default()).unwrap();
    Cluster {
        _temp: temp,
        primary_dir,
        work_dir,
        primary,
    }
}

fn log_deletes(primary: &Primary, count: usize) {
    for i in 0..count {
        primary
            .log_op(Op::Delete(DeleteOp {
                path: format!("/ckpt/file{}", i),
                timestamp: i as i64,
            }))
            .unwrap();
    }
}

fn image_records(primary: &Primary) -> Vec<Record> {
    let image = primary.image();
    let (records, _) = LogReader::open(&image.path, primary.config())
        .unwrap()
        .read_all(ScanMode::Strict)
        .map(|(records, scan)| (records, scan.check().unwrap()))
        .unwrap();
    records
}

fn staged_leftovers(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
        .count()
}

// =============================================================================
// Successful Round Tests
// =============================================================================

#[test]
fn test_round_installs_merged_image() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 3);

    let mut coordinator =
        CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(NoFaults));
    let attempt = coordinator.run_round().unwrap();

    assert!(attempt.is_success());
    assert_eq!(attempt.source_segment.first_txid, 1);
    assert_eq!(attempt.source_segment.last_txid, 5);
    assert_eq!(attempt.image.last_txid, 5);
    assert_eq!(primary.image(), attempt.image);
    assert!(attempt.injected_fault.is_none());
    assert_eq!(coordinator.state(), CheckpointState::Idle);

    // Segment markers are not part of the image
    let records = image_records(primary);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.opcode() == OpCode::Delete));

    // Superseded files are gone
    assert!(primary.finalized_segments().is_empty());
    assert!(!attempt.source_segment.path.exists());
    assert!(!cluster.primary_dir.join(format!("image_{:019}", 0)).exists());
    assert_eq!(fs::read_dir(&cluster.work_dir).unwrap().count(), 0);
}

#[test]
fn test_consecutive_rounds_accumulate() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    let mut coordinator =
        CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(NoFaults));

    log_deletes(primary, 2);
    coordinator.run_round().unwrap().into_result().unwrap();
    primary
        .log_op(Op::SetGenstamp(SetGenstampOp { gen_stamp: 7 }))
        .unwrap();
    let image = coordinator.run_round().unwrap().into_result().unwrap();

    // Round one: start, 2 ops, end (1..=4); round two: start, 1 op, end (5..=7)
    assert_eq!(image.last_txid, 7);
    let records = image_records(primary);
    let txids: Vec<u64> = records.iter().map(|r| r.txid).collect();
    assert_eq!(txids, vec![2, 3, 6]);
}

#[test]
fn test_active_segment_readable_while_logging() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 2);
    primary.sync().unwrap();

    let (path, flushed) = primary.active_segment();
    let (records, scan) = LogReader::open_in_progress(&path, flushed, primary.config())
        .unwrap()
        .read_all(ScanMode::Strict)
        .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].opcode(), OpCode::StartLogSegment);
    assert!(scan.first_error.is_none());
}

// =============================================================================
// Log Roll Tests
// =============================================================================

#[test]
fn test_failed_roll_leaves_active_segment_intact() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 1);

    // Start (1) + delete (2): the end marker would be 3, the next segment 4
    let blocker = cluster
        .primary_dir
        .join(format!("edits_inprogress_{:019}", 4));
    fs::create_dir(&blocker).unwrap();
    assert!(matches!(primary.roll_edit_log(), Err(EditLogError::Io(_))));
    assert!(primary.finalized_segments().is_empty());
    fs::remove_dir(&blocker).unwrap();

    log_deletes(primary, 1);
    let segment = primary.roll_edit_log().unwrap();
    assert_eq!((segment.first_txid, segment.last_txid), (1, 4));
    assert_eq!(primary.finalized_segments(), vec![segment.clone()]);

    let (records, _) = LogReader::open(&segment.path, primary.config())
        .unwrap()
        .read_all(ScanMode::Strict)
        .map(|(records, scan)| (records, scan.check().unwrap()))
        .unwrap();
    let ops: Vec<(u64, OpCode)> = records.iter().map(|r| (r.txid, r.opcode())).collect();
    assert_eq!(
        ops,
        vec![
            (1, OpCode::StartLogSegment),
            (2, OpCode::Delete),
            (3, OpCode::Delete),
            (4, OpCode::EndLogSegment),
        ]
    );
}

// =============================================================================
// Transfer Fault Tests
// =============================================================================

#[test]
fn test_short_image_download_aborts() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 3);
    let before = primary.image();

    let mut faults = ScriptedFaults::new(&cluster.primary_dir);
    faults.truncate = Some(Target::Image);
    let mut coordinator =
        CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(faults));
    let attempt = coordinator.run_round().unwrap();

    assert_eq!(attempt.outcome, CheckpointOutcome::ShortFile);
    assert!(matches!(
        attempt.injected_fault,
        Some(InjectedFault::Truncated { ref file }) if file.starts_with("image_")
    ));
    assert_eq!(primary.image(), before);
    assert_eq!(attempt.image, before);
    assert_eq!(primary.finalized_segments().len(), 1);
    assert_eq!(coordinator.state(), CheckpointState::Idle);
    assert_eq!(
        attempt.states_visited,
        vec![CheckpointState::Idle, CheckpointState::HeaderSent, CheckpointState::Idle]
    );
    assert!(matches!(
        attempt.into_result(),
        Err(EditLogError::IncompleteCheckpoint { .. })
    ));
}

#[test]
fn test_corrupted_segment_download_aborts() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 3);
    let before = primary.image();

    let mut faults = ScriptedFaults::new(&cluster.primary_dir);
    faults.corrupt = Some(Target::Segment);
    let attempt = CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(faults))
        .run_round()
        .unwrap();

    assert_eq!(attempt.outcome, CheckpointOutcome::CorruptedByte);
    assert!(matches!(
        attempt.injected_fault,
        Some(InjectedFault::CorruptedByte { ref file }) if file.starts_with("edits_")
    ));
    assert_eq!(primary.image(), before);
    assert!(attempt.source_segment.path.exists());
}

#[test]
fn test_corrupted_upload_keeps_prior_image() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 2);
    let before = primary.image();

    let mut faults = ScriptedFaults::new(&cluster.primary_dir);
    faults.corrupt = Some(Target::Upload);
    let attempt = CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(faults))
        .run_round()
        .unwrap();

    assert_eq!(attempt.outcome, CheckpointOutcome::CorruptedByte);
    assert_eq!(primary.image(), before);
    assert!(before.path.exists());
    assert_eq!(staged_leftovers(&cluster.primary_dir), 0);
}

#[test]
fn test_round_after_failure_catches_up() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 2);

    let mut faults = ScriptedFaults::new(&cluster.primary_dir);
    faults.truncate = Some(Target::Segment);
    let attempt = CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(faults))
        .run_round()
        .unwrap();
    assert_eq!(attempt.outcome, CheckpointOutcome::ShortFile);

    log_deletes(primary, 1);
    let attempt = CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(NoFaults))
        .run_round()
        .unwrap();

    assert!(attempt.is_success());
    assert_eq!(image_records(primary).len(), 3);
    assert!(primary.finalized_segments().is_empty());
}

// =============================================================================
// Hook Tests
// =============================================================================

#[test]
fn test_each_hook_can_reject() {
    use CheckpointState::{HeaderSent, Idle, ImageUploaded, MergeInProgress};

    let cases: [(&'static str, Vec<CheckpointState>); 5] = [
        ("after_log_roll", vec![Idle, Idle]),
        ("before_header", vec![Idle, Idle]),
        ("before_file_send", vec![Idle, HeaderSent, Idle]),
        ("during_merge", vec![Idle, HeaderSent, MergeInProgress, Idle]),
        (
            "after_image_upload",
            vec![Idle, HeaderSent, MergeInProgress, ImageUploaded, Idle],
        ),
    ];

    for (hook, states) in cases {
        let cluster = setup_cluster();
        let primary = &cluster.primary;
        log_deletes(primary, 1);
        let before = primary.image();

        let mut faults = ScriptedFaults::new(&cluster.primary_dir);
        faults.fail_hook = Some(hook);
        let attempt = CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(faults))
            .run_round()
            .unwrap();

        match &attempt.outcome {
            CheckpointOutcome::Rejected(reason) => assert!(reason.starts_with(hook), "{}", reason),
            other => panic!("{}: expected rejection, got {:?}", hook, other),
        }
        assert_eq!(attempt.injected_fault, Some(InjectedFault::HookFailed { hook }));
        assert_eq!(attempt.states_visited, states, "{} aborted in the wrong state", hook);
        assert_eq!(primary.image(), before, "{} changed the image", hook);
        assert_eq!(staged_leftovers(&cluster.primary_dir), 0, "{} left a staged file", hook);
    }
}

#[test]
fn test_hook_order() {
    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 1);

    let faults = Arc::new(ScriptedFaults::new(&cluster.primary_dir));
    let attempt = CheckpointCoordinator::new(primary, &cluster.work_dir, faults.clone())
        .run_round()
        .unwrap();

    assert!(attempt.is_success());
    assert_eq!(
        attempt.states_visited,
        vec![
            CheckpointState::Idle,
            CheckpointState::HeaderSent,
            CheckpointState::MergeInProgress,
            CheckpointState::ImageUploaded,
            CheckpointState::Idle,
        ]
    );

    assert_eq!(
        *faults.calls.lock(),
        vec![
            "after_log_roll",
            "before_header",
            "before_file_send download",
            "before_file_send download",
            "during_merge",
            "before_file_send upload",
            "after_image_upload",
        ]
    );
}

#[test]
fn test_failing_merger_rejects_round() {
    struct BrokenMerger;

    impl ImageMerger for BrokenMerger {
        fn merge(&self, _: &[u8], _: &[Vec<u8>], _: &Config) -> editlog::Result<Vec<u8>> {
            Err(EditLogError::Write("merge exploded".to_string()))
        }
    }

    let cluster = setup_cluster();
    let primary = &cluster.primary;
    log_deletes(primary, 1);
    let before = primary.image();

    let attempt = CheckpointCoordinator::new(primary, &cluster.work_dir, Arc::new(NoFaults))
        .with_merger(Box::new(BrokenMerger))
        .run_round()
        .unwrap();

    assert!(matches!(attempt.outcome, CheckpointOutcome::Rejected(ref r) if r.contains("merge exploded")));
    assert!(attempt.injected_fault.is_none());
    assert_eq!(primary.image(), before);
}

// =============================================================================
// Transfer Tests
// =============================================================================

#[test]
fn test_transfer_verifies_body() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("payload");
    fs::write(&path, b"0123456789").unwrap();

    let (transfer, fault) = package(&path, &NoFaults).unwrap();
    assert!(fault.is_none());
    let (name, body) = transfer.receive().unwrap();
    assert_eq!(name, "payload");
    assert_eq!(body, b"0123456789");

    let mut faults = ScriptedFaults::new(temp.path());
    faults.truncate = Some(Target::Upload);
    // Outside the primary directory, so this counts as an upload
    let elsewhere = TempDir::new().unwrap();
    let other = elsewhere.path().join("payload");
    fs::write(&other, b"0123456789").unwrap();

    let (transfer, fault) = package(&other, &faults).unwrap();
    assert_eq!(
        fault,
        Some(InjectedFault::Truncated {
            file: "payload".to_string()
        })
    );
    let fault = transfer.receive().unwrap_err();
    assert_eq!(
        fault,
        TransferFault::ShortFile {
            name: "payload".to_string(),
            expected: 10,
            received: 5,
        }
    );
    assert!(matches!(EditLogError::from(fault), EditLogError::Transfer(_)));
}
