//! Checkpoint round coordination
//!
//! ## Round Sequence
//! ```text
//!   roll edit log          ── after_log_roll
//!   download image + segs  ── before_header, before_file_send (per file)
//!   merge                  ── during_merge
//!   upload merged image    ── before_file_send
//!   install                ── after_image_upload
//! ```
//!
//! Any failure before install leaves the primary's image untouched. The
//! downloaded and merged files live in a scratch directory that is removed
//! when the round ends, whatever the outcome.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{EditLogError, Result};
use crate::log::{LogReader, LogWriter, ScanMode};
use crate::record::Op;

use super::primary::{image_name, ImagePointer, Primary, SegmentInfo};
use super::transfer::{self, InjectedFault, TransferFault};
use super::CheckpointFaultInjector;

// =============================================================================
// Merging
// =============================================================================

/// Folds finalized segments into an image
pub trait ImageMerger: Send + Sync {
    /// Produce a new image from `image` followed by `segments`, all in the
    /// binary segment form
    fn merge(&self, image: &[u8], segments: &[Vec<u8>], config: &Config) -> Result<Vec<u8>>;
}

/// Rewrites the image and segments as one consolidated segment, dropping
/// segment boundary markers
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolidatingMerger;

impl ImageMerger for ConsolidatingMerger {
    fn merge(&self, image: &[u8], segments: &[Vec<u8>], config: &Config) -> Result<Vec<u8>> {
        let mut writer = LogWriter::new(Vec::new(), config)?;

        for input in std::iter::once(image).chain(segments.iter().map(Vec::as_slice)) {
            let (records, scan) =
                LogReader::from_bytes(input.to_vec(), config).read_all(ScanMode::Strict)?;
            scan.check()?;
            for record in records
                .iter()
                .filter(|r| !matches!(r.op, Op::StartLogSegment {} | Op::EndLogSegment {}))
            {
                writer.append_record(record)?;
            }
        }

        writer.close()
    }
}

// =============================================================================
// Round State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    Idle,
    HeaderSent,
    MergeInProgress,
    ImageUploaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Success,
    ShortFile,
    CorruptedByte,
    Rejected(String),
}

/// What a single round did
#[derive(Debug, Clone)]
pub struct CheckpointAttempt {
    /// Segment finalized by the log roll that opened the round
    pub source_segment: SegmentInfo,
    pub injected_fault: Option<InjectedFault>,
    pub outcome: CheckpointOutcome,
    /// Every state the round passed through, from `Idle` back to `Idle`
    pub states_visited: Vec<CheckpointState>,
    /// The primary's image once the round ended
    pub image: ImagePointer,
}

impl CheckpointAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome == CheckpointOutcome::Success
    }

    /// Treat anything but success as an error
    pub fn into_result(self) -> Result<ImagePointer> {
        match self.outcome {
            CheckpointOutcome::Success => Ok(self.image),
            other => Err(EditLogError::IncompleteCheckpoint {
                outcome: format!("{:?}", other),
            }),
        }
    }
}

enum Abort {
    Transfer(TransferFault),
    Rejected(String),
    Error(EditLogError),
}

impl From<EditLogError> for Abort {
    fn from(e: EditLogError) -> Self {
        Abort::Error(e)
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Drives checkpoint rounds between a primary and its secondary
pub struct CheckpointCoordinator<'a> {
    primary: &'a Primary,
    work_dir: PathBuf,
    merger: Box<dyn ImageMerger>,
    injector: Arc<dyn CheckpointFaultInjector>,
    state: CheckpointState,
    visited: Vec<CheckpointState>,
}

impl<'a> CheckpointCoordinator<'a> {
    /// `work_dir` is the secondary's scratch space
    pub fn new(
        primary: &'a Primary,
        work_dir: &Path,
        injector: Arc<dyn CheckpointFaultInjector>,
    ) -> Self {
        Self {
            primary,
            work_dir: work_dir.to_path_buf(),
            merger: Box::new(ConsolidatingMerger),
            injector,
            state: CheckpointState::Idle,
            visited: Vec::new(),
        }
    }

    pub fn with_merger(mut self, merger: Box<dyn ImageMerger>) -> Self {
        self.merger = merger;
        self
    }

    pub fn state(&self) -> CheckpointState {
        self.state
    }

    /// Run one checkpoint round
    ///
    /// Returns `Err` only for storage failures on either side; injected and
    /// detected faults come back as the attempt's outcome.
    pub fn run_round(&mut self) -> Result<CheckpointAttempt> {
        let primary = self.primary;
        let _round = primary
            .try_begin_round()
            .ok_or_else(|| EditLogError::IncompleteCheckpoint {
                outcome: "another round is in progress".to_string(),
            })?;

        let source_segment = primary.roll_edit_log()?;
        self.visited = vec![CheckpointState::Idle];
        let mut injected_fault = None;
        let result = self.execute(&mut injected_fault);
        self.enter(CheckpointState::Idle);
        let states_visited = std::mem::take(&mut self.visited);

        let outcome = match result {
            Ok(()) => CheckpointOutcome::Success,
            Err(Abort::Transfer(TransferFault::ShortFile { .. })) => CheckpointOutcome::ShortFile,
            Err(Abort::Transfer(TransferFault::CorruptedByte { .. })) => {
                CheckpointOutcome::CorruptedByte
            }
            Err(Abort::Transfer(fault @ TransferFault::BadHeader(_))) => {
                CheckpointOutcome::Rejected(fault.to_string())
            }
            Err(Abort::Rejected(reason)) => CheckpointOutcome::Rejected(reason),
            Err(Abort::Error(e)) => return Err(e),
        };

        let image = primary.image();
        if outcome == CheckpointOutcome::Success {
            info!(image_txid = image.last_txid, "Checkpoint round complete");
        } else {
            warn!(?outcome, image_txid = image.last_txid, "Checkpoint round aborted");
        }

        Ok(CheckpointAttempt {
            source_segment,
            injected_fault,
            outcome,
            states_visited,
            image,
        })
    }

    fn enter(&mut self, state: CheckpointState) {
        self.state = state;
        self.visited.push(state);
    }

    fn execute(&mut self, fault: &mut Option<InjectedFault>) -> std::result::Result<(), Abort> {
        let injector = Arc::clone(&self.injector);
        let config = self.primary.config().clone();

        hook("after_log_roll", injector.after_log_roll(), fault)?;

        // -------------------------------------------------------------------------
        // Download
        // -------------------------------------------------------------------------
        fs::create_dir_all(&self.work_dir).map_err(EditLogError::from)?;
        let scratch = tempfile::tempdir_in(&self.work_dir).map_err(EditLogError::from)?;

        hook("before_header", injector.before_header(), fault)?;
        let image = self.primary.image();
        let segments = self.primary.segments_after(image.last_txid);
        self.enter(CheckpointState::HeaderSent);

        let image_bytes = self.send(&image.path, fault)?;
        let mut segment_bytes = Vec::with_capacity(segments.len());
        for segment in &segments {
            segment_bytes.push(self.send(&segment.path, fault)?);
        }

        // -------------------------------------------------------------------------
        // Merge
        // -------------------------------------------------------------------------
        self.enter(CheckpointState::MergeInProgress);
        hook("during_merge", injector.during_merge(), fault)?;

        let merged = self
            .merger
            .merge(&image_bytes, &segment_bytes, &config)
            .map_err(|e| match e {
                EditLogError::Io(_) => Abort::Error(e),
                other => Abort::Rejected(format!("merge failed: {}", other)),
            })?;
        let last_txid = segments.last().map_or(image.last_txid, |s| s.last_txid);
        let merged_path = scratch.path().join(image_name(last_txid));
        fs::write(&merged_path, &merged).map_err(EditLogError::from)?;

        // -------------------------------------------------------------------------
        // Upload and install
        // -------------------------------------------------------------------------
        let uploaded = self.send(&merged_path, fault)?;
        let staged = self.primary.stage_image(&uploaded, last_txid)?;
        self.enter(CheckpointState::ImageUploaded);

        hook("after_image_upload", injector.after_image_upload(), fault)?;
        self.primary.commit_image(staged)?;
        Ok(())
    }

    fn send(
        &self,
        path: &Path,
        fault: &mut Option<InjectedFault>,
    ) -> std::result::Result<Vec<u8>, Abort> {
        hook("before_file_send", self.injector.before_file_send(path), fault)?;
        let (package, injected) = transfer::package(path, self.injector.as_ref())?;
        if injected.is_some() {
            *fault = injected;
        }
        let (_, body) = package.receive().map_err(Abort::Transfer)?;
        Ok(body)
    }
}

fn hook(
    name: &'static str,
    result: Result<()>,
    fault: &mut Option<InjectedFault>,
) -> std::result::Result<(), Abort> {
    result.map_err(|e| {
        *fault = Some(InjectedFault::HookFailed { hook: name });
        Abort::Rejected(format!("{}: {}", name, e))
    })
}
