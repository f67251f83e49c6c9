//! Primary metadata server storage
//!
//! Owns the active segment, the finalized segments awaiting a checkpoint,
//! and the pointer to the authoritative image.
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   ├── image_<txid>                 (authoritative image, covers txids <= txid)
//!   ├── edits_<first>-<last>         (finalized segments)
//!   └── edits_inprogress_<first>     (active segment)
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::log::LogWriter;
use crate::record::Op;

/// A finalized segment and the transaction ids it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub path: PathBuf,
    pub first_txid: u64,
    pub last_txid: u64,
}

/// The image the primary currently trusts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePointer {
    pub path: PathBuf,
    /// Highest transaction id folded into the image
    pub last_txid: u64,
}

/// A received image that has not been installed yet; dropping it discards
/// the staged file
pub struct StagedImage {
    file: NamedTempFile,
    last_txid: u64,
}

struct ActiveSegment {
    writer: LogWriter<BufWriter<File>>,
    path: PathBuf,
    first_txid: u64,
}

struct PrimaryState {
    active: ActiveSegment,
    finalized: Vec<SegmentInfo>,
    image: ImagePointer,
}

/// Storage role of the primary
///
/// ## Concurrency:
/// - `state`: serializes the single log writer, rolls and image swaps
/// - `round`: held for the whole of a checkpoint round so rounds never overlap
pub struct Primary {
    dir: PathBuf,
    config: Config,
    state: Mutex<PrimaryState>,
    round: Mutex<()>,
}

pub(crate) fn image_name(last_txid: u64) -> String {
    format!("image_{:019}", last_txid)
}

fn inprogress_name(first_txid: u64) -> String {
    format!("edits_inprogress_{:019}", first_txid)
}

fn finalized_name(first_txid: u64, last_txid: u64) -> String {
    format!("edits_{:019}-{:019}", first_txid, last_txid)
}

impl Primary {
    /// Initialize empty storage in `dir`: an empty image and a fresh segment
    pub fn format(dir: &Path, config: Config) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let image_path = dir.join(image_name(0));
        LogWriter::create(&image_path, &config)?.close()?;

        let active = Self::start_segment(dir, &config, 1)?;
        info!(dir = %dir.display(), "Formatted primary storage");

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            state: Mutex::new(PrimaryState {
                active,
                finalized: Vec::new(),
                image: ImagePointer {
                    path: image_path,
                    last_txid: 0,
                },
            }),
            round: Mutex::new(()),
        })
    }

    fn start_segment(dir: &Path, config: &Config, first_txid: u64) -> Result<ActiveSegment> {
        let path = dir.join(inprogress_name(first_txid));
        let mut writer = LogWriter::create(&path, config)?.starting_at(first_txid);
        writer.append(Op::StartLogSegment {})?;
        Ok(ActiveSegment {
            writer,
            path,
            first_txid,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Log a namespace mutation to the active segment
    pub fn log_op(&self, op: Op) -> Result<u64> {
        self.state.lock().active.writer.append(op)
    }

    /// Make everything logged so far durable
    pub fn sync(&self) -> Result<()> {
        self.state.lock().active.writer.flush()
    }

    /// Path of the active segment and the offset readers may scan up to
    pub fn active_segment(&self) -> (PathBuf, u64) {
        let state = self.state.lock();
        (state.active.path.clone(), state.active.writer.flushed_offset())
    }

    pub fn image(&self) -> ImagePointer {
        self.state.lock().image.clone()
    }

    pub fn finalized_segments(&self) -> Vec<SegmentInfo> {
        self.state.lock().finalized.clone()
    }

    /// Finalized segments not yet folded into the image
    pub fn segments_after(&self, txid: u64) -> Vec<SegmentInfo> {
        self.state
            .lock()
            .finalized
            .iter()
            .filter(|s| s.last_txid > txid)
            .cloned()
            .collect()
    }

    /// Close the active segment and start a new one
    ///
    /// The next segment is opened before the end marker is written, so a
    /// failure to open it leaves the active segment untouched. Once the end
    /// marker is in, the old segment is tracked as finalized even if closing
    /// or renaming it fails; a later round then sees its records.
    pub fn roll_edit_log(&self) -> Result<SegmentInfo> {
        let mut state = self.state.lock();

        let last_txid = state.active.writer.next_txid();
        let next = Self::start_segment(&self.dir, &self.config, last_txid + 1)?;
        if let Err(e) = state.active.writer.append(Op::EndLogSegment {}) {
            let unused = next.path.clone();
            drop(next);
            if let Err(remove_err) = fs::remove_file(&unused) {
                warn!(path = %unused.display(), error = %remove_err, "Failed to remove unused segment");
            }
            return Err(e);
        }
        let old = std::mem::replace(&mut state.active, next);

        let finalized = old.writer.close().and_then(|_| {
            let path = self.dir.join(finalized_name(old.first_txid, last_txid));
            fs::rename(&old.path, &path)?;
            Ok(path)
        });
        let info = SegmentInfo {
            path: finalized.as_ref().map_or_else(|_| old.path.clone(), Clone::clone),
            first_txid: old.first_txid,
            last_txid,
        };
        state.finalized.push(info.clone());
        finalized?;

        debug!(first = info.first_txid, last = info.last_txid, "Rolled edit log");
        Ok(info)
    }

    /// Claim the checkpoint round; `None` if one is already running
    pub(crate) fn try_begin_round(&self) -> Option<MutexGuard<'_, ()>> {
        self.round.try_lock()
    }

    /// Write an uploaded image to a staging file in the storage directory
    pub fn stage_image(&self, bytes: &[u8], last_txid: u64) -> Result<StagedImage> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        Ok(StagedImage { file, last_txid })
    }

    /// Install a staged image and retire what it supersedes
    pub fn commit_image(&self, staged: StagedImage) -> Result<ImagePointer> {
        let path = self.dir.join(image_name(staged.last_txid));
        staged.file.persist(&path).map_err(|e| e.error)?;

        let mut state = self.state.lock();
        let previous = std::mem::replace(
            &mut state.image,
            ImagePointer {
                path,
                last_txid: staged.last_txid,
            },
        );
        if previous.path != state.image.path {
            fs::remove_file(&previous.path)?;
        }

        let (retired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.finalized)
            .into_iter()
            .partition(|s| s.last_txid <= staged.last_txid);
        state.finalized = kept;
        for segment in &retired {
            fs::remove_file(&segment.path)?;
        }

        info!(
            image_txid = staged.last_txid,
            retired_segments = retired.len(),
            "Installed checkpoint image"
        );
        Ok(state.image.clone())
    }
}
