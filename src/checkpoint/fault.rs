//! Checkpoint fault hooks
//!
//! Named decision points inside a checkpoint round. Production wiring uses
//! `NoFaults`; tests supply an injector that fails a hook or damages one of
//! the transferred files.

use std::path::Path;

use crate::error::Result;

/// Hook points consulted by the checkpoint coordinator
///
/// Every method defaults to "proceed normally". A hook returning `Err`
/// aborts the round as rejected.
pub trait CheckpointFaultInjector: Send + Sync {
    /// Before the primary sends response headers for an image download
    fn before_header(&self) -> Result<()> {
        Ok(())
    }

    /// After the primary has acknowledged the log roll
    fn after_log_roll(&self) -> Result<()> {
        Ok(())
    }

    /// While the secondary merges segments into the image
    fn during_merge(&self) -> Result<()> {
        Ok(())
    }

    /// After the merged image has been uploaded, before it is installed
    fn after_image_upload(&self) -> Result<()> {
        Ok(())
    }

    /// Immediately before `file` is transmitted
    fn before_file_send(&self, _file: &Path) -> Result<()> {
        Ok(())
    }

    /// Send `file` short by dropping its tail
    fn should_truncate(&self, _file: &Path) -> bool {
        false
    }

    /// Flip one byte of `file` in transit
    fn should_corrupt_byte(&self, _file: &Path) -> bool {
        false
    }
}

/// Injector that never interferes
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl CheckpointFaultInjector for NoFaults {}
