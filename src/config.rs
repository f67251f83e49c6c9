//! Configuration for editlog
//!
//! Centralized configuration with sensible defaults.

use crate::log::LayoutVersion;

/// Main configuration for log writers and readers
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Writer Configuration
    // -------------------------------------------------------------------------
    /// Layout version written into new segment headers
    pub layout_version: LayoutVersion,

    /// Sync strategy: how often to fsync the segment
    pub sync_strategy: SyncStrategy,

    /// When set, `close()` pads the segment with INVALID fill bytes up to the
    /// next multiple of this many bytes
    pub preallocation_chunk: Option<usize>,

    // -------------------------------------------------------------------------
    // Reader Configuration
    // -------------------------------------------------------------------------
    /// Resynchronization tuning for recovery-mode scans
    pub recovery: RecoveryConfig,

    /// Strict scans treat a missing end-of-segment marker as truncation
    pub require_end_marker: bool,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records
    EveryNRecords { count: usize },
}

/// How hard a recovery scan looks for the next trustworthy record boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Maximum number of bytes searched past a decode failure
    pub resync_window: usize,

    /// Consecutive decodable records required before a candidate offset is
    /// accepted as a resynchronization point
    pub min_resync_run: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            resync_window: 64 * 1024,
            min_resync_run: 2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout_version: LayoutVersion::CURRENT,
            sync_strategy: SyncStrategy::EveryNRecords { count: 100 },
            preallocation_chunk: None,
            recovery: RecoveryConfig::default(),
            require_end_marker: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the layout version for new segments
    pub fn layout_version(mut self, version: LayoutVersion) -> Self {
        self.config.layout_version = version;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Pad closed segments with fill bytes to a multiple of `chunk` bytes
    pub fn preallocation_chunk(mut self, chunk: usize) -> Self {
        self.config.preallocation_chunk = Some(chunk);
        self
    }

    /// Set the recovery lookahead window (in bytes)
    pub fn resync_window(mut self, bytes: usize) -> Self {
        self.config.recovery.resync_window = bytes;
        self
    }

    /// Set how many consecutive records confirm a resync point
    pub fn min_resync_run(mut self, records: usize) -> Self {
        self.config.recovery.min_resync_run = records;
        self
    }

    /// Whether strict scans require the end-of-segment marker
    pub fn require_end_marker(mut self, required: bool) -> Self {
        self.config.require_end_marker = required;
        self
    }

    pub fn build(self) -> crate::Result<Config> {
        if self.config.recovery.min_resync_run == 0 {
            return Err(crate::EditLogError::Config(
                "min_resync_run must be at least 1".to_string(),
            ));
        }
        if self.config.preallocation_chunk == Some(0) {
            return Err(crate::EditLogError::Config(
                "preallocation_chunk must be non-zero".to_string(),
            ));
        }
        if let SyncStrategy::EveryNRecords { count: 0 } = self.config.sync_strategy {
            return Err(crate::EditLogError::Config(
                "sync count must be non-zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}
