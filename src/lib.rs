//! # editlog
//!
//! The namespace edit log of a distributed filesystem metadata server:
//! - Opcode-tagged records with transaction ids
//! - Binary segments with optional CRC32 per record
//! - Strict and recovery-mode scanning with bounded resynchronization
//! - Binary <-> textual transcoding and opcode statistics
//! - Checkpoint rounds with fault-injection hooks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 editlog-viewer (CLI)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        Transcoders / Statistics  (LogVisitor impls)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  LogReader  │          │  LogWriter  │
//!   │(strict/recov)│         │  (append)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬───────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │ Record codec  │
//!               │ + OpCode set  │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod opcode;
pub mod record;
pub mod log;
pub mod visitor;
pub mod transcode;
pub mod stats;
pub mod generator;
pub mod checkpoint;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DecodeError, DecodeErrorKind, EditLogError, Result};
pub use config::Config;
pub use log::{LayoutVersion, LogReader, LogWriter, ScanMode, ScanResult};
pub use opcode::OpCode;
pub use record::{Op, Record};
pub use visitor::LogVisitor;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of editlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
