//! Checkpointing
//!
//! A secondary periodically pulls the primary's image and finalized
//! segments, merges them into a new image, and uploads it back. The primary
//! only installs an image that arrived intact, so an aborted round never
//! costs it its current image.
//!
//! ## Roles
//! ```text
//!   Primary ── image, segments ──▶ Secondary
//!      ▲                              │ merge
//!      └──────── merged image ────────┘
//! ```

mod coordinator;
mod fault;
mod primary;
mod transfer;

pub use coordinator::{
    CheckpointAttempt, CheckpointCoordinator, CheckpointOutcome, CheckpointState,
    ConsolidatingMerger, ImageMerger,
};
pub use fault::{CheckpointFaultInjector, NoFaults};
pub use primary::{ImagePointer, Primary, SegmentInfo, StagedImage};
pub use transfer::{package, InjectedFault, Transfer, TransferFault};
