//! Transcoders
//!
//! Visitors and producers that move a record stream between the binary
//! segment form and the textual form.
//!
//! ## Paths
//! ```text
//!   binary ──LogReader──▶ BinaryEmitter ──▶ binary
//!   binary ──LogReader──▶ TextEmitter   ──▶ text
//!   text   ──TextParser─▶ BinaryEmitter ──▶ binary
//!   either ─────────────▶ StatisticsCollector
//! ```
//!
//! For any segment read in strict mode, binary -> text -> binary reproduces
//! the input byte for byte, up to trailing INVALID fill.

mod binary;
mod convert;
mod text;

pub use binary::BinaryEmitter;
pub use convert::{
    collect_statistics, convert, sniff_input, ConversionReport, InputKind, ProcessorKind,
};
pub use text::{TextDocument, TextEmitter, TextParser};
