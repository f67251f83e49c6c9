//! File transfer between checkpoint roles
//!
//! Each file travels as a bincode header (name, advertised length, CRC32)
//! plus the body. The receiver checks the body against the header, which is
//! how a short or corrupted delivery is told apart from a good one.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::Result;

use super::CheckpointFaultInjector;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TransferHeader {
    name: String,
    length: u64,
    crc32: u32,
}

/// A fault forced by the injector while packaging a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFault {
    Truncated { file: String },
    CorruptedByte { file: String },
    HookFailed { hook: &'static str },
}

/// A file as it crosses the wire
#[derive(Debug, Clone)]
pub struct Transfer {
    header: Vec<u8>,
    body: Vec<u8>,
}

/// Why a received file was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferFault {
    #[error("{name}: received {received} of {expected} bytes")]
    ShortFile { name: String, expected: u64, received: u64 },

    #[error("{name}: checksum mismatch")]
    CorruptedByte { name: String },

    #[error("unreadable transfer header: {0}")]
    BadHeader(String),
}

/// Read `path` and package it for sending, applying any injected damage
/// after the header has been computed
pub fn package(
    path: &Path,
    injector: &dyn CheckpointFaultInjector,
) -> Result<(Transfer, Option<InjectedFault>)> {
    let mut body = fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let header = TransferHeader {
        name: name.clone(),
        length: body.len() as u64,
        crc32: crc32fast::hash(&body),
    };
    let header = bincode::serialize(&header)?;

    let mut fault = None;
    if injector.should_truncate(path) && !body.is_empty() {
        warn!(file = %name, "Injecting short file");
        body.truncate(body.len() / 2);
        fault = Some(InjectedFault::Truncated { file: name });
    } else if injector.should_corrupt_byte(path) && !body.is_empty() {
        warn!(file = %name, "Injecting corrupted byte");
        let at = body.len() / 2;
        body[at] ^= 0xFF;
        fault = Some(InjectedFault::CorruptedByte { file: name });
    }

    Ok((Transfer { header, body }, fault))
}

impl Transfer {
    /// Verify the body against its header and hand it over
    pub fn receive(self) -> std::result::Result<(String, Vec<u8>), TransferFault> {
        let header: TransferHeader = bincode::deserialize(&self.header)
            .map_err(|e| TransferFault::BadHeader(e.to_string()))?;

        if self.body.len() as u64 != header.length {
            return Err(TransferFault::ShortFile {
                name: header.name,
                expected: header.length,
                received: self.body.len() as u64,
            });
        }
        if crc32fast::hash(&self.body) != header.crc32 {
            return Err(TransferFault::CorruptedByte { name: header.name });
        }
        Ok((header.name, self.body))
    }
}

impl From<TransferFault> for crate::EditLogError {
    fn from(e: TransferFault) -> Self {
        crate::EditLogError::Transfer(e.to_string())
    }
}
