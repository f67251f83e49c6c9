//! Opcode Registry
//!
//! Static mapping from the one-byte code at the head of every record to the
//! operation it names.
//!
//! ## Code Table
//! ```text
//! 0x00 OP_ADD                  0x0d OP_TIMES
//! 0x01 OP_RENAME_OLD           0x0e OP_SET_QUOTA
//! 0x02 OP_DELETE               0x0f OP_RENAME
//! 0x03 OP_MKDIR                0x10 OP_CONCAT_DELETE
//! 0x04 OP_SET_REPLICATION      0x11 OP_SYMLINK
//! 0x05 OP_DATANODE_ADD    (*)  0x12 OP_GET_DELEGATION_TOKEN
//! 0x06 OP_DATANODE_REMOVE (*)  0x13 OP_RENEW_DELEGATION_TOKEN
//! 0x07 OP_SET_PERMISSIONS      0x14 OP_CANCEL_DELEGATION_TOKEN
//! 0x08 OP_SET_OWNER            0x15 OP_UPDATE_MASTER_KEY
//! 0x09 OP_CLOSE                0x16 OP_REASSIGN_LEASE
//! 0x0a OP_SET_GENSTAMP         0x17 OP_END_LOG_SEGMENT
//! 0x0b OP_SET_NS_QUOTA    (*)  0x18 OP_START_LOG_SEGMENT
//! 0x0c OP_CLEAR_NS_QUOTA  (*)  0x19 OP_UPDATE_BLOCKS
//!                              0xff OP_INVALID (end marker / fill)
//! (*) obsolete: decodable, never written by current code
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EditLogError, Result};

/// Byte value of the INVALID sentinel, also used as segment fill
pub const INVALID_BYTE: u8 = 0xFF;

/// Identifier for the kind of namespace mutation a record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    #[serde(rename = "OP_ADD")]
    Add = 0x00,
    #[serde(rename = "OP_RENAME_OLD")]
    RenameOld = 0x01,
    #[serde(rename = "OP_DELETE")]
    Delete = 0x02,
    #[serde(rename = "OP_MKDIR")]
    Mkdir = 0x03,
    #[serde(rename = "OP_SET_REPLICATION")]
    SetReplication = 0x04,
    #[serde(rename = "OP_DATANODE_ADD")]
    DatanodeAdd = 0x05,
    #[serde(rename = "OP_DATANODE_REMOVE")]
    DatanodeRemove = 0x06,
    #[serde(rename = "OP_SET_PERMISSIONS")]
    SetPermissions = 0x07,
    #[serde(rename = "OP_SET_OWNER")]
    SetOwner = 0x08,
    #[serde(rename = "OP_CLOSE")]
    Close = 0x09,
    #[serde(rename = "OP_SET_GENSTAMP")]
    SetGenstamp = 0x0a,
    #[serde(rename = "OP_SET_NS_QUOTA")]
    SetNsQuota = 0x0b,
    #[serde(rename = "OP_CLEAR_NS_QUOTA")]
    ClearNsQuota = 0x0c,
    #[serde(rename = "OP_TIMES")]
    Times = 0x0d,
    #[serde(rename = "OP_SET_QUOTA")]
    SetQuota = 0x0e,
    #[serde(rename = "OP_RENAME")]
    Rename = 0x0f,
    #[serde(rename = "OP_CONCAT_DELETE")]
    ConcatDelete = 0x10,
    #[serde(rename = "OP_SYMLINK")]
    Symlink = 0x11,
    #[serde(rename = "OP_GET_DELEGATION_TOKEN")]
    GetDelegationToken = 0x12,
    #[serde(rename = "OP_RENEW_DELEGATION_TOKEN")]
    RenewDelegationToken = 0x13,
    #[serde(rename = "OP_CANCEL_DELEGATION_TOKEN")]
    CancelDelegationToken = 0x14,
    #[serde(rename = "OP_UPDATE_MASTER_KEY")]
    UpdateMasterKey = 0x15,
    #[serde(rename = "OP_REASSIGN_LEASE")]
    ReassignLease = 0x16,
    #[serde(rename = "OP_END_LOG_SEGMENT")]
    EndLogSegment = 0x17,
    #[serde(rename = "OP_START_LOG_SEGMENT")]
    StartLogSegment = 0x18,
    #[serde(rename = "OP_UPDATE_BLOCKS")]
    UpdateBlocks = 0x19,
    #[serde(rename = "OP_INVALID")]
    Invalid = 0xFF,
}

impl OpCode {
    /// Every registered opcode, in code order (INVALID last)
    pub const ALL: [OpCode; 27] = [
        OpCode::Add,
        OpCode::RenameOld,
        OpCode::Delete,
        OpCode::Mkdir,
        OpCode::SetReplication,
        OpCode::DatanodeAdd,
        OpCode::DatanodeRemove,
        OpCode::SetPermissions,
        OpCode::SetOwner,
        OpCode::Close,
        OpCode::SetGenstamp,
        OpCode::SetNsQuota,
        OpCode::ClearNsQuota,
        OpCode::Times,
        OpCode::SetQuota,
        OpCode::Rename,
        OpCode::ConcatDelete,
        OpCode::Symlink,
        OpCode::GetDelegationToken,
        OpCode::RenewDelegationToken,
        OpCode::CancelDelegationToken,
        OpCode::UpdateMasterKey,
        OpCode::ReassignLease,
        OpCode::EndLogSegment,
        OpCode::StartLogSegment,
        OpCode::UpdateBlocks,
        OpCode::Invalid,
    ];

    /// Converts a byte to an opcode. Unknown codes are reported, not panicked on.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00..=0x19 => Some(Self::ALL[b as usize]),
            INVALID_BYTE => Some(Self::Invalid),
            _ => None,
        }
    }

    /// Converts the opcode to its byte
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// The INVALID sentinel
    pub const fn invalid() -> Self {
        Self::Invalid
    }

    /// Obsolete opcodes can still be read from old segments
    pub fn is_obsolete(self) -> bool {
        matches!(
            self,
            Self::DatanodeAdd | Self::DatanodeRemove | Self::SetNsQuota | Self::ClearNsQuota
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "OP_ADD",
            Self::RenameOld => "OP_RENAME_OLD",
            Self::Delete => "OP_DELETE",
            Self::Mkdir => "OP_MKDIR",
            Self::SetReplication => "OP_SET_REPLICATION",
            Self::DatanodeAdd => "OP_DATANODE_ADD",
            Self::DatanodeRemove => "OP_DATANODE_REMOVE",
            Self::SetPermissions => "OP_SET_PERMISSIONS",
            Self::SetOwner => "OP_SET_OWNER",
            Self::Close => "OP_CLOSE",
            Self::SetGenstamp => "OP_SET_GENSTAMP",
            Self::SetNsQuota => "OP_SET_NS_QUOTA",
            Self::ClearNsQuota => "OP_CLEAR_NS_QUOTA",
            Self::Times => "OP_TIMES",
            Self::SetQuota => "OP_SET_QUOTA",
            Self::Rename => "OP_RENAME",
            Self::ConcatDelete => "OP_CONCAT_DELETE",
            Self::Symlink => "OP_SYMLINK",
            Self::GetDelegationToken => "OP_GET_DELEGATION_TOKEN",
            Self::RenewDelegationToken => "OP_RENEW_DELEGATION_TOKEN",
            Self::CancelDelegationToken => "OP_CANCEL_DELEGATION_TOKEN",
            Self::UpdateMasterKey => "OP_UPDATE_MASTER_KEY",
            Self::ReassignLease => "OP_REASSIGN_LEASE",
            Self::EndLogSegment => "OP_END_LOG_SEGMENT",
            Self::StartLogSegment => "OP_START_LOG_SEGMENT",
            Self::UpdateBlocks => "OP_UPDATE_BLOCKS",
            Self::Invalid => "OP_INVALID",
        }
    }

    /// The opcodes a completeness check skips by default
    pub fn obsolete_set() -> BTreeSet<OpCode> {
        Self::ALL.iter().copied().filter(|op| op.is_obsolete()).collect()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpCode {
    type Err = EditLogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| EditLogError::Config(format!("unknown opcode name: {}", s)))
    }
}

/// Look up a raw code; `None` means the byte names no registered operation
pub fn lookup(code: u8) -> Option<OpCode> {
    OpCode::from_byte(code)
}

/// Whether a raw code names an obsolete operation
pub fn is_obsolete(code: u8) -> bool {
    lookup(code).map(OpCode::is_obsolete).unwrap_or(false)
}
