//! Record Module
//!
//! One log entry: a transaction id plus an operation drawn from the finite
//! opcode set. `Op` is a tagged variant, so every consumer of the record
//! stream matches on typed fields rather than re-parsing bytes.
//!
//! ## Binary Layout (see `codec`)
//! ```text
//! ┌──────────┬────────────┬───────────┬──────────────┬────────────┐
//! │ Op (1)   │ BodyLen (4)│ TxId (8)  │ Body         │ CRC (4)*   │
//! └──────────┴────────────┴───────────┴──────────────┴────────────┘
//! * only in checksummed layout versions
//! ```
//!
//! ## Textual Layout
//! ```text
//! {"txid":3,"opcode":"OP_MKDIR","data":{"path":"/a","timestamp":..,"permissions":{..}}}
//! ```

mod codec;

use serde::{Deserialize, Serialize};

use crate::opcode::OpCode;

pub use codec::{decode_record, encode_record, encoded_len, RECORD_HEADER_SIZE, MAX_BODY_LEN};

/// A single entry in the edit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Transaction id - non-decreasing within a segment
    pub txid: u64,

    /// The namespace mutation
    #[serde(flatten)]
    pub op: Op,
}

impl Record {
    pub fn new(txid: u64, op: Op) -> Self {
        Self { txid, op }
    }

    pub fn opcode(&self) -> OpCode {
        self.op.opcode()
    }
}

// =============================================================================
// Shared Field Types
// =============================================================================

/// A file block reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: i64,
    pub num_bytes: i64,
    pub gen_stamp: i64,
}

/// Owner, group and mode bits of an inode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub username: String,
    pub groupname: String,
    pub mode: u16,
}

/// Identifies an issued delegation token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationTokenIdentifier {
    pub owner: String,
    pub renewer: String,
    pub real_user: String,
    pub issue_date: i64,
    pub max_date: i64,
    pub sequence_number: i32,
    pub master_key_id: i32,
}

// =============================================================================
// Per-Operation Payloads
// =============================================================================

/// Payload shared by OP_ADD and OP_CLOSE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCloseOp {
    pub path: String,
    pub replication: u16,
    pub mtime: i64,
    pub atime: i64,
    pub block_size: i64,
    pub blocks: Vec<Block>,
    pub permissions: PermissionStatus,
    /// Lease holder; empty for OP_CLOSE
    pub client_name: String,
    pub client_machine: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOldOp {
    pub src: String,
    pub dst: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOp {
    pub path: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MkdirOp {
    pub path: String,
    pub timestamp: i64,
    pub permissions: PermissionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReplicationOp {
    pub path: String,
    pub replication: u16,
}

/// Payload of the obsolete datanode registration opcodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatanodeOp {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPermissionsOp {
    pub src: String,
    pub mode: u16,
}

/// `None` leaves the corresponding attribute unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOwnerOp {
    pub src: String,
    pub username: Option<String>,
    pub groupname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetGenstampOp {
    pub gen_stamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNsQuotaOp {
    pub src: String,
    pub ns_quota: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearNsQuotaOp {
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesOp {
    pub path: String,
    pub mtime: i64,
    pub atime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQuotaOp {
    pub src: String,
    pub ns_quota: i64,
    pub ds_quota: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOp {
    pub src: String,
    pub dst: String,
    pub timestamp: i64,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatDeleteOp {
    pub target: String,
    pub sources: Vec<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkOp {
    pub path: String,
    pub value: String,
    pub mtime: i64,
    pub atime: i64,
    pub permissions: PermissionStatus,
}

/// Payload shared by the get and renew delegation token opcodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationTokenOp {
    pub token: DelegationTokenIdentifier,
    pub expiry_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDelegationTokenOp {
    pub token: DelegationTokenIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMasterKeyOp {
    pub key_id: i32,
    pub expiry_date: i64,
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignLeaseOp {
    pub lease_holder: String,
    pub path: String,
    pub new_holder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBlocksOp {
    pub path: String,
    pub blocks: Vec<Block>,
}

// =============================================================================
// Operation Variant
// =============================================================================

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opcode", content = "data")]
pub enum Op {
    #[serde(rename = "OP_ADD")]
    Add(AddCloseOp),
    #[serde(rename = "OP_RENAME_OLD")]
    RenameOld(RenameOldOp),
    #[serde(rename = "OP_DELETE")]
    Delete(DeleteOp),
    #[serde(rename = "OP_MKDIR")]
    Mkdir(MkdirOp),
    #[serde(rename = "OP_SET_REPLICATION")]
    SetReplication(SetReplicationOp),
    #[serde(rename = "OP_DATANODE_ADD")]
    DatanodeAdd(DatanodeOp),
    #[serde(rename = "OP_DATANODE_REMOVE")]
    DatanodeRemove(DatanodeOp),
    #[serde(rename = "OP_SET_PERMISSIONS")]
    SetPermissions(SetPermissionsOp),
    #[serde(rename = "OP_SET_OWNER")]
    SetOwner(SetOwnerOp),
    #[serde(rename = "OP_CLOSE")]
    Close(AddCloseOp),
    #[serde(rename = "OP_SET_GENSTAMP")]
    SetGenstamp(SetGenstampOp),
    #[serde(rename = "OP_SET_NS_QUOTA")]
    SetNsQuota(SetNsQuotaOp),
    #[serde(rename = "OP_CLEAR_NS_QUOTA")]
    ClearNsQuota(ClearNsQuotaOp),
    #[serde(rename = "OP_TIMES")]
    Times(TimesOp),
    #[serde(rename = "OP_SET_QUOTA")]
    SetQuota(SetQuotaOp),
    #[serde(rename = "OP_RENAME")]
    Rename(RenameOp),
    #[serde(rename = "OP_CONCAT_DELETE")]
    ConcatDelete(ConcatDeleteOp),
    #[serde(rename = "OP_SYMLINK")]
    Symlink(SymlinkOp),
    #[serde(rename = "OP_GET_DELEGATION_TOKEN")]
    GetDelegationToken(DelegationTokenOp),
    #[serde(rename = "OP_RENEW_DELEGATION_TOKEN")]
    RenewDelegationToken(DelegationTokenOp),
    #[serde(rename = "OP_CANCEL_DELEGATION_TOKEN")]
    CancelDelegationToken(CancelDelegationTokenOp),
    #[serde(rename = "OP_UPDATE_MASTER_KEY")]
    UpdateMasterKey(UpdateMasterKeyOp),
    #[serde(rename = "OP_REASSIGN_LEASE")]
    ReassignLease(ReassignLeaseOp),
    #[serde(rename = "OP_END_LOG_SEGMENT")]
    EndLogSegment {},
    #[serde(rename = "OP_START_LOG_SEGMENT")]
    StartLogSegment {},
    #[serde(rename = "OP_UPDATE_BLOCKS")]
    UpdateBlocks(UpdateBlocksOp),
}

impl Op {
    /// Get the opcode this operation is logged under
    pub fn opcode(&self) -> OpCode {
        match self {
            Op::Add(_) => OpCode::Add,
            Op::RenameOld(_) => OpCode::RenameOld,
            Op::Delete(_) => OpCode::Delete,
            Op::Mkdir(_) => OpCode::Mkdir,
            Op::SetReplication(_) => OpCode::SetReplication,
            Op::DatanodeAdd(_) => OpCode::DatanodeAdd,
            Op::DatanodeRemove(_) => OpCode::DatanodeRemove,
            Op::SetPermissions(_) => OpCode::SetPermissions,
            Op::SetOwner(_) => OpCode::SetOwner,
            Op::Close(_) => OpCode::Close,
            Op::SetGenstamp(_) => OpCode::SetGenstamp,
            Op::SetNsQuota(_) => OpCode::SetNsQuota,
            Op::ClearNsQuota(_) => OpCode::ClearNsQuota,
            Op::Times(_) => OpCode::Times,
            Op::SetQuota(_) => OpCode::SetQuota,
            Op::Rename(_) => OpCode::Rename,
            Op::ConcatDelete(_) => OpCode::ConcatDelete,
            Op::Symlink(_) => OpCode::Symlink,
            Op::GetDelegationToken(_) => OpCode::GetDelegationToken,
            Op::RenewDelegationToken(_) => OpCode::RenewDelegationToken,
            Op::CancelDelegationToken(_) => OpCode::CancelDelegationToken,
            Op::UpdateMasterKey(_) => OpCode::UpdateMasterKey,
            Op::ReassignLease(_) => OpCode::ReassignLease,
            Op::EndLogSegment {} => OpCode::EndLogSegment,
            Op::StartLogSegment {} => OpCode::StartLogSegment,
            Op::UpdateBlocks(_) => OpCode::UpdateBlocks,
        }
    }
}

/// Raw byte fields travel as base64 strings in the textual form
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
