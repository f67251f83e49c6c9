//! Edits generator
//!
//! Builds segments that exercise every live opcode at least once, for format
//! coverage checks and for seeding the viewer with sample input.

use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::log::{LogWriter, SyncWrite};
use crate::opcode::OpCode;
use crate::record::{
    AddCloseOp, Block, CancelDelegationTokenOp, ClearNsQuotaOp, ConcatDeleteOp, DatanodeOp,
    DelegationTokenIdentifier, DelegationTokenOp, DeleteOp, MkdirOp, Op, PermissionStatus,
    ReassignLeaseOp, RenameOldOp, RenameOp, SetGenstampOp, SetNsQuotaOp, SetOwnerOp,
    SetPermissionsOp, SetQuotaOp, SetReplicationOp, SymlinkOp, TimesOp, UpdateBlocksOp,
    UpdateMasterKeyOp,
};

const BASE_TIME: i64 = 1_330_000_000_000;

fn perms(mode: u16) -> PermissionStatus {
    PermissionStatus {
        username: "hdfs".to_string(),
        groupname: "supergroup".to_string(),
        mode,
    }
}

fn blocks(seq: i64, count: i64) -> Vec<Block> {
    (0..count)
        .map(|i| Block {
            block_id: 1_073_741_825 + seq * 10 + i,
            num_bytes: 512 * (i + 1),
            gen_stamp: 1_001 + seq,
        })
        .collect()
}

fn token(seq: i64) -> DelegationTokenIdentifier {
    DelegationTokenIdentifier {
        owner: "alice".to_string(),
        renewer: "JobTracker".to_string(),
        real_user: String::new(),
        issue_date: BASE_TIME + seq,
        max_date: BASE_TIME + seq + 604_800_000,
        sequence_number: seq as i32,
        master_key_id: 2,
    }
}

fn file(path: String, seq: i64, client: &str) -> AddCloseOp {
    AddCloseOp {
        path,
        replication: 3,
        mtime: BASE_TIME + seq,
        atime: BASE_TIME + seq,
        block_size: 64 * 1024 * 1024,
        blocks: blocks(seq, if client.is_empty() { 2 } else { 0 }),
        permissions: perms(0o644),
        client_name: client.to_string(),
        client_machine: if client.is_empty() { String::new() } else { "127.0.0.1".to_string() },
    }
}

/// A representative operation for `opcode`; `None` for INVALID
///
/// `seq` varies paths and timestamps so repeated calls yield distinct records.
pub fn sample_op(opcode: OpCode, seq: i64) -> Option<Op> {
    let path = |name: &str| format!("/gen/{}{}", name, seq);
    let ts = BASE_TIME + seq;
    let op = match opcode {
        OpCode::Add => Op::Add(file(path("file"), seq, "DFSClient_1")),
        OpCode::RenameOld => Op::RenameOld(RenameOldOp {
            src: path("file"),
            dst: path("renamed_old"),
            timestamp: ts,
        }),
        OpCode::Delete => Op::Delete(DeleteOp { path: path("renamed"), timestamp: ts }),
        OpCode::Mkdir => Op::Mkdir(MkdirOp {
            path: path("dir"),
            timestamp: ts,
            permissions: perms(0o755),
        }),
        OpCode::SetReplication => Op::SetReplication(SetReplicationOp {
            path: path("file"),
            replication: 1,
        }),
        OpCode::DatanodeAdd => Op::DatanodeAdd(DatanodeOp { node_id: format!("dn-{}", seq) }),
        OpCode::DatanodeRemove => {
            Op::DatanodeRemove(DatanodeOp { node_id: format!("dn-{}", seq) })
        }
        OpCode::SetPermissions => Op::SetPermissions(SetPermissionsOp {
            src: path("file"),
            mode: 0o600,
        }),
        OpCode::SetOwner => Op::SetOwner(SetOwnerOp {
            src: path("file"),
            username: Some("bob".to_string()),
            groupname: None,
        }),
        OpCode::Close => Op::Close(file(path("file"), seq, "")),
        OpCode::SetGenstamp => Op::SetGenstamp(SetGenstampOp { gen_stamp: 1_001 + seq }),
        OpCode::SetNsQuota => Op::SetNsQuota(SetNsQuotaOp { src: path("dir"), ns_quota: 1_000 }),
        OpCode::ClearNsQuota => Op::ClearNsQuota(ClearNsQuotaOp { src: path("dir") }),
        OpCode::Times => Op::Times(TimesOp {
            path: path("file"),
            mtime: ts,
            atime: ts + 1,
        }),
        OpCode::SetQuota => Op::SetQuota(SetQuotaOp {
            src: path("dir"),
            ns_quota: 1_000,
            ds_quota: -1,
        }),
        OpCode::Rename => Op::Rename(RenameOp {
            src: path("renamed_old"),
            dst: path("renamed"),
            timestamp: ts,
            overwrite: true,
        }),
        OpCode::ConcatDelete => Op::ConcatDelete(ConcatDeleteOp {
            target: path("concat_target"),
            sources: vec![path("concat_0"), path("concat_1")],
            timestamp: ts,
        }),
        OpCode::Symlink => Op::Symlink(SymlinkOp {
            path: path("link"),
            value: path("file"),
            mtime: ts,
            atime: ts,
            permissions: perms(0o777),
        }),
        OpCode::GetDelegationToken => Op::GetDelegationToken(DelegationTokenOp {
            token: token(seq),
            expiry_time: ts + 86_400_000,
        }),
        OpCode::RenewDelegationToken => Op::RenewDelegationToken(DelegationTokenOp {
            token: token(seq),
            expiry_time: ts + 2 * 86_400_000,
        }),
        OpCode::CancelDelegationToken => {
            Op::CancelDelegationToken(CancelDelegationTokenOp { token: token(seq) })
        }
        OpCode::UpdateMasterKey => Op::UpdateMasterKey(UpdateMasterKeyOp {
            key_id: 2,
            expiry_date: ts + 86_400_000,
            key: (0..20).map(|i| (i as u8).wrapping_mul(37).wrapping_add(seq as u8)).collect(),
        }),
        OpCode::ReassignLease => Op::ReassignLease(ReassignLeaseOp {
            lease_holder: "DFSClient_1".to_string(),
            path: path("file"),
            new_holder: "HDFS_NameNode".to_string(),
        }),
        OpCode::EndLogSegment => Op::EndLogSegment {},
        OpCode::StartLogSegment => Op::StartLogSegment {},
        OpCode::UpdateBlocks => Op::UpdateBlocks(UpdateBlocksOp {
            path: path("file"),
            blocks: blocks(seq, 1),
        }),
        OpCode::Invalid => return None,
    };
    Some(op)
}

/// Append one record for every live opcode, bracketed by start/end segment
/// markers. Returns the last transaction id written.
pub fn generate_all_ops<W: SyncWrite>(writer: &mut LogWriter<W>) -> Result<u64> {
    let mut last = writer.append(Op::StartLogSegment {})?;
    for (seq, opcode) in OpCode::ALL.iter().copied().enumerate() {
        if opcode.is_obsolete()
            || matches!(opcode, OpCode::StartLogSegment | OpCode::EndLogSegment)
        {
            continue;
        }
        if let Some(op) = sample_op(opcode, seq as i64) {
            last = writer.append(op)?;
        }
    }
    last = writer.append(Op::EndLogSegment {})?;
    Ok(last)
}

/// Write a finalized segment covering every live opcode to `path`
pub fn generate_segment(path: &Path, config: &Config) -> Result<u64> {
    let mut writer = LogWriter::create(path, config)?;
    let last = generate_all_ops(&mut writer)?;
    writer.close()?;
    debug!(path = %path.display(), last_txid = last, "Generated edits");
    Ok(last)
}
