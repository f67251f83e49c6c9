//! Record codec
//!
//! Encoding and decoding of a single record against a layout version.
//!
//! ## Record Format
//! ```text
//! ┌──────────┬────────────┬───────────┬──────────────┬────────────┐
//! │ Op (1)   │ BodyLen (4)│ TxId (8)  │ Body         │ CRC (4)*   │
//! └──────────┴────────────┴───────────┴──────────────┴────────────┘
//! ```
//! All integers are big-endian. The CRC32 covers every preceding byte of the
//! record and is present only when the layout version carries checksums.
//!
//! ### Body Fields
//! - integers:  fixed width, big-endian
//! - bool:      one byte, 0 or 1
//! - string:    len (4) + UTF-8 bytes
//! - optional:  presence byte (0/1) + value
//! - list:      count (4) + elements
//!
//! Encoding is deterministic: the same logical record always yields the same
//! bytes, which is what lets a binary -> text -> binary trip be byte-exact.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, DecodeErrorKind, EditLogError, Result};
use crate::log::LayoutVersion;
use crate::opcode::OpCode;

use super::{
    AddCloseOp, Block, CancelDelegationTokenOp, ClearNsQuotaOp, ConcatDeleteOp, DatanodeOp,
    DelegationTokenIdentifier, DelegationTokenOp, DeleteOp, MkdirOp, Op, PermissionStatus,
    ReassignLeaseOp, Record, RenameOldOp, RenameOp, SetGenstampOp, SetNsQuotaOp, SetOwnerOp,
    SetPermissionsOp, SetQuotaOp, SetReplicationOp, SymlinkOp, TimesOp, UpdateBlocksOp,
    UpdateMasterKeyOp,
};

/// Header size: opcode (1) + body length (4) + txid (8)
pub const RECORD_HEADER_SIZE: usize = 13;

/// Trailing checksum size in checksummed layouts
const CHECKSUM_SIZE: usize = 4;

/// Maximum body size (16 MB); larger lengths are treated as corruption
pub const MAX_BODY_LEN: u32 = 16 * 1024 * 1024;

/// Total encoded size of a record with the given body length
pub fn encoded_len(body_len: usize, version: LayoutVersion) -> usize {
    let trailer = if version.has_checksum() { CHECKSUM_SIZE } else { 0 };
    RECORD_HEADER_SIZE + body_len + trailer
}

// =============================================================================
// Field Wire Format
// =============================================================================

type FieldResult<T> = std::result::Result<T, String>;

/// A value with a fixed position-dependent binary encoding
trait Wire: Sized {
    fn put(&self, buf: &mut BytesMut);
    fn get(body: &mut &[u8]) -> FieldResult<Self>;
}

fn need(body: &[u8], n: usize, what: &str) -> FieldResult<()> {
    if body.remaining() < n {
        return Err(format!(
            "{} overruns record body ({} bytes needed, {} left)",
            what,
            n,
            body.remaining()
        ));
    }
    Ok(())
}

macro_rules! wire_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl Wire for $ty {
            fn put(&self, buf: &mut BytesMut) {
                buf.$put(*self);
            }
            fn get(body: &mut &[u8]) -> FieldResult<Self> {
                need(body, std::mem::size_of::<$ty>(), stringify!($ty))?;
                Ok(body.$get())
            }
        }
    };
}

wire_int!(u8, put_u8, get_u8);
wire_int!(u16, put_u16, get_u16);
wire_int!(i32, put_i32, get_i32);
wire_int!(i64, put_i64, get_i64);

impl Wire for bool {
    fn put(&self, buf: &mut BytesMut) {
        buf.put_u8(*self as u8);
    }
    fn get(body: &mut &[u8]) -> FieldResult<Self> {
        match u8::get(body)? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(format!("invalid bool byte {:#04x}", b)),
        }
    }
}

impl Wire for String {
    fn put(&self, buf: &mut BytesMut) {
        buf.put_u32(self.len() as u32);
        buf.put_slice(self.as_bytes());
    }
    fn get(body: &mut &[u8]) -> FieldResult<Self> {
        need(body, 4, "string length")?;
        let len = body.get_u32() as usize;
        need(body, len, "string")?;
        let s = std::str::from_utf8(&body[..len])
            .map_err(|e| format!("string is not UTF-8: {}", e))?
            .to_string();
        body.advance(len);
        Ok(s)
    }
}

impl<T: Wire> Wire for Option<T> {
    fn put(&self, buf: &mut BytesMut) {
        match self {
            Some(v) => {
                buf.put_u8(1);
                v.put(buf);
            }
            None => buf.put_u8(0),
        }
    }
    fn get(body: &mut &[u8]) -> FieldResult<Self> {
        if bool::get(body)? {
            Ok(Some(T::get(body)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn put(&self, buf: &mut BytesMut) {
        buf.put_u32(self.len() as u32);
        for item in self {
            item.put(buf);
        }
    }
    fn get(body: &mut &[u8]) -> FieldResult<Self> {
        need(body, 4, "list count")?;
        let count = body.get_u32() as usize;
        // Every element occupies at least one byte
        need(body, count, "list")?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::get(body)?);
        }
        Ok(items)
    }
}

/// Field-by-field encoding in declaration order
macro_rules! wire_struct {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl Wire for $ty {
            fn put(&self, buf: &mut BytesMut) {
                $( self.$field.put(buf); )*
            }
            fn get(body: &mut &[u8]) -> FieldResult<Self> {
                Ok(Self { $( $field: Wire::get(body)?, )* })
            }
        }
    };
}

wire_struct!(Block { block_id, num_bytes, gen_stamp });
wire_struct!(PermissionStatus { username, groupname, mode });
wire_struct!(DelegationTokenIdentifier {
    owner,
    renewer,
    real_user,
    issue_date,
    max_date,
    sequence_number,
    master_key_id,
});
wire_struct!(AddCloseOp {
    path,
    replication,
    mtime,
    atime,
    block_size,
    blocks,
    permissions,
    client_name,
    client_machine,
});
wire_struct!(RenameOldOp { src, dst, timestamp });
wire_struct!(DeleteOp { path, timestamp });
wire_struct!(MkdirOp { path, timestamp, permissions });
wire_struct!(SetReplicationOp { path, replication });
wire_struct!(DatanodeOp { node_id });
wire_struct!(SetPermissionsOp { src, mode });
wire_struct!(SetOwnerOp { src, username, groupname });
wire_struct!(SetGenstampOp { gen_stamp });
wire_struct!(SetNsQuotaOp { src, ns_quota });
wire_struct!(ClearNsQuotaOp { src });
wire_struct!(TimesOp { path, mtime, atime });
wire_struct!(SetQuotaOp { src, ns_quota, ds_quota });
wire_struct!(RenameOp { src, dst, timestamp, overwrite });
wire_struct!(ConcatDeleteOp { target, sources, timestamp });
wire_struct!(SymlinkOp { path, value, mtime, atime, permissions });
wire_struct!(DelegationTokenOp { token, expiry_time });
wire_struct!(CancelDelegationTokenOp { token });
wire_struct!(UpdateMasterKeyOp { key_id, expiry_date, key });
wire_struct!(ReassignLeaseOp { lease_holder, path, new_holder });
wire_struct!(UpdateBlocksOp { path, blocks });

fn put_body(op: &Op, buf: &mut BytesMut) {
    match op {
        Op::Add(o) | Op::Close(o) => o.put(buf),
        Op::RenameOld(o) => o.put(buf),
        Op::Delete(o) => o.put(buf),
        Op::Mkdir(o) => o.put(buf),
        Op::SetReplication(o) => o.put(buf),
        Op::DatanodeAdd(o) | Op::DatanodeRemove(o) => o.put(buf),
        Op::SetPermissions(o) => o.put(buf),
        Op::SetOwner(o) => o.put(buf),
        Op::SetGenstamp(o) => o.put(buf),
        Op::SetNsQuota(o) => o.put(buf),
        Op::ClearNsQuota(o) => o.put(buf),
        Op::Times(o) => o.put(buf),
        Op::SetQuota(o) => o.put(buf),
        Op::Rename(o) => o.put(buf),
        Op::ConcatDelete(o) => o.put(buf),
        Op::Symlink(o) => o.put(buf),
        Op::GetDelegationToken(o) | Op::RenewDelegationToken(o) => o.put(buf),
        Op::CancelDelegationToken(o) => o.put(buf),
        Op::UpdateMasterKey(o) => o.put(buf),
        Op::ReassignLease(o) => o.put(buf),
        Op::EndLogSegment {} | Op::StartLogSegment {} => {}
        Op::UpdateBlocks(o) => o.put(buf),
    }
}

fn get_body(opcode: OpCode, body: &mut &[u8]) -> FieldResult<Op> {
    let op = match opcode {
        OpCode::Add => Op::Add(Wire::get(body)?),
        OpCode::RenameOld => Op::RenameOld(Wire::get(body)?),
        OpCode::Delete => Op::Delete(Wire::get(body)?),
        OpCode::Mkdir => Op::Mkdir(Wire::get(body)?),
        OpCode::SetReplication => Op::SetReplication(Wire::get(body)?),
        OpCode::DatanodeAdd => Op::DatanodeAdd(Wire::get(body)?),
        OpCode::DatanodeRemove => Op::DatanodeRemove(Wire::get(body)?),
        OpCode::SetPermissions => Op::SetPermissions(Wire::get(body)?),
        OpCode::SetOwner => Op::SetOwner(Wire::get(body)?),
        OpCode::Close => Op::Close(Wire::get(body)?),
        OpCode::SetGenstamp => Op::SetGenstamp(Wire::get(body)?),
        OpCode::SetNsQuota => Op::SetNsQuota(Wire::get(body)?),
        OpCode::ClearNsQuota => Op::ClearNsQuota(Wire::get(body)?),
        OpCode::Times => Op::Times(Wire::get(body)?),
        OpCode::SetQuota => Op::SetQuota(Wire::get(body)?),
        OpCode::Rename => Op::Rename(Wire::get(body)?),
        OpCode::ConcatDelete => Op::ConcatDelete(Wire::get(body)?),
        OpCode::Symlink => Op::Symlink(Wire::get(body)?),
        OpCode::GetDelegationToken => Op::GetDelegationToken(Wire::get(body)?),
        OpCode::RenewDelegationToken => Op::RenewDelegationToken(Wire::get(body)?),
        OpCode::CancelDelegationToken => Op::CancelDelegationToken(Wire::get(body)?),
        OpCode::UpdateMasterKey => Op::UpdateMasterKey(Wire::get(body)?),
        OpCode::ReassignLease => Op::ReassignLease(Wire::get(body)?),
        OpCode::EndLogSegment => Op::EndLogSegment {},
        OpCode::StartLogSegment => Op::StartLogSegment {},
        OpCode::UpdateBlocks => Op::UpdateBlocks(Wire::get(body)?),
        OpCode::Invalid => return Err("OP_INVALID does not carry a record".to_string()),
    };
    Ok(op)
}

// =============================================================================
// Record Encoding/Decoding
// =============================================================================

/// Encode a record to bytes
///
/// Format: opcode (1) + body_len (4) + txid (8) + body [+ crc (4)]
pub fn encode_record(record: &Record, version: LayoutVersion) -> Result<Bytes> {
    let mut body = BytesMut::new();
    put_body(&record.op, &mut body);

    if body.len() > MAX_BODY_LEN as usize {
        return Err(EditLogError::Write(format!(
            "{} body too large: {} bytes (max {})",
            record.opcode(),
            body.len(),
            MAX_BODY_LEN
        )));
    }

    let mut buf = BytesMut::with_capacity(encoded_len(body.len(), version));
    buf.put_u8(record.opcode().as_byte());
    buf.put_u32(body.len() as u32);
    buf.put_u64(record.txid);
    buf.put_slice(&body);

    if version.has_checksum() {
        let crc = crc32fast::hash(&buf);
        buf.put_u32(crc);
    }

    Ok(buf.freeze())
}

/// Decode one record from the front of `bytes`
///
/// `offset` is the absolute position of `bytes[0]` in the segment and is
/// only used to locate errors. Returns the record and the number of bytes it
/// occupied. Validation order: opcode, header and length, body fields
/// against the opcode's schema, then the checksum.
pub fn decode_record(
    bytes: &[u8],
    offset: u64,
    version: LayoutVersion,
) -> std::result::Result<(Record, usize), DecodeError> {
    let fail = |kind| DecodeError::new(offset, kind);

    let Some(&code) = bytes.first() else {
        return Err(fail(DecodeErrorKind::Truncated { needed: 1, available: 0 }));
    };
    let opcode = match OpCode::from_byte(code) {
        Some(OpCode::Invalid) => {
            return Err(fail(DecodeErrorKind::Malformed(
                "OP_INVALID does not carry a record".to_string(),
            )))
        }
        Some(op) => op,
        None => return Err(fail(DecodeErrorKind::UnknownOpcode(code))),
    };

    if bytes.len() < RECORD_HEADER_SIZE {
        return Err(fail(DecodeErrorKind::Truncated {
            needed: RECORD_HEADER_SIZE,
            available: bytes.len(),
        }));
    }

    let mut header = &bytes[1..RECORD_HEADER_SIZE];
    let body_len = header.get_u32();
    let txid = header.get_u64();

    if body_len > MAX_BODY_LEN {
        return Err(fail(DecodeErrorKind::Malformed(format!(
            "body length {} exceeds maximum {}",
            body_len, MAX_BODY_LEN
        ))));
    }

    let total = encoded_len(body_len as usize, version);
    if bytes.len() < total {
        return Err(fail(DecodeErrorKind::Truncated {
            needed: total,
            available: bytes.len(),
        }));
    }

    let body_end = RECORD_HEADER_SIZE + body_len as usize;
    let mut body = &bytes[RECORD_HEADER_SIZE..body_end];
    let op = get_body(opcode, &mut body)
        .map_err(|reason| fail(DecodeErrorKind::Malformed(format!("{}: {}", opcode, reason))))?;
    if !body.is_empty() {
        return Err(fail(DecodeErrorKind::Malformed(format!(
            "{}: {} unread bytes in body",
            opcode,
            body.len()
        ))));
    }

    if version.has_checksum() {
        let mut trailer = &bytes[body_end..total];
        let expected = trailer.get_u32();
        let actual = crc32fast::hash(&bytes[..body_end]);
        if expected != actual {
            return Err(fail(DecodeErrorKind::ChecksumMismatch { expected, actual }));
        }
    }

    Ok((Record::new(txid, op), total))
}
