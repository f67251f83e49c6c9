//! Tests for the record codec
//!
//! These tests verify:
//! - Every live operation survives encode/decode in both layouts
//! - CRC32 corruption detection in the checksummed layout
//! - Truncated and malformed bytes are reported with their offset

use editlog::generator::sample_op;
use editlog::record::{
    decode_record, encode_record, encoded_len, MkdirOp, PermissionStatus, SetOwnerOp,
    UpdateMasterKeyOp, MAX_BODY_LEN, RECORD_HEADER_SIZE,
};
use editlog::{DecodeErrorKind, LayoutVersion, Op, OpCode, Record};

// =============================================================================
// Test Helpers
// =============================================================================

fn mkdir(txid: u64, path: &str) -> Record {
    Record::new(
        txid,
        Op::Mkdir(MkdirOp {
            path: path.to_string(),
            timestamp: 1_330_000_000_000,
            permissions: PermissionStatus {
                username: "hdfs".to_string(),
                groupname: "supergroup".to_string(),
                mode: 0o755,
            },
        }),
    )
}

// =============================================================================
// Encode / Decode Tests
// =============================================================================

#[test]
fn test_every_opcode_decodes_in_both_layouts() {
    for version in LayoutVersion::SUPPORTED {
        for (i, opcode) in OpCode::ALL.iter().copied().enumerate() {
            let Some(op) = sample_op(opcode, i as i64) else {
                continue;
            };
            let record = Record::new(100 + i as u64, op);
            let bytes = encode_record(&record, version).unwrap();

            let (decoded, used) = decode_record(&bytes, 0, version).unwrap();
            assert_eq!(decoded, record, "{} in layout {}", opcode, version);
            assert_eq!(used, bytes.len());
        }
    }
}

#[test]
fn test_header_layout() {
    let record = mkdir(0x0102_0304_0506_0708, "/a");
    let bytes = encode_record(&record, LayoutVersion::CHECKSUMMED).unwrap();

    assert_eq!(bytes[0], OpCode::Mkdir.as_byte());
    let body_len = u32::from_be_bytes(bytes[1..5].try_into().unwrap()) as usize;
    assert_eq!(&bytes[5..13], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(bytes.len(), encoded_len(body_len, LayoutVersion::CHECKSUMMED));
    assert_eq!(bytes.len(), RECORD_HEADER_SIZE + body_len + 4);

    let crc = u32::from_be_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
    assert_eq!(crc, crc32fast::hash(&bytes[..bytes.len() - 4]));
}

#[test]
fn test_optional_and_raw_fields() {
    let owner = Record::new(
        3,
        Op::SetOwner(SetOwnerOp {
            src: "/a".to_string(),
            username: None,
            groupname: Some("staff".to_string()),
        }),
    );
    let key = Record::new(
        4,
        Op::UpdateMasterKey(UpdateMasterKeyOp {
            key_id: 9,
            expiry_date: 77,
            key: vec![0x00, 0xFF, 0x10, 0x80],
        }),
    );

    for record in [owner, key] {
        let bytes = encode_record(&record, LayoutVersion::CURRENT).unwrap();
        let (decoded, _) = decode_record(&bytes, 0, LayoutVersion::CURRENT).unwrap();
        assert_eq!(decoded, record);
    }
}

#[test]
fn test_decode_reads_only_one_record() {
    let first = encode_record(&mkdir(1, "/a"), LayoutVersion::CURRENT).unwrap();
    let second = encode_record(&mkdir(2, "/b"), LayoutVersion::CURRENT).unwrap();
    let mut joined = first.to_vec();
    joined.extend_from_slice(&second);

    let (decoded, used) = decode_record(&joined, 0, LayoutVersion::CURRENT).unwrap();
    assert_eq!(decoded.txid, 1);
    assert_eq!(used, first.len());
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_crc_mismatch_detected() {
    let mut bytes = encode_record(&mkdir(1, "/dir"), LayoutVersion::CHECKSUMMED)
        .unwrap()
        .to_vec();
    // A byte inside the path string
    bytes[RECORD_HEADER_SIZE + 5] ^= 0x01;

    let err = decode_record(&bytes, 128, LayoutVersion::CHECKSUMMED).unwrap_err();
    assert_eq!(err.offset, 128);
    assert!(matches!(err.kind, DecodeErrorKind::ChecksumMismatch { .. }));
}

#[test]
fn test_error_offset_names_record_start() {
    let mut bytes = encode_record(&mkdir(1, "/dir"), LayoutVersion::CHECKSUMMED)
        .unwrap()
        .to_vec();
    // Damage near the end of the record, well past its first byte
    let last = bytes.len() - 1;
    bytes[last] ^= 0x10;

    let err = decode_record(&bytes, 4, LayoutVersion::CHECKSUMMED).unwrap_err();
    assert_eq!(err.offset, 4);
    assert!(
        err.to_string().starts_with("decode error in record starting at offset 4:"),
        "{}",
        err
    );
}

#[test]
fn test_txid_corruption_detected() {
    let mut bytes = encode_record(&mkdir(1, "/dir"), LayoutVersion::CHECKSUMMED)
        .unwrap()
        .to_vec();
    bytes[12] ^= 0x02;

    let err = decode_record(&bytes, 0, LayoutVersion::CHECKSUMMED).unwrap_err();
    assert!(matches!(err.kind, DecodeErrorKind::ChecksumMismatch { .. }));
}

#[test]
fn test_unknown_opcode() {
    let mut bytes = encode_record(&mkdir(1, "/dir"), LayoutVersion::CURRENT)
        .unwrap()
        .to_vec();
    bytes[0] = 0x42;

    let err = decode_record(&bytes, 9, LayoutVersion::CURRENT).unwrap_err();
    assert_eq!(err.offset, 9);
    assert_eq!(err.kind, DecodeErrorKind::UnknownOpcode(0x42));
}

#[test]
fn test_invalid_opcode_is_not_a_record() {
    let bytes = [0xFFu8; 32];
    let err = decode_record(&bytes, 0, LayoutVersion::CURRENT).unwrap_err();
    assert!(matches!(err.kind, DecodeErrorKind::Malformed(_)));
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncated_header() {
    let bytes = encode_record(&mkdir(1, "/dir"), LayoutVersion::CURRENT).unwrap();
    let err = decode_record(&bytes[..RECORD_HEADER_SIZE - 1], 0, LayoutVersion::CURRENT)
        .unwrap_err();

    assert!(err.is_truncation());
    assert_eq!(
        err.kind,
        DecodeErrorKind::Truncated {
            needed: RECORD_HEADER_SIZE,
            available: RECORD_HEADER_SIZE - 1,
        }
    );
}

#[test]
fn test_truncated_body_and_trailer() {
    let bytes = encode_record(&mkdir(1, "/dir"), LayoutVersion::CHECKSUMMED).unwrap();
    for cut in [RECORD_HEADER_SIZE, bytes.len() - 5, bytes.len() - 1] {
        let err = decode_record(&bytes[..cut], 0, LayoutVersion::CHECKSUMMED).unwrap_err();
        assert!(err.is_truncation(), "cut at {} gave {:?}", cut, err.kind);
    }
}

#[test]
fn test_oversized_body_length_rejected() {
    let mut bytes = encode_record(&mkdir(1, "/dir"), LayoutVersion::CURRENT)
        .unwrap()
        .to_vec();
    bytes[1..5].copy_from_slice(&(MAX_BODY_LEN + 1).to_be_bytes());

    let err = decode_record(&bytes, 0, LayoutVersion::CURRENT).unwrap_err();
    assert!(matches!(err.kind, DecodeErrorKind::Malformed(_)));
}
