//! Tests for the opcode registry
//!
//! These tests verify:
//! - Every registered code maps back to itself
//! - Unknown codes are reported rather than guessed
//! - The obsolete set is exactly the retired operations

use std::collections::BTreeSet;

use editlog::generator::sample_op;
use editlog::opcode::{is_obsolete, lookup, INVALID_BYTE};
use editlog::OpCode;

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_lookup_round_trips_every_code() {
    for op in OpCode::ALL {
        assert_eq!(lookup(op.as_byte()), Some(op));
        assert_eq!(OpCode::from_byte(op.as_byte()), Some(op));
    }
}

#[test]
fn test_lookup_unknown_code() {
    for code in 0x1A..0xFF {
        assert_eq!(lookup(code), None, "code {:#04x} should be unknown", code);
    }
}

#[test]
fn test_invalid_is_reserved_byte() {
    assert_eq!(OpCode::invalid(), OpCode::Invalid);
    assert_eq!(OpCode::Invalid.as_byte(), INVALID_BYTE);
    assert_eq!(lookup(0xFF), Some(OpCode::Invalid));
}

#[test]
fn test_codes_are_distinct() {
    let codes: BTreeSet<u8> = OpCode::ALL.iter().map(|op| op.as_byte()).collect();
    assert_eq!(codes.len(), OpCode::ALL.len());
}

// =============================================================================
// Obsolete Set Tests
// =============================================================================

#[test]
fn test_obsolete_set_contents() {
    let expected: BTreeSet<OpCode> = [
        OpCode::DatanodeAdd,
        OpCode::DatanodeRemove,
        OpCode::SetNsQuota,
        OpCode::ClearNsQuota,
    ]
    .into_iter()
    .collect();

    assert_eq!(OpCode::obsolete_set(), expected);
    assert!(is_obsolete(OpCode::SetNsQuota.as_byte()));
    assert!(!is_obsolete(OpCode::Mkdir.as_byte()));
    assert!(!is_obsolete(0x40));
}

// =============================================================================
// Naming Tests
// =============================================================================

#[test]
fn test_names_parse_back() {
    for op in OpCode::ALL {
        let parsed: OpCode = op.name().parse().unwrap();
        assert_eq!(parsed, op);
        assert_eq!(op.to_string(), op.name());
    }
}

#[test]
fn test_unknown_name_rejected() {
    assert!("OP_NOT_A_THING".parse::<OpCode>().is_err());
    assert!("op_mkdir".parse::<OpCode>().is_err());
}

#[test]
fn test_sample_op_matches_opcode() {
    for op in OpCode::ALL {
        match sample_op(op, 7) {
            Some(sample) => assert_eq!(sample.opcode(), op),
            None => assert_eq!(op, OpCode::Invalid),
        }
    }
}
