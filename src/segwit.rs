//! Segregated Witness: witness programs and weight accounting
//!
//! Weight(tx) = 3 × |Serialize(tx ∖ witness)| + |Serialize(tx)|

use crate::constants::WITNESS_SCALE_FACTOR;
use crate::script::{OP_0, OP_1, OP_16};
use crate::transaction::serialize_transaction;
use crate::types::*;

/// Split a scriptPubKey into witness version and program
///
/// A witness program is a version opcode (`OP_0`, `OP_1`..`OP_16`) followed
/// by a single direct push of 2 to 40 bytes.
pub fn witness_program(script: &[u8]) -> Option<(u8, &[u8])> {
    if script.len() < 4 || script.len() > 42 {
        return None;
    }
    let version = match script[0] {
        OP_0 => 0,
        op @ OP_1..=OP_16 => op - OP_1 + 1,
        _ => return None,
    };
    if script[1] as usize + 2 != script.len() {
        return None;
    }
    Some((version, &script[2..]))
}

pub fn is_witness_program(script: &[u8]) -> bool {
    witness_program(script).is_some()
}

/// Size of the transaction serialized without witness data
pub fn calculate_base_size(tx: &Transaction) -> Natural {
    serialize_transaction(tx, false).len() as Natural
}

/// Size of the transaction serialized with witness data (if any)
pub fn calculate_total_size(tx: &Transaction) -> Natural {
    serialize_transaction(tx, true).len() as Natural
}

/// Weight(tx) = 3 × base_size + total_size
pub fn calculate_transaction_weight(tx: &Transaction) -> Natural {
    let base_size = calculate_base_size(tx);
    let total_size = calculate_total_size(tx);
    (WITNESS_SCALE_FACTOR - 1) * base_size + total_size
}

/// Virtual size: weight / 4, rounded up
pub fn weight_to_vsize(weight: Natural) -> Natural {
    weight.div_ceil(WITNESS_SCALE_FACTOR)
}

pub fn calculate_vsize(tx: &Transaction) -> Natural {
    weight_to_vsize(calculate_transaction_weight(tx))
}

/// Bytes of the transaction that do not get the witness discount
///
/// This is the serialization without marker, flag and witness stacks, which
/// is also (weight - (total size - base size)) / 4 exactly.
pub fn non_witness_size(tx: &Transaction) -> Natural {
    calculate_base_size(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segwit_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TransactionInput {
                previous_output: OutPoint { hash: [1; 32], index: 0 },
                sequence: 0xffffffff,
                witness: vec![vec![0xaa; 72], vec![0x02; 33]],
                ..Default::default()
            }],
            outputs: vec![TransactionOutput {
                value: 1000,
                script_pubkey: [&[0x00, 0x14][..], &[0x11; 20][..]].concat(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_witness_program() {
        let mut p2wpkh = vec![0x00, 0x14];
        p2wpkh.extend_from_slice(&[0u8; 20]);
        assert_eq!(witness_program(&p2wpkh), Some((0, &[0u8; 20][..])));

        assert_eq!(witness_program(&[0x51, 0x02, 0x4e, 0x73]), Some((1, &[0x4e, 0x73][..])));
        assert_eq!(witness_program(&[0x60, 0x02, 0x00, 0x00]).map(|(v, _)| v), Some(16));
        // Push length disagrees with script length
        assert!(!is_witness_program(&[0x51, 0x03, 0x4e, 0x73]));
        // Not a version opcode
        assert!(!is_witness_program(&[0x4f, 0x02, 0x4e, 0x73]));
        assert!(!is_witness_program(&[0x00, 0x01, 0x00]));
    }

    #[test]
    fn test_weight_of_segwit_transaction() {
        let tx = segwit_tx();
        let base = calculate_base_size(&tx);
        let total = calculate_total_size(&tx);
        // version + counts + input + output + locktime
        assert_eq!(base, 4 + 1 + 41 + 1 + 31 + 4);
        // marker/flag + witness count + two items with length bytes
        assert_eq!(total, base + 2 + 1 + 73 + 34);
        assert_eq!(calculate_transaction_weight(&tx), 3 * base + total);
        assert_eq!(calculate_vsize(&tx), (3 * base + total).div_ceil(4));
        assert_eq!(non_witness_size(&tx), base);
        let witness_section = total - base;
        assert_eq!(non_witness_size(&tx), (calculate_transaction_weight(&tx) - witness_section) / 4);
    }

    #[test]
    fn test_weight_of_legacy_transaction() {
        let mut tx = segwit_tx();
        tx.inputs[0].witness.clear();
        let size = calculate_total_size(&tx);
        assert_eq!(calculate_transaction_weight(&tx), 4 * size);
        assert_eq!(weight_to_vsize(401), 101);
    }
}
