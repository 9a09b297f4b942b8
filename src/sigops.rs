//! Signature operation counting
//!
//! Legacy sigops are scaled by the witness factor; witness-script sigops
//! are counted once.

use crate::address::AddressType;
use crate::constants::{MAX_PUBKEYS_PER_MULTISIG, MAX_TX_LEGACY_SIGOPS, WITNESS_SCALE_FACTOR};
use crate::script::*;
use crate::transaction::{inner_redeem_script, inner_witness_script, input_address_type};
use crate::types::*;

/// Count the sigops in a script
///
/// `OP_CHECKSIG` and `OP_CHECKSIGVERIFY` count one each. In `raw` scripts
/// (scriptPubKey, scriptSig) `OP_CHECKMULTISIG[VERIFY]` counts 20; in redeem
/// and witness scripts it counts the preceding `OP_n`, or 20 without one.
/// The result is multiplied by 4 unless `witness` marks it as already
/// witness-scaled. Counting stops at a truncated push.
pub fn count_script_sigops(script: &[u8], raw: bool, witness: bool) -> u32 {
    let mut sigops = 0u32;
    let mut previous: Option<Instruction<'_>> = None;
    for instruction in instructions(script) {
        let Ok(instruction) = instruction else {
            break;
        };
        match instruction.opcode() {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => sigops += 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let keys = if raw {
                    None
                } else {
                    previous.and_then(|op| op.small_int())
                };
                sigops += keys.unwrap_or(MAX_PUBKEYS_PER_MULTISIG);
            }
            _ => {}
        }
        previous = Some(instruction);
    }
    if witness {
        sigops
    } else {
        sigops * WITNESS_SCALE_FACTOR as u32
    }
}

/// Sigops cost of the spend data of one input
///
/// Exactly one of: 1 for (wrapped) P2WPKH, the witness script for
/// (wrapped) P2WSH, the redeem script for plain P2SH.
fn input_spend_sigops(input: &TransactionInput) -> u32 {
    match input_address_type(input) {
        Some(AddressType::V0P2wpkh | AddressType::P2shP2wpkh) => 1,
        Some(AddressType::V0P2wsh | AddressType::P2shP2wsh) => inner_witness_script(input)
            .map(|script| count_script_sigops(script, false, true))
            .unwrap_or(0),
        Some(AddressType::P2sh) => inner_redeem_script(input)
            .map(|script| count_script_sigops(script, false, false))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Total sigops cost of a transaction
///
/// Sum of scriptSig sigops, per-input spend sigops and scriptPubKey sigops
/// of every output.
pub fn count_sigops(tx: &Transaction) -> u32 {
    let inputs: u32 = tx
        .inputs
        .iter()
        .map(|input| count_script_sigops(&input.script_sig, true, false) + input_spend_sigops(input))
        .sum();
    let outputs: u32 = tx
        .outputs
        .iter()
        .map(|output| count_script_sigops(&output.script_pubkey, true, false))
        .sum();
    inputs + outputs
}

/// Potentially executed legacy sigops (BIP54)
///
/// Per input: accurate sigops of the scriptSig and of the spent
/// scriptPubKey, plus the redeem script for P2SH. Unscaled.
pub fn count_legacy_sigops(tx: &Transaction) -> u32 {
    tx.inputs
        .iter()
        .filter(|input| !input.is_coinbase)
        .map(|input| {
            let mut sigops = count_script_sigops(&input.script_sig, false, true);
            if let Some(prevout) = &input.prevout {
                sigops += count_script_sigops(&prevout.script_pubkey, false, true);
                if prevout.script_pubkey_type == AddressType::P2sh {
                    sigops += inner_redeem_script(input)
                        .map(|script| count_script_sigops(script, false, true))
                        .unwrap_or(0);
                }
            }
            sigops
        })
        .sum()
}

/// True when the legacy sigops stay within the BIP54 per-transaction limit
pub fn check_sigops_bip54(tx: &Transaction) -> bool {
    count_legacy_sigops(tx) <= MAX_TX_LEGACY_SIGOPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    fn two_of_three() -> Vec<u8> {
        let mut script = vec![0x52];
        for _ in 0..3 {
            write_push(&mut script, &[0x02; 33]);
        }
        script.extend_from_slice(&[0x53, OP_CHECKMULTISIG]);
        script
    }

    fn spending(prevout_script: &[u8], script_sig: Vec<u8>, witness: Witness) -> TransactionInput {
        let mut input =
            TransactionInput::new(OutPoint { hash: [5; 32], index: 0 }, script_sig, 0xffffffff, witness);
        input.prevout = Some(TransactionOutput::new(10_000, prevout_script.to_vec(), Network::Mainnet));
        input
    }

    // ============================================================================
    // SCRIPT SIGOPS
    // ============================================================================

    #[test]
    fn test_bare_checkmultisig_top_level() {
        assert_eq!(count_script_sigops(&[OP_CHECKMULTISIG], true, false), 80);
        assert_eq!(count_script_sigops(&[OP_CHECKMULTISIG], false, false), 80);
    }

    #[test]
    fn test_checkmultisig_in_witness_script() {
        assert_eq!(count_script_sigops(&two_of_three(), false, true), 3);
        let mut two_keys = vec![0x51];
        write_push(&mut two_keys, &[0x02; 33]);
        write_push(&mut two_keys, &[0x03; 33]);
        two_keys.extend_from_slice(&[0x52, OP_CHECKMULTISIG]);
        assert_eq!(count_script_sigops(&two_keys, false, true), 2);
        // The same script at top level is worth the full 20
        assert_eq!(count_script_sigops(&two_keys, true, true), 20);
    }

    #[test]
    fn test_checksig_variants() {
        let script = [OP_DUP, OP_HASH160, OP_CHECKSIGVERIFY, OP_CHECKSIG, OP_CHECKSIGADD];
        assert_eq!(count_script_sigops(&script, true, true), 2);
        assert_eq!(count_script_sigops(&script, true, false), 8);
    }

    #[test]
    fn test_sigops_stop_at_truncated_push() {
        assert_eq!(count_script_sigops(&[OP_CHECKSIG, 0x05, 0x01], true, true), 1);
        assert_eq!(count_script_sigops(&[], true, false), 0);
    }

    // ============================================================================
    // TRANSACTION SIGOPS
    // ============================================================================

    #[test]
    fn test_count_sigops_per_input_type() {
        let p2wpkh = hex::decode("0014751e76e8199196d454941c45d1b3a323f1433bd6").unwrap();
        let p2pkh = hex::decode("76a91477bff20c60e522dfaa3350c39b030a5d004e839a88ac").unwrap();

        let witness_script = two_of_three();
        let mut p2wsh = vec![0x00, 0x20];
        p2wsh.extend_from_slice(&[0x44; 32]);

        let tx = Transaction {
            inputs: vec![
                spending(&p2wpkh, Vec::new(), vec![vec![0x30; 71], vec![0x02; 33]]),
                spending(&p2wsh, Vec::new(), vec![vec![], vec![0x30; 71], witness_script]),
            ],
            outputs: vec![TransactionOutput::new(1_000, p2pkh, Network::Mainnet)],
            ..Default::default()
        };
        // 1 (p2wpkh) + 3 (witness multisig) + 4 (p2pkh output)
        assert_eq!(count_sigops(&tx), 8);
    }

    #[test]
    fn test_count_sigops_p2sh_redeem_script() {
        let redeem = two_of_three();
        let mut script_sig = vec![OP_0];
        write_push(&mut script_sig, &[0x30; 71]);
        write_push(&mut script_sig, &redeem);
        let p2sh = hex::decode("a914b472a266d0bd89c13706a4132ccfb16f7c3b9fcb87").unwrap();

        let tx = Transaction {
            inputs: vec![spending(&p2sh, script_sig, Vec::new())],
            ..Default::default()
        };
        assert_eq!(count_sigops(&tx), 12);
        assert_eq!(count_legacy_sigops(&tx), 3);
        assert!(check_sigops_bip54(&tx));
    }

    #[test]
    fn test_bip54_limit() {
        // 2501 OP_CHECKSIGs in one spent scriptPubKey
        let prevout_script = vec![OP_CHECKSIG; 2501];
        let tx = Transaction {
            inputs: vec![spending(&prevout_script, Vec::new(), Vec::new())],
            ..Default::default()
        };
        assert_eq!(count_legacy_sigops(&tx), 2501);
        assert!(!check_sigops_bip54(&tx));
    }
}
