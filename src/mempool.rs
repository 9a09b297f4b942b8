//! Relay policy: standardness, dust and fee-rate helpers
//!
//! These are node policy rules, stricter than consensus. Several of them
//! changed over time, so the rules in force at a given height on a given
//! network are applied.

use crate::address::AddressType;
use crate::constants::*;
use crate::cursor::var_int_length;
use crate::error::{CodecError, Result};
use crate::network::{Network, PolicyUpgrade};
use crate::script::is_push_only;
use crate::segwit::{is_witness_program, non_witness_size, witness_program};
use crate::sigops::{check_sigops_bip54, count_script_sigops, count_sigops};
use crate::taproot::{has_annex, TAPROOT_LEAF_MASK, TAPROOT_LEAF_TAPSCRIPT};
use crate::template::parse_multisig_script;
use crate::transaction::{inner_redeem_script, input_address_type};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Node relay settings that the standardness check depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub permit_bare_multisig: bool,
    /// sat/vB
    pub dust_relay_fee_rate: u64,
    pub max_standard_tx_weight: u64,
    pub max_standard_tx_sigops_cost: u32,
    /// Largest OP_RETURN scriptPubKey before the datacarrier lift
    pub max_op_return_relay: usize,
}

impl Default for PolicySettings {
    fn default() -> Self {
        PolicySettings {
            permit_bare_multisig: true,
            dust_relay_fee_rate: DUST_RELAY_TX_FEE,
            max_standard_tx_weight: MAX_STANDARD_TX_WEIGHT,
            max_standard_tx_sigops_cost: MAX_STANDARD_TX_SIGOPS_COST,
            max_op_return_relay: MAX_OP_RETURN_RELAY,
        }
    }
}

impl PolicySettings {
    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CodecError::Malformed(format!("invalid policy settings: {}", e)))
    }
}

// ============================================================================
// DUST
// ============================================================================

/// GetDustThreshold: 𝒪 → ℕ
///
/// Spending cost of an output at the dust relay fee rate:
/// (serialized output size + estimated input size) × rate, where the input
/// estimate is 67 bytes for witness programs and 148 otherwise.
pub fn get_dust_threshold(output: &TransactionOutput) -> u64 {
    dust_threshold_with(output, DUST_RELAY_TX_FEE)
}

pub fn dust_threshold_with(output: &TransactionOutput, dust_relay_fee_rate: u64) -> u64 {
    let script_len = output.script_pubkey.len();
    let mut size = (script_len + var_int_length(script_len as u64)) as u64 + 8;
    size += if is_witness_program(&output.script_pubkey) {
        DUST_WITNESS_SPEND_SIZE
    } else {
        DUST_NON_WITNESS_SPEND_SIZE
    };
    size * dust_relay_fee_rate
}

// ============================================================================
// STANDARDNESS
// ============================================================================

/// IsNonStandard: 𝒯𝒳 × ℕ? × Network? → {true, false}
///
/// Returns true as soon as any relay policy rule is violated:
/// 1. Version above the cap (2, or 3 after v3 activation)
/// 2. Weight, non-witness size and sigops cost limits
/// 3. BIP54 legacy sigops (after the datacarrier lift)
/// 4. Input rules: scriptSig size and push-only, P2SH sigops, spendable
///    prevout types, anchor spends, P2WSH and taproot witness shape
/// 5. Output rules: standard types, bare multisig, dust, OP_RETURN limits
///
/// Coinbase transactions are exempt. Unknown height or network apply the
/// current rules.
pub fn is_non_standard(tx: &Transaction, height: Option<u32>, network: Option<Network>) -> bool {
    is_non_standard_with(tx, height, network, &PolicySettings::default())
}

/// [`is_non_standard`] with explicit policy settings
pub fn is_non_standard_with(
    tx: &Transaction,
    height: Option<u32>,
    network: Option<Network>,
    settings: &PolicySettings,
) -> bool {
    let v3 = PolicyUpgrade::V3Standardness.is_active(height, network);
    let datacarrier_lift = PolicyUpgrade::DatacarrierLift.is_active(height, network);

    // version
    let max_version = if v3 { MAX_STANDARD_VERSION } else { MAX_STANDARD_VERSION_PRE_V3 };
    if tx.version as u32 > max_version as u32 {
        return true;
    }

    // tx-size
    if tx.weight > settings.max_standard_tx_weight {
        return true;
    }

    // tx-size-small
    if non_witness_size(tx) < MIN_STANDARD_TX_NONWITNESS_SIZE {
        return true;
    }

    // bad-txns-too-many-sigops
    let sigops = tx.sigops.unwrap_or_else(|| count_sigops(tx));
    if sigops > settings.max_standard_tx_sigops_cost {
        return true;
    }

    // bad-txns-nonstandard-inputs
    for input in &tx.inputs {
        if input.is_coinbase {
            return false;
        }
        if is_non_standard_input(input, v3) {
            return true;
        }
    }

    // bad-txns-too-many-legacy-sigops
    if datacarrier_lift && !check_sigops_bip54(tx) {
        return true;
    }

    has_non_standard_outputs(tx, height, network, settings)
}

fn is_non_standard_input(input: &TransactionInput, v3: bool) -> bool {
    // scriptsig-size
    if input.script_sig.len() > MAX_STANDARD_SCRIPTSIG_SIZE {
        return true;
    }
    // scriptsig-not-pushonly
    if !is_push_only(&input.script_sig) {
        return true;
    }

    let Some(prevout) = &input.prevout else {
        return false;
    };
    match prevout.script_pubkey_type {
        AddressType::P2sh => {
            let sigops = inner_redeem_script(input)
                .map(|script| count_script_sigops(script, false, true))
                .unwrap_or(0);
            if sigops > MAX_P2SH_SIGOPS {
                return true;
            }
        }
        AddressType::Unknown | AddressType::ProvablyUnspendable | AddressType::Empty => return true,
        AddressType::Anchor if !v3 => return true,
        _ => {}
    }

    // bad-witness-nonstandard
    match input_address_type(input) {
        Some(AddressType::V0P2wsh | AddressType::P2shP2wsh) => is_non_standard_p2wsh_witness(&input.witness),
        Some(AddressType::V1P2tr) => is_non_standard_taproot_witness(&input.witness),
        _ => false,
    }
}

fn is_non_standard_p2wsh_witness(witness: &[ByteString]) -> bool {
    let Some((script, stack)) = witness.split_last() else {
        return false;
    };
    script.len() > MAX_STANDARD_P2WSH_SCRIPT_SIZE
        || stack.len() > MAX_STANDARD_P2WSH_STACK_ITEMS
        || stack.iter().any(|item| item.len() > MAX_STANDARD_P2WSH_STACK_ITEM_SIZE)
}

/// An annex is always non-standard. Script-path rules apply only when a
/// control block is present; key-path spends pass.
fn is_non_standard_taproot_witness(witness: &[ByteString]) -> bool {
    if has_annex(witness) {
        return true;
    }
    if witness.len() < 2 {
        return false;
    }
    let control_block = &witness[witness.len() - 1];
    let stack = &witness[..witness.len() - 2];
    match control_block.first() {
        Some(byte) if byte & TAPROOT_LEAF_MASK == TAPROOT_LEAF_TAPSCRIPT => stack
            .iter()
            .any(|item| item.len() > MAX_STANDARD_TAPSCRIPT_STACK_ITEM_SIZE),
        _ => true,
    }
}

fn has_non_standard_outputs(
    tx: &Transaction,
    height: Option<u32>,
    network: Option<Network>,
    settings: &PolicySettings,
) -> bool {
    let datacarrier_lift = PolicyUpgrade::DatacarrierLift.is_active(height, network);
    let mut op_return_count = 0usize;
    let mut op_return_bytes = 0usize;
    let mut dust_count = 0usize;

    for output in &tx.outputs {
        match output.script_pubkey_type {
            AddressType::ProvablyUnspendable | AddressType::Empty => return true,
            // Undefined witness versions are standard to create
            AddressType::Unknown => match witness_program(&output.script_pubkey) {
                Some((version, _)) if version != 0 => {}
                _ => return true,
            },
            AddressType::Multisig => {
                if !settings.permit_bare_multisig {
                    return true;
                }
                match parse_multisig_script(&output.script_pubkey) {
                    Some(info) if (1..=3).contains(&info.n) && info.m >= 1 && info.m <= info.n => {}
                    _ => return true,
                }
            }
            AddressType::OpReturn => {
                op_return_count += 1;
                op_return_bytes += output.script_pubkey.len();
                if !datacarrier_lift && output.script_pubkey.len() > settings.max_op_return_relay {
                    return true;
                }
            }
            _ => {}
        }

        if !matches!(output.script_pubkey_type, AddressType::OpReturn | AddressType::Fee)
            && output.value < dust_threshold_with(output, settings.dust_relay_fee_rate)
        {
            dust_count += 1;
        }
    }

    // dust, unless it is a single ephemeral dust output in a zero-fee transaction
    if dust_count > 0 {
        let ephemeral = PolicyUpgrade::EphemeralDust.is_active(height, network)
            && dust_count == 1
            && tx.fee == Some(0);
        if !ephemeral {
            return true;
        }
    }

    // multi-op-return, datacarrier
    if datacarrier_lift {
        op_return_bytes > MAX_DATACARRIER_BYTES
    } else {
        op_return_count > 1
    }
}

// ============================================================================
// FEE RATES
// ============================================================================

/// Fee rate in sat/vB, preferring a supplied effective (package) rate
pub fn effective_fee_rate(tx: &Transaction) -> Option<f64> {
    if let Some(rate) = tx.effective_fee_per_vsize {
        return Some(rate);
    }
    let fee = tx.fee?;
    if tx.weight == 0 {
        return None;
    }
    Some(fee as f64 / (tx.weight as f64 / WITNESS_SCALE_FACTOR as f64))
}

/// Fee rate the transaction would have without an out-of-band acceleration
///
/// For an accelerated transaction this is the lower of its own rate and its
/// ancestor package rate; otherwise the effective rate.
pub fn unaccelerated_fee_rate(tx: &Transaction, accelerated: bool) -> Option<f64> {
    if !accelerated {
        return effective_fee_rate(tx);
    }
    let fee = tx.fee? as f64;
    let vsize = tx.weight as f64 / WITNESS_SCALE_FACTOR as f64;
    if vsize == 0.0 {
        return None;
    }
    let (package_fee, package_vsize) = tx.ancestors.iter().fold((fee, vsize), |(f, v), ancestor| {
        (f + ancestor.fee as f64, v + ancestor.weight as f64 / WITNESS_SCALE_FACTOR as f64)
    });
    Some((fee / vsize).min(package_fee / package_vsize))
}

/// A block transaction with its effective fee rate, in block order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTransaction {
    pub txid: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritizedTransactions {
    /// Mined ahead of transactions paying more
    pub prioritized: Vec<String>,
    /// Mined behind transactions paying less
    pub deprioritized: Vec<String>,
}

/// Rates closer than this to the running rate are not reported
const PRIORITIZATION_RATE_TOLERANCE: f64 = 0.1;

/// Find transactions mined out of fee-rate order
///
/// Blocks are ordered by decreasing rate, so walking them backwards (skipping
/// the coinbase) the expected order is non-decreasing. The longest
/// non-decreasing subsequence is taken as the expected order; anything
/// outside it is prioritized if it pays less than the running rate, or
/// deprioritized if it pays more.
pub fn identify_prioritized_transactions(transactions: &[BlockTransaction]) -> PrioritizedTransactions {
    let ordered: Vec<&BlockTransaction> = transactions.iter().skip(1).rev().collect();
    if ordered.len() < 2 {
        return PrioritizedTransactions::default();
    }

    let n = ordered.len();
    // tails[l] is the index ending the best subsequence of length l + 1
    let mut tails: Vec<usize> = Vec::with_capacity(n);
    let mut predecessors: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        let len = tails.partition_point(|&j| ordered[j].rate <= ordered[i].rate);
        predecessors[i] = len.checked_sub(1).map(|l| tails[l]);
        if len == tails.len() {
            tails.push(i);
        } else {
            tails[len] = i;
        }
    }

    let mut in_sequence = HashSet::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        in_sequence.insert(i);
        cursor = predecessors[i];
    }

    let mut result = PrioritizedTransactions::default();
    let mut last_rate = 0.0;
    for (i, tx) in ordered.iter().enumerate() {
        if in_sequence.contains(&i) {
            last_rate = tx.rate;
        } else if (tx.rate - last_rate).abs() < PRIORITIZATION_RATE_TOLERANCE {
            continue;
        } else if tx.rate <= last_rate {
            result.prioritized.push(tx.txid.clone());
        } else {
            result.deprioritized.push(tx.txid.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{write_push, OP_CHECKMULTISIG, OP_PUSHDATA1, OP_RETURN};
    use crate::transaction::{decode_transaction, finalize_transaction};

    const SEGWIT_TX: &str = "0200000000010111111111111111111111111111111111111111111111111111111111111111110100000000fdffffff0250c3000000000000160014751e76e8199196d454941c45d1b3a323f1433bd6e80300000000000022512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179802473044022001010101010101010101010101010101010101010101010101010101010101010220020202020202020202020202020202020202020202020202020202020202020201210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179800000000";
    const P2WPKH_SPK: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";

    const PRE_LIFT: Option<u32> = Some(900_000);
    const POST_LIFT: Option<u32> = Some(950_000);
    const MAINNET: Option<Network> = Some(Network::Mainnet);

    /// Standard one-input P2WPKH spend with a known prevout
    fn standard_tx() -> Transaction {
        let mut tx = decode_transaction(&hex::decode(SEGWIT_TX).unwrap(), Network::Mainnet).unwrap();
        tx.inputs[0].prevout = Some(TransactionOutput::new(
            60_000,
            hex::decode(P2WPKH_SPK).unwrap(),
            Network::Mainnet,
        ));
        tx.fee = Some(9_000);
        tx
    }

    fn op_return(data_len: usize) -> TransactionOutput {
        let mut script = vec![OP_RETURN];
        write_push(&mut script, &vec![0x42; data_len]);
        TransactionOutput::new(0, script, Network::Mainnet)
    }

    fn with_outputs(extra: Vec<TransactionOutput>) -> Transaction {
        let mut tx = standard_tx();
        tx.outputs.extend(extra);
        finalize_transaction(&mut tx);
        tx
    }

    // ============================================================================
    // DUST
    // ============================================================================

    #[test]
    fn test_dust_thresholds() {
        let p2wpkh = TransactionOutput::new(0, hex::decode(P2WPKH_SPK).unwrap(), Network::Mainnet);
        assert_eq!(get_dust_threshold(&p2wpkh), 294);
        let p2pkh = TransactionOutput::new(
            0,
            hex::decode("76a91477bff20c60e522dfaa3350c39b030a5d004e839a88ac").unwrap(),
            Network::Mainnet,
        );
        assert_eq!(get_dust_threshold(&p2pkh), 546);
        let mut p2tr = vec![0x51, 0x20];
        p2tr.extend_from_slice(&[0x01; 32]);
        assert_eq!(get_dust_threshold(&TransactionOutput::new(0, p2tr, Network::Mainnet)), 330);
        assert_eq!(dust_threshold_with(&p2wpkh, 1), 98);
    }

    #[test]
    fn test_dust_output_non_standard() {
        let mut tx = standard_tx();
        assert!(!is_non_standard(&tx, None, None));
        tx.outputs[0].value = 293;
        assert!(is_non_standard(&tx, None, None));
    }

    #[test]
    fn test_ephemeral_dust() {
        let mut tx = standard_tx();
        tx.outputs[0].value = 0;
        tx.fee = Some(0);
        // Allowed once activated, on a zero-fee transaction only
        assert!(!is_non_standard(&tx, Some(910_000), MAINNET));
        assert!(is_non_standard(&tx, Some(900_000), MAINNET));
        tx.fee = Some(100);
        assert!(is_non_standard(&tx, Some(910_000), MAINNET));
    }

    // ============================================================================
    // OP_RETURN
    // ============================================================================

    #[test]
    fn test_single_op_return_pre_lift() {
        // OP_RETURN OP_PUSHDATA1 80 <data>: exactly 83 bytes
        let max = op_return(80);
        assert_eq!(max.script_pubkey.len(), 83);
        assert_eq!(max.script_pubkey[1], OP_PUSHDATA1);
        assert!(!is_non_standard(&with_outputs(vec![max]), PRE_LIFT, MAINNET));
    }

    #[test]
    fn test_op_return_limits_lifted() {
        let two = with_outputs(vec![op_return(80), op_return(80)]);
        let large = with_outputs(vec![op_return(81)]);
        assert!(is_non_standard(&two, PRE_LIFT, MAINNET));
        assert!(is_non_standard(&large, PRE_LIFT, MAINNET));
        assert!(!is_non_standard(&two, POST_LIFT, MAINNET));
        assert!(!is_non_standard(&large, POST_LIFT, MAINNET));
        // Unknown height means current rules
        assert!(!is_non_standard(&large, None, MAINNET));
    }

    #[test]
    fn test_op_return_relay_setting() {
        let tx = with_outputs(vec![op_return(40)]);
        let settings = PolicySettings { max_op_return_relay: 40, ..Default::default() };
        assert!(is_non_standard_with(&tx, PRE_LIFT, MAINNET, &settings));
        assert!(!is_non_standard_with(&tx, PRE_LIFT, MAINNET, &PolicySettings::default()));
    }

    // ============================================================================
    // TRANSACTION AND INPUT RULES
    // ============================================================================

    #[test]
    fn test_version_gating() {
        let mut tx = standard_tx();
        tx.version = 3;
        assert!(!is_non_standard(&tx, None, None));
        assert!(is_non_standard(&tx, Some(800_000), MAINNET));
        assert!(!is_non_standard(&tx, Some(863_501), MAINNET));
        tx.version = 4;
        assert!(is_non_standard(&tx, None, None));
        tx.version = -1;
        assert!(is_non_standard(&tx, None, None));
    }

    #[test]
    fn test_weight_limit() {
        let mut tx = standard_tx();
        tx.weight = 400_001;
        assert!(is_non_standard(&tx, None, None));
    }

    #[test]
    fn test_coinbase_exempt() {
        let mut tx = standard_tx();
        tx.inputs[0].is_coinbase = true;
        tx.inputs[0].prevout = None;
        tx.outputs[0].value = 1;
        assert!(!is_non_standard(&tx, None, None));
    }

    #[test]
    fn test_unknown_prevout_non_standard() {
        let mut tx = standard_tx();
        tx.inputs[0].prevout = Some(TransactionOutput::new(60_000, vec![0x6e, 0x87], Network::Mainnet));
        assert!(is_non_standard(&tx, None, None));
    }

    #[test]
    fn test_anchor_spend_gating() {
        let mut tx = standard_tx();
        tx.inputs[0].prevout =
            Some(TransactionOutput::new(240, ANCHOR_SCRIPT_PUBKEY.to_vec(), Network::Mainnet));
        tx.inputs[0].witness = Vec::new();
        assert!(is_non_standard(&tx, Some(800_000), MAINNET));
        assert!(!is_non_standard(&tx, Some(870_000), MAINNET));
    }

    #[test]
    fn test_non_push_script_sig() {
        let mut tx = standard_tx();
        tx.inputs[0].script_sig = vec![crate::script::OP_DUP];
        assert!(is_non_standard(&tx, None, None));
    }

    #[test]
    fn test_taproot_witness_rules() {
        let mut p2tr = vec![0x51, 0x20];
        p2tr.extend_from_slice(&[0x01; 32]);
        let mut tx = standard_tx();
        tx.inputs[0].prevout = Some(TransactionOutput::new(60_000, p2tr, Network::Mainnet));
        let mut control = vec![0xc0];
        control.extend_from_slice(&[0x02; 32]);

        tx.inputs[0].witness = vec![vec![0x01; 64]];
        assert!(!is_non_standard(&tx, None, None));

        tx.inputs[0].witness = vec![vec![0x01; 64], vec![0x50, 0x00]];
        assert!(is_non_standard(&tx, None, None));

        tx.inputs[0].witness = vec![vec![0x01; 80], vec![0x51], control.clone()];
        assert!(!is_non_standard(&tx, None, None));

        tx.inputs[0].witness = vec![vec![0x01; 81], vec![0x51], control.clone()];
        assert!(is_non_standard(&tx, None, None));

        let mut unknown_leaf = control;
        unknown_leaf[0] = 0xc2;
        tx.inputs[0].witness = vec![vec![0x01; 64], vec![0x51], unknown_leaf];
        assert!(is_non_standard(&tx, None, None));
    }

    #[test]
    fn test_p2wsh_witness_rules() {
        let mut p2wsh = vec![0x00, 0x20];
        p2wsh.extend_from_slice(&[0x03; 32]);
        let mut tx = standard_tx();
        tx.inputs[0].prevout = Some(TransactionOutput::new(60_000, p2wsh, Network::Mainnet));

        tx.inputs[0].witness = vec![vec![0x01; 80], vec![0x51]];
        assert!(!is_non_standard(&tx, None, None));
        tx.inputs[0].witness = vec![vec![0x01; 81], vec![0x51]];
        assert!(is_non_standard(&tx, None, None));
        tx.inputs[0].witness = vec![vec![0x51; 3601]];
        assert!(is_non_standard(&tx, None, None));
    }

    // ============================================================================
    // OUTPUT RULES
    // ============================================================================

    fn bare_multisig(m: u8, n: u8) -> TransactionOutput {
        let mut script = vec![0x50 + m];
        for _ in 0..n {
            write_push(&mut script, &[0x02; 33]);
        }
        script.extend_from_slice(&[0x50 + n, OP_CHECKMULTISIG]);
        TransactionOutput::new(10_000, script, Network::Mainnet)
    }

    #[test]
    fn test_bare_multisig_outputs() {
        assert!(!is_non_standard(&with_outputs(vec![bare_multisig(1, 3)]), None, None));
        assert!(is_non_standard(&with_outputs(vec![bare_multisig(1, 4)]), None, None));
        assert!(is_non_standard(&with_outputs(vec![bare_multisig(3, 2)]), None, None));

        let settings = PolicySettings { permit_bare_multisig: false, ..Default::default() };
        assert!(is_non_standard_with(&with_outputs(vec![bare_multisig(1, 2)]), None, None, &settings));
    }

    #[test]
    fn test_future_witness_output_standard() {
        let future = TransactionOutput::new(10_000, vec![0x52, 0x02, 0x75, 0x1e], Network::Mainnet);
        assert_eq!(future.script_pubkey_type, AddressType::Unknown);
        assert!(!is_non_standard(&with_outputs(vec![future]), None, None));

        let bad_v0 = TransactionOutput::new(10_000, vec![0x00, 0x02, 0x75, 0x1e], Network::Mainnet);
        assert!(is_non_standard(&with_outputs(vec![bad_v0]), None, None));
    }

    #[test]
    fn test_policy_settings_from_json() {
        let settings = PolicySettings::from_json(r#"{"permit_bare_multisig": false}"#).unwrap();
        assert!(!settings.permit_bare_multisig);
        assert_eq!(settings.dust_relay_fee_rate, 3);
        assert_eq!(settings.max_op_return_relay, 83);
        assert!(PolicySettings::from_json("{").is_err());
    }

    // ============================================================================
    // FEE RATES
    // ============================================================================

    #[test]
    fn test_effective_and_unaccelerated_rates() {
        let mut tx = Transaction { fee: Some(1_000), weight: 400, ..Default::default() };
        assert_eq!(effective_fee_rate(&tx), Some(10.0));
        tx.ancestors.push(RelatedTransaction { txid: "a".to_string(), fee: 0, weight: 400 });
        assert_eq!(unaccelerated_fee_rate(&tx, true), Some(5.0));
        tx.effective_fee_per_vsize = Some(7.5);
        assert_eq!(unaccelerated_fee_rate(&tx, false), Some(7.5));
    }

    fn block(rates: &[f64]) -> Vec<BlockTransaction> {
        rates
            .iter()
            .enumerate()
            .map(|(i, rate)| BlockTransaction { txid: format!("tx{}", i), rate: *rate })
            .collect()
    }

    #[test]
    fn test_identify_prioritized_transactions() {
        // Walking backwards: 5, 6, 1, 7; the 1 sat/vB transaction jumped ahead
        let result = identify_prioritized_transactions(&block(&[0.0, 7.0, 1.0, 6.0, 5.0]));
        assert_eq!(result.prioritized, vec!["tx2".to_string()]);
        assert!(result.deprioritized.is_empty());

        // Walking backwards: 7, 8, 20, 9, 10; the 20 sat/vB transaction was held back
        let result = identify_prioritized_transactions(&block(&[0.0, 10.0, 9.0, 20.0, 8.0, 7.0]));
        assert!(result.prioritized.is_empty());
        assert_eq!(result.deprioritized, vec!["tx3".to_string()]);

        assert_eq!(identify_prioritized_transactions(&block(&[0.0, 1.0])), PrioritizedTransactions::default());
    }
}
