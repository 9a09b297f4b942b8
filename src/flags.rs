//! Transaction feature flags
//!
//! A wide bitset summarising what a transaction does: script types it
//! spends and creates, sighash modes it signs with, replaceability, data
//! carrying patterns and a few shape heuristics.

use crate::address::AddressType;
use crate::constants::SEQUENCE_RBF_THRESHOLD;
use crate::mempool::is_non_standard;
use crate::network::Network;
use crate::script::{contains_envelope, instructions};
use crate::taproot::{has_annex, parse_taproot};
use crate::template::{is_point, pushed_keys};
use crate::transaction::inner_witness_script;
use crate::types::*;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TransactionFlags: u64 {
        // features
        const RBF = 1 << 0;
        const NO_RBF = 1 << 1;
        const V1 = 1 << 2;
        const V2 = 1 << 3;
        const V3 = 1 << 4;
        const NONSTANDARD = 1 << 5;
        // address types
        const P2PK = 1 << 8;
        const P2MS = 1 << 9;
        const P2PKH = 1 << 10;
        const P2SH = 1 << 11;
        const P2WPKH = 1 << 12;
        const P2WSH = 1 << 13;
        const P2TR = 1 << 14;
        // behavior
        const CPFP_PARENT = 1 << 16;
        const CPFP_CHILD = 1 << 17;
        const REPLACEMENT = 1 << 18;
        const ACCELERATION = 1 << 19;
        // data
        const OP_RETURN = 1 << 24;
        const FAKE_PUBKEY = 1 << 25;
        const INSCRIPTION = 1 << 26;
        const FAKE_SCRIPTHASH = 1 << 27;
        // heuristics
        const COINJOIN = 1 << 32;
        const CONSOLIDATION = 1 << 33;
        const BATCH_PAYOUT = 1 << 34;
        // sighash
        const SIGHASH_ALL = 1 << 40;
        const SIGHASH_NONE = 1 << 41;
        const SIGHASH_SINGLE = 1 << 42;
        const SIGHASH_DEFAULT = 1 << 43;
        const SIGHASH_ACP = 1 << 44;
    }
}

impl Default for TransactionFlags {
    fn default() -> Self {
        TransactionFlags::empty()
    }
}

impl TransactionFlags {
    /// Bits that depend on mempool context rather than the transaction itself
    pub const DYNAMIC: TransactionFlags = TransactionFlags::CPFP_PARENT
        .union(TransactionFlags::CPFP_CHILD)
        .union(TransactionFlags::REPLACEMENT)
        .union(TransactionFlags::ACCELERATION);

    /// Script type bit for an input or output type, if it has one
    pub fn for_address_type(address_type: AddressType) -> Option<TransactionFlags> {
        match address_type {
            AddressType::P2pk => Some(TransactionFlags::P2PK),
            AddressType::Multisig => Some(TransactionFlags::P2MS),
            AddressType::P2pkh => Some(TransactionFlags::P2PKH),
            AddressType::P2sh => Some(TransactionFlags::P2SH),
            AddressType::V0P2wpkh => Some(TransactionFlags::P2WPKH),
            AddressType::V0P2wsh => Some(TransactionFlags::P2WSH),
            AddressType::V1P2tr => Some(TransactionFlags::P2TR),
            _ => None,
        }
    }
}

/// Published curve points with no known private key
const BURN_KEY_BYTES: [(u8, u8); 4] = [(0x02, 0x22), (0x03, 0x33), (0x02, 0x02), (0x03, 0x03)];

/// True for one of the well-known 33-byte burn public keys
pub fn is_burn_key(pubkey: &[u8]) -> bool {
    pubkey.len() == 33
        && BURN_KEY_BYTES
            .iter()
            .any(|(prefix, fill)| pubkey[0] == *prefix && pubkey[1..].iter().all(|b| b == fill))
}

/// Heuristic for a DER-encoded ECDSA signature with a sighash byte
///
/// At least 9 bytes, `0x30` header, a standard sighash byte last, and a
/// length byte matching the rest of the encoding.
pub fn is_der_sig(item: &[u8]) -> bool {
    item.len() >= 9
        && item[0] == 0x30
        && matches!(item[item.len() - 1], 0x01 | 0x02 | 0x03 | 0x81 | 0x82 | 0x83)
        && item.len() == item[1] as usize + 3
}

/// Sighash bits for the trailing sighash byte of a signature
pub fn sighash_flags(sighash: u8) -> TransactionFlags {
    match sighash {
        0x01 => TransactionFlags::SIGHASH_ALL,
        0x02 => TransactionFlags::SIGHASH_NONE,
        0x03 => TransactionFlags::SIGHASH_SINGLE,
        0x81 => TransactionFlags::SIGHASH_ALL | TransactionFlags::SIGHASH_ACP,
        0x82 => TransactionFlags::SIGHASH_NONE | TransactionFlags::SIGHASH_ACP,
        0x83 => TransactionFlags::SIGHASH_SINGLE | TransactionFlags::SIGHASH_ACP,
        _ => TransactionFlags::SIGHASH_DEFAULT,
    }
}

fn signature_flags(signature: &[u8]) -> TransactionFlags {
    signature
        .last()
        .map_or(TransactionFlags::empty(), |sighash| sighash_flags(*sighash))
}

/// Sighash bits of a taproot witness
///
/// A key-path signature is the only item (besides an annex). Script-path
/// signatures are the items before script and control block: 65 bytes
/// carry a sighash byte, 64 bytes mean `SIGHASH_DEFAULT`.
pub fn schnorr_sighash_flags(witness: &[ByteString]) -> TransactionFlags {
    if witness.is_empty() {
        return TransactionFlags::empty();
    }
    let annex = has_annex(witness);
    if witness.len() == if annex { 2 } else { 1 } {
        return match witness[0].len() {
            65 => signature_flags(&witness[0]),
            _ => TransactionFlags::SIGHASH_DEFAULT,
        };
    }
    let stack_len = witness.len().saturating_sub(if annex { 3 } else { 2 });
    witness[..stack_len]
        .iter()
        .fold(TransactionFlags::empty(), |flags, item| match item.len() {
            65 => flags | signature_flags(item),
            64 => flags | TransactionFlags::SIGHASH_DEFAULT,
            _ => flags,
        })
}

/// Sighash bits of every DER signature in a segwit witness
pub fn segwit_sighash_flags(witness: &[ByteString]) -> TransactionFlags {
    witness
        .iter()
        .filter(|item| is_der_sig(item))
        .fold(TransactionFlags::empty(), |flags, item| flags | signature_flags(item))
}

/// Sighash bits of every DER signature pushed by a scriptSig
pub fn legacy_sighash_flags(script_sig: &[u8]) -> TransactionFlags {
    instructions(script_sig)
        .map_while(|instruction| instruction.ok())
        .filter_map(|instruction| instruction.push_data())
        .filter(|data| is_der_sig(data))
        .fold(TransactionFlags::empty(), |flags, data| flags | signature_flags(data))
}

/// Distinct-value counter where missing or zero amounts are always distinct
#[derive(Default)]
struct AmountSet {
    values: HashSet<u64>,
    unknown: usize,
}

impl AmountSet {
    fn insert(&mut self, value: Option<u64>) {
        match value {
            Some(value) if value > 0 => {
                self.values.insert(value);
            }
            _ => self.unknown += 1,
        }
    }

    fn len(&self) -> usize {
        self.values.len() + self.unknown
    }
}

/// Tracks runs of P2WSH outputs that smuggle a length-prefixed payload
///
/// The first output of a run holds a big-endian u16 payload length after
/// the witness program header. When the run is just long enough to hold
/// the payload, its unused tail must be zero padding.
#[derive(Default)]
struct OlgaDetector {
    count: usize,
    payload_size: usize,
}

impl OlgaDetector {
    fn observe(&mut self, output: &TransactionOutput) -> bool {
        if output.script_pubkey_type != AddressType::V0P2wsh {
            self.count = 0;
            return false;
        }
        let script = &output.script_pubkey;
        if self.count == 0 {
            self.payload_size = u16::from_be_bytes([script[2], script[3]]) as usize;
        }
        self.count += 1;
        if self.count != (self.payload_size + 2).div_ceil(32) {
            return false;
        }
        let null_bytes = self.count * 32 - self.payload_size - 2;
        null_bytes <= script.len() && script[script.len() - null_bytes..].iter().all(|b| *b == 0)
    }
}

/// True if the witness parses as a script-path spend revealing an inscription envelope
fn reveals_envelope(witness: &[ByteString]) -> bool {
    parse_taproot(witness)
        .ok()
        .and_then(|parsed| parsed.script_path)
        .is_some_and(|path| contains_envelope(&path.script))
}

fn has_fake_pubkey(output: &TransactionOutput) -> bool {
    let script = &output.script_pubkey;
    match output.script_pubkey_type {
        AddressType::P2pk => !is_point(&script[1..script.len() - 1]),
        AddressType::Multisig => pushed_keys(script)
            .into_iter()
            .any(|key| is_burn_key(key) || !is_point(key)),
        _ => false,
    }
}

fn static_flags(tx: &Transaction, height: Option<u32>, network: Option<Network>) -> TransactionFlags {
    let mut flags = match tx.version {
        1 => TransactionFlags::V1,
        2 => TransactionFlags::V2,
        3 => TransactionFlags::V3,
        _ => TransactionFlags::empty(),
    };

    let mut input_addresses: HashMap<&str, usize> = HashMap::new();
    let mut input_values = AmountSet::default();
    let mut rbf = false;
    for input in &tx.inputs {
        if input.sequence < SEQUENCE_RBF_THRESHOLD {
            rbf = true;
        }
        let prevout_type = input.prevout.as_ref().map(|prevout| prevout.script_pubkey_type);
        if let Some(flag) = prevout_type.and_then(TransactionFlags::for_address_type) {
            flags |= flag;
        }

        if prevout_type == Some(AddressType::V1P2tr) {
            let annex = has_annex(&input.witness);
            let script_path = input.witness.len() > if annex { 2 } else { 1 };
            if script_path && inner_witness_script(input).is_some_and(contains_envelope) {
                flags |= TransactionFlags::INSCRIPTION;
            }
            flags |= schnorr_sighash_flags(&input.witness);
        } else if !input.witness.is_empty() {
            flags |= segwit_sighash_flags(&input.witness);
        } else if !input.script_sig.is_empty() {
            flags |= legacy_sighash_flags(&input.script_sig);
        }
        // Without a prevout any witness might be a taproot script-path spend
        if input.prevout.is_none() && input.witness.len() >= 2 && reveals_envelope(&input.witness) {
            flags |= TransactionFlags::INSCRIPTION;
        }

        if let Some(address) = input.prevout.as_ref().and_then(|p| p.script_pubkey_address.as_deref()) {
            *input_addresses.entry(address).or_default() += 1;
        }
        input_values.insert(input.prevout.as_ref().map(|prevout| prevout.value));
    }
    flags |= if rbf { TransactionFlags::RBF } else { TransactionFlags::NO_RBF };

    let mut output_addresses: HashMap<&str, usize> = HashMap::new();
    let mut output_values = AmountSet::default();
    let mut olga = OlgaDetector::default();
    let mut fake_pubkey = false;
    for output in &tx.outputs {
        if let Some(flag) = TransactionFlags::for_address_type(output.script_pubkey_type) {
            flags |= flag;
        }
        if output.script_pubkey_type == AddressType::OpReturn {
            flags |= TransactionFlags::OP_RETURN;
        }
        fake_pubkey = fake_pubkey || has_fake_pubkey(output);
        if olga.observe(output) {
            flags |= TransactionFlags::FAKE_SCRIPTHASH;
        }
        if let Some(address) = output.script_pubkey_address.as_deref() {
            *output_addresses.entry(address).or_default() += 1;
        }
        output_values.insert(Some(output.value));
    }
    if fake_pubkey {
        flags |= TransactionFlags::FAKE_PUBKEY;
    }

    let (ins, outs) = (tx.inputs.len(), tx.outputs.len());
    let address_reuse = output_addresses
        .iter()
        .any(|(address, count)| count + input_addresses.get(address).copied().unwrap_or(0) > 1);
    if !address_reuse
        && ins >= 5
        && outs >= 5
        && ((input_values.len() + output_values.len()) as f64) <= (ins + outs) as f64 / 2.0
    {
        flags |= TransactionFlags::COINJOIN;
    }

    let ratio = ins as f64 / outs as f64;
    if ratio >= 5.0 {
        flags |= TransactionFlags::CONSOLIDATION;
    }
    if ratio <= 0.2 {
        flags |= TransactionFlags::BATCH_PAYOUT;
    }

    if is_non_standard(tx, height, network) {
        flags |= TransactionFlags::NONSTANDARD;
    }
    flags
}

/// GetTransactionFlags: 𝒯𝒳 × CPFP? × 𝔹 × ℕ? × Network? → Flags
///
/// 1. Dynamic bits (CPFP parent/child, replacement, acceleration) are
///    derived on every call
/// 2. Static bits are computed once and cached in `tx.flags`
/// 3. Result = static ∪ dynamic
pub fn get_transaction_flags(
    tx: &mut Transaction,
    cpfp: Option<&CpfpInfo>,
    replacement: bool,
    height: Option<u32>,
    network: Option<Network>,
) -> TransactionFlags {
    let mut dynamic = TransactionFlags::empty();
    if let Some(cpfp) = cpfp {
        if !cpfp.ancestors.is_empty() {
            dynamic |= TransactionFlags::CPFP_CHILD;
        }
        if !cpfp.descendants.is_empty() {
            dynamic |= TransactionFlags::CPFP_PARENT;
        }
    }
    if replacement {
        dynamic |= TransactionFlags::REPLACEMENT;
    }
    if tx.acceleration {
        dynamic |= TransactionFlags::ACCELERATION;
    }

    let cached = match tx.flags {
        Some(flags) => flags,
        None => {
            let flags = static_flags(tx, height, network);
            tx.flags = Some(flags);
            flags
        }
    };
    (cached - TransactionFlags::DYNAMIC) | dynamic
}
