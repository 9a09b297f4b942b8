//! Partially Signed Bitcoin Transactions (BIP 174 / BIP 371)
//!
//! Decoding and encoding of the key-value map container, plus the
//! best-effort fill that turns a PSBT into a displayable transaction.

use crate::address::{script_pubkey_type, AddressType};
use crate::constants::*;
use crate::cursor::*;
use crate::error::{CodecError, Result};
use crate::mempool::get_dust_threshold;
use crate::network::Network;
use crate::script::{push_data_items, push_script, to_asm, write_push, OP_0, OP_RETURN};
use crate::segwit::{calculate_transaction_weight, is_witness_program, weight_to_vsize};
use crate::taproot::{
    compute_taproot_output_key, parse_tap_tree, parse_taproot, tap_tree_paths, ScriptPath,
    NUMS_INTERNAL_KEY, TAPROOT_LEAF_MASK,
};
use crate::template::{
    parse_multisig_script, parse_tapscript_multisig, parse_tapscript_unanimous_multisig,
    pushed_keys,
};
use crate::transaction::*;
use crate::types::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `"psbt"`, followed on the wire by [`PSBT_SEPARATOR`]
pub const PSBT_MAGIC: [u8; 4] = *b"psbt";
pub const PSBT_SEPARATOR: u8 = 0xff;

/// Per-input byte estimates used when a signature is still missing
const P2PKH_SIGNATURE_BYTES: u64 = 106;
const P2PK_SIGNATURE_BYTES: u64 = 72;
const P2WPKH_SIGNATURE_BYTES: u64 = 106;
const ECDSA_SIGNATURE_BYTES: u64 = 72;
const SCHNORR_SIGNATURE_BYTES: u64 = 64;
const TAPROOT_KEY_PATH_BYTES: u64 = 65;

// ============================================================================
// KEY-VALUE MAPS
// ============================================================================

/// One record of a PSBT map; the key type is the map key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsbtRecord {
    pub key_data: ByteString,
    pub value: ByteString,
}

/// Records of one PSBT map in the order they were read or inserted
///
/// Writing preserves that order, so a decoded PSBT re-encodes byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsbtKeyValueMap {
    records: Vec<(u64, PsbtRecord)>,
}

impl PsbtKeyValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, rejecting a repeat of the same raw key
    pub fn insert(&mut self, key_type: u64, key_data: ByteString, value: ByteString) -> Result<()> {
        if self.records(key_type).any(|record| record.key_data == key_data) {
            return Err(CodecError::Malformed(format!(
                "duplicate PSBT key: type 0x{:02x} keydata {}",
                key_type,
                hex::encode(&key_data)
            )));
        }
        self.records.push((key_type, PsbtRecord { key_data, value }));
        Ok(())
    }

    /// Value of the first record of `key_type`
    pub fn get(&self, key_type: u64) -> Option<&[u8]> {
        self.records(key_type).next().map(|record| record.value.as_slice())
    }

    pub fn records(&self, key_type: u64) -> impl Iterator<Item = &PsbtRecord> {
        self.records
            .iter()
            .filter(move |(record_type, _)| *record_type == key_type)
            .map(|(_, record)| record)
    }

    pub fn contains(&self, key_type: u64) -> bool {
        self.records(key_type).next().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &PsbtRecord)> {
        self.records.iter().map(|(key_type, record)| (*key_type, record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read records up to and including the zero-length key terminator
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let mut map = Self::new();
        loop {
            let key = reader.read_var_slice()?;
            if key.is_empty() {
                return Ok(map);
            }
            let (key_type, offset) = read_var_int(key, 0)?;
            let value = reader.read_var_slice()?;
            log::trace!(
                "PSBT record type 0x{:02x}, {} bytes keydata, {} bytes value",
                key_type,
                key.len() - offset,
                value.len()
            );
            map.insert(key_type, key[offset..].to_vec(), value.to_vec())?;
        }
    }

    /// Write every record followed by the terminator
    pub fn write(&self, out: &mut Vec<u8>) {
        for (key_type, record) in self.iter() {
            let mut key = var_int_to_bytes(key_type);
            key.extend_from_slice(&record.key_data);
            write_var_slice(out, &key);
            write_var_slice(out, &record.value);
        }
        out.push(0x00);
    }
}

// ============================================================================
// DECODING AND ENCODING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psbt {
    pub global: PsbtKeyValueMap,
    pub inputs: Vec<PsbtKeyValueMap>,
    pub outputs: Vec<PsbtKeyValueMap>,
    /// Decoded from the global `UNSIGNED_TX` record
    pub unsigned_tx: Transaction,
}

impl Psbt {
    /// Wrap an unsigned transaction with empty input and output maps
    pub fn from_unsigned_tx(tx: Transaction) -> Result<Self> {
        if tx.inputs.iter().any(|input| !input.script_sig.is_empty() || !input.witness.is_empty()) {
            return Err(CodecError::Malformed("PSBT transaction must be unsigned".to_string()));
        }
        let mut global = PsbtKeyValueMap::new();
        global.insert(PSBT_GLOBAL_UNSIGNED_TX, Vec::new(), serialize_transaction(&tx, false))?;
        Ok(Psbt {
            global,
            inputs: vec![PsbtKeyValueMap::new(); tx.inputs.len()],
            outputs: vec![PsbtKeyValueMap::new(); tx.outputs.len()],
            unsigned_tx: tx,
        })
    }

    pub fn to_bytes(&self) -> ByteString {
        encode_psbt(self)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(encode_psbt(self))
    }
}

/// Decode a binary PSBT
pub fn decode_psbt(buf: &[u8], network: Network) -> Result<Psbt> {
    if buf.len() < PSBT_MAGIC.len() + 1
        || buf[..PSBT_MAGIC.len()] != PSBT_MAGIC
        || buf[PSBT_MAGIC.len()] != PSBT_SEPARATOR
    {
        return Err(CodecError::Malformed("missing PSBT magic bytes".to_string()));
    }
    let mut reader = ByteReader::new(buf);
    reader.set_position(PSBT_MAGIC.len() + 1);

    let global = PsbtKeyValueMap::read(&mut reader)?;
    let unsigned = global
        .records(PSBT_GLOBAL_UNSIGNED_TX)
        .find(|record| record.key_data.is_empty())
        .ok_or_else(|| CodecError::Malformed("PSBT has no unsigned transaction".to_string()))?;
    let unsigned_tx = decode_unsigned_transaction(&unsigned.value, network)?;
    if unsigned_tx.inputs.iter().any(|input| !input.script_sig.is_empty()) {
        return Err(CodecError::Malformed(
            "PSBT unsigned transaction has a non-empty scriptSig".to_string(),
        ));
    }

    // The unsigned transaction declares how many maps follow
    let inputs = (0..unsigned_tx.inputs.len())
        .map(|_| PsbtKeyValueMap::read(&mut reader))
        .collect::<Result<Vec<_>>>()?;
    let outputs = (0..unsigned_tx.outputs.len())
        .map(|_| PsbtKeyValueMap::read(&mut reader))
        .collect::<Result<Vec<_>>>()?;

    if !reader.is_empty() {
        return Err(CodecError::Malformed(format!(
            "{} trailing bytes after PSBT maps",
            reader.remaining()
        )));
    }

    Ok(Psbt { global, inputs, outputs, unsigned_tx })
}

/// Encode a PSBT; the inverse of [`decode_psbt`]
pub fn encode_psbt(psbt: &Psbt) -> ByteString {
    let mut out = Vec::new();
    out.extend_from_slice(&PSBT_MAGIC);
    out.push(PSBT_SEPARATOR);
    psbt.global.write(&mut out);
    for map in psbt.inputs.iter().chain(&psbt.outputs) {
        map.write(&mut out);
    }
    out
}

// ============================================================================
// BEST-EFFORT FILL
// ============================================================================

fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

fn read_witness_utxo(value: &[u8], network: Network) -> Result<TransactionOutput> {
    let mut reader = ByteReader::new(value);
    let amount = reader.read_u64_le()?;
    let script_pubkey = reader.read_var_slice()?.to_vec();
    if !reader.is_empty() {
        return Err(CodecError::Malformed("trailing bytes in witness utxo".to_string()));
    }
    Ok(TransactionOutput::new(amount, script_pubkey, network))
}

/// Output spent by `input`, from `WITNESS_UTXO` or `NON_WITNESS_UTXO`
fn input_prevout(
    input: &TransactionInput,
    map: &PsbtKeyValueMap,
    network: Network,
) -> Result<Option<TransactionOutput>> {
    if let Some(value) = map.get(PSBT_IN_WITNESS_UTXO) {
        return read_witness_utxo(value, network).map(Some);
    }
    let Some(value) = map.get(PSBT_IN_NON_WITNESS_UTXO) else {
        return Ok(None);
    };
    let previous = decode_transaction(value, network)?;
    if previous.txid != input.previous_output.txid() {
        return Err(CodecError::Malformed(format!(
            "non-witness utxo {} does not match input {}",
            previous.txid,
            input.previous_output.txid()
        )));
    }
    previous
        .outputs
        .get(input.previous_output.index as usize)
        .cloned()
        .map(Some)
        .ok_or_else(|| {
            CodecError::Malformed(format!(
                "non-witness utxo has no output {}",
                input.previous_output.index
            ))
        })
}

/// `PARTIAL_SIG` records as (pubkey, signature)
fn partial_signatures(map: &PsbtKeyValueMap) -> Result<Vec<(&[u8], &[u8])>> {
    map.records(PSBT_IN_PARTIAL_SIG)
        .map(|record| {
            if record.value.len() > MAX_ECDSA_SIGNATURE_SIZE {
                return Err(CodecError::Malformed(format!(
                    "partial signature of {} bytes exceeds {}",
                    record.value.len(),
                    MAX_ECDSA_SIGNATURE_SIZE
                )));
            }
            Ok((record.key_data.as_slice(), record.value.as_slice()))
        })
        .collect()
}

fn redeem_script<'a>(
    map: &'a PsbtKeyValueMap,
    prevout: &TransactionOutput,
) -> Result<Option<&'a [u8]>> {
    let Some(redeem) = map.get(PSBT_IN_REDEEM_SCRIPT) else {
        return Ok(None);
    };
    if redeem.len() > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(CodecError::Malformed(format!(
            "redeem script of {} bytes exceeds {}",
            redeem.len(),
            MAX_SCRIPT_ELEMENT_SIZE
        )));
    }
    if prevout.script_pubkey.get(2..22) != Some(&hash160(redeem)[..]) {
        log::warn!("redeem script does not hash to the spent P2SH output, ignoring it");
        return Ok(None);
    }
    Ok(Some(redeem))
}

/// `WITNESS_SCRIPT`, checked against the 32-byte program it must hash to
fn witness_script<'a>(map: &'a PsbtKeyValueMap, program_script: &[u8]) -> Option<&'a [u8]> {
    let script = map.get(PSBT_IN_WITNESS_SCRIPT)?;
    let hash: [u8; 32] = Sha256::digest(script).into();
    if program_script.get(2..34) != Some(&hash[..]) {
        log::warn!("witness script does not hash to the spent P2WSH program, ignoring it");
        return None;
    }
    Some(script)
}

/// Signatures in the order their keys appear in `script`
fn ordered_signatures<'a>(script: &[u8], signatures: &[(&[u8], &'a [u8])]) -> Vec<&'a [u8]> {
    let keys = pushed_keys(script);
    for (key, _) in signatures {
        if !keys.contains(key) {
            log::warn!("partial signature for key {} not found in script", hex::encode(key));
        }
    }
    keys.iter()
        .filter_map(|key| signatures.iter().find(|(k, _)| k == key).map(|(_, sig)| *sig))
        .collect()
}

/// Witness for a P2WSH script: multisig dummy, signatures, script
fn script_witness(script: &[u8], signatures: &[(&[u8], &[u8])]) -> Witness {
    let mut witness = Vec::new();
    if parse_multisig_script(script).is_some() {
        witness.push(Vec::new());
    }
    witness.extend(ordered_signatures(script, signatures).into_iter().map(<[u8]>::to_vec));
    witness.push(script.to_vec());
    witness
}

/// scriptSig for a bare multisig or P2SH script, optionally ending with the redeem script
fn script_sig_for(script: &[u8], signatures: &[(&[u8], &[u8])], redeem: Option<&[u8]>) -> ByteString {
    let mut script_sig = Vec::new();
    if parse_multisig_script(script).is_some() {
        script_sig.push(OP_0);
    }
    for sig in ordered_signatures(script, signatures) {
        write_push(&mut script_sig, sig);
    }
    if let Some(redeem) = redeem {
        write_push(&mut script_sig, redeem);
    }
    script_sig
}

/// `TAP_LEAF_SCRIPT` records as script paths
fn input_tap_leaves(map: &PsbtKeyValueMap) -> Result<Vec<(ScriptPath, ByteString)>> {
    map.records(PSBT_IN_TAP_LEAF_SCRIPT)
        .map(|record| {
            let Some((&leaf_version, script)) = record.value.split_last() else {
                return Err(CodecError::Malformed("empty tap leaf script record".to_string()));
            };
            let path = ScriptPath::from_control_block(script, &record.key_data)?;
            if path.leaf_version != leaf_version & TAPROOT_LEAF_MASK {
                return Err(CodecError::Malformed(format!(
                    "tap leaf version 0x{:02x} does not match control block",
                    leaf_version
                )));
            }
            Ok((path, record.key_data.clone()))
        })
        .collect()
}

/// `TAP_SCRIPT_SIG` records as (x-only key, leaf hash, signature)
fn tap_script_signatures(map: &PsbtKeyValueMap) -> Result<Vec<(&[u8], &[u8], &[u8])>> {
    map.records(PSBT_IN_TAP_SCRIPT_SIG)
        .map(|record| {
            if record.key_data.len() != 64 || !matches!(record.value.len(), 64 | 65) {
                return Err(CodecError::Malformed("invalid tap script signature record".to_string()));
            }
            let (key, leaf_hash) = record.key_data.split_at(32);
            Ok((key, leaf_hash, record.value.as_slice()))
        })
        .collect()
}

fn fill_taproot_input(input: &mut TransactionInput, map: &PsbtKeyValueMap) -> Result<()> {
    if let Some(sig) = map.get(PSBT_IN_TAP_KEY_SIG) {
        if !matches!(sig.len(), 64 | 65) {
            return Err(CodecError::Malformed(format!("tap key signature of {} bytes", sig.len())));
        }
        input.witness = vec![sig.to_vec()];
        return Ok(());
    }

    let leaves = input_tap_leaves(map)?;
    if leaves.is_empty() || !map.contains(PSBT_IN_TAP_INTERNAL_KEY) {
        return Ok(());
    }
    let signatures = tap_script_signatures(map)?;

    let matching = |path: &ScriptPath| {
        let leaf_hash = path.leaf_hash();
        signatures.iter().filter(|(_, hash, _)| *hash == leaf_hash).count()
    };
    let mut chosen = &leaves[0];
    if let Some(nums) = leaves.iter().find(|(path, _)| path.is_nums) {
        chosen = nums;
    } else {
        for leaf in &leaves[1..] {
            if matching(&leaf.0) > matching(&chosen.0) {
                chosen = leaf;
            }
        }
    }

    let (path, control_block) = chosen;
    let leaf_hash = path.leaf_hash();
    // Keys are checked in script order, so their signatures are consumed from the top of the stack
    let mut witness: Witness = pushed_keys(&path.script)
        .into_iter()
        .filter(|key| key.len() == 32)
        .rev()
        .map(|key| {
            signatures
                .iter()
                .find(|(k, hash, _)| *k == key && *hash == leaf_hash)
                .map(|(_, _, sig)| sig.to_vec())
                .unwrap_or_default()
        })
        .collect();
    witness.push(path.script.clone());
    witness.push(control_block.clone());
    input.witness = witness;
    Ok(())
}

/// Build a displayable scriptSig/witness from partial data
fn fill_input(input: &mut TransactionInput, map: &PsbtKeyValueMap) -> Result<()> {
    let Some(prevout) = input.prevout.clone() else {
        return Ok(());
    };
    let signatures = partial_signatures(map)?;
    let first = signatures.first().copied();

    match prevout.script_pubkey_type {
        AddressType::P2pkh => {
            if let Some((key, sig)) = first {
                let mut script_sig = push_script(sig);
                write_push(&mut script_sig, key);
                input.script_sig = script_sig;
            }
        }
        AddressType::P2pk => {
            if let Some((_, sig)) = first {
                input.script_sig = push_script(sig);
            }
        }
        AddressType::V0P2wpkh => {
            if let Some((key, sig)) = first {
                input.witness = vec![sig.to_vec(), key.to_vec()];
            }
        }
        AddressType::Multisig => {
            if !signatures.is_empty() {
                input.script_sig = script_sig_for(&prevout.script_pubkey, &signatures, None);
            }
        }
        AddressType::V0P2wsh => {
            if let Some(script) = witness_script(map, &prevout.script_pubkey) {
                input.witness = script_witness(script, &signatures);
            }
        }
        AddressType::P2sh => {
            let Some(redeem) = redeem_script(map, &prevout)? else {
                return Ok(());
            };
            match script_pubkey_type(redeem) {
                AddressType::V0P2wpkh => {
                    input.script_sig = push_script(redeem);
                    if let Some((key, sig)) = first {
                        input.witness = vec![sig.to_vec(), key.to_vec()];
                    }
                }
                AddressType::V0P2wsh => {
                    input.script_sig = push_script(redeem);
                    if let Some(script) = witness_script(map, redeem) {
                        input.witness = script_witness(script, &signatures);
                    }
                }
                _ => input.script_sig = script_sig_for(redeem, &signatures, Some(redeem)),
            }
        }
        AddressType::V1P2tr => fill_taproot_input(input, map)?,
        _ => {}
    }
    Ok(())
}

/// Turn a PSBT into a transaction for display
///
/// Prevouts come from `WITNESS_UTXO`/`NON_WITNESS_UTXO`. Finalized inputs
/// take their final scriptSig and witness; the rest are filled from
/// redeem/witness scripts and whatever signatures are present.
pub fn psbt_to_transaction(psbt: &Psbt, network: Network) -> Result<Transaction> {
    let mut tx = psbt.unsigned_tx.clone();

    for (input, map) in tx.inputs.iter_mut().zip(&psbt.inputs) {
        input.prevout = input_prevout(input, map, network)?;

        let final_script_sig = map.get(PSBT_IN_FINAL_SCRIPTSIG);
        let final_witness = map.get(PSBT_IN_FINAL_SCRIPTWITNESS);
        if final_script_sig.is_some() || final_witness.is_some() {
            if let Some(script_sig) = final_script_sig {
                input.script_sig = script_sig.to_vec();
            }
            if let Some(witness) = final_witness {
                let (items, end) = read_vector(witness, 0)?;
                if end != witness.len() {
                    return Err(CodecError::Malformed("trailing bytes in final witness".to_string()));
                }
                input.witness = items;
            }
        } else {
            fill_input(input, map)?;
        }

        input.script_sig_asm = to_asm(&input.script_sig);
        add_inner_scripts(input);
    }

    finalize_transaction(&mut tx);
    tx.fee = calculate_fee(&tx);
    Ok(tx)
}

// ============================================================================
// SIGNING ESTIMATES
// ============================================================================

/// What signing still has to add to an input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResult {
    pub missing_sigs: u32,
    /// Bytes the missing signatures add
    pub bytes: u64,
    /// Whether those bytes land in the witness
    pub add_to_witness: bool,
}

impl FillResult {
    fn single(bytes: u64, add_to_witness: bool) -> Self {
        FillResult { missing_sigs: 1, bytes, add_to_witness }
    }

    fn missing(missing_sigs: u32, per_signature: u64, add_to_witness: bool) -> Self {
        FillResult {
            missing_sigs,
            bytes: per_signature * missing_sigs as u64,
            add_to_witness: add_to_witness && missing_sigs > 0,
        }
    }
}

fn present_signatures(items: &[&[u8]]) -> u32 {
    items.iter().filter(|item| !item.is_empty()).count() as u32
}

fn ecdsa_multisig_fill(script: &[u8], items: &[&[u8]], add_to_witness: bool) -> FillResult {
    match parse_multisig_script(script) {
        Some(info) => FillResult::missing(
            info.m.saturating_sub(present_signatures(items)),
            ECDSA_SIGNATURE_BYTES,
            add_to_witness,
        ),
        None => FillResult::default(),
    }
}

fn taproot_fill(witness: &[ByteString]) -> FillResult {
    if witness.is_empty() {
        return FillResult::single(TAPROOT_KEY_PATH_BYTES, true);
    }
    let Ok(parsed) = parse_taproot(witness) else {
        return FillResult::default();
    };
    let Some(path) = parsed.script_path else {
        return FillResult::default();
    };
    let present = parsed
        .stack
        .iter()
        .filter(|item| matches!(item.len(), 64 | 65))
        .count() as u32;
    let required = parse_tapscript_multisig(&path.script)
        .map(|info| info.m)
        .or_else(|| parse_tapscript_unanimous_multisig(&path.script));
    match required {
        Some(required) => FillResult::missing(required.saturating_sub(present), SCHNORR_SIGNATURE_BYTES, true),
        None => FillResult::default(),
    }
}

/// Estimate the signatures and bytes an input still lacks
pub fn fill_unsigned_input(input: &TransactionInput) -> FillResult {
    let Some(address_type) = input_address_type(input) else {
        return FillResult::default();
    };
    let unsigned = input.script_sig.is_empty();
    match address_type {
        AddressType::P2pkh if unsigned => FillResult::single(P2PKH_SIGNATURE_BYTES, false),
        AddressType::P2pk if unsigned => FillResult::single(P2PK_SIGNATURE_BYTES, false),
        AddressType::V0P2wpkh | AddressType::P2shP2wpkh if input.witness.is_empty() => {
            FillResult::single(P2WPKH_SIGNATURE_BYTES, true)
        }
        AddressType::V1P2tr => taproot_fill(&input.witness),
        AddressType::Multisig => {
            let items = push_data_items(&input.script_sig).unwrap_or_default();
            let script = input.prevout.as_ref().map(|p| p.script_pubkey.as_slice()).unwrap_or(&[]);
            ecdsa_multisig_fill(script, &items, false)
        }
        AddressType::P2sh => {
            let Some(redeem) = inner_redeem_script(input) else {
                return FillResult::default();
            };
            let mut items = push_data_items(&input.script_sig).unwrap_or_default();
            items.pop();
            ecdsa_multisig_fill(redeem, &items, false)
        }
        AddressType::V0P2wsh | AddressType::P2shP2wsh => {
            let Some((script, items)) = input.witness.split_last() else {
                return FillResult::default();
            };
            let items: Vec<&[u8]> = items.iter().map(Vec::as_slice).collect();
            ecdsa_multisig_fill(script, &items, true)
        }
        _ => FillResult::default(),
    }
}

// ============================================================================
// TAP LEAVES
// ============================================================================

/// Candidate tap leaves carried by a PSBT
///
/// Inputs contribute `TAP_LEAF_SCRIPT` records when a `TAP_INTERNAL_KEY` is
/// present; outputs contribute every leaf of `TAP_TREE` under their
/// `TAP_INTERNAL_KEY`.
pub fn extract_tap_leaves(psbt: &Psbt) -> Result<Vec<ScriptPath>> {
    let mut leaves: Vec<ScriptPath> = Vec::new();

    for map in &psbt.inputs {
        if !map.contains(PSBT_IN_TAP_INTERNAL_KEY) {
            continue;
        }
        for (path, _) in input_tap_leaves(map)? {
            if !leaves.contains(&path) {
                leaves.push(path);
            }
        }
    }

    for map in &psbt.outputs {
        let (Some(tree), Some(key)) = (map.get(PSBT_OUT_TAP_TREE), map.get(PSBT_OUT_TAP_INTERNAL_KEY)) else {
            continue;
        };
        let internal_key: [u8; 32] = key
            .try_into()
            .map_err(|_| CodecError::Malformed(format!("tap internal key of {} bytes", key.len())))?;
        let tree_leaves = parse_tap_tree(tree)?;
        let (root, paths) = tap_tree_paths(&tree_leaves)?;
        let tweaked = compute_taproot_output_key(&internal_key, Some(&root))?;
        for (leaf, merkle_branches) in tree_leaves.into_iter().zip(paths) {
            let path = ScriptPath {
                script: leaf.script,
                leaf_version: leaf.leaf_version & TAPROOT_LEAF_MASK,
                parity: tweaked.parity,
                internal_key,
                merkle_branches,
                is_nums: internal_key == NUMS_INTERNAL_KEY,
            };
            if !leaves.contains(&path) {
                leaves.push(path);
            }
        }
    }

    if leaves.is_empty() {
        return Err(CodecError::NoMatch("no taproot leaves found in PSBT".to_string()));
    }
    Ok(leaves)
}

// ============================================================================
// MESSAGE SIGNING PSBT
// ============================================================================

/// The output a message-signing PSBT spends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSigningOptions {
    /// sat/vB applied to single-key spends
    pub fee_rate: f64,
    /// Fee for script spends whose size cannot be estimated
    pub fallback_fee: u64,
    pub sequence: u32,
    pub lock_time: u32,
}

impl Default for MessageSigningOptions {
    fn default() -> Self {
        MessageSigningOptions {
            fee_rate: 1.0,
            fallback_fee: 1000,
            sequence: SEQUENCE_FINAL,
            lock_time: 0,
        }
    }
}

fn message_signing_fee(
    tx: &Transaction,
    prevout: &TransactionOutput,
    options: &MessageSigningOptions,
) -> Result<u64> {
    match prevout.script_pubkey_type {
        AddressType::P2pkh | AddressType::P2pk | AddressType::V0P2wpkh => {
            if !options.fee_rate.is_finite() || options.fee_rate < 0.0 {
                return Err(CodecError::Malformed(format!("invalid fee rate {}", options.fee_rate)));
            }
            let mut input = tx.inputs[0].clone();
            input.prevout = Some(prevout.clone());
            let fill = fill_unsigned_input(&input);
            let mut weight = calculate_transaction_weight(tx);
            weight += if fill.add_to_witness {
                // marker, flag and the stack item count
                fill.bytes + 3
            } else {
                fill.bytes * WITNESS_SCALE_FACTOR
            };
            Ok((weight_to_vsize(weight) as f64 * options.fee_rate).ceil() as u64)
        }
        _ => Ok(options.fallback_fee),
    }
}

/// Build an unsigned PSBT proving control of `script_pubkey`
///
/// Spends `utxo` to an `OP_RETURN <message>` output plus change back to the
/// same script. The previous transaction is required for legacy spends.
pub fn create_message_signing_psbt(
    utxo: &SigningUtxo,
    script_pubkey: &[u8],
    message: &str,
    options: &MessageSigningOptions,
    previous_tx: Option<&[u8]>,
    network: Network,
) -> Result<Psbt> {
    let hash = hash_from_display(&utxo.txid)
        .ok_or_else(|| CodecError::Malformed(format!("invalid txid {}", utxo.txid)))?;
    let prevout = TransactionOutput::new(utxo.value, script_pubkey.to_vec(), network);

    let mut message_script = vec![OP_RETURN];
    write_push(&mut message_script, message.as_bytes());

    let mut tx = Transaction {
        version: 2,
        lock_time: options.lock_time,
        inputs: vec![TransactionInput::new(
            OutPoint { hash, index: utxo.vout },
            Vec::new(),
            options.sequence,
            Vec::new(),
        )],
        outputs: vec![
            TransactionOutput::new(0, message_script, network),
            TransactionOutput::new(utxo.value, script_pubkey.to_vec(), network),
        ],
        ..Default::default()
    };

    let fee = message_signing_fee(&tx, &prevout, options)?;
    let dust = get_dust_threshold(&tx.outputs[1]);
    let change = utxo.value.saturating_sub(fee);
    if change < dust {
        return Err(CodecError::Malformed(format!(
            "change of {} sats after a {} sat fee is below the dust threshold of {}",
            change, fee, dust
        )));
    }
    tx.outputs[1].value = change;
    finalize_transaction(&mut tx);

    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    let input_map = &mut psbt.inputs[0];

    if is_witness_program(script_pubkey) || prevout.script_pubkey_type == AddressType::P2sh {
        let mut value = u64_to_bytes(utxo.value);
        write_var_slice(&mut value, script_pubkey);
        input_map.insert(PSBT_IN_WITNESS_UTXO, Vec::new(), value)?;
    }
    match previous_tx {
        Some(raw) => {
            let previous = decode_transaction(raw, network)?;
            if hash_from_display(&previous.txid) != Some(hash) {
                return Err(CodecError::Malformed(format!(
                    "previous transaction {} does not match utxo {}",
                    previous.txid, utxo.txid
                )));
            }
            input_map.insert(PSBT_IN_NON_WITNESS_UTXO, Vec::new(), raw.to_vec())?;
        }
        None if !input_map.contains(PSBT_IN_WITNESS_UTXO) => {
            return Err(CodecError::Malformed(
                "previous transaction is required to spend a legacy output".to_string(),
            ));
        }
        None => {}
    }

    log::debug!(
        "built message signing PSBT spending {}:{} with fee {}",
        utxo.txid,
        utxo.vout,
        fee
    );
    Ok(psbt)
}
