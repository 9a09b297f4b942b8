//! Raw transaction decoding, serialization and derived fields

use crate::address::{script_pubkey_to_address, AddressType};
use crate::cursor::*;
use crate::error::{CodecError, Result};
use crate::network::Network;
use crate::psbt::{decode_psbt, psbt_to_transaction, PSBT_MAGIC};
use crate::script::{last_push, to_asm, OP_0, OP_PUSHBYTES_20, OP_PUSHBYTES_32};
use crate::segwit::calculate_transaction_weight;
use crate::taproot::has_annex;
use crate::types::*;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use serde::{Deserialize, Serialize};

/// Segwit serialization marker and flag following the version
const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

impl TransactionOutput {
    /// Output with its ASM, type and address derived for `network`
    pub fn new(value: u64, script_pubkey: ByteString, network: Network) -> Self {
        let derived = script_pubkey_to_address(&script_pubkey, network);
        TransactionOutput {
            value,
            script_pubkey_asm: to_asm(&script_pubkey),
            script_pubkey_type: derived.address_type,
            script_pubkey_address: derived.address,
            script_pubkey,
        }
    }
}

impl TransactionInput {
    pub fn new(previous_output: OutPoint, script_sig: ByteString, sequence: u32, witness: Witness) -> Self {
        TransactionInput {
            is_coinbase: previous_output.is_null(),
            previous_output,
            script_sig_asm: to_asm(&script_sig),
            script_sig,
            sequence,
            witness,
            prevout: None,
            inner_redeemscript_asm: None,
            inner_witnessscript_asm: None,
        }
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Read one transaction from the reader's current position
pub fn read_transaction(reader: &mut ByteReader<'_>, network: Network) -> Result<Transaction> {
    read_transaction_inner(reader, network, true)
}

fn read_transaction_inner(
    reader: &mut ByteReader<'_>,
    network: Network,
    allow_witness: bool,
) -> Result<Transaction> {
    let version = reader.read_i32_le()?;

    // Marker 0x00 could also be an input count of zero
    let mut segwit = false;
    if allow_witness && reader.peek_u8() == Some(SEGWIT_MARKER) {
        let rewind = reader.position();
        reader.read_u8()?;
        if reader.read_u8()? == SEGWIT_FLAG {
            segwit = true;
        } else {
            reader.set_position(rewind);
        }
    }

    let input_count = reader.read_count()?;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let hash = reader.read_hash()?;
        let index = reader.read_u32_le()?;
        let script_sig = reader.read_var_slice()?.to_vec();
        let sequence = reader.read_u32_le()?;
        inputs.push(TransactionInput::new(OutPoint { hash, index }, script_sig, sequence, Vec::new()));
    }

    let output_count = reader.read_count()?;
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        let value = reader.read_u64_le()?;
        let script_pubkey = reader.read_var_slice()?.to_vec();
        outputs.push(TransactionOutput::new(value, script_pubkey, network));
    }

    if segwit {
        for input in inputs.iter_mut() {
            input.witness = reader.read_vector()?;
        }
        if inputs.iter().all(|input| input.witness.is_empty()) {
            return Err(CodecError::Malformed("superfluous witness record".to_string()));
        }
    }

    let lock_time = reader.read_u32_le()?;

    let mut tx = Transaction {
        version,
        lock_time,
        inputs,
        outputs,
        ..Default::default()
    };
    finalize_transaction(&mut tx);
    Ok(tx)
}

/// Decode a complete raw transaction; trailing bytes are an error
pub fn decode_transaction(buf: &[u8], network: Network) -> Result<Transaction> {
    let mut reader = ByteReader::new(buf);
    let tx = read_transaction(&mut reader, network)?;
    if !reader.is_empty() {
        return Err(CodecError::Malformed(format!(
            "{} trailing bytes after transaction",
            reader.remaining()
        )));
    }
    Ok(tx)
}

/// Decode a transaction that is always in non-witness form (the PSBT unsigned transaction)
///
/// A zero input count is never taken for a segwit marker.
pub fn decode_unsigned_transaction(buf: &[u8], network: Network) -> Result<Transaction> {
    let mut reader = ByteReader::new(buf);
    let tx = read_transaction_inner(&mut reader, network, false)?;
    if !reader.is_empty() {
        return Err(CodecError::Malformed(format!(
            "{} trailing bytes after unsigned transaction",
            reader.remaining()
        )));
    }
    Ok(tx)
}

// ============================================================================
// SERIALIZATION
// ============================================================================

/// Serialize a transaction in wire format
///
/// With `include_witness` and at least one non-empty witness the segwit
/// marker, flag and witness stacks are written.
pub fn serialize_transaction(tx: &Transaction, include_witness: bool) -> ByteString {
    let segwit = include_witness && tx.has_witness();
    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());
    if segwit {
        out.push(SEGWIT_MARKER);
        out.push(SEGWIT_FLAG);
    }

    write_var_int(&mut out, tx.inputs.len() as u64);
    for input in &tx.inputs {
        out.extend_from_slice(&input.previous_output.hash);
        out.extend_from_slice(&input.previous_output.index.to_le_bytes());
        write_var_slice(&mut out, &input.script_sig);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_var_int(&mut out, tx.outputs.len() as u64);
    for output in &tx.outputs {
        out.extend_from_slice(&output.value.to_le_bytes());
        write_var_slice(&mut out, &output.script_pubkey);
    }

    if segwit {
        for input in &tx.inputs {
            write_vector(&mut out, &input.witness);
        }
    }

    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}

/// txid = reverse(SHA256d(serialize(tx, no witness)))
pub fn compute_txid(tx: &Transaction) -> String {
    let hash = sha256d::Hash::hash(&serialize_transaction(tx, false)).into_inner();
    hash_to_display(&hash)
}

/// Recompute txid, size and weight from the transaction's own serialization
pub fn finalize_transaction(tx: &mut Transaction) {
    tx.txid = compute_txid(tx);
    tx.size = serialize_transaction(tx, true).len() as Natural;
    tx.weight = calculate_transaction_weight(tx);
}

// ============================================================================
// INNER SCRIPTS
// ============================================================================

/// Segwit program type wrapped in a P2SH scriptSig, judged by the push prefix
pub fn p2sh_wrapped_type(script_sig: &[u8]) -> Option<AddressType> {
    match script_sig {
        [0x16, OP_0, OP_PUSHBYTES_20, ..] if script_sig.len() == 23 => Some(AddressType::P2shP2wpkh),
        [0x22, OP_0, OP_PUSHBYTES_32, ..] if script_sig.len() == 35 => Some(AddressType::P2shP2wsh),
        _ => None,
    }
}

/// Type of the output an input spends, with P2SH-wrapped segwit resolved
pub fn input_address_type(input: &TransactionInput) -> Option<AddressType> {
    let prevout = input.prevout.as_ref()?;
    Some(match prevout.script_pubkey_type {
        AddressType::P2sh => p2sh_wrapped_type(&input.script_sig).unwrap_or(AddressType::P2sh),
        other => other,
    })
}

/// Redeem script of a P2SH spend: the last scriptSig push
pub fn inner_redeem_script(input: &TransactionInput) -> Option<&[u8]> {
    let prevout = input.prevout.as_ref()?;
    if prevout.script_pubkey_type != AddressType::P2sh {
        return None;
    }
    last_push(&input.script_sig).filter(|script| !script.is_empty())
}

/// Witness script of a P2WSH or P2SH-P2WSH spend, or the revealed tapscript of a script-path spend
pub fn inner_witness_script(input: &TransactionInput) -> Option<&[u8]> {
    match input_address_type(input)? {
        AddressType::V0P2wsh | AddressType::P2shP2wsh => input.witness.last().map(Vec::as_slice),
        AddressType::V1P2tr => {
            let items = if has_annex(&input.witness) {
                &input.witness[..input.witness.len() - 1]
            } else {
                &input.witness[..]
            };
            if items.len() >= 2 {
                Some(items[items.len() - 2].as_slice())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Fill `inner_redeemscript_asm` and `inner_witnessscript_asm` from the spend data
pub fn add_inner_scripts(input: &mut TransactionInput) {
    input.inner_redeemscript_asm = inner_redeem_script(input).map(to_asm);
    input.inner_witnessscript_asm = inner_witness_script(input).map(to_asm);
}

pub fn add_inner_scripts_to_transaction(tx: &mut Transaction) {
    for input in tx.inputs.iter_mut() {
        add_inner_scripts(input);
    }
}

/// Fee from prevout values, when every prevout is known
pub fn calculate_fee(tx: &Transaction) -> Option<u64> {
    if tx.is_coinbase() {
        return Some(0);
    }
    let mut total_in: u64 = 0;
    for input in &tx.inputs {
        total_in = total_in.checked_add(input.prevout.as_ref()?.value)?;
    }
    let total_out = tx
        .outputs
        .iter()
        .try_fold(0u64, |sum, output| sum.checked_add(output.value))?;
    total_in.checked_sub(total_out)
}

// ============================================================================
// TEXT INPUT
// ============================================================================

/// A transaction decoded from user input, with the PSBT it came from, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    pub tx: Transaction,
    /// Raw transaction hex (for PSBTs: the best-effort filled transaction)
    pub hex: String,
    /// Base64 PSBT when the input was a PSBT
    pub psbt: Option<String>,
}

/// Decode hex or base64 text into bytes
pub fn decode_input_bytes(input: &str) -> Result<ByteString> {
    let text = input.trim();
    if text.is_empty() {
        return Err(CodecError::InvalidEncoding("empty input".to_string()));
    }
    if text.len() % 2 == 0 && text.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(text).map_err(|e| CodecError::InvalidEncoding(e.to_string()));
    }
    BASE64
        .decode(text)
        .map_err(|_| CodecError::InvalidEncoding("input is neither hex nor base64".to_string()))
}

/// Decode a raw transaction or PSBT given as hex or base64
pub fn decode_raw_transaction(input: &str, network: Network) -> Result<DecodedTransaction> {
    let bytes = decode_input_bytes(input)?;

    if bytes.starts_with(&PSBT_MAGIC) {
        let psbt = decode_psbt(&bytes, network)?;
        let tx = psbt_to_transaction(&psbt, network)?;
        log::debug!(
            "decoded PSBT {} with {} inputs and {} outputs",
            tx.txid,
            tx.inputs.len(),
            tx.outputs.len()
        );
        return Ok(DecodedTransaction {
            hex: hex::encode(serialize_transaction(&tx, true)),
            psbt: Some(BASE64.encode(&bytes)),
            tx,
        });
    }

    let tx = decode_transaction(&bytes, network)?;
    log::debug!(
        "decoded transaction {} with {} inputs and {} outputs",
        tx.txid,
        tx.inputs.len(),
        tx.outputs.len()
    );
    Ok(DecodedTransaction { hex: hex::encode(&bytes), tx, psbt: None })
}
