//! Core transaction types as seen by an explorer

use crate::address::AddressType;
use crate::flags::TransactionFlags;
use serde::{Deserialize, Serialize};

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Natural number type
pub type Natural = u64;

/// Witness stack of one input, bottom item first
pub type Witness = Vec<ByteString>;

/// Reference to a previous transaction output
///
/// `hash` is in internal (little-endian) byte order; [`OutPoint::txid`]
/// gives the usual big-endian display form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn txid(&self) -> String {
        hash_to_display(&self.hash)
    }

    /// Coinbase inputs reference the null outpoint
    pub fn is_null(&self) -> bool {
        self.hash == [0u8; 32] && self.index == u32::MAX
    }
}

/// Display form (reversed hex) of an internal-order hash
pub fn hash_to_display(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Internal-order hash from its display form
pub fn hash_from_display(txid: &str) -> Option<Hash> {
    let bytes = hex::decode(txid).ok()?;
    let mut hash: Hash = bytes.try_into().ok()?;
    hash.reverse();
    Some(hash)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_pubkey: ByteString,
    pub script_pubkey_asm: String,
    pub script_pubkey_type: AddressType,
    pub script_pubkey_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub previous_output: OutPoint,
    pub script_sig: ByteString,
    pub script_sig_asm: String,
    pub sequence: u32,
    /// Empty for legacy inputs
    pub witness: Witness,
    pub is_coinbase: bool,
    /// Snapshot of the output being spent, when known
    pub prevout: Option<TransactionOutput>,
    pub inner_redeemscript_asm: Option<String>,
    pub inner_witnessscript_asm: Option<String>,
}

/// Summary of a related mempool transaction used in fee-rate math
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedTransaction {
    pub txid: String,
    pub fee: u64,
    pub weight: u64,
}

/// Child-pays-for-parent context supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpfpInfo {
    pub ancestors: Vec<RelatedTransaction>,
    pub descendants: Vec<RelatedTransaction>,
    pub best_descendant: Option<RelatedTransaction>,
    pub effective_fee_per_vsize: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Big-endian display txid
    pub txid: String,
    pub version: i32,
    pub lock_time: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Serialized size in bytes, witness included
    pub size: u64,
    pub weight: u64,
    /// Supplied by the caller when prevouts are known
    pub fee: Option<u64>,
    pub sigops: Option<u32>,
    pub effective_fee_per_vsize: Option<f64>,
    pub ancestors: Vec<RelatedTransaction>,
    /// Set when the transaction is being accelerated out of band
    pub acceleration: bool,
    /// Static flags, cached once computed
    pub flags: Option<TransactionFlags>,
}

impl Transaction {
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }
}
