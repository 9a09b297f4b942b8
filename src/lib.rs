//! # tx-inspect
//!
//! Byte-level decoding and classification of Bitcoin and Liquid transactions.
//!
//! This crate provides pure, side-effect-free functions that turn raw
//! transactions, PSBTs, scripts and addresses into explorer-ready records,
//! and classify them against node relay policy.
//!
//! ## Architecture
//!
//! The system follows a layered architecture:
//! - Byte cursor primitives (`cursor`)
//! - Script and address codec (`script`, `template`, `address`)
//! - Transaction, PSBT and taproot codec (`transaction`, `psbt`, `taproot`, `segwit`)
//! - Policy and classification engine (`sigops`, `mempool`, `flags`, `address_info`)
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: no I/O; callers supply prevouts and context
//! 2. **Bit-exact Policy**: standardness follows Bitcoin Core, versioned by activation height
//! 3. **Exact Version Pinning**: hashing and curve dependencies pinned to exact versions
//! 4. **Typed Errors**: every decode failure is a [`CodecError`]
//!
//! ## Usage
//!
//! ```rust
//! use tx_inspect::TxInspector;
//! use tx_inspect::network::Network;
//!
//! let inspector = TxInspector::new(Network::Mainnet);
//! let decoded = inspector
//!     .decode_raw_transaction("010000000002000000000000000001510000000000000000015100000000")
//!     .unwrap();
//! assert_eq!(decoded.tx.outputs.len(), 2);
//! assert!(decoded.psbt.is_none());
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod network;
pub mod cursor;
pub mod script;
pub mod template;
pub mod address;
pub mod address_info;
pub mod taproot;
pub mod segwit;
pub mod transaction;
pub mod psbt;
pub mod sigops;
pub mod mempool;
pub mod flags;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{CodecError, Result};
pub use address::{AddressScript, AddressType, ScriptAddress};
pub use address_info::{AddressSimilarity, AddressTypeInfo};
pub use flags::TransactionFlags;
pub use mempool::PolicySettings;
pub use network::Network;
pub use psbt::Psbt;
pub use taproot::{ParsedTaproot, TweakedKey};
pub use transaction::DecodedTransaction;

/// Network-aware entry point
///
/// # Examples
///
/// ```
/// use tx_inspect::{AddressType, TxInspector};
/// use tx_inspect::network::Network;
///
/// let inspector = TxInspector::new(Network::Mainnet);
///
/// // Address to scriptPubKey and back
/// let script = inspector
///     .address_to_script_pubkey("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4")
///     .unwrap();
/// assert_eq!(script.address_type, AddressType::V0P2wpkh);
/// assert_eq!(
///     hex::encode(&script.script_pubkey),
///     "0014751e76e8199196d454941c45d1b3a323f1433bd6"
/// );
///
/// let address = inspector.script_pubkey_to_address(&script.script_pubkey);
/// assert_eq!(address.address.as_deref(), Some("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TxInspector {
    pub network: Network,
    pub settings: PolicySettings,
}

impl TxInspector {
    /// Create an inspector with default relay policy
    ///
    /// # Examples
    ///
    /// ```
    /// use tx_inspect::TxInspector;
    /// use tx_inspect::network::Network;
    ///
    /// let inspector = TxInspector::new(Network::Testnet4);
    /// assert_eq!(inspector.settings.dust_relay_fee_rate, 3);
    /// ```
    pub fn new(network: Network) -> Self {
        Self::with_settings(network, PolicySettings::default())
    }

    pub fn with_settings(network: Network, settings: PolicySettings) -> Self {
        TxInspector { network, settings }
    }

    /// Decode a hex or base64 raw transaction or PSBT
    ///
    /// PSBTs are filled best-effort from their records, so the result
    /// carries prevouts and a fee whenever the PSBT provides them.
    pub fn decode_raw_transaction(&self, input: &str) -> Result<DecodedTransaction> {
        transaction::decode_raw_transaction(input, self.network)
    }

    pub fn decode_transaction(&self, bytes: &[u8]) -> Result<Transaction> {
        transaction::decode_transaction(bytes, self.network)
    }

    pub fn serialize_transaction(&self, tx: &Transaction, include_witness: bool) -> ByteString {
        transaction::serialize_transaction(tx, include_witness)
    }

    pub fn script_pubkey_to_address(&self, script_pubkey: &[u8]) -> ScriptAddress {
        address::script_pubkey_to_address(script_pubkey, self.network)
    }

    pub fn address_to_script_pubkey(&self, address: &str) -> Result<AddressScript> {
        address::address_to_script_pubkey(address, self.network)
    }

    /// Detect the type of an address from its shape
    ///
    /// # Examples
    ///
    /// ```
    /// use tx_inspect::{AddressType, TxInspector};
    /// use tx_inspect::network::Network;
    ///
    /// let inspector = TxInspector::new(Network::Mainnet);
    /// assert_eq!(inspector.detect_address_type("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"), AddressType::P2pkh);
    /// assert_eq!(inspector.detect_address_type("not an address"), AddressType::Unknown);
    /// ```
    pub fn detect_address_type(&self, address: &str) -> AddressType {
        address::detect_address_type(address, self.network)
    }

    pub fn address_info(&self, address: &str) -> AddressTypeInfo {
        AddressTypeInfo::new(self.network, address, None)
    }

    /// Compare two addresses for visual similarity
    pub fn compare_addresses(&self, a: &str, b: &str) -> AddressSimilarity {
        self.address_info(a).compare_to_string(b)
    }

    /// Add the PSBT tap leaves that commit to `info`'s taproot address
    pub fn fill_tap_tree(&self, info: &mut AddressTypeInfo, psbt: &Psbt) -> Result<usize> {
        let leaves = psbt::extract_tap_leaves(psbt)?;
        info.fill_tap_tree(&leaves)
    }

    pub fn decode_psbt(&self, bytes: &[u8]) -> Result<Psbt> {
        psbt::decode_psbt(bytes, self.network)
    }

    pub fn encode_psbt(&self, psbt: &Psbt) -> ByteString {
        psbt::encode_psbt(psbt)
    }

    pub fn parse_taproot(&self, witness: &[ByteString]) -> Result<ParsedTaproot> {
        taproot::parse_taproot(witness)
    }

    pub fn compute_taproot_output_key(
        &self,
        internal_key: &[u8; 32],
        merkle_root: Option<&Hash>,
    ) -> Result<TweakedKey> {
        taproot::compute_taproot_output_key(internal_key, merkle_root)
    }

    pub fn count_sigops(&self, tx: &Transaction) -> u32 {
        sigops::count_sigops(tx)
    }

    /// Dust threshold of an output at the configured dust relay fee rate
    ///
    /// # Examples
    ///
    /// ```
    /// use tx_inspect::TxInspector;
    /// use tx_inspect::network::Network;
    /// use tx_inspect::types::TransactionOutput;
    ///
    /// let inspector = TxInspector::new(Network::Mainnet);
    /// let script = hex::decode("0014751e76e8199196d454941c45d1b3a323f1433bd6").unwrap();
    /// let output = TransactionOutput::new(0, script, Network::Mainnet);
    /// assert_eq!(inspector.dust_threshold(&output), 294);
    /// ```
    pub fn dust_threshold(&self, output: &TransactionOutput) -> u64 {
        mempool::dust_threshold_with(output, self.settings.dust_relay_fee_rate)
    }

    /// Relay policy check at `height` on this network
    pub fn is_non_standard(&self, tx: &Transaction, height: Option<u32>) -> bool {
        mempool::is_non_standard_with(tx, height, Some(self.network), &self.settings)
    }

    /// Feature flags of a transaction, cached on it after the first call
    pub fn transaction_flags(
        &self,
        tx: &mut Transaction,
        cpfp: Option<&CpfpInfo>,
        replacement: bool,
        height: Option<u32>,
    ) -> TransactionFlags {
        flags::get_transaction_flags(tx, cpfp, replacement, height, Some(self.network))
    }
}

impl Default for TxInspector {
    /// Mainnet with default relay policy
    fn default() -> Self {
        Self::new(Network::Mainnet)
    }
}
