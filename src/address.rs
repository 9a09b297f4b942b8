//! Script↔address codec: base58check, bech32/bech32m and address type detection

use crate::constants::ANCHOR_SCRIPT_PUBKEY;
use crate::error::{CodecError, Result};
use crate::network::Network;
use crate::script::*;
use crate::segwit::witness_program;
use crate::types::ByteString;
use bech32::{segwit, Fe32, Hrp};
use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of a decoded base58check address: version + hash160 + checksum
const BASE58_ADDRESS_SIZE: usize = 25;

/// Scripts longer than this can never be executed
const MAX_SCRIPT_SIZE: usize = 10_000;

/// Classification of an address or scriptPubKey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    /// Liquid explicit fee output
    Fee,
    Empty,
    ProvablyUnspendable,
    OpReturn,
    Multisig,
    P2pk,
    P2pkh,
    P2sh,
    #[serde(rename = "p2sh-p2wpkh")]
    P2shP2wpkh,
    #[serde(rename = "p2sh-p2wsh")]
    P2shP2wsh,
    V0P2wpkh,
    V0P2wsh,
    V1P2tr,
    /// Liquid confidential address
    Confidential,
    Anchor,
    #[default]
    Unknown,
}

impl AddressType {
    pub const ALL: [AddressType; 16] = [
        AddressType::Fee,
        AddressType::Empty,
        AddressType::ProvablyUnspendable,
        AddressType::OpReturn,
        AddressType::Multisig,
        AddressType::P2pk,
        AddressType::P2pkh,
        AddressType::P2sh,
        AddressType::P2shP2wpkh,
        AddressType::P2shP2wsh,
        AddressType::V0P2wpkh,
        AddressType::V0P2wsh,
        AddressType::V1P2tr,
        AddressType::Confidential,
        AddressType::Anchor,
        AddressType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Fee => "fee",
            AddressType::Empty => "empty",
            AddressType::ProvablyUnspendable => "provably_unspendable",
            AddressType::OpReturn => "op_return",
            AddressType::Multisig => "multisig",
            AddressType::P2pk => "p2pk",
            AddressType::P2pkh => "p2pkh",
            AddressType::P2sh => "p2sh",
            AddressType::P2shP2wpkh => "p2sh-p2wpkh",
            AddressType::P2shP2wsh => "p2sh-p2wsh",
            AddressType::V0P2wpkh => "v0_p2wpkh",
            AddressType::V0P2wsh => "v0_p2wsh",
            AddressType::V1P2tr => "v1_p2tr",
            AddressType::Confidential => "confidential",
            AddressType::Anchor => "anchor",
            AddressType::Unknown => "unknown",
        }
    }

    /// Encoded as base58check
    pub fn is_base58(&self) -> bool {
        matches!(
            self,
            AddressType::P2pkh | AddressType::P2sh | AddressType::P2shP2wpkh | AddressType::P2shP2wsh
        )
    }

    /// Encoded as bech32 or bech32m
    pub fn is_bech32(&self) -> bool {
        matches!(
            self,
            AddressType::V0P2wpkh | AddressType::V0P2wsh | AddressType::V1P2tr | AddressType::Anchor
        )
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        AddressType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| CodecError::Unsupported(format!("unknown address type '{}'", s)))
    }
}

/// Address derived from a scriptPubKey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAddress {
    pub address: Option<String>,
    pub address_type: AddressType,
}

/// scriptPubKey derived from an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressScript {
    pub script_pubkey: ByteString,
    pub address_type: AddressType,
}

// ============================================================================
// BASE58CHECK
// ============================================================================

fn checksum(data: &[u8]) -> [u8; 4] {
    let hash = sha256d::Hash::hash(data).into_inner();
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode `version ‖ payload ‖ checksum` in base58
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 5);
    data.push(version);
    data.extend_from_slice(payload);
    let check = checksum(&data);
    data.extend_from_slice(&check);
    bs58::encode(data).into_string()
}

/// Decode a 25-byte base58check address into its version byte and 20-byte hash
pub fn base58check_decode(address: &str) -> Result<(u8, [u8; 20])> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| CodecError::InvalidAddress(format!("invalid base58: {}", e)))?;
    if data.len() != BASE58_ADDRESS_SIZE {
        return Err(CodecError::InvalidAddress(format!(
            "decoded base58 address has {} bytes, expected {}",
            data.len(),
            BASE58_ADDRESS_SIZE
        )));
    }
    let (body, check) = data.split_at(BASE58_ADDRESS_SIZE - 4);
    if checksum(body) != check {
        return Err(CodecError::InvalidAddress("base58 checksum mismatch".to_string()));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&body[1..]);
    Ok((body[0], hash))
}

fn is_base58_char(c: char) -> bool {
    c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l')
}

// ============================================================================
// BECH32 / BECH32M
// ============================================================================

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn is_bech32_char(c: char) -> bool {
    BECH32_CHARSET.contains(c)
}

fn hrp_for(network: Network) -> Result<Hrp> {
    Hrp::parse(network.params().bech32_hrp)
        .map_err(|e| CodecError::InvalidAddress(format!("invalid human-readable part: {}", e)))
}

/// Encode a witness program as a segwit address (bech32 for v0, bech32m otherwise)
pub fn encode_segwit_address(version: u8, program: &[u8], network: Network) -> Result<String> {
    let version = Fe32::try_from(version)
        .map_err(|_| CodecError::InvalidAddress(format!("invalid witness version {}", version)))?;
    segwit::encode(hrp_for(network)?, version, program)
        .map_err(|e| CodecError::InvalidAddress(format!("cannot encode witness program: {}", e)))
}

/// Decode a segwit address for `network` into its witness version and program
pub fn decode_segwit_address(address: &str, network: Network) -> Result<(u8, Vec<u8>)> {
    let (hrp, version, program) = segwit::decode(address)
        .map_err(|e| CodecError::InvalidAddress(format!("invalid segwit address: {}", e)))?;
    let expected = network.params().bech32_hrp;
    if hrp.to_lowercase() != expected {
        return Err(CodecError::InvalidAddress(format!(
            "address prefix '{}' does not belong to {} (expected '{}')",
            hrp.to_lowercase(),
            network,
            expected
        )));
    }
    Ok((version.to_u8(), program))
}

/// scriptPubKey of a witness program: `OP_n <program>`
pub fn witness_script_pubkey(version: u8, program: &[u8]) -> ByteString {
    let mut script = Vec::with_capacity(program.len() + 2);
    script.push(if version == 0 { OP_0 } else { OP_1 + version - 1 });
    script.push(program.len() as u8);
    script.extend_from_slice(program);
    script
}

/// Fixed pay-to-anchor address of a network
pub fn anchor_address(network: Network) -> Result<String> {
    encode_segwit_address(1, &ANCHOR_SCRIPT_PUBKEY[2..], network)
}

// ============================================================================
// SCRIPT CLASSIFICATION
// ============================================================================

/// Classify a raw scriptPubKey
pub fn script_pubkey_type(script: &[u8]) -> AddressType {
    let len = script.len();
    match script {
        [] => AddressType::Empty,
        [OP_RETURN, ..] => AddressType::OpReturn,
        [OP_PUSHBYTES_33, .., OP_CHECKSIG] if len == 35 => AddressType::P2pk,
        [OP_PUSHBYTES_65, .., OP_CHECKSIG] if len == 67 => AddressType::P2pk,
        [OP_DUP, OP_HASH160, OP_PUSHBYTES_20, .., OP_EQUALVERIFY, OP_CHECKSIG] if len == 25 => {
            AddressType::P2pkh
        }
        [OP_HASH160, OP_PUSHBYTES_20, .., OP_EQUAL] if len == 23 => AddressType::P2sh,
        [OP_0, OP_PUSHBYTES_20, ..] if len == 22 => AddressType::V0P2wpkh,
        [OP_0, OP_PUSHBYTES_32, ..] if len == 34 => AddressType::V0P2wsh,
        [OP_1, OP_PUSHBYTES_32, ..] if len == 34 => AddressType::V1P2tr,
        _ if script == ANCHOR_SCRIPT_PUBKEY => AddressType::Anchor,
        _ if len > MAX_SCRIPT_SIZE => AddressType::ProvablyUnspendable,
        [.., OP_CHECKMULTISIG] => AddressType::Multisig,
        _ => AddressType::Unknown,
    }
}

/// Classify a scriptPubKey in the context of a network (Liquid fee outputs have an empty script)
pub fn output_script_type(script: &[u8], network: Network) -> AddressType {
    match script_pubkey_type(script) {
        AddressType::Empty if network.is_liquid() => AddressType::Fee,
        other => other,
    }
}

fn witness_address(script: &[u8], network: Network) -> Option<String> {
    let (version, program) = witness_program(script)?;
    encode_segwit_address(version, program, network).ok()
}

/// Derive the address of a scriptPubKey
///
/// P2PK scripts map to the hex public key. Scripts without an address form
/// (OP_RETURN, bare multisig, non-standard) return `None`.
pub fn script_pubkey_to_address(script: &[u8], network: Network) -> ScriptAddress {
    let params = network.params();
    let address_type = output_script_type(script, network);
    let address = match address_type {
        AddressType::P2pkh => Some(base58check_encode(params.pubkey_hash_version, &script[3..23])),
        AddressType::P2sh => Some(base58check_encode(params.script_hash_version, &script[2..22])),
        AddressType::V0P2wpkh
        | AddressType::V0P2wsh
        | AddressType::V1P2tr
        | AddressType::Anchor
        | AddressType::Unknown => witness_address(script, network),
        AddressType::P2pk => Some(hex::encode(&script[1..script.len() - 1])),
        AddressType::Fee
        | AddressType::Empty
        | AddressType::ProvablyUnspendable
        | AddressType::OpReturn
        | AddressType::Multisig
        | AddressType::P2shP2wpkh
        | AddressType::P2shP2wsh
        | AddressType::Confidential => None,
    };
    ScriptAddress { address, address_type }
}

fn is_hex_pubkey(s: &str) -> bool {
    let shape = (s.len() == 66 && (s.starts_with("02") || s.starts_with("03")))
        || (s.len() == 130 && s.starts_with("04"));
    shape && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Derive the scriptPubKey paying to `address` on `network`
pub fn address_to_script_pubkey(address: &str, network: Network) -> Result<AddressScript> {
    let address = address.trim();
    let params = network.params();

    if is_hex_pubkey(address) {
        let key = hex::decode(address)
            .map_err(|e| CodecError::InvalidAddress(format!("invalid public key hex: {}", e)))?;
        let mut script_pubkey = push_script(&key);
        script_pubkey.push(OP_CHECKSIG);
        return Ok(AddressScript { script_pubkey, address_type: AddressType::P2pk });
    }

    if detect_address_type(address, network) == AddressType::Confidential {
        return Err(CodecError::Unsupported(
            "confidential addresses carry a blinding key and have no plain scriptPubKey".to_string(),
        ));
    }

    let lower = address.to_ascii_lowercase();
    if lower.starts_with(&network.bech32_prefix()) {
        let (version, program) = decode_segwit_address(address, network)?;
        let script_pubkey = witness_script_pubkey(version, &program);
        let address_type = script_pubkey_type(&script_pubkey);
        return Ok(AddressScript { script_pubkey, address_type });
    }
    if let Ok((hrp, _, _)) = segwit::decode(address) {
        return Err(CodecError::InvalidAddress(format!(
            "address prefix '{}' does not belong to {}",
            hrp.to_lowercase(),
            network
        )));
    }

    let (version, hash) = base58check_decode(address)?;
    let script_pubkey = if version == params.pubkey_hash_version {
        let mut script = vec![OP_DUP, OP_HASH160, OP_PUSHBYTES_20];
        script.extend_from_slice(&hash);
        script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        script
    } else if version == params.script_hash_version {
        let mut script = vec![OP_HASH160, OP_PUSHBYTES_20];
        script.extend_from_slice(&hash);
        script.push(OP_EQUAL);
        script
    } else {
        return Err(CodecError::InvalidAddress(format!(
            "version byte 0x{:02x} is not used on {}",
            version, network
        )));
    };
    let address_type = script_pubkey_type(&script_pubkey);
    Ok(AddressScript { script_pubkey, address_type })
}

// ============================================================================
// ADDRESS TYPE DETECTION
// ============================================================================

/// Detect the type of an address string from its shape alone (no checksum verification)
///
/// First match wins; anything unrecognized is [`AddressType::Unknown`].
pub fn detect_address_type(address: &str, network: Network) -> AddressType {
    let address = address.trim();
    let params = network.params();
    let mut chars = address.chars();
    let Some(first) = chars.next() else {
        return AddressType::Unknown;
    };

    // Liquid confidential: base58 'V' + [TJ] + 78 chars, or a blech32 prefix
    if let Some(prefix) = params.confidential_prefix {
        let rest: Vec<char> = chars.clone().collect();
        if first == prefix
            && rest.len() == 79
            && matches!(rest[0], 'T' | 'J')
            && rest.iter().all(|c| is_base58_char(*c))
        {
            return AddressType::Confidential;
        }
    }
    if let Some(hrp) = params.confidential_hrp {
        let lower = address.to_ascii_lowercase();
        if let Some(data) = lower.strip_prefix(&format!("{}1", hrp)) {
            if !data.is_empty() && data.chars().all(is_bech32_char) {
                return AddressType::Confidential;
            }
        }
    }

    let base58_body = (25..=34).contains(&chars.clone().count()) && chars.clone().all(is_base58_char);
    if base58_body && params.pubkey_hash_prefixes.contains(&first) {
        return AddressType::P2pkh;
    }
    if base58_body && params.script_hash_prefixes.contains(&first) {
        return AddressType::P2sh;
    }

    // Mixed case is invalid bech32; all-uppercase is allowed
    let lower = if address.chars().any(|c| c.is_ascii_lowercase()) {
        address.to_string()
    } else {
        address.to_ascii_lowercase()
    };
    if let Some(data) = lower.strip_prefix(&network.bech32_prefix()) {
        if anchor_address(network).map(|a| a == lower).unwrap_or(false) {
            return AddressType::Anchor;
        }
        if data.chars().all(is_bech32_char) {
            match (data.chars().next(), data.len()) {
                (Some('q'), 39) => return AddressType::V0P2wpkh,
                (Some('q'), 59) => return AddressType::V0P2wsh,
                (Some('p'), 59) => return AddressType::V1P2tr,
                _ => {}
            }
        }
    }

    if is_hex_pubkey(address) {
        return AddressType::P2pk;
    }
    AddressType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    const P2PKH_SCRIPT: &str = "76a91477bff20c60e522dfaa3350c39b030a5d004e839a88ac";
    const P2SH_SCRIPT: &str = "a914b472a266d0bd89c13706a4132ccfb16f7c3b9fcb87";
    const P2WPKH_SCRIPT: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";
    const P2TR_SCRIPT: &str = "512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn script(hex_script: &str) -> Vec<u8> {
        hex::decode(hex_script).unwrap()
    }

    // ============================================================================
    // BASE58
    // ============================================================================

    #[test]
    fn test_p2pkh_address_per_network() {
        let spk = script(P2PKH_SCRIPT);
        let cases = [
            (Network::Mainnet, "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"),
            (Network::Testnet, "mrS8eVKXguwufwvsVe9GtgGb7fif9UQeAu"),
            (Network::Liquid, "Q8BZUdDyMAvbWYQCAzA4hua78RoipnuBeE"),
            (Network::LiquidTestnet, "Fg5toLxvSPCCLSUNfBANXGrauqPuqtR46X"),
        ];
        for (network, address) in cases {
            let derived = script_pubkey_to_address(&spk, network);
            assert_eq!(derived.address.as_deref(), Some(address));
            assert_eq!(derived.address_type, AddressType::P2pkh);
            let back = address_to_script_pubkey(address, network).unwrap();
            assert_eq!(back.script_pubkey, spk);
            assert_eq!(detect_address_type(address, network), AddressType::P2pkh);
        }
    }

    #[test]
    fn test_p2sh_address_per_network() {
        let spk = script(P2SH_SCRIPT);
        let cases = [
            (Network::Mainnet, "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"),
            (Network::Signet, "2N9hLwkSqr1cPQAPxbrGVUjxyjD11G2e1he"),
            (Network::Liquid, "GydeMhecNgrq17WMkyyTM4ETv1YubMVtLN"),
            (Network::LiquidTestnet, "8vsafXgrB5bJeSidGbK5eYnjKvQ3RiB4BB"),
        ];
        for (network, address) in cases {
            assert_eq!(script_pubkey_to_address(&spk, network).address.as_deref(), Some(address));
            assert_eq!(address_to_script_pubkey(address, network).unwrap().script_pubkey, spk);
            assert_eq!(detect_address_type(address, network), AddressType::P2sh);
        }
    }

    #[test]
    fn test_base58_rejects_bad_checksum() {
        // Last character changed
        let err = address_to_script_pubkey("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN3", Network::Mainnet).unwrap_err();
        assert!(matches!(err, CodecError::InvalidAddress(_)));
    }

    #[test]
    fn test_base58_rejects_wrong_network() {
        let err = address_to_script_pubkey("mrS8eVKXguwufwvsVe9GtgGb7fif9UQeAu", Network::Mainnet).unwrap_err();
        assert!(matches!(err, CodecError::InvalidAddress(_)));
    }

    #[test]
    fn test_base58_rejects_wrong_length() {
        let short = base58check_encode(0x00, &[0u8; 19]);
        assert!(base58check_decode(&short).is_err());
    }

    // ============================================================================
    // BECH32
    // ============================================================================

    #[test]
    fn test_segwit_v0_round_trip() {
        let spk = script(P2WPKH_SCRIPT);
        let address = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
        assert_eq!(script_pubkey_to_address(&spk, Network::Mainnet).address.as_deref(), Some(address));
        let back = address_to_script_pubkey(address, Network::Mainnet).unwrap();
        assert_eq!(back.script_pubkey, spk);
        assert_eq!(back.address_type, AddressType::V0P2wpkh);
        assert_eq!(
            script_pubkey_to_address(&spk, Network::Testnet).address.as_deref(),
            Some("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx")
        );
    }

    #[test]
    fn test_segwit_uppercase_address() {
        let back = address_to_script_pubkey("BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4", Network::Mainnet).unwrap();
        assert_eq!(back.script_pubkey, script(P2WPKH_SCRIPT));
        assert_eq!(
            detect_address_type("BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4", Network::Mainnet),
            AddressType::V0P2wpkh
        );
    }

    #[test]
    fn test_taproot_round_trip() {
        let spk = script(P2TR_SCRIPT);
        let address = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";
        assert_eq!(script_pubkey_to_address(&spk, Network::Mainnet).address.as_deref(), Some(address));
        assert_eq!(address_to_script_pubkey(address, Network::Mainnet).unwrap().script_pubkey, spk);
        assert_eq!(detect_address_type(address, Network::Mainnet), AddressType::V1P2tr);
    }

    #[test]
    fn test_p2wsh_detection() {
        let address = "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3";
        assert_eq!(detect_address_type(address, Network::Mainnet), AddressType::V0P2wsh);
        let back = address_to_script_pubkey(address, Network::Mainnet).unwrap();
        assert_eq!(back.address_type, AddressType::V0P2wsh);
        assert_eq!(back.script_pubkey.len(), 34);
    }

    #[test]
    fn test_bech32_rejects_bad_checksum() {
        let err = address_to_script_pubkey("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5", Network::Mainnet).unwrap_err();
        assert!(matches!(err, CodecError::InvalidAddress(_)));
    }

    #[test]
    fn test_bech32_rejects_wrong_network() {
        let err = address_to_script_pubkey("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Network::Mainnet).unwrap_err();
        assert!(matches!(err, CodecError::InvalidAddress(_)));
        assert!(decode_segwit_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Network::Testnet).is_err());
    }

    #[test]
    fn test_anchor_addresses() {
        assert_eq!(anchor_address(Network::Mainnet).unwrap(), "bc1pfeessrawgf");
        assert_eq!(anchor_address(Network::Testnet4).unwrap(), "tb1pfees9rn5nz");
        assert_eq!(anchor_address(Network::Liquid).unwrap(), "ex1pfeesuuklaq");
        assert_eq!(anchor_address(Network::LiquidTestnet).unwrap(), "tex1pfeesnm2z0n");

        let derived = script_pubkey_to_address(&ANCHOR_SCRIPT_PUBKEY, Network::Mainnet);
        assert_eq!(derived.address.as_deref(), Some("bc1pfeessrawgf"));
        assert_eq!(derived.address_type, AddressType::Anchor);
        assert_eq!(detect_address_type("bc1pfeessrawgf", Network::Mainnet), AddressType::Anchor);
        let back = address_to_script_pubkey("bc1pfeessrawgf", Network::Mainnet).unwrap();
        assert_eq!(back.script_pubkey, ANCHOR_SCRIPT_PUBKEY.to_vec());
        assert_eq!(back.address_type, AddressType::Anchor);
    }

    #[test]
    fn test_unknown_witness_version_address() {
        let spk = script("5202751e");
        let derived = script_pubkey_to_address(&spk, Network::Mainnet);
        assert_eq!(derived.address_type, AddressType::Unknown);
        assert_eq!(derived.address.as_deref(), Some("bc1zw50qjl4auq"));
        assert_eq!(address_to_script_pubkey("bc1zw50qjl4auq", Network::Mainnet).unwrap().script_pubkey, spk);
    }

    // ============================================================================
    // CLASSIFICATION
    // ============================================================================

    #[test]
    fn test_script_pubkey_type() {
        assert_eq!(script_pubkey_type(&[]), AddressType::Empty);
        assert_eq!(script_pubkey_type(&[OP_RETURN, 0x01, 0x00]), AddressType::OpReturn);
        assert_eq!(script_pubkey_type(&script(P2PKH_SCRIPT)), AddressType::P2pkh);
        assert_eq!(script_pubkey_type(&script(P2SH_SCRIPT)), AddressType::P2sh);
        assert_eq!(script_pubkey_type(&script(P2WPKH_SCRIPT)), AddressType::V0P2wpkh);
        assert_eq!(script_pubkey_type(&script(P2TR_SCRIPT)), AddressType::V1P2tr);
        assert_eq!(script_pubkey_type(&ANCHOR_SCRIPT_PUBKEY), AddressType::Anchor);
        assert_eq!(script_pubkey_type(&[0x51, 0x52, OP_CHECKMULTISIG]), AddressType::Multisig);
        assert_eq!(script_pubkey_type(&[0x51]), AddressType::Unknown);
        assert_eq!(script_pubkey_type(&vec![0x61; 10_001]), AddressType::ProvablyUnspendable);
    }

    #[test]
    fn test_liquid_fee_output() {
        assert_eq!(output_script_type(&[], Network::Liquid), AddressType::Fee);
        assert_eq!(output_script_type(&[], Network::Mainnet), AddressType::Empty);
    }

    #[test]
    fn test_p2pk_round_trip() {
        let key = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let back = address_to_script_pubkey(key, Network::Mainnet).unwrap();
        assert_eq!(back.address_type, AddressType::P2pk);
        assert_eq!(back.script_pubkey.len(), 35);
        let derived = script_pubkey_to_address(&back.script_pubkey, Network::Mainnet);
        assert_eq!(derived.address.as_deref(), Some(key));
        assert_eq!(detect_address_type(key, Network::Mainnet), AddressType::P2pk);
    }

    #[test]
    fn test_detect_confidential() {
        let confidential = format!("VJ{}", "L".repeat(78));
        assert_eq!(detect_address_type(&confidential, Network::Liquid), AddressType::Confidential);
        assert_eq!(detect_address_type("lq1qqf8er278e6nyvuwtgf39e6ewvdcnjupn9a86rzpx655y5lhkt0walu3djf9cklkxd3ryld97hu8h3xepw7sh2rlu7q45dcew5", Network::Liquid), AddressType::Confidential);
        assert!(matches!(
            address_to_script_pubkey(&confidential, Network::Liquid),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_address_type("", Network::Mainnet), AddressType::Unknown);
        assert_eq!(detect_address_type("hello", Network::Mainnet), AddressType::Unknown);
        // Testnet address on mainnet
        assert_eq!(
            detect_address_type("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Network::Mainnet),
            AddressType::Unknown
        );
    }

    #[test]
    fn test_address_type_names() {
        for address_type in AddressType::ALL {
            assert_eq!(address_type.as_str().parse::<AddressType>().unwrap(), address_type);
            let json = serde_json::to_string(&address_type).unwrap();
            assert_eq!(json, format!("\"{}\"", address_type.as_str()));
        }
    }
}
