//! Bitcoin relay policy constants and per-network activation tables

use crate::network::Network;

/// Maximum weight of a standard transaction
pub const MAX_STANDARD_TX_WEIGHT: u64 = 400_000;

/// Maximum sigops cost of a block
pub const MAX_BLOCK_SIGOPS_COST: u32 = 80_000;

/// Maximum sigops cost of a standard transaction: one fifth of a block
pub const MAX_STANDARD_TX_SIGOPS_COST: u32 = MAX_BLOCK_SIGOPS_COST / 5;

/// Minimum non-witness size of a standard transaction
pub const MIN_STANDARD_TX_NONWITNESS_SIZE: u64 = 65;

/// Maximum sigops in a standard P2SH redeem script
pub const MAX_P2SH_SIGOPS: u32 = 15;

/// Maximum number of witness stack items (excluding the script) in a standard P2WSH spend
pub const MAX_STANDARD_P2WSH_STACK_ITEMS: usize = 100;

/// Maximum size of a witness stack item in a standard P2WSH spend
pub const MAX_STANDARD_P2WSH_STACK_ITEM_SIZE: usize = 80;

/// Maximum size of a witness stack item in a standard tapscript spend
pub const MAX_STANDARD_TAPSCRIPT_STACK_ITEM_SIZE: usize = 80;

/// Maximum size of a standard P2WSH witness script
pub const MAX_STANDARD_P2WSH_SCRIPT_SIZE: usize = 3600;

/// Maximum size of a standard scriptSig
pub const MAX_STANDARD_SCRIPTSIG_SIZE: usize = 1650;

/// Dust relay fee rate in sat/vB
pub const DUST_RELAY_TX_FEE: u64 = 3;

/// Maximum size of a standard OP_RETURN output script before the datacarrier lift
pub const MAX_OP_RETURN_RELAY: usize = 83;

/// Maximum total OP_RETURN script bytes per transaction after the datacarrier lift
pub const MAX_DATACARRIER_BYTES: usize = 100_000;

/// Maximum legacy sigops per transaction (BIP54)
pub const MAX_TX_LEGACY_SIGOPS: u32 = 2500;

/// Sigops attributed to an OP_CHECKMULTISIG without a preceding key count
pub const MAX_PUBKEYS_PER_MULTISIG: u32 = 20;

/// Witness data discount
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Maximum size of a pushed script element (and so of a P2SH redeem script)
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum size of a DER signature with its sighash byte
pub const MAX_ECDSA_SIGNATURE_SIZE: usize = 74;

/// Spend-cost estimate for dust: input bytes of a witness program spend
pub const DUST_WITNESS_SPEND_SIZE: u64 = 67;

/// Spend-cost estimate for dust: input bytes of a non-witness spend
pub const DUST_NON_WITNESS_SPEND_SIZE: u64 = 148;

/// Highest standard transaction version before V3 relay rules
pub const MAX_STANDARD_VERSION_PRE_V3: i32 = 2;

/// Highest standard transaction version
pub const MAX_STANDARD_VERSION: i32 = 3;

/// Sequence number for final transaction
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Sequences below this value signal replaceability
pub const SEQUENCE_RBF_THRESHOLD: u32 = 0xfffffffe;

/// Pay-to-anchor scriptPubKey: OP_1 <0x4e73>
pub const ANCHOR_SCRIPT_PUBKEY: [u8; 4] = [0x51, 0x02, 0x4e, 0x73];

/// V3 transactions and anchor spends become standard after these heights
pub const V3_STANDARDNESS_ACTIVATION: &[(Network, u32)] = &[
    (Network::Testnet4, 42_000),
    (Network::Testnet, 2_900_000),
    (Network::Signet, 211_000),
    (Network::Mainnet, 863_500),
];

/// Zero-fee transactions may carry one dust output after these heights
pub const EPHEMERAL_DUST_ACTIVATION: &[(Network, u32)] = &[
    (Network::Testnet4, 90_500),
    (Network::Testnet, 4_550_000),
    (Network::Signet, 260_000),
    (Network::Mainnet, 905_000),
];

/// OP_RETURN size/count limits lift and BIP54 legacy sigops apply after these heights
pub const DATACARRIER_LIFT_ACTIVATION: &[(Network, u32)] = &[
    (Network::Testnet4, 108_000),
    (Network::Testnet, 4_750_000),
    (Network::Signet, 276_500),
    (Network::Mainnet, 921_000),
];

// ============================================================================
// PSBT KEY TYPES (BIP 174, BIP 371)
// ============================================================================

pub const PSBT_GLOBAL_UNSIGNED_TX: u64 = 0x00;

pub const PSBT_IN_NON_WITNESS_UTXO: u64 = 0x00;
pub const PSBT_IN_WITNESS_UTXO: u64 = 0x01;
pub const PSBT_IN_PARTIAL_SIG: u64 = 0x02;
pub const PSBT_IN_SIGHASH_TYPE: u64 = 0x03;
pub const PSBT_IN_REDEEM_SCRIPT: u64 = 0x04;
pub const PSBT_IN_WITNESS_SCRIPT: u64 = 0x05;
pub const PSBT_IN_BIP32_DERIVATION: u64 = 0x06;
pub const PSBT_IN_FINAL_SCRIPTSIG: u64 = 0x07;
pub const PSBT_IN_FINAL_SCRIPTWITNESS: u64 = 0x08;
pub const PSBT_IN_TAP_KEY_SIG: u64 = 0x13;
pub const PSBT_IN_TAP_SCRIPT_SIG: u64 = 0x14;
pub const PSBT_IN_TAP_LEAF_SCRIPT: u64 = 0x15;
pub const PSBT_IN_TAP_BIP32_DERIVATION: u64 = 0x16;
pub const PSBT_IN_TAP_INTERNAL_KEY: u64 = 0x17;

pub const PSBT_OUT_REDEEM_SCRIPT: u64 = 0x00;
pub const PSBT_OUT_WITNESS_SCRIPT: u64 = 0x01;
pub const PSBT_OUT_BIP32_DERIVATION: u64 = 0x02;
pub const PSBT_OUT_TAP_INTERNAL_KEY: u64 = 0x05;
pub const PSBT_OUT_TAP_TREE: u64 = 0x06;
