//! Per-address script evidence and address similarity
//!
//! An [`AddressTypeInfo`] starts from an address string and learns more
//! about it from transactions that spend from or pay to it: the redeem or
//! witness script behind a script hash, the revealed leaves of a taproot
//! output, the shape of a bare multisig.

use crate::address::{address_to_script_pubkey, detect_address_type, AddressType};
use crate::constants::ANCHOR_SCRIPT_PUBKEY;
use crate::error::{CodecError, Result};
use crate::network::Network;
use crate::script::{last_push, to_asm};
use crate::taproot::{extract_taproot_output_key, parse_taproot, ScriptPath};
use crate::template::{detect_script_template, MultisigInfo, ScriptTemplate};
use crate::transaction::p2sh_wrapped_type;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Similarity above which two addresses are likely a deliberate lookalike
pub const ADDRESS_SIMILARITY_THRESHOLD: f64 = 10_000_000.0;

/// Where a piece of script evidence was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    ScriptPubKey,
    ScriptSig,
    InnerRedeemScript,
    InnerWitnessScript,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::ScriptPubKey => "scriptpubkey",
            ScriptKind::ScriptSig => "scriptsig",
            ScriptKind::InnerRedeemScript => "inner_redeemscript",
            ScriptKind::InnerWitnessScript => "inner_witnessscript",
        }
    }
}

/// A script observed for an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub kind: ScriptKind,
    pub script: ByteString,
    pub asm: String,
    /// Hex control block, for taproot leaves
    pub script_path: Option<String>,
    pub template: Option<ScriptTemplate>,
}

impl ScriptInfo {
    pub fn new(kind: ScriptKind, script: &[u8], script_path: Option<String>) -> Self {
        ScriptInfo {
            kind,
            script: script.to_vec(),
            asm: to_asm(script),
            script_path,
            template: detect_script_template(script),
        }
    }

    /// Evidence key: one script per kind, or per leaf for taproot
    pub fn key(&self) -> String {
        match &self.script_path {
            Some(path) => format!("{}{}", self.kind.as_str(), path),
            None => self.kind.as_str().to_string(),
        }
    }
}

/// Internal key and merkle root revealed by a taproot script-path spend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaprootCommitment {
    pub internal_key: [u8; 32],
    pub merkle_root: Hash,
}

/// An address with everything learned about it so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressTypeInfo {
    pub network: Network,
    pub address: String,
    pub address_type: AddressType,
    /// Script evidence by key; the first script seen for a key is kept
    pub scripts: BTreeMap<String, ScriptInfo>,
    pub is_multisig: Option<MultisigInfo>,
    pub tapscript: bool,
    pub taproot_commitment: Option<TaprootCommitment>,
}

impl AddressTypeInfo {
    /// Start from an address, detecting its type unless one is given
    pub fn new(network: Network, address: &str, address_type: Option<AddressType>) -> Self {
        AddressTypeInfo {
            network,
            address: address.to_string(),
            address_type: address_type.unwrap_or_else(|| detect_address_type(address, network)),
            scripts: BTreeMap::new(),
            is_multisig: None,
            tapscript: false,
            taproot_commitment: None,
        }
    }

    /// Learn from inputs spending from this address
    ///
    /// Taproot addresses record every revealed leaf. Script-hash addresses
    /// only need one spend: the first input resolves wrapped segwit and the
    /// script behind the hash. Bare multisig records the spent scriptPubKey.
    pub fn process_inputs(&mut self, inputs: &[TransactionInput]) {
        match self.address_type {
            AddressType::V1P2tr => {
                for input in inputs {
                    let Ok(parsed) = parse_taproot(&input.witness) else {
                        continue;
                    };
                    let (Some(path), Some(control_block)) = (parsed.script_path, parsed.control_block)
                    else {
                        continue;
                    };
                    self.tapscript = true;
                    if self.taproot_commitment.is_none() {
                        self.taproot_commitment = Some(TaprootCommitment {
                            internal_key: path.internal_key,
                            merkle_root: path.merkle_root(),
                        });
                    }
                    self.process_script(ScriptInfo::new(
                        ScriptKind::InnerWitnessScript,
                        &path.script,
                        Some(hex::encode(control_block)),
                    ));
                }
            }
            AddressType::P2sh | AddressType::V0P2wsh => {
                let Some(input) = inputs.first() else {
                    return;
                };
                if !self.scripts.is_empty() {
                    return;
                }
                if self.address_type == AddressType::P2sh && !input.witness.is_empty() {
                    if let Some(wrapped) = p2sh_wrapped_type(&input.script_sig) {
                        self.address_type = wrapped;
                    }
                }
                match self.address_type {
                    AddressType::P2shP2wpkh => {}
                    AddressType::V0P2wsh | AddressType::P2shP2wsh => {
                        if let Some(script) = input.witness.last() {
                            self.process_script(ScriptInfo::new(ScriptKind::InnerWitnessScript, script, None));
                        }
                    }
                    _ => match last_push(&input.script_sig).filter(|script| !script.is_empty()) {
                        Some(redeem) => {
                            self.process_script(ScriptInfo::new(ScriptKind::InnerRedeemScript, redeem, None))
                        }
                        None if !input.script_sig.is_empty() => self.process_script(ScriptInfo::new(
                            ScriptKind::ScriptSig,
                            &input.script_sig,
                            None,
                        )),
                        None => {}
                    },
                }
            }
            AddressType::Multisig => {
                if let Some(prevout) = inputs.first().and_then(|input| input.prevout.as_ref()) {
                    self.process_script(ScriptInfo::new(ScriptKind::ScriptPubKey, &prevout.script_pubkey, None));
                }
            }
            AddressType::Unknown => {
                let spends_anchor = inputs.iter().any(|input| {
                    input
                        .prevout
                        .as_ref()
                        .is_some_and(|prevout| prevout.script_pubkey == ANCHOR_SCRIPT_PUBKEY)
                });
                if spends_anchor {
                    self.address_type = AddressType::Anchor;
                }
            }
            _ => {}
        }
    }

    /// Learn from an output paying to this address
    pub fn process_output(&mut self, output: &TransactionOutput) {
        match self.address_type {
            AddressType::Multisig if self.scripts.is_empty() => {
                self.process_script(ScriptInfo::new(ScriptKind::ScriptPubKey, &output.script_pubkey, None));
            }
            AddressType::Unknown if output.script_pubkey == ANCHOR_SCRIPT_PUBKEY => {
                self.address_type = AddressType::Anchor;
            }
            _ => {}
        }
    }

    /// Record script evidence; a key already present is left untouched
    pub fn process_script(&mut self, script: ScriptInfo) {
        let key = script.key();
        if self.scripts.contains_key(&key) {
            return;
        }
        match script.template {
            Some(ScriptTemplate::Multisig { m, n }) | Some(ScriptTemplate::TapscriptMultisig { m, n }) => {
                self.is_multisig = Some(MultisigInfo { m, n });
            }
            _ => {}
        }
        self.scripts.insert(key, script);
    }

    /// Add the candidate leaves that this taproot address commits to
    ///
    /// A leaf matches when its control block reproduces the address output
    /// key, or when its internal key and merkle root match a commitment
    /// already revealed on chain. Returns the number of matching leaves.
    pub fn fill_tap_tree(&mut self, leaves: &[ScriptPath]) -> Result<usize> {
        let output_key = if self.address_type == AddressType::V1P2tr {
            address_to_script_pubkey(&self.address, self.network)
                .ok()
                .and_then(|script| extract_taproot_output_key(&script.script_pubkey))
        } else {
            None
        };

        let mut matched = 0;
        for leaf in leaves {
            let commits = match (&self.taproot_commitment, output_key) {
                (Some(commitment), _)
                    if commitment.internal_key == leaf.internal_key
                        && commitment.merkle_root == leaf.merkle_root() =>
                {
                    true
                }
                (_, Some(output_key)) => leaf
                    .output_key()
                    .map(|tweaked| tweaked.output_key == output_key)
                    .unwrap_or(false),
                _ => false,
            };
            if !commits {
                log::debug!("tap leaf {} does not commit to {}", hex::encode(leaf.leaf_hash()), self.address);
                continue;
            }
            matched += 1;
            self.tapscript = true;
            self.process_script(ScriptInfo::new(
                ScriptKind::InnerWitnessScript,
                &leaf.script,
                Some(hex::encode(leaf.control_block())),
            ));
        }

        if matched == 0 {
            return Err(CodecError::NoMatch("no valid taproot scripts found".to_string()));
        }
        Ok(matched)
    }

    pub fn compare_to(&self, other: &AddressTypeInfo) -> AddressSimilarity {
        compare_address_info(self, other)
    }

    /// Compare with an address string of the same network
    pub fn compare_to_string(&self, address: &str) -> AddressSimilarity {
        compare_address_info(self, &AddressTypeInfo::new(self.network, address, None))
    }
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Outcome of comparing two addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddressSimilarity {
    Identical,
    /// Different types, or a type whose encoding is not compared
    Incomparable,
    Comparable {
        /// Matching characters beyond the guaranteed prefix
        score: i32,
        /// Expected number of random addresses before one matches this well
        similarity: f64,
    },
}

impl AddressSimilarity {
    /// True for a comparable pair above [`ADDRESS_SIMILARITY_THRESHOLD`]
    pub fn is_suspicious(&self) -> bool {
        matches!(self, AddressSimilarity::Comparable { similarity, .. } if *similarity >= ADDRESS_SIMILARITY_THRESHOLD)
    }
}

/// Greedy alignment of two strings from the front
///
/// Matching characters score one each. The first mismatch is skipped over
/// as a single deletion, insertion or substitution; the second ends the match.
/// Returns the score and the index in `a` of the mismatch where the gap was
/// taken, counted in scan order (from the end when `rtl`).
pub fn fuzzy_prefix_match(a: &str, b: &str, rtl: bool) -> (usize, Vec<usize>) {
    let mut a: Vec<char> = a.chars().collect();
    let mut b: Vec<char> = b.chars().collect();
    if rtl {
        a.reverse();
        b.reverse();
    }

    let (mut ai, mut bi) = (0, 0);
    let mut score = 0;
    let mut gaps = Vec::new();
    while ai < a.len() && bi < b.len() {
        if a[ai] == b[bi] {
            ai += 1;
            bi += 1;
            score += 1;
        } else if !gaps.is_empty() {
            break;
        } else {
            gaps.push(ai);
            if b.get(bi + 1) == Some(&a[ai]) {
                // extra character in b
                bi += 1;
            } else if a.get(ai + 1) == Some(&b[bi]) {
                // missing character in b
                ai += 1;
            } else {
                ai += 1;
                bi += 1;
            }
        }
    }
    (score, gaps)
}

fn comparable(address_type: AddressType) -> bool {
    matches!(
        address_type,
        AddressType::P2pkh
            | AddressType::P2sh
            | AddressType::P2shP2wpkh
            | AddressType::P2shP2wsh
            | AddressType::V0P2wpkh
            | AddressType::V0P2wsh
            | AddressType::V1P2tr
    )
}

/// Score how alike two addresses of the same type look
///
/// Characters matched from both ends, less the prefix every address of the
/// type shares, each worth one symbol of the encoding alphabet.
pub fn compare_address_info(a: &AddressTypeInfo, b: &AddressTypeInfo) -> AddressSimilarity {
    if a.address == b.address {
        return AddressSimilarity::Identical;
    }
    if a.address_type != b.address_type || !comparable(a.address_type) {
        return AddressSimilarity::Incomparable;
    }

    let base58 = a.address_type.is_base58();
    let (left, _) = fuzzy_prefix_match(&a.address, &b.address, false);
    let (right, _) = fuzzy_prefix_match(&a.address, &b.address, true);
    let prefix = if base58 { 1 } else { a.network.bech32_prefix().len() };
    let score = (left + right) as i32 - prefix as i32;
    let alphabet: f64 = if base58 { 58.0 } else { 32.0 };

    AddressSimilarity::Comparable { score, similarity: alphabet.powi(score) }
}
