//! Taproot (BIP 341/342): witness parsing, tagged hashes and output key tweaking

use crate::cursor::{read_u8, read_var_slice, write_var_slice};
use crate::error::{CodecError, Result};
use crate::types::{ByteString, Hash};
use secp256k1::{Scalar, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Taproot output script: OP_1 <32-byte-key>
pub const TAPROOT_SCRIPT_PREFIX: u8 = 0x51;

/// Leaf version of BIP 342 tapscript
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xc0;

/// Control block byte 0 carries the leaf version in these bits, parity in the lowest
pub const TAPROOT_LEAF_MASK: u8 = 0xfe;

/// First byte of a witness annex
pub const TAPROOT_ANNEX_TAG: u8 = 0x50;

pub const TAPROOT_CONTROL_BASE_SIZE: usize = 33;
pub const TAPROOT_CONTROL_NODE_SIZE: usize = 32;
pub const TAPROOT_CONTROL_MAX_NODE_COUNT: usize = 128;

/// BIP 341 "nothing up my sleeve" internal key: H = lift_x(sha256(G)), with no known discrete log
pub const NUMS_INTERNAL_KEY: [u8; 32] = [
    0x50, 0x92, 0x9b, 0x74, 0xc1, 0xa0, 0x49, 0x54, 0xb7, 0x8b, 0x4b, 0x60, 0x35, 0xe9, 0x7a, 0x5e,
    0x07, 0x8a, 0x5a, 0x0f, 0x28, 0xec, 0x96, 0xd5, 0x47, 0xbf, 0xee, 0x9a, 0xce, 0x80, 0x3a, 0xc0,
];

/// BIP 340 tagged hash: SHA256(SHA256(tag) ‖ SHA256(tag) ‖ data)
pub fn tagged_hash(tag: &str, data: &[u8]) -> Hash {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

/// TapLeaf hash: taggedHash("TapLeaf", leaf_version ‖ compactSize(len) ‖ script)
pub fn tap_leaf_hash(script: &[u8], leaf_version: u8) -> Hash {
    let mut data = Vec::with_capacity(script.len() + 4);
    data.push(leaf_version & TAPROOT_LEAF_MASK);
    write_var_slice(&mut data, script);
    tagged_hash("TapLeaf", &data)
}

/// TapBranch hash of two children, sorted lexicographically
pub fn tap_branch_hash(a: &Hash, b: &Hash) -> Hash {
    let (left, right) = if a <= b { (a, b) } else { (b, a) };
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left);
    data[32..].copy_from_slice(right);
    tagged_hash("TapBranch", &data)
}

/// Fold a leaf hash up its merkle path (bottom of the tree first)
pub fn compute_merkle_root(leaf_hash: &Hash, branches: &[Hash]) -> Hash {
    branches
        .iter()
        .fold(*leaf_hash, |current, node| tap_branch_hash(&current, node))
}

/// TapTweak hash: taggedHash("TapTweak", internal_key ‖ merkle_root)
pub fn compute_tap_tweak(internal_key: &[u8; 32], merkle_root: Option<&Hash>) -> Hash {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(internal_key);
    if let Some(root) = merkle_root {
        data.extend_from_slice(root);
    }
    tagged_hash("TapTweak", &data)
}

/// Tweaked output key Q and the parity of its y coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweakedKey {
    pub output_key: [u8; 32],
    pub parity: u8,
}

/// Compute the taproot output key
///
/// Q = lift_x(internal_key) + t·G where t = TapTweak(internal_key ‖ merkle_root).
/// Without a merkle root the tweak commits to the internal key alone.
pub fn compute_taproot_output_key(
    internal_key: &[u8; 32],
    merkle_root: Option<&Hash>,
) -> Result<TweakedKey> {
    let secp = Secp256k1::verification_only();

    let internal = XOnlyPublicKey::from_slice(internal_key)
        .map_err(|_| CodecError::Crypto("internal key is not a valid x-only public key".to_string()))?;

    let tweak = compute_tap_tweak(internal_key, merkle_root);
    let scalar = Scalar::from_be_bytes(tweak)
        .map_err(|_| CodecError::Crypto("tweak exceeds the curve order".to_string()))?;

    let (output, parity) = internal
        .add_tweak(&secp, &scalar)
        .map_err(|_| CodecError::Crypto("failed to compute tweaked public key".to_string()))?;

    Ok(TweakedKey {
        output_key: output.serialize(),
        parity: parity.to_u8(),
    })
}

/// Extract the output key from a P2TR scriptPubKey
pub fn extract_taproot_output_key(script: &[u8]) -> Option<[u8; 32]> {
    if script.len() != 34 || script[0] != TAPROOT_SCRIPT_PREFIX || script[1] != 0x20 {
        return None;
    }
    let mut output_key = [0u8; 32];
    output_key.copy_from_slice(&script[2..34]);
    Some(output_key)
}

pub fn taproot_script_pubkey(output_key: &[u8; 32]) -> ByteString {
    let mut script = Vec::with_capacity(34);
    script.push(TAPROOT_SCRIPT_PREFIX);
    script.push(0x20);
    script.extend_from_slice(output_key);
    script
}

// ============================================================================
// WITNESS PARSING
// ============================================================================

/// A revealed tapscript leaf with the control block data proving its commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPath {
    pub script: ByteString,
    pub leaf_version: u8,
    pub parity: u8,
    pub internal_key: [u8; 32],
    /// Sibling hashes, bottom of the tree first
    pub merkle_branches: Vec<Hash>,
    /// Internal key is the unspendable NUMS point
    pub is_nums: bool,
}

impl ScriptPath {
    /// Parse a control block for `script`
    pub fn from_control_block(script: &[u8], control_block: &[u8]) -> Result<Self> {
        let len = control_block.len();
        if len < TAPROOT_CONTROL_BASE_SIZE
            || (len - TAPROOT_CONTROL_BASE_SIZE) % TAPROOT_CONTROL_NODE_SIZE != 0
        {
            return Err(CodecError::Malformed(format!("invalid control block size {}", len)));
        }
        let node_count = (len - TAPROOT_CONTROL_BASE_SIZE) / TAPROOT_CONTROL_NODE_SIZE;
        if node_count > TAPROOT_CONTROL_MAX_NODE_COUNT {
            return Err(CodecError::Malformed(format!(
                "control block has {} nodes, at most {} allowed",
                node_count, TAPROOT_CONTROL_MAX_NODE_COUNT
            )));
        }

        let mut internal_key = [0u8; 32];
        internal_key.copy_from_slice(&control_block[1..TAPROOT_CONTROL_BASE_SIZE]);
        let merkle_branches = control_block[TAPROOT_CONTROL_BASE_SIZE..]
            .chunks_exact(TAPROOT_CONTROL_NODE_SIZE)
            .map(|chunk| {
                let mut node = [0u8; 32];
                node.copy_from_slice(chunk);
                node
            })
            .collect();

        Ok(ScriptPath {
            script: script.to_vec(),
            leaf_version: control_block[0] & TAPROOT_LEAF_MASK,
            parity: control_block[0] & 1,
            internal_key,
            merkle_branches,
            is_nums: internal_key == NUMS_INTERNAL_KEY,
        })
    }

    pub fn leaf_hash(&self) -> Hash {
        tap_leaf_hash(&self.script, self.leaf_version)
    }

    pub fn merkle_root(&self) -> Hash {
        compute_merkle_root(&self.leaf_hash(), &self.merkle_branches)
    }

    /// Output key this leaf commits to
    pub fn output_key(&self) -> Result<TweakedKey> {
        compute_taproot_output_key(&self.internal_key, Some(&self.merkle_root()))
    }

    /// Serialize the control block: `leaf_version | parity`, internal key, branches
    pub fn control_block(&self) -> ByteString {
        let mut out = Vec::with_capacity(
            TAPROOT_CONTROL_BASE_SIZE + self.merkle_branches.len() * TAPROOT_CONTROL_NODE_SIZE,
        );
        out.push((self.leaf_version & TAPROOT_LEAF_MASK) | (self.parity & 1));
        out.extend_from_slice(&self.internal_key);
        for node in &self.merkle_branches {
            out.extend_from_slice(node);
        }
        out
    }
}

/// A taproot witness split into its parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTaproot {
    pub key_path: bool,
    /// Witness items other than annex, script and control block
    pub stack: Vec<ByteString>,
    pub annex: Option<ByteString>,
    pub control_block: Option<ByteString>,
    pub script_path: Option<ScriptPath>,
}

/// An annex is a last item starting with 0x50 in a witness of at least two items
pub fn has_annex(witness: &[ByteString]) -> bool {
    witness.len() >= 2
        && witness
            .last()
            .and_then(|item| item.first())
            .map_or(false, |b| *b == TAPROOT_ANNEX_TAG)
}

/// Split a taproot witness into key-path or script-path form
///
/// An empty witness is an unsigned key-path placeholder. After removing an
/// annex, one item is a key-path signature; two or more are a script-path
/// spend ending in `script, control_block`.
pub fn parse_taproot(witness: &[ByteString]) -> Result<ParsedTaproot> {
    let mut items = witness.to_vec();
    let annex = if has_annex(witness) { items.pop() } else { None };

    if items.len() <= 1 {
        return Ok(ParsedTaproot {
            key_path: true,
            stack: items,
            annex,
            control_block: None,
            script_path: None,
        });
    }

    // Both pops succeed: at least two items remain
    let control_block = items.pop().unwrap_or_default();
    let script = items.pop().unwrap_or_default();
    let script_path = ScriptPath::from_control_block(&script, &control_block)?;

    Ok(ParsedTaproot {
        key_path: false,
        stack: items,
        annex,
        control_block: Some(control_block),
        script_path: Some(script_path),
    })
}

// ============================================================================
// TAP TREES
// ============================================================================

/// One leaf of a PSBT `TAP_TREE` record, in depth-first order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapTreeLeaf {
    pub depth: u8,
    pub leaf_version: u8,
    pub script: ByteString,
}

/// Parse a `TAP_TREE` value: repeated `depth ‖ leaf_version ‖ compactSize script`
pub fn parse_tap_tree(value: &[u8]) -> Result<Vec<TapTreeLeaf>> {
    let mut leaves = Vec::new();
    let mut offset = 0;
    while offset < value.len() {
        let (depth, next) = read_u8(value, offset)?;
        let (leaf_version, next) = read_u8(value, next)?;
        let (script, next) = read_var_slice(value, next)?;
        if depth as usize > TAPROOT_CONTROL_MAX_NODE_COUNT {
            return Err(CodecError::Malformed(format!("tap tree leaf depth {} too large", depth)));
        }
        leaves.push(TapTreeLeaf { depth, leaf_version, script: script.to_vec() });
        offset = next;
    }
    if leaves.is_empty() {
        return Err(CodecError::Malformed("empty tap tree".to_string()));
    }
    Ok(leaves)
}

/// Rebuild a tap tree from depth-first leaves
///
/// Returns the merkle root and, per leaf, its merkle path (bottom first).
pub fn tap_tree_paths(leaves: &[TapTreeLeaf]) -> Result<(Hash, Vec<Vec<Hash>>)> {
    let mut paths: Vec<Vec<Hash>> = vec![Vec::new(); leaves.len()];
    // (depth, hash, leaf indices under this node)
    let mut stack: Vec<(u8, Hash, Vec<usize>)> = Vec::new();

    for (i, leaf) in leaves.iter().enumerate() {
        let mut node = (leaf.depth, tap_leaf_hash(&leaf.script, leaf.leaf_version), vec![i]);
        while let Some(top) = stack.last() {
            if top.0 != node.0 {
                break;
            }
            let Some(left) = stack.pop() else { break };
            if node.0 == 0 {
                return Err(CodecError::Malformed("tap tree has more than one root".to_string()));
            }
            for &index in &left.2 {
                paths[index].push(node.1);
            }
            for &index in &node.2 {
                paths[index].push(left.1);
            }
            let mut members = left.2;
            members.extend(node.2);
            node = (node.0 - 1, tap_branch_hash(&left.1, &node.1), members);
        }
        stack.push(node);
    }

    match stack.as_slice() {
        [(0, root, _)] => Ok((*root, paths)),
        _ => Err(CodecError::Malformed("tap tree leaves do not form a complete tree".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hex_key: &str) -> [u8; 32] {
        hex::decode(hex_key).unwrap().try_into().unwrap()
    }

    // BIP 341 wallet test vectors
    const KEY_PATH_INTERNAL: &str = "d6889cb081036e0faefa3a35157ad71086b123b2b144b649798b494c300a961d";
    const KEY_PATH_OUTPUT: &str = "53a1f6e454df1aa2776a2814a721372d6258050de330b3c6d10ee8f4e0dda343";
    const SINGLE_LEAF_INTERNAL: &str = "187791b6f712a8ea41c8ecdd0ee77fab3e85263b37e1ec18a3651926b3a6cf27";
    const SINGLE_LEAF_SCRIPT: &str = "20d85a959b0290bf19bb89ed43c916be835475d013da4b362117393e25a48229b8ac";
    const SINGLE_LEAF_HASH: &str = "5b75adecf53548f3ec6ad7d78383bf84cc57b55a3127c72b9a2481752dd88b21";
    const SINGLE_LEAF_OUTPUT: &str = "147c9c57132f6e7ecddba9800bb0c4449251c92a1e60371ee77557b6620f3ea3";

    fn single_leaf_control_block() -> Vec<u8> {
        let mut control = vec![0xc1];
        control.extend_from_slice(&key(SINGLE_LEAF_INTERNAL));
        control
    }

    // ============================================================================
    // HASHES AND TWEAKS
    // ============================================================================

    #[test]
    fn test_key_path_output_key_vector() {
        let tweaked = compute_taproot_output_key(&key(KEY_PATH_INTERNAL), None).unwrap();
        assert_eq!(hex::encode(tweaked.output_key), KEY_PATH_OUTPUT);
        assert_eq!(
            hex::encode(compute_tap_tweak(&key(KEY_PATH_INTERNAL), None)),
            "b86e7be8f39bab32a6f2c0443abbc210f0edac0e2c53d501b36b64437d9c6c70"
        );
    }

    #[test]
    fn test_script_tree_output_key_vector() {
        let script = hex::decode(SINGLE_LEAF_SCRIPT).unwrap();
        let leaf = tap_leaf_hash(&script, TAPROOT_LEAF_TAPSCRIPT);
        assert_eq!(hex::encode(leaf), SINGLE_LEAF_HASH);
        let tweaked = compute_taproot_output_key(&key(SINGLE_LEAF_INTERNAL), Some(&leaf)).unwrap();
        assert_eq!(hex::encode(tweaked.output_key), SINGLE_LEAF_OUTPUT);
        assert_eq!(tweaked.parity, 1);
    }

    #[test]
    fn test_output_key_is_deterministic() {
        let root = [7u8; 32];
        let a = compute_taproot_output_key(&NUMS_INTERNAL_KEY, Some(&root)).unwrap();
        let b = compute_taproot_output_key(&NUMS_INTERNAL_KEY, Some(&root)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_output_key_rejects_invalid_internal_key() {
        // x = 5 is not on the curve
        let mut bad = [0u8; 32];
        bad[31] = 5;
        let err = compute_taproot_output_key(&bad, None).unwrap_err();
        assert!(matches!(err, CodecError::Crypto(_)));
    }

    #[test]
    fn test_branch_hash_is_order_independent() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(tap_branch_hash(&a, &b), tap_branch_hash(&b, &a));
        assert_eq!(compute_merkle_root(&a, &[]), a);
        assert_eq!(compute_merkle_root(&a, &[b]), tap_branch_hash(&a, &b));
    }

    #[test]
    fn test_tagged_hash_differs_by_tag() {
        assert_ne!(tagged_hash("TapLeaf", b"x"), tagged_hash("TapBranch", b"x"));
    }

    // ============================================================================
    // WITNESS PARSING
    // ============================================================================

    #[test]
    fn test_parse_empty_witness() {
        let parsed = parse_taproot(&[]).unwrap();
        assert!(parsed.key_path);
        assert!(parsed.stack.is_empty());
        assert!(parsed.script_path.is_none());
    }

    #[test]
    fn test_parse_key_path() {
        for sig_len in [64, 65] {
            let parsed = parse_taproot(&[vec![0x01; sig_len]]).unwrap();
            assert!(parsed.key_path);
            assert_eq!(parsed.stack.len(), 1);
        }
        // Signature plus annex is still a key-path spend
        let parsed = parse_taproot(&[vec![0x01; 64], vec![0x50, 0x00]]).unwrap();
        assert!(parsed.key_path);
        assert_eq!(parsed.annex, Some(vec![0x50, 0x00]));
    }

    #[test]
    fn test_parse_script_path() {
        let script = hex::decode(SINGLE_LEAF_SCRIPT).unwrap();
        let witness = vec![vec![0x02; 64], script.clone(), single_leaf_control_block()];
        let parsed = parse_taproot(&witness).unwrap();
        assert!(!parsed.key_path);
        assert_eq!(parsed.stack, vec![vec![0x02; 64]]);

        let path = parsed.script_path.unwrap();
        assert_eq!(path.script, script);
        assert_eq!(path.leaf_version, TAPROOT_LEAF_TAPSCRIPT);
        assert_eq!(path.parity, 1);
        assert!(path.merkle_branches.is_empty());
        assert!(!path.is_nums);
        assert_eq!(hex::encode(path.output_key().unwrap().output_key), SINGLE_LEAF_OUTPUT);
        assert_eq!(path.control_block(), single_leaf_control_block());
    }

    #[test]
    fn test_parse_script_path_with_annex_and_branches() {
        let mut control = vec![0xc0];
        control.extend_from_slice(&NUMS_INTERNAL_KEY);
        control.extend_from_slice(&[0xaa; 32]);
        control.extend_from_slice(&[0xbb; 32]);
        let witness = vec![vec![0x51], control.clone(), vec![0x50, 0x01]];
        let parsed = parse_taproot(&witness).unwrap();
        assert!(!parsed.key_path);
        assert!(parsed.stack.is_empty());
        assert_eq!(parsed.annex, Some(vec![0x50, 0x01]));
        let path = parsed.script_path.unwrap();
        assert_eq!(path.merkle_branches.len(), (control.len() - 33) / 32);
        assert_eq!(path.merkle_branches[0], [0xaa; 32]);
        assert!(path.is_nums);
    }

    #[test]
    fn test_parse_malformed_control_block() {
        let err = parse_taproot(&[vec![0x51], vec![0xc0; 40]]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
        assert!(parse_taproot(&[vec![0x51], vec![0xc0; 10]]).is_err());
    }

    #[test]
    fn test_extract_output_key() {
        let output_key = key(KEY_PATH_OUTPUT);
        let script = taproot_script_pubkey(&output_key);
        assert_eq!(extract_taproot_output_key(&script), Some(output_key));
        assert_eq!(extract_taproot_output_key(&script[..33]), None);
    }

    // ============================================================================
    // TAP TREES
    // ============================================================================

    fn encode_tree(leaves: &[TapTreeLeaf]) -> Vec<u8> {
        let mut out = Vec::new();
        for leaf in leaves {
            out.push(leaf.depth);
            out.push(leaf.leaf_version);
            write_var_slice(&mut out, &leaf.script);
        }
        out
    }

    #[test]
    fn test_tap_tree_single_leaf() {
        let leaves = vec![TapTreeLeaf { depth: 0, leaf_version: 0xc0, script: vec![0x51] }];
        let parsed = parse_tap_tree(&encode_tree(&leaves)).unwrap();
        assert_eq!(parsed, leaves);
        let (root, paths) = tap_tree_paths(&parsed).unwrap();
        assert_eq!(root, tap_leaf_hash(&[0x51], 0xc0));
        assert_eq!(paths, vec![Vec::<Hash>::new()]);
    }

    #[test]
    fn test_tap_tree_unbalanced() {
        // ((A, B), C)
        let leaves = vec![
            TapTreeLeaf { depth: 2, leaf_version: 0xc0, script: vec![0x51] },
            TapTreeLeaf { depth: 2, leaf_version: 0xc0, script: vec![0x52] },
            TapTreeLeaf { depth: 1, leaf_version: 0xc0, script: vec![0x53] },
        ];
        let (root, paths) = tap_tree_paths(&leaves).unwrap();
        let a = tap_leaf_hash(&[0x51], 0xc0);
        let b = tap_leaf_hash(&[0x52], 0xc0);
        let c = tap_leaf_hash(&[0x53], 0xc0);
        let ab = tap_branch_hash(&a, &b);
        assert_eq!(root, tap_branch_hash(&ab, &c));
        assert_eq!(paths[0], vec![b, c]);
        assert_eq!(paths[1], vec![a, c]);
        assert_eq!(paths[2], vec![ab]);
        for (leaf, path) in leaves.iter().zip(&paths) {
            assert_eq!(compute_merkle_root(&tap_leaf_hash(&leaf.script, 0xc0), path), root);
        }
    }

    #[test]
    fn test_tap_tree_incomplete() {
        let leaves = vec![TapTreeLeaf { depth: 1, leaf_version: 0xc0, script: vec![0x51] }];
        assert!(tap_tree_paths(&leaves).is_err());
        assert!(parse_tap_tree(&[]).is_err());
        assert!(parse_tap_tree(&[0x01, 0xc0, 0x05]).is_err());
    }
}
