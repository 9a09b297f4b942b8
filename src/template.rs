//! Script templates: bare multisig, tapscript multisig and public key checks

use crate::constants::ANCHOR_SCRIPT_PUBKEY;
use crate::script::*;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// Signature threshold of a multisig script: `m` of `n` keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigInfo {
    pub m: u32,
    pub n: u32,
}

/// Recognized script shapes recorded alongside script evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptTemplate {
    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`
    Multisig { m: u32, n: u32 },
    /// `<pk> OP_CHECKSIG (<pk> OP_CHECKSIGADD)... <m> OP_NUMEQUAL`
    TapscriptMultisig { m: u32, n: u32 },
    /// `(<pk> OP_CHECKSIGVERIFY)... <pk> OP_CHECKSIG` with at least two keys
    TapscriptUnanimous { n: u32 },
    /// Pay-to-anchor
    Anchor,
}

/// Check that `bytes` is a valid SEC1-encoded secp256k1 point (compressed or uncompressed)
pub fn is_point(bytes: &[u8]) -> bool {
    match (bytes.len(), bytes.first().copied()) {
        (33, Some(0x02 | 0x03)) | (65, Some(0x04)) => PublicKey::from_slice(bytes).is_ok(),
        _ => false,
    }
}

/// Hex variant of [`is_point`]
pub fn is_point_hex(pubkey: &str) -> bool {
    hex::decode(pubkey).map(|bytes| is_point(&bytes)).unwrap_or(false)
}

/// Parse a bare multisig script
///
/// The script must be exactly `OP_m`, `n` pushes of 33- or 65-byte keys,
/// `OP_n`, `OP_CHECKMULTISIG`. Key validity and `m <= n` are left to the caller.
pub fn parse_multisig_script(script: &[u8]) -> Option<MultisigInfo> {
    let ops = parse_script(script).ok()?;
    if ops.len() < 4 || ops[ops.len() - 1] != Instruction::Op(OP_CHECKMULTISIG) {
        return None;
    }
    let n = ops[ops.len() - 2].small_int()?;
    let m = ops[0].small_int()?;
    let keys = &ops[1..ops.len() - 2];
    if keys.len() != n as usize {
        return None;
    }
    let all_keys = keys.iter().all(|op| {
        matches!(
            op,
            Instruction::Push { opcode: OP_PUSHBYTES_33, data } if data.len() == 33
        ) || matches!(
            op,
            Instruction::Push { opcode: OP_PUSHBYTES_65, data } if data.len() == 65
        )
    });
    all_keys.then_some(MultisigInfo { m, n })
}

fn is_xonly_push(op: &Instruction<'_>) -> bool {
    matches!(op, Instruction::Push { opcode: OP_PUSHBYTES_32, .. })
}

/// Decode a small positive script number: `OP_1`..`OP_16` or a minimal 1-2 byte push
fn script_number(op: &Instruction<'_>) -> Option<u32> {
    if let Some(n) = op.small_int() {
        return Some(n);
    }
    let data = op.push_data()?;
    match data {
        [b] if *b < 0x80 => Some(*b as u32),
        [lo, hi] if *hi < 0x80 && (*hi != 0 || *lo >= 0x80) => Some(u16::from_le_bytes([*lo, *hi]) as u32),
        _ => None,
    }
}

/// Parse a `OP_CHECKSIGADD` tapscript multisig
///
/// `<pk> OP_CHECKSIG (<pk> OP_CHECKSIGADD)* <m> OP_NUMEQUAL[VERIFY]`
pub fn parse_tapscript_multisig(script: &[u8]) -> Option<MultisigInfo> {
    let ops = parse_script(script).ok()?;
    if ops.len() < 4 || ops.len() % 2 != 0 {
        return None;
    }
    let last = ops[ops.len() - 1];
    if last != Instruction::Op(OP_NUMEQUAL) && last != Instruction::Op(OP_NUMEQUALVERIFY) {
        return None;
    }
    let m = script_number(&ops[ops.len() - 2])?;
    let pairs = &ops[..ops.len() - 2];
    for (i, pair) in pairs.chunks(2).enumerate() {
        let expected = if i == 0 { OP_CHECKSIG } else { OP_CHECKSIGADD };
        if !is_xonly_push(&pair[0]) || pair[1] != Instruction::Op(expected) {
            return None;
        }
    }
    let n = (pairs.len() / 2) as u32;
    (m >= 1 && m <= n).then_some(MultisigInfo { m, n })
}

/// Parse an n-of-n tapscript built from `OP_CHECKSIGVERIFY`s, returning `n`
///
/// `(<pk> OP_CHECKSIGVERIFY)* <pk> OP_CHECKSIG`. A single `<pk> OP_CHECKSIG`
/// yields 1.
pub fn parse_tapscript_unanimous_multisig(script: &[u8]) -> Option<u32> {
    let ops = parse_script(script).ok()?;
    if ops.len() < 2 || ops.len() % 2 != 0 {
        return None;
    }
    let count = ops.len() / 2;
    for (i, pair) in ops.chunks(2).enumerate() {
        let expected = if i + 1 == count { OP_CHECKSIG } else { OP_CHECKSIGVERIFY };
        if !is_xonly_push(&pair[0]) || pair[1] != Instruction::Op(expected) {
            return None;
        }
    }
    Some(count as u32)
}

/// Public keys pushed by a script, in push order (32-, 33- or 65-byte pushes)
pub fn pushed_keys(script: &[u8]) -> Vec<&[u8]> {
    instructions(script)
        .map_while(|op| op.ok())
        .filter_map(|op| op.push_data())
        .filter(|data| matches!(data.len(), 32 | 33 | 65))
        .collect()
}

/// Detect a known template in a script
pub fn detect_script_template(script: &[u8]) -> Option<ScriptTemplate> {
    if script == ANCHOR_SCRIPT_PUBKEY {
        return Some(ScriptTemplate::Anchor);
    }
    if let Some(MultisigInfo { m, n }) = parse_multisig_script(script) {
        return Some(ScriptTemplate::Multisig { m, n });
    }
    if let Some(MultisigInfo { m, n }) = parse_tapscript_multisig(script) {
        return Some(ScriptTemplate::TapscriptMultisig { m, n });
    }
    match parse_tapscript_unanimous_multisig(script) {
        Some(n) if n >= 2 => Some(ScriptTemplate::TapscriptUnanimous { n }),
        _ => None,
    }
}
