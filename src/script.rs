//! Script parsing: opcode table, instruction iteration and ASM rendering
//!
//! Scripts are never executed here. The parser only splits a script into
//! pushes and opcodes so that templates, sigops and standardness rules can
//! inspect it.

use crate::error::{CodecError, Result};
use crate::types::ByteString;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHBYTES_20: u8 = 0x14;
pub const OP_PUSHBYTES_32: u8 = 0x20;
pub const OP_PUSHBYTES_33: u8 = 0x21;
pub const OP_PUSHBYTES_65: u8 = 0x41;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_IF: u8 = 0x63;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_NUMEQUAL: u8 = 0x9c;
pub const OP_NUMEQUALVERIFY: u8 = 0x9d;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
pub const OP_CHECKSIGADD: u8 = 0xba;

/// One parsed script element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// `OP_0`, `OP_PUSHBYTES_n` or `OP_PUSHDATA1/2/4` with its payload
    Push { opcode: u8, data: &'a [u8] },
    /// Any other opcode, including `OP_1NEGATE` and `OP_1`..`OP_16`
    Op(u8),
}

impl<'a> Instruction<'a> {
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Push { opcode, .. } => *opcode,
            Instruction::Op(opcode) => *opcode,
        }
    }

    pub fn push_data(&self) -> Option<&'a [u8]> {
        match self {
            Instruction::Push { data, .. } => Some(data),
            Instruction::Op(_) => None,
        }
    }

    /// Value of `OP_1`..`OP_16`
    pub fn small_int(&self) -> Option<u32> {
        match self {
            Instruction::Op(op) if (OP_1..=OP_16).contains(op) => Some((op - OP_1 + 1) as u32),
            _ => None,
        }
    }
}

/// Iterator over the instructions of a script
///
/// Yields an error for a push that runs past the end of the script and
/// stops afterwards.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    script: &'a [u8],
    pos: usize,
    failed: bool,
}

pub fn instructions(script: &[u8]) -> Instructions<'_> {
    Instructions { script, pos: 0, failed: false }
}

impl<'a> Instructions<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.script.len());
        match end {
            Some(end) => {
                let data = &self.script[self.pos..end];
                self.pos = end;
                Ok(data)
            }
            None => Err(CodecError::OutOfBounds(format!(
                "push of {} bytes at offset {} runs past end of script",
                len, self.pos
            ))),
        }
    }

    fn take_len(&mut self, width: usize) -> Result<usize> {
        let bytes = self.take(width)?;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf) as usize)
    }

    fn next_instruction(&mut self, opcode: u8) -> Result<Instruction<'a>> {
        let len = match opcode {
            0x00..=0x4b => opcode as usize,
            OP_PUSHDATA1 => self.take_len(1)?,
            OP_PUSHDATA2 => self.take_len(2)?,
            OP_PUSHDATA4 => self.take_len(4)?,
            _ => return Ok(Instruction::Op(opcode)),
        };
        let data = self.take(len)?;
        Ok(Instruction::Push { opcode, data })
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.script.len() {
            return None;
        }
        let opcode = self.script[self.pos];
        self.pos += 1;
        let item = self.next_instruction(opcode);
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

/// Parse a whole script, failing on a truncated push
pub fn parse_script(script: &[u8]) -> Result<Vec<Instruction<'_>>> {
    instructions(script).collect()
}

/// Name of a non-push opcode as shown in ASM
pub fn opcode_name(opcode: u8) -> String {
    let name = match opcode {
        0x00 => "OP_0",
        0x01..=0x4b => return format!("OP_PUSHBYTES_{}", opcode),
        0x4c => "OP_PUSHDATA1",
        0x4d => "OP_PUSHDATA2",
        0x4e => "OP_PUSHDATA4",
        0x4f => "OP_PUSHNUM_NEG1",
        0x50 => "OP_RESERVED",
        0x51..=0x60 => return format!("OP_PUSHNUM_{}", opcode - 0x50),
        0x61 => "OP_NOP",
        0x62 => "OP_VER",
        0x63 => "OP_IF",
        0x64 => "OP_NOTIF",
        0x65 => "OP_VERIF",
        0x66 => "OP_VERNOTIF",
        0x67 => "OP_ELSE",
        0x68 => "OP_ENDIF",
        0x69 => "OP_VERIFY",
        0x6a => "OP_RETURN",
        0x6b => "OP_TOALTSTACK",
        0x6c => "OP_FROMALTSTACK",
        0x6d => "OP_2DROP",
        0x6e => "OP_2DUP",
        0x6f => "OP_3DUP",
        0x70 => "OP_2OVER",
        0x71 => "OP_2ROT",
        0x72 => "OP_2SWAP",
        0x73 => "OP_IFDUP",
        0x74 => "OP_DEPTH",
        0x75 => "OP_DROP",
        0x76 => "OP_DUP",
        0x77 => "OP_NIP",
        0x78 => "OP_OVER",
        0x79 => "OP_PICK",
        0x7a => "OP_ROLL",
        0x7b => "OP_ROT",
        0x7c => "OP_SWAP",
        0x7d => "OP_TUCK",
        0x7e => "OP_CAT",
        0x7f => "OP_SUBSTR",
        0x80 => "OP_LEFT",
        0x81 => "OP_RIGHT",
        0x82 => "OP_SIZE",
        0x83 => "OP_INVERT",
        0x84 => "OP_AND",
        0x85 => "OP_OR",
        0x86 => "OP_XOR",
        0x87 => "OP_EQUAL",
        0x88 => "OP_EQUALVERIFY",
        0x89 => "OP_RESERVED1",
        0x8a => "OP_RESERVED2",
        0x8b => "OP_1ADD",
        0x8c => "OP_1SUB",
        0x8d => "OP_2MUL",
        0x8e => "OP_2DIV",
        0x8f => "OP_NEGATE",
        0x90 => "OP_ABS",
        0x91 => "OP_NOT",
        0x92 => "OP_0NOTEQUAL",
        0x93 => "OP_ADD",
        0x94 => "OP_SUB",
        0x95 => "OP_MUL",
        0x96 => "OP_DIV",
        0x97 => "OP_MOD",
        0x98 => "OP_LSHIFT",
        0x99 => "OP_RSHIFT",
        0x9a => "OP_BOOLAND",
        0x9b => "OP_BOOLOR",
        0x9c => "OP_NUMEQUAL",
        0x9d => "OP_NUMEQUALVERIFY",
        0x9e => "OP_NUMNOTEQUAL",
        0x9f => "OP_LESSTHAN",
        0xa0 => "OP_GREATERTHAN",
        0xa1 => "OP_LESSTHANOREQUAL",
        0xa2 => "OP_GREATERTHANOREQUAL",
        0xa3 => "OP_MIN",
        0xa4 => "OP_MAX",
        0xa5 => "OP_WITHIN",
        0xa6 => "OP_RIPEMD160",
        0xa7 => "OP_SHA1",
        0xa8 => "OP_SHA256",
        0xa9 => "OP_HASH160",
        0xaa => "OP_HASH256",
        0xab => "OP_CODESEPARATOR",
        0xac => "OP_CHECKSIG",
        0xad => "OP_CHECKSIGVERIFY",
        0xae => "OP_CHECKMULTISIG",
        0xaf => "OP_CHECKMULTISIGVERIFY",
        0xb0 => "OP_NOP1",
        0xb1 => "OP_CLTV",
        0xb2 => "OP_CSV",
        0xb3..=0xb9 => return format!("OP_NOP{}", opcode - 0xaf),
        0xba => "OP_CHECKSIGADD",
        0xbb..=0xfe => return format!("OP_RETURN_{}", opcode),
        0xff => "OP_INVALIDOPCODE",
    };
    name.to_string()
}

/// Render a script in explorer ASM notation, e.g.
/// `OP_DUP OP_HASH160 OP_PUSHBYTES_20 <hex> OP_EQUALVERIFY OP_CHECKSIG`
pub fn to_asm(script: &[u8]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for instruction in instructions(script) {
        match instruction {
            Ok(Instruction::Push { opcode, data }) => {
                if opcode == OP_0 {
                    parts.push("OP_0".to_string());
                } else {
                    parts.push(format!("{} {}", opcode_name(opcode), hex::encode(data)));
                }
            }
            Ok(Instruction::Op(opcode)) => parts.push(opcode_name(opcode)),
            Err(_) => {
                parts.push("<push past end>".to_string());
                break;
            }
        }
    }
    parts.join(" ")
}

/// True if the script only pushes data (opcodes up to `OP_16`)
pub fn is_push_only(script: &[u8]) -> bool {
    instructions(script).all(|instruction| match instruction {
        Ok(instruction) => instruction.opcode() <= OP_16,
        Err(_) => false,
    })
}

/// Payloads of every data push in a push-only script
pub fn push_data_items(script: &[u8]) -> Option<Vec<&[u8]>> {
    let mut items = Vec::new();
    for instruction in instructions(script) {
        match instruction.ok()? {
            Instruction::Push { data, .. } => items.push(data),
            Instruction::Op(op) if op <= OP_16 => items.push(&[][..]),
            Instruction::Op(_) => return None,
        }
    }
    Some(items)
}

/// Last data push of a push-only scriptSig (the redeem script of a P2SH spend)
pub fn last_push(script: &[u8]) -> Option<&[u8]> {
    push_data_items(script)?.pop()
}

/// Minimal push of `data`
pub fn push_script(data: &[u8]) -> ByteString {
    let mut out = Vec::with_capacity(data.len() + 5);
    write_push(&mut out, data);
    out
}

pub fn write_push(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    match len {
        0..=0x4b => out.push(len as u8),
        0x4c..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(len as u8);
        }
        0x100..=0xffff => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        }
        _ => {
            out.push(OP_PUSHDATA4);
            out.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
}

/// True if `script` contains `OP_0 OP_IF`, the opening of an inscription envelope
pub fn contains_envelope(script: &[u8]) -> bool {
    let mut previous_empty_push = false;
    for instruction in instructions(script) {
        let Ok(instruction) = instruction else {
            return false;
        };
        if previous_empty_push && instruction == Instruction::Op(OP_IF) {
            return true;
        }
        previous_empty_push = instruction.opcode() == OP_0;
    }
    false
}
