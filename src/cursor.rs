//! Byte cursor primitives: fixed-width, varint, varslice and vector readers and writers
//!
//! Readers take a buffer and an offset and return `(value, new_offset)`.
//! Every read past the end of the buffer fails with [`CodecError::OutOfBounds`].

use crate::error::{CodecError, Result};
use crate::types::ByteString;

/// Read `len` raw bytes at `offset`
pub fn read_bytes(buf: &[u8], offset: usize, len: usize) -> Result<(&[u8], usize)> {
    let end = offset.checked_add(len).ok_or_else(|| {
        CodecError::OutOfBounds(format!("length {} overflows offset {}", len, offset))
    })?;
    if end > buf.len() {
        return Err(CodecError::OutOfBounds(format!(
            "cannot read {} bytes at offset {} of {}",
            len,
            offset,
            buf.len()
        )));
    }
    Ok((&buf[offset..end], end))
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Result<([u8; N], usize)> {
    let (bytes, next) = read_bytes(buf, offset, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok((out, next))
}

pub fn read_u8(buf: &[u8], offset: usize) -> Result<(u8, usize)> {
    let (bytes, next) = read_array::<1>(buf, offset)?;
    Ok((bytes[0], next))
}

pub fn read_u16_le(buf: &[u8], offset: usize) -> Result<(u16, usize)> {
    let (bytes, next) = read_array(buf, offset)?;
    Ok((u16::from_le_bytes(bytes), next))
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<(u32, usize)> {
    let (bytes, next) = read_array(buf, offset)?;
    Ok((u32::from_le_bytes(bytes), next))
}

pub fn read_i32_le(buf: &[u8], offset: usize) -> Result<(i32, usize)> {
    let (bytes, next) = read_array(buf, offset)?;
    Ok((i32::from_le_bytes(bytes), next))
}

pub fn read_u64_le(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let (bytes, next) = read_array(buf, offset)?;
    Ok((u64::from_le_bytes(bytes), next))
}

pub fn read_hash(buf: &[u8], offset: usize) -> Result<([u8; 32], usize)> {
    read_array(buf, offset)
}

/// Read a compactSize integer
///
/// `< 0xfd` is the value itself, `0xfd`/`0xfe`/`0xff` prefix a 2/4/8-byte
/// little-endian value.
pub fn read_var_int(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let (prefix, next) = read_u8(buf, offset)?;
    match prefix {
        0xfd => {
            let (value, next) = read_u16_le(buf, next)?;
            Ok((value as u64, next))
        }
        0xfe => {
            let (value, next) = read_u32_le(buf, next)?;
            Ok((value as u64, next))
        }
        0xff => read_u64_le(buf, next),
        n => Ok((n as u64, next)),
    }
}

/// Read a compactSize integer that must not exceed `max`
pub fn read_var_int_max(buf: &[u8], offset: usize, max: u64) -> Result<(u64, usize)> {
    let (value, next) = read_var_int(buf, offset)?;
    if value > max {
        return Err(CodecError::OutOfBounds(format!(
            "varint {} at offset {} exceeds limit {}",
            value, offset, max
        )));
    }
    Ok((value, next))
}

/// Read a compactSize length as a `usize`, bounded by what is left in the buffer
fn read_length(buf: &[u8], offset: usize) -> Result<(usize, usize)> {
    let remaining = buf.len().saturating_sub(offset) as u64;
    let (len, next) = read_var_int_max(buf, offset, remaining)?;
    Ok((len as usize, next))
}

/// Read a compactSize length followed by that many bytes
pub fn read_var_slice(buf: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let (len, next) = read_length(buf, offset)?;
    read_bytes(buf, next, len)
}

/// Read a compactSize count followed by that many varslices
pub fn read_vector(buf: &[u8], offset: usize) -> Result<(Vec<ByteString>, usize)> {
    // Each item takes at least one byte, so the count is bounded by the rest of the buffer
    let (count, mut next) = read_length(buf, offset)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let (item, after) = read_var_slice(buf, next)?;
        items.push(item.to_vec());
        next = after;
    }
    Ok((items, next))
}

/// Number of bytes `n` takes as a compactSize integer
pub fn var_int_length(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Encode `n` as a compactSize integer
pub fn var_int_to_bytes(n: u64) -> ByteString {
    let mut out = Vec::with_capacity(var_int_length(n));
    write_var_int(&mut out, n);
    out
}

pub fn write_var_int(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Little-endian encoding of `value` truncated to `width` bytes (at most 8)
pub fn int_to_bytes(value: u64, width: usize) -> ByteString {
    value.to_le_bytes()[..width.min(8)].to_vec()
}

/// Little-endian 8-byte encoding of a 64-bit amount
pub fn u64_to_bytes(value: u64) -> ByteString {
    value.to_le_bytes().to_vec()
}

pub fn write_var_slice(out: &mut Vec<u8>, data: &[u8]) {
    write_var_int(out, data.len() as u64);
    out.extend_from_slice(data);
}

pub fn write_vector(out: &mut Vec<u8>, items: &[ByteString]) {
    write_var_int(out, items.len() as u64);
    for item in items {
        write_var_slice(out, item);
    }
}

/// Stateful cursor over a byte buffer, wrapping the free reader functions
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let (bytes, next) = read_bytes(self.buf, self.pos, len)?;
        self.pos = next;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let (value, next) = read_u8(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let (value, next) = read_u32_le(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        let (value, next) = read_i32_le(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let (value, next) = read_u64_le(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    pub fn read_hash(&mut self) -> Result<[u8; 32]> {
        let (value, next) = read_hash(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    pub fn read_var_int(&mut self) -> Result<u64> {
        let (value, next) = read_var_int(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    /// Read a count of items that each take at least one byte
    pub fn read_count(&mut self) -> Result<usize> {
        let (value, next) = read_length(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    pub fn read_var_slice(&mut self) -> Result<&'a [u8]> {
        let (bytes, next) = read_var_slice(self.buf, self.pos)?;
        self.pos = next;
        Ok(bytes)
    }

    pub fn read_vector(&mut self) -> Result<Vec<ByteString>> {
        let (items, next) = read_vector(self.buf, self.pos)?;
        self.pos = next;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BOUNDARY_VALUES: [u64; 10] = [
        0,
        1,
        252,
        253,
        254,
        0xffff,
        0x10000,
        0xfffffffe,
        0xffffffff,
        0x100000000,
    ];

    #[test]
    fn test_var_int_round_trip_boundaries() {
        for value in BOUNDARY_VALUES {
            let bytes = var_int_to_bytes(value);
            assert_eq!(bytes.len(), var_int_length(value));
            let (decoded, next) = read_var_int(&bytes, 0).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(next, bytes.len());
        }
    }

    #[test]
    fn test_var_int_prefixes() {
        assert_eq!(var_int_to_bytes(252), vec![0xfc]);
        assert_eq!(var_int_to_bytes(253), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(var_int_to_bytes(0x10000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(var_int_to_bytes(0x100000000)[0], 0xff);
    }

    #[test]
    fn test_var_int_truncated() {
        let err = read_var_int(&[0xfe, 0x01, 0x02], 0).unwrap_err();
        assert!(matches!(err, CodecError::OutOfBounds(_)));
        assert!(read_var_int(&[], 0).is_err());
    }

    #[test]
    fn test_var_int_max() {
        let bytes = var_int_to_bytes(1000);
        assert_eq!(read_var_int_max(&bytes, 0, 1000).unwrap().0, 1000);
        assert!(read_var_int_max(&bytes, 0, 999).is_err());
    }

    #[test]
    fn test_read_bytes_out_of_bounds() {
        let buf = [1u8, 2, 3];
        assert_eq!(read_bytes(&buf, 1, 2).unwrap(), (&buf[1..3], 3));
        assert!(read_bytes(&buf, 2, 2).is_err());
        assert!(read_bytes(&buf, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_fixed_width_readers() {
        let buf = [0x01, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(read_u32_le(&buf, 0).unwrap(), (1, 4));
        assert_eq!(read_i32_le(&buf, 4).unwrap(), (-1, 8));
        assert_eq!(read_u64_le(&buf, 0).unwrap().0, 0xffff_ffff_0000_0001);
    }

    #[test]
    fn test_int_to_bytes() {
        assert_eq!(int_to_bytes(0x01020304, 4), vec![0x04, 0x03, 0x02, 0x01]);
        assert_eq!(int_to_bytes(1, 2), vec![0x01, 0x00]);
        assert_eq!(u64_to_bytes(u64::MAX), vec![0xff; 8]);
    }

    #[test]
    fn test_var_slice_and_vector() {
        let mut out = Vec::new();
        write_vector(&mut out, &[vec![0xaa], vec![], vec![0xbb, 0xcc]]);
        let (items, next) = read_vector(&out, 0).unwrap();
        assert_eq!(items, vec![vec![0xaa], vec![], vec![0xbb, 0xcc]]);
        assert_eq!(next, out.len());

        // Declared length longer than the buffer
        assert!(read_var_slice(&[0x05, 0x01], 0).is_err());
        // Declared count larger than the buffer could hold
        assert!(read_vector(&[0xfd, 0xff, 0xff], 0).is_err());
    }

    #[test]
    fn test_byte_reader_tracks_position() {
        let buf = [0x02, 0xab, 0xcd, 0x07];
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_var_slice().unwrap(), &[0xab, 0xcd]);
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.peek_u8(), Some(0x07));
        assert_eq!(reader.read_u8().unwrap(), 0x07);
        assert!(reader.is_empty());
        assert!(reader.read_u8().is_err());
    }

    proptest! {
        #[test]
        fn prop_var_int_round_trip(value in any::<u64>()) {
            let bytes = var_int_to_bytes(value);
            prop_assert_eq!(read_var_int(&bytes, 0).unwrap(), (value, bytes.len()));
        }
    }
}
