//! Fixed-layout record writer.
//!
//! Every record in the bundle is a zero-filled buffer whose length is the sum
//! of its declared field widths rounded up to a multiple of 4. Fields are
//! written front to back with an explicit byte order.

use crate::error::{EncodeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Byte order of every general data field.
pub const DATA_ENDIAN: Endian = Endian::Little;
/// Byte order of display values; the screen hardware is big endian.
pub const SCREEN_ENDIAN: Endian = Endian::Big;

/// Round `len` up to the next multiple of 4.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(4) * 4
}

/// Concatenate two buffers into a new one.
pub fn combine(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

/// Largest value a field of `width` bytes can hold.
pub fn max_for_width(width: usize) -> u64 {
    match width {
        1 => u8::MAX as u64,
        2 => u16::MAX as u64,
        4 => u32::MAX as u64,
        _ => 0,
    }
}

/// Cursor over a padded, zero-initialised record.
#[derive(Debug)]
pub struct RecordWriter {
    buf: Vec<u8>,
    offset: usize,
}

impl RecordWriter {
    /// Allocate a record for `declared_len` bytes of fields, padded to 4.
    pub fn new(declared_len: usize) -> Self {
        Self {
            buf: vec![0; padded_len(declared_len)],
            offset: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn skip(&mut self, n: usize) -> &mut Self {
        self.offset += n;
        self
    }

    fn put(&mut self, bytes: &[u8]) -> &mut Self {
        let end = self.offset + bytes.len();
        debug_assert!(end <= self.buf.len(), "record write past padded length");
        self.buf[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.put(&[value])
    }

    pub fn u16(&mut self, value: u16, endian: Endian) -> &mut Self {
        match endian {
            Endian::Little => self.put(&value.to_le_bytes()),
            Endian::Big => self.put(&value.to_be_bytes()),
        }
    }

    pub fn u32(&mut self, value: u32, endian: Endian) -> &mut Self {
        match endian {
            Endian::Little => self.put(&value.to_le_bytes()),
            Endian::Big => self.put(&value.to_be_bytes()),
        }
    }

    pub fn f32(&mut self, value: f32, endian: Endian) -> &mut Self {
        match endian {
            Endian::Little => self.put(&value.to_le_bytes()),
            Endian::Big => self.put(&value.to_be_bytes()),
        }
    }

    /// Write `text` into a `width`-byte character field, truncating or
    /// leaving the zero fill in place.
    pub fn chars(&mut self, text: &str, width: usize) -> &mut Self {
        let bytes = text.as_bytes();
        let n = bytes.len().min(width);
        let start = self.offset;
        self.buf[start..start + n].copy_from_slice(&bytes[..n]);
        self.offset = start + width;
        self
    }

    /// Write an unsigned value of `width` bytes, rejecting anything that
    /// does not fit. `context` names the field for the error.
    pub fn uint(
        &mut self,
        value: u32,
        width: usize,
        endian: Endian,
        context: impl FnOnce() -> String,
    ) -> Result<&mut Self> {
        if value as u64 > max_for_width(width) {
            return Err(EncodeError::FieldOverflow {
                context: context(),
                value: value as i64,
                width,
            });
        }
        Ok(match width {
            1 => self.u8(value as u8),
            2 => self.u16(value as u16, endian),
            _ => self.u32(value, endian),
        })
    }

    /// Overwrite a u16 at an absolute offset without moving the cursor.
    pub fn patch_u16(&mut self, at: usize, value: u16, endian: Endian) -> &mut Self {
        patch_u16(&mut self.buf, at, value, endian);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Overwrite a u16 at `at` inside an already encoded record.
pub fn patch_u16(buf: &mut [u8], at: usize, value: u16, endian: Endian) {
    let bytes = match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    };
    buf[at..at + 2].copy_from_slice(&bytes);
}

pub fn read_u32_le(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 4);
        assert_eq!(padded_len(4), 4);
        assert_eq!(padded_len(30), 32);
        assert_eq!(padded_len(37), 40);
    }

    #[test]
    fn test_mixed_endian_fields() {
        let mut w = RecordWriter::new(7);
        w.u8(0xAB)
            .u16(0x1234, Endian::Little)
            .u16(0x1234, Endian::Big)
            .u16(0xBEEF, DATA_ENDIAN);
        let bytes = w.finish();
        assert_eq!(bytes, vec![0xAB, 0x34, 0x12, 0x12, 0x34, 0xEF, 0xBE, 0x00]);
    }

    #[test]
    fn test_chars_truncates_and_zero_fills() {
        let mut w = RecordWriter::new(8);
        w.chars("abcdefghij", 4).chars("xy", 4);
        assert_eq!(w.finish(), b"abcdxy\0\0".to_vec());
    }

    #[test]
    fn test_uint_rejects_overflow() {
        let mut w = RecordWriter::new(4);
        let err = w
            .uint(256, 1, DATA_ENDIAN, || "SET_ENTITY_X byte_value".to_string())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "SET_ENTITY_X byte_value: value 256 does not fit in 1 byte(s)"
        );
        assert!(w.uint(65535, 2, DATA_ENDIAN, String::new).is_ok());
    }

    #[test]
    fn test_patch_and_f32() {
        let mut w = RecordWriter::new(6);
        w.skip(2).f32(1.5, Endian::Little);
        w.patch_u16(0, 7, Endian::Little);
        let bytes = w.finish();
        assert_eq!(&bytes[0..2], &[7, 0]);
        assert_eq!(&bytes[2..6], &1.5f32.to_le_bytes());
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    fn test_combine() {
        assert_eq!(combine(&[1, 2], &[3]), vec![1, 2, 3]);
    }
}
