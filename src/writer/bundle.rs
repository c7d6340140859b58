//! Assembles the output tables into one `game.dat` image.
//!
//! Layout: a 20-byte signature block (magic, engine version, CRC-32 of
//! everything after the block, total length), one index block per content
//! kind (count, absolute offsets, lengths), then every record in kind order.

use tracing::{debug, info};

use crate::error::{EncodeError, Result};
use crate::processor::binary::{padded_len, read_u32_le};
use crate::processor::project::{ContentKind, OutputTables};

pub const MAGIC: &[u8; 8] = b"MAGEGAME";
/// Bump whenever any record layout changes.
pub const ENGINE_VERSION: u32 = 3;

pub const VERSION_OFFSET: usize = 8;
pub const CRC_OFFSET: usize = 12;
pub const LENGTH_OFFSET: usize = 16;
pub const SIGNATURE_LEN: usize = 20;

fn overflow(context: &str, value: usize) -> EncodeError {
    EncodeError::FieldOverflow {
        context: context.to_string(),
        value: value as i64,
        width: 4,
    }
}

fn to_u32(value: usize, context: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| overflow(context, value))
}

pub fn assemble(tables: &OutputTables) -> Result<Vec<u8>> {
    let mut records: Vec<Vec<&[u8]>> = Vec::with_capacity(ContentKind::ALL.len());
    for kind in ContentKind::ALL {
        let mut bodies = Vec::with_capacity(tables.len(kind));
        for (index, record) in tables.records(kind).iter().enumerate() {
            let bytes = record.bytes.as_deref().ok_or_else(|| {
                EncodeError::malformed(
                    format!("{} record {index} (\"{}\")", kind.label(), record.name),
                    "was reserved but never encoded",
                )
            })?;
            bodies.push(bytes);
        }
        records.push(bodies);
    }

    let index_len: usize = records.iter().map(|bodies| 4 + bodies.len() * 8).sum();
    let mut offset = SIGNATURE_LEN + index_len;

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    // checksum and length are patched once the body is complete
    out.extend_from_slice(&[0; 8]);

    for (kind, bodies) in ContentKind::ALL.iter().zip(&records) {
        out.extend_from_slice(&to_u32(bodies.len(), &format!("{} count", kind.label()))?.to_le_bytes());
        let mut lengths = Vec::with_capacity(bodies.len());
        for body in bodies {
            let len = padded_len(body.len());
            out.extend_from_slice(&to_u32(offset, "bundle offset")?.to_le_bytes());
            lengths.push(len);
            offset += len;
        }
        for len in lengths {
            out.extend_from_slice(&to_u32(len, "record length")?.to_le_bytes());
        }
    }

    for (kind, bodies) in ContentKind::ALL.iter().zip(&records) {
        for body in bodies {
            out.extend_from_slice(body);
            out.resize(padded_len(out.len()), 0);
        }
        debug!(kind = kind.label(), count = bodies.len(), "content kind written");
    }

    let total = to_u32(out.len(), "bundle length")?;
    out[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&total.to_le_bytes());
    let crc = crc32fast::hash(&out[SIGNATURE_LEN..]);
    out[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());

    for kind in ContentKind::ALL {
        info!(kind = kind.label(), count = tables.len(kind), "bundle table");
    }
    info!(crc, crc_hex = %format!("{crc:#010x}"), length = out.len(), "bundle assembled");
    Ok(out)
}

/// The per-kind `(offset, length)` tables of an assembled bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleIndex {
    pub version: u32,
    pub crc: u32,
    pub length: u32,
    tables: Vec<Vec<(u32, u32)>>,
}

impl BundleIndex {
    /// Read the header back, checking magic, stored length and checksum.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let truncated = || EncodeError::malformed("bundle", "is truncated");
        if bytes.len() < SIGNATURE_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(EncodeError::malformed("bundle", "does not start with MAGEGAME"));
        }
        let version = read_u32_le(bytes, VERSION_OFFSET).ok_or_else(truncated)?;
        let crc = read_u32_le(bytes, CRC_OFFSET).ok_or_else(truncated)?;
        let length = read_u32_le(bytes, LENGTH_OFFSET).ok_or_else(truncated)?;
        if length as usize != bytes.len() {
            return Err(EncodeError::malformed(
                "bundle",
                format!("stores length {length} but is {} bytes long", bytes.len()),
            ));
        }
        let actual = crc32fast::hash(&bytes[SIGNATURE_LEN..]);
        if actual != crc {
            return Err(EncodeError::malformed(
                "bundle",
                format!("checksum mismatch: stored {crc:#010x}, computed {actual:#010x}"),
            ));
        }

        let mut cursor = SIGNATURE_LEN;
        let mut tables = Vec::with_capacity(ContentKind::ALL.len());
        for _ in ContentKind::ALL {
            let count = read_u32_le(bytes, cursor).ok_or_else(truncated)? as usize;
            cursor += 4;
            let lengths_at = cursor + count * 4;
            let mut entries = Vec::with_capacity(count);
            for i in 0..count {
                let offset = read_u32_le(bytes, cursor + i * 4).ok_or_else(truncated)?;
                let len = read_u32_le(bytes, lengths_at + i * 4).ok_or_else(truncated)?;
                if offset as usize + len as usize > bytes.len() {
                    return Err(truncated());
                }
                entries.push((offset, len));
            }
            cursor = lengths_at + count * 4;
            tables.push(entries);
        }
        Ok(BundleIndex {
            version,
            crc,
            length,
            tables,
        })
    }

    pub fn entries(&self, kind: ContentKind) -> &[(u32, u32)] {
        &self.tables[kind as usize]
    }

    pub fn record<'b>(&self, bytes: &'b [u8], kind: ContentKind, index: usize) -> Option<&'b [u8]> {
        let (offset, len) = *self.entries(kind).get(index)?;
        bytes.get(offset as usize..(offset + len) as usize)
    }
}
