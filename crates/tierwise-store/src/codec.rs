//! Binary on-disk format for the patch store.
//!
//! ```text
//! [Header][Base metadata block][Base data block][Journal records ...]
//! ```
//!
//! All integers are little-endian. A compaction writes only the base blocks;
//! appends add journal records (metadata entry followed by its vector) after
//! the base data block and then rewrite the fixed-size header. Bytes past
//! `end_offset` belong to an append whose header update never landed and
//! are ignored.

use bytes::{Buf, BufMut};
use chrono::DateTime;
use thiserror::Error;
use tierwise_vector::{Patch, Tier};

pub const MAGIC: u32 = 0x5643_5452;
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 48;
/// Metadata entry size without the label bytes
pub const METADATA_FIXED_LEN: usize = 24;
pub const MAX_LABEL_BYTES: usize = 4096;

/// Set when journal records follow the base data block
pub const FLAG_JOURNAL: u16 = 0b1;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("truncated store: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("inconsistent offsets: {0}")]
    InconsistentOffsets(String),
    #[error("invalid tier code {0}")]
    InvalidTier(u8),
    #[error("label is not valid UTF-8")]
    InvalidLabel,
    #[error("vector contains non-finite values")]
    NonFiniteVector,
}

fn tier_code(tier: Tier) -> u8 {
    match tier {
        Tier::Flagship => 0,
        Tier::Lightweight => 1,
    }
}

fn tier_from_code(code: u8) -> Result<Tier, CodecError> {
    match code {
        0 => Ok(Tier::Flagship),
        1 => Ok(Tier::Lightweight),
        other => Err(CodecError::InvalidTier(other)),
    }
}

/// Cut a label to at most [`MAX_LABEL_BYTES`] on a char boundary
pub fn clamp_label(label: &str) -> &str {
    if label.len() <= MAX_LABEL_BYTES {
        return label;
    }
    let mut end = MAX_LABEL_BYTES;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    &label[..end]
}

pub fn vector_bytes(dim: usize) -> usize {
    dim * 4
}

fn metadata_len(patch: &Patch) -> usize {
    METADATA_FIXED_LEN + clamp_label(&patch.label).len()
}

/// Fixed-size file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub flags: u16,
    pub vector_dim: u32,
    /// Total patches, base block plus journal
    pub count: u32,
    /// Patches in the base block
    pub base_count: u32,
    pub metadata_offset: u64,
    pub data_offset: u64,
    /// Committed file length
    pub end_offset: u64,
}

impl Header {
    /// Header for a file holding no patches
    pub fn empty(vector_dim: usize) -> Self {
        Self {
            version: FORMAT_VERSION,
            flags: 0,
            vector_dim: vector_dim as u32,
            count: 0,
            base_count: 0,
            metadata_offset: HEADER_LEN as u64,
            data_offset: HEADER_LEN as u64,
            end_offset: HEADER_LEN as u64,
        }
    }

    pub fn journal_count(&self) -> u32 {
        self.count.saturating_sub(self.base_count)
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut buf = &mut out[..];
        buf.put_u32_le(MAGIC);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.flags);
        buf.put_u32_le(self.vector_dim);
        buf.put_u32_le(self.count);
        buf.put_u32_le(self.base_count);
        buf.put_u32_le(0);
        buf.put_u64_le(self.metadata_offset);
        buf.put_u64_le(self.data_offset);
        buf.put_u64_le(self.end_offset);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                offset: 0,
                needed: HEADER_LEN,
                len: bytes.len(),
            });
        }
        let mut buf = &bytes[..HEADER_LEN];
        let magic = buf.get_u32_le();
        if magic != MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        let version = buf.get_u16_le();
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let flags = buf.get_u16_le();
        let vector_dim = buf.get_u32_le();
        let count = buf.get_u32_le();
        let base_count = buf.get_u32_le();
        let _reserved = buf.get_u32_le();
        Ok(Self {
            version,
            flags,
            vector_dim,
            count,
            base_count,
            metadata_offset: buf.get_u64_le(),
            data_offset: buf.get_u64_le(),
            end_offset: buf.get_u64_le(),
        })
    }
}

fn put_metadata(out: &mut Vec<u8>, patch: &Patch, data_offset: u64) {
    let label = clamp_label(&patch.label).as_bytes();
    out.put_u8(tier_code(patch.tier));
    out.put_u8(0);
    out.put_u16_le(label.len() as u16);
    out.put_i64_le(patch.timestamp.timestamp_millis());
    out.put_f32_le(patch.initial_weight);
    out.put_u64_le(data_offset);
    out.put_slice(label);
}

fn put_vector(out: &mut Vec<u8>, patch: &Patch, dim: usize) -> Result<(), CodecError> {
    if patch.vector.len() != dim {
        return Err(CodecError::DimensionMismatch {
            expected: dim,
            found: patch.vector.len(),
        });
    }
    if patch.vector.iter().any(|x| !x.is_finite()) {
        return Err(CodecError::NonFiniteVector);
    }
    for &x in &patch.vector {
        out.put_f32_le(x);
    }
    Ok(())
}

/// Encode a full base-only store file
pub fn encode_store(patches: &[Patch], dim: usize) -> Result<Vec<u8>, CodecError> {
    let metadata_total: usize = patches.iter().map(metadata_len).sum();
    let data_offset = HEADER_LEN + metadata_total;
    let end_offset = data_offset + patches.len() * vector_bytes(dim);

    let header = Header {
        version: FORMAT_VERSION,
        flags: 0,
        vector_dim: dim as u32,
        count: patches.len() as u32,
        base_count: patches.len() as u32,
        metadata_offset: HEADER_LEN as u64,
        data_offset: data_offset as u64,
        end_offset: end_offset as u64,
    };

    let mut out = Vec::with_capacity(end_offset);
    out.put_slice(&header.encode());
    for (i, patch) in patches.iter().enumerate() {
        put_metadata(&mut out, patch, (data_offset + i * vector_bytes(dim)) as u64);
    }
    for patch in patches {
        put_vector(&mut out, patch, dim)?;
    }
    debug_assert_eq!(out.len(), end_offset);
    Ok(out)
}

/// Encode one journal record to be written at `offset`
pub fn encode_journal_record(patch: &Patch, offset: u64, dim: usize) -> Result<Vec<u8>, CodecError> {
    let meta_len = metadata_len(patch);
    let mut out = Vec::with_capacity(meta_len + vector_bytes(dim));
    put_metadata(&mut out, patch, offset + meta_len as u64);
    put_vector(&mut out, patch, dim)?;
    Ok(out)
}

/// Header describing the file after appending a record of `record_len` bytes
pub fn header_after_append(header: &Header, record_len: usize) -> Header {
    Header {
        flags: header.flags | FLAG_JOURNAL,
        count: header.count + 1,
        end_offset: header.end_offset + record_len as u64,
        ..*header
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                len: self.bytes.len(),
            }),
        }
    }
}

struct MetadataEntry {
    tier: Tier,
    label: String,
    timestamp_ms: i64,
    initial_weight: f32,
    data_offset: u64,
}

fn read_metadata(reader: &mut Reader<'_>) -> Result<MetadataEntry, CodecError> {
    let mut fixed = reader.take(METADATA_FIXED_LEN)?;
    let tier = tier_from_code(fixed.get_u8())?;
    let _reserved = fixed.get_u8();
    let label_len = fixed.get_u16_le() as usize;
    let timestamp_ms = fixed.get_i64_le();
    let initial_weight = fixed.get_f32_le();
    let data_offset = fixed.get_u64_le();
    if !initial_weight.is_finite() {
        return Err(CodecError::NonFiniteVector);
    }
    let label = std::str::from_utf8(reader.take(label_len)?)
        .map_err(|_| CodecError::InvalidLabel)?
        .to_string();
    Ok(MetadataEntry {
        tier,
        label,
        timestamp_ms,
        initial_weight,
        data_offset,
    })
}

fn read_vector(bytes: &[u8], offset: u64, dim: usize, limit: u64) -> Result<Vec<f32>, CodecError> {
    let end = offset.checked_add(vector_bytes(dim) as u64);
    if end.map_or(true, |end| end > limit) {
        return Err(CodecError::InconsistentOffsets(format!(
            "vector at {} runs past {}",
            offset, limit
        )));
    }
    let mut reader = Reader::at(bytes, offset as usize);
    let mut raw = reader.take(vector_bytes(dim))?;
    let mut vector = Vec::with_capacity(dim);
    for _ in 0..dim {
        let x = raw.get_f32_le();
        if !x.is_finite() {
            return Err(CodecError::NonFiniteVector);
        }
        vector.push(x);
    }
    Ok(vector)
}

fn into_patch(entry: MetadataEntry, vector: Vec<f32>) -> Result<Patch, CodecError> {
    let timestamp = DateTime::from_timestamp_millis(entry.timestamp_ms).ok_or_else(|| {
        CodecError::InconsistentOffsets(format!("timestamp {} out of range", entry.timestamp_ms))
    })?;
    Ok(Patch {
        vector,
        tier: entry.tier,
        label: entry.label,
        timestamp,
        initial_weight: entry.initial_weight,
    })
}

/// Decode a store file, validating every offset against the header
pub fn decode_store(bytes: &[u8], expected_dim: usize) -> Result<(Header, Vec<Patch>), CodecError> {
    let header = Header::decode(bytes)?;
    let dim = header.vector_dim as usize;
    if dim != expected_dim {
        return Err(CodecError::DimensionMismatch {
            expected: expected_dim,
            found: dim,
        });
    }
    if header.base_count > header.count {
        return Err(CodecError::InconsistentOffsets(format!(
            "base count {} exceeds count {}",
            header.base_count, header.count
        )));
    }
    if header.metadata_offset != HEADER_LEN as u64 {
        return Err(CodecError::InconsistentOffsets(format!(
            "metadata offset {} != {}",
            header.metadata_offset, HEADER_LEN
        )));
    }
    if header.end_offset > bytes.len() as u64 {
        return Err(CodecError::Truncated {
            offset: bytes.len(),
            needed: (header.end_offset - bytes.len() as u64) as usize,
            len: bytes.len(),
        });
    }
    let has_journal = header.flags & FLAG_JOURNAL != 0;
    if has_journal != (header.count > header.base_count) {
        return Err(CodecError::InconsistentOffsets(
            "journal flag disagrees with counts".to_string(),
        ));
    }

    let record = vector_bytes(dim) as u64;
    let base_data_end = (header.base_count as u64)
        .checked_mul(record)
        .and_then(|len| len.checked_add(header.data_offset))
        .filter(|&end| end <= header.end_offset)
        .ok_or_else(|| {
            CodecError::InconsistentOffsets(format!(
                "base data block of {} records at {} runs past end {}",
                header.base_count, header.data_offset, header.end_offset
            ))
        })?;

    // Every record needs at least its fixed metadata and vector bytes, which
    // bounds `count` by the committed length before anything is allocated.
    let min_journal_record = (METADATA_FIXED_LEN as u64) + record;
    let journal_fits = (header.journal_count() as u64)
        .checked_mul(min_journal_record)
        .is_some_and(|len| len <= header.end_offset - base_data_end);
    let base_metadata_fits = (header.base_count as u64)
        .checked_mul(METADATA_FIXED_LEN as u64)
        .and_then(|len| len.checked_add(header.metadata_offset))
        .is_some_and(|end| end <= header.data_offset);
    if !journal_fits || !base_metadata_fits {
        return Err(CodecError::InconsistentOffsets(format!(
            "{} patches cannot fit in {} committed bytes",
            header.count, header.end_offset
        )));
    }

    let committed = &bytes[..header.end_offset as usize];
    let mut patches = Vec::with_capacity(header.count as usize);

    let mut reader = Reader::at(committed, header.metadata_offset as usize);
    for i in 0..header.base_count as u64 {
        let entry = read_metadata(&mut reader)?;
        let expected = header.data_offset + i * record;
        if entry.data_offset != expected {
            return Err(CodecError::InconsistentOffsets(format!(
                "base entry {} points at {} instead of {}",
                i, entry.data_offset, expected
            )));
        }
        let vector = read_vector(committed, entry.data_offset, dim, base_data_end)?;
        patches.push(into_patch(entry, vector)?);
    }
    if reader.pos as u64 != header.data_offset {
        return Err(CodecError::InconsistentOffsets(format!(
            "metadata block ends at {} but data starts at {}",
            reader.pos, header.data_offset
        )));
    }

    let mut reader = Reader::at(committed, base_data_end as usize);
    for _ in 0..header.journal_count() {
        let entry = read_metadata(&mut reader)?;
        if entry.data_offset != reader.pos as u64 {
            return Err(CodecError::InconsistentOffsets(format!(
                "journal entry points at {} instead of {}",
                entry.data_offset, reader.pos
            )));
        }
        let vector = read_vector(committed, entry.data_offset, dim, header.end_offset)?;
        reader.pos += vector_bytes(dim);
        patches.push(into_patch(entry, vector)?);
    }
    if reader.pos as u64 != header.end_offset {
        return Err(CodecError::InconsistentOffsets(format!(
            "records end at {} but header says {}",
            reader.pos, header.end_offset
        )));
    }

    Ok((header, patches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn patch(v: &[f32], tier: Tier, label: &str) -> Patch {
        Patch::new(v.to_vec(), tier, label, Utc::now(), 0.75)
    }

    #[test]
    fn test_header_layout() {
        let header = Header::empty(3);
        let bytes = header.encode();
        assert_eq!(&bytes[..4], &MAGIC.to_le_bytes());
        assert_eq!(Header::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_base_and_journal_decode() {
        let dim = 2;
        let base = vec![
            patch(&[1.0, 0.0], Tier::Flagship, "prove this theorem"),
            patch(&[0.0, 1.0], Tier::Lightweight, "héllo wörld"),
        ];
        let mut bytes = encode_store(&base, dim).unwrap();
        let (mut header, decoded) = decode_store(&bytes, dim).unwrap();
        assert_eq!(decoded, base);

        let extra = patch(&[0.6, 0.8], Tier::Flagship, "");
        let record = encode_journal_record(&extra, header.end_offset, dim).unwrap();
        bytes.extend_from_slice(&record);
        header = header_after_append(&header, record.len());
        bytes[..HEADER_LEN].copy_from_slice(&header.encode());

        let (header, decoded) = decode_store(&bytes, dim).unwrap();
        assert_eq!(header.count, 3);
        assert_eq!(header.base_count, 2);
        assert_eq!(decoded[2], extra);
    }

    #[test]
    fn test_oversized_count_rejected() {
        let header = Header {
            flags: FLAG_JOURNAL,
            count: u32::MAX,
            ..Header::empty(4)
        };
        assert!(matches!(
            decode_store(&header.encode(), 4),
            Err(CodecError::InconsistentOffsets(_))
        ));

        let header = Header {
            count: u32::MAX,
            base_count: u32::MAX,
            ..Header::empty(4)
        };
        assert!(decode_store(&header.encode(), 4).is_err());
    }

    #[test]
    fn test_torn_tail_ignored() {
        let dim = 2;
        let mut bytes = encode_store(&[patch(&[1.0, 0.0], Tier::Flagship, "a")], dim).unwrap();
        bytes.extend_from_slice(&[0xAB; 17]);
        let (_, decoded) = decode_store(&bytes, dim).unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_rejects_wrong_magic_and_version() {
        let mut bytes = Header::empty(2).encode();
        bytes[0] ^= 0xFF;
        assert!(matches!(decode_store(&bytes, 2), Err(CodecError::BadMagic(_))));

        let mut bytes = Header::empty(2).encode();
        bytes[4] = 9;
        assert_eq!(decode_store(&bytes, 2), Err(CodecError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let bytes = encode_store(&[patch(&[1.0, 0.0], Tier::Flagship, "a")], 2).unwrap();
        assert_eq!(
            decode_store(&bytes, 3).unwrap_err(),
            CodecError::DimensionMismatch {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_rejects_inflated_count() {
        let dim = 2;
        let bytes = encode_store(&[patch(&[1.0, 0.0], Tier::Flagship, "a")], dim).unwrap();
        let (mut header, _) = decode_store(&bytes, dim).unwrap();
        header.count = 5;
        header.base_count = 5;
        let mut tampered = bytes.clone();
        tampered[..HEADER_LEN].copy_from_slice(&header.encode());
        assert!(decode_store(&tampered, dim).is_err());
    }

    #[test]
    fn test_truncated_file_rejected() {
        let bytes = encode_store(&[patch(&[1.0, 0.0], Tier::Flagship, "abc")], 2).unwrap();
        assert!(decode_store(&bytes[..bytes.len() - 1], 2).is_err());
    }

    #[test]
    fn test_clamp_label_char_boundary() {
        let long = "é".repeat(MAX_LABEL_BYTES);
        let clamped = clamp_label(&long);
        assert!(clamped.len() <= MAX_LABEL_BYTES);
        assert!(clamped.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_encode_rejects_wrong_dimension() {
        let err = encode_store(&[patch(&[1.0], Tier::Flagship, "a")], 2).unwrap_err();
        assert!(matches!(err, CodecError::DimensionMismatch { .. }));
    }
}
