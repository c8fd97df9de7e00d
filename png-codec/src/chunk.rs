//! Validating parse-in-place view of a PNG byte buffer.
//!
//! Unlike the offset-33-is-always-IDAT shortcut this replaces, every chunk
//! is walked: `{length: u32 BE, type: [u8; 4], data: length bytes, crc: u32 BE}`,
//! starting right after the 8-byte signature, until IEND or the buffer ends.

use crc32fast::Hasher;

pub const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const CHUNK_HEADER_LEN: usize = 8; // length + type
const CHUNK_CRC_LEN: usize = 4;

#[derive(Debug, Fail, PartialEq)]
pub enum PngError {
    #[fail(display = "buffer does not start with the PNG signature")]
    BadSignature,
    #[fail(display = "buffer is truncated inside a chunk")]
    Truncated,
    #[fail(display = "expected '{}' chunk, found '{}'", expected, found)]
    UnexpectedChunkOrder { expected: &'static str, found: String },
    #[fail(display = "chunk '{}' failed its CRC check", chunk_type)]
    BadCrc { chunk_type: String },
    #[fail(display = "missing required '{}' chunk", name)]
    MissingChunk { name: &'static str },
}

/// One parsed chunk: its 4-byte type tag and a slice over its data.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn kind_str(&self) -> String {
        String::from_utf8_lossy(&self.kind).into_owned()
    }
}

/// A validated view over a complete PNG buffer.
pub struct ChunkView<'a> {
    bytes: &'a [u8],
}

impl<'a> ChunkView<'a> {
    /// Validates the signature and that the first chunk is IHDR followed
    /// immediately by IDAT, per the fragment format these fetchers rely on.
    /// General PNGs with ancillary chunks between IHDR and IDAT are rejected
    /// rather than silently mishandled.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, PngError> {
        if bytes.len() < SIGNATURE.len() || bytes[..SIGNATURE.len()] != SIGNATURE {
            return Err(PngError::BadSignature);
        }

        let view = ChunkView { bytes };
        let mut chunks = view.iter();

        let ihdr = chunks.next().ok_or(PngError::Truncated)??;
        if &ihdr.kind != b"IHDR" {
            return Err(PngError::UnexpectedChunkOrder {
                expected: "IHDR",
                found: ihdr.kind_str(),
            });
        }
        if ihdr.data.len() != 13 {
            return Err(PngError::Truncated);
        }

        let idat = chunks.next().ok_or(PngError::Truncated)??;
        if &idat.kind != b"IDAT" {
            return Err(PngError::UnexpectedChunkOrder {
                expected: "IDAT",
                found: idat.kind_str(),
            });
        }

        Ok(view)
    }

    fn iter(&self) -> ChunkIter<'a> {
        ChunkIter {
            bytes: self.bytes,
            offset: SIGNATURE.len(),
        }
    }

    pub fn ihdr(&self) -> (u32, u32) {
        // Already validated to exist and be 13 bytes by `parse`.
        let ihdr = self.iter().next().unwrap().unwrap();
        let width = be_u32(&ihdr.data[0..4]);
        let height = be_u32(&ihdr.data[4..8]);
        (width, height)
    }

    pub fn ihdr_width(&self) -> u32 {
        self.ihdr().0
    }

    pub fn ihdr_height(&self) -> u32 {
        self.ihdr().1
    }

    /// The first IDAT chunk's data slice. The fragment format used by the
    /// mirrors always places a single IDAT chunk directly after IHDR, which
    /// `parse` has already confirmed.
    pub fn idat_data(&self) -> &'a [u8] {
        let mut chunks = self.iter();
        chunks.next(); // IHDR
        chunks.next().unwrap().unwrap().data
    }

    pub fn idat_length(&self) -> u32 {
        self.idat_data().len() as u32
    }
}

struct ChunkIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<Chunk<'a>, PngError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let remaining = &self.bytes[self.offset..];
        if remaining.len() < CHUNK_HEADER_LEN + CHUNK_CRC_LEN {
            return Some(Err(PngError::Truncated));
        }

        let length = be_u32(&remaining[0..4]) as usize;
        let mut kind = [0u8; 4];
        kind.copy_from_slice(&remaining[4..8]);

        let data_start = CHUNK_HEADER_LEN;
        let data_end = data_start + length;
        let crc_end = data_end + CHUNK_CRC_LEN;
        if remaining.len() < crc_end {
            return Some(Err(PngError::Truncated));
        }

        let data = &remaining[data_start..data_end];
        let stored_crc = be_u32(&remaining[data_end..crc_end]);

        let mut hasher = Hasher::new();
        hasher.update(&remaining[4..data_end]);
        if hasher.finalize() != stored_crc {
            return Some(Err(PngError::BadCrc {
                chunk_type: String::from_utf8_lossy(&kind).into_owned(),
            }));
        }

        self.offset += crc_end;
        if &kind == b"IEND" {
            // Walking stops at IEND; anything past it is not our concern.
            self.offset = self.bytes.len();
        }

        Some(Ok(Chunk { kind, data }))
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::encode_png;

    #[test]
    fn rejects_missing_signature() {
        let err = ChunkView::parse(&[0u8; 16]).unwrap_err();
        assert_eq!(err, PngError::BadSignature);
    }

    #[test]
    fn reads_ihdr_and_idat_from_a_well_formed_png() {
        let rows = vec![0u8; 4 * (2 * 4 + 1)]; // 4 rows, 2px wide, RGBA + filter byte
        let png = encode_png(2, 4, &rows).unwrap();
        let view = ChunkView::parse(&png).unwrap();
        assert_eq!(view.ihdr_width(), 2);
        assert_eq!(view.ihdr_height(), 4);
        assert!(view.idat_length() > 0);
    }
}
