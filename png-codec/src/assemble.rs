//! Builds a single PNG from an ordered sequence of decoded scanline buffers,
//! and the reverse: inflates an IDAT payload back into scanlines.
//!
//! Buffer sizes are derived from the caller-supplied width/height rather
//! than hard-coded, since the hard-coded 9 MB/2 MB buffers in the original
//! tools only happened to fit one specific lab workload.

use std::io::{Read, Write};

use crc32fast::Hasher;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::chunk::{PngError, SIGNATURE};

const IHDR_TYPE: &[u8; 4] = b"IHDR";
const IDAT_TYPE: &[u8; 4] = b"IDAT";
const IEND_TYPE: &[u8; 4] = b"IEND";

/// Color type 6 (RGBA), bit depth 8 — the only combination these fragments
/// ever arrive in.
const BIT_DEPTH: u8 = 8;
const COLOR_TYPE_RGBA: u8 = 6;

/// Inflates a zlib-wrapped IDAT payload into raw filtered scanlines.
/// `expected_len` comes from the strip's own IHDR (`height * (width*4 + 1)`)
/// and is used only to pre-size the output buffer.
pub fn inflate(idat: &[u8], expected_len: usize) -> Result<Vec<u8>, PngError> {
    let mut out = Vec::with_capacity(expected_len);
    ZlibDecoder::new(idat)
        .read_to_end(&mut out)
        .map_err(|_| PngError::Truncated)?;
    Ok(out)
}

/// Encodes `rows` (concatenated filtered scanlines, RGBA/depth-8) into a
/// complete three-chunk PNG: IHDR, IDAT, IEND.
pub fn encode_png(width: u32, height: u32, rows: &[u8]) -> Result<Vec<u8>, PngError> {
    let deflated = deflate(rows);

    let mut out = Vec::with_capacity(SIGNATURE.len() + 25 + 12 + deflated.len() + 12);
    out.extend_from_slice(&SIGNATURE);

    write_chunk(
        &mut out,
        IHDR_TYPE,
        &ihdr_payload(width, height),
    );
    write_chunk(&mut out, IDAT_TYPE, &deflated);
    write_chunk(&mut out, IEND_TYPE, &[]);

    Ok(out)
}

fn ihdr_payload(width: u32, height: u32) -> [u8; 13] {
    let mut payload = [0u8; 13];
    payload[0..4].copy_from_slice(&width.to_be_bytes());
    payload[4..8].copy_from_slice(&height.to_be_bytes());
    payload[8] = BIT_DEPTH;
    payload[9] = COLOR_TYPE_RGBA;
    payload[10] = 0; // compression method
    payload[11] = 0; // filter method
    payload[12] = 0; // interlace method
    payload
}

fn deflate(rows: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(rows.len() / 2), Compression::default());
    // A Vec<u8> writer never fails.
    encoder.write_all(rows).expect("in-memory write cannot fail");
    encoder.finish().expect("in-memory write cannot fail")
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut hasher = Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}
