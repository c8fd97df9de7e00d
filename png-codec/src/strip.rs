//! The data model shared by the strip and BP engines: a strip's raw PNG
//! bytes as fetched, its decoded scanlines, and the final stacked image.

use crate::assemble::{encode_png, inflate};
use crate::chunk::{ChunkView, PngError};

pub type StripIndex = usize;

/// The complete raw PNG of one horizontal slice, as received over HTTP.
#[derive(Debug, Clone)]
pub struct RawStrip {
    pub index: StripIndex,
    pub bytes: Vec<u8>,
}

/// The inflated filtered scanlines of one strip.
#[derive(Debug, Clone)]
pub struct DecodedStrip {
    pub index: StripIndex,
    pub width: u32,
    pub height: u32,
    pub rows: Vec<u8>,
}

/// Parses a raw strip's PNG and inflates its IDAT into scanlines.
pub fn decode_strip(raw: &RawStrip) -> Result<DecodedStrip, PngError> {
    let view = ChunkView::parse(&raw.bytes).map_err(|why| {
        log::warn!("strip {} failed to parse: {}", raw.index, why);
        why
    })?;
    let width = view.ihdr_width();
    let height = view.ihdr_height();
    let expected_len = height as usize * (width as usize * 4 + 1);
    let rows = inflate(view.idat_data(), expected_len)?;

    if rows.len() != expected_len {
        return Err(PngError::Truncated);
    }

    log::debug!("decoded strip {} ({}x{})", raw.index, width, height);

    Ok(DecodedStrip {
        index: raw.index,
        width,
        height,
        rows,
    })
}

/// Stacks decoded strips, already ordered by index, into one PNG.
///
/// All strips must share the same width; `total_height` is the sum of each
/// strip's height, recomputed here rather than assumed.
pub fn assemble(strips: &[DecodedStrip]) -> Result<Vec<u8>, PngError> {
    let width = strips
        .first()
        .map(|s| s.width)
        .ok_or(PngError::MissingChunk { name: "IHDR" })?;

    let mut total_height: u64 = 0;
    let mut rows = Vec::new();
    for strip in strips {
        if strip.width != width {
            return Err(PngError::UnexpectedChunkOrder {
                expected: "matching strip width",
                found: format!("{}", strip.width),
            });
        }
        total_height += strip.height as u64;
        rows.extend_from_slice(&strip.rows);
    }

    encode_png(width, total_height as u32, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::encode_png as build_fragment;

    fn fragment(index: StripIndex, width: u32, height: u32, fill: u8) -> RawStrip {
        let row_len = width as usize * 4 + 1;
        let rows: Vec<u8> = (0..height as usize * row_len).map(|_| fill).collect();
        RawStrip {
            index,
            bytes: build_fragment(width, height, &rows).unwrap(),
        }
    }

    #[test]
    fn assembles_strips_in_index_order_regardless_of_completion_order() {
        let strips_in_order = vec![
            decode_strip(&fragment(0, 4, 2, 1)).unwrap(),
            decode_strip(&fragment(1, 4, 3, 2)).unwrap(),
        ];

        // Same strips, decoded in reverse arrival order, reassembled by index.
        let mut out_of_order = vec![
            decode_strip(&fragment(1, 4, 3, 2)).unwrap(),
            decode_strip(&fragment(0, 4, 2, 1)).unwrap(),
        ];
        out_of_order.sort_by_key(|s| s.index);

        let a = assemble(&strips_in_order).unwrap();
        let b = assemble(&out_of_order).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn total_height_is_sum_of_strip_heights() {
        let strips = vec![
            decode_strip(&fragment(0, 4, 2, 9)).unwrap(),
            decode_strip(&fragment(1, 4, 5, 9)).unwrap(),
        ];
        let png = assemble(&strips).unwrap();
        let view = ChunkView::parse(&png).unwrap();
        assert_eq!(view.ihdr_height(), 7);
        assert_eq!(view.ihdr_width(), 4);
    }
}
