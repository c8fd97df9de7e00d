//! PNG chunk parsing and vertical-strip assembly.
//!
//! This crate treats CRC-32 and DEFLATE as black-box primitives (via
//! `crc32fast` and `flate2`) and focuses on the PNG-specific layout: a
//! validating chunk walker in place of fixed-offset pointer arithmetic, and
//! an assembler that stacks decoded strips into one image.

#[macro_use]
extern crate failure_derive;
extern crate crc32fast;
extern crate failure;
extern crate flate2;
extern crate log;

pub mod assemble;
pub mod chunk;
pub mod strip;

pub use chunk::{Chunk, ChunkView, PngError, SIGNATURE};
pub use strip::{assemble as assemble_image, decode_strip, DecodedStrip, RawStrip, StripIndex};
