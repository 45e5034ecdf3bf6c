//! Stenos: typed-byte compression for numeric and binary record streams
//! whose elements share a fixed byte width, plus a random-access container
//! whose elements live transparently compressed in fixed-size chunks.
//!
//! The codec combines a per-byte-position transposition with an adaptive
//! per-superblock choice between a SIMD-style block coder (bit packing,
//! byte delta, run-length and a light LZ pass over 16x16 tiles) and entropy
//! coding of the raw, transposed or transposed+delta stream. Compression can
//! run under a soft wall-clock budget that continually adapts the effort and
//! finishes with plain copies rather than overshoot.
//!
//! ```
//! let src: Vec<u8> = (0u32..4096).flat_map(|v| v.to_le_bytes()).collect();
//! let mut dst = vec![0u8; stenos::bound(src.len())];
//! let n = stenos::compress(&src, 4, &mut dst, 3).unwrap();
//!
//! let mut back = vec![0u8; src.len()];
//! let m = stenos::decompress(&dst[..n], 4, &mut back).unwrap();
//! assert_eq!(m, src.len());
//! assert_eq!(back, src);
//! ```

/// The crate version, set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum compressed superblock payload.
pub const MAX_SUPERBLOCK_BYTES: usize = (1 << 24) - 1;
/// Maximum element width.
pub const MAX_BYTES_OF_TYPE: usize = MAX_SUPERBLOCK_BYTES / 256;
/// Default superblock size the derivation aims for.
pub(crate) const DEFAULT_SUPERBLOCK_SIZE: usize = 131072;

mod block;
mod context;
mod error;
mod pipeline;
mod utils;

pub mod cvec;
pub mod kernels;

pub use context::CompressionContext;
pub use cvec::CompressedVec;
pub use error::StenosError;
pub use pipeline::frame::{bound, frame_info, FrameInfo};

/// One-shot compression at the given level (0 = memcpy, 9 = maximum).
/// Returns the frame length written into `dst`.
pub fn compress(src: &[u8], bpp: usize, dst: &mut [u8], level: i32) -> Result<usize, StenosError> {
    let mut ctx = CompressionContext::new();
    ctx.set_level(level);
    ctx.compress(src, bpp, dst)
}

/// One-shot decompression of a complete frame. Returns the decompressed
/// length written into `dst`.
pub fn decompress(src: &[u8], bpp: usize, dst: &mut [u8]) -> Result<usize, StenosError> {
    CompressionContext::new().decompress(src, bpp, dst)
}
