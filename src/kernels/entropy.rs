//! Thin, panic-free wrapper around the entropy collaborator (the `zstd`
//! crate). The rest of the codec only ever sees `entropy_compress` /
//! `entropy_decompress` over caller-provided buffers.
//!
//! Internal compression levels range from 0 to 9 and map onto zstd levels
//! through [`entropy_level`]; level 9 selects zstd's maximum.

use crate::error::StenosError;

/// Map the reduced 0-9 level onto the collaborator's native scale.
pub(crate) fn entropy_level(level: i32) -> i32 {
    if level < 1 {
        1
    } else if level < 9 {
        level * 2 - 1
    } else {
        *zstd::compression_level_range().end()
    }
}

/// Compress `src` into `dst` at the given reduced level.
///
/// Returns the compressed size, `DstOverflow` when `dst` cannot hold the
/// output, or `Entropy` for any other collaborator failure. Callers in the
/// strategy selector treat every error as "this candidate lost".
pub fn entropy_compress(level: i32, src: &[u8], dst: &mut [u8]) -> Result<usize, StenosError> {
    zstd::bulk::compress_to_buffer(src, dst, entropy_level(level)).map_err(|e| {
        let msg = e.to_string();
        if msg.contains("too small") {
            StenosError::DstOverflow
        } else {
            StenosError::Entropy(msg)
        }
    })
}

/// Decompress `src` into `dst`, returning the decompressed size.
///
/// Any collaborator failure surfaces as `InvalidInput`: on the decode path a
/// malformed entropy payload means the frame is corrupt.
pub fn entropy_decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, StenosError> {
    zstd::bulk::decompress_to_buffer(src, dst)
        .map_err(|_| StenosError::InvalidInput("entropy payload"))
}

//==================================================================================
// Unit tests
//==================================================================================
