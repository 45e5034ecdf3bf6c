//! SIMD-style block codec over fixed 16x16 tiles.
//!
//! A *block* is 256 consecutive elements. After a per-block byte
//! transposition each of the `bpp` byte planes is a 16x16 tile whose rows
//! are coded independently with the cheapest of bit-packing, byte-delta,
//! run-length, and delta-run-length. Whole planes can collapse to a single
//! byte (all-same) or bail out to raw; whole blocks can be taken over by a
//! light LZ pass or copied verbatim under time pressure.
//!
//! Wire layout per block: a kind prefix of `ceil(bpp / 2)` bytes holding one
//! 4-bit kind per plane (low nibble first), followed by the plane payloads.
//! The first prefix byte doubles as a discriminator: the values 252..254 are
//! impossible as packed kinds and mark copied, LZ-coded and partial blocks.

mod analysis;
mod decoder;
mod encoder;
mod rows;

pub(crate) use decoder::block_decompress;
pub(crate) use encoder::block_compress;

/// Per-plane kinds (packed two per byte).
pub(crate) const KIND_ALL_SAME: u8 = 0;
pub(crate) const KIND_ALL_RAW: u8 = 1;
pub(crate) const KIND_NORMAL: u8 = 2;
pub(crate) const KIND_NORMAL_RLE: u8 = 3;

/// Block-scope markers, written where the kind prefix would start.
pub(crate) const MARKER_COPY: u8 = 252;
pub(crate) const MARKER_LZ: u8 = 253;
pub(crate) const MARKER_PARTIAL: u8 = 254;

/// Kind-prefix length for a block of `bpp` planes.
#[inline]
pub(crate) fn kind_prefix_len(bpp: usize) -> usize {
    (bpp >> 1) + (bpp & 1)
}

//==================================================================================
// Round-trip tests over the whole block codec
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn roundtrip(src: &[u8], bpp: usize) -> usize {
        let mut dst = vec![0u8; src.len() * 2 + 64];
        let produced =
            block_compress(src, bpp, &mut dst, None, None, None).expect("block compress");
        let mut back = vec![0u8; src.len()];
        let consumed =
            block_decompress(&dst[..produced], bpp, src.len(), &mut back).expect("block decompress");
        assert_eq!(consumed, produced);
        assert_eq!(back, src);
        produced
    }

    #[test]
    fn test_all_same_block() {
        let src = vec![0x7Bu8; 256 * 4];
        let produced = roundtrip(&src, 4);
        // One kind prefix + one byte per plane.
        assert!(produced <= kind_prefix_len(4) + 4 + 8);
    }

    #[test]
    fn test_sorted_u32_blocks() {
        let src: Vec<u8> = (0u32..1024).flat_map(|v| v.to_le_bytes()).collect();
        let produced = roundtrip(&src, 4);
        assert!(produced < src.len() / 4, "sorted input should pack well, got {}", produced);
    }

    #[test]
    fn test_random_bytes_do_not_explode() {
        let mut rng = StdRng::seed_from_u64(7);
        for bpp in [1usize, 2, 3, 5, 8] {
            let src: Vec<u8> = (0..256 * bpp * 3).map(|_| rng.gen()).collect();
            let produced = roundtrip(&src, bpp);
            // Worst case: every plane raw plus the prefix bytes.
            assert!(produced <= src.len() + 3 * kind_prefix_len(bpp) + 16);
        }
    }

    #[test]
    fn test_partial_tail_sizes() {
        let mut rng = StdRng::seed_from_u64(8);
        let bpp = 4;
        for tail in [1usize, 15, 16 * bpp, 16 * bpp + 3, 255 * bpp, 17 * bpp * 16 + 37] {
            let n = 256 * bpp + tail;
            let src: Vec<u8> = (0..n).map(|_| rng.gen_range(0..8u8)).collect();
            roundtrip(&src, bpp);
        }
    }

    #[test]
    fn test_sub_block_input_is_all_partial() {
        let src: Vec<u8> = (0..100u8).collect();
        roundtrip(&src, 1);
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let src: Vec<u8> = (0u32..512).flat_map(|v| (v / 3).to_le_bytes()).collect();
        let mut dst = vec![0u8; src.len() + 64];
        let produced = block_compress(&src, 4, &mut dst, None, None, None).unwrap();
        let mut back = vec![0u8; src.len()];
        for cut in [0, 1, produced - 1] {
            assert!(block_decompress(&dst[..cut], 4, src.len(), &mut back).is_err());
        }
    }
}
