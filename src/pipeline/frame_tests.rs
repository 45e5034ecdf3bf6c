//! End-to-end frame scenarios: round-trips over width/level/thread grids,
//! boundary writes, determinism across thread counts, and the header
//! contract.

use crate::pipeline::frame::{bound, frame_info};
use crate::{compress, decompress, CompressionContext, StenosError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn roundtrip_with(src: &[u8], bpp: usize, level: i32, threads: usize) -> usize {
    let mut ctx = CompressionContext::new();
    ctx.set_level(level);
    ctx.set_threads(threads);

    let mut dst = vec![0u8; bound(src.len())];
    let n = ctx.compress(src, bpp, &mut dst).expect("compress");
    assert!(n <= dst.len());

    let mut back = vec![0u8; src.len()];
    let m = ctx.decompress(&dst[..n], bpp, &mut back).expect("decompress");
    assert_eq!(m, src.len());
    assert_eq!(back, src);
    n
}

fn patterned(n: usize, bpp: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    match seed % 4 {
        0 => vec![0x7B; n],
        1 => (0..n).map(|i| ((i / bpp.max(1)) & 0xFF) as u8).collect(),
        2 => (0..n).map(|_| rng.gen_range(0..16u8)).collect(),
        _ => (0..n).map(|_| rng.gen()).collect(),
    }
}

#[test]
fn test_roundtrip_grid() {
    for &bpp in &[1usize, 2, 3, 4, 5, 7, 8, 12, 16, 17, 64, 256] {
        for seed in 0..4u64 {
            for &elems in &[0usize, 1, 37, 256, 1000, 5000] {
                let src = patterned(elems * bpp, bpp, seed + bpp as u64);
                for &level in &[0, 1, 3, 9] {
                    roundtrip_with(&src, bpp, level, 1);
                }
            }
        }
    }
}

#[test]
fn test_roundtrip_multi_superblock() {
    // Large enough to split into several superblocks at every level.
    for &bpp in &[1usize, 4, 8] {
        for seed in 0..4u64 {
            let src = patterned(700_000 / bpp * bpp, bpp, seed);
            for &level in &[1, 5, 9] {
                for &threads in &[1usize, 4] {
                    roundtrip_with(&src, bpp, level, threads);
                }
            }
        }
    }
}

#[test]
fn test_output_identical_across_thread_counts() {
    let src = patterned(900_000, 4, 2);
    let mut frames = Vec::new();
    for threads in 1..=8usize {
        let mut ctx = CompressionContext::new();
        ctx.set_level(3);
        ctx.set_threads(threads);
        let mut dst = vec![0u8; bound(src.len())];
        let n = ctx.compress(&src, 4, &mut dst).unwrap();
        frames.push(dst[..n].to_vec());
    }
    for f in &frames[1..] {
        assert_eq!(f, &frames[0], "frame must not depend on the thread count");
    }
}

#[test]
fn test_boundary_writes_respect_reported_length() {
    let src = patterned(100_000, 4, 1);
    let mut dst = vec![0u8; bound(src.len()) + 64];
    let fence_at = bound(src.len());
    dst[fence_at..].fill(0xA5);

    let n = compress(&src, 4, &mut dst[..fence_at], 5).unwrap();
    assert!(dst[fence_at..].iter().all(|&b| b == 0xA5));

    let mut back = vec![0u8; src.len() + 64];
    back[src.len()..].fill(0x5A);
    let m = decompress(&dst[..n], 4, &mut back[..src.len()]).unwrap();
    assert_eq!(m, src.len());
    assert!(back[src.len()..].iter().all(|&b| b == 0x5A));
}

#[test]
fn test_dst_too_small_is_overflow() {
    let src = patterned(65536, 2, 3);
    let mut tiny = vec![0u8; 64];
    assert_eq!(compress(&src, 2, &mut tiny, 1), Err(StenosError::DstOverflow));

    // Decompression into a short buffer must refuse up front.
    let mut dst = vec![0u8; bound(src.len())];
    let n = compress(&src, 2, &mut dst, 1).unwrap();
    let mut short = vec![0u8; src.len() - 1];
    assert_eq!(decompress(&dst[..n], 2, &mut short), Err(StenosError::DstOverflow));
}

#[test]
fn test_invalid_parameters() {
    let src = [0u8; 128];
    let mut dst = [0u8; 256];
    assert!(matches!(compress(&src, 0, &mut dst, 1), Err(StenosError::InvalidBytesOfType(0))));
    assert!(matches!(
        compress(&src, crate::MAX_BYTES_OF_TYPE, &mut dst, 1),
        Err(StenosError::InvalidBytesOfType(_))
    ));
    // Input length must be a whole number of elements.
    assert!(matches!(compress(&src[..100], 3, &mut dst, 1), Err(StenosError::InvalidParameter(_))));

    let mut ctx = CompressionContext::new();
    assert!(ctx.set_block_shift(Some(16)).is_err());
    assert!(ctx.set_block_shift(Some(15)).is_ok());
    assert!(ctx.set_block_shift(None).is_ok());
}

#[test]
fn test_corrupt_frames_rejected() {
    let src = patterned(4096, 4, 2);
    let mut dst = vec![0u8; bound(src.len())];
    let n = compress(&src, 4, &mut dst, 3).unwrap();
    let mut back = vec![0u8; src.len()];

    // Bad shift byte.
    let mut bad = dst[..n].to_vec();
    bad[0] = 17;
    assert!(decompress(&bad, 4, &mut back).is_err());

    // Bad strategy code.
    let mut bad = dst[..n].to_vec();
    bad[8] = 0xEE;
    assert!(decompress(&bad, 4, &mut back).is_err());

    // Truncations anywhere must error out, never panic.
    for cut in [0usize, 4, 8, n / 2, n - 1] {
        assert!(decompress(&dst[..cut], 4, &mut back).is_err());
    }
}

#[test]
fn test_frame_info_reports_header() {
    let src = patterned(300_000, 4, 1);
    let mut dst = vec![0u8; bound(src.len())];
    let n = compress(&src, 4, &mut dst, 5).unwrap();
    let (info, header_len) = frame_info(&dst[..n], 4).unwrap();
    assert_eq!(info.decompressed_size, src.len() as u64);
    assert_eq!(header_len, 8);
    assert!(info.superblock_size >= 4 * 256);

    let mut ctx = CompressionContext::new();
    ctx.set_block_shift(Some(2)).unwrap();
    let n = ctx.compress(&src, 4, &mut dst).unwrap();
    let (info, header_len) = frame_info(&dst[..n], 4).unwrap();
    assert_eq!(header_len, 12);
    assert_eq!(info.superblock_size, (4 * 256) << 2);
}

#[test]
fn test_custom_block_shift_roundtrip() {
    let src = patterned(50_000, 8, 1);
    let mut ctx = CompressionContext::new();
    ctx.set_level(2);
    ctx.set_block_shift(Some(1)).unwrap();
    let mut dst = vec![0u8; bound(src.len())];
    let n = ctx.compress(&src, 8, &mut dst).unwrap();

    let mut back = vec![0u8; src.len()];
    let m = decompress(&dst[..n], 8, &mut back).unwrap();
    assert_eq!(m, src.len());
    assert_eq!(back, src);
}

#[test]
fn test_level_zero_is_copy() {
    let src = patterned(10_000, 2, 3);
    let mut dst = vec![0u8; bound(src.len())];
    let n = compress(&src, 2, &mut dst, 0).unwrap();
    // Header + one record header + verbatim payload.
    assert_eq!(n, 8 + 4 + src.len());
    let mut back = vec![0u8; src.len()];
    decompress(&dst[..n], 2, &mut back).unwrap();
    assert_eq!(back, src);
}

#[test]
fn test_budgeted_compression_roundtrips() {
    let src = patterned(2_000_000, 4, 1);
    for &ns in &[1u64, 50_000, 10_000_000_000] {
        let mut ctx = CompressionContext::new();
        ctx.set_level(9);
        ctx.set_max_nanoseconds(ns);
        let mut dst = vec![0u8; bound(src.len())];
        let n = ctx.compress(&src, 4, &mut dst).unwrap();
        let mut back = vec![0u8; src.len()];
        let m = ctx.decompress(&dst[..n], 4, &mut back).unwrap();
        assert_eq!(m, src.len());
        assert_eq!(back, src);
    }
}

//==================================================================================
// Concrete scenarios
//==================================================================================

#[test]
fn test_scenario_all_same() {
    let src = vec![0x7Bu8; 1024];
    let mut dst = vec![0u8; bound(src.len())];
    let n = compress(&src, 1, &mut dst, 5).unwrap();
    assert!(n <= 32, "all-same input should collapse, got {}", n);
    let mut back = vec![0u8; src.len()];
    decompress(&dst[..n], 1, &mut back).unwrap();
    assert_eq!(back, src);
}

#[test]
fn test_scenario_sorted_u32() {
    let src: Vec<u8> = (0u32..65536).flat_map(|v| v.to_le_bytes()).collect();
    assert_eq!(src.len(), 262_144);
    let mut dst = vec![0u8; bound(src.len())];
    let n = compress(&src, 4, &mut dst, 3).unwrap();
    assert!(n < 8192, "sorted u32 should pack far below 8 KiB, got {}", n);
    let mut back = vec![0u8; src.len()];
    decompress(&dst[..n], 4, &mut back).unwrap();
    assert_eq!(back, src);
}

#[test]
fn test_scenario_random_u16_does_not_expand() {
    let mut rng = StdRng::seed_from_u64(3);
    let src: Vec<u8> = (0..1_048_576).map(|_| rng.gen()).collect();
    let mut dst = vec![0u8; bound(src.len())];
    let n = compress(&src, 2, &mut dst, 1).unwrap();
    // Only the frame and per-superblock headers may be added.
    assert!(n <= bound(src.len()), "random input must never expand past bound, got {}", n);
    let mut back = vec![0u8; src.len()];
    decompress(&dst[..n], 2, &mut back).unwrap();
    assert_eq!(back, src);
}

#[test]
fn test_scenario_partial_tail_block() {
    let n = 17 * 256 + 37;
    let src = patterned(n, 1, 3);
    let mut dst = vec![0u8; bound(n)];
    let c = compress(&src, 1, &mut dst, 9).unwrap();
    let mut back = vec![0u8; n];
    let m = decompress(&dst[..c], 1, &mut back).unwrap();
    assert_eq!(m, n);
    assert_eq!(back, src);
}
