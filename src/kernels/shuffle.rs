//! Byte-transposition kernel: de/interleaves a `(n / bpp) x bpp` byte matrix
//! so that all bytes sharing a byte-position end up contiguous.
//!
//! This is the classic shuffle used by typed-byte compressors: after the
//! transpose, each "byte plane" carries the per-position redundancy that the
//! downstream coders exploit. The byte mapping is part of the wire contract
//! and must be identical across element widths and implementations:
//!
//! `dst[i * elements + j] = src[j * bpp + i]`
//!
//! Width-specialised paths exist for the common element sizes; the generic
//! loop produces the exact same mapping for every other width.

/// Transpose `src` (length a multiple of `bpp`) into `dst`.
///
/// The caller guarantees `src.len() % bpp == 0` and `dst.len() == src.len()`.
pub fn shuffle(bpp: usize, src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len() % bpp.max(1), 0);
    debug_assert_eq!(src.len(), dst.len());

    match bpp {
        0 | 1 => dst.copy_from_slice(src),
        2 => shuffle_fixed::<2>(src, dst),
        4 => shuffle_fixed::<4>(src, dst),
        8 => shuffle_fixed::<8>(src, dst),
        12 => shuffle_fixed::<12>(src, dst),
        16 => shuffle_fixed::<16>(src, dst),
        _ => shuffle_generic(bpp, src, dst),
    }
}

/// Exact inverse of [`shuffle`]. Same contract.
pub fn unshuffle(bpp: usize, src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len() % bpp.max(1), 0);
    debug_assert_eq!(src.len(), dst.len());

    match bpp {
        0 | 1 => dst.copy_from_slice(src),
        2 => unshuffle_fixed::<2>(src, dst),
        4 => unshuffle_fixed::<4>(src, dst),
        8 => unshuffle_fixed::<8>(src, dst),
        12 => unshuffle_fixed::<12>(src, dst),
        16 => unshuffle_fixed::<16>(src, dst),
        _ => unshuffle_generic(bpp, src, dst),
    }
}

// The const-generic variants let the compiler unroll the inner loop and
// vectorise the strided accesses for the widths that dominate real payloads.

fn shuffle_fixed<const B: usize>(src: &[u8], dst: &mut [u8]) {
    let elements = src.len() / B;
    for (j, elem) in src.chunks_exact(B).enumerate() {
        for i in 0..B {
            dst[i * elements + j] = elem[i];
        }
    }
}

fn unshuffle_fixed<const B: usize>(src: &[u8], dst: &mut [u8]) {
    let elements = src.len() / B;
    for (j, elem) in dst.chunks_exact_mut(B).enumerate() {
        for i in 0..B {
            elem[i] = src[i * elements + j];
        }
    }
}

fn shuffle_generic(bpp: usize, src: &[u8], dst: &mut [u8]) {
    let elements = src.len() / bpp;
    for i in 0..bpp {
        let plane = &mut dst[i * elements..(i + 1) * elements];
        for (j, out) in plane.iter_mut().enumerate() {
            *out = src[j * bpp + i];
        }
    }
}

fn unshuffle_generic(bpp: usize, src: &[u8], dst: &mut [u8]) {
    let elements = src.len() / bpp;
    for i in 0..bpp {
        let plane = &src[i * elements..(i + 1) * elements];
        for (j, &b) in plane.iter().enumerate() {
            dst[j * bpp + i] = b;
        }
    }
}

//==================================================================================
// Unit tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_mapping_u16() {
        // Elements 0x0102, 0x0304, 0x0506 stored little-endian.
        let src = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05];
        let mut dst = [0u8; 6];
        shuffle(2, &src, &mut dst);
        assert_eq!(dst, [0x02, 0x04, 0x06, 0x01, 0x03, 0x05]);

        let mut back = [0u8; 6];
        unshuffle(2, &dst, &mut back);
        assert_eq!(back, src);
    }

    #[test]
    fn test_shuffle_single_byte_is_copy() {
        let src = [1u8, 2, 3, 4, 5];
        let mut dst = [0u8; 5];
        shuffle(1, &src, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_roundtrip_all_widths() {
        for bpp in 1..=48usize {
            let n = bpp * 37;
            let src: Vec<u8> = (0..n).map(|i| (i * 31 + bpp) as u8).collect();
            let mut tr = vec![0u8; n];
            let mut back = vec![0u8; n];
            shuffle(bpp, &src, &mut tr);
            unshuffle(bpp, &tr, &mut back);
            assert_eq!(back, src, "roundtrip failed for bpp={}", bpp);
        }
    }

    #[test]
    fn test_fixed_paths_match_generic() {
        for &bpp in &[2usize, 4, 8, 12, 16] {
            let n = bpp * 300;
            let src: Vec<u8> = (0..n).map(|i| (i.wrapping_mul(2654435761)) as u8).collect();
            let mut fast = vec![0u8; n];
            let mut slow = vec![0u8; n];
            shuffle(bpp, &src, &mut fast);
            shuffle_generic(bpp, &src, &mut slow);
            assert_eq!(fast, slow, "specialised path diverges for bpp={}", bpp);
        }
    }
}
