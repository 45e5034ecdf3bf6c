//! Four-stream byte delta and its inverse.
//!
//! Inputs above 2048 bytes are split into four contiguous quarters so that a
//! vectorising compiler can run the four prefix sums of the inverse in
//! parallel lanes. Each stream stores its first byte verbatim followed by
//! wrapping byte differences. The bytes past `4 * (n / 4)` form a short tail
//! that both directions copy verbatim; encoder and decoder must agree on the
//! 2048 threshold and on the quarter boundaries, as the stream layout is part
//! of the wire contract.

const SINGLE_STREAM_MAX: usize = 2048;

/// Byte-delta `src` into `dst`. Both slices have the same length.
pub fn delta(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    let n = src.len();
    if n == 0 {
        return;
    }

    if n <= SINGLE_STREAM_MAX {
        delta_stream(src, dst);
        return;
    }

    let quarter = n / 4;
    for k in 0..4 {
        let start = k * quarter;
        delta_stream(&src[start..start + quarter], &mut dst[start..start + quarter]);
    }
    // Verbatim tail.
    dst[quarter * 4..].copy_from_slice(&src[quarter * 4..]);
}

/// Inverse of [`delta`]: per-stream prefix sum.
pub fn delta_inv(src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    let n = src.len();
    if n == 0 {
        return;
    }

    if n <= SINGLE_STREAM_MAX {
        delta_inv_stream(src, dst);
        return;
    }

    let quarter = n / 4;
    for k in 0..4 {
        let start = k * quarter;
        delta_inv_stream(&src[start..start + quarter], &mut dst[start..start + quarter]);
    }
    dst[quarter * 4..].copy_from_slice(&src[quarter * 4..]);
}

#[inline]
fn delta_stream(src: &[u8], dst: &mut [u8]) {
    dst[0] = src[0];
    for i in 1..src.len() {
        dst[i] = src[i].wrapping_sub(src[i - 1]);
    }
}

#[inline]
fn delta_inv_stream(src: &[u8], dst: &mut [u8]) {
    dst[0] = src[0];
    for i in 1..src.len() {
        dst[i] = dst[i - 1].wrapping_add(src[i]);
    }
}

//==================================================================================
// Unit tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(n: usize) {
        let src: Vec<u8> = (0..n).map(|i| (i * 7 + i / 3) as u8).collect();
        let mut enc = vec![0u8; n];
        let mut dec = vec![0u8; n];
        delta(&src, &mut enc);
        delta_inv(&enc, &mut dec);
        assert_eq!(dec, src, "delta roundtrip failed for n={}", n);
    }

    #[test]
    fn test_roundtrip_small() {
        for n in [0usize, 1, 2, 127, 2047, 2048] {
            roundtrip(n);
        }
    }

    #[test]
    fn test_roundtrip_four_streams() {
        // Above the threshold, including non-multiple-of-four tails.
        for n in [2049usize, 4096, 4097, 4098, 4099, 100_003] {
            roundtrip(n);
        }
    }

    #[test]
    fn test_single_stream_layout() {
        let src = [10u8, 13, 12, 255, 0];
        let mut enc = [0u8; 5];
        delta(&src, &mut enc);
        assert_eq!(enc, [10, 3, 0xFF, 0xF3, 1]);
    }

    #[test]
    fn test_tail_is_verbatim() {
        let n = 4003;
        let src: Vec<u8> = (0..n).map(|i| (i * 13) as u8).collect();
        let mut enc = vec![0u8; n];
        delta(&src, &mut enc);
        let tail = (n / 4) * 4;
        assert_eq!(&enc[tail..], &src[tail..]);
    }
}
