//! Per-plane cost analysis.
//!
//! For each of the 16 rows of a plane the encoder weighs four codings and
//! keeps the cheapest:
//!
//! - literal bit-packing (header 0..=5, or 15 for a raw 8-bit row),
//! - delta bit-packing against the left neighbour with carry (header 8..=14,
//!   8-bit deltas also coded as 15),
//! - run-length (header 7),
//! - run-length over the byte deltas (header 6).
//!
//! Headers 6, 7 and 15 carry no stored minimum, which is what makes them
//! reserved: literal widths skip 6 and 7 (rounded up to 8), delta widths
//! skip 7. Row minima are taken in signed byte order so that values
//! straddling the 0x7F/0x80 boundary still yield a narrow range.

use super::rows::{delta_row, rle_mask};
use super::{KIND_ALL_SAME, KIND_NORMAL, KIND_NORMAL_RLE};

/// Everything the encoder needs to emit one plane.
#[derive(Default, Clone)]
pub(crate) struct PlaneAnalysis {
    pub headers: [u8; 16],
    pub mins: [u8; 16],
    pub rle_masks: [u16; 16],
    pub delta_rle_masks: [u16; 16],
    pub mins_rle_mask: u16,
    pub kind: u8,
    /// Payload size of the plane under this analysis (kind prefix excluded).
    pub total: u32,
}

#[inline]
fn bit_width(range: u8) -> u8 {
    8 - range.leading_zeros() as u8
}

#[inline]
fn signed_range(bytes: &[u8]) -> u8 {
    let mut min = bytes[0] as i8;
    let mut max = min;
    for &b in &bytes[1..] {
        min = min.min(b as i8);
        max = max.max(b as i8);
    }
    (max as u8).wrapping_sub(min as u8)
}

#[inline]
fn signed_min(bytes: &[u8]) -> u8 {
    bytes.iter().map(|&b| b as i8).min().unwrap_or(0) as u8
}

/// Analyse one 256-byte plane. `first` is the plane's byte of the block's
/// first element; `with_rle` enables the two run-length row modes.
pub(crate) fn analyze_plane(plane: &[u8], first: u8, with_rle: bool) -> PlaneAnalysis {
    debug_assert_eq!(plane.len(), 256);

    let mut a = PlaneAnalysis { kind: KIND_NORMAL, ..Default::default() };

    if plane.iter().all(|&b| b == first) {
        a.kind = KIND_ALL_SAME;
        a.total = 1;
        return a;
    }

    let mut total = 0u32;
    for r in 0..16 {
        let row = &plane[r * 16..r * 16 + 16];
        let carry = if r == 0 { 0 } else { plane[r * 16 - 1] };

        // Literal: widths 6 and 7 are rounded to 8 (headers reserved).
        let mut bits_lit = bit_width(signed_range(row));
        if bits_lit >= 6 {
            bits_lit = 8;
        }

        // Delta: width 7 is rounded to 8.
        let d = delta_row(row, carry);
        let mut bits_del = bit_width(signed_range(&d));
        if bits_del == 7 {
            bits_del = 8;
        }

        let use_delta = bits_del < bits_lit;
        let bits = bits_lit.min(bits_del);
        a.mins[r] = if use_delta { signed_min(&d) } else { signed_min(row) };

        let mut size = 2 * bits as u32 + (bits != 8) as u32;
        let mut header = if use_delta {
            if bits_del == 8 {
                15
            } else {
                8 + bits_del
            }
        } else if bits_lit == 8 {
            15
        } else {
            bits_lit
        };

        if with_rle {
            let (mask, count) = rle_mask(row, carry);
            a.rle_masks[r] = mask;
            if (count as u32 + 2) < size {
                header = 7;
                size = count as u32 + 2;
            }

            let (dmask, dcount) = rle_mask(&d, 0);
            a.delta_rle_masks[r] = dmask;
            if (dcount as u32 + 2) < size {
                header = 6;
                size = dcount as u32 + 2;
            }
        }

        a.headers[r] = header;
        total += size;
    }

    // 8 bytes of packed row headers.
    a.total = total + 8;

    if with_rle {
        // Rows coded as RLE, delta-RLE or raw store no minimum; if the
        // remaining min column run-length-codes smaller than storing it
        // plain, switch the plane to NORMAL_RLE.
        let stored = (0..16).filter(|&r| !matches!(a.headers[r], 6 | 7 | 15)).count() as u32;
        let (mmask, mcount) = rle_mask(&a.mins, 0);
        a.mins_rle_mask = mmask;
        if (mcount as u32 + 2) < stored {
            a.kind = KIND_NORMAL_RLE;
            a.total -= stored - (mcount as u32 + 2);
        }
    }

    a
}

//==================================================================================
// Unit tests
//==================================================================================
