//! Block encoder: analyses planes, emits the cheapest coding per row, and
//! hands whole blocks to the LZ pass or to raw copies when that wins.

use super::analysis::{analyze_plane, PlaneAnalysis};
use super::rows::{delta_row, write_16, write_masked};
use super::{
    kind_prefix_len, KIND_ALL_RAW, KIND_ALL_SAME, KIND_NORMAL_RLE, MARKER_COPY, MARKER_LZ,
    MARKER_PARTIAL,
};
use crate::error::StenosError;
use crate::kernels::lz;
use crate::kernels::shuffle::shuffle;
use crate::pipeline::budget::{BlockLevelGovernor, TimeBudget};
use crate::utils::Writer;

/// ALL_RAW demotion slack per block level: a plane whose coded size exceeds
/// `256 - slack` is stored raw instead.
const RAW_SLACK: [u32; 3] = [25, 16, 0];

/// Compress `src` (one superblock, a multiple of `bpp` bytes) into `dst`.
///
/// `target_ratio` is the minimum acceptable compression ratio; once a
/// sixteenth of the input has been coded the encoder gives up with
/// `DstOverflow` if it is running below that ratio, and the caller falls
/// back to an entropy strategy. `shuffled` optionally points at a
/// pre-transposed image of the full superblock so blocks are not
/// re-transposed here.
pub(crate) fn block_compress(
    src: &[u8],
    bpp: usize,
    dst: &mut [u8],
    budget: Option<&TimeBudget>,
    mut target_ratio: Option<f64>,
    shuffled: Option<&[u8]>,
) -> Result<usize, StenosError> {
    let bytes = src.len();
    if bytes == 0 {
        return Ok(0);
    }

    let block_size = bpp * 256;
    let block_count = bytes / block_size;
    let prefix_len = kind_prefix_len(bpp);
    let elements = bytes / bpp;

    let mut level: i32 = 2;
    let governor = budget.map(BlockLevelGovernor::new);

    let mut analyses: Vec<PlaneAnalysis> = Vec::new();
    analyses.try_reserve(bpp).map_err(|_| StenosError::Alloc)?;
    analyses.resize_with(bpp, Default::default);

    // Local transpose scratch, only needed without a pre-shuffled image.
    let mut planes: Vec<u8> = Vec::new();
    if shuffled.is_none() {
        planes.try_reserve(block_size).map_err(|_| StenosError::Alloc)?;
        planes.resize(block_size, 0);
    }

    let mut w = Writer::new(dst);

    for bcount in 0..block_count {
        let block_src = &src[bcount * block_size..][..block_size];

        'block: {
            if let (Some(b), Some(gov)) = (budget, &governor) {
                if level != -2 {
                    let consumed = (bcount * block_size) as u64;
                    if consumed >= bytes as u64 / 16 {
                        level = gov.level_for(consumed, b);
                    }
                }
                if level < 0 {
                    // Out of time: copy this block.
                    w.put_u8(MARKER_COPY)?;
                    w.put_slice(block_src)?;
                    if level == -2 {
                        b.set_finish_memcpy();
                    }
                    break 'block;
                }
            }

            let with_rle = level >= 1;
            let target = 256 - RAW_SLACK[level as usize];

            if shuffled.is_none() {
                shuffle(bpp, block_src, &mut planes);
            }

            let mut full_size = 0u32;
            for i in 0..bpp {
                let plane = plane_of(shuffled, &planes, elements, bcount, i);
                let mut a = analyze_plane(plane, block_src[i], with_rle);
                if a.kind != KIND_ALL_SAME && a.total > target {
                    a.kind = KIND_ALL_RAW;
                    a.total = 256;
                }
                full_size += a.total;
                analyses[i] = a;
            }

            // Hand the block to the LZ pass when the row coder is predicted
            // to stay under a 3x ratio.
            if level == 2 && lz::lz_supported(bpp) && full_size * 3 > block_size as u32 {
                if w.remaining() > 1 {
                    let produced = {
                        let tail = w.tail_mut();
                        tail[0] = MARKER_LZ;
                        lz::compress_block(block_src, bpp, &mut tail[1..], full_size as usize)
                    };
                    if let Some(p) = produced {
                        w.advance(1 + p);
                        break 'block;
                    }
                }
            }

            let prefix_at = w.reserve(prefix_len)?;
            for i in 0..bpp {
                let a = &analyses[i];
                let plane = plane_of(shuffled, &planes, elements, bcount, i);
                match a.kind {
                    KIND_ALL_RAW => w.put_slice(plane)?,
                    _ => encode_plane(&mut w, plane, block_src[i], a, 16)?,
                }
                w.or_u8(prefix_at + i / 2, a.kind << (4 * (i % 2)));
            }
        }

        // Ratio gate: once a sixteenth of the input is coded, bail out if
        // the caller's LZ estimate already beats us.
        if let Some(t) = target_ratio {
            let processed = (bcount + 1) * block_size;
            if processed >= bytes / 16 {
                let ratio = processed as f64 / w.pos().max(1) as f64;
                if ratio < t && level >= 0 {
                    return Err(StenosError::DstOverflow);
                }
                target_ratio = None;
            }
        }
    }

    let tail = &src[block_count * block_size..];
    if !tail.is_empty() {
        w.put_u8(MARKER_PARTIAL)?;
        encode_partial(&mut w, tail, bpp)?;
    }

    Ok(w.pos())
}

/// One byte plane of a block, either out of the pre-transposed superblock
/// image or out of the per-block transpose scratch.
#[inline]
fn plane_of<'a>(
    shuffled: Option<&'a [u8]>,
    local: &'a [u8],
    elements: usize,
    bcount: usize,
    i: usize,
) -> &'a [u8] {
    match shuffled {
        Some(image) => &image[i * elements + bcount * 256..][..256],
        None => &local[i * 256..][..256],
    }
}

/// Emit one plane: headers, minima (plain or run-length coded), then rows.
/// `lines` is 16 for full blocks and lower for the partial tail.
fn encode_plane(
    w: &mut Writer,
    plane: &[u8],
    first: u8,
    a: &PlaneAnalysis,
    lines: usize,
) -> Result<(), StenosError> {
    if a.kind == KIND_ALL_SAME {
        return w.put_u8(first);
    }

    let hdr_at = w.reserve(lines / 2 + (lines & 1))?;
    for r in 0..lines {
        w.or_u8(hdr_at + r / 2, (a.headers[r] & 0xF) << (4 * (r % 2)));
    }

    if a.kind == KIND_NORMAL_RLE {
        write_masked(w, a.mins_rle_mask, &a.mins)?;
    } else {
        for r in 0..lines {
            if !matches!(a.headers[r], 6 | 7 | 15) {
                w.put_u8(a.mins[r])?;
            }
        }
    }

    for r in 0..lines {
        let row = &plane[r * 16..r * 16 + 16];
        let carry = if r == 0 { 0 } else { plane[r * 16 - 1] };
        match a.headers[r] {
            15 => w.put_slice(row)?,
            7 => write_masked(w, a.rle_masks[r], row)?,
            6 => write_masked(w, a.delta_rle_masks[r], &delta_row(row, carry))?,
            h @ 0..=5 => {
                if h > 0 {
                    let min = a.mins[r];
                    let packed: [u8; 16] = std::array::from_fn(|j| row[j].wrapping_sub(min));
                    write_16(w, &packed, h)?;
                }
            }
            h => {
                let bits = h - 8;
                if bits > 0 {
                    let min = a.mins[r];
                    let d = delta_row(row, carry);
                    let packed: [u8; 16] = std::array::from_fn(|j| d[j].wrapping_sub(min));
                    write_16(w, &packed, bits)?;
                }
            }
        }
    }
    Ok(())
}

/// Encode the sub-block tail: whole 16-element lines go through the row
/// coder on a padded copy, the residue is copied verbatim.
fn encode_partial(w: &mut Writer, tail: &[u8], bpp: usize) -> Result<(), StenosError> {
    let line_size = 16 * bpp;
    let lines = tail.len() / line_size;

    if lines > 0 {
        let block_size = 256 * bpp;
        let mut scratch: Vec<u8> = Vec::new();
        scratch.try_reserve(2 * block_size).map_err(|_| StenosError::Alloc)?;
        scratch.resize(2 * block_size, 0);
        let (padded, planes) = scratch.split_at_mut(block_size);

        padded[..tail.len()].copy_from_slice(tail);
        padded[tail.len()..].fill(tail[tail.len() - 1]);
        shuffle(bpp, padded, planes);

        let prefix_at = w.reserve(kind_prefix_len(bpp))?;
        for i in 0..bpp {
            let plane = &planes[i * 256..][..256];
            // No RLE modes on the tail; analysis still covers the padding,
            // which only matters for the all-same collapse.
            let a = analyze_plane(plane, padded[i], false);
            encode_plane(w, plane, padded[i], &a, lines)?;
            w.or_u8(prefix_at + i / 2, a.kind << (4 * (i % 2)));
        }
    }

    w.put_slice(&tail[lines * line_size..])
}
