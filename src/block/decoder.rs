//! Block decoder: the inverse of the encoder, dispatching on the kind
//! prefix and the block-scope markers. Planes decode flat into a scratch
//! tile which is un-transposed back into element order.

use super::{
    kind_prefix_len, KIND_ALL_RAW, KIND_ALL_SAME, KIND_NORMAL, KIND_NORMAL_RLE, MARKER_COPY,
    MARKER_LZ, MARKER_PARTIAL,
};
use crate::block::rows::{read_16, read_masked};
use crate::error::StenosError;
use crate::kernels::lz;
use crate::kernels::shuffle::unshuffle;
use crate::utils::Reader;

/// Decompress a block stream of `bytes` logical bytes into `dst`.
/// Returns the number of source bytes consumed.
pub(crate) fn block_decompress(
    src: &[u8],
    bpp: usize,
    bytes: usize,
    dst: &mut [u8],
) -> Result<usize, StenosError> {
    if bytes == 0 || src.is_empty() {
        return if bytes == 0 { Ok(0) } else { Err(StenosError::SrcOverflow) };
    }
    debug_assert!(dst.len() >= bytes);

    let block_size = bpp * 256;
    let block_count = bytes / block_size;
    let prefix_len = kind_prefix_len(bpp);

    let mut plane_buf: Vec<u8> = Vec::new();
    plane_buf.try_reserve(block_size).map_err(|_| StenosError::Alloc)?;
    plane_buf.resize(block_size, 0);

    let mut r = Reader::new(src);

    for b in 0..block_count {
        let out_block = &mut dst[b * block_size..][..block_size];

        if r.remaining() == 0 {
            return Err(StenosError::SrcOverflow);
        }
        let first = r.tail()[0];

        if first == MARKER_COPY {
            r.skip(1)?;
            out_block.copy_from_slice(r.get_slice(block_size)?);
            continue;
        }
        if first == MARKER_LZ {
            r.skip(1)?;
            let consumed = lz::decompress_block(r.tail(), bpp, out_block)
                .ok_or(StenosError::InvalidInput("lz block"))?;
            r.skip(consumed)?;
            continue;
        }

        let prefix = r.get_slice(prefix_len)?;
        for i in 0..bpp {
            let kind = (prefix[i / 2] >> (4 * (i % 2))) & 0xF;
            let plane = &mut plane_buf[i * 256..i * 256 + 256];
            match kind {
                KIND_ALL_SAME => plane.fill(r.get_u8()?),
                KIND_ALL_RAW => plane.copy_from_slice(r.get_slice(256)?),
                KIND_NORMAL => decode_plane(&mut r, plane, 16, false)?,
                KIND_NORMAL_RLE => decode_plane(&mut r, plane, 16, true)?,
                _ => return Err(StenosError::InvalidInput("plane kind")),
            }
        }
        unshuffle(bpp, &plane_buf, out_block);
    }

    let rem = bytes - block_count * block_size;
    if rem > 0 {
        if r.get_u8()? != MARKER_PARTIAL {
            return Err(StenosError::InvalidInput("partial marker"));
        }
        decode_partial(&mut r, bpp, &mut dst[block_count * block_size..][..rem], &mut plane_buf)?;
    }

    Ok(r.pos())
}

/// Decode the partial tail: per-plane rows at element stride, then the
/// verbatim residue.
fn decode_partial(
    r: &mut Reader,
    bpp: usize,
    out: &mut [u8],
    plane_buf: &mut [u8],
) -> Result<(), StenosError> {
    let line_size = 16 * bpp;
    let lines = out.len() / line_size;

    if lines > 0 {
        let prefix = r.get_slice(kind_prefix_len(bpp))?;
        for i in 0..bpp {
            let kind = (prefix[i / 2] >> (4 * (i % 2))) & 0xF;
            let plane = &mut plane_buf[i * 256..i * 256 + 256];
            match kind {
                KIND_ALL_SAME => plane[..lines * 16].fill(r.get_u8()?),
                KIND_NORMAL => decode_plane(r, plane, lines, false)?,
                _ => return Err(StenosError::InvalidInput("partial plane kind")),
            }
        }
        // Scatter the decoded plane bytes back to element order.
        for i in 0..bpp {
            let plane = &plane_buf[i * 256..];
            for j in 0..lines * 16 {
                out[j * bpp + i] = plane[j];
            }
        }
    }

    let residue = out.len() - lines * line_size;
    out[lines * line_size..].copy_from_slice(r.get_slice(residue)?);
    Ok(())
}

/// Decode `lines` rows of one plane into its flat tile.
fn decode_plane(
    r: &mut Reader,
    plane: &mut [u8],
    lines: usize,
    rle_mins: bool,
) -> Result<(), StenosError> {
    let hdr = r.get_slice(lines / 2 + (lines & 1))?;
    let mut headers = [0u8; 16];
    for x in 0..lines {
        headers[x] = (hdr[x / 2] >> (4 * (x % 2))) & 0xF;
    }

    let mut mins = [0u8; 16];
    if rle_mins {
        mins = read_masked(r, 0)?;
    } else {
        for x in 0..lines {
            if !matches!(headers[x], 6 | 7 | 15) {
                mins[x] = r.get_u8()?;
            }
        }
    }

    for x in 0..lines {
        let carry = if x == 0 { 0 } else { plane[x * 16 - 1] };
        let out = &mut plane[x * 16..x * 16 + 16];
        match headers[x] {
            15 => out.copy_from_slice(r.get_slice(16)?),
            7 => out.copy_from_slice(&read_masked(r, carry)?),
            6 => {
                let d = read_masked(r, 0)?;
                let mut prev = carry;
                for j in 0..16 {
                    prev = prev.wrapping_add(d[j]);
                    out[j] = prev;
                }
            }
            0 => out.fill(mins[x]),
            h @ 1..=5 => {
                let v = read_16(r, h)?;
                let min = mins[x];
                for j in 0..16 {
                    out[j] = v[j].wrapping_add(min);
                }
            }
            h => {
                // Delta rows: prefix sum of unpacked deltas plus the row
                // minimum, carried across the row boundary.
                let bits = h - 8;
                let min = mins[x];
                let v = if bits > 0 { read_16(r, bits)? } else { [0u8; 16] };
                let mut prev = carry;
                for j in 0..16 {
                    prev = prev.wrapping_add(v[j]).wrapping_add(min);
                    out[j] = prev;
                }
            }
        }
    }
    Ok(())
}
