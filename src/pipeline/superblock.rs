//! Per-superblock strategy selection.
//!
//! Each superblock is written as `strategy:u8 | payload_len:u24 | payload`.
//! The encoder weighs five candidates - the block coder alone, direct
//! entropy, entropy over the transposed input, entropy over transposed +
//! byte-delta input, and the block coder followed by entropy - using cheap
//! dry-run LZ ratio estimates as cost proxies, and falls back to a verbatim
//! copy whenever a candidate would expand the data or the time budget has
//! run dry. Whatever happens, a superblock never grows by more than the
//! 4-byte record header.

use crate::block::{block_compress, block_decompress};
use crate::error::StenosError;
use crate::kernels::delta::{delta, delta_inv};
use crate::kernels::entropy::{entropy_compress, entropy_decompress};
use crate::kernels::lzdry;
use crate::kernels::shuffle::{shuffle, unshuffle};
use crate::pipeline::budget::TimeBudget;
use crate::utils::{read_le_24, write_le_24};

pub(crate) const STRATEGY_BLOCK: u8 = 1;
pub(crate) const STRATEGY_ENTROPY: u8 = 2;
pub(crate) const STRATEGY_TRANSPOSED: u8 = 3;
pub(crate) const STRATEGY_TRANSPOSED_DELTA: u8 = 4;
pub(crate) const STRATEGY_BLOCK_ENTROPY: u8 = 5;
pub(crate) const STRATEGY_COPY: u8 = 6;

/// Shared parameters for one superblock encode.
pub(crate) struct SuperblockCtx<'a> {
    pub bpp: usize,
    pub level: i32,
    pub superblock_size: usize,
    pub budget: Option<&'a TimeBudget>,
}

#[inline]
fn write_record(dst: &mut [u8], code: u8, payload_len: usize) -> usize {
    dst[0] = code;
    write_le_24(&mut dst[1..], payload_len as u32);
    payload_len + 4
}

fn emit_copy(src: &[u8], dst: &mut [u8]) -> Result<usize, StenosError> {
    if dst.len() < src.len() + 4 {
        return Err(StenosError::DstOverflow);
    }
    dst[4..4 + src.len()].copy_from_slice(src);
    Ok(write_record(dst, STRATEGY_COPY, src.len()))
}

fn ensure_len(buf: &mut Vec<u8>, len: usize) -> Result<(), StenosError> {
    if buf.len() < len {
        buf.try_reserve(len - buf.len()).map_err(|_| StenosError::Alloc)?;
        buf.resize(len, 0);
    }
    Ok(())
}

/// Sample each transposed byte plane around its centre and estimate the LZ
/// ratio, optionally after a byte-delta pass.
fn guess_transposed_ratio(
    tr: &[u8],
    bpp: usize,
    glevel: i32,
    mut delta_buf: Option<&mut [u8]>,
) -> f64 {
    let elements = tr.len() / bpp;
    let div = (16 / (glevel - 1).max(1)).max(1) as usize;
    let stepsize = elements / div;
    if stepsize == 0 {
        return 0.0;
    }

    let mut csize = 0usize;
    let mut processed = 0usize;
    for i in 0..bpp {
        let off = i * elements + (elements - stepsize) / 2;
        let sample = &tr[off..off + stepsize];
        let estimated = match delta_buf {
            Some(ref mut buf) => {
                delta(sample, &mut buf[..stepsize]);
                lzdry::guess_size(&buf[..stepsize], 10 - glevel)
            }
            None => lzdry::guess_size(sample, 10 - glevel),
        };
        csize += estimated;
        processed += stepsize;
    }
    // Higher levels search harder, so scale the expectation accordingly.
    (processed as f64 / csize.max(1) as f64) * (1.0 + glevel as f64 * 0.02)
}

/// Compress one superblock into `dst`, returning the record length.
pub(crate) fn compress_superblock(
    cx: &SuperblockCtx,
    src: &[u8],
    dst: &mut [u8],
    buf1: &mut Vec<u8>,
    buf2: &mut Vec<u8>,
) -> Result<usize, StenosError> {
    let bytes = src.len();
    let bpp = cx.bpp;
    debug_assert_eq!(bytes % bpp, 0);

    if dst.len() < 4 {
        return Err(StenosError::DstOverflow);
    }

    let time_limited = cx.budget.is_some();
    let level = if time_limited { 9 } else { cx.level };

    if bytes == 0
        || cx.budget.map_or(false, |b| b.finish_memcpy())
        || (cx.level == 0 && !time_limited)
    {
        return emit_copy(src, dst);
    }
    if bytes < 128 {
        return emit_entropy(cx, src, dst, 0);
    }

    let mut entropy_lv: i32 = 0;
    if !time_limited {
        if bpp > 1 {
            if level < 2 {
                return emit_block(cx, src, dst);
            }
            // Level 4 of the collaborator brings little over 3; skip it.
            entropy_lv = level - 1;
            if entropy_lv >= 4 {
                entropy_lv += 1;
            }
        } else {
            entropy_lv = level;
        }
    }

    let mut glevel = level;
    let mut target_speed = 0.0f64;
    if let Some(b) = cx.budget {
        target_speed = b.requested_speed();
        glevel = match target_speed {
            s if s < 1.0e7 => 9,
            s if s < 4.0e7 => 8,
            s if s < 1.0e8 => 7,
            s if s < 2.0e8 => 6,
            s if s < 4.0e8 => 5,
            _ => 2,
        };
    }

    // 1.1 is high enough to discard the block coder on content with no
    // byte-level structure at all (text and the like).
    let mut lz_ratio = 1.1f64;
    let mut lz_tr = 0.0f64;
    let mut lz_trd = 0.0f64;

    if target_speed < 6.0e8 && bytes >= bpp * 256 {
        lz_ratio = lzdry::guess_ratio(&src[..bytes / 16], 10 - glevel);
    }
    if target_speed > 1.5e9 && bpp > 1 {
        // Very high speed requested: block coder only.
        return emit_block(cx, src, dst);
    }

    ensure_len(buf1, cx.superblock_size + 4)?;
    ensure_len(buf2, cx.superblock_size + 4)?;

    if bpp > 1 {
        shuffle(bpp, src, &mut buf1[..bytes]);

        if target_speed < 6.0e8 && bytes >= bpp * 256 && level > 2 {
            lz_tr = guess_transposed_ratio(&buf1[..bytes], bpp, glevel, None);
            lz_ratio = lz_ratio.max(lz_tr);
            lz_trd = guess_transposed_ratio(&buf1[..bytes], bpp, glevel, Some(&mut buf2[..bytes])) * 1.1;
            lz_ratio = lz_ratio.max(lz_trd);

            if target_speed < 2.0e6 && level == 9 {
                // Empirical bias: at the top level the entropy coder almost
                // always beats the block coder, so inflate its estimates.
                const TOP_LEVEL_BIAS: f64 = 1.6;
                lz_tr *= TOP_LEVEL_BIAS;
                lz_trd *= TOP_LEVEL_BIAS;
                lz_ratio *= TOP_LEVEL_BIAS;
            }
        }
    }

    let tick = cx.budget.map_or(0, |b| b.elapsed_ns());
    let shuffled = if bpp > 1 { Some(&buf1[..bytes]) } else { None };
    let attempt = block_compress(src, bpp, &mut buf2[..], cx.budget, Some(lz_ratio), shuffled);

    let cblock = match attempt {
        Ok(c) if c <= bytes => c,
        _ => {
            // Block coder lost; pick the best entropy flavour.
            log::trace!("block coder rejected (ratio {:.2}), falling back to entropy", lz_ratio);
            if lz_ratio > 1.4 {
                if lz_ratio == lz_tr {
                    return emit_transposed(cx, src, dst, buf1, entropy_lv);
                }
                if lz_ratio == lz_trd {
                    return emit_transposed_delta(cx, src, dst, buf1, buf2, entropy_lv);
                }
            }
            return emit_entropy(cx, src, dst, entropy_lv);
        }
    };

    if let Some(b) = cx.budget {
        // Decide whether there is time for an entropy pass on top.
        let elapsed = b.elapsed_ns();
        let block_elapsed = (elapsed - tick).max(1);
        let processed = b.processed() + cblock as u64;
        let global_speed = processed as f64 / (elapsed.max(1) as f64 * 1e-9);
        let current_speed = bytes as f64 / (block_elapsed as f64 * 1e-9);

        entropy_lv = 0;
        if global_speed > target_speed && current_speed > target_speed {
            let rate = (current_speed * target_speed) / (current_speed - target_speed);
            entropy_lv = b.clevel_for_remaining(processed, Some(rate as u64), 1);
        }
        if entropy_lv < 1 {
            return emit_raw_block(dst, &buf2[..cblock]);
        }
    }

    match entropy_compress(entropy_lv, &buf2[..cblock], &mut dst[4..]) {
        Ok(r) if r <= cblock => Ok(write_record(dst, STRATEGY_BLOCK_ENTROPY, r)),
        _ => emit_raw_block(dst, &buf2[..cblock]),
    }
}

fn emit_raw_block(dst: &mut [u8], stream: &[u8]) -> Result<usize, StenosError> {
    if dst.len() < stream.len() + 4 {
        return Err(StenosError::DstOverflow);
    }
    dst[4..4 + stream.len()].copy_from_slice(stream);
    Ok(write_record(dst, STRATEGY_BLOCK, stream.len()))
}

fn emit_block(cx: &SuperblockCtx, src: &[u8], dst: &mut [u8]) -> Result<usize, StenosError> {
    let room = dst.len() - 4;
    match block_compress(src, cx.bpp, &mut dst[4..4 + room], cx.budget, None, None) {
        Ok(r) if r <= src.len() => Ok(write_record(dst, STRATEGY_BLOCK, r)),
        _ => emit_copy(src, dst),
    }
}

fn emit_entropy(
    cx: &SuperblockCtx,
    src: &[u8],
    dst: &mut [u8],
    mut entropy_lv: i32,
) -> Result<usize, StenosError> {
    if let Some(b) = cx.budget {
        entropy_lv = b.clevel_for_remaining(b.processed(), None, 0);
        if entropy_lv <= 0 {
            return emit_copy(src, dst);
        }
    }
    match entropy_compress(entropy_lv, src, &mut dst[4..]) {
        Ok(r) if r <= src.len() => Ok(write_record(dst, STRATEGY_ENTROPY, r)),
        _ => emit_copy(src, dst),
    }
}

fn emit_transposed(
    cx: &SuperblockCtx,
    src: &[u8],
    dst: &mut [u8],
    buf1: &[u8],
    mut entropy_lv: i32,
) -> Result<usize, StenosError> {
    if let Some(b) = cx.budget {
        entropy_lv = b.clevel_for_remaining(b.processed(), None, 0);
        if entropy_lv <= 0 {
            return emit_copy(src, dst);
        }
    }
    match entropy_compress(entropy_lv, &buf1[..src.len()], &mut dst[4..]) {
        Ok(r) if r <= src.len() => Ok(write_record(dst, STRATEGY_TRANSPOSED, r)),
        _ => emit_copy(src, dst),
    }
}

fn emit_transposed_delta(
    cx: &SuperblockCtx,
    src: &[u8],
    dst: &mut [u8],
    buf1: &[u8],
    buf2: &mut [u8],
    mut entropy_lv: i32,
) -> Result<usize, StenosError> {
    if let Some(b) = cx.budget {
        entropy_lv = b.clevel_for_remaining(b.processed(), None, 0);
        if entropy_lv <= 0 {
            return emit_copy(src, dst);
        }
    }
    let bytes = src.len();
    delta(&buf1[..bytes], &mut buf2[..bytes]);
    match entropy_compress(entropy_lv, &buf2[..bytes], &mut dst[4..]) {
        Ok(r) if r <= bytes => Ok(write_record(dst, STRATEGY_TRANSPOSED_DELTA, r)),
        _ => emit_copy(src, dst),
    }
}

/// Decompress one superblock payload into `dst` (whose length is the
/// superblock's logical size).
pub(crate) fn decompress_superblock(
    code: u8,
    payload: &[u8],
    bpp: usize,
    superblock_size: usize,
    dst: &mut [u8],
    scratch: &mut Vec<u8>,
) -> Result<(), StenosError> {
    let dsize = dst.len();
    match code {
        STRATEGY_BLOCK => {
            block_decompress(payload, bpp, dsize, dst)?;
        }
        STRATEGY_ENTROPY => {
            let r = entropy_decompress(payload, dst)?;
            if r != dsize {
                return Err(StenosError::InvalidInput("entropy size mismatch"));
            }
        }
        STRATEGY_TRANSPOSED => {
            ensure_len(scratch, superblock_size + 4)?;
            let r = entropy_decompress(payload, &mut scratch[..dsize])?;
            if r != dsize {
                return Err(StenosError::InvalidInput("entropy size mismatch"));
            }
            unshuffle(bpp, &scratch[..dsize], dst);
        }
        STRATEGY_TRANSPOSED_DELTA => {
            ensure_len(scratch, superblock_size + 4)?;
            let r = entropy_decompress(payload, dst)?;
            if r != dsize {
                return Err(StenosError::InvalidInput("entropy size mismatch"));
            }
            delta_inv(dst, &mut scratch[..dsize]);
            unshuffle(bpp, &scratch[..dsize], dst);
        }
        STRATEGY_BLOCK_ENTROPY => {
            ensure_len(scratch, superblock_size + 4)?;
            let r = entropy_decompress(payload, &mut scratch[..])?;
            block_decompress(&scratch[..r], bpp, dsize, dst)?;
        }
        STRATEGY_COPY => {
            if payload.len() != dsize {
                return Err(StenosError::InvalidInput("copy size mismatch"));
            }
            dst.copy_from_slice(payload);
        }
        _ => return Err(StenosError::InvalidInput("strategy code")),
    }
    Ok(())
}
