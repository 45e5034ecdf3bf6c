//! Frame codec: splits the input into superblocks, runs the strategy
//! selector over them (in parallel waves when more than one worker is
//! configured), and writes the frame header and superblock records.
//!
//! Frame layout, all integers little-endian:
//!
//! ```text
//! shift : u8              0..=4, or 255 for an explicit superblock size
//! decompressed_len : u56
//! [ superblock_bytes : u32 ]   present iff shift == 255
//! records...                   strategy:u8 | len:u24 | payload
//! ```
//!
//! The wave layout makes the output byte-identical for any worker count:
//! workers compress into private scratch buffers and the results are
//! concatenated in superblock order.

use crate::context::CompressionContext;
use crate::error::StenosError;
use crate::pipeline::budget::TimeBudget;
use crate::pipeline::superblock::{compress_superblock, decompress_superblock, SuperblockCtx};
use crate::utils::{read_le_24, read_le_32, read_le_56, write_le_32, write_le_56};
use crate::{DEFAULT_SUPERBLOCK_SIZE, MAX_BYTES_OF_TYPE, MAX_SUPERBLOCK_BYTES};

/// Smallest legal superblock across all element widths, used by [`bound`].
const MIN_SUPERBLOCK: usize = 65792;

/// Upper bound on the compressed size of `bytes` input bytes.
pub fn bound(bytes: usize) -> usize {
    let count = bytes / MIN_SUPERBLOCK + (bytes % MIN_SUPERBLOCK != 0) as usize;
    12 + count.max(1) * 4 + bytes
}

/// Frame-level information, readable from the first 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub decompressed_size: u64,
    pub superblock_size: usize,
}

/// Parse the frame header of `src`. Returns the info and the header length.
pub fn frame_info(src: &[u8], bpp: usize) -> Result<(FrameInfo, usize), StenosError> {
    if bpp == 0 || bpp >= MAX_BYTES_OF_TYPE {
        return Err(StenosError::InvalidBytesOfType(bpp));
    }
    if src.len() < 8 {
        return Err(StenosError::SrcOverflow);
    }
    let shift = src[0];
    if shift > 4 && shift != 255 {
        return Err(StenosError::InvalidInput("shift byte"));
    }
    let decompressed_size = read_le_56(&src[1..]);

    let (superblock_size, header_len) = if shift == 255 {
        if src.len() < 12 {
            return Err(StenosError::SrcOverflow);
        }
        (read_le_32(&src[8..]) as usize, 12)
    } else {
        (superblock_size_for(bpp * 256) << shift, 8)
    };

    Ok((FrameInfo { decompressed_size, superblock_size }, header_len))
}

/// Default superblock size for a given block size (`bpp * 256`): the largest
/// block multiple at or under 128 KiB, or one block when that is bigger.
pub(crate) fn superblock_size_for(block_size: usize) -> usize {
    if block_size > DEFAULT_SUPERBLOCK_SIZE {
        block_size
    } else {
        (DEFAULT_SUPERBLOCK_SIZE / block_size) * block_size
    }
}

/// Derive the superblock size and shift byte for this compression call and
/// initialise the time budget if one is configured.
fn prepare(
    ctx: &mut CompressionContext,
    bpp: usize,
    bytes: usize,
) -> Result<(usize, u8, Option<TimeBudget>), StenosError> {
    if bpp == 0 || bpp >= MAX_BYTES_OF_TYPE {
        return Err(StenosError::InvalidBytesOfType(bpp));
    }
    if bytes % bpp != 0 {
        return Err(StenosError::InvalidParameter("input is not a whole number of elements"));
    }
    let block_size = bpp * 256;

    let (superblock_size, shift) = if ctx.max_nanoseconds > 0 {
        // Budget path: aim for threads * 32 superblocks so the level
        // governor gets enough adjustment points. Overrides a custom shift.
        let wanted = bytes / (ctx.threads.max(1) * 32);
        let block_count = (wanted / block_size).max(1);
        let mut size = block_size * block_count;
        let mut shift = 255u8;
        if size >= MAX_SUPERBLOCK_BYTES {
            size = superblock_size_for(block_size);
            if bytes > size {
                shift = 4;
                size <<= 4;
            }
        } else if size < DEFAULT_SUPERBLOCK_SIZE {
            size = superblock_size_for(block_size);
        }
        (size, shift)
    } else if let Some(k) = ctx.custom_shift {
        (block_size << k, 255u8)
    } else {
        let mut size = superblock_size_for(block_size);
        let mut shift = 0u8;
        if bytes > size {
            shift = if ctx.level > 0 { ((ctx.level - 1) / 2) as u8 } else { 0 };
            size <<= shift;
        }
        (size, shift)
    };

    if superblock_size < block_size || superblock_size >= MAX_SUPERBLOCK_BYTES {
        return Err(StenosError::InvalidParameter("superblock size"));
    }
    ctx.set_superblock_size(superblock_size);
    log::trace!("superblock size {} (shift byte {})", superblock_size, shift);

    let budget = (ctx.max_nanoseconds > 0 && bytes > 0)
        .then(|| TimeBudget::new(ctx.max_nanoseconds, bytes as u64));
    Ok((superblock_size, shift, budget))
}

pub(crate) fn compress(
    ctx: &mut CompressionContext,
    src: &[u8],
    bpp: usize,
    dst: &mut [u8],
) -> Result<usize, StenosError> {
    let bytes = src.len();
    let (sbs, shift, budget) = prepare(ctx, bpp, bytes)?;

    // Frame header.
    let mut pos = if shift == 255 { 12 } else { 8 };
    if dst.len() < pos {
        return Err(StenosError::DstOverflow);
    }
    dst[0] = shift;
    write_le_56(&mut dst[1..], bytes as u64);
    if shift == 255 {
        write_le_32(&mut dst[8..], sbs as u32);
    }
    if bytes == 0 {
        return Ok(pos);
    }

    let sb_count = bytes / sbs + (bytes % sbs != 0) as usize;
    let workers = ctx.threads.min(sb_count).max(1);
    let cx = SuperblockCtx { bpp, level: ctx.level, superblock_size: sbs, budget: budget.as_ref() };

    if workers <= 1 {
        ctx.ensure_scratch(1);
        let scratch = &mut ctx.scratch[0];
        for i in 0..sb_count {
            let start = i * sbs;
            let input = &src[start..(start + sbs).min(bytes)];
            let produced =
                compress_superblock(&cx, input, &mut dst[pos..], &mut scratch.buf1, &mut scratch.buf2)?;
            if let Some(b) = &budget {
                b.add_processed(input.len() as u64);
            }
            pos += produced;
        }
        return Ok(pos);
    }

    ctx.ensure_scratch(workers);
    let mut next = 0usize;
    while next < sb_count {
        let wave = workers.min(sb_count - next);

        std::thread::scope(|scope| {
            for (k, scratch) in ctx.scratch[..wave].iter_mut().enumerate() {
                let start = (next + k) * sbs;
                let input = &src[start..(start + sbs).min(bytes)];
                let cx = &cx;
                let budget = budget.as_ref();
                scope.spawn(move || {
                    if scratch.out.len() < sbs + 4 {
                        scratch.out.resize(sbs + 4, 0);
                    }
                    let r = compress_superblock(
                        cx,
                        input,
                        &mut scratch.out[..],
                        &mut scratch.buf1,
                        &mut scratch.buf2,
                    );
                    if r.is_ok() {
                        if let Some(b) = budget {
                            b.add_processed(input.len() as u64);
                        }
                    }
                    scratch.result = r;
                });
            }
        });

        for scratch in &ctx.scratch[..wave] {
            let produced = scratch.result.clone()?;
            let end = pos + produced;
            if end > dst.len() {
                return Err(StenosError::DstOverflow);
            }
            dst[pos..end].copy_from_slice(&scratch.out[..produced]);
            pos = end;
        }
        next += wave;
    }
    Ok(pos)
}

pub(crate) fn decompress(
    ctx: &mut CompressionContext,
    src: &[u8],
    bpp: usize,
    dst: &mut [u8],
) -> Result<usize, StenosError> {
    let (info, header_len) = frame_info(src, bpp)?;

    if info.decompressed_size > dst.len() as u64 {
        return Err(StenosError::DstOverflow);
    }
    let decompressed = info.decompressed_size as usize;
    if decompressed == 0 {
        return Ok(0);
    }

    let sbs = info.superblock_size;
    if sbs < bpp * 256 || sbs >= MAX_SUPERBLOCK_BYTES {
        return Err(StenosError::InvalidInput("superblock size"));
    }
    ctx.set_superblock_size(sbs);

    let rem = decompressed % sbs;
    let sb_count = decompressed / sbs + (rem != 0) as usize;
    let workers = ctx.threads.min(sb_count).max(1);

    let mut spos = header_len;
    let mut produced = 0usize;

    if workers <= 1 {
        ctx.ensure_scratch(1);
        let scratch = &mut ctx.scratch[0];
        for i in 0..sb_count {
            let (code, payload, dsize) =
                read_record(src, &mut spos, sbs, rem, i, sb_count, decompressed - produced)?;
            decompress_superblock(
                code,
                payload,
                bpp,
                sbs,
                &mut dst[produced..produced + dsize],
                &mut scratch.buf1,
            )?;
            produced += dsize;
        }
        return Ok(decompressed);
    }

    ctx.ensure_scratch(workers);
    let mut dst_rest = &mut dst[..decompressed];
    let mut index = 0usize;
    while index < sb_count {
        let wave = workers.min(sb_count - index);

        // Carve this wave's disjoint output windows before going parallel.
        let mut jobs: Vec<(u8, &[u8], &mut [u8])> = Vec::with_capacity(wave);
        for k in 0..wave {
            let (code, payload, dsize) = read_record(
                src,
                &mut spos,
                sbs,
                rem,
                index + k,
                sb_count,
                dst_rest.len(),
            )?;
            let (window, rest) = std::mem::take(&mut dst_rest).split_at_mut(dsize);
            dst_rest = rest;
            produced += dsize;
            jobs.push((code, payload, window));
        }

        std::thread::scope(|scope| {
            for (job, scratch) in jobs.into_iter().zip(ctx.scratch[..wave].iter_mut()) {
                scope.spawn(move || {
                    let (code, payload, window) = job;
                    scratch.result =
                        decompress_superblock(code, payload, bpp, sbs, window, &mut scratch.buf1)
                            .map(|_| 0);
                });
            }
        });
        for scratch in &ctx.scratch[..wave] {
            scratch.result.clone()?;
        }
        index += wave;
    }

    if produced != decompressed {
        return Err(StenosError::InvalidInput("frame length mismatch"));
    }
    Ok(decompressed)
}

/// Read one superblock record header and slice out its payload.
fn read_record<'a>(
    src: &'a [u8],
    spos: &mut usize,
    sbs: usize,
    rem: usize,
    index: usize,
    sb_count: usize,
    dst_remaining: usize,
) -> Result<(u8, &'a [u8], usize), StenosError> {
    if *spos + 4 > src.len() {
        return Err(StenosError::SrcOverflow);
    }
    let code = src[*spos];
    let csize = read_le_24(&src[*spos + 1..]) as usize;
    *spos += 4;

    let dsize = if index == sb_count - 1 && rem != 0 { rem } else { sbs };
    if *spos + csize > src.len() || dsize > dst_remaining {
        return Err(StenosError::InvalidInput("record out of bounds"));
    }
    let payload = &src[*spos..*spos + csize];
    *spos += csize;
    Ok((code, payload, dsize))
}

//==================================================================================
// Private single-superblock entry points used by the compressed vector
//==================================================================================

/// Compress one chunk as a standalone superblock record.
pub(crate) fn compress_chunk(
    ctx: &mut CompressionContext,
    src: &[u8],
    bpp: usize,
    superblock_size: usize,
    dst: &mut [u8],
) -> Result<usize, StenosError> {
    ctx.set_superblock_size(superblock_size);
    ctx.ensure_scratch(1);
    let cx = SuperblockCtx { bpp, level: ctx.level, superblock_size, budget: None };
    let scratch = &mut ctx.scratch[0];
    compress_superblock(&cx, src, dst, &mut scratch.buf1, &mut scratch.buf2)
}

/// Decompress one standalone superblock record into `dst` (sized to the
/// chunk's logical bytes). Returns the decompressed length.
pub(crate) fn decompress_chunk(
    ctx: &mut CompressionContext,
    record: &[u8],
    bpp: usize,
    superblock_size: usize,
    dst: &mut [u8],
) -> Result<usize, StenosError> {
    let (code, csize) = record_header(record)?;
    if 4 + csize > record.len() {
        return Err(StenosError::InvalidInput("chunk record length"));
    }
    ctx.set_superblock_size(superblock_size);
    ctx.ensure_scratch(1);
    decompress_superblock(
        code,
        &record[4..4 + csize],
        bpp,
        superblock_size,
        dst,
        &mut ctx.scratch[0].buf1,
    )?;
    Ok(dst.len())
}

/// Total length of the superblock record starting at `record`.
pub(crate) fn record_len(record: &[u8]) -> Result<usize, StenosError> {
    record_header(record).map(|(_, csize)| csize + 4)
}

fn record_header(record: &[u8]) -> Result<(u8, usize), StenosError> {
    if record.len() < 4 {
        return Err(StenosError::SrcOverflow);
    }
    Ok((record[0], read_le_24(&record[1..]) as usize))
}
