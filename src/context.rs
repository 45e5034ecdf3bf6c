//! Compression/decompression context: the single source of truth for level,
//! worker count, wall-clock budget and superblock sizing, plus the reusable
//! per-worker scratch buffers.
//!
//! Contexts are cheap to create but worth reusing: scratch buffers survive
//! between calls as long as the superblock size does not change.

use crate::error::StenosError;
use crate::pipeline::frame;

/// Custom superblock shifts of 16 or more are impossible: for the smallest
/// element width they would already reach the maximum superblock size.
const MAX_BLOCK_SHIFT: u32 = 16;

/// Per-worker scratch: two staging buffers for the strategy selector and an
/// output area for the parallel waves.
pub(crate) struct WorkerScratch {
    pub buf1: Vec<u8>,
    pub buf2: Vec<u8>,
    pub out: Vec<u8>,
    pub result: Result<usize, StenosError>,
}

impl Default for WorkerScratch {
    fn default() -> Self {
        WorkerScratch { buf1: Vec::new(), buf2: Vec::new(), out: Vec::new(), result: Ok(0) }
    }
}

/// Reusable compression/decompression context.
///
/// Defaults: level 1, one thread, no time budget, derived superblock size.
pub struct CompressionContext {
    pub(crate) level: i32,
    pub(crate) threads: usize,
    pub(crate) max_nanoseconds: u64,
    pub(crate) custom_shift: Option<u32>,
    pub(crate) superblock_size: usize,
    pub(crate) scratch: Vec<WorkerScratch>,
}

impl Default for CompressionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionContext {
    pub fn new() -> Self {
        CompressionContext {
            level: 1,
            threads: 1,
            max_nanoseconds: 0,
            custom_shift: None,
            superblock_size: 0,
            scratch: Vec::new(),
        }
    }

    /// Restore the default parameters, keeping allocated scratch.
    pub fn reset(&mut self) {
        self.level = 1;
        self.threads = 1;
        self.max_nanoseconds = 0;
        self.custom_shift = None;
    }

    /// Compression level, clamped to 0 (memcpy) ..= 9 (maximum).
    pub fn set_level(&mut self, level: i32) -> &mut Self {
        self.level = level.clamp(0, 9);
        self
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Worker count hint, clamped to at least one.
    pub fn set_threads(&mut self, threads: usize) -> &mut Self {
        self.threads = threads.max(1);
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Soft wall-clock budget for compression; 0 disables it. The encoder
    /// continually adapts its level to the remaining time and falls back to
    /// plain copies when even that would overrun.
    pub fn set_max_nanoseconds(&mut self, nanoseconds: u64) -> &mut Self {
        self.max_nanoseconds = nanoseconds;
        self
    }

    /// Custom superblock size, expressed as a shift: the superblock becomes
    /// `bpp * 256 << shift`. `None` restores the derived sizing. Required to
    /// interoperate with [`crate::cvec::CompressedVec`] serialization.
    pub fn set_block_shift(&mut self, shift: Option<u32>) -> Result<&mut Self, StenosError> {
        if let Some(k) = shift {
            if k >= MAX_BLOCK_SHIFT {
                return Err(StenosError::InvalidParameter("block shift"));
            }
        }
        self.custom_shift = shift;
        Ok(self)
    }

    /// Compress `src` (elements of `bpp` bytes) into `dst`, returning the
    /// frame length. `dst` should hold at least [`crate::bound`]`(src.len())`
    /// bytes to be safe for incompressible input.
    pub fn compress(&mut self, src: &[u8], bpp: usize, dst: &mut [u8]) -> Result<usize, StenosError> {
        frame::compress(self, src, bpp, dst)
    }

    /// Decompress a frame produced with the same `bpp`. Returns the
    /// decompressed length.
    pub fn decompress(&mut self, src: &[u8], bpp: usize, dst: &mut [u8]) -> Result<usize, StenosError> {
        frame::decompress(self, src, bpp, dst)
    }

    pub(crate) fn ensure_scratch(&mut self, workers: usize) {
        if self.scratch.len() < workers {
            self.scratch.resize_with(workers, Default::default);
        }
    }

    pub(crate) fn set_superblock_size(&mut self, superblock_size: usize) {
        if self.superblock_size != superblock_size {
            self.superblock_size = superblock_size;
            self.scratch.clear();
        }
    }
}
