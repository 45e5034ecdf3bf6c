//! Wall-clock budget bookkeeping.
//!
//! A budgeted compression run carries one [`TimeBudget`] shared by every
//! worker. Two governors read it: [`TimeBudget::clevel_for_remaining`] maps
//! the byte rate still required onto an entropy level (0 means "finish the
//! frame with memcpy"), and [`BlockLevelGovernor`] steps the block coder
//! through its effort levels while a superblock is being coded.
//!
//! The budget is a soft target: it never interrupts an in-flight superblock,
//! it only changes what the encoder does next.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Estimated entropy-coder throughput per level, worst first. Rates are in
/// bytes per second; a required rate at or below an entry selects its level.
const COMPRESS_RATES: [(u64, i32); 9] = [
    (2_000_000, 9),
    (5_000_000, 8),
    (7_000_000, 7),
    (9_000_000, 6),
    (20_000_000, 5),
    (40_000_000, 4),
    (60_000_000, 3),
    (230_000_000, 2),
    (300_000_000, 1),
];

/// Assumed memcpy throughput, used to decide when even copying the rest of
/// the input would blow the budget: 16 bytes per nanosecond.
const MEMCPY_BYTES_PER_NS: u64 = 16;

fn level_for_rate(rate: u64, shift: u32) -> i32 {
    for &(r, level) in COMPRESS_RATES.iter() {
        if (r << shift) >= rate {
            return level;
        }
    }
    let top = (COMPRESS_RATES[8].0 << shift) as f64;
    if rate as f64 > top * 1.5 {
        0
    } else {
        1
    }
}

/// Shared state of one budgeted compression run.
pub(crate) struct TimeBudget {
    start: Instant,
    pub nanoseconds: u64,
    pub total_bytes: u64,
    processed: AtomicU64,
    finish_memcpy: AtomicBool,
}

impl TimeBudget {
    pub fn new(nanoseconds: u64, total_bytes: u64) -> Self {
        debug_assert!(nanoseconds > 0 && total_bytes > 0);
        TimeBudget {
            start: Instant::now(),
            nanoseconds,
            total_bytes,
            processed: AtomicU64::new(0),
            finish_memcpy: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn elapsed_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    #[inline]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn add_processed(&self, bytes: u64) {
        self.processed.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn finish_memcpy(&self) -> bool {
        self.finish_memcpy.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_finish_memcpy(&self) {
        self.finish_memcpy.store(true, Ordering::Relaxed);
    }

    /// Rate in bytes/second needed for the remaining input. Goes negative
    /// once the budget is overrun; the callers' comparisons then route to
    /// the slow-path levels and the memcpy cutoff catches the rest.
    pub fn requested_speed(&self) -> f64 {
        let remaining_s = (self.nanoseconds as f64 - self.elapsed_ns() as f64) * 1e-9;
        (self.total_bytes - self.processed()) as f64 / remaining_s
    }

    /// Entropy level for the remaining bytes given the time left.
    ///
    /// `target_rate` overrides the required-rate computation when the caller
    /// already knows the rate the entropy pass may consume; `shift` doubles
    /// the table rates per step for passes that run on pre-compressed data.
    pub fn clevel_for_remaining(&self, processed: u64, target_rate: Option<u64>, shift: u32) -> i32 {
        let elapsed = self.elapsed_ns();
        let remaining_bytes = self.total_bytes.saturating_sub(processed);

        if elapsed + remaining_bytes / MEMCPY_BYTES_PER_NS > self.nanoseconds {
            log::debug!("budget exhausted, finishing frame with memcpy");
            self.set_finish_memcpy();
            return 0;
        }

        let rate = target_rate.unwrap_or_else(|| {
            let remaining_s = (self.nanoseconds - elapsed) as f64 * 1e-9;
            (remaining_bytes as f64 / remaining_s) as u64
        });
        let mut clevel = level_for_rate(rate, shift);
        if processed == 0 {
            return clevel.max(1);
        }

        // Levels above 6 are only reachable through the advance bonus.
        clevel = clevel.min(6);

        let advance = processed as f64 / self.total_bytes as f64;
        let advance_time = elapsed as f64 / self.nanoseconds as f64;
        if advance > advance_time * 1.3 {
            clevel += 1 + (advance > advance_time * 1.6) as i32 + (advance > advance_time * 2.0) as i32;
        } else if advance < advance_time {
            clevel -= 1 + ((advance * 1.6) < advance_time) as i32;
        }

        if clevel < 1 && target_rate.is_none() {
            // Late in the run a small lead is enough to keep compressing.
            let factor = 0.5 + (1.0 - remaining_bytes as f64 / self.total_bytes as f64) * 0.5;
            if advance > advance_time * factor {
                clevel = 1;
            }
        }

        clevel
    }
}

/// Per-superblock governor for the block coder's effort level.
///
/// Returns 2 (full: RLE + LZ), 1 (RLE only), 0 (bit-pack only), -1 (copy
/// this block) or -2 (finish the whole frame with memcpy).
pub(crate) struct BlockLevelGovernor {
    denom_bytes: f64,
    denom_time: f64,
}

impl BlockLevelGovernor {
    pub fn new(budget: &TimeBudget) -> Self {
        BlockLevelGovernor {
            denom_bytes: 1.0 / budget.total_bytes as f64,
            denom_time: 1.0 / budget.nanoseconds as f64,
        }
    }

    pub fn level_for(&self, consumed: u64, budget: &TimeBudget) -> i32 {
        let threshold: f64 = if cfg!(debug_assertions) { 2.0e8 } else { 2.0e9 };

        let consumed = consumed + budget.processed();
        let remaining = budget.total_bytes.saturating_sub(consumed);
        let elapsed = budget.elapsed_ns();

        let ratio_bytes = consumed as f64 * self.denom_bytes;
        let ratio_time = elapsed as f64 * self.denom_time;

        if ratio_time < 0.2 {
            // Early on, stay at full effort as long as that looks realistic.
            let remaining_s = budget.nanoseconds.saturating_sub(elapsed) as f64 * 1e-9;
            if (remaining as f64 / remaining_s) < threshold {
                return 2;
            }
        }
        if ratio_time < 0.01 || consumed == 0 {
            return 2;
        }
        if ratio_time > 0.5 && elapsed + remaining / MEMCPY_BYTES_PER_NS > budget.nanoseconds {
            return -2;
        }
        if ratio_time > ratio_bytes * 3.0 {
            return -1;
        }
        if ratio_time > ratio_bytes * 1.8 {
            return 0;
        }
        if ratio_time > ratio_bytes * 1.4 {
            return 1;
        }
        2
    }
}

//==================================================================================
// Unit tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_table_is_monotone() {
        let mut prev = i32::MAX;
        for rate in [1u64, 3_000_000, 8_000_000, 50_000_000, 250_000_000, 299_000_000] {
            let level = level_for_rate(rate, 0);
            assert!(level <= prev, "level must fall as the required rate grows");
            prev = level;
        }
        // Hopeless rates mean memcpy.
        assert_eq!(level_for_rate(1_000_000_000, 0), 0);
        // The shift doubles every table entry.
        assert_eq!(level_for_rate(4_000_000, 1), 9);
    }

    #[test]
    fn test_expired_budget_forces_memcpy() {
        let b = TimeBudget::new(1, 1 << 20);
        assert_eq!(b.clevel_for_remaining(0, None, 0), 0);
        assert!(b.finish_memcpy());
    }

    #[test]
    fn test_fresh_budget_starts_compressing() {
        // A generous budget at the very start always compresses.
        let b = TimeBudget::new(u64::MAX / 2, 1 << 20);
        let level = b.clevel_for_remaining(0, None, 0);
        assert!(level >= 1);
        assert!(!b.finish_memcpy());
    }

    #[test]
    fn test_block_governor_full_effort_early() {
        let b = TimeBudget::new(u64::MAX / 2, 1 << 20);
        let gov = BlockLevelGovernor::new(&b);
        assert_eq!(gov.level_for(0, &b), 2);
    }
}
