//! Dry-run LZ4-style size estimator.
//!
//! The strategy selector needs a cheap proxy for "how well would a fast LZ
//! do on these bytes". This runs the classic hash-chain-free LZ4 greedy
//! parse in measurement mode: no output is produced, only the size the
//! output would have. The `acceleration` parameter widens the skip stride
//! exactly like the fast LZ4 entry points, so higher accelerations trade
//! estimate quality for speed.

const MINMATCH: usize = 4;
const MFLIMIT: usize = 12;
const LASTLITERALS: usize = 5;
const MIN_LENGTH: usize = MFLIMIT + 1;
const SKIP_TRIGGER: u32 = 6;
const RUN_MASK: usize = 15;
const ML_MASK: usize = 15;
const MAX_DISTANCE: usize = 65535;
const HASHLOG: u32 = 12;

#[inline]
fn read32(src: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([src[pos], src[pos + 1], src[pos + 2], src[pos + 3]])
}

#[inline]
fn hash32(seq: u32) -> usize {
    (seq.wrapping_mul(2654435761) >> (32 - HASHLOG)) as usize
}

#[inline]
fn match_len(src: &[u8], mut a: usize, mut b: usize, limit: usize) -> usize {
    let mut len = 0;
    while a < limit && src[a] == src[b] {
        a += 1;
        b += 1;
        len += 1;
    }
    len
}

/// Estimated compressed size of `src` under a fast LZ parse.
pub(crate) fn guess_size(src: &[u8], acceleration: i32) -> usize {
    let n = src.len();
    let mut count = 0usize;

    if n < MIN_LENGTH {
        return last_literals_size(n);
    }

    let accel = acceleration.max(1) as u32;
    let mflimit = n - MFLIMIT;
    let matchlimit = n - LASTLITERALS;
    let mut table = vec![0u32; 1 << HASHLOG];

    let mut ip = 0usize;
    let mut anchor = 0usize;
    table[hash32(read32(src, 0))] = 0;
    ip += 1;
    let mut forward_h = hash32(read32(src, ip));

    'outer: loop {
        // Find the next match, skipping faster the longer we fail.
        let mut m;
        {
            let mut forward_ip = ip;
            let mut step = 1usize;
            let mut search = accel << SKIP_TRIGGER;
            loop {
                let h = forward_h;
                ip = forward_ip;
                forward_ip += step;
                step = (search >> SKIP_TRIGGER) as usize;
                search += 1;

                if forward_ip > mflimit {
                    break 'outer;
                }
                m = table[h] as usize;
                forward_h = hash32(read32(src, forward_ip));
                table[h] = ip as u32;

                if m + MAX_DISTANCE >= ip && read32(src, m) == read32(src, ip) {
                    break;
                }
            }
        }

        // Catch up.
        while ip > anchor && m > 0 && src[ip - 1] == src[m - 1] {
            ip -= 1;
            m -= 1;
        }

        // Literal run: one token byte plus length extras plus the bytes.
        let lit = ip - anchor;
        count += 1;
        if lit >= RUN_MASK {
            count += 1 + (lit - RUN_MASK) / 256;
        }
        count += lit;

        loop {
            // Offset.
            count += 2;

            // Match length.
            let mut mc = match_len(src, ip + MINMATCH, m + MINMATCH, matchlimit);
            ip += MINMATCH + mc;
            if mc >= ML_MASK {
                mc -= ML_MASK;
                while mc >= 4 * 255 {
                    count += 4;
                    mc -= 4 * 255;
                }
                count += 1 + mc / 255;
            }

            anchor = ip;
            if ip > mflimit {
                break 'outer;
            }

            table[hash32(read32(src, ip - 2))] = (ip - 2) as u32;

            let h = hash32(read32(src, ip));
            let cand = table[h] as usize;
            table[h] = ip as u32;
            if cand + MAX_DISTANCE >= ip && read32(src, cand) == read32(src, ip) {
                // Back-to-back match: just the token.
                count += 1;
                m = cand;
                continue;
            }
            break;
        }

        ip += 1;
        forward_h = hash32(read32(src, ip));
    }

    count + last_literals_size(n - anchor)
}

#[inline]
fn last_literals_size(run: usize) -> usize {
    let header = if run >= RUN_MASK { 2 + (run - RUN_MASK) / 256 } else { 1 };
    header + run
}

/// Estimated compression ratio (input / estimated output).
pub(crate) fn guess_ratio(src: &[u8], acceleration: i32) -> f64 {
    src.len() as f64 / guess_size(src, acceleration).max(1) as f64
}

//==================================================================================
// Unit tests
//==================================================================================
