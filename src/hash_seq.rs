//! Per-position window hashes, built level by level.
//!
//! # Scope
//! The bucket grouper needs, for every eligible start position, a
//! bounded-width hash of the fixed-size window beginning there. Hashing each
//! window from scratch costs `O(seq * unit)`; instead the unit length is
//! factorized and the hash sequence is built bottom-up: the smallest factor
//! is hashed directly, then each level sums `factor` consecutive lower-level
//! hashes. Total cost is `O(seq * (smallest factor + number of levels))`,
//! and the 16-bit width bounds the bucket table regardless of unit length.
//!
//! # Invariants
//! - `out[pos] == 0` exactly when no window of the unit length may start at
//!   `pos` (it would cross a delimiter or run off the block).
//! - A real hash of `0` is remapped to `1` so it can never be mistaken for
//!   the ineligible marker.
//! - Each delimiter-framed block is processed independently; blocks shorter
//!   than the unit stay all-zero.
//!
//! The hash only sees the *kind* of a parameter occurrence (everything
//! negative contributes as open), so consistently-renamed windows land in
//! the same bucket; exact, window-relative comparison happens later.

use crate::token_seq::{Token, DELIMITER, PARAM_OPEN};

/// Bounded hash value. `0` is reserved for "no window starts here".
pub type HashValue = u16;

/// Hash of one token window. Implementations must map every parameter
/// occurrence (any negative token) to the same contribution, or bucketing
/// breaks for renamed clones.
pub trait WindowHash: Sync {
    fn window_hash(&self, seq: &[Token], begin: usize, end: usize) -> HashValue;
}

/// Default window hash: wrapping sum of squared token codes, with all
/// parameter occurrences contributing as open.
pub struct TokenSquareHash;

impl WindowHash for TokenSquareHash {
    fn window_hash(&self, seq: &[Token], begin: usize, end: usize) -> HashValue {
        let mut value: HashValue = 0;
        for &token in &seq[begin..end] {
            let token = if token <= PARAM_OPEN { PARAM_OPEN } else { token };
            value = value.wrapping_add(token.wrapping_mul(token) as HashValue);
        }
        value
    }
}

/// Decomposes `n` into integer factors, smallest first.
///
/// Any decomposition works; smaller bottom factors make the direct hashing
/// level cheaper.
pub fn factorize(n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut number = n;
    while number > 1 {
        let mut divisor = 0;
        let mut i = 2;
        while i <= number / 2 {
            if number % i == 0 {
                divisor = i;
                break;
            }
            i += 1;
        }
        if divisor == 0 {
            factors.push(number);
            return factors;
        }
        factors.push(divisor);
        number /= divisor;
    }
    factors
}

/// Fills `out` with the per-position hash of the `unit_len` window starting
/// there, `0` marking ineligible positions.
///
/// `out` is resized to `seq.len()`; callers reserve capacity up front if
/// allocation failures must be surfaced.
pub fn compute_hash_seq(
    seq: &[Token],
    unit_len: usize,
    hash: &dyn WindowHash,
    out: &mut Vec<HashValue>,
) {
    debug_assert!(unit_len >= 1);
    out.clear();
    out.resize(seq.len(), 0);
    if seq.is_empty() {
        return;
    }
    debug_assert_eq!(seq[0], DELIMITER);
    debug_assert_eq!(*seq.last().unwrap(), DELIMITER);

    let mut factors = factorize(unit_len);
    if factors.is_empty() {
        factors.push(unit_len);
    }

    let mut begin = 0;
    while begin + 1 < seq.len() {
        let next = begin
            + 1
            + seq[begin + 1..]
                .iter()
                .position(|&t| t == DELIMITER)
                .expect("sequence must be delimiter-framed");
        let end = next + 1;
        // Blocks shorter than the unit cannot hold a window; their hash
        // slots stay zero-filled.
        if end - begin >= unit_len {
            let mut level = factors.len() - 1;
            let bottom = factors[level];
            bottom_level(seq, hash, out, bottom, begin, end);
            let mut current_unit = bottom;
            while level > 0 {
                level -= 1;
                let factor = factors[level];
                combine_level(out, current_unit, factor, begin, end);
                current_unit *= factor;
            }
            debug_assert_eq!(current_unit, unit_len);
        }
        begin = next;
    }
}

/// Hashes every `unit_len` window inside one delimiter-framed block
/// directly, zero-filling the tail that cannot start a full window.
fn bottom_level(
    seq: &[Token],
    hash: &dyn WindowHash,
    out: &mut [HashValue],
    unit_len: usize,
    begin: usize,
    end: usize,
) {
    debug_assert_eq!(seq[begin], DELIMITER);
    debug_assert_eq!(seq[end - 1], DELIMITER);
    debug_assert!(unit_len >= 1);

    let mut i = begin + 1;
    if end - begin >= unit_len {
        while i + unit_len < end {
            let value = hash.window_hash(seq, i, i + unit_len);
            out[i] = if value == 0 { 1 } else { value };
            i += 1;
        }
    }
    for slot in &mut out[i..end] {
        *slot = 0;
    }
}

/// Combines `multiply` consecutive `unit_len`-level hashes into the next
/// level, re-zeroing the tail that would cross the block end.
fn combine_level(
    out: &mut [HashValue],
    unit_len: usize,
    multiply: usize,
    begin: usize,
    end: usize,
) {
    debug_assert_eq!(out[begin], 0);
    debug_assert_eq!(out[end - 1], 0);
    debug_assert!(unit_len >= 1);

    let span = unit_len * multiply;
    let mut i = begin + 1;
    while i + span < end {
        let mut value: HashValue = 0;
        for j in 0..multiply {
            // The summed slot is at most `end - unit_len - 1`, inside the
            // nonzero region left by the previous level.
            let h = out[i + j * unit_len];
            debug_assert_ne!(h, 0);
            value = value.wrapping_add(h);
        }
        out[i] = if value == 0 { 1 } else { value };
        i += 1;
    }
    for slot in &mut out[end - span..end] {
        *slot = 0;
    }
}
