//! Recursive extension of equal-content runs into maximal clone sets.
//!
//! # Scope
//! A bucket delivers start positions sharing one window hash. This module
//! confirms equal content, grows each confirmed run to its maximal common
//! right extension, emits a clone set there, and recursively re-partitions
//! by the next token to find every maximal branch. It is a lazy walk of the
//! implicit longest-common-extension tree: confirmed prefixes are never
//! rescanned and only branches with at least two surviving occurrences are
//! explored.
//!
//! # Invariants
//! - A run whose members all share the same nonzero, non-open left context
//!   is a strict suffix of a match discoverable one position to the left and
//!   is skipped (the longer match reports it).
//! - Emission happens at `base + max_extend` only; every recursion step
//!   strictly grows the length, so the walk terminates at delimiters.
//! - Runs handed to [`emit_clone_set`] are sorted by (left context, right
//!   extension), making group partitioning a linear scan.

use super::compare::{
    cmp_content_prev, cmp_ext_prev, cmp_prev_ext, extension_at, prev_of, windows_equal,
};
use crate::pairs::{CloneGroup, CloneSet};
use crate::scope::Scope;
use crate::token_seq::{Token, DELIMITER, PARAM_OPEN};

/// Per-fragment accept gate consulted once per candidate clone set, with a
/// representative window. Runs on worker threads.
pub type AcceptGate = dyn Fn(&[Token], usize, usize) -> bool + Send + Sync;

/// Processes one hash bucket: confirm equal-content runs, then extend each.
pub(crate) fn process_bucket(
    seq: &[Token],
    unit_len: usize,
    scope: Scope,
    gate: Option<&AcceptGate>,
    positions: &mut [usize],
    out: &mut Vec<CloneSet>,
) {
    if positions.len() <= 1 {
        return;
    }
    positions.sort_unstable_by(|&a, &b| cmp_content_prev(seq, unit_len, a, b));

    let mut j = 0;
    while j < positions.len() {
        let mut k = j + 1;
        while k < positions.len() && windows_equal(seq, positions[k], positions[j], unit_len) {
            k += 1;
        }
        // Hash collisions die here: only true equal-content runs survive.
        if k - j >= 2 {
            extend_run(seq, &mut positions[j..k], unit_len, scope, gate, out);
        }
        j = k;
    }
}

/// Extends one equal-content run to its maximal length and emits it, then
/// recurses into its right-extension branches.
///
/// The run must arrive sorted with a left-context tiebreak so the
/// suffix-suppression check can compare first against last.
fn extend_run(
    seq: &[Token],
    run: &mut [usize],
    base_len: usize,
    scope: Scope,
    gate: Option<&AcceptGate>,
    out: &mut Vec<CloneSet>,
) {
    debug_assert!(run.len() >= 2);

    let first_prev = prev_of(seq, run[0], base_len);
    let last_prev = prev_of(seq, *run.last().unwrap(), base_len);
    if first_prev != DELIMITER && first_prev != PARAM_OPEN && first_prev == last_prev {
        // Strict suffix of a match starting one token to the left; that
        // match reports these occurrences.
        return;
    }

    let len = base_len + max_extend(seq, run, base_len);
    run.sort_unstable_by(|&a, &b| cmp_prev_ext(seq, len, a, b));
    emit_clone_set(seq, run, len, scope, gate, out);
    refine(seq, run, len, scope, gate, out);
}

/// Re-partitions a maximal run by the token one past its length and walks
/// each branch that still has two or more occurrences.
fn refine(
    seq: &[Token],
    run: &mut [usize],
    base_len: usize,
    scope: Scope,
    gate: Option<&AcceptGate>,
    out: &mut Vec<CloneSet>,
) {
    if run.len() <= 1 {
        return;
    }
    run.sort_unstable_by(|&a, &b| cmp_ext_prev(seq, base_len, a, b));

    let mut j = 0;
    while j < run.len() {
        let ext = extension_at(seq, run[j], base_len);
        let mut k = j + 1;
        while k < run.len() && extension_at(seq, run[k], base_len) == ext {
            k += 1;
        }
        if ext != DELIMITER && k - j >= 2 {
            extend_run(seq, &mut run[j..k], base_len, scope, gate, out);
        }
        j = k;
    }
}

/// Largest `e` such that the compared value at `pos + base_len + e` agrees
/// across the whole run and is not a delimiter.
fn max_extend(seq: &[Token], run: &[usize], base_len: usize) -> usize {
    debug_assert!(run.len() >= 2);
    let mut extend = 0;
    loop {
        let lead = extension_at(seq, run[0], base_len + extend);
        if lead == DELIMITER {
            return extend;
        }
        for &pos in &run[1..] {
            if extension_at(seq, pos, base_len + extend) != lead {
                return extend;
            }
        }
        extend += 1;
    }
}

/// Partitions an accepted run into `(prev, extension)` groups and queues the
/// clone set, subject to the accept gate and the scope's set-level filter.
fn emit_clone_set(
    seq: &[Token],
    run: &[usize],
    len: usize,
    scope: Scope,
    gate: Option<&AcceptGate>,
    out: &mut Vec<CloneSet>,
) {
    if run.is_empty() {
        return;
    }
    if let Some(gate) = gate {
        if !gate(seq, run[0], len) {
            return;
        }
    }

    let mut groups = Vec::new();
    let mut p = 0;
    while p < run.len() {
        let prev = prev_of(seq, run[p], len);
        let mut q = p + 1;
        while q < run.len() && prev_of(seq, run[q], len) == prev {
            q += 1;
        }
        let mut i = p;
        while i < q {
            let extension = extension_at(seq, run[i], len);
            let mut j = i + 1;
            while j < q && extension_at(seq, run[j], len) == extension {
                j += 1;
            }
            groups.push(CloneGroup {
                prev,
                extension,
                positions: run[i..j].to_vec(),
            });
            i = j;
        }
        p = q;
    }

    if scope.admits_set(&groups) {
        out.push(CloneSet { groups, len });
    }
}
