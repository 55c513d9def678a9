//! Clone sets and their expansion into non-redundant clone pairs.
//!
//! A clone set is a group of mutually-equal occurrences of the same content
//! at one length, partitioned by immediate left-context token (`prev`) and
//! immediate right-extension token (`extension`). The partition is what
//! makes non-redundant pair expansion possible: two occurrences sharing the
//! same nonzero context on a side are both interior to a strictly longer
//! match on that side, which is reported separately.

use crate::scope::Scope;
use crate::token_seq::{Token, DELIMITER};

/// One partition of a clone set: occurrences sharing the same left-context
/// and right-extension tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloneGroup {
    /// Left-context value (window-relative; `0` at a file boundary).
    pub prev: Token,
    /// Right-extension value (`0` when the match abuts a file boundary).
    pub extension: Token,
    /// Window start offsets, ascending within the group's sort order.
    pub positions: Vec<usize>,
}

/// A maximal group of matching occurrences at one length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloneSet {
    pub groups: Vec<CloneGroup>,
    /// Extended match length shared by every occurrence.
    pub len: usize,
}

impl CloneSet {
    /// Total number of occurrences across all groups.
    pub fn occurrences(&self) -> usize {
        self.groups.iter().map(|g| g.positions.len()).sum()
    }
}

/// Receives emitted clone sets, in ID order, on the consumer thread.
pub trait SetSink {
    fn clone_set(&mut self, seq: &[Token], set: &CloneSet, set_id: u64);
}

/// Receives expanded clone pairs. `pos_a < pos_b` always holds.
pub trait PairSink {
    fn clone_pair(&mut self, pos_a: usize, pos_b: usize, len: usize, set_id: u64);
}

/// Expands each clone set into the pairwise occurrences it licenses.
///
/// For groups `cs` and `right` (including `cs == right`), pairs are emitted
/// iff `(cs.prev == 0 || cs.prev != right.prev) && (cs.extension == 0 ||
/// cs.extension != right.extension)`: a shared nonzero context on either
/// side means every such pair sits strictly inside a longer reported match.
/// A zero context is a file boundary and never suppresses emission. The
/// scope's pair-level filter is applied here as well.
pub struct PairExpander<'a, P: PairSink> {
    scope: Scope,
    sink: &'a mut P,
}

impl<'a, P: PairSink> PairExpander<'a, P> {
    pub fn new(scope: Scope, sink: &'a mut P) -> Self {
        Self { scope, sink }
    }
}

impl<P: PairSink> SetSink for PairExpander<'_, P> {
    fn clone_set(&mut self, _seq: &[Token], set: &CloneSet, set_id: u64) {
        for (ci, cs) in set.groups.iter().enumerate() {
            for (cj, right) in set.groups.iter().enumerate().skip(ci) {
                let prev_ok = cs.prev == DELIMITER || cs.prev != right.prev;
                let ext_ok = cs.extension == DELIMITER || cs.extension != right.extension;
                if !(prev_ok && ext_ok) {
                    continue;
                }
                let intra = ci == cj;
                for (ai, &a) in cs.positions.iter().enumerate() {
                    let partners = if intra {
                        &right.positions[ai + 1..]
                    } else {
                        &right.positions[..]
                    };
                    for &b in partners {
                        debug_assert_ne!(a, b);
                        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                        if self.scope.admits_pair(lo, hi) {
                            self.sink.clone_pair(lo, hi, set.len, set_id);
                        }
                    }
                }
            }
        }
    }
}
