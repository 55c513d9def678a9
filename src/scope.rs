//! Scan scope: restricting which clone sets and pairs are observable.
//!
//! The chunk orchestrator compares "new chunk vs. everything seen so far"
//! by splitting the position space at a barrier offset. Positions below the
//! barrier are "left" (already scanned), positions at or above it are
//! "right" (newly appended). The scope is applied twice: a cheap set-level
//! pre-filter inside the workers, and an exact pair-level filter during
//! expansion. Without it, pairs entirely inside already-scanned regions
//! would be re-reported on every later chunk.

use crate::pairs::CloneGroup;

/// Which matches a scan may observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Everything.
    All,
    /// Pairs with at least one member left of the barrier.
    LeftAndCross { barrier: usize },
    /// Only pairs straddling the barrier.
    Cross { barrier: usize },
}

impl Scope {
    /// Set-level pre-filter: can any pair from this clone set survive the
    /// pair-level filter?
    pub fn admits_set(&self, groups: &[CloneGroup]) -> bool {
        match *self {
            Scope::All => true,
            Scope::LeftAndCross { barrier } => groups
                .iter()
                .any(|g| g.positions.iter().any(|&p| p < barrier)),
            Scope::Cross { barrier } => {
                let mut left = false;
                let mut right = false;
                for group in groups {
                    for &pos in &group.positions {
                        if pos < barrier {
                            left = true;
                        } else {
                            right = true;
                        }
                        if left && right {
                            return true;
                        }
                    }
                }
                false
            }
        }
    }

    /// Pair-level filter. `a < b` is required.
    pub fn admits_pair(&self, a: usize, b: usize) -> bool {
        debug_assert!(a < b);
        match *self {
            Scope::All => true,
            Scope::LeftAndCross { barrier } => a < barrier,
            Scope::Cross { barrier } => a < barrier && b >= barrier,
        }
    }
}
