//! Public configuration, input, and statistics types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default minimum clone length, in tokens.
pub const DEFAULT_MIN_LEN: usize = 50;

/// Default chunk budget, in tokens. `0` means unbounded (whole corpus in
/// memory, single scan).
pub const DEFAULT_CHUNK_LEN: usize = 60 * 1024 * 1024;

/// Default cap on the probe unit length.
///
/// Probing shorter than the minimum clone length keeps the hash tables
/// small; the cap at 25 with `multiply = min_len / 25` is a tuning
/// heuristic, not a derived constant, which is why it is a config field.
pub const DEFAULT_BOTTOM_UNIT_LEN: usize = 25;

/// One input file: caller-assigned ID, group ID, and tokenizer path.
#[derive(Clone, Debug)]
pub struct InputFile {
    pub id: i32,
    pub group: i32,
    pub path: PathBuf,
}

impl InputFile {
    pub fn new(id: i32, group: i32, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            group,
            path: path.into(),
        }
    }
}

/// Which file relations may produce reported pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMask {
    /// Pairs with both occurrences in one file.
    pub within_file: bool,
    /// Pairs across two files of the same group.
    pub between_files: bool,
    /// Pairs across two files of different groups.
    pub between_groups: bool,
}

impl RelationMask {
    pub const ALL: RelationMask = RelationMask {
        within_file: true,
        between_files: true,
        between_groups: true,
    };

    pub fn is_empty(&self) -> bool {
        !(self.within_file || self.between_files || self.between_groups)
    }

    /// True when pairs never leave a single file, so every file can be
    /// scanned alone.
    pub fn within_file_only(&self) -> bool {
        !(self.between_files || self.between_groups)
    }

    /// Decides whether a pair between the files at `left` and `right`
    /// (indices into the scan's file table) is reportable.
    pub fn admits(&self, left: usize, right: usize, groups: &[i32]) -> bool {
        let same_file = left == right;
        let same_group = groups[left] == groups[right];
        match (self.within_file, self.between_files, self.between_groups) {
            (false, false, false) => false,
            (true, false, false) => same_file,
            (false, true, false) => !same_file && same_group,
            (true, true, false) => same_group,
            (false, false, true) => !same_group,
            (true, false, true) => same_file || !same_group,
            (false, true, true) => !same_file,
            (true, true, true) => true,
        }
    }
}

impl Default for RelationMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Engine configuration. Plain data; the optional accept gate is attached
/// to the runtime separately.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectConfig {
    /// Minimum reported clone length, in tokens.
    pub min_len: usize,
    /// Bucket worker count.
    pub workers: usize,
    /// Chunk budget in tokens; `0` = unbounded.
    pub chunk_len: usize,
    /// Enabled file relations.
    pub relations: RelationMask,
    /// Cap on the probe unit length.
    pub bottom_unit_len: usize,
    /// When false, renamed identifiers match as bare wildcards instead of
    /// consistently-renamed parameters.
    pub parameter_unification: bool,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_LEN,
            workers: 1,
            chunk_len: DEFAULT_CHUNK_LEN,
            relations: RelationMask::ALL,
            bottom_unit_len: DEFAULT_BOTTOM_UNIT_LEN,
            parameter_unification: true,
        }
    }
}

impl DetectConfig {
    /// Splits the minimum length into `(bottom_unit_len, multiply)` for the
    /// detector: the probe unit is capped at `bottom_unit_len`, and whole
    /// multiples of it approach the minimum length from below.
    pub fn unit_split(&self) -> (usize, usize) {
        let cap = self.bottom_unit_len.max(1);
        let min_len = self.min_len.max(1);
        if min_len < cap {
            (min_len, 1)
        } else {
            (cap, min_len / cap)
        }
    }
}

/// Summary counters for one detection run. All counters are populated
/// unconditionally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectStats {
    /// Input files fetched and tokenized.
    pub files: u64,
    /// Engine scans performed (per file, or per chunk combination).
    pub scans: u64,
    /// Tokens fetched (including per-file trailing delimiters).
    pub tokens: u64,
    /// Clone sets emitted (IDs consumed).
    pub clone_sets: u64,
    /// Directed pair records written (two per accepted pair).
    pub pairs_written: u64,
}
