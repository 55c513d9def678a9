//! Token-level duplicate-code detection with parameterized matching.
//!
//! ## Scope
//! This crate finds repeated, possibly consistently-renamed substrings
//! across token sequences derived from source files and reports them as
//! clone pairs grouped into clone sets with stable, strictly-increasing IDs.
//! It processes corpora larger than memory chunk by chunk while still
//! attempting every cross-corpus pair exactly once.
//!
//! ## Key invariants
//! - Matching is window-relative: renamed identifiers are encoded as
//!   self-referential displacements, so two windows differing only by a
//!   consistent renaming compare equal.
//! - Candidate discovery is hash-bucketed at a short probe length and grown
//!   to maximal extent; confirmed prefixes are never rescanned.
//! - Emitted pairs are non-redundant: a pair strictly interior to a longer
//!   reported match of the same set is suppressed by construction.
//! - Clone-set IDs are assigned by a single consumer at emission time: no
//!   reuse, no gaps, and no ID for work that was never emitted.
//!
//! ## Engine flow (single scan)
//! 1) Hash every eligible window start at the probe unit length.
//! 2) Drop singleton hashes; bucket the rest.
//! 3) Per bucket (parallel): confirm equal-content runs, extend to maximal
//!    length, recurse on right-extension branches.
//! 4) Single consumer: assign IDs, expand sets to pairs, filter by scope,
//!    minimum length, and file relations, write fixed-size records.
//!
//! ## Pipeline flow (corpus)
//! `files -> fetch thread (tokenize + encode) -> chunk -> engine -> records`
//! with fetch of chunk `i+1` overlapping matching on chunk `i`.
//!
//! ## Notable entry points
//! - [`ScanRuntime`] / [`DetectConfig`]: chunked corpus detection.
//! - [`CloneDetector`] / [`DetectScratch`]: single-sequence scanning.
//! - [`TokenSource`] / [`LineTokenReader`]: the tokenizer boundary.
//! - [`RecordWriter`] / [`read_pairs`]: the on-disk pair-record contract.

pub mod api;
pub mod engine;
pub mod error;
pub mod hash_seq;
pub mod orchestrator;
pub mod pairs;
pub mod reader;
pub mod record;
pub mod scope;
pub mod token_seq;

pub use api::{
    DetectConfig, DetectStats, InputFile, RelationMask, DEFAULT_BOTTOM_UNIT_LEN,
    DEFAULT_CHUNK_LEN, DEFAULT_MIN_LEN,
};
pub use engine::{AcceptGate, CloneDetector, DetectScratch};
pub use error::ScanError;
pub use hash_seq::{compute_hash_seq, factorize, HashValue, TokenSquareHash, WindowHash};
pub use orchestrator::ScanRuntime;
pub use pairs::{CloneGroup, CloneSet, PairExpander, PairSink, SetSink};
pub use reader::{LineTokenReader, SourceToken, TokenSource};
pub use record::{read_pairs, FileSpan, PairRecord, RecordWriter, RECORD_BYTES};
pub use scope::Scope;
pub use token_seq::{
    compared, remove_displacement, reverse_reference_compared, SequenceBuilder, Token, DELIMITER,
    PARAM_OPEN,
};
