//! The repeated-substring detection engine.
//!
//! # Scope
//! [`CloneDetector`] finds every maximal group of parameterized-equal
//! windows in one token sequence and hands each to a sink with a fresh
//! clone-set ID. Candidate discovery is hash-bucketed (better than
//! quadratic); confirmation and growth are exact.
//!
//! # Engine flow (single scan)
//! 1) Build the per-position window-hash sequence for the probe unit length.
//! 2) Tally occurrences per hash value; positions whose hash occurs once
//!    cannot pair and are dropped.
//! 3) Bucket surviving positions by hash value. Buckets are independent and
//!    are the unit of parallel work.
//! 4) Workers confirm equal-content runs per bucket and grow them into
//!    maximal clone sets (see `extend`).
//! 5) A single consumer drains completed batches from a bounded queue and
//!    performs the only globally-ordered side effects: assigning the next
//!    clone-set ID and invoking the sink.
//!
//! # Ordering guarantees
//! Clone-set IDs are strictly increasing with no reuse and no gaps within a
//! run; an ID is assigned only at the point of emission to the sink. For a
//! fixed worker count, emission order is deterministic (buckets are drained
//! in hash order, rounds in sequence order).
//!
//! # Resource model
//! All scratch state lives in [`DetectScratch`], owned by the caller and
//! rebuilt per scan; nothing engine-side is process-global. The probe unit
//! may be shorter than the caller's minimum clone length: any true duplicate
//! at or above the threshold contains a duplicated window of the probe
//! length, so probing short and extending is strictly cheaper than hashing
//! at full length. Final acceptance against the threshold happens in the
//! pair sink.

mod compare;
mod extend;

pub use extend::AcceptGate;

use crate::error::ScanError;
use crate::hash_seq::{compute_hash_seq, HashValue, WindowHash};
use crate::pairs::{CloneSet, PairExpander, PairSink, SetSink};
use crate::scope::Scope;
use crate::token_seq::Token;

use extend::process_bucket;

/// One slot per possible hash value; `0` is the ineligible marker and its
/// slot is never used.
const BUCKET_TABLE_LEN: usize = (HashValue::MAX as usize) + 1;

/// Completed clone-set batches in flight between workers and the consumer.
const COMPLETION_QUEUE_CAP: usize = 10;

/// Per-scan scratch state: hash sequence, occurrence tally, and bucket
/// table. Reused across scans to avoid reallocation; contents are rebuilt
/// each time and never outlive a scan.
pub struct DetectScratch {
    hash_seq: Vec<HashValue>,
    counts: Vec<u32>,
    buckets: Vec<Vec<usize>>,
}

impl DetectScratch {
    pub fn new() -> Self {
        Self {
            hash_seq: Vec::new(),
            counts: Vec::new(),
            buckets: Vec::new(),
        }
    }

    /// Sizes the scratch for a sequence, surfacing allocation failure as a
    /// capacity error before any bucket work starts.
    fn prepare(&mut self, seq_len: usize) -> Result<(), ScanError> {
        self.hash_seq.clear();
        self.hash_seq
            .try_reserve(seq_len)
            .map_err(|_| ScanError::Capacity {
                what: "hash sequence",
                requested: seq_len,
            })?;
        if self.counts.is_empty() {
            self.counts
                .try_reserve(BUCKET_TABLE_LEN)
                .map_err(|_| ScanError::Capacity {
                    what: "bucket tally table",
                    requested: BUCKET_TABLE_LEN,
                })?;
            self.counts.resize(BUCKET_TABLE_LEN, 0);
            self.buckets
                .try_reserve(BUCKET_TABLE_LEN)
                .map_err(|_| ScanError::Capacity {
                    what: "bucket table",
                    requested: BUCKET_TABLE_LEN,
                })?;
            self.buckets.resize_with(BUCKET_TABLE_LEN, Vec::new);
        } else {
            self.counts.fill(0);
            debug_assert!(self.buckets.iter().all(|b| b.is_empty()));
        }
        Ok(())
    }
}

impl Default for DetectScratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameterized repeated-substring detector over one token sequence.
///
/// The sequence is attached per call and owned by the caller; the detector
/// itself holds only the unit-length configuration, the worker count, and
/// the process-wide clone-set ID counter.
pub struct CloneDetector {
    bottom_unit_len: usize,
    multiply: usize,
    workers: usize,
    next_set_id: u64,
}

impl CloneDetector {
    /// Creates a detector probing at `bottom_unit_len * multiply` tokens.
    pub fn new(bottom_unit_len: usize, multiply: usize) -> Self {
        assert!(bottom_unit_len >= 1);
        assert!(multiply >= 1);
        Self {
            bottom_unit_len,
            multiply,
            workers: 1,
            next_set_id: 0,
        }
    }

    /// Probe window length: `bottom_unit_len * multiply`.
    pub fn unit_len(&self) -> usize {
        self.bottom_unit_len * self.multiply
    }

    /// Sets the bucket worker count (minimum 1).
    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }

    /// The ID the next emitted clone set will receive.
    pub fn next_set_id(&self) -> u64 {
        self.next_set_id + 1
    }

    /// Restarts clone-set numbering from 1.
    pub fn reset_set_ids(&mut self) {
        self.next_set_id = 0;
    }

    /// Finds every clone set in `seq` and emits each to `sink` with a fresh
    /// ID. Returns the number of sets emitted.
    ///
    /// `scope` pre-filters sets (and is applied again pair-level by
    /// expansion); `gate` may reject candidates during emission, which
    /// suppresses them without consuming an ID.
    pub fn find_clone_sets<S>(
        &mut self,
        seq: &[Token],
        hash: &dyn WindowHash,
        scope: Scope,
        gate: Option<&AcceptGate>,
        scratch: &mut DetectScratch,
        sink: &mut S,
    ) -> Result<u64, ScanError>
    where
        S: SetSink + Send,
    {
        let unit_len = self.unit_len();
        scratch.prepare(seq.len())?;
        compute_hash_seq(seq, unit_len, hash, &mut scratch.hash_seq);

        if seq.len() < unit_len {
            return Ok(0);
        }

        tally_positions(seq, &scratch.hash_seq, unit_len, &mut scratch.counts);
        fill_buckets(
            seq,
            &scratch.hash_seq,
            unit_len,
            &scratch.counts,
            &mut scratch.buckets,
        );

        let workers = self.workers;
        let start_id = self.next_set_id;
        let buckets = &mut scratch.buckets;

        let final_id = std::thread::scope(|s| {
            let (batch_tx, batch_rx) =
                crossbeam_channel::bounded::<Vec<Vec<CloneSet>>>(COMPLETION_QUEUE_CAP);

            // The single consumer: the only place IDs are assigned and the
            // sink is invoked, so both stay globally ordered.
            let consumer = s.spawn(move || {
                let mut id = start_id;
                for batch in batch_rx {
                    for sets in batch {
                        for set in sets {
                            id += 1;
                            sink.clone_set(seq, &set, id);
                        }
                    }
                }
                id
            });

            let mut ci = 1;
            while ci < BUCKET_TABLE_LEN {
                // One round: up to `workers` non-empty buckets, in hash
                // order. Ownership of each position vector moves to its
                // worker; `take` leaves the slot empty for the next scan.
                let mut round = Vec::with_capacity(workers);
                while ci < BUCKET_TABLE_LEN && round.len() < workers {
                    if !buckets[ci].is_empty() {
                        round.push(std::mem::take(&mut buckets[ci]));
                    }
                    ci += 1;
                }
                if round.is_empty() {
                    break;
                }

                let batch: Vec<Vec<CloneSet>> = if workers == 1 {
                    round
                        .into_iter()
                        .map(|mut positions| {
                            let mut sets = Vec::new();
                            process_bucket(seq, unit_len, scope, gate, &mut positions, &mut sets);
                            sets
                        })
                        .collect()
                } else {
                    let handles: Vec<_> = round
                        .into_iter()
                        .map(|mut positions| {
                            s.spawn(move || {
                                let mut sets = Vec::new();
                                process_bucket(
                                    seq,
                                    unit_len,
                                    scope,
                                    gate,
                                    &mut positions,
                                    &mut sets,
                                );
                                sets
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|h| h.join().expect("bucket worker panicked"))
                        .collect()
                };

                if batch_tx.send(batch).is_err() {
                    break;
                }
            }

            drop(batch_tx);
            consumer.join().expect("consumer thread panicked")
        });

        let emitted = final_id - self.next_set_id;
        self.next_set_id = final_id;
        Ok(emitted)
    }

    /// Convenience wrapper: expand every found clone set into pairs.
    pub fn find_clone_pairs<P>(
        &mut self,
        seq: &[Token],
        hash: &dyn WindowHash,
        scope: Scope,
        gate: Option<&AcceptGate>,
        scratch: &mut DetectScratch,
        sink: &mut P,
    ) -> Result<u64, ScanError>
    where
        P: PairSink + Send,
    {
        let mut expander = PairExpander::new(scope, sink);
        self.find_clone_sets(seq, hash, scope, gate, scratch, &mut expander)
    }
}

/// First pass: occurrence count per hash value over eligible positions.
///
/// On a zero hash past the first window, the walk may jump a whole unit:
/// construction guarantees the preceding `unit_len - 1` slots of a zero tail
/// are zero as well.
fn tally_positions(seq: &[Token], hash_seq: &[HashValue], unit_len: usize, counts: &mut [u32]) {
    let mut pos = 1;
    while pos < seq.len() - unit_len {
        let h = hash_seq[pos] as usize;
        if h != 0 {
            debug_assert!(counts[h] < u32::MAX);
            counts[h] += 1;
            pos += 1;
        } else if pos + unit_len < hash_seq.len() {
            if pos > unit_len {
                debug_assert_eq!(hash_seq[pos + unit_len - 1], 0);
                pos += unit_len;
            }
            while pos < seq.len() - unit_len && hash_seq[pos] == 0 {
                pos += 1;
            }
        } else {
            break;
        }
    }
}

/// Second pass: bucket every position whose hash value occurs at least
/// twice. Singleton hashes cannot pair with anything and are dropped.
fn fill_buckets(
    seq: &[Token],
    hash_seq: &[HashValue],
    unit_len: usize,
    counts: &[u32],
    buckets: &mut [Vec<usize>],
) {
    let mut pos = 1;
    while pos < seq.len() - unit_len {
        let h = hash_seq[pos] as usize;
        if h != 0 {
            if counts[h] >= 2 {
                let bucket = &mut buckets[h];
                if bucket.is_empty() {
                    bucket.reserve(counts[h] as usize);
                }
                bucket.push(pos);
            }
            pos += 1;
        } else if pos + unit_len < hash_seq.len() {
            if pos > unit_len {
                pos += unit_len;
            }
            while pos < seq.len() - unit_len && hash_seq[pos] == 0 {
                pos += 1;
            }
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_seq::TokenSquareHash;
    use crate::token_seq::DELIMITER;

    #[derive(Default)]
    struct CollectSets(Vec<(Vec<Vec<usize>>, usize, u64)>);

    impl SetSink for CollectSets {
        fn clone_set(&mut self, _seq: &[Token], set: &CloneSet, id: u64) {
            let groups = set.groups.iter().map(|g| g.positions.clone()).collect();
            self.0.push((groups, set.len, id));
        }
    }

    fn framed_files(files: &[&[Token]]) -> Vec<Token> {
        let mut seq = vec![DELIMITER];
        for tokens in files {
            seq.extend_from_slice(tokens);
            seq.push(DELIMITER);
        }
        seq
    }

    #[test]
    fn short_sequence_emits_nothing() {
        let seq = framed_files(&[&[1]]);
        let mut detector = CloneDetector::new(5, 1);
        let mut scratch = DetectScratch::new();
        let mut sink = CollectSets::default();
        let emitted = detector
            .find_clone_sets(
                &seq,
                &TokenSquareHash,
                Scope::All,
                None,
                &mut scratch,
                &mut sink,
            )
            .unwrap();
        assert_eq!(emitted, 0);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn identical_files_form_one_set() {
        let seq = framed_files(&[&[1, 2, 3], &[1, 2, 3]]);
        let mut detector = CloneDetector::new(2, 1);
        let mut scratch = DetectScratch::new();
        let mut sink = CollectSets::default();
        let emitted = detector
            .find_clone_sets(
                &seq,
                &TokenSquareHash,
                Scope::All,
                None,
                &mut scratch,
                &mut sink,
            )
            .unwrap();
        // One maximal set of length 3 at positions 1 and 5; the [2,3]
        // suffix run is suppressed, not re-reported.
        assert_eq!(emitted, 1);
        let (groups, len, id) = &sink.0[0];
        assert_eq!(*len, 3);
        assert_eq!(*id, 1);
        let mut positions = groups.concat();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 5]);
    }

    #[test]
    fn ids_are_monotonic_across_scans() {
        let seq = framed_files(&[&[1, 2, 3], &[1, 2, 3]]);
        let mut detector = CloneDetector::new(2, 1);
        let mut scratch = DetectScratch::new();
        let mut sink = CollectSets::default();
        detector
            .find_clone_sets(
                &seq,
                &TokenSquareHash,
                Scope::All,
                None,
                &mut scratch,
                &mut sink,
            )
            .unwrap();
        detector
            .find_clone_sets(
                &seq,
                &TokenSquareHash,
                Scope::All,
                None,
                &mut scratch,
                &mut sink,
            )
            .unwrap();
        let ids: Vec<u64> = sink.0.iter().map(|(_, _, id)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn worker_count_does_not_change_found_sets() {
        let seq = framed_files(&[
            &[1, 2, 3, 4, 7, 1, 2, 3, 4],
            &[9, 9, 1, 2, 3, 4, 8],
            &[5, 6, 5, 6, 5, 6],
        ]);
        let collect = |workers: usize| {
            let mut detector = CloneDetector::new(2, 1);
            detector.set_workers(workers);
            let mut scratch = DetectScratch::new();
            let mut sink = CollectSets::default();
            detector
                .find_clone_sets(
                    &seq,
                    &TokenSquareHash,
                    Scope::All,
                    None,
                    &mut scratch,
                    &mut sink,
                )
                .unwrap();
            let mut sets: Vec<_> = sink.0.into_iter().map(|(g, len, _)| (g, len)).collect();
            sets.sort();
            sets
        };
        assert_eq!(collect(1), collect(4));
    }

    #[test]
    fn scope_prefilter_drops_sets_without_left_member() {
        let seq = framed_files(&[&[1, 2, 3], &[1, 2, 3]]);
        let mut detector = CloneDetector::new(2, 1);
        let mut scratch = DetectScratch::new();
        let mut sink = CollectSets::default();
        // Barrier at zero: nothing is "left", so nothing may be observed.
        let emitted = detector
            .find_clone_sets(
                &seq,
                &TokenSquareHash,
                Scope::LeftAndCross { barrier: 0 },
                None,
                &mut scratch,
                &mut sink,
            )
            .unwrap();
        assert_eq!(emitted, 0);
    }
}
