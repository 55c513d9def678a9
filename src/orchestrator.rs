//! Chunked detection driver.
//!
//! # Scope
//! Drives the engine over an arbitrarily large corpus under a bounded token
//! budget while guaranteeing that every pair across the whole corpus is
//! attempted exactly once. Two regimes:
//!
//! - **Within-file-only relations**: each file is scanned alone in `All`
//!   scope. Files are fetched in small batches so tokenization of the next
//!   batch overlaps matching on the current one.
//! - **General relations**: the corpus is cut into chunks of at most
//!   `chunk_len` tokens. The outer loop holds one "left" chunk; the inner
//!   loop appends each subsequent chunk after the barrier and scans with
//!   `LeftAndCross` (adjacent chunk), `All` (adjacent chunk that is also the
//!   last, which finishes the whole scan), or `Cross` (every later chunk).
//!   Left-internal pairs are reported exactly when the chunk is the left
//!   side; right-internal pairs wait until that chunk becomes the left side
//!   itself.
//!
//! ```text
//! files -> [fetch thread: tokenize + encode] -> chunk -> engine -> pairs
//!                 (prefetch of chunk i+1 overlaps matching on chunk i)
//! ```
//!
//! # Failure behavior
//! A fetch or write failure aborts the scan before any further output; the
//! terminator record is only written after a fully successful run, so a
//! truncated stream is detectable downstream.
//!
//! # Shared state
//! The token sequence and scratch for the current scan are owned exclusively
//! here and replaced wholesale between chunks. The only cross-thread
//! structures are the two bounded channels of the prefetch handshake.

use std::io::{self, Write};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::api::{DetectConfig, DetectStats, InputFile, RelationMask};
use crate::engine::{AcceptGate, CloneDetector, DetectScratch};
use crate::error::ScanError;
use crate::hash_seq::TokenSquareHash;
use crate::pairs::PairSink;
use crate::reader::TokenSource;
use crate::record::{FileSpan, PairRecord, RecordWriter};
use crate::scope::Scope;
use crate::token_seq::{remove_displacement, SequenceBuilder, Token, DELIMITER};

/// Files fetched per batch in within-file-only mode.
const PER_FILE_FETCH_BATCH: usize = 20;

struct FetchRequest {
    start: usize,
    max_files: usize,
}

/// One fetched chunk: a delimiter-framed sequence plus the appended length
/// of each file (tokens and trailing delimiter).
struct Fetched {
    start: usize,
    seq: Vec<Token>,
    file_lens: Vec<usize>,
}

impl Fetched {
    fn token_total(&self) -> u64 {
        self.file_lens.iter().map(|&l| l as u64).sum()
    }
}

/// Request/response handle to the fetch thread. Keeping one request in
/// flight while the current chunk is being matched is the double-buffering.
struct Prefetcher {
    request_tx: Sender<FetchRequest>,
    fetched_rx: Receiver<Result<Fetched, ScanError>>,
}

impl Prefetcher {
    fn request(&self, start: usize, max_files: usize) {
        // The fetch thread only exits once this sender closes, so the send
        // cannot fail while a scan is running.
        let _ = self.request_tx.send(FetchRequest { start, max_files });
    }

    fn recv(&self) -> Result<Fetched, ScanError> {
        self.fetched_rx
            .recv()
            .expect("prefetch thread terminated unexpectedly")
    }
}

/// Fetch-thread main: serves chunk requests in order until the request
/// channel closes or the scan stops listening.
fn run_fetch_loop<T: TokenSource>(
    mut source: T,
    files: &[InputFile],
    config: DetectConfig,
    reset_vocab_between_batches: bool,
    request_rx: Receiver<FetchRequest>,
    fetched_tx: Sender<Result<Fetched, ScanError>>,
) {
    let mut builder = SequenceBuilder::new();
    let mut tokens_since_reset = 0usize;
    for request in request_rx {
        let result = fetch_chunk(&mut source, &mut builder, files, &config, &request);
        if let Ok(fetched) = &result {
            tokens_since_reset += fetched.seq.len() - 1;
            // Per-file scans need no cross-file vocabulary consistency, so
            // the interner is dropped periodically to bound its growth.
            if reset_vocab_between_batches
                && config.chunk_len > 0
                && tokens_since_reset >= config.chunk_len
            {
                builder.reset_vocabulary();
                tokens_since_reset = 0;
            }
        }
        let failed = result.is_err();
        if fetched_tx.send(result).is_err() || failed {
            return;
        }
    }
}

/// Reads files starting at `request.start` until the file cap, the corpus
/// end, or the chunk token budget is reached. The budget is soft below
/// three files so a chunk always makes progress.
fn fetch_chunk<T: TokenSource>(
    source: &mut T,
    builder: &mut SequenceBuilder,
    files: &[InputFile],
    config: &DetectConfig,
    request: &FetchRequest,
) -> Result<Fetched, ScanError> {
    let mut seq = vec![DELIMITER];
    let mut file_lens = Vec::new();
    let mut fi = request.start;
    while (request.max_files == 0 || file_lens.len() < request.max_files)
        && fi < files.len()
        && (config.chunk_len == 0 || file_lens.len() <= 2 || seq.len() - 1 < config.chunk_len)
    {
        let tokens = source.read_file(&files[fi].path)?;
        let appended = builder.append_file(&tokens, &mut seq)?;
        file_lens.push(appended);
        fi += 1;
    }
    if !config.parameter_unification {
        remove_displacement(&mut seq);
    }
    Ok(Fetched {
        start: request.start,
        seq,
        file_lens,
    })
}

/// Maps engine pair positions to file coordinates, applies the minimum
/// length and relation filters, and writes accepted pairs in both orders.
struct RuntimePairSink<'a, W: Write> {
    min_len: usize,
    relations: RelationMask,
    file_starts: &'a [usize],
    file_ids: &'a [i32],
    file_groups: &'a [i32],
    writer: &'a mut RecordWriter<W>,
    pairs: u64,
    failure: Option<io::Error>,
}

impl<W: Write> RuntimePairSink<'_, W> {
    fn span_of(&self, pos: usize, len: usize) -> FileSpan {
        let index = self.file_starts.partition_point(|&s| s <= pos) - 1;
        let begin = (pos - self.file_starts[index]) as i32;
        FileSpan::new(self.file_ids[index], begin, begin + len as i32)
    }

    fn file_index(&self, pos: usize) -> usize {
        self.file_starts.partition_point(|&s| s <= pos) - 1
    }
}

impl<W: Write> PairSink for RuntimePairSink<'_, W> {
    fn clone_pair(&mut self, pos_a: usize, pos_b: usize, len: usize, set_id: u64) {
        debug_assert!(pos_a < pos_b);
        if len < self.min_len || self.failure.is_some() {
            return;
        }
        let file_a = self.file_index(pos_a);
        let file_b = self.file_index(pos_b);
        if !self.relations.admits(file_a, file_b, self.file_groups) {
            return;
        }
        let record = PairRecord {
            left: self.span_of(pos_a, len),
            right: self.span_of(pos_b, len),
            set_id,
        };
        match self.writer.write_both(&record) {
            Ok(()) => self.pairs += 2,
            Err(source) => self.failure = Some(source),
        }
    }
}

/// Detection runtime: owns the detector, its scratch, and the accept gate,
/// and reuses them across chunks and runs.
pub struct ScanRuntime {
    config: DetectConfig,
    detector: CloneDetector,
    scratch: DetectScratch,
    hash: TokenSquareHash,
    gate: Option<Box<AcceptGate>>,
}

impl ScanRuntime {
    pub fn new(config: DetectConfig) -> Self {
        let (bottom, multiply) = config.unit_split();
        let mut detector = CloneDetector::new(bottom, multiply);
        detector.set_workers(config.workers);
        Self {
            config,
            detector,
            scratch: DetectScratch::new(),
            hash: TokenSquareHash,
            gate: None,
        }
    }

    /// Attaches a per-fragment accept gate, consulted once per candidate
    /// clone set during emission.
    pub fn with_gate(mut self, gate: Box<AcceptGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Runs detection over `files`, writing accepted pairs to `out`.
    ///
    /// On success the stream is terminated and flushed. On error, nothing
    /// more is written after the failure point and no terminator is
    /// appended, so downstream readers reject the stream as truncated.
    pub fn detect<T, W>(
        &mut self,
        files: &[InputFile],
        source: T,
        out: W,
    ) -> Result<DetectStats, ScanError>
    where
        T: TokenSource + Send,
        W: Write + Send,
    {
        let mut seen = ahash::AHashSet::with_capacity(files.len());
        for file in files {
            if !seen.insert(file.id) {
                return Err(ScanError::FileIdConflict { id: file.id });
            }
        }

        let mut stats = DetectStats::default();
        let mut writer = RecordWriter::new(out);
        let per_file = self.config.relations.within_file_only();

        let Self {
            config,
            detector,
            scratch,
            hash,
            gate,
        } = self;
        let gate = gate.as_deref();

        thread::scope(|s| {
            let (request_tx, request_rx) = bounded(2);
            let (fetched_tx, fetched_rx) = bounded(1);
            {
                let config = config.clone();
                s.spawn(move || {
                    run_fetch_loop(source, files, config, per_file, request_rx, fetched_tx)
                });
            }
            let prefetch = Prefetcher {
                request_tx,
                fetched_rx,
            };

            if per_file {
                run_per_file(
                    detector, scratch, hash, gate, config, files, &prefetch, &mut writer,
                    &mut stats,
                )
            } else {
                run_chunked(
                    detector, scratch, hash, gate, config, files, &prefetch, &mut writer,
                    &mut stats,
                )
            }
        })?;

        writer
            .finish()
            .map_err(|source| ScanError::Output { source })?;
        Ok(stats)
    }
}

/// One engine scan over the current sequence, wired to the record writer.
#[allow(clippy::too_many_arguments)]
fn scan_once<W: Write + Send>(
    detector: &mut CloneDetector,
    scratch: &mut DetectScratch,
    hash: &TokenSquareHash,
    gate: Option<&AcceptGate>,
    config: &DetectConfig,
    seq: &[Token],
    scope: Scope,
    file_starts: &[usize],
    file_ids: &[i32],
    file_groups: &[i32],
    writer: &mut RecordWriter<W>,
    stats: &mut DetectStats,
) -> Result<(), ScanError> {
    let mut sink = RuntimePairSink {
        min_len: config.min_len,
        relations: config.relations,
        file_starts,
        file_ids,
        file_groups,
        writer,
        pairs: 0,
        failure: None,
    };
    let sets = detector.find_clone_pairs(seq, hash, scope, gate, scratch, &mut sink)?;
    stats.scans += 1;
    stats.clone_sets += sets;
    stats.pairs_written += sink.pairs;
    if let Some(source) = sink.failure {
        return Err(ScanError::Output { source });
    }
    Ok(())
}

/// Within-file-only regime: every file scanned alone under `All` scope.
///
/// Files shorter than the minimum length cannot contain a reportable pair
/// and are skipped without a scan. With no relation enabled at all, files
/// are still fetched and counted, matching the general accounting path.
#[allow(clippy::too_many_arguments)]
fn run_per_file<W: Write + Send>(
    detector: &mut CloneDetector,
    scratch: &mut DetectScratch,
    hash: &TokenSquareHash,
    gate: Option<&AcceptGate>,
    config: &DetectConfig,
    files: &[InputFile],
    prefetch: &Prefetcher,
    writer: &mut RecordWriter<W>,
    stats: &mut DetectStats,
) -> Result<(), ScanError> {
    if files.is_empty() {
        return Ok(());
    }

    let mut file_seq: Vec<Token> = Vec::new();
    prefetch.request(0, PER_FILE_FETCH_BATCH);
    loop {
        let fetched = prefetch.recv()?;
        let next = fetched.start + fetched.file_lens.len();
        if next < files.len() {
            prefetch.request(next, PER_FILE_FETCH_BATCH);
        }

        let mut offset = 1usize;
        for (c, &file_len) in fetched.file_lens.iter().enumerate() {
            let file = &files[fetched.start + c];
            stats.files += 1;
            stats.tokens += file_len as u64;
            if file_len >= config.min_len && !config.relations.is_empty() {
                file_seq.clear();
                file_seq.push(DELIMITER);
                file_seq.extend_from_slice(&fetched.seq[offset..offset + file_len]);
                scan_once(
                    detector,
                    scratch,
                    hash,
                    gate,
                    config,
                    &file_seq,
                    Scope::All,
                    &[1],
                    &[file.id],
                    &[file.group],
                    writer,
                    stats,
                )?;
            }
            offset += file_len;
        }
        debug_assert_eq!(offset, fetched.seq.len());

        if next >= files.len() {
            return Ok(());
        }
    }
}

/// General regime: chunk-by-chunk cross comparison behind a barrier.
#[allow(clippy::too_many_arguments)]
fn run_chunked<W: Write + Send>(
    detector: &mut CloneDetector,
    scratch: &mut DetectScratch,
    hash: &TokenSquareHash,
    gate: Option<&AcceptGate>,
    config: &DetectConfig,
    files: &[InputFile],
    prefetch: &Prefetcher,
    writer: &mut RecordWriter<W>,
    stats: &mut DetectStats,
) -> Result<(), ScanError> {
    let mut seq: Vec<Token> = Vec::new();
    let mut file_starts: Vec<usize> = Vec::new();
    let mut file_ids: Vec<i32> = Vec::new();
    let mut file_groups: Vec<i32> = Vec::new();

    let mut fi = 0usize;
    while fi < files.len() {
        prefetch.request(fi, 0);
        let left = prefetch.recv()?;
        debug_assert_eq!(left.start, fi);

        seq.clear();
        seq.extend_from_slice(&left.seq);
        file_starts.clear();
        file_ids.clear();
        file_groups.clear();
        let mut prev_total = 1usize;
        for (c, &file_len) in left.file_lens.iter().enumerate() {
            let file = &files[fi + c];
            file_starts.push(prev_total);
            file_ids.push(file.id);
            file_groups.push(file.group);
            prev_total += file_len;
        }
        debug_assert_eq!(prev_total, seq.len());
        stats.files += left.file_lens.len() as u64;
        stats.tokens += left.token_total();

        let fi_next = fi + left.file_lens.len();
        if fi_next >= files.len() {
            // This chunk covers the rest of the corpus: one All scan.
            scan_once(
                detector, scratch, hash, gate, config, &seq, Scope::All, &file_starts,
                &file_ids, &file_groups, writer, stats,
            )?;
            return Ok(());
        }

        let barrier_pos = seq.len();
        let barrier_files = file_starts.len();
        let mut gi = fi_next;
        prefetch.request(gi, 0);

        while gi < files.len() {
            let fetched = prefetch.recv()?;
            debug_assert_eq!(fetched.start, gi);
            let next_gi = gi + fetched.file_lens.len();
            if next_gi < files.len() {
                prefetch.request(next_gi, 0);
            }

            seq.truncate(barrier_pos);
            file_starts.truncate(barrier_files);
            file_ids.truncate(barrier_files);
            file_groups.truncate(barrier_files);
            let mut prev_total = seq.len();
            for (c, &file_len) in fetched.file_lens.iter().enumerate() {
                let file = &files[gi + c];
                file_starts.push(prev_total);
                file_ids.push(file.id);
                file_groups.push(file.group);
                prev_total += file_len;
            }
            seq.extend_from_slice(&fetched.seq[1..]);
            debug_assert_eq!(seq.len(), prev_total);

            let adjacent = fetched.start == fi_next;
            gi = next_gi;

            let scope = if adjacent {
                if gi >= files.len() {
                    // Adjacent and last: finish both chunks in one scan.
                    Scope::All
                } else {
                    Scope::LeftAndCross {
                        barrier: barrier_pos,
                    }
                }
            } else {
                Scope::Cross {
                    barrier: barrier_pos,
                }
            };
            let covered_all = adjacent && gi >= files.len();
            if covered_all {
                // The final chunk never becomes a left chunk; account for
                // its files here.
                stats.files += fetched.file_lens.len() as u64;
                stats.tokens += fetched.token_total();
            }

            scan_once(
                detector,
                scratch,
                hash,
                gate,
                config,
                &seq,
                scope,
                &file_starts,
                &file_ids,
                &file_groups,
                writer,
                stats,
            )?;

            if covered_all {
                return Ok(());
            }
        }

        fi = fi_next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SourceToken;
    use crate::record::read_pairs;
    use std::path::Path;

    /// Test token source: maps path strings to prepared token streams.
    struct MemorySource(Vec<(String, Vec<SourceToken>)>);

    impl TokenSource for MemorySource {
        fn read_file(&mut self, path: &Path) -> Result<Vec<SourceToken>, ScanError> {
            let key = path.to_str().unwrap();
            self.0
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, tokens)| tokens.clone())
                .ok_or_else(|| {
                    ScanError::io(path, io::Error::from(io::ErrorKind::NotFound))
                })
        }
    }

    fn terms(names: &[&str]) -> Vec<SourceToken> {
        names
            .iter()
            .map(|n| SourceToken::Term(n.to_string()))
            .collect()
    }

    fn config(min_len: usize) -> DetectConfig {
        DetectConfig {
            min_len,
            chunk_len: 0,
            ..DetectConfig::default()
        }
    }

    #[test]
    fn identical_files_produce_cross_pairs() {
        let files = [
            InputFile::new(1, 1, "a"),
            InputFile::new(2, 1, "b"),
        ];
        let source = MemorySource(vec![
            ("a".into(), terms(&["s", "t", "u"])),
            ("b".into(), terms(&["s", "t", "u"])),
        ]);
        let mut runtime = ScanRuntime::new(config(3));
        let mut out = Vec::new();
        let stats = runtime.detect(&files, source, &mut out).unwrap();
        let records = read_pairs(&out[..]).unwrap();
        assert_eq!(stats.pairs_written, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].left, FileSpan::new(1, 0, 3));
        assert_eq!(records[0].right, FileSpan::new(2, 0, 3));
        assert_eq!(records[1], records[0].swapped());
        assert_eq!(records[0].set_id, 1);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.clone_sets, 1);
    }

    #[test]
    fn min_len_suppresses_short_pairs() {
        let files = [
            InputFile::new(1, 1, "a"),
            InputFile::new(2, 1, "b"),
        ];
        let source = MemorySource(vec![
            ("a".into(), terms(&["s", "t", "u"])),
            ("b".into(), terms(&["s", "t", "u"])),
        ]);
        let mut runtime = ScanRuntime::new(config(4));
        let mut out = Vec::new();
        let stats = runtime.detect(&files, source, &mut out).unwrap();
        assert_eq!(stats.pairs_written, 0);
        assert!(read_pairs(&out[..]).unwrap().is_empty());
    }

    #[test]
    fn duplicate_file_ids_are_rejected() {
        let files = [
            InputFile::new(1, 1, "a"),
            InputFile::new(1, 1, "b"),
        ];
        let source = MemorySource(vec![]);
        let mut runtime = ScanRuntime::new(config(2));
        let err = runtime
            .detect(&files, source, Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, ScanError::FileIdConflict { id: 1 }));
    }

    #[test]
    fn fetch_error_leaves_stream_unterminated() {
        let files = [
            InputFile::new(1, 1, "a"),
            InputFile::new(2, 1, "missing"),
        ];
        let source = MemorySource(vec![("a".into(), terms(&["s", "t"]))]);
        let mut runtime = ScanRuntime::new(config(2));
        let mut out = Vec::new();
        let err = runtime.detect(&files, source, &mut out).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
        // No terminator: readers must reject the stream.
        assert!(read_pairs(&out[..]).is_err());
    }

    #[test]
    fn empty_corpus_writes_only_a_terminator() {
        let mut runtime = ScanRuntime::new(config(2));
        let mut out = Vec::new();
        let stats = runtime
            .detect(&[], MemorySource(vec![]), &mut out)
            .unwrap();
        assert_eq!(stats, DetectStats::default());
        assert!(read_pairs(&out[..]).unwrap().is_empty());
    }
}
