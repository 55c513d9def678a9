//! Shared helpers for the property suites.

use std::io;
use std::path::Path;

use proptest::prelude::*;

use dupscan_rs::{
    read_pairs, DetectConfig, InputFile, PairRecord, ScanError, ScanRuntime, SourceToken,
    TokenSource,
};

/// Reads the proptest case budget from the environment, with a default.
pub fn proptest_cases(default: u32) -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// In-memory token source keyed by file name.
pub struct MemorySource(pub Vec<(String, Vec<SourceToken>)>);

impl TokenSource for MemorySource {
    fn read_file(&mut self, path: &Path) -> Result<Vec<SourceToken>, ScanError> {
        let key = path.to_str().unwrap();
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, tokens)| tokens.clone())
            .ok_or_else(|| ScanError::io(path, io::Error::from(io::ErrorKind::NotFound)))
    }
}

/// A corpus: one token stream per file, in scan order.
pub type Corpus = Vec<Vec<SourceToken>>;

pub fn file_name(index: usize) -> String {
    format!("f{}", index)
}

pub fn input_files(corpus: &Corpus) -> Vec<InputFile> {
    (0..corpus.len())
        .map(|i| InputFile::new(i as i32 + 1, 1, file_name(i)))
        .collect()
}

pub fn source_of(corpus: &Corpus) -> MemorySource {
    MemorySource(
        corpus
            .iter()
            .enumerate()
            .map(|(i, tokens)| (file_name(i), tokens.clone()))
            .collect(),
    )
}

/// Runs detection and returns the directed records.
pub fn detect(corpus: &Corpus, config: DetectConfig) -> Vec<PairRecord> {
    let files = input_files(corpus);
    let mut out = Vec::new();
    ScanRuntime::new(config)
        .detect(&files, source_of(corpus), &mut out)
        .expect("detection failed");
    read_pairs(&out[..]).expect("record stream truncated")
}

/// Strategy: one source token over a small vocabulary, parameters included.
pub fn token_strategy() -> impl Strategy<Value = SourceToken> {
    prop_oneof![
        3 => (0u8..5).prop_map(|c| SourceToken::Term(format!("t{}", c))),
        1 => (0u8..3).prop_map(|k| SourceToken::Param(format!("p{}", k))),
    ]
}

/// Strategy: a corpus of 1..=4 files with up to 20 tokens each.
pub fn corpus_strategy() -> impl Strategy<Value = Corpus> {
    prop::collection::vec(
        prop::collection::vec(token_strategy(), 0..20),
        1..=4,
    )
}
