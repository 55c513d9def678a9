//! For a fixed corpus and minimum length, the set of reported
//! `(file, begin, end)` pairs must not depend on the chunk budget or the
//! worker count; only set IDs and emission order may differ.

use std::collections::BTreeSet;

use proptest::prelude::*;

use dupscan_rs::{DetectConfig, FileSpan};

use crate::util::{corpus_strategy, detect, proptest_cases, Corpus};

type PairSet = BTreeSet<(FileSpan, FileSpan)>;

fn pair_set(corpus: &Corpus, min_len: usize, chunk_len: usize, workers: usize) -> PairSet {
    let config = DetectConfig {
        min_len,
        chunk_len,
        workers,
        ..DetectConfig::default()
    };
    detect(corpus, config)
        .into_iter()
        .map(|r| (r.left, r.right))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_cases(48)))]

    #[test]
    fn pair_set_is_chunk_and_worker_invariant(
        corpus in corpus_strategy(),
        min_len in 2usize..5,
    ) {
        let baseline = pair_set(&corpus, min_len, 0, 1);
        for chunk_len in [5usize, 11, 23] {
            for workers in [1usize, 3] {
                let got = pair_set(&corpus, min_len, chunk_len, workers);
                prop_assert_eq!(
                    &got,
                    &baseline,
                    "chunk_len={} workers={}",
                    chunk_len,
                    workers
                );
            }
        }
    }
}
