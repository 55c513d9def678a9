//! Parameterized equivalence: a consistent renaming of one file matches it
//! in full; collapsing two distinct identifiers does not.

use proptest::prelude::*;

use dupscan_rs::{DetectConfig, SourceToken};

use crate::util::{detect, proptest_cases};

/// One symbol of a token pattern: a literal or the index of a parameter.
#[derive(Clone, Copy, Debug)]
enum Sym {
    Term(u8),
    Param(u8),
}

fn sym_strategy() -> impl Strategy<Value = Sym> {
    prop_oneof![
        (0u8..4).prop_map(Sym::Term),
        (0u8..3).prop_map(Sym::Param),
    ]
}

/// Instantiates a pattern with a per-file parameter key namespace.
fn instantiate(pattern: &[Sym], key_of: impl Fn(u8) -> String) -> Vec<SourceToken> {
    pattern
        .iter()
        .map(|sym| match *sym {
            Sym::Term(c) => SourceToken::Term(format!("t{}", c)),
            Sym::Param(k) => SourceToken::Param(key_of(k)),
        })
        .collect()
}

fn full_pair_reported(corpus: &[Vec<SourceToken>], len: usize) -> bool {
    let config = DetectConfig {
        min_len: len.min(25),
        chunk_len: 0,
        ..DetectConfig::default()
    };
    detect(&corpus.to_vec(), config).iter().any(|r| {
        r.left.file == 1
            && r.right.file == 2
            && r.left.begin == 0
            && r.right.begin == 0
            && r.left.end as usize == len
            && r.right.end as usize == len
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_cases(64)))]

    #[test]
    fn consistent_renaming_matches_in_full(
        pattern in prop::collection::vec(sym_strategy(), 2..12),
    ) {
        let a = instantiate(&pattern, |k| format!("a{}", k));
        let b = instantiate(&pattern, |k| format!("b{}", k));
        let len = pattern.len();
        prop_assert!(full_pair_reported(&[a, b], len));
    }

    #[test]
    fn collapsed_renaming_does_not_match_in_full(
        pattern in prop::collection::vec(sym_strategy(), 2..12),
    ) {
        let mut distinct: Vec<u8> = pattern
            .iter()
            .filter_map(|s| match s {
                Sym::Param(k) => Some(*k),
                Sym::Term(_) => None,
            })
            .collect();
        distinct.sort_unstable();
        distinct.dedup();
        // The collapse only changes the encoding when two different
        // identifiers exist to merge.
        prop_assume!(distinct.len() >= 2);

        let a = instantiate(&pattern, |k| format!("a{}", k));
        // Every parameter in the candidate maps to one identifier: the same
        // source identifier now maps to two different ones across the pair.
        let b = instantiate(&pattern, |_| "b0".to_string());
        let len = pattern.len();
        prop_assert!(!full_pair_reported(&[a, b], len));
    }
}
