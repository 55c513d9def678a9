//! Post-hoc verification of reported pairs against the sequence model:
//! every pair's windows are parameterized-equal, meet the minimum length,
//! and are not strictly interior to a longer match on either side (the
//! no-subsumption and maximality invariants).

use proptest::prelude::*;

use dupscan_rs::{
    compared, reverse_reference_compared, DetectConfig, PairRecord, SequenceBuilder, Token,
    DELIMITER,
};

use crate::util::{corpus_strategy, detect, proptest_cases, Corpus};

/// Rebuilds the in-memory scan sequence and per-file start offsets exactly
/// as the runtime's unbounded-chunk fetch does.
fn rebuild(corpus: &Corpus) -> (Vec<Token>, Vec<usize>) {
    let mut builder = SequenceBuilder::new();
    let mut seq = vec![DELIMITER];
    let mut starts = Vec::new();
    for tokens in corpus {
        starts.push(seq.len());
        builder.append_file(tokens, &mut seq).unwrap();
    }
    (seq, starts)
}

fn abs_pos(starts: &[usize], span: &dupscan_rs::FileSpan) -> usize {
    starts[(span.file - 1) as usize] + span.begin as usize
}

fn check_record(seq: &[Token], starts: &[usize], record: &PairRecord, min_len: usize) {
    let len = (record.left.end - record.left.begin) as usize;
    assert_eq!(len, (record.right.end - record.right.begin) as usize);
    assert!(len >= min_len, "pair below minimum length");

    let a = abs_pos(starts, &record.left);
    let b = abs_pos(starts, &record.right);
    assert_ne!(a, b);

    // Windows compare equal under the window-relative rule.
    for i in 0..len {
        assert_eq!(
            compared(seq, a + i, a),
            compared(seq, b + i, b),
            "unequal content at offset {} of pair {:?}",
            i,
            record
        );
    }

    // Not a strict interior of a longer match: the two sides never share a
    // nonzero left context or a nonzero right extension.
    let prev_a = reverse_reference_compared(seq, a - 1, a, a + len);
    let prev_b = reverse_reference_compared(seq, b - 1, b, b + len);
    assert!(
        !(prev_a == prev_b && prev_a != DELIMITER),
        "pair {:?} shares left context {}",
        record,
        prev_a
    );

    let ext_at = |pos: usize| {
        if pos + len >= seq.len() {
            DELIMITER
        } else {
            compared(seq, pos + len, pos)
        }
    };
    let ext_a = ext_at(a);
    let ext_b = ext_at(b);
    assert!(
        !(ext_a == ext_b && ext_a != DELIMITER),
        "pair {:?} shares right extension {}",
        record,
        ext_a
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_cases(48)))]

    #[test]
    fn reported_pairs_are_equal_maximal_and_non_subsumed(
        corpus in corpus_strategy(),
        min_len in 2usize..5,
    ) {
        let config = DetectConfig {
            min_len,
            chunk_len: 0,
            ..DetectConfig::default()
        };
        let records = detect(&corpus, config);
        let (seq, starts) = rebuild(&corpus);

        // Both directions are present: the undirected match plus its swap.
        for record in &records {
            prop_assert!(records.contains(&record.swapped()));
        }

        for record in &records {
            check_record(&seq, &starts, record, min_len);
        }
    }
}
