//! Property suites for the detection engine.
//!
//! Case counts default low enough for every `cargo test` run; set
//! `PROPTEST_CASES` to push harder locally.

mod chunk_invariance;
mod parameterized;
mod subsumption;
mod util;
