//! Token sequence model and parameterized comparison.
//!
//! # Scope
//! A corpus is one concatenated sequence of signed tokens, each input file
//! framed by a leading and trailing delimiter. Renamed identifiers
//! ("parameters") are encoded self-referentially so that two windows which
//! differ only by a consistent renaming compare equal:
//!
//! - `0` — hard delimiter (file boundary),
//! - `-1` — open parameter: first use of a renamed identifier in its file,
//! - `<= -2` — back-reference to the previous use, encoding
//!   `-(current - referenced) - 1`,
//! - `>= 1` — concrete vocabulary code.
//!
//! # Invariants
//! - A sequence always begins and ends with a delimiter; every file's tokens
//!   are followed by one.
//! - A back-reference always points backwards within the same file (never
//!   across a delimiter), at the *most recent* prior use of the same key.
//! - The sequence is never mutated positionally during a scan; it is replaced
//!   wholesale between chunks.
//!
//! All displacement arithmetic is confined to this module. Call sites resolve
//! tokens through [`compared`] and [`reverse_reference_compared`] only, which
//! is where the window-relative wildcard semantics (and the bounds checks)
//! live.

use ahash::AHashMap;

use crate::error::ScanError;
use crate::reader::SourceToken;

/// Signed token code. See the module docs for the value-space layout.
pub type Token = i32;

/// Hard delimiter framing every file in the sequence.
pub const DELIMITER: Token = 0;

/// Open parameter token: a renamed identifier with no prior use in scope.
pub const PARAM_OPEN: Token = -1;

/// Encodes a back-reference from `current` to an earlier position.
///
/// A distance too large for the token width degrades to an open parameter,
/// which widens matching slightly rather than corrupting the encoding.
#[inline]
pub fn to_displacement(current: usize, referenced: usize) -> Token {
    debug_assert!(referenced < current);
    let distance = current - referenced;
    if distance >= Token::MAX as usize {
        return PARAM_OPEN;
    }
    -(distance as Token) - 1
}

/// Decodes the position a back-reference token points at.
#[inline]
pub fn to_reference_position(current: usize, token: Token) -> usize {
    debug_assert!(token <= -2);
    let distance = -(token + 1) as usize;
    debug_assert!(distance <= current);
    current - distance
}

/// Resolves the comparable value of `seq[pos]` relative to a window starting
/// at `begin`.
///
/// Literals (including open parameters) stand for themselves. A
/// back-reference whose anchor lies before `begin` is outside the window
/// under comparison and counts as open; one anchored inside the window keeps
/// its displacement code. This makes parameterized equality window-relative
/// rather than global.
#[inline]
pub fn compared(seq: &[Token], pos: usize, begin: usize) -> Token {
    let token = seq[pos];
    if token >= PARAM_OPEN {
        return token;
    }
    if to_reference_position(pos, token) < begin {
        PARAM_OPEN
    } else {
        token
    }
}

/// Computes the displacement code position `pos` *would* carry when seen from
/// inside the window `[begin, end)`.
///
/// `pos` lies before the window. If any back-reference inside the window is
/// anchored at `pos`, the result is the same negative code that a forward
/// occurrence at that anchor distance uses; otherwise the position counts as
/// open. This is how the engine derives a consistent left-context value for
/// a position just outside a candidate window.
pub fn reverse_reference_compared(seq: &[Token], pos: usize, begin: usize, end: usize) -> Token {
    debug_assert!(pos < begin);
    if seq[pos] >= 0 {
        return seq[pos];
    }
    for p in begin..end {
        let t = seq[p];
        if t <= -2 && to_reference_position(p, t) == pos {
            return to_displacement(p, pos);
        }
    }
    PARAM_OPEN
}

/// Collapses every parameter occurrence to an open token.
///
/// Used when parameter unification is disabled: renamed identifiers then
/// compare as bare wildcards instead of consistently-renamed ones.
pub fn remove_displacement(seq: &mut [Token]) {
    for t in seq.iter_mut() {
        if *t < 0 {
            *t = PARAM_OPEN;
        }
    }
}

/// Builds delimiter-framed token sequences from per-file token streams.
///
/// Concrete token text is interned into vocabulary codes shared across the
/// whole scan; parameter keys are tracked per file, with each repeat encoded
/// as a back-reference to the most recent prior use.
pub struct SequenceBuilder {
    codes: AHashMap<Box<str>, Token>,
}

/// Token text that maps to the delimiter code. A tokenizer emitting this as
/// its end-of-input marker terminates the file's block without an extra
/// delimiter push.
const EOF_TOKEN: &str = "eof";

impl SequenceBuilder {
    pub fn new() -> Self {
        let mut codes = AHashMap::with_capacity(64);
        codes.insert(EOF_TOKEN.into(), DELIMITER);
        Self { codes }
    }

    /// Number of interned vocabulary entries (including the eof mapping).
    pub fn vocabulary_len(&self) -> usize {
        self.codes.len()
    }

    /// Drops the interned vocabulary.
    ///
    /// Safe between independent single-file scans; codes assigned after a
    /// reset are unrelated to codes assigned before it.
    pub fn reset_vocabulary(&mut self) {
        self.codes.clear();
        self.codes.insert(EOF_TOKEN.into(), DELIMITER);
    }

    /// Appends one file's tokens to `seq` and returns the appended length
    /// (tokens plus the trailing delimiter).
    ///
    /// `seq` must already end with a delimiter; a fresh sequence starts as
    /// `vec![DELIMITER]`.
    pub fn append_file(
        &mut self,
        tokens: &[SourceToken],
        seq: &mut Vec<Token>,
    ) -> Result<usize, ScanError> {
        debug_assert!(matches!(seq.last(), Some(&DELIMITER)));
        let start = seq.len();

        let mut param_table: AHashMap<&str, usize> = AHashMap::new();
        for token in tokens {
            match token {
                SourceToken::Term(text) => {
                    let code = self.alloc_code(text)?;
                    seq.push(code);
                }
                SourceToken::Param(key) => {
                    let current = seq.len();
                    match param_table.entry(key.as_str()) {
                        std::collections::hash_map::Entry::Occupied(mut slot) => {
                            let code = to_displacement(current, *slot.get());
                            seq.push(code);
                            slot.insert(current);
                        }
                        std::collections::hash_map::Entry::Vacant(slot) => {
                            slot.insert(current);
                            seq.push(PARAM_OPEN);
                        }
                    }
                }
            }
        }

        if seq.last() != Some(&DELIMITER) {
            seq.push(DELIMITER);
        }
        Ok(seq.len() - start)
    }

    fn alloc_code(&mut self, text: &str) -> Result<Token, ScanError> {
        if let Some(&code) = self.codes.get(text) {
            return Ok(code);
        }
        let next = self.codes.len();
        if next >= Token::MAX as usize {
            return Err(ScanError::Capacity {
                what: "token vocabulary",
                requested: next + 1,
            });
        }
        let code = next as Token;
        self.codes.insert(text.into(), code);
        Ok(code)
    }
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
