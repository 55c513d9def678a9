//! Tokenizer boundary: turning preprocessed token files into source tokens.
//!
//! The language-specific tokenizer is an external collaborator. Its contract
//! is a per-file token stream where each line supplies one token and, for
//! parameter tokens (renamed identifiers), an opaque parameter key. This
//! module defines that boundary ([`TokenSource`]) and ships one
//! implementation for the tab-separated line format: the token is the text
//! after the last tab; a token of the form `<prefix>|<rest>` is a parameter
//! occurrence when `<prefix>` names a parameter kind, and a plain literal
//! (normalized to `<prefix>`) otherwise.

use std::fs;
use std::path::Path;

use crate::error::ScanError;

/// One token as delivered by the tokenizer collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceToken {
    /// Concrete token text, interned into a vocabulary code.
    Term(String),
    /// Parameter occurrence carrying its opaque key.
    Param(String),
}

/// Supplies the token stream of one input file.
///
/// Implementations own any tokenizer state. The engine never interprets
/// paths beyond handing them back here.
pub trait TokenSource {
    fn read_file(&mut self, path: &Path) -> Result<Vec<SourceToken>, ScanError>;
}

/// Separator between a token's kind prefix and its payload.
pub const PARAMETER_SEPARATOR: char = '|';

/// Reads the tab-separated preprocessed-token line format.
pub struct LineTokenReader {
    param_prefixes: Vec<String>,
    parameterization: bool,
}

impl LineTokenReader {
    pub fn new() -> Self {
        Self {
            param_prefixes: vec!["id".to_string(), "word".to_string()],
            parameterization: true,
        }
    }

    /// Replaces the set of prefixes that mark a token as a parameter.
    pub fn with_param_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.param_prefixes = prefixes;
        self
    }

    /// When disabled, parameter tokens are read as ordinary literals and no
    /// renaming-insensitive matching happens at all.
    pub fn with_parameterization(mut self, enabled: bool) -> Self {
        self.parameterization = enabled;
        self
    }

    fn classify(&self, token: &str) -> SourceToken {
        if let Some(sep) = token.find(PARAMETER_SEPARATOR) {
            let prefix = &token[..sep];
            if self.parameterization && self.param_prefixes.iter().any(|p| p == prefix) {
                return SourceToken::Param(token.to_string());
            }
            // A literal token annotated with its spelling: keep the kind only.
            return SourceToken::Term(prefix.to_string());
        }
        SourceToken::Term(token.to_string())
    }
}

impl Default for LineTokenReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for LineTokenReader {
    fn read_file(&mut self, path: &Path) -> Result<Vec<SourceToken>, ScanError> {
        let raw = fs::read(path).map_err(|e| ScanError::io(path, e))?;
        let text = String::from_utf8_lossy(&raw);

        let mut tokens = Vec::new();
        for (index, line) in text.split(['\n', '\r']).enumerate() {
            if line.is_empty() {
                continue;
            }
            let Some(tab) = line.rfind('\t') else {
                return Err(ScanError::Input {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: "missing tab separator",
                });
            };
            let token = &line[tab + 1..];
            if token.is_empty() {
                return Err(ScanError::Input {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: "empty token",
                });
            }
            tokens.push(self.classify(token));
        }
        Ok(tokens)
    }
}
