//! Error taxonomy for a detection run.
//!
//! Three kinds of failure exist at this boundary:
//! - I/O failures while reading or tokenizing input (fatal, abort the scan),
//! - capacity failures while sizing scratch state for a chunk (fatal,
//!   surfaced before any bucket work starts),
//! - write failures on the output sink (fatal, no terminator is written).
//!
//! Gate rejection of a candidate clone set is *not* an error and never
//! surfaces here; it only suppresses emission for that candidate.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Fatal error raised by a detection run.
///
/// There are no retries inside the engine: the caller decides whether to
/// retry with different parameters (for example a smaller chunk size) or
/// abort. On any of these errors, no clone-set ID has been assigned for work
/// that was not emitted and no terminator record has been written.
#[derive(Debug)]
pub enum ScanError {
    /// Reading or tokenizing an input file failed.
    Io { path: PathBuf, source: io::Error },
    /// An input file is malformed at the given 1-based line.
    Input {
        path: PathBuf,
        line: usize,
        reason: &'static str,
    },
    /// Scratch state for the requested chunk size could not be allocated.
    Capacity { what: &'static str, requested: usize },
    /// Writing to the output sink failed.
    Output { source: io::Error },
    /// Two input files carry the same file ID.
    FileIdConflict { id: i32 },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Io { path, source } => {
                write!(f, "can't read input file {}: {}", path.display(), source)
            }
            ScanError::Input { path, line, reason } => {
                write!(f, "bad token line {}:{}: {}", path.display(), line, reason)
            }
            ScanError::Capacity { what, requested } => {
                write!(f, "can't allocate {} ({} entries)", what, requested)
            }
            ScanError::Output { source } => write!(f, "can't write clone data: {}", source),
            ScanError::FileIdConflict { id } => write!(f, "file ID conflict: {}", id),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Io { source, .. } | ScanError::Output { source } => Some(source),
            _ => None,
        }
    }
}

impl ScanError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}
