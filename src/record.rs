//! Fixed-size binary clone-pair records.
//!
//! # Format
//! One record is 32 bytes, little-endian: two `(i32 file, i32 begin,
//! i32 end)` triples followed by a `u64` clone-set ID. Every accepted pair
//! is written twice, once in each left/right order, so downstream per-file
//! indexing can look up by either file. An all-zero record terminates the
//! stream; a stream without a terminator is incomplete and must not be
//! trusted.
//!
//! # Writer behavior
//! Output is buffered well above the default writer size: workers upstream
//! hand whole batches to a single consumer, so fewer, larger writes keep
//! syscall count down. `finish` writes the terminator and flushes; dropping
//! the writer without calling it leaves the stream unterminated on purpose
//! (fatal scan errors must not look like complete output).

use std::io::{self, BufWriter, Read, Write};

/// Bytes per on-disk record.
pub const RECORD_BYTES: usize = 32;

/// Output buffer size. 8x the default `BufWriter` buffer: clone-dense
/// corpora emit records in bursts and the consumer is the only writer.
const SINK_BUF_BYTES: usize = 64 * 1024;

/// One side of a pair: a token range within a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileSpan {
    pub file: i32,
    pub begin: i32,
    pub end: i32,
}

impl FileSpan {
    pub fn new(file: i32, begin: i32, end: i32) -> Self {
        Self { file, begin, end }
    }
}

/// One directed clone-pair record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairRecord {
    pub left: FileSpan,
    pub right: FileSpan,
    pub set_id: u64,
}

impl PairRecord {
    /// End-of-stream marker: all fields zero. Clone-set IDs start at 1, so
    /// no real record collides with it.
    pub const TERMINATOR: PairRecord = PairRecord {
        left: FileSpan {
            file: 0,
            begin: 0,
            end: 0,
        },
        right: FileSpan {
            file: 0,
            begin: 0,
            end: 0,
        },
        set_id: 0,
    };

    pub fn is_terminator(&self) -> bool {
        *self == Self::TERMINATOR
    }

    /// The same pair with left and right swapped.
    pub fn swapped(&self) -> PairRecord {
        PairRecord {
            left: self.right,
            right: self.left,
            set_id: self.set_id,
        }
    }

    fn encode(&self, buf: &mut [u8; RECORD_BYTES]) {
        buf[0..4].copy_from_slice(&self.left.file.to_le_bytes());
        buf[4..8].copy_from_slice(&self.left.begin.to_le_bytes());
        buf[8..12].copy_from_slice(&self.left.end.to_le_bytes());
        buf[12..16].copy_from_slice(&self.right.file.to_le_bytes());
        buf[16..20].copy_from_slice(&self.right.begin.to_le_bytes());
        buf[20..24].copy_from_slice(&self.right.end.to_le_bytes());
        buf[24..32].copy_from_slice(&self.set_id.to_le_bytes());
    }

    fn decode(buf: &[u8; RECORD_BYTES]) -> PairRecord {
        let i32_at = |o: usize| i32::from_le_bytes(buf[o..o + 4].try_into().unwrap());
        PairRecord {
            left: FileSpan::new(i32_at(0), i32_at(4), i32_at(8)),
            right: FileSpan::new(i32_at(12), i32_at(16), i32_at(20)),
            set_id: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
        }
    }
}

/// Buffered writer for the pair-record stream.
pub struct RecordWriter<W: Write> {
    out: BufWriter<W>,
    records: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            out: BufWriter::with_capacity(SINK_BUF_BYTES, inner),
            records: 0,
        }
    }

    /// Writes the record in both left/right orders.
    pub fn write_both(&mut self, record: &PairRecord) -> io::Result<()> {
        debug_assert!(!record.is_terminator());
        let mut buf = [0u8; RECORD_BYTES * 2];
        record.encode((&mut buf[..RECORD_BYTES]).try_into().unwrap());
        record
            .swapped()
            .encode((&mut buf[RECORD_BYTES..]).try_into().unwrap());
        self.out.write_all(&buf)?;
        self.records += 2;
        Ok(())
    }

    /// Directed records written so far (terminator excluded).
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Writes the terminator, flushes, and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let mut buf = [0u8; RECORD_BYTES];
        PairRecord::TERMINATOR.encode(&mut buf);
        self.out.write_all(&buf)?;
        self.out.flush()?;
        self.out
            .into_inner()
            .map_err(io::IntoInnerError::into_error)
    }
}

/// Reads directed records up to (not including) the terminator.
///
/// Fails with `UnexpectedEof` if the stream ends without one: an
/// unterminated stream is a truncated scan.
pub fn read_pairs<R: Read>(mut input: R) -> io::Result<Vec<PairRecord>> {
    let mut records = Vec::new();
    let mut buf = [0u8; RECORD_BYTES];
    loop {
        input.read_exact(&mut buf)?;
        let record = PairRecord::decode(&buf);
        if record.is_terminator() {
            return Ok(records);
        }
        records.push(record);
    }
}
