//! # Record - Workload Log Records
//!
//! The mutation vocabulary shared by the workload generator (encode side) and
//! the reference oracle (decode side), plus the line-oriented text format that
//! carries it to the engine under test.
//!
//! ## Text Format
//!
//! One record per line, tokens separated by ASCII whitespace:
//!
//! ```text
//! set <key> <value>
//! del <key>
//! write
//! reopen
//! gc
//! ```
//!
//! Blank lines carry no tokens and are skipped. Keys and values are single
//! whitespace-free tokens; that constraint is implied by the tokenization and
//! is not checked on encode.
//!
//! `write`, `reopen` and `gc` are checkpoint markers: an engine may flush,
//! restart or compact on them, but they never change the key-value state.
//!
//! ## Example
//!
//! ```rust,no_run
//! use record::{LogReader, LogRecord, LogWriter};
//!
//! let mut w = LogWriter::create("base-small.in").unwrap();
//! w.append(&LogRecord::Set {
//!     key: b"hello".to_vec(),
//!     value: b"world".to_vec(),
//! }).unwrap();
//! w.append(&LogRecord::Write).unwrap();
//! w.flush().unwrap();
//!
//! let mut r = LogReader::open("base-small.in").unwrap();
//! r.replay(|rec| println!("{}", rec)).unwrap();
//! ```

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::trace;

/// The action keyword at the start of every record line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Set,
    Delete,
    Write,
    Reopen,
    Gc,
}

impl Action {
    /// Every action, in keyword-table order.
    pub const ALL: [Action; 5] = [
        Action::Set,
        Action::Delete,
        Action::Write,
        Action::Reopen,
        Action::Gc,
    ];

    /// Looks up an action by its exact keyword. Keywords are lowercase and
    /// matched case-sensitively.
    pub fn from_keyword(token: &[u8]) -> Option<Action> {
        match token {
            b"set" => Some(Action::Set),
            b"del" => Some(Action::Delete),
            b"write" => Some(Action::Write),
            b"reopen" => Some(Action::Reopen),
            b"gc" => Some(Action::Gc),
            _ => None,
        }
    }

    /// The keyword written at the start of the line.
    pub fn keyword(self) -> &'static str {
        match self {
            Action::Set => "set",
            Action::Delete => "del",
            Action::Write => "write",
            Action::Reopen => "reopen",
            Action::Gc => "gc",
        }
    }

    /// Exact number of operands following the keyword.
    pub fn arity(self) -> usize {
        match self {
            Action::Set => 2,
            Action::Delete => 1,
            Action::Write | Action::Reopen | Action::Gc => 0,
        }
    }

    /// True for `write`, `reopen` and `gc`.
    pub fn is_checkpoint(self) -> bool {
        self.arity() == 0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A single line of a workload log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Insert or overwrite `key`.
    Set {
        /// The lookup key.
        key: Vec<u8>,
        /// The payload value.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// The key to remove.
        key: Vec<u8>,
    },
    /// Durability checkpoint (flush the pending batch).
    Write,
    /// Close and reopen the database.
    Reopen,
    /// Compaction trigger.
    Gc,
}

/// Why a line could not be decoded into a [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    /// The first token is not a known action keyword.
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    /// The operand count does not match the action.
    #[error("{action} takes {expected} operand(s), found {found}")]
    Arity {
        action: Action,
        expected: usize,
        found: usize,
    },
}

/// Errors that can occur while reading or writing a workload log.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A line failed to decode. `line` is 1-based.
    #[error("malformed record at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: MalformedRecord,
    },
}

impl LogRecord {
    pub fn action(&self) -> Action {
        match self {
            LogRecord::Set { .. } => Action::Set,
            LogRecord::Delete { .. } => Action::Delete,
            LogRecord::Write => Action::Write,
            LogRecord::Reopen => Action::Reopen,
            LogRecord::Gc => Action::Gc,
        }
    }

    /// Decodes one line (with or without its terminator).
    ///
    /// Returns `Ok(None)` for a line with no tokens.
    pub fn decode(line: &[u8]) -> Result<Option<LogRecord>, MalformedRecord> {
        let mut tokens = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty());

        let keyword = match tokens.next() {
            Some(k) => k,
            None => return Ok(None),
        };
        let action = Action::from_keyword(keyword).ok_or_else(|| {
            MalformedRecord::UnknownAction(String::from_utf8_lossy(keyword).into_owned())
        })?;

        let operands: Vec<&[u8]> = tokens.collect();
        if operands.len() != action.arity() {
            return Err(MalformedRecord::Arity {
                action,
                expected: action.arity(),
                found: operands.len(),
            });
        }

        let record = match action {
            Action::Set => LogRecord::Set {
                key: operands[0].to_vec(),
                value: operands[1].to_vec(),
            },
            Action::Delete => LogRecord::Delete {
                key: operands[0].to_vec(),
            },
            Action::Write => LogRecord::Write,
            Action::Reopen => LogRecord::Reopen,
            Action::Gc => LogRecord::Gc,
        };
        Ok(Some(record))
    }

    /// Appends the canonical text of this record to `out`, without a line
    /// terminator.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.action().keyword().as_bytes());
        match self {
            LogRecord::Set { key, value } => {
                out.push(b' ');
                out.extend_from_slice(key);
                out.push(b' ');
                out.extend_from_slice(value);
            }
            LogRecord::Delete { key } => {
                out.push(b' ');
                out.extend_from_slice(key);
            }
            LogRecord::Write | LogRecord::Reopen | LogRecord::Gc => {}
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Line-buffered log writer.
///
/// Each record is encoded into a scratch buffer and handed to the underlying
/// writer in a single `write_all` call.
pub struct LogWriter<W: Write> {
    out: W,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl LogWriter<BufWriter<File>> {
    /// Creates (or truncates) a log file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> LogWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            buf: Vec::with_capacity(128),
        }
    }

    /// Encodes `record` followed by `\n`.
    pub fn append(&mut self, record: &LogRecord) -> Result<(), RecordError> {
        self.buf.clear();
        record.encode(&mut self.buf);
        self.buf.push(b'\n');
        self.out.write_all(&self.buf)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RecordError> {
        self.out.flush()?;
        Ok(())
    }

    /// Returns the underlying writer. Does not flush.
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Sequential log reader.
///
/// Generic over any `Read` implementor so the same code path serves files,
/// stdin and in-memory buffers.
pub struct LogReader<R: Read> {
    rdr: BufReader<R>,
}

impl LogReader<File> {
    /// Opens an existing log file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LogReader<File>, RecordError> {
        let f = File::open(path)?;
        Ok(LogReader::from_reader(f))
    }
}

impl<R: Read> LogReader<R> {
    pub fn from_reader(reader: R) -> Self {
        LogReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Decodes every line and calls `apply` for each record, in order.
    ///
    /// Returns the number of records applied. The first malformed line stops
    /// the replay with [`RecordError::Malformed`]; records before it have
    /// already been passed to `apply`, so callers that need all-or-nothing
    /// semantics must discard their state on error.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<usize, RecordError>
    where
        F: FnMut(LogRecord),
    {
        let mut line = Vec::with_capacity(128);
        let mut line_no = 0usize;
        let mut applied = 0usize;

        loop {
            line.clear();
            if self.rdr.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_no += 1;

            match LogRecord::decode(&line) {
                Ok(Some(record)) => {
                    apply(record);
                    applied += 1;
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(RecordError::Malformed {
                        line: line_no,
                        source,
                    })
                }
            }
        }

        trace!(lines = line_no, records = applied, "log replay finished");
        Ok(applied)
    }
}

/// Decodes a whole in-memory log.
pub fn parse_log(text: &[u8]) -> Result<Vec<LogRecord>, RecordError> {
    let mut records = Vec::new();
    LogReader::from_reader(text).replay(|r| records.push(r))?;
    Ok(records)
}

#[cfg(test)]
mod tests;
