//! # Oracle - Reference State Machine
//!
//! The trusted in-memory model that defines what final key-value mapping a
//! workload log must produce. Every engine under test is diffed against the
//! dump produced here.
//!
//! ## Semantics
//!
//! Replay is a sequential fold over the records, in log order:
//!
//! ```text
//! set k v   -> state[k] = v           (insert or overwrite)
//! del k     -> state.remove(k)        (absent key: no-op)
//! write     -> no change
//! reopen    -> no change
//! gc        -> no change
//! ```
//!
//! The checkpoint markers exist so that generated logs look like real engine
//! traffic; the oracle treats them as semantically transparent. There is no
//! open/closed state and no batching: record order is the only ordering
//! contract.
//!
//! When several logs are replayed (a "base" log followed by a "test" log) they
//! are applied in argument order into the same state. A malformed record in
//! any of them aborts the whole replay and no state is returned.
//!
//! ## Example
//!
//! ```rust
//! use oracle::replay;
//! use record::parse_log;
//!
//! let records = parse_log(b"set a 1\ndel a\nset a 2\nwrite\n").unwrap();
//! let state = replay(records);
//! assert_eq!(state.get(b"a"), Some(&b"2"[..]));
//! ```

mod dump;

pub use dump::{fingerprint, DumpError, DumpLine};

use record::{LogReader, LogRecord, RecordError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while replaying logs from readers or files.
#[derive(Debug, Error)]
pub enum OracleError {
    /// A log could not be opened or decoded. `input` names the offending log.
    #[error("{input}: {source}")]
    Log {
        input: String,
        #[source]
        source: RecordError,
    },
}

/// The final key-value mapping of a replay.
///
/// Keys are unique; iteration order is by key, which callers must not rely on
/// for comparison (dumps are sorted by fingerprint downstream).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Sum of live key and value lengths.
    approx_size: usize,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let added = key.len() + value.len();
        if let Some(old) = self.map.get(&key) {
            self.approx_size = self.approx_size.saturating_sub(key.len() + old.len());
        }
        self.approx_size += added;
        self.map.insert(key, value);
    }

    /// Removes `key` if present. Returns whether anything was removed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        match self.map.remove(key) {
            Some(old) => {
                self.approx_size = self.approx_size.saturating_sub(key.len() + old.len());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(|v| v.as_slice())
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.map.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    /// One [`DumpLine`] per surviving key.
    pub fn dump_lines(&self) -> impl Iterator<Item = DumpLine> + '_ {
        self.iter().map(|(k, v)| DumpLine::new(k.to_vec(), v.to_vec()))
    }

    /// Writes the dump, one `hash=… key=… value=…` line per key.
    ///
    /// Lines are not sorted by fingerprint; the comparison driver sorts.
    pub fn write_dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        let mut buf = Vec::with_capacity(128);
        for line in self.dump_lines() {
            buf.clear();
            line.render(&mut buf);
            buf.push(b'\n');
            out.write_all(&buf)?;
        }
        out.flush()
    }
}

/// Counters collected during one replay. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub sets: u64,
    pub deletes: u64,
    /// Deletes whose key was not present at the time.
    pub absent_deletes: u64,
    /// `write`, `reopen` and `gc` records.
    pub checkpoints: u64,
}

/// Incremental replay: feed records with [`Oracle::apply`], then take the
/// result with [`Oracle::finish`].
#[derive(Debug, Default)]
pub struct Oracle {
    state: StoreState,
    stats: ReplayStats,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a single record to the state.
    pub fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::Set { key, value } => {
                self.stats.sets += 1;
                self.state.set(key, value);
            }
            LogRecord::Delete { key } => {
                self.stats.deletes += 1;
                if !self.state.delete(&key) {
                    self.stats.absent_deletes += 1;
                }
            }
            LogRecord::Write | LogRecord::Reopen | LogRecord::Gc => {
                self.stats.checkpoints += 1;
            }
        }
    }

    /// Current state, without consuming the oracle.
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    pub fn finish(self) -> StoreState {
        debug!(
            keys = self.state.len(),
            approx_size = self.state.approx_size(),
            sets = self.stats.sets,
            deletes = self.stats.deletes,
            absent_deletes = self.stats.absent_deletes,
            checkpoints = self.stats.checkpoints,
            "oracle replay complete"
        );
        self.state
    }
}

/// Folds `records` into a fresh state.
pub fn replay<I>(records: I) -> StoreState
where
    I: IntoIterator<Item = LogRecord>,
{
    let mut oracle = Oracle::new();
    for record in records {
        oracle.apply(record);
    }
    oracle.finish()
}

/// Replays named log streams in order into one state.
///
/// Each entry is `(name, reader)`; the name only appears in errors. On the
/// first malformed record the partially built state is dropped.
pub fn replay_readers<R, I>(inputs: I) -> Result<StoreState, OracleError>
where
    R: Read,
    I: IntoIterator<Item = (String, R)>,
{
    let mut oracle = Oracle::new();
    for (name, reader) in inputs {
        let applied = LogReader::from_reader(reader)
            .replay(|r| oracle.apply(r))
            .map_err(|source| OracleError::Log {
                input: name.clone(),
                source,
            })?;
        debug!(input = %name, records = applied, "log applied");
    }
    Ok(oracle.finish())
}

/// Replays log files in argument order (base logs first, test log last).
pub fn replay_paths<P: AsRef<Path>>(paths: &[P]) -> Result<StoreState, OracleError> {
    let mut inputs: Vec<(String, File)> = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| OracleError::Log {
            input: name.clone(),
            source: RecordError::Io(e),
        })?;
        inputs.push((name, file));
    }
    replay_readers(inputs)
}
