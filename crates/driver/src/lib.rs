//! # Driver - Differential Comparison
//!
//! Feeds the same workload to the reference oracle and to an engine under
//! test, normalizes both dumps and diffs them.
//!
//! ## Flow per pair
//!
//! ```text
//! base-<b>.in ─┐
//!              ├─> oracle (base then test) ──> dump ─> normalize ─┐
//! test-<t>.in ─┘                                                  ├─> equal?
//!              └─> cat base test | engine ──> dump ─> normalize ──┘
//! ```
//!
//! Normalization re-fingerprints every key with [`oracle::fingerprint`] and
//! sorts the rendered lines, so neither the engine's hash algorithm nor its
//! iteration order affects the result. A mismatch is reported with a
//! diff-style listing and never retried: workloads are deterministic.
//!
//! | Module        | Purpose                                         |
//! |---------------|-------------------------------------------------|
//! | [`pairs`]     | `base-*.in` x `test-*.in` discovery             |
//! | [`engine`]    | `EngineUnderTest` trait, process and oracle adapters |
//! | [`normalize`] | dump parsing, sorting, sorted diff              |

pub mod engine;
pub mod normalize;
pub mod pairs;

pub use engine::{EngineUnderTest, OracleEngine, ProcessEngine};
pub use normalize::{diff_sorted, normalize, DiffLine};
pub use pairs::{discover_pairs, TestPair};

use oracle::{DumpError, OracleError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while running a pair.
#[derive(Debug, Error)]
pub enum DriverError {
    /// An underlying I/O error (reading logs, creating scratch dirs, spawning).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The oracle rejected the workload.
    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    /// The engine exited unsuccessfully.
    #[error("{engine} failed: {message}")]
    Engine { engine: String, message: String },

    /// The engine did not finish in time and was killed.
    #[error("{engine} timed out after {after:?}")]
    Timeout { engine: String, after: Duration },

    /// A dump line could not be parsed. `line` is 1-based.
    #[error("unparsable dump line {line}: {source}")]
    BadDump {
        line: usize,
        #[source]
        source: DumpError,
    },

    /// Oracle and engine disagree.
    #[error("pair {pair}: oracle and engine disagree\n{diff}")]
    Mismatch { pair: String, diff: String },
}

/// Outcome of [`Driver::run_all`].
#[derive(Debug, Default)]
pub struct Summary {
    pub passed: Vec<String>,
    pub failed: Vec<(String, DriverError)>,
}

impl Summary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// Runs pairs against one engine. Each pair gets a private scratch directory
/// under `work_dir`, removed when the pair finishes.
pub struct Driver<E: EngineUnderTest> {
    engine: E,
    work_dir: PathBuf,
}

impl<E: EngineUnderTest> Driver<E> {
    pub fn new<P: AsRef<Path>>(engine: E, work_dir: P) -> Self {
        Self {
            engine,
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Oracle dump of `base` then `test`, normalized.
    pub fn expected(&self, pair: &TestPair) -> Result<Vec<Vec<u8>>, DriverError> {
        let state = oracle::replay_paths(&[&pair.base, &pair.test])?;
        let mut dump = Vec::new();
        state.write_dump(&mut dump)?;
        normalize(&dump)
    }

    /// Engine dump after feeding it `base ++ test`, normalized.
    pub fn actual(&self, pair: &TestPair) -> Result<Vec<Vec<u8>>, DriverError> {
        let mut logs = fs::read(&pair.base)?;
        logs.extend_from_slice(&fs::read(&pair.test)?);

        fs::create_dir_all(&self.work_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", pair.name))
            .tempdir_in(&self.work_dir)?;
        let db_dir = scratch.path().join("db");

        debug!(pair = %pair.name, engine = self.engine.name(), db = %db_dir.display(), "running engine");
        let dump = self.engine.load_and_dump(&logs, &db_dir)?;
        normalize(&dump)
    }

    /// Compares oracle and engine for one pair.
    pub fn run_pair(&self, pair: &TestPair) -> Result<(), DriverError> {
        let expected = self.expected(pair)?;
        let actual = self.actual(pair)?;

        if expected == actual {
            info!(pair = %pair.name, keys = expected.len(), "pair ok");
            return Ok(());
        }

        let diff: Vec<String> = diff_sorted(&expected, &actual)
            .iter()
            .map(|d| d.to_string())
            .collect();
        warn!(pair = %pair.name, differing = diff.len(), "pair mismatch");
        Err(DriverError::Mismatch {
            pair: pair.name.clone(),
            diff: diff.join("\n"),
        })
    }

    /// Runs every pair, collecting failures instead of stopping at the first.
    pub fn run_all(&self, pairs: &[TestPair]) -> Summary {
        self.run_each(pairs, |_, _| {})
    }

    /// Like [`Driver::run_all`], but hands each outcome to `report` as soon
    /// as its pair finishes, in `pairs` order.
    pub fn run_each<F>(&self, pairs: &[TestPair], mut report: F) -> Summary
    where
        F: FnMut(&TestPair, &Result<(), DriverError>),
    {
        let mut summary = Summary::default();
        for pair in pairs {
            let outcome = self.run_pair(pair);
            report(pair, &outcome);
            match outcome {
                Ok(()) => summary.passed.push(pair.name.clone()),
                Err(e) => summary.failed.push((pair.name.clone(), e)),
            }
        }
        info!(
            passed = summary.passed.len(),
            failed = summary.failed.len(),
            "comparison finished"
        );
        summary
    }
}
