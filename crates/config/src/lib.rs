//! # Config - Harness Settings
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! KVORACLE_SEED            seed override for both generators   (default: unset)
//! KVORACLE_LOG             tracing filter directive            (default: "warn")
//! KVORACLE_TESTS_DIR       base-*.in / test-*.in directory     (default: "tests")
//! KVORACLE_WORK_DIR        parent of per-pair scratch dirs     (default: system temp dir)
//! KVORACLE_ENGINE_WRITE    engine writer command               (default: "engine-write")
//! KVORACLE_ENGINE_READ     engine reader command               (default: "engine-read")
//! KVORACLE_ENGINE_TIMEOUT  per-command timeout in seconds      (default: 60)
//! ```
//!
//! Engine commands are split on whitespace into a program and its arguments;
//! the database directory is appended as the last argument when the driver
//! runs them.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const ENV_SEED: &str = "KVORACLE_SEED";
pub const ENV_LOG: &str = "KVORACLE_LOG";
pub const ENV_TESTS_DIR: &str = "KVORACLE_TESTS_DIR";
pub const ENV_WORK_DIR: &str = "KVORACLE_WORK_DIR";
pub const ENV_ENGINE_WRITE: &str = "KVORACLE_ENGINE_WRITE";
pub const ENV_ENGINE_READ: &str = "KVORACLE_ENGINE_READ";
pub const ENV_ENGINE_TIMEOUT: &str = "KVORACLE_ENGINE_TIMEOUT";

/// Default tracing filter.
pub const DEFAULT_LOG: &str = "warn";
/// Default per-command engine timeout in seconds.
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 60;

/// A program plus its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Splits `raw` on whitespace. Returns `None` for an empty string.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Resolved harness settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub seed: Option<u64>,
    /// Tracing filter directive. Validated by whoever installs the
    /// subscriber.
    pub log_filter: String,
    pub tests_dir: PathBuf,
    pub work_dir: PathBuf,
    pub engine_write: CommandLine,
    pub engine_read: CommandLine,
    pub engine_timeout: Duration,
    /// Variables whose values were ignored, with the raw value.
    pub rejected: Vec<(&'static str, String)>,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns the raw value of a
    /// variable if set. Blank values count as unset.
    ///
    /// Unparsable values fall back to their default and are recorded in
    /// [`Settings::rejected`]; nothing is logged here because this usually
    /// runs before a subscriber exists. See [`Settings::log_rejected`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut rejected = Vec::new();

        let seed = match get(ENV_SEED) {
            Some(raw) => match parse_seed(&raw) {
                Some(seed) => Some(seed),
                None => {
                    rejected.push((ENV_SEED, raw));
                    None
                }
            },
            None => None,
        };

        let engine_timeout = match get(ENV_ENGINE_TIMEOUT) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    rejected.push((ENV_ENGINE_TIMEOUT, raw));
                    DEFAULT_ENGINE_TIMEOUT_SECS
                }
            },
            None => DEFAULT_ENGINE_TIMEOUT_SECS,
        };

        let command = |key: &str, default: &str| {
            get(key)
                .and_then(|raw| CommandLine::parse(&raw))
                .unwrap_or_else(|| CommandLine {
                    program: default.to_string(),
                    args: Vec::new(),
                })
        };

        Self {
            seed,
            log_filter: get(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG.to_string()),
            tests_dir: get(ENV_TESTS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tests")),
            work_dir: get(ENV_WORK_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            engine_write: command(ENV_ENGINE_WRITE, "engine-write"),
            engine_read: command(ENV_ENGINE_READ, "engine-read"),
            engine_timeout: Duration::from_secs(engine_timeout),
            rejected,
        }
    }

    /// Logs every rejected value at `warn`.
    pub fn log_rejected(&self) {
        for (var, value) in &self.rejected {
            warn!(var = *var, value = %value, "ignoring invalid value, using default");
        }
    }
}

/// Accepts decimal or `0x`-prefixed hexadecimal.
fn parse_seed(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
