//! # Generator - Randomized Workload Logs
//!
//! Produces reproducible sequences of [`LogRecord`]s that exercise both the
//! reference oracle and the engine under test.
//!
//! ## Shape of a workload
//!
//! Every item is drawn independently:
//!
//! ```text
//! action   weight   operands
//! set      20/25    random key, "<uniq><padding>"
//! del       4/25    random key (independent draw, usually absent)
//! write     1/25    -
//! ```
//!
//! Keys are lowercase ASCII letters. Values are a decimal counter that grows
//! by one on every `set`, followed by a run of `_` padding, so every value
//! written is distinct and whitespace-free.
//!
//! ## Length models
//!
//! | Model      | Key / padding length                          | Seed              |
//! |------------|-----------------------------------------------|-------------------|
//! | `Uniform`  | exactly the configured parameter              | OS entropy unless given |
//! | `Gaussian` | `max(1, Normal(mu, 0.35 * mu))`, truncated    | required          |
//!
//! All randomness flows through one [`StdRng`] owned by the [`Generator`], so
//! the same profile always yields the same log.
//!
//! ## Example
//!
//! ```rust
//! use generator::WorkloadProfile;
//!
//! let profile = WorkloadProfile::gaussian(100, 8, 32, 42);
//! let records: Vec<_> = profile.generator().unwrap().collect();
//! assert_eq!(records.len(), 100);
//! ```

use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use record::{LogRecord, LogWriter, RecordError};
use std::io::Write;
use thiserror::Error;
use tracing::debug;

/// Seed used by the Gaussian variant when none is configured.
pub const DEFAULT_SEED: u64 = 0x7964_625f_7465_7374;

/// Standard deviation of the Gaussian lengths, as a fraction of the mean.
pub const LENGTH_SPREAD: f64 = 0.35;

/// Largest accepted key or value length parameter.
pub const MAX_TOKEN_LEN: usize = 1 << 20;

/// Characters keys are drawn from.
pub const KEY_ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Value padding character.
pub const PADDING: u8 = b'_';

/// Errors raised while building a generator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// How key and padding lengths are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthModel {
    /// Length parameters are used as-is.
    Uniform,
    /// Lengths follow a normal distribution around the parameter.
    Gaussian,
}

/// Relative weights of the generated actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionWeights {
    pub set: u32,
    pub delete: u32,
    pub write: u32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            set: 20,
            delete: 4,
            write: 1,
        }
    }
}

/// Parameters controlling the statistical shape of a generated log.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadProfile {
    /// Number of records to generate.
    pub items: usize,
    /// Key length (uniform) or mean key length (Gaussian).
    pub key_len: usize,
    /// Padding length (uniform) or mean padding length (Gaussian).
    pub value_len: usize,
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
    pub lengths: LengthModel,
    pub weights: ActionWeights,
}

impl WorkloadProfile {
    /// Uniform lengths, unseeded. Meant for quick smoke data.
    pub fn simple(items: usize, key_len: usize, value_len: usize) -> Self {
        Self {
            items,
            key_len,
            value_len,
            seed: None,
            lengths: LengthModel::Uniform,
            weights: ActionWeights::default(),
        }
    }

    /// Gaussian lengths with an explicit seed. Meant for regression corpora.
    pub fn gaussian(items: usize, key_len: usize, value_len: usize, seed: u64) -> Self {
        Self {
            items,
            key_len,
            value_len,
            seed: Some(seed),
            lengths: LengthModel::Gaussian,
            weights: ActionWeights::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_weights(mut self, weights: ActionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Builds a profile from the three positional parameters
    /// `ITEMS KEY_LEN VALUE_LEN`.
    ///
    /// The Gaussian model is seeded with [`DEFAULT_SEED`]; the uniform model
    /// is left unseeded. Callers override with [`WorkloadProfile::with_seed`].
    pub fn from_args(args: &[String], lengths: LengthModel) -> Result<Self, GeneratorError> {
        if args.len() != 3 {
            return Err(GeneratorError::InvalidParameters(format!(
                "expected 3 parameters (items key_len value_len), got {}",
                args.len()
            )));
        }
        let items = positive(&args[0], "items")?;
        let key_len = positive(&args[1], "key_len")?;
        let value_len = positive(&args[2], "value_len")?;

        Ok(match lengths {
            LengthModel::Uniform => Self::simple(items, key_len, value_len),
            LengthModel::Gaussian => Self::gaussian(items, key_len, value_len, DEFAULT_SEED),
        })
    }

    /// Creates the record stream described by this profile.
    pub fn generator(&self) -> Result<Generator, GeneratorError> {
        Generator::new(self)
    }
}

fn positive(raw: &str, name: &str) -> Result<usize, GeneratorError> {
    let n: i64 = raw.trim().parse().map_err(|_| {
        GeneratorError::InvalidParameters(format!("{name} must be an integer, got {raw:?}"))
    })?;
    if n <= 0 {
        return Err(GeneratorError::InvalidParameters(format!(
            "{name} must be positive, got {n}"
        )));
    }
    usize::try_from(n)
        .map_err(|_| GeneratorError::InvalidParameters(format!("{name} is too large: {n}")))
}

/// A length distribution that never yields 0.
#[derive(Debug, Clone, Copy)]
enum LengthDraw {
    Fixed(usize),
    Normal(Normal<f64>),
}

impl LengthDraw {
    fn new(mean: usize, model: LengthModel, name: &str) -> Result<Self, GeneratorError> {
        if mean == 0 {
            return Err(GeneratorError::InvalidParameters(format!(
                "{name} must be positive"
            )));
        }
        if mean > MAX_TOKEN_LEN {
            return Err(GeneratorError::InvalidParameters(format!(
                "{name} must be at most {MAX_TOKEN_LEN}, got {mean}"
            )));
        }
        match model {
            LengthModel::Uniform => Ok(LengthDraw::Fixed(mean)),
            LengthModel::Gaussian => {
                let mu = mean as f64;
                Normal::new(mu, LENGTH_SPREAD * mu)
                    .map(LengthDraw::Normal)
                    .map_err(|e| GeneratorError::InvalidParameters(format!("{name}: {e}")))
            }
        }
    }

    fn sample(&self, rng: &mut StdRng) -> usize {
        match self {
            LengthDraw::Fixed(n) => (*n).max(1),
            LengthDraw::Normal(d) => {
                let x = d.sample(rng);
                // non-positive draws clamp to 1 so tokens are never empty
                if x >= 1.0 {
                    x as usize
                } else {
                    1
                }
            }
        }
    }
}

/// Lazy, finite stream of generated records.
pub struct Generator {
    rng: StdRng,
    actions: WeightedIndex<u32>,
    key_len: LengthDraw,
    value_len: LengthDraw,
    remaining: usize,
    /// Value prefix; incremented before every `set`.
    uniq: u64,
}

impl Generator {
    pub fn new(profile: &WorkloadProfile) -> Result<Self, GeneratorError> {
        let w = profile.weights;
        let actions = WeightedIndex::new([w.set, w.delete, w.write])
            .map_err(|e| GeneratorError::InvalidParameters(format!("action weights: {e}")))?;
        let key_len = LengthDraw::new(profile.key_len, profile.lengths, "key_len")?;
        let value_len = LengthDraw::new(profile.value_len, profile.lengths, "value_len")?;

        let mut rng = match profile.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let uniq = rng.random_range(0..=1u64 << 32);

        debug!(
            items = profile.items,
            key_len = profile.key_len,
            value_len = profile.value_len,
            seed = ?profile.seed,
            lengths = ?profile.lengths,
            "workload generator ready"
        );

        Ok(Self {
            rng,
            actions,
            key_len,
            value_len,
            remaining: profile.items,
            uniq,
        })
    }

    fn random_key(&mut self) -> Vec<u8> {
        let len = self.key_len.sample(&mut self.rng);
        (0..len)
            .map(|_| KEY_ALPHABET[self.rng.random_range(0..KEY_ALPHABET.len())])
            .collect()
    }

    fn next_value(&mut self) -> Vec<u8> {
        self.uniq += 1;
        let pad = self.value_len.sample(&mut self.rng);
        let mut value = self.uniq.to_string().into_bytes();
        value.resize(value.len() + pad, PADDING);
        value
    }

    /// Writes every remaining record to `out` and flushes it.
    ///
    /// Returns the number of records written.
    pub fn write_to<W: Write>(self, out: &mut LogWriter<W>) -> Result<usize, RecordError> {
        let mut written = 0usize;
        for record in self {
            out.append(&record)?;
            written += 1;
        }
        out.flush()?;
        Ok(written)
    }
}

impl Iterator for Generator {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        // draw order (action, key, value) is part of the reproducibility contract
        let record = match self.actions.sample(&mut self.rng) {
            0 => {
                let key = self.random_key();
                let value = self.next_value();
                LogRecord::Set { key, value }
            }
            1 => LogRecord::Delete {
                key: self.random_key(),
            },
            _ => LogRecord::Write,
        };
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Generator {}

/// `count` bare `write` records, for appending as a separate log segment.
pub fn checkpoint_segment(count: usize) -> impl Iterator<Item = LogRecord> {
    std::iter::repeat(LogRecord::Write).take(count)
}
