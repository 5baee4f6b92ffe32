//! # kvoracle - Differential Testing CLI
//!
//! Generates workload logs, replays them through the reference oracle, and
//! compares the oracle against an external engine.
//!
//! ## Commands
//!
//! ```text
//! generate N KEY VALUE         Seeded Gaussian workload of N records to stdout
//! simple-generate N KEY VALUE  Uniform-length workload of N records to stdout
//! oracle FILE...               Replay logs in order, print the dump ("-" = stdin)
//! compare [--self-check] [DIR] Run every base-*.in x test-*.in pair in DIR
//! ```
//!
//! Log text and dumps go to stdout; diagnostics go to stderr. See the
//! [`config`] crate for the `KVORACLE_*` environment variables.
//!
//! ## Example
//!
//! ```text
//! $ kvoracle generate 1000 8 32 > tests/base-g1k.in
//! $ kvoracle generate 200 4 4 > tests/test-g200.in
//! $ kvoracle oracle tests/base-g1k.in tests/test-g200.in | sort > expected.out
//! $ KVORACLE_ENGINE_WRITE=./engine-write KVORACLE_ENGINE_READ=./engine-read kvoracle compare tests
//!  [+] Test g1k-g200: ok!
//! ```

mod commands;

use anyhow::{bail, Result};
use config::Settings;
use generator::LengthModel;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: kvoracle <command> [args]

commands:
  generate N KEY VALUE          seeded Gaussian workload
  simple-generate N KEY VALUE   uniform-length workload
  oracle FILE...                replay logs and print the dump
  compare [--self-check] [DIR]  diff oracle against the engine for every pair";

/// Installs the stderr subscriber with `directive`, falling back to
/// [`config::DEFAULT_LOG`] when it does not parse.
fn init_logging(directive: &str) {
    let (filter, parse_error) = match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(config::DEFAULT_LOG), Some(e)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Some(e) = parse_error {
        warn!(var = config::ENV_LOG, value = %directive, error = %e, "ignoring invalid value, using default");
    }
}

fn main() -> Result<ExitCode> {
    let settings = Settings::from_env();
    init_logging(&settings.log_filter);
    settings.log_rejected();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cmd, rest) = match args.split_first() {
        Some((cmd, rest)) => (cmd.as_str(), rest),
        None => bail!("missing command\n\n{USAGE}"),
    };

    match cmd {
        "generate" => commands::generate(rest, LengthModel::Gaussian, &settings)?,
        "simple-generate" => commands::generate(rest, LengthModel::Uniform, &settings)?,
        "oracle" => commands::oracle(rest)?,
        "compare" => return commands::compare(rest, &settings),
        "help" | "-h" | "--help" => println!("{USAGE}"),
        other => bail!("unknown command: {other}\n\n{USAGE}"),
    }
    Ok(ExitCode::SUCCESS)
}
