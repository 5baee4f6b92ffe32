use anyhow::{bail, Context, Result};
use config::Settings;
use driver::{discover_pairs, Driver, EngineUnderTest, OracleEngine, ProcessEngine, TestPair};
use generator::{LengthModel, WorkloadProfile};
use record::LogWriter;
use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};

/// `generate` / `simple-generate`.
///
/// Parameters are validated and the generator is built before anything is
/// written, so bad input never produces partial output.
pub fn generate(args: &[String], lengths: LengthModel, settings: &Settings) -> Result<()> {
    let mut profile = WorkloadProfile::from_args(args, lengths)?;
    if let Some(seed) = settings.seed {
        profile = profile.with_seed(seed);
    }
    let records = profile.generator()?;

    let stdout = io::stdout();
    let mut out = LogWriter::new(BufWriter::new(stdout.lock()));
    let written = records
        .write_to(&mut out)
        .context("failed to write workload")?;
    debug!(records = written, "workload written");
    Ok(())
}

/// `oracle FILE...`: replays the inputs in order and prints the dump.
pub fn oracle(inputs: &[String]) -> Result<()> {
    if inputs.is_empty() {
        bail!("oracle: expected at least one log file (\"-\" for stdin)");
    }

    let mut readers: Vec<(String, Box<dyn Read>)> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let reader: Box<dyn Read> = if input == "-" {
            Box::new(io::stdin())
        } else {
            Box::new(File::open(input).with_context(|| format!("cannot open {input}"))?)
        };
        readers.push((input.clone(), reader));
    }

    // nothing is printed unless every input replays cleanly
    let state = oracle::replay_readers(readers)?;
    let stdout = io::stdout();
    state
        .write_dump(BufWriter::new(stdout.lock()))
        .context("failed to write dump")?;
    Ok(())
}

/// `compare [--self-check] [DIR]`.
pub fn compare(args: &[String], settings: &Settings) -> Result<ExitCode> {
    let mut self_check = false;
    let mut dir: Option<PathBuf> = None;
    for arg in args {
        match arg.as_str() {
            "--self-check" => self_check = true,
            flag if flag.starts_with("--") => bail!("compare: unknown flag {flag}"),
            path if dir.is_none() => dir = Some(PathBuf::from(path)),
            extra => bail!("compare: unexpected argument {extra}"),
        }
    }
    let dir = dir.unwrap_or_else(|| settings.tests_dir.clone());

    let pairs = discover_pairs(&dir)
        .with_context(|| format!("cannot list test logs in {}", dir.display()))?;
    if pairs.is_empty() {
        warn!(dir = %dir.display(), "no base-*.in / test-*.in pairs found");
    }

    let failed = if self_check {
        run_pairs(Driver::new(OracleEngine, &settings.work_dir), &pairs)
    } else {
        run_pairs(
            Driver::new(ProcessEngine::from_settings(settings), &settings.work_dir),
            &pairs,
        )
    };

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Prints one status line per pair in pair order, diffs to stderr. Returns
/// the failure count.
fn run_pairs<E: EngineUnderTest>(driver: Driver<E>, pairs: &[TestPair]) -> usize {
    let summary = driver.run_each(pairs, |pair, outcome| match outcome {
        Ok(()) => println!(" [+] Test {}: ok!", pair.name),
        Err(err) => {
            println!(" [!] Test {}: FAILED", pair.name);
            eprintln!("{err}");
        }
    });
    summary.failed.len()
}
