//! Test-pair discovery.
//!
//! A tests directory holds base logs (`base-<name>.in`) and test logs
//! (`test-<name>.in`). Every base is paired with every test; the pair is named
//! `<base name>-<test name>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPair {
    pub name: String,
    pub base: PathBuf,
    pub test: PathBuf,
}

/// `name` from `<prefix>-<name>.in`.
fn log_name<'a>(file_name: &'a str, prefix: &str) -> Option<&'a str> {
    file_name
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(".in")
}

/// Lists all base x test combinations in `dir`, sorted by pair name.
pub fn discover_pairs<P: AsRef<Path>>(dir: P) -> io::Result<Vec<TestPair>> {
    let mut bases = Vec::new();
    let mut tests = Vec::new();

    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if let Some(name) = log_name(&file_name, "base") {
            bases.push((name.to_string(), path.clone()));
        } else if let Some(name) = log_name(&file_name, "test") {
            tests.push((name.to_string(), path.clone()));
        }
    }

    let mut pairs: Vec<TestPair> = bases
        .iter()
        .flat_map(|(b, base)| {
            tests.iter().map(move |(t, test)| TestPair {
                name: format!("{b}-{t}"),
                base: base.clone(),
                test: test.clone(),
            })
        })
        .collect();
    pairs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.base.cmp(&b.base)));
    Ok(pairs)
}
