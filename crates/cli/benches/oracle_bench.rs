use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use generator::WorkloadProfile;
use record::{parse_log, LogRecord, LogWriter};
use std::fs;
use tempfile::tempdir;

const N_RECORDS: usize = 10_000;

fn build_records() -> Vec<LogRecord> {
    WorkloadProfile::gaussian(N_RECORDS, 8, 32, 42)
        .generator()
        .unwrap()
        .collect()
}

fn build_log() -> Vec<u8> {
    let mut w = LogWriter::new(Vec::new());
    for r in &build_records() {
        w.append(r).unwrap();
    }
    w.into_inner()
}

fn oracle_replay_benchmark(c: &mut Criterion) {
    c.bench_function("oracle_replay_10k", |b| {
        b.iter_batched(
            build_records,
            |records| oracle::replay(records),
            BatchSize::SmallInput,
        );
    });
}

fn parse_log_benchmark(c: &mut Criterion) {
    let log = build_log();
    c.bench_function("parse_log_10k", |b| {
        b.iter(|| parse_log(&log).unwrap());
    });
}

fn replay_paths_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base-bench.in");
    let test = dir.path().join("test-bench.in");
    fs::write(&base, build_log()).unwrap();
    fs::write(&test, build_log()).unwrap();

    c.bench_function("oracle_replay_paths_2x10k", |b| {
        b.iter(|| oracle::replay_paths(&[&base, &test]).unwrap());
    });
}

fn dump_benchmark(c: &mut Criterion) {
    let state = oracle::replay(build_records());
    c.bench_function("oracle_write_dump_10k", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(state.approx_size() * 2);
            state.write_dump(&mut out).unwrap();
            out
        });
    });
}

criterion_group!(
    benches,
    oracle_replay_benchmark,
    parse_log_benchmark,
    replay_paths_benchmark,
    dump_benchmark
);
criterion_main!(benches);
