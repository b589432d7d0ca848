use std::fmt::Write as _;

use benchmatrix::aggregate::aggregate;
use benchmatrix::compare::compare;
use benchmatrix::config::ZeroBaselinePolicy;
use benchmatrix::parser::parse_bench_output;
use benchmatrix::report::{render_relative, render_tabular};
use benchmatrix::store::ResultStore;
use benchmatrix::suite::Configuration;
use criterion::{Criterion, criterion_group, criterion_main};

const ROUNDS: usize = 3;
const BENCHMARKS: usize = 500;

fn bench_output(round: usize) -> String {
    let mut text = String::from("\nrunning 500 tests\n");
    for i in 0..BENCHMARKS {
        let _ = writeln!(
            text,
            "test bench_{i:04} ... bench:     {},{:03} ns/iter (+/- {})",
            1 + i / 100,
            (i * 7 + round) % 1000,
            10 + i % 50
        );
    }
    text.push_str("\ntest result: ok. 0 passed; 0 failed; 0 ignored; 500 measured\n");
    text
}

fn configurations() -> Vec<Configuration> {
    ["purecap-bounds", "hybrid-bounds", "hybrid-nobounds"]
        .iter()
        .map(|n| Configuration::new(n, "aarch64-unknown-freebsd", ""))
        .collect()
}

fn filled_store() -> ResultStore {
    let outputs: Vec<String> = (0..ROUNDS).map(bench_output).collect();
    let mut store = ResultStore::new(ROUNDS);
    for configuration in configurations() {
        for (round, text) in outputs.iter().enumerate() {
            for result in parse_bench_output(text, "suite") {
                store
                    .record(&result.benchmark, &configuration.name, round, result.sample)
                    .unwrap();
            }
        }
    }
    store
}

fn bench_parse(c: &mut Criterion) {
    let text = bench_output(0);
    c.bench_function("parse_500_lines", |b| {
        b.iter(|| parse_bench_output(&text, "suite").count());
    });
}

fn bench_aggregate_compare(c: &mut Criterion) {
    let store = filled_store();
    let names: Vec<String> = store.benchmarks().map(str::to_owned).collect();
    c.bench_function("aggregate_compare_500", |b| {
        b.iter(|| {
            for name in &names {
                let base = aggregate(store.get(name, "hybrid-bounds").unwrap(), ROUNDS).unwrap();
                let other = aggregate(store.get(name, "purecap-bounds").unwrap(), ROUNDS).unwrap();
                compare(name, &base, &other).unwrap();
            }
        });
    });
}

fn bench_render(c: &mut Criterion) {
    let store = filled_store();
    let configurations = configurations();
    c.bench_function("render_both_reports_500", |b| {
        b.iter(|| {
            let tabular = render_tabular(&store, &configurations).unwrap();
            let relative = render_relative(
                &store,
                &configurations,
                "hybrid-bounds",
                ZeroBaselinePolicy::Skip,
            )
            .unwrap();
            tabular.len() + relative.len()
        });
    });
}

criterion_group!(benches, bench_parse, bench_aggregate_compare, bench_render);
criterion_main!(benches);
