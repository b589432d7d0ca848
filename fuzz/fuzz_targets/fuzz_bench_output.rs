#![no_main]

//! Fuzz the libtest bench output parser with arbitrary text.
//!
//! Parsing must never panic, every result name must carry the prefix, and
//! feeding the parsed results into a store must only ever produce
//! anomalies, never corrupt a series.

use benchmatrix::parser::parse_bench_output;
use benchmatrix::store::ResultStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if input.len() > 16384 {
        return;
    }

    let mut store = ResultStore::new(2);
    for round in 0..2 {
        for result in parse_bench_output(input, "suite") {
            assert!(result.benchmark.starts_with("suite/"));
            let _ = store.record(&result.benchmark, "cfg", round, result.sample);
        }
    }
    for benchmark in store.benchmarks() {
        let series = store.get(benchmark, "cfg").unwrap();
        assert!(series.len() <= 2);
    }

    // Parsing is a pure function of its input.
    let first: Vec<_> = parse_bench_output(input, "").collect();
    let second: Vec<_> = parse_bench_output(input, "").collect();
    assert_eq!(first, second);
});
