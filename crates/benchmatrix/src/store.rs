//! Accumulated results for a whole matrix run.
//!
//! Maps benchmark name → configuration name → [`RoundSeries`].  Benchmarks
//! keep first-observation order so both reports list them in the order the
//! matrix produced them.  Entries are created lazily; a configuration that
//! never produced a line for a benchmark simply has no entry, which
//! [`ResultStore::get`] reports as `None`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::anomaly::Anomaly;
use crate::sample::{RoundSeries, Sample};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    pub benchmark: String,
    pub series: BTreeMap<String, RoundSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultStore {
    rounds: usize,
    entries: Vec<BenchmarkEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ResultStore {
    /// Create an empty store for series of exactly `rounds` samples.
    #[must_use]
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Configured round count.
    #[must_use]
    pub const fn rounds(&self) -> usize {
        self.rounds
    }

    /// Append `sample` as round `round` of (`benchmark`, `configuration`).
    ///
    /// `round` must equal the current series length and be below the
    /// configured round count.  Anything else is rejected and returned as an
    /// [`Anomaly`]; the stored series is left untouched.
    pub fn record(
        &mut self,
        benchmark: &str,
        configuration: &str,
        round: usize,
        sample: Sample,
    ) -> Result<(), Anomaly> {
        let current = self.get(benchmark, configuration).map_or(0, RoundSeries::len);
        if round != current {
            return Err(Anomaly::OutOfOrderRound {
                benchmark: benchmark.to_owned(),
                configuration: configuration.to_owned(),
                expected: current,
                got: round,
            });
        }
        if current >= self.rounds {
            return Err(Anomaly::RoundOverflow {
                benchmark: benchmark.to_owned(),
                configuration: configuration.to_owned(),
                rounds: self.rounds,
            });
        }

        let slot = match self.index.get(benchmark) {
            Some(&slot) => slot,
            None => {
                self.entries.push(BenchmarkEntry {
                    benchmark: benchmark.to_owned(),
                    series: BTreeMap::new(),
                });
                let slot = self.entries.len() - 1;
                self.index.insert(benchmark.to_owned(), slot);
                slot
            }
        };
        self.entries[slot]
            .series
            .entry(configuration.to_owned())
            .or_default()
            .push(sample);
        Ok(())
    }

    /// Series for (`benchmark`, `configuration`), or `None` when that
    /// configuration never produced a result for the benchmark.
    #[must_use]
    pub fn get(&self, benchmark: &str, configuration: &str) -> Option<&RoundSeries> {
        let slot = *self.index.get(benchmark)?;
        self.entries[slot].series.get(configuration)
    }

    /// Benchmark names in first-observation order.
    pub fn benchmarks(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.benchmark.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the name index after deserialization.
    #[must_use]
    pub fn reindexed(mut self) -> Self {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, e)| (e.benchmark.clone(), slot))
            .collect();
        self
    }
}
