// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Statistical testing of an RNGs output.
//!
//! Every test implements [`StatTest`]: one call of `run` draws what it
//! needs from a [`GeneratorStream`] and appends one p-value per series to
//! its [`TestContext`]s. The runner repeats that `psamples` times and
//! assesses each series with a Kolmogorov-Smirnov test.

use std::ops::Mul;

use log::{debug, info, warn};

use crate::{
    error::ResourceError,
    selector::{GeneratorStream, SeedStrategy},
    stats, strings,
};

const P_LOG_STAT_PASS: f64 = 2.0;
const P_LOG_STAT_LIMIT: f64 = 3.0;

/// Fixed properties of a test.
#[derive(Debug)]
pub struct TestDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub psamples_std: usize,
    pub tsamples_std: usize,
}

/// Bookkeeping for one p-value series of a test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestContext {
    /// Samples drawn per run.
    pub tsamples: usize,
    pub psamples: usize,
    /// Tuple width the series belongs to, 0 if not applicable.
    pub ntuple: u32,
    /// One p-value per run, in run order.
    pub pvalues: Vec<f64>,
}

impl TestContext {
    pub fn new(tsamples: usize, psamples: usize) -> Self {
        TestContext {
            tsamples,
            psamples,
            ntuple: 0,
            pvalues: Vec::with_capacity(psamples),
        }
    }

    /// Store the p-value of run `irun`.
    pub fn record(&mut self, irun: usize, p: f64) {
        debug_assert_eq!(self.pvalues.len(), irun, "runs must be recorded in order");
        self.pvalues.push(p);
    }
}

pub trait StatTest {
    fn descriptor(&self) -> &TestDescriptor;

    /// Number of p-value series one run produces.
    fn series(&self) -> usize {
        1
    }

    /// Samples per run to use when `requested` were asked for.
    fn tsamples(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.descriptor().tsamples_std)
    }

    /// Perform run `irun`, appending to every context in `tests`.
    fn run(&self, stream: &mut GeneratorStream, tests: &mut [TestContext], irun: usize);
}

/// How a battery is driven.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Runs per test, `None` for each test's default.
    pub psamples: Option<usize>,
    /// Samples per run, `None` for each test's default.
    pub tsamples: Option<usize>,
    pub strategy: SeedStrategy,
}

/// Run `test` `psamples` times on `stream`.
pub fn run_test(
    test: &dyn StatTest,
    stream: &mut GeneratorStream,
    settings: &RunSettings,
) -> Result<Vec<TestContext>, ResourceError> {
    let descriptor = test.descriptor();
    let psamples = settings.psamples.unwrap_or(descriptor.psamples_std);
    let tsamples = test.tsamples(settings.tsamples);
    stream.reseed(settings.strategy)?;
    info!(
        "{} ({}) on {}: {} runs of {} samples",
        descriptor.name,
        descriptor.description,
        stream.name(),
        psamples,
        tsamples
    );
    let mut tests = vec![TestContext::new(tsamples, psamples); test.series()];
    for irun in 0..psamples {
        let rewinds = stream.rewinds();
        test.run(stream, &mut tests, irun);
        if stream.rewinds() != rewinds {
            warn!(
                "{} run {} read past the end of its input file, its p-values are suspect",
                descriptor.name, irun
            );
        }
    }
    Ok(tests)
}

/// Logarithmic quantity to specify how close to 1.0 or 0.0 a p-value is.
/// Has a range of 0-9.9999.
/// -0.2 * (log2(min(p, 1-p)) - 1) clamped to 9.9999
fn p_log_stat(p: f64) -> f64 {
    (p.min(1.0 - p).log2() - 1.0).mul(-0.2).min(9.9999)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assessment {
    Passed,
    Marginal,
    Failed,
}

/// Final verdict on one p-value series.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub name: &'static str,
    pub ntuple: u32,
    pub psamples: usize,
    /// Uniformity p-value over all runs.
    pub p: f64,
}

impl TestResult {
    pub fn logstat(&self) -> f64 {
        p_log_stat(self.p)
    }

    pub fn assessment(&self) -> Assessment {
        let logstat = self.logstat();
        if logstat.is_nan() || logstat >= P_LOG_STAT_LIMIT {
            Assessment::Failed
        } else if logstat >= P_LOG_STAT_PASS {
            Assessment::Marginal
        } else {
            Assessment::Passed
        }
    }

    pub fn passed(&self) -> bool {
        self.assessment() != Assessment::Failed
    }

    pub fn format(&self) -> String {
        format!(
            "{:<20} ntup: {:>2}  runs: {:>4}     p: {:.6}     pls: {:.4}   - {}",
            self.name,
            self.ntuple,
            self.psamples,
            self.p,
            self.logstat(),
            match self.assessment() {
                Assessment::Passed => strings::PASS_STR,
                Assessment::Marginal => strings::MARGINAL_STR,
                Assessment::Failed => strings::FAIL_STR,
            }
        )
    }
}

/// Reduce every series of `test` to a [`TestResult`].
pub fn assess(test: &dyn StatTest, tests: &[TestContext]) -> Vec<TestResult> {
    tests
        .iter()
        .map(|ctx| TestResult {
            name: test.descriptor().name,
            ntuple: ctx.ntuple,
            psamples: ctx.pvalues.len(),
            p: stats::kstest(&ctx.pvalues),
        })
        .collect()
}

/// Format a vec of `TestResults` and print a summary of the results.
pub fn format_test_results_summary(test_results: &[TestResult]) -> String {
    const P_LOG_STAT_BINS: usize = 10;
    let mut p_logstat_bins = [0u32; P_LOG_STAT_BINS];
    let mut passed_tests = 0usize;
    for rslt in test_results {
        let bin = (rslt.logstat().floor() as usize).min(P_LOG_STAT_BINS - 1);
        p_logstat_bins[bin] += 1;
        if rslt.passed() {
            passed_tests += 1;
        }
    }
    let logstat_summary: String = p_logstat_bins
        .iter()
        .enumerate()
        .map(|(bin, &value)| {
            if bin == P_LOG_STAT_BINS - 1 {
                format!("{:>2}+ : {:04}", bin, value)
            } else {
                format!("{:>2} : {:04}|", bin, value)
            }
        })
        .collect::<Vec<String>>()
        .join("");
    format!(
        "P log stats: \n{}\nOverall result: {}          ( {} / {} passed)",
        logstat_summary,
        if passed_tests == test_results.len() {
            strings::PASS_STR
        } else {
            strings::FAIL_STR
        },
        passed_tests,
        test_results.len()
    )
}

/// Run and assess every test in `battery` against `stream`.
pub fn test_suite(
    battery: &[&dyn StatTest],
    stream: &mut GeneratorStream,
    settings: &RunSettings,
) -> Result<Vec<TestResult>, ResourceError> {
    let mut test_results: Vec<TestResult> = vec![];
    for &test in battery {
        let tests = run_test(test, stream, settings)?;
        for rslt in assess(test, &tests) {
            debug!("{}", rslt.format());
            test_results.push(rslt);
        }
    }
    Ok(test_results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectionRequest;

    static COUNTING: TestDescriptor = TestDescriptor {
        name: "counting",
        description: "records the first word of every run as a p-value",
        psamples_std: 4,
        tsamples_std: 1,
    };

    struct FirstWord;

    impl StatTest for FirstWord {
        fn descriptor(&self) -> &TestDescriptor {
            &COUNTING
        }

        fn series(&self) -> usize {
            2
        }

        fn run(&self, stream: &mut GeneratorStream, tests: &mut [TestContext], irun: usize) {
            let word = stream.next_word() as f64;
            tests[0].record(irun, word);
            tests[1].record(irun, -word);
        }
    }

    fn counter_stream(seed: u64) -> GeneratorStream {
        GeneratorStream::open(&SelectionRequest {
            generators: vec!["counter".into()],
            seeds: vec![seed],
            files: vec![],
        })
        .unwrap()
    }

    #[test]
    fn runner_appends_one_pvalue_per_run_and_series() {
        let mut stream = counter_stream(100);
        let settings = RunSettings {
            psamples: None,
            tsamples: None,
            strategy: SeedStrategy::Once,
        };
        let tests = run_test(&FirstWord, &mut stream, &settings).unwrap();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].pvalues, vec![100.0, 101.0, 102.0, 103.0]);
        assert_eq!(tests[1].pvalues, vec![-100.0, -101.0, -102.0, -103.0]);
        assert!(tests.iter().all(|t| t.psamples == 4 && t.tsamples == 1));
    }

    #[test]
    fn per_test_strategy_restarts_each_test() {
        let mut stream = counter_stream(7);
        let settings = RunSettings {
            psamples: Some(2),
            tsamples: None,
            strategy: SeedStrategy::PerTest,
        };
        let first = run_test(&FirstWord, &mut stream, &settings).unwrap();
        let second = run_test(&FirstWord, &mut stream, &settings).unwrap();
        assert_eq!(first, second);

        let once = RunSettings {
            strategy: SeedStrategy::Once,
            ..settings
        };
        let third = run_test(&FirstWord, &mut stream, &once).unwrap();
        assert_eq!(third[0].pvalues, vec![9.0, 10.0]);
    }

    #[test]
    fn logstat_assessment_thresholds() {
        let result = |p| TestResult {
            name: "x",
            ntuple: 0,
            psamples: 1,
            p,
        };
        assert_eq!(result(0.5).assessment(), Assessment::Passed);
        assert_eq!(result(0.001).assessment(), Assessment::Marginal);
        assert_eq!(result(1e-7).assessment(), Assessment::Failed);
        assert_eq!(result(1.0 - 1e-7).assessment(), Assessment::Failed);
        assert!(result(f64::NAN).assessment() == Assessment::Failed);
    }

    #[test]
    fn summary_counts_passes() {
        let results = vec![
            TestResult {
                name: "a",
                ntuple: 0,
                psamples: 1,
                p: 0.4,
            },
            TestResult {
                name: "b",
                ntuple: 0,
                psamples: 1,
                p: 0.0,
            },
        ];
        let summary = format_test_results_summary(&results);
        assert!(summary.contains("( 1 / 2 passed)"));
        assert!(summary.contains(strings::FAIL_STR));
    }
}
