// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! The NIST STS serial test.
//!
//! `tsamples` words are read as one cyclic bit string of `n = 32 * tsamples`
//! bits. Every `m` bit factor of that string is counted for `m = nb` down
//! to 1, each level folded out of the one above it. From the counts
//! `psi_m^2 = 2^m / n * sum(count^2) - n` (with `psi_0^2 = 0`) the test
//! derives a monobit p-value and, for every `m` in `2..=nb`, p-values for
//! the first and (for `m > 2`) second difference of `psi^2`.

use log::debug;

use crate::{
    bits::{extract_window, WORD_BITS},
    error::ConfigError,
    rng_testing::{StatTest, TestContext, TestDescriptor},
    selector::GeneratorStream,
    stats::{gaussian_p, upper_incomplete_gamma},
};

pub const DEFAULT_NTUPLE: u32 = 16;
pub const MIN_NTUPLE: u32 = 2;
pub const MAX_NTUPLE: u32 = 24;

static DESCRIPTOR: TestDescriptor = TestDescriptor {
    name: "sts_serial",
    description: "NIST serial test of overlapping m bit factors, m up to ntuple",
    psamples_std: 100,
    tsamples_std: 100000,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Serial {
    ntuple: u32,
}

impl Default for Serial {
    fn default() -> Self {
        Serial {
            ntuple: DEFAULT_NTUPLE,
        }
    }
}

impl Serial {
    pub fn with_ntuple(ntuple: u32) -> Result<Self, ConfigError> {
        if !(MIN_NTUPLE..=MAX_NTUPLE).contains(&ntuple) {
            return Err(ConfigError::InvalidNtuple { ntuple });
        }
        Ok(Serial { ntuple })
    }

    pub fn ntuple(&self) -> u32 {
        self.ntuple
    }
}

/// Occurrences of every `nb` bit factor of the cyclic bit string `words`.
pub fn count_factors(words: &[u32], nb: u32) -> Vec<u64> {
    let mut looped = Vec::with_capacity(words.len() + 1);
    looped.extend_from_slice(words);
    if let Some(&first) = words.first() {
        looped.push(first);
    }
    let mut counts = vec![0u64; 1 << nb];
    for pos in 0..words.len() * WORD_BITS {
        counts[extract_window(&looped, pos, nb) as usize] += 1;
    }
    counts
}

/// `psi^2` for every factor width along with the zero and one bit counts.
#[derive(Debug, Clone, PartialEq)]
pub struct PsiSquares {
    /// Indexed by factor width, `psi[0]` is 0.
    pub psi: Vec<f64>,
    pub zeros: u64,
    pub ones: u64,
}

/// Fold `counts` of `nb` bit factors down to single bits, recording `psi^2`
/// at every level.
///
/// # Panics
/// If `counts` does not add up to `n_bits`.
pub fn psi_squares(counts: &mut [u64], nb: u32, n_bits: u64) -> PsiSquares {
    let n = n_bits as f64;
    let mut psi = vec![0.0; nb as usize + 1];
    let (mut zeros, mut ones) = (0, 0);
    for m in (1..=nb).rev() {
        let powerm = 1usize << m;
        let sum_squares: f64 = counts[..powerm].iter().map(|&c| (c as f64) * (c as f64)).sum();
        psi[m as usize] = powerm as f64 * sum_squares / n - n;
        let half = powerm / 2;
        if m == 1 {
            zeros = counts[0];
            ones = counts[1];
        }
        for i in 0..half {
            counts[i] += counts[i + half];
        }
    }
    assert_eq!(
        counts[0], n_bits,
        "sts_serial internal error: factor counts do not add up to the bit count"
    );
    PsiSquares { psi, zeros, ones }
}

impl StatTest for Serial {
    fn descriptor(&self) -> &TestDescriptor {
        &DESCRIPTOR
    }

    fn series(&self) -> usize {
        2 * self.ntuple as usize - 2
    }

    fn run(&self, stream: &mut GeneratorStream, tests: &mut [TestContext], irun: usize) {
        let nb = self.ntuple;
        let tsamples = tests[0].tsamples;
        let words: Vec<u32> = (0..tsamples).map(|_| stream.next_word()).collect();
        let n_bits = (tsamples * WORD_BITS) as u64;
        let mut counts = count_factors(&words, nb);
        let PsiSquares { psi, zeros, ones } = psi_squares(&mut counts, nb, n_bits);
        debug!(
            "{} run {}: {} zeros, {} ones",
            DESCRIPTOR.name, irun, zeros, ones
        );

        let mut series = tests.iter_mut();
        let mut emit = |ntuple: u32, p: f64| {
            if let Some(ctx) = series.next() {
                if irun == 0 {
                    ctx.ntuple = ntuple;
                }
                ctx.record(irun, p);
            }
        };

        emit(1, gaussian_p(zeros as f64 - ones as f64, (n_bits as f64).sqrt()));
        for m in 2..=nb as usize {
            let del = psi[m] - psi[m - 1];
            emit(m as u32, upper_incomplete_gamma((1u64 << (m - 2)) as f64, del / 2.0));
            if m > 2 {
                let del2 = psi[m] - 2.0 * psi[m - 1] + psi[m - 2];
                emit(m as u32, upper_incomplete_gamma((1u64 << (m - 3)) as f64, del2 / 2.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rng_testing::{run_test, RunSettings},
        selector::{SeedStrategy, SelectionRequest},
    };

    fn stream(name: &str, seed: u64) -> GeneratorStream {
        GeneratorStream::open(&SelectionRequest {
            generators: vec![name.into()],
            seeds: vec![seed],
            files: vec![],
        })
        .unwrap()
    }

    fn settings(tsamples: usize, psamples: usize) -> RunSettings {
        RunSettings {
            psamples: Some(psamples),
            tsamples: Some(tsamples),
            strategy: SeedStrategy::Once,
        }
    }

    #[test]
    fn ntuple_bounds() {
        assert_eq!(Serial::default().ntuple(), 16);
        assert_eq!(Serial::default().series(), 30);
        assert!(Serial::with_ntuple(24).is_ok());
        assert_eq!(
            Serial::with_ntuple(1),
            Err(ConfigError::InvalidNtuple { ntuple: 1 })
        );
        assert_eq!(
            Serial::with_ntuple(25),
            Err(ConfigError::InvalidNtuple { ntuple: 25 })
        );
    }

    #[test]
    fn factors_wrap_around_the_string() {
        // "1" followed by 31 zeros: one "10", one "01" across the wrap, 30 "00"
        assert_eq!(count_factors(&[0x8000_0000], 2), vec![30, 1, 1, 0]);
    }

    #[test]
    fn counts_add_up_on_every_level() {
        let words: Vec<u32> = (0u32..500).map(|i| i.wrapping_mul(0x9e37_79b9)).collect();
        let mut counts = count_factors(&words, 10);
        assert_eq!(counts.iter().sum::<u64>(), 500 * 32);
        let psi = psi_squares(&mut counts, 10, 500 * 32);
        assert_eq!(psi.zeros + psi.ones, 500 * 32);
        assert_eq!(psi.psi.len(), 11);
        assert_eq!(psi.psi[0], 0.0);
    }

    #[test]
    #[should_panic(expected = "sts_serial internal error")]
    fn inconsistent_counts_are_fatal() {
        let mut counts = vec![1u64; 16];
        psi_squares(&mut counts, 4, 17);
    }

    #[test]
    fn constant_stream_fails_every_series() {
        let test = Serial::with_ntuple(6).unwrap();
        let mut s = stream("only_zero", 1);
        let tests = run_test(&test, &mut s, &settings(1000, 1)).unwrap();
        assert_eq!(tests.len(), 10);
        assert!(tests[0].pvalues[0] > 0.999999);
        for ctx in &tests[1..] {
            assert!(ctx.pvalues[0] < 1e-10, "{:?}", ctx);
        }
        let labels: Vec<u32> = tests.iter().map(|t| t.ntuple).collect();
        assert_eq!(labels, vec![1, 2, 3, 3, 4, 4, 5, 5, 6, 6]);
    }

    #[test]
    fn good_generator_gives_proper_pvalues() {
        let test = Serial::with_ntuple(8).unwrap();
        let mut s = stream("xorshift128", 12345);
        let tests = run_test(&test, &mut s, &settings(2000, 3)).unwrap();
        for ctx in &tests {
            assert_eq!(ctx.pvalues.len(), 3);
            assert!(ctx.pvalues.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }
}
