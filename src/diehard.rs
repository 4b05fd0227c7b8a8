// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Marsaglia's bitstream test.
//!
//! The stream is read as a succession of 20 bit words, overlapping or not.
//! Among 2^21 such words drawn from a uniform stream, the number of the 2^20
//! possible values that never show up is close to normally distributed with
//! mean 141909. Its deviation is 428 for overlapping words and 290 for
//! non-overlapping ones. Both constants only hold for exactly 2^21 words,
//! so the sample count of this test is fixed.

use log::{debug, warn};

use crate::{
    bits::{extract_window, WORD_BITS},
    rng_testing::{StatTest, TestContext, TestDescriptor},
    selector::GeneratorStream,
    stats::ZTest,
};

pub const BITSTREAM_TSAMPLES: usize = 1 << 21;
pub const EXPECTED_MISSING: f64 = 141909.0;
pub const SIGMA_OVERLAP: f64 = 428.0;
pub const SIGMA_NO_OVERLAP: f64 = 290.0;

const WINDOW_BITS: u32 = 20;
const WINDOW_VALUES: usize = 1 << WINDOW_BITS;

static DESCRIPTOR: TestDescriptor = TestDescriptor {
    name: "diehard_bitstream",
    description: "Counts 20 bit words missing from 2^21 samples of the bit stream",
    psamples_std: 100,
    tsamples_std: BITSTREAM_TSAMPLES,
};

#[derive(Debug, Copy, Clone)]
pub struct Bitstream {
    pub overlap: bool,
}

impl Default for Bitstream {
    fn default() -> Self {
        Bitstream { overlap: true }
    }
}

impl Bitstream {
    /// Words needed to cover `tsamples` windows.
    fn words_needed(&self, tsamples: usize) -> usize {
        let step = if self.overlap { 1 } else { WINDOW_BITS as usize };
        let last_bit = (tsamples - 1) * step + WINDOW_BITS as usize;
        last_bit.div_ceil(WORD_BITS)
    }

    fn sigma(&self) -> f64 {
        if self.overlap {
            SIGMA_OVERLAP
        } else {
            SIGMA_NO_OVERLAP
        }
    }
}

/// Number of 20 bit values never seen among the first `tsamples` windows of `words`.
pub fn count_missing(words: &[u32], tsamples: usize, overlap: bool) -> usize {
    let mut seen = vec![false; WINDOW_VALUES];
    for t in 0..tsamples {
        let pos = if overlap { t } else { WINDOW_BITS as usize * t };
        seen[extract_window(words, pos, WINDOW_BITS) as usize] = true;
    }
    seen.iter().filter(|&&s| !s).count()
}

impl StatTest for Bitstream {
    fn descriptor(&self) -> &TestDescriptor {
        &DESCRIPTOR
    }

    fn tsamples(&self, requested: Option<usize>) -> usize {
        if let Some(n) = requested.filter(|&n| n != BITSTREAM_TSAMPLES) {
            warn!(
                "{} only works with {} samples, ignoring request for {}",
                DESCRIPTOR.name, BITSTREAM_TSAMPLES, n
            );
        }
        BITSTREAM_TSAMPLES
    }

    fn run(&self, stream: &mut GeneratorStream, tests: &mut [TestContext], irun: usize) {
        let tsamples = tests[0].tsamples;
        let words: Vec<u32> = (0..self.words_needed(tsamples))
            .map(|_| stream.next_word())
            .collect();
        let missing = count_missing(&words, tsamples, self.overlap);
        let ptest = ZTest {
            observed: missing as f64,
            expected: EXPECTED_MISSING,
            sigma: self.sigma(),
        };
        debug!(
            "{} run {}: {} missing, z = {:.3}",
            DESCRIPTOR.name,
            irun,
            missing,
            ptest.z_score()
        );
        tests[0].record(irun, ptest.p_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rng_testing::{run_test, RunSettings},
        selector::{SeedStrategy, SelectionRequest},
        stats::gaussian_p,
    };

    fn stream(name: &str, seed: u64) -> GeneratorStream {
        GeneratorStream::open(&SelectionRequest {
            generators: vec![name.into()],
            seeds: vec![seed],
            files: vec![],
        })
        .unwrap()
    }

    fn single_run() -> RunSettings {
        RunSettings {
            psamples: Some(1),
            tsamples: None,
            strategy: SeedStrategy::Once,
        }
    }

    #[test]
    fn buffer_sizes_cover_every_window() {
        assert_eq!(Bitstream { overlap: true }.words_needed(BITSTREAM_TSAMPLES), 65537);
        assert_eq!(
            Bitstream { overlap: false }.words_needed(BITSTREAM_TSAMPLES),
            1310720
        );
    }

    #[test]
    fn constant_stream_misses_all_but_one_value() {
        let words = vec![0u32; 65537];
        assert_eq!(count_missing(&words, BITSTREAM_TSAMPLES, true), WINDOW_VALUES - 1);
    }

    #[test]
    fn counting_windows_sees_each_offset() {
        // non-overlapping windows alternate between 0x00000 and 0xfffff
        let words = vec![0x0000_0fff, 0xff00_000f, 0xffff_0000, 0x0, 0x0];
        assert_eq!(count_missing(&words, 4, false), WINDOW_VALUES - 2);
    }

    #[test]
    fn tsamples_is_fixed() {
        let t = Bitstream::default();
        assert_eq!(t.tsamples(Some(1000)), BITSTREAM_TSAMPLES);
        assert_eq!(t.tsamples(None), BITSTREAM_TSAMPLES);
    }

    #[test]
    fn non_overlapping_run_on_constant_stream() {
        let test = Bitstream { overlap: false };
        let words = vec![0u32; test.words_needed(BITSTREAM_TSAMPLES)];
        let missing = count_missing(&words, BITSTREAM_TSAMPLES, false);
        assert_eq!(missing, WINDOW_VALUES - 1);

        let tests = run_test(&test, &mut stream("only_zero", 1), &single_run()).unwrap();
        let expected = gaussian_p(missing as f64 - EXPECTED_MISSING, SIGMA_NO_OVERLAP);
        assert_eq!(tests[0].pvalues, vec![expected]);
    }

    #[test]
    fn non_overlapping_run_uses_its_own_deviation() {
        let test = Bitstream { overlap: false };
        let mut reference = stream("xorshift128", 77);
        let words: Vec<u32> = (0..test.words_needed(BITSTREAM_TSAMPLES))
            .map(|_| reference.next_word())
            .collect();
        let missing = count_missing(&words, BITSTREAM_TSAMPLES, false) as f64;

        let tests = run_test(&test, &mut stream("xorshift128", 77), &single_run()).unwrap();
        let p = tests[0].pvalues[0];
        assert_eq!(p, gaussian_p(missing - EXPECTED_MISSING, SIGMA_NO_OVERLAP));
        assert!(p > 1e-6 && p < 1.0 - 1e-6);
        if missing != EXPECTED_MISSING {
            assert_ne!(p, gaussian_p(missing - EXPECTED_MISSING, SIGMA_OVERLAP));
        }
    }
}
