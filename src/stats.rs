// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Numerical primitives the tests reduce their statistics with.

use statrs::function::{erf::erfc, gamma::checked_gamma_ur};

use crate::utils;

/// CDF of a normal distribution with mean 0 and deviation `sigma` at `x`.
pub fn gaussian_p(x: f64, sigma: f64) -> f64 {
    0.5 * erfc(-(x / sigma) * utils::INV_ROOT2)
}

/// Regularized upper incomplete gamma function Q(a, x).
pub fn upper_incomplete_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    checked_gamma_ur(a, x).unwrap_or(f64::NAN)
}

/// Observed value of a statistic compared against a normal expectation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ZTest {
    pub observed: f64,
    pub expected: f64,
    pub sigma: f64,
}

impl ZTest {
    pub fn z_score(&self) -> f64 {
        (self.observed - self.expected) / self.sigma
    }

    pub fn p_value(&self) -> f64 {
        gaussian_p(self.observed - self.expected, self.sigma)
    }
}

/// Complementary Kolmogorov distribution Q_KS(lambda).
fn kolmogorov_q(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut term_before = 0.0;
    for j in 1..=100 {
        let j = j as f64;
        let term = fac * (a2 * j * j).exp();
        sum += term;
        if term.abs() <= 0.001 * term_before || term.abs() <= 1.0e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        term_before = term.abs();
    }
    // series did not converge, lambda is tiny
    1.0
}

/// Kolmogorov-Smirnov test of `pvalues` against the uniform distribution.
/// A single p-value is returned unchanged.
pub fn kstest(pvalues: &[f64]) -> f64 {
    match pvalues.len() {
        0 => return 1.0,
        1 => return pvalues[0],
        _ => {}
    }
    let mut sorted = pvalues.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let d = sorted
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let below = p - i as f64 / n;
            let above = (i as f64 + 1.0) / n - p;
            below.max(above)
        })
        .fold(0.0, f64::max);
    let sqrt_n = n.sqrt();
    kolmogorov_q((sqrt_n + 0.12 + 0.11 / sqrt_n) * d)
}
