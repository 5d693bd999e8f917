use anyhow::{Result, ensure};
use serde::Serialize;

use crate::matching::MatchOutcome;

pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Precision/recall/F1 for one comparison. Each score is defined as 0.0
/// when its denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

pub fn score(true_positives: usize, false_positives: usize, false_negatives: usize) -> Scores {
    let tp = true_positives as f64;
    let predicted = true_positives + false_positives;
    let actual = true_positives + false_negatives;

    let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
    let recall = if actual > 0 { tp / actual as f64 } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Scores { precision, recall, f1 }
}

/// Running TP/FP/FN totals for one extraction condition.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EntityCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EntityCounts {
    pub fn add(&mut self, outcome: &MatchOutcome) {
        self.true_positives += outcome.tp();
        self.false_positives += outcome.fp();
        self.false_negatives += outcome.fn_count();
    }

    /// Micro-averaged scores over the accumulated totals.
    pub fn scores(&self) -> Scores {
        score(
            self.true_positives,
            self.false_positives,
            self.false_negatives,
        )
    }
}

impl From<&MatchOutcome> for EntityCounts {
    fn from(outcome: &MatchOutcome) -> Self {
        Self {
            true_positives: outcome.tp(),
            false_positives: outcome.fp(),
            false_negatives: outcome.fn_count(),
        }
    }
}

/// Paired two-tailed t-test over two aligned per-LID score series.
#[derive(Debug, Clone, Copy)]
pub struct PairedTTest {
    pub n: usize,
    pub mean_a: f64,
    pub mean_b: f64,
    pub mean_difference: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// Both series must be aligned row-for-row by the same LID ordering; the
/// caller guarantees that by iterating a numerically sorted LID set once.
/// Fewer than two rows, or zero variance in the differences, degenerates to
/// t = 0, p = 1.
pub fn paired_t_test(series_a: &[f64], series_b: &[f64]) -> Result<PairedTTest> {
    ensure!(
        series_a.len() == series_b.len(),
        "paired series length mismatch: {} vs {}",
        series_a.len(),
        series_b.len()
    );

    let n = series_a.len();
    let mean_a = mean(series_a);
    let mean_b = mean(series_b);

    if n < 2 {
        return Ok(PairedTTest {
            n,
            mean_a,
            mean_b,
            mean_difference: mean_a - mean_b,
            t_statistic: 0.0,
            p_value: 1.0,
            significant: false,
        });
    }

    let differences: Vec<f64> = series_a
        .iter()
        .zip(series_b.iter())
        .map(|(a, b)| a - b)
        .collect();
    let mean_difference = mean(&differences);

    let variance = differences
        .iter()
        .map(|d| (d - mean_difference).powi(2))
        .sum::<f64>()
        / (n - 1) as f64;
    let std_error = (variance / n as f64).sqrt();

    let (t_statistic, p_value) = if std_error > 0.0 {
        let t = mean_difference / std_error;
        (t, student_t_two_tailed(t.abs(), (n - 1) as f64))
    } else {
        (0.0, 1.0)
    };

    Ok(PairedTTest {
        n,
        mean_a,
        mean_b,
        mean_difference,
        t_statistic,
        p_value,
        significant: p_value < SIGNIFICANCE_THRESHOLD,
    })
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Two-tailed p-value for Student's t: P(|T| >= t) with `df` degrees of
/// freedom, via the regularized incomplete beta identity
/// `p = I_x(df/2, 1/2)` with `x = df / (df + t^2)`.
fn student_t_two_tailed(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fast for x < (a+1)/(a+b+2); use the
    // symmetry relation on the other side.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

// Lentz's algorithm for the incomplete beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 200;
    const EPSILON: f64 = 1e-14;
    const TINY: f64 = 1e-30;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let numerator = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + numerator * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + numerator / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let numerator = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + numerator * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + numerator / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    h
}

// Lanczos approximation, g = 7.
fn ln_gamma(x: f64) -> f64 {
    use std::f64::consts::PI;

    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut accumulator = COEFFICIENTS[0];
    for (index, coefficient) in COEFFICIENTS.iter().enumerate().skip(1) {
        accumulator += coefficient / (x + index as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + accumulator.ln()
}
