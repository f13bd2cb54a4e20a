//! Two-sided Wilcoxon signed-rank test on paired samples.
//!
//! Zero differences are discarded before ranking and tied magnitudes share
//! their average rank. With at most [`EXACT_LIMIT`] non-zero differences and
//! no ties the p-value comes from the exact null distribution; otherwise the
//! normal approximation with tie correction is used, without continuity
//! correction.

use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

/// Largest sample size for which the exact null distribution is used.
pub const EXACT_LIMIT: usize = 50;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WilcoxonError {
    #[error("Paired samples differ in length ({left} vs {right})")]
    LengthMismatch { left: usize, right: usize },

    #[error("All paired differences are zero")]
    NoNonZeroDifferences,

    #[error("Normal approximation unavailable: {0}")]
    Distribution(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PValueMethod {
    Exact,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WilcoxonResult {
    /// The smaller of the positive and negative rank sums.
    pub statistic: f64,
    pub p_value: f64,
    /// Non-zero differences that entered the ranking.
    pub n: usize,
    pub method: PValueMethod,
}

/// Test whether the differences `x[i] - y[i]` are symmetric around zero.
pub fn signed_rank(x: &[f64], y: &[f64]) -> Result<WilcoxonResult, WilcoxonError> {
    if x.len() != y.len() {
        return Err(WilcoxonError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }

    let diffs: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(a, b)| a - b)
        .filter(|d| *d != 0.0)
        .collect();
    if diffs.is_empty() {
        return Err(WilcoxonError::NoNonZeroDifferences);
    }

    let n = diffs.len();
    let ranked = average_ranks(&diffs);

    let r_plus: f64 = diffs
        .iter()
        .zip(&ranked.ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let total = (n * (n + 1)) as f64 / 2.0;
    let r_minus = total - r_plus;
    let statistic = r_plus.min(r_minus);

    if n <= EXACT_LIMIT && ranked.tie_groups.is_empty() {
        let p_value = exact_p_value(n, statistic);
        return Ok(WilcoxonResult {
            statistic,
            p_value,
            n,
            method: PValueMethod::Exact,
        });
    }

    let nf = n as f64;
    let mean = nf * (nf + 1.0) / 4.0;
    let tie_term: f64 = ranked
        .tie_groups
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let variance = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_term / 48.0;

    let standard = Normal::new(0.0, 1.0).map_err(|e| WilcoxonError::Distribution(e.to_string()))?;
    let z = (statistic - mean) / variance.sqrt();
    let p_value = (2.0 * standard.cdf(-z.abs())).min(1.0);

    Ok(WilcoxonResult {
        statistic,
        p_value,
        n,
        method: PValueMethod::Normal,
    })
}

struct Ranked {
    ranks: Vec<f64>,
    /// Sizes of groups with more than one tied magnitude.
    tie_groups: Vec<usize>,
}

fn average_ranks(diffs: &[f64]) -> Ranked {
    let mut order: Vec<usize> = (0..diffs.len()).collect();
    order.sort_by(|&a, &b| diffs[a].abs().total_cmp(&diffs[b].abs()));

    let mut ranks = vec![0.0; diffs.len()];
    let mut tie_groups = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let magnitude = diffs[order[start]].abs();
        let mut end = start + 1;
        while end < order.len() && diffs[order[end]].abs() == magnitude {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end.
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        if end - start > 1 {
            tie_groups.push(end - start);
        }
        start = end;
    }

    Ranked { ranks, tie_groups }
}

/// `2 * P(W <= statistic)` under the null, where W is the positive rank sum
/// over ranks `1..=n` with independent fair signs.
fn exact_p_value(n: usize, statistic: f64) -> f64 {
    let max_sum = n * (n + 1) / 2;
    let mut dist = vec![0.0_f64; max_sum + 1];
    dist[0] = 1.0;

    for rank in 1..=n {
        for sum in (0..=max_sum).rev() {
            let without = dist[sum];
            let with = if sum >= rank { dist[sum - rank] } else { 0.0 };
            dist[sum] = 0.5 * (without + with);
        }
    }

    let cutoff = statistic.floor() as usize;
    let tail: f64 = dist.iter().take(cutoff + 1).sum();
    (2.0 * tail).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_exact_all_positive() {
        let x = [2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [1.0, 1.0, 1.0, 1.0, 1.0];
        let result = signed_rank(&x, &y).unwrap();

        assert_eq!(result.method, PValueMethod::Exact);
        assert_eq!(result.statistic, 0.0);
        assert!(close(result.p_value, 2.0 / 32.0, 1e-12));
    }

    #[test]
    fn test_exact_six_samples() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [0.0; 6];
        let result = signed_rank(&x, &y).unwrap();
        assert!(close(result.p_value, 2.0 / 64.0, 1e-12));
    }

    #[test]
    fn test_exact_mixed_signs() {
        // Ranks 1..4, negatives at ranks 1 and 2: W- = 3, W+ = 7.
        // P(W+ <= 3) over 16 sign patterns: sums 0,1,2,3,3 -> 5/16.
        let x = [0.0, 0.0, 3.0, 4.0];
        let y = [1.0, 2.0, 0.0, 0.0];
        let result = signed_rank(&x, &y).unwrap();
        assert_eq!(result.statistic, 3.0);
        assert!(close(result.p_value, 10.0 / 16.0, 1e-12));
    }

    #[test]
    fn test_zero_differences_discarded() {
        let x = [2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 7.0];
        // Five unit differences tie, so the normal path is taken on n = 5.
        let result = signed_rank(&x, &y).unwrap();
        assert_eq!(result.n, 5);
        assert_eq!(result.method, PValueMethod::Normal);
    }

    #[test]
    fn test_ties_use_normal_approximation() {
        // |d| = 1,1,2,2 -> ranks 1.5,1.5,3.5,3.5; W+ = 6.5, W- = 3.5.
        let x = [1.0, 1.0, 2.0, 0.0];
        let y = [0.0, 0.0, 0.0, 2.0];
        let result = signed_rank(&x, &y).unwrap();

        assert_eq!(result.method, PValueMethod::Normal);
        assert_eq!(result.statistic, 3.5);
        // z = -1.5 / sqrt(7.5 - 12/48)
        assert!(close(result.p_value, 0.5774, 1e-3));
    }

    #[test]
    fn test_large_sample_uses_normal() {
        let x: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let y = vec![0.0; 60];
        let result = signed_rank(&x, &y).unwrap();
        assert_eq!(result.method, PValueMethod::Normal);
        assert!(result.p_value < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(
            signed_rank(&[1.0, 2.0], &[1.0, 2.0]),
            Err(WilcoxonError::NoNonZeroDifferences)
        );
        assert_eq!(
            signed_rank(&[1.0, 2.0], &[1.0]),
            Err(WilcoxonError::LengthMismatch { left: 2, right: 1 })
        );
    }
}
