// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Two-group statistics for graph metrics

use crate::error::{GraphError, GraphResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Outcome of a two-sided permutation test on the difference of means
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PermutationResult {
    /// `mean(a) - mean(b)`
    pub observed_diff: f64,
    /// Welch's t for the same two samples
    pub t_statistic: f64,
    pub p_value: f64,
    pub n_permutations: usize,
}

fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample variance (n - 1 denominator); 0 for fewer than two values
fn variance(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (x.len() - 1) as f64
}

/// Welch's unequal-variance t statistic; NaN when both samples have zero spread
pub fn welch_t(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::NAN;
    }
    let se = (variance(a) / a.len() as f64 + variance(b) / b.len() as f64).sqrt();
    if se == 0.0 {
        return f64::NAN;
    }
    (mean(a) - mean(b)) / se
}

/// Permutation p-value `(count + 1) / (n_perm + 1)` for `|mean(a) - mean(b)|`
pub fn permutation_test<R: Rng + ?Sized>(
    a: &[f64],
    b: &[f64],
    n_perm: usize,
    rng: &mut R,
) -> GraphResult<PermutationResult> {
    for (group, sample) in [("a", a), ("b", b)] {
        if sample.is_empty() {
            return Err(GraphError::TooFewSamples {
                group: group.to_string(),
                count: 0,
                minimum: 1,
            });
        }
    }
    if n_perm == 0 {
        return Err(GraphError::InvalidParameter(
            "at least one permutation is required".to_string(),
        ));
    }

    let observed = mean(a) - mean(b);
    let threshold = observed.abs() * (1.0 - 1e-12);
    let mut pooled: Vec<f64> = a.iter().chain(b).copied().collect();
    let na = a.len();

    let mut count = 0usize;
    for _ in 0..n_perm {
        pooled.shuffle(rng);
        let diff = mean(&pooled[..na]) - mean(&pooled[na..]);
        if diff.abs() >= threshold {
            count += 1;
        }
    }

    Ok(PermutationResult {
        observed_diff: observed,
        t_statistic: welch_t(a, b),
        p_value: (count + 1) as f64 / (n_perm + 1) as f64,
        n_permutations: n_perm,
    })
}

/// Benjamini-Hochberg adjusted p-values, in input order
///
/// NaN p-values are treated as 1.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    let clean: Vec<f64> = p_values
        .iter()
        .map(|&p| if p.is_nan() { 1.0 } else { p.clamp(0.0, 1.0) })
        .collect();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&i, &j| clean[i].total_cmp(&clean[j]));

    let mut adjusted = vec![0.0; m];
    let mut running = 1.0f64;
    for (rank, &idx) in order.iter().enumerate().rev() {
        let value = clean[idx] * m as f64 / (rank + 1) as f64;
        running = running.min(value);
        adjusted[idx] = running.min(1.0);
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_welch_t_known_value() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        // means 2.5 vs 5, variances 5/3 and 20/3
        let expected = -2.5 / ((5.0 / 3.0) / 4.0 + (20.0 / 3.0) / 4.0f64).sqrt();
        assert_abs_diff_eq!(welch_t(&a, &b), expected, epsilon = 1e-12);
        assert!(welch_t(&[1.0, 1.0], &[1.0, 1.0]).is_nan());
    }

    #[test]
    fn test_permutation_separates_groups() {
        let mut rng = StdRng::seed_from_u64(20260111);
        let a: Vec<f64> = (0..12).map(|i| 10.0 + 0.1 * i as f64).collect();
        let b: Vec<f64> = (0..12).map(|i| 0.1 * i as f64).collect();
        let r = permutation_test(&a, &b, 999, &mut rng).unwrap();
        assert_abs_diff_eq!(r.observed_diff, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.p_value, 1.0 / 1000.0, epsilon = 1e-12);
    }

    #[test]
    fn test_permutation_identical_groups() {
        let mut rng = StdRng::seed_from_u64(1);
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let r = permutation_test(&x, &x, 200, &mut rng).unwrap();
        assert_eq!(r.observed_diff, 0.0);
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_permutation_errors() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            permutation_test(&[], &[1.0], 10, &mut rng),
            Err(GraphError::TooFewSamples { .. })
        ));
        assert!(permutation_test(&[1.0], &[1.0], 0, &mut rng).is_err());
    }

    #[test]
    fn test_benjamini_hochberg() {
        let adjusted = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.5]);
        // Sorted: 0.01*4/1, 0.03*4/2, 0.04*4/3, 0.5*4/4, then a running minimum from the top
        let expected = [0.04, 0.04 * 4.0 / 3.0, 0.04 * 4.0 / 3.0, 0.5];
        for (a, e) in adjusted.iter().zip(expected) {
            assert_abs_diff_eq!(*a, e, epsilon = 1e-12);
        }
        assert_eq!(benjamini_hochberg(&[f64::NAN]), vec![1.0]);
        assert!(benjamini_hochberg(&[]).is_empty());
    }
}
