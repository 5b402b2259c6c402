//! Bootstrap confidence interval of the mean

use anyhow::{Result, bail};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

/// Sample mean with the bootstrapped `percent` interval around it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bootstrap {
    pub mean: f64,
    pub low: f64,
    pub high: f64,
}

/// Resample `x` `samples` times and take the `percent / 2` and
/// `100 - percent / 2` percentiles of the resampled means
///
/// Each resample draws from its own RNG seeded with `seed + i`, so the result
/// does not depend on how rayon schedules the work.
pub fn bootstrap(x: &[f64], samples: usize, percent: f64, seed: u64) -> Result<Bootstrap> {
    if x.is_empty() {
        bail!("Cannot bootstrap an empty sample");
    }
    if samples == 0 {
        bail!("Bootstrap needs at least one resample");
    }
    if !(percent > 0.0 && percent < 100.0) {
        bail!("Percent must be within (0, 100), got {percent}");
    }

    let n = x.len();
    let mut means: Vec<f64> = (0..samples)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let sum: f64 = (0..n).map(|_| x[rng.random_range(0..n)]).sum();
            sum / n as f64
        })
        .collect();
    means.sort_by(f64::total_cmp);

    Ok(Bootstrap {
        mean: mean(x),
        low: percentile(&means, percent / 2.0),
        high: percentile(&means, 100.0 - percent / 2.0),
    })
}

fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Linear interpolation between closest ranks of a sorted, non-empty slice
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.random::<f64>()).collect()
    }

    #[test]
    fn test_bootstrap_uniform() {
        let x = uniform(10_000, 37);
        let result = bootstrap(&x, 100, 10.0, 37).unwrap();

        assert!((result.mean - 0.5).abs() < 0.01);
        assert!(result.low < result.mean && result.mean < result.high);
        // Standard error of the mean is ~0.0029, so the 90% band is about +-0.005
        assert!(result.high - result.low < 0.02);
    }

    #[test]
    fn test_bootstrap_is_deterministic() {
        let x = uniform(500, 1);
        let first = bootstrap(&x, 200, 5.0, 42).unwrap();
        let second = bootstrap(&x, 200, 5.0, 42).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bootstrap_constant_sample() {
        let result = bootstrap(&[3.0; 20], 10, 10.0, 0).unwrap();
        assert_eq!(result, Bootstrap { mean: 3.0, low: 3.0, high: 3.0 });
    }

    #[test]
    fn test_bootstrap_rejects_bad_input() {
        assert!(bootstrap(&[], 10, 10.0, 0).is_err());
        assert!(bootstrap(&[1.0], 0, 10.0, 0).is_err());
        assert!(bootstrap(&[1.0], 10, 0.0, 0).is_err());
        assert!(bootstrap(&[1.0], 10, 100.0, 0).is_err());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 2.5);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
    }
}
