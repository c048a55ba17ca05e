//! Order statistics over sorted samples.
//!
//! Every function here expects a non-empty slice sorted ascending. `Buckets`
//! only creates a timer once it holds a sample and keeps the list sorted on
//! every insertion, so that holds for all callers in this crate.

/// Linear interpolation between closest ranks.
///
/// With `n` samples and target percentile `p` in `0..=100` the rank is
/// `k = (n - 1) * p / 100`. An integral rank returns that sample, otherwise
/// the two neighbouring samples are blended by distance to `k`.
///
/// # Examples
///
/// ```
/// use sluice::stats::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0], 50.0), 2.0);
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), 2.5);
/// ```
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let k = (sorted.len() - 1) as f64 * p / 100.0;
    let f = k.floor();
    let c = k.ceil();
    if f == c {
        sorted[k as usize]
    } else {
        sorted[f as usize] * (c - k) + sorted[c as usize] * (k - f)
    }
}

/// Arithmetic mean.
pub fn mean(samples: &[f64]) -> f64 {
    debug_assert!(!samples.is_empty());
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation around a precomputed `mean`.
pub fn pstdev(samples: &[f64], mean: f64) -> f64 {
    debug_assert!(!samples.is_empty());
    let ss: f64 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
    (ss / samples.len() as f64).sqrt()
}
