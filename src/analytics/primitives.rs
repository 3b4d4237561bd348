//! Stateless reduction primitives used by the statistics.
//!
//! These are pure functions over the values that survived weighting. Missing
//! and ignored positions have already been removed, so every value here
//! counts.

/// Arithmetic sum. An empty input sums to `0.0`.
pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Arithmetic mean, or `None` when there are no values.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(sum(values) / values.len() as f64)
}

/// Sample standard deviation (divide by n - 1), or `None` with fewer than two
/// values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let n = values.len() as f64;
    let mean = sum(values) / n;
    let sum_squared_diff: f64 = values.iter().map(|&value| (value - mean).powi(2)).sum();

    Some((sum_squared_diff / (n - 1.0)).sqrt())
}
