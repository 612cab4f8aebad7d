//! Population mean/std and z-score primitives used to put rank and review
//! deltas on a comparable scale.

/// Population mean and standard deviation (divide by N). Empty input
/// yields `(0.0, 0.0)`.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Standard z-score; a zero std (constant series) maps every value to 0.
pub fn zscore(value: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        return 0.0;
    }
    (value - mean) / std
}
