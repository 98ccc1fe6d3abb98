//! Summary statistics over one value column.

/// Derived statistics stored on every dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats {
    pub length: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation: squared deviations divided by `length`.
    pub std: f64,
}

/// Computes summary statistics, or `None` for an empty slice.
pub fn summarize(values: &[f64]) -> Option<SummaryStats> {
    if values.is_empty() {
        return None;
    }

    let length = values.len();
    let n = length as f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &value in values {
        min = min.min(value);
        max = max.max(value);
        sum += value;
    }
    // Summation rounding can land a hair outside the observed range.
    let mean = (sum / n).clamp(min, max);
    let squared: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
    let std = (squared / n).sqrt();

    Some(SummaryStats {
        length,
        min,
        max,
        mean,
        std,
    })
}
