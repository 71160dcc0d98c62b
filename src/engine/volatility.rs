//! Short-horizon volatility of the synthetic price.
//!
//! Sample standard deviation of successive simple returns over the most
//! recent window of prices, expressed in basis points.

/// Number of trailing prices considered.
pub const DEFAULT_WINDOW: usize = 150;

/// Below this many prices the estimate is reported as zero.
pub const MIN_SAMPLES: usize = 10;

const BPS: f64 = 10_000.0;

/// Volatility in basis points using the default window and minimum.
pub fn estimate(prices: &[f64]) -> f64 {
    estimate_with(prices, DEFAULT_WINDOW, MIN_SAMPLES)
}

/// Volatility in basis points over the trailing `window` prices.
///
/// Returns `0.0` when fewer than `min_samples` prices exist or fewer than
/// two returns can be formed. A zero previous price contributes a `0.0`
/// return, which biases the estimate low in that case.
pub fn estimate_with(prices: &[f64], window: usize, min_samples: usize) -> f64 {
    if prices.len() < min_samples {
        return 0.0;
    }

    let tail = &prices[prices.len().saturating_sub(window)..];
    let returns: Vec<f64> = tail
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    sample_stdev(&returns).map_or(0.0, |sd| sd * BPS)
}

/// Sample (n - 1) standard deviation; `None` with fewer than two values.
fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
