/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (denominator = count), `None` for an empty slice.
///
/// Values are shifted by the first sample before squaring, which keeps the
/// result exactly zero for a constant series and limits cancellation for
/// large prices.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;
    let shifted: Vec<f64> = values.iter().map(|x| x - first).collect();
    let shifted_mean = mean(&shifted)?;
    let sum_sq: f64 = shifted
        .iter()
        .map(|d| {
            let diff = d - shifted_mean;
            diff * diff
        })
        .sum();
    Some(sum_sq / values.len() as f64)
}

/// Population standard deviation, `None` for an empty slice.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
