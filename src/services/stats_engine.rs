use serde::Serialize;

use crate::error::AppError;
use crate::utils::math::{mean, population_std_dev, round_to};

/// Decimal places exposed for deviations.
pub const DEVIATION_DECIMALS: u32 = 2;

/// Mean and population standard deviation over a price window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviationStats {
    pub mean: f64,
    pub std_dev: f64,
    pub sample_count: usize,
}

impl DeviationStats {
    /// Standard deviation rounded for external responses.
    pub fn rounded_std_dev(&self) -> f64 {
        round_to(self.std_dev, DEVIATION_DECIMALS)
    }
}

/// Population (denominator = count) statistics over `samples`.
pub fn compute_deviation(samples: &[f64]) -> Result<DeviationStats, AppError> {
    match (mean(samples), population_std_dev(samples)) {
        (Some(mean), Some(std_dev)) => Ok(DeviationStats {
            mean,
            std_dev,
            sample_count: samples.len(),
        }),
        _ => Err(AppError::InsufficientData(
            "at least one price sample is required".to_string(),
        )),
    }
}
