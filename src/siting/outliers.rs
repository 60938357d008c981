use tracing::warn;

use crate::{
    error::{Result, SitingError},
    score::mean_sd,
};

/// Rule for picking the tracts of interest from one indicator column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierStrategy {
    /// Keep tracts whose value exceeds `k` times the county mean.
    MeanRatio(f64),
    /// Compare the county-level `mean / sd` to a threshold, keeping every tract when it is
    /// exceeded and none otherwise. Individual tract values do not enter the comparison.
    CountyZScore(f64),
}

impl OutlierStrategy {
    /// Exactly one threshold must be given.
    pub fn from_thresholds(min_mean_ratio: Option<f64>, min_zscore: Option<f64>) -> Result<Self> {
        let strategy = match (min_mean_ratio, min_zscore) {
            (Some(k), None) => Self::MeanRatio(k),
            (None, Some(t)) => Self::CountyZScore(t),
            _ => return Err(SitingError::OutlierStrategy),
        };

        let threshold = match strategy { Self::MeanRatio(v) | Self::CountyZScore(v) => v };
        if !threshold.is_finite() {
            return Err(SitingError::invalid("outlier threshold", format!("must be finite, got {threshold}")));
        }
        Ok(strategy)
    }

    /// Positions of the selected tracts, in ascending order. Null values are never selected
    /// by the ratio rule.
    pub fn select(&self, values: &[Option<f64>]) -> Vec<usize> {
        let (mean, sd) = mean_sd(values);
        match *self {
            Self::MeanRatio(k) => {
                let Some(mean) = mean else { return Vec::new() };
                values.iter().enumerate()
                    .filter(|(_, value)| value.is_some_and(|v| v / mean > k))
                    .map(|(i, _)| i)
                    .collect()
            }
            Self::CountyZScore(t) => {
                warn!("[outliers] z-score selection compares the county mean/sd ratio to {t}; it keeps all tracts or none");
                let statistic = match (mean, sd) {
                    (Some(mean), Some(sd)) if sd > 0.0 => mean / sd,
                    _ => 0.0,
                };
                if statistic > t { (0..values.len()).collect() } else { Vec::new() }
            }
        }
    }
}
