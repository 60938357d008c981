use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SitingError;

/// How indicator columns are put on a common scale before being combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdMethod {
    /// z-score: `(x - mean) / sd`, with the sample standard deviation.
    #[default]
    Standardize,
    /// Min-max rescale to `[0, 1]`.
    Normalize,
}

impl StdMethod {
    /// Rescale one column, preserving nulls and order.
    pub fn apply(self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        match self {
            Self::Standardize => standardize(values),
            Self::Normalize => normalize(values),
        }
    }
}

impl FromStr for StdMethod {
    type Err = SitingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standardize" => Ok(Self::Standardize),
            "normalize" => Ok(Self::Normalize),
            other => Err(SitingError::invalid("std_method", format!("expected `standardize` or `normalize`, got `{other}`"))),
        }
    }
}

impl fmt::Display for StdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standardize => "standardize",
            Self::Normalize => "normalize",
        })
    }
}

/// Sample mean and standard deviation of the non-null values.
/// The deviation is `None` with fewer than two values.
pub(crate) fn mean_sd(values: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let present = values.iter().flatten().copied().collect::<Vec<_>>();
    let n = present.len();
    if n == 0 { return (None, None) }

    let mean = present.iter().sum::<f64>() / n as f64;
    if n < 2 { return (Some(mean), None) }

    let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (Some(mean), Some(var.sqrt()))
}

/// z-score each value. A constant column (or one with fewer than two values) maps to 0.
pub fn standardize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let (mean, sd) = mean_sd(values);
    values.iter()
        .map(|value| value.map(|x| match (mean, sd) {
            (Some(mean), Some(sd)) if sd > 0.0 => (x - mean) / sd,
            _ => 0.0,
        }))
        .collect()
}

/// Min-max rescale each value to `[0, 1]`. A constant column maps to 0.
pub fn normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let (min, max) = values.iter().flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    values.iter()
        .map(|value| value.map(|x| if range > 0.0 { (x - min) / range } else { 0.0 }))
        .collect()
}
