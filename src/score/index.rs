use polars::prelude::*;
use tracing::{debug, warn};

use crate::{
    error::{Result, SitingError},
    layer::float_values,
    score::StdMethod,
};

/// Options for combining indicator columns into an index score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreOptions {
    /// Skip listed columns absent from the table instead of failing.
    pub allow_missing_columns: bool,
}

/// Error if any indicator appears in both the positive and the negative list.
pub fn check_indicators(pos: &[String], neg: &[String]) -> Result<()> {
    match pos.iter().find(|name| neg.contains(name)) {
        Some(name) => Err(SitingError::ConflictingIndicator(name.clone())),
        None => Ok(()),
    }
}

/// Combine `pos` and `neg` indicator columns of `df` into one score per row.
///
/// Every column is rescaled with `method` over the whole column, negative columns are negated,
/// and each row takes the mean of its non-null contributions. A row is null only when every
/// contribution is null. `df` is not modified.
pub fn index_score(df: &DataFrame, pos: &[String], neg: &[String], method: StdMethod, options: ScoreOptions) -> Result<Vec<Option<f64>>> {
    check_indicators(pos, neg)?;

    let signed = pos.iter().map(|name| (name, 1.0))
        .chain(neg.iter().map(|name| (name, -1.0)));

    let mut sums = vec![0.0; df.height()];
    let mut counts = vec![0usize; df.height()];
    for (name, sign) in signed {
        if df.get_column_index(name).is_none() && options.allow_missing_columns {
            warn!("[score] indicator column `{name}` is missing; skipping");
            continue;
        }

        let scaled = method.apply(&float_values(df, name, "score table")?);
        for (i, value) in scaled.into_iter().enumerate() {
            if let Some(value) = value {
                sums[i] += sign * value;
                counts[i] += 1;
            }
        }
    }
    debug!("[score] {} rows, {} positive / {} negative indicators, {method}", df.height(), pos.len(), neg.len());

    Ok(sums.into_iter().zip(counts)
        .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
        .collect())
}
