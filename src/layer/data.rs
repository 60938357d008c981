use ahash::AHashSet;
use polars::prelude::*;

use crate::error::{Result, SitingError};

/// Error unless `df` has a column called `column`.
pub(crate) fn require_column(df: &DataFrame, column: &str, table: &str) -> Result<()> {
    match df.get_column_index(column) {
        Some(_) => Ok(()),
        None => Err(SitingError::missing_column(column, table)),
    }
}

/// Read a column as nullable floats. Numeric columns of any width are cast; NaN is treated as null.
pub(crate) fn float_values(df: &DataFrame, column: &str, table: &str) -> Result<Vec<Option<f64>>> {
    require_column(df, column, table)?;
    let values = df.column(column)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter()
        .map(|value| value.filter(|v| !v.is_nan()))
        .collect())
}

/// Read a column as nullable strings, casting non-string columns.
pub(crate) fn string_values(df: &DataFrame, column: &str, table: &str) -> Result<Vec<Option<String>>> {
    require_column(df, column, table)?;
    let values = df.column(column)?.cast(&DataType::String)?;
    Ok(values.str()?.into_iter()
        .map(|value| value.map(str::to_owned))
        .collect())
}

/// Select rows by position, in the given order.
pub(crate) fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    if df.width() == 0 { return Ok(df.clone()) }
    let indices = IdxCa::from_vec("idx".into(), rows.iter().map(|&row| row as IdxSize).collect());
    Ok(df.take(&indices)?)
}

/// Error if any non-null value appears more than once.
pub(crate) fn ensure_unique(values: &[Option<String>], column: &str) -> Result<()> {
    let mut seen = AHashSet::with_capacity(values.len());
    for value in values.iter().flatten() {
        if !seen.insert(value.as_str()) {
            return Err(SitingError::DuplicateId { column: column.to_string(), value: value.clone() });
        }
    }
    Ok(())
}
