use ahash::AHashSet;
use polars::prelude::*;
use tracing::{debug, info};

use crate::{
    error::Result,
    layer::{ensure_unique, string_values, PolygonLayer},
};

/// Left-join a per-tract indicator table onto tract geometry.
///
/// Both keys are compared as strings. The result keeps the tracts in their original order with
/// the tract key column followed by every indicator column; tracts without an indicator row get
/// nulls, and indicator rows matching no tract are dropped.
pub fn merge_indicators(tracts: &PolygonLayer, tract_id: &str, indicators: &DataFrame, indicator_id: &str) -> Result<PolygonLayer> {
    let tract_keys = tracts.string_column(tract_id)?;
    let indicator_keys = string_values(indicators, indicator_id, "tract indicators")?;
    ensure_unique(&indicator_keys, indicator_id)?;

    let known = tract_keys.iter().flatten().map(String::as_str).collect::<AHashSet<_>>();
    let unmatched = indicator_keys.iter().flatten().filter(|key| !known.contains(key.as_str())).count();
    if unmatched > 0 {
        info!("[merge] dropping {unmatched} indicator rows with no matching tract");
    }

    let left = DataFrame::new(vec![Column::new(tract_id.into(), tract_keys)])?
        .with_row_index("__row".into(), None)?;

    let mut right = indicators.clone();
    right.with_column(Column::new(indicator_id.into(), indicator_keys))?;

    let data = left.left_join(&right, [tract_id], [indicator_id])?
        .sort(["__row"], SortMultipleOptions::default())?
        .drop("__row")?;
    debug!("[merge] {} tracts, {} indicator columns", data.height(), data.width() - 1);

    let (geoms, _) = tracts.clone().into_parts();
    PolygonLayer::new(tracts.name(), geoms, data)
}
