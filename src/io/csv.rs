use std::{fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use polars::{io::SerReader, prelude::*};

use crate::{
    geom::{Crs, WGS84},
    io::table::{csv_field, json_columns},
    layer::PointLayer,
};

/// Read a per-tract indicator CSV. The key column is read as text so leading zeros survive.
pub fn read_indicators(path: &Path, key: &str) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv] Failed to open CSV file: {}", path.display()))?;

    let schema = Arc::new(Schema::from_iter([Field::new(key.into(), DataType::String)]));
    let options = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(schema));

    CsvReader::new(file)
        .with_options(options)
        .finish()
        .with_context(|| format!("[io::csv] Failed to read CSV from {}", path.display()))
}

/// Render points as CSV: every attribute column, then `longitude` and `latitude` in EPSG:4326.
pub(crate) fn points_to_csv(layer: &PointLayer) -> Result<Vec<u8>> {
    let lonlat = layer.reproject(&Crs::from_epsg(WGS84)?)?;
    let columns = json_columns(layer.data())?;

    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(columns.iter().map(|(name, _)| name.as_str()).chain(["longitude", "latitude"]))?;

    for (row, point) in lonlat.points().iter().enumerate() {
        let fields = columns.iter()
            .map(|(_, values)| values.get(row).map(csv_field).unwrap_or_default())
            .chain([point.x().to_string(), point.y().to_string()]);
        writer.write_record(fields)?;
    }

    writer.into_inner().context("[io::csv] Failed to flush CSV writer")
}
