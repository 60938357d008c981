use std::{collections::BTreeMap, path::Path};

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use polars::prelude::*;
use shapefile::{dbase::{FieldValue, Record}, Reader, Shape};

/// Convert a shapefile polygon to a geo MultiPolygon.
/// Shapefile rings are stored as an outer ring (clockwise) followed by its holes (counter-clockwise).
pub(crate) fn shp_to_geo(polygon: &shapefile::Polygon) -> MultiPolygon<f64> {
    /// Twice the signed area of a closed ring; negative when clockwise.
    fn signed_area2(coords: &[Coord<f64>]) -> f64 {
        coords.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum()
    }

    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in polygon.rings() {
        let mut coords = ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect::<Vec<_>>();
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }

        if signed_area2(&coords) < 0.0 {
            if let Some(outer) = exterior.take() {
                polygons.push(Polygon::new(outer, std::mem::take(&mut holes)));
            }
            exterior = Some(LineString(coords));
        } else {
            holes.push(LineString(coords));
        }
    }
    if let Some(outer) = exterior {
        polygons.push(Polygon::new(outer, holes));
    }

    MultiPolygon(polygons)
}

/// Attribute cell of a dBase record, reduced to the two types the pipeline reads.
enum Cell {
    Text(Option<String>),
    Number(Option<f64>),
}

fn to_cell(value: FieldValue) -> Cell {
    match value {
        FieldValue::Character(s) => Cell::Text(s.map(|s| s.trim().to_string())),
        FieldValue::Numeric(n) => Cell::Number(n),
        FieldValue::Float(f) => Cell::Number(f.map(f64::from)),
        FieldValue::Integer(i) => Cell::Number(Some(f64::from(i))),
        FieldValue::Double(d) => Cell::Number(Some(d)),
        FieldValue::Currency(c) => Cell::Number(Some(c)),
        FieldValue::Logical(b) => Cell::Text(b.map(|b| b.to_string())),
        other => Cell::Text(Some(format!("{other:?}"))),
    }
}

/// Convert dBase records to a DataFrame with one column per field, in field-name order.
/// A field is numeric when every non-null value is numeric, and text otherwise.
fn records_to_dataframe(records: Vec<Record>) -> Result<DataFrame> {
    let num_rows = records.len();
    let mut fields: BTreeMap<String, Vec<Option<Cell>>> = BTreeMap::new();

    for (row, record) in records.into_iter().enumerate() {
        for (name, value) in record {
            fields.entry(name)
                .or_insert_with(|| (0..num_rows).map(|_| None).collect())[row] = Some(to_cell(value));
        }
    }

    let columns = fields.into_iter()
        .map(|(name, cells)| {
            let numeric = cells.iter().flatten().all(|cell| matches!(cell, Cell::Number(_)));
            if numeric {
                let values = cells.into_iter()
                    .map(|cell| match cell { Some(Cell::Number(n)) => n, _ => None })
                    .collect::<Vec<_>>();
                Column::new(name.into(), values)
            } else {
                let values = cells.into_iter()
                    .map(|cell| match cell {
                        Some(Cell::Text(s)) => s,
                        Some(Cell::Number(n)) => n.map(|n| n.to_string()),
                        None => None,
                    })
                    .collect::<Vec<_>>();
                Column::new(name.into(), values)
            }
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

fn read_items(path: &Path) -> Result<Vec<(Shape, Record)>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp] Failed to open shapefile: {}", path.display()))?;

    let mut items = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("[io::shp] Error reading shape+record")?;
        items.push((shape, record));
    }
    Ok(items)
}

/// Read polygon shapes and their attributes. Null shapes become empty MultiPolygons.
pub(crate) fn read_polygons(path: &Path) -> Result<(Vec<MultiPolygon<f64>>, DataFrame)> {
    let (shapes, records): (Vec<_>, Vec<_>) = read_items(path)?.into_iter().unzip();
    let shapes = shapes.into_iter()
        .map(|shape| match shape {
            Shape::Polygon(polygon) => Ok(shp_to_geo(&polygon)),
            Shape::NullShape => Ok(MultiPolygon::new(Vec::new())),
            other => bail!("[io::shp] found non-Polygon shape in {}: {:?}", path.display(), other.shapetype()),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((shapes, records_to_dataframe(records)?))
}

/// Read point shapes and their attributes.
pub(crate) fn read_points(path: &Path) -> Result<(Vec<Point<f64>>, DataFrame)> {
    let (shapes, records): (Vec<_>, Vec<_>) = read_items(path)?.into_iter().unzip();
    let points = shapes.into_iter()
        .map(|shape| match shape {
            Shape::Point(p) => Ok(Point::new(p.x, p.y)),
            Shape::PointM(p) => Ok(Point::new(p.x, p.y)),
            Shape::PointZ(p) => Ok(Point::new(p.x, p.y)),
            other => bail!("[io::shp] found non-Point shape in {}: {:?}", path.display(), other.shapetype()),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((points, records_to_dataframe(records)?))
}

#[cfg(test)]
mod tests {
    use geo::Area;

    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<shapefile::Point> {
        points.iter().map(|&(x, y)| shapefile::Point { x, y }).collect()
    }

    #[test]
    fn outer_ring_with_hole() {
        let polygon = shapefile::Polygon::with_rings(vec![
            shapefile::PolygonRing::Outer(ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)])),
            shapefile::PolygonRing::Inner(ring(&[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)])),
        ]);

        let shape = shp_to_geo(&polygon);
        assert_eq!(shape.0.len(), 1);
        assert_eq!(shape.0[0].interiors().len(), 1);
        assert!((shape.unsigned_area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn numeric_and_text_fields() {
        let mut a = Record::default();
        a.insert("GEOID".into(), FieldValue::Character(Some("06001400100 ".into())));
        a.insert("ALAND".into(), FieldValue::Numeric(Some(1500.0)));
        let mut b = Record::default();
        b.insert("GEOID".into(), FieldValue::Character(Some("06001400200".into())));
        b.insert("ALAND".into(), FieldValue::Numeric(None));

        let df = records_to_dataframe(vec![a, b]).unwrap();
        let names = df.get_column_names().into_iter().map(|name| name.to_string()).collect::<Vec<_>>();
        assert_eq!(names, vec!["ALAND", "GEOID"]);
        assert_eq!(df.column("ALAND").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("GEOID").unwrap().str().unwrap().get(0), Some("06001400100"));
    }
}
