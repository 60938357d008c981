use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use polars::prelude::*;
use serde_json::{json, Map, Value};

use crate::{
    geom::{Crs, WGS84},
    io::table::json_columns,
    layer::{PointLayer, PolygonLayer},
};

/// Geometry kinds a FeatureCollection is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GeometryKind { Polygon, Point }

/// Features of a FeatureCollection: geometries plus a property table.
pub(crate) struct Features {
    pub polygons: Vec<MultiPolygon<f64>>,
    pub points: Vec<Point<f64>>,
    pub data: DataFrame,
    pub crs: Crs,
}

/// Parse a GeoJSON FeatureCollection. Coordinates are EPSG:4326 unless a legacy `crs` member names
/// another EPSG code.
pub(crate) fn read_features(bytes: &[u8], kind: GeometryKind) -> Result<Features> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson] Failed to parse GeoJSON")?;
    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("[io::geojson] Expected a FeatureCollection with a `features` array"))?;

    let mut polygons = Vec::new();
    let mut points = Vec::new();
    let mut properties = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        let geometry = &feature["geometry"];
        let coords = &geometry["coordinates"];
        match (kind, geometry["type"].as_str()) {
            (GeometryKind::Polygon, Some("Polygon")) => polygons.push(MultiPolygon(vec![parse_polygon(coords)?])),
            (GeometryKind::Polygon, Some("MultiPolygon")) => polygons.push(parse_multipolygon(coords)?),
            (GeometryKind::Polygon, None) => polygons.push(MultiPolygon::new(Vec::new())),
            (GeometryKind::Point, Some("Point")) => points.push(Point::from(parse_coord(coords)?)),
            (_, other) => bail!("[io::geojson] feature {i}: unsupported geometry type {other:?} for a {kind:?} layer"),
        }
        properties.push(feature["properties"].as_object());
    }

    Ok(Features { polygons, points, data: properties_to_dataframe(&properties)?, crs: read_crs(&value)? })
}

fn read_crs(value: &Value) -> Result<Crs> {
    let Some(name) = value["crs"]["properties"]["name"].as_str() else { return Ok(Crs::from_epsg(WGS84)?) };
    if name.ends_with("CRS84") { return Ok(Crs::from_epsg(WGS84)?) }

    let code = name.rsplit(':').next()
        .and_then(|code| code.parse::<u32>().ok())
        .ok_or_else(|| anyhow!("[io::geojson] Unrecognized crs name: {name}"))?;
    Ok(Crs::from_epsg(code)?)
}

/// Build one column per property key (in key order). A column is Float64 when every non-null
/// value is a number, and String otherwise.
fn properties_to_dataframe(properties: &[Option<&Map<String, Value>>]) -> Result<DataFrame> {
    let mut keys = properties.iter().flatten()
        .flat_map(|props| props.keys().cloned())
        .collect::<Vec<_>>();
    keys.sort();
    keys.dedup();

    let columns = keys.into_iter()
        .map(|key| {
            let values = properties.iter()
                .map(|props| props.and_then(|props| props.get(&key)).filter(|v| !v.is_null()))
                .collect::<Vec<_>>();

            if values.iter().flatten().all(|v| v.is_number()) {
                Column::new(key.into(), values.iter().map(|v| v.and_then(Value::as_f64)).collect::<Vec<_>>())
            } else {
                let text = values.iter()
                    .map(|v| v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }))
                    .collect::<Vec<_>>();
                Column::new(key.into(), text)
            }
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

fn parse_coord(value: &Value) -> Result<Coord<f64>> {
    let pair = value.as_array().filter(|pair| pair.len() >= 2)
        .ok_or_else(|| anyhow!("[io::geojson] Invalid position: {value}"))?;
    let x = pair[0].as_f64().ok_or_else(|| anyhow!("[io::geojson] Invalid coordinate: x must be a number"))?;
    let y = pair[1].as_f64().ok_or_else(|| anyhow!("[io::geojson] Invalid coordinate: y must be a number"))?;
    Ok(Coord { x, y })
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let mut coords = value.as_array()
        .ok_or_else(|| anyhow!("[io::geojson] Invalid linear ring"))?
        .iter()
        .map(parse_coord)
        .collect::<Result<Vec<_>>>()?;

    if !coords.is_empty() && coords.first() != coords.last() {
        coords.push(coords[0]);
    }
    Ok(LineString(coords))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = value.as_array().ok_or_else(|| anyhow!("[io::geojson] Invalid Polygon coordinates"))?;
    let (exterior, interiors) = rings.split_first()
        .ok_or_else(|| anyhow!("[io::geojson] Invalid Polygon: missing exterior ring"))?;
    Ok(Polygon::new(parse_ring(exterior)?, interiors.iter().map(parse_ring).collect::<Result<Vec<_>>>()?))
}

fn parse_multipolygon(value: &Value) -> Result<MultiPolygon<f64>> {
    let polygons = value.as_array().ok_or_else(|| anyhow!("[io::geojson] Invalid MultiPolygon coordinates"))?;
    Ok(MultiPolygon(polygons.iter().map(parse_polygon).collect::<Result<Vec<_>>>()?))
}

fn ring_to_json(ring: &LineString<f64>) -> Value {
    json!(ring.coords().map(|c| [c.x, c.y]).collect::<Vec<_>>())
}

fn multipolygon_to_json(shape: &MultiPolygon<f64>) -> Value {
    let polygons = shape.0.iter()
        .map(|polygon| std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(ring_to_json)
            .collect::<Vec<_>>())
        .collect::<Vec<_>>();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

/// Property maps for every row of `df`.
fn row_properties(df: &DataFrame, num_rows: usize) -> Result<Vec<Map<String, Value>>> {
    let columns = json_columns(df)?;
    Ok((0..num_rows)
        .map(|row| columns.iter()
            .map(|(name, values)| (name.clone(), values.get(row).cloned().unwrap_or(Value::Null)))
            .collect())
        .collect())
}

fn feature_collection(features: Vec<Value>, crs: &Crs) -> Value {
    let mut collection = json!({ "type": "FeatureCollection", "features": features });
    if let Some(code) = crs.epsg().filter(|&code| code != WGS84) {
        collection["crs"] = json!({ "type": "name", "properties": { "name": format!("urn:ogc:def:crs:EPSG::{code}") } });
    }
    collection
}

/// Serialize a polygon layer as a FeatureCollection with every attribute as a property.
pub(crate) fn polygon_layer_to_geojson(layer: &PolygonLayer) -> Result<Value> {
    let properties = row_properties(layer.data(), layer.len())?;
    let features = layer.shapes().iter().zip(properties)
        .map(|(shape, properties)| json!({
            "type": "Feature",
            "geometry": multipolygon_to_json(shape),
            "properties": properties,
        }))
        .collect();
    Ok(feature_collection(features, layer.crs()))
}

/// Serialize a point layer as a FeatureCollection with every attribute as a property.
pub(crate) fn point_layer_to_geojson(layer: &PointLayer) -> Result<Value> {
    let properties = row_properties(layer.data(), layer.len())?;
    let features = layer.points().iter().zip(properties)
        .map(|(point, properties)| json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [point.x(), point.y()] },
            "properties": properties,
        }))
        .collect();
    Ok(feature_collection(features, layer.crs()))
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::geom::Geometries;

    const POIS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-122.27, 37.80]},
             "properties": {"name": "Main Library", "type": "library", "osm_id": 11}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-122.25, 37.81]},
             "properties": {"name": null, "type": "place_of_worship", "osm_id": 12}}
        ]
    }"#;

    #[test]
    fn read_points_and_properties() {
        let features = read_features(POIS.as_bytes(), GeometryKind::Point).unwrap();
        assert_eq!(features.points.len(), 2);
        assert_eq!(features.crs.epsg(), Some(WGS84));
        assert_eq!(features.data.column("osm_id").unwrap().dtype(), &DataType::Float64);
        assert_eq!(features.data.column("name").unwrap().str().unwrap().get(1), None);
    }

    #[test]
    fn polygon_with_hole_is_read() {
        let json = r#"{"type": "FeatureCollection", "features": [{"type": "Feature", "properties": {"GEOID": "06001400100"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10]], [[2,2],[4,2],[4,4],[2,4],[2,2]]]}}]}"#;
        let features = read_features(json.as_bytes(), GeometryKind::Polygon).unwrap();
        let shape = &features.polygons[0];
        assert_eq!(shape.0[0].interiors().len(), 1);
        assert_eq!(shape.0[0].exterior().0.first(), shape.0[0].exterior().0.last());
    }

    #[test]
    fn wrong_geometry_kind_is_an_error() {
        assert!(read_features(POIS.as_bytes(), GeometryKind::Polygon).is_err());
    }

    #[test]
    fn legacy_crs_member() {
        let json = r#"{"type": "FeatureCollection", "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32617"}}, "features": []}"#;
        assert_eq!(read_features(json.as_bytes(), GeometryKind::Polygon).unwrap().crs.epsg(), Some(32617));
    }

    #[test]
    fn layer_round_trip() {
        let shapes = vec![MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]])];
        let data = DataFrame::new(vec![Column::new("event_score".into(), &[0.75])]).unwrap();
        let layer = PolygonLayer::new("grid", Geometries::new(shapes, Crs::from_epsg(WGS84).unwrap()), data).unwrap();

        let value = polygon_layer_to_geojson(&layer).unwrap();
        assert!(value.get("crs").is_none());
        let bytes = serde_json::to_vec(&value).unwrap();

        let features = read_features(&bytes, GeometryKind::Polygon).unwrap();
        assert_eq!(features.polygons, layer.shapes());
        assert_eq!(features.data.column("event_score").unwrap().f64().unwrap().get(0), Some(0.75));
    }
}
