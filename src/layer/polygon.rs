use geo::MultiPolygon;
use polars::prelude::*;

use crate::{
    error::{Result, SitingError},
    geom::{Crs, Geometries},
    layer::data::{float_values, require_column, string_values, take_rows},
};

/// An ordered set of polygon records in one CRS, each with a row of attributes.
/// Row `i` of `data` describes shape `i` of `geoms`; a table with no columns carries no attributes.
#[derive(Debug, Clone)]
pub struct PolygonLayer {
    name: String,
    geoms: Geometries,
    data: DataFrame,
}

impl PolygonLayer {
    /// Pair geometries with an attribute table, checking that they line up.
    pub fn new(name: impl Into<String>, geoms: Geometries, data: DataFrame) -> Result<Self> {
        if data.width() > 0 && data.height() != geoms.len() {
            return Err(SitingError::LayerShape { shapes: geoms.len(), rows: data.height() });
        }
        Ok(Self { name: name.into(), geoms, data })
    }

    /// Build a layer from shapes with no attributes.
    pub fn from_shapes(name: impl Into<String>, shapes: Vec<MultiPolygon<f64>>, crs: Crs) -> Self {
        Self { name: name.into(), geoms: Geometries::new(shapes, crs), data: DataFrame::empty() }
    }

    /// Name used in log lines and error messages.
    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { self.geoms.shapes() }

    #[inline] pub fn crs(&self) -> &Crs { self.geoms.crs() }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    /// Rename the layer.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.data.get_column_index(column).is_some()
    }

    pub fn require_column(&self, column: &str) -> Result<()> {
        require_column(&self.data, column, &self.name)
    }

    /// Read an attribute as nullable floats.
    pub fn float_column(&self, column: &str) -> Result<Vec<Option<f64>>> {
        float_values(&self.data, column, &self.name)
    }

    /// Read an attribute as nullable strings.
    pub fn string_column(&self, column: &str) -> Result<Vec<Option<String>>> {
        string_values(&self.data, column, &self.name)
    }

    /// Select records by position, in the given order.
    pub fn take(&self, rows: &[usize]) -> Result<Self> {
        Ok(Self {
            name: self.name.clone(),
            geoms: self.geoms.take(rows),
            data: take_rows(&self.data, rows)?,
        })
    }

    /// Add or replace an attribute column.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        if column.len() != self.len() {
            return Err(SitingError::LayerShape { shapes: self.len(), rows: column.len() });
        }
        self.data.with_column(column)?;
        Ok(self)
    }

    /// Reproject every record into `crs`, keeping attributes unchanged.
    pub fn reproject(&self, crs: &Crs) -> Result<Self> {
        Ok(Self { name: self.name.clone(), geoms: self.geoms.reproject(crs)?, data: self.data.clone() })
    }

    /// Split the layer into its geometry and attribute table.
    pub fn into_parts(self) -> (Geometries, DataFrame) { (self.geoms, self.data) }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::geom::WGS84;

    fn make_layer() -> PolygonLayer {
        let shapes = (0..3)
            .map(|i| {
                let x = i as f64;
                MultiPolygon::new(vec![polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0)]])
            })
            .collect();
        let data = DataFrame::new(vec![Column::new("GEOID".into(), &["a", "b", "c"])]).unwrap();
        PolygonLayer::new("tracts", Geometries::new(shapes, Crs::from_epsg(WGS84).unwrap()), data).unwrap()
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let geoms = Geometries::empty(Crs::from_epsg(WGS84).unwrap());
        let data = DataFrame::new(vec![Column::new("x".into(), &[1.0])]).unwrap();
        assert!(matches!(PolygonLayer::new("t", geoms, data), Err(SitingError::LayerShape { .. })));
    }

    #[test]
    fn take_keeps_geometry_and_rows_aligned() {
        let layer = make_layer().take(&[2, 1]).unwrap();
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.string_column("GEOID").unwrap(), vec![Some("c".into()), Some("b".into())]);
        assert_eq!(layer.shapes()[0], make_layer().shapes()[2]);
    }

    #[test]
    fn with_column_checks_length() {
        let layer = make_layer();
        assert!(layer.clone().with_column(Column::new("x".into(), &[1.0, 2.0])).is_err());

        let layer = layer.with_column(Column::new("x".into(), &[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(layer.float_column("x").unwrap(), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn attribute_free_layer_accepts_columns() {
        let layer = PolygonLayer::from_shapes("cells", make_layer().shapes().to_vec(), Crs::from_epsg(WGS84).unwrap());
        assert!(!layer.has_column("cell_id"));
        let layer = layer.with_column(Column::new("cell_id".into(), &[0u32, 1, 2])).unwrap();
        assert!(layer.has_column("cell_id"));
    }
}
