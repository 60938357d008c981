use geo::{BoundingRect, Intersects};
use polars::prelude::*;
use tracing::debug;

use crate::{
    error::Result,
    geom::{Geometries, Grid},
    layer::{PointLayer, PolygonLayer},
};

/// Default grid cell edge length, in metres.
pub const DEFAULT_CELL_SIZE_M: f64 = 1000.0;

/// Default name of the grid identifier column.
pub const DEFAULT_GRID_ID: &str = "cell_id";

/// Parameters for building a square grid over a reference layer.
#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Cell edge length in metres.
    pub size_m: f64,
    /// Keep only cells intersecting the reference region.
    pub filter: bool,
    /// Name of the identifier column added to the grid.
    pub id_column: String,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self { size_m: DEFAULT_CELL_SIZE_M, filter: true, id_column: DEFAULT_GRID_ID.to_string() }
    }
}

impl PolygonLayer {
    /// Build a grid of square cells over this layer. The grid is returned in this layer's CRS,
    /// with a `u32` identifier column assigned in emission order before filtering.
    pub fn build_grid(&self, options: &GridOptions) -> Result<PolygonLayer> {
        let Grid { ids, cells } = self.geoms().square_grid(options.size_m, options.filter)?;
        debug!(
            "[grid] {} cells of {}m over {} ({} records, filter={})",
            ids.len(), options.size_m, self.name(), self.len(), options.filter
        );

        let data = DataFrame::new(vec![Column::new(options.id_column.as_str().into(), ids)])?;
        PolygonLayer::new("grid", cells, data)
    }

    /// Dissolved buffer of `radius_m` metres around every record, as a single-record layer in
    /// this layer's CRS (or an empty layer if this one is empty).
    pub fn buffer(&self, radius_m: f64) -> Result<PolygonLayer> {
        let geoms = self.geoms().dissolved_buffer(radius_m)?;
        let data = DataFrame::new(vec![Column::new("radius_m".into(), vec![radius_m; geoms.len()])])?;
        PolygonLayer::new(format!("{} buffer", self.name()), geoms, data)
    }

    /// Positions of records intersecting at least one shape of `other`, in ascending order.
    /// `other` is reprojected into this layer's CRS first.
    pub fn rows_intersecting(&self, other: &Geometries) -> Result<Vec<usize>> {
        let other = other.reproject(self.crs())?;
        Ok(self.shapes().iter().enumerate()
            .filter(|(_, shape)| {
                let Some(rect) = shape.bounding_rect() else { return false };
                other.query(rect).any(|j| other.shapes()[j].intersects(*shape))
            })
            .map(|(i, _)| i)
            .collect())
    }

    /// Positions of records intersecting at least one of `points`, in ascending order.
    /// A point on a shared edge counts for every record it touches.
    pub fn rows_with_points(&self, points: &PointLayer) -> Result<Vec<usize>> {
        let points = points.reproject(self.crs())?;
        let mut rows = points.points().iter()
            .flat_map(|point| self.geoms().query_point(*point).into_iter()
                .filter(move |&i| self.shapes()[i].intersects(point)))
            .collect::<Vec<_>>();
        rows.sort_unstable();
        rows.dedup();
        Ok(rows)
    }

    /// For each point, the first record (by position) whose shape intersects it.
    /// Points on a shared edge are assigned to the lower-positioned record.
    pub fn locate_points(&self, points: &PointLayer) -> Result<Vec<Option<usize>>> {
        let points = points.reproject(self.crs())?;
        Ok(points.points().iter()
            .map(|point| self.geoms().query_point(*point).into_iter()
                .find(|&i| self.shapes()[i].intersects(point)))
            .collect())
    }
}
