use geo::{BooleanOps, Buffer, MultiPolygon};

use crate::{error::{Result, SitingError}, geom::Geometries};

impl Geometries {
    /// Buffer every shape outward by `radius` metres and dissolve the results into a single shape.
    /// The buffer is computed in the metric CRS and the output is returned in this collection's CRS.
    /// Returns an empty collection when there is nothing to buffer.
    pub fn dissolved_buffer(&self, radius: f64) -> Result<Geometries> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(SitingError::invalid("radius_m", format!("buffer radius must be non-negative, got {radius}")));
        }
        if self.is_empty() { return Ok(Geometries::empty(self.crs().clone())) }

        let metric = self.to_metric()?;
        let dissolved = metric.shapes().iter()
            .map(|shape| if radius > 0.0 { shape.buffer(radius) } else { shape.clone() })
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| MultiPolygon::new(Vec::new()));

        Geometries::new(vec![dissolved], metric.crs().clone()).reproject(self.crs())
    }
}
