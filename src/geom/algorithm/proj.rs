use geo::{Area, Coord, MapCoords, MultiPolygon, Point};
use proj4rs::{proj::Proj, transform::transform};

use crate::{error::{Result, SitingError}, geom::{Crs, Geometries, WGS84}};

/// A coordinate transformation between two CRSs.
/// Geographic coordinates are degrees on both sides; proj4rs works in radians internally.
pub(crate) struct Transformer {
    from: Proj,
    to: Proj,
    from_geographic: bool,
    to_geographic: bool,
    from_name: String,
    to_name: String,
}

impl Transformer {
    pub(crate) fn new(from: &Crs, to: &Crs) -> Result<Self> {
        Ok(Self {
            from: from.to_proj()?,
            to: to.to_proj()?,
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
            from_name: from.to_string(),
            to_name: to.to_string(),
        })
    }

    /// Transform a single coordinate.
    pub(crate) fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point).map_err(|e| self.error(e.to_string()))?;

        let out = if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        };

        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(self.error(format!("non-finite result for ({}, {})", coord.x, coord.y)));
        }
        Ok(out)
    }

    pub(crate) fn apply_shape(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord| self.apply(coord))
    }

    pub(crate) fn apply_point(&self, point: Point<f64>) -> Result<Point<f64>> {
        self.apply(point.0).map(Point::from)
    }

    fn error(&self, reason: String) -> SitingError {
        SitingError::Projection { from: self.from_name.clone(), to: self.to_name.clone(), reason }
    }
}

impl Geometries {
    /// Reproject every shape into `crs`. Reprojecting into the current CRS is a plain clone.
    pub fn reproject(&self, crs: &Crs) -> Result<Geometries> {
        if self.crs() == crs { return Ok(self.clone()) }

        let transformer = Transformer::new(self.crs(), crs)?;
        let shapes = self.shapes().iter()
            .map(|shape| transformer.apply_shape(shape))
            .collect::<Result<Vec<_>>>()?;

        Ok(Geometries::new(shapes, crs.clone()))
    }

    /// Choose a metric CRS for Euclidean area and distance calculations.
    /// Projected CRSs in metres are used directly; anything else maps to the UTM zone of the bounds center.
    pub fn metric_crs(&self) -> Result<Crs> {
        metric_crs_for(self.crs(), self.bounds().map(|rect| rect.center()))
    }

    /// Reproject shapes to the CRS returned by `metric_crs`.
    pub fn to_metric(&self) -> Result<Geometries> {
        self.reproject(&self.metric_crs()?)
    }

    /// Planar area of every shape in square metres, measured after reprojecting into `metric`.
    pub fn areas_in(&self, metric: &Crs) -> Result<Vec<f64>> {
        Ok(self.reproject(metric)?.shapes().iter().map(|shape| shape.unsigned_area()).collect())
    }
}

/// Pick a metric CRS for data in `crs` centered at `center` (in `crs` units).
pub(crate) fn metric_crs_for(crs: &Crs, center: Option<Coord<f64>>) -> Result<Crs> {
    if crs.is_metric() { return Ok(crs.clone()) }

    let Some(center) = center else {
        return Err(SitingError::invalid("layer", "cannot choose a metric projection for an empty layer"));
    };

    let lonlat = if crs.is_geographic() {
        center
    } else {
        Transformer::new(crs, &Crs::from_epsg(WGS84)?)?.apply(center)?
    };

    Crs::utm_for(lonlat.x, lonlat.y, crs.is_nad83())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::polygon;

    use super::*;

    fn wgs84() -> Crs { Crs::from_epsg(WGS84).unwrap() }

    #[test]
    fn same_crs_is_identity() {
        let shape = MultiPolygon::new(vec![polygon![(x: 1.0, y: 2.0), (x: 3.0, y: 2.0), (x: 3.0, y: 4.0)]]);
        let geoms = Geometries::new(vec![shape.clone()], wgs84());
        let out = geoms.reproject(&wgs84()).unwrap();
        assert_eq!(out.shapes()[0], shape);
    }

    #[test]
    fn round_trip_through_utm() {
        let shape = MultiPolygon::new(vec![polygon![
            (x: -87.70, y: 41.80), (x: -87.60, y: 41.80), (x: -87.60, y: 41.90), (x: -87.70, y: 41.90),
        ]]);
        let geoms = Geometries::new(vec![shape.clone()], wgs84());

        let metric = geoms.to_metric().unwrap();
        assert_eq!(metric.crs().epsg(), Some(32616));

        let back = metric.reproject(&wgs84()).unwrap();
        for (a, b) in shape.0[0].exterior().coords().zip(back.shapes()[0].0[0].exterior().coords()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-7);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-7);
        }
    }

    #[test]
    fn metric_area_of_small_cell_is_plausible() {
        // 0.01 degree square near the equator is roughly 1113m x 1106m
        let shape = MultiPolygon::new(vec![polygon![
            (x: 9.00, y: 0.00), (x: 9.01, y: 0.00), (x: 9.01, y: 0.01), (x: 9.00, y: 0.01),
        ]]);
        let metric = Geometries::new(vec![shape], wgs84()).to_metric().unwrap();
        let area = metric.shapes()[0].unsigned_area();
        assert!((1.20e6..1.26e6).contains(&area), "area was {area}");
    }

    #[test]
    fn metric_crs_keeps_projected_metres() {
        let utm = Crs::from_epsg(32617).unwrap();
        assert_eq!(metric_crs_for(&utm, None).unwrap(), utm);
    }

    #[test]
    fn empty_geographic_layer_has_no_metric_crs() {
        assert!(Geometries::empty(wgs84()).metric_crs().is_err());
    }
}
