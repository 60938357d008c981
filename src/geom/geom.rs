use geo::{BooleanOps, BoundingRect, Coord, MultiPolygon, Point, Rect};
use rstar::{RTree, AABB};

use crate::geom::{BoundingBox, Crs};

/// Geometries represents an ordered collection of MultiPolygons in one CRS, indexed by an R-tree.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    crs: Crs,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Empty shapes are kept in order but never returned by spatial queries.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, crs: Crs) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            shapes,
            crs,
        }
    }

    /// Construct an empty collection in the given CRS.
    pub fn empty(crs: Crs) -> Self { Self::new(Vec::new(), crs) }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get the coordinate reference system of every shape.
    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    /// Consume the collection, returning the shapes.
    #[inline] pub fn into_shapes(self) -> Vec<MultiPolygon<f64>> { self.shapes }

    /// Indices of shapes whose bounding boxes intersect the given rectangle.
    pub fn query(&self, rect: Rect<f64>) -> impl Iterator<Item = usize> + '_ {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        self.rtree.locate_in_envelope_intersecting(&envelope).map(BoundingBox::idx)
    }

    /// Indices of shapes whose bounding boxes contain the given point, in ascending order.
    pub fn query_point(&self, point: Point<f64>) -> Vec<usize> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut hits = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(BoundingBox::idx)
            .collect::<Vec<_>>();
        hits.sort_unstable();
        hits
    }

    /// Compute the bounding rectangle of all MultiPolygons.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }

    /// Compute the union of all MultiPolygons into a single MultiPolygon.
    /// This method may be slow for large numbers of complex polygons.
    pub fn union(&self) -> MultiPolygon<f64> {
        self.shapes.iter().cloned()
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
    }

    /// Select a subset of shapes by index, preserving the given order.
    pub fn take(&self, rows: &[usize]) -> Self {
        Self::new(rows.iter().map(|&i| self.shapes[i].clone()).collect(), self.crs.clone())
    }
}
