use geo::{BoundingRect, Intersects, MultiPolygon, Polygon};

use crate::{error::{Result, SitingError}, geom::Geometries};

/// Grid cells produced over a reference region, with their sequential ids.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Zero-based id of each cell in emission order (dense before filtering).
    pub ids: Vec<u32>,
    /// Cell squares, in the reference CRS.
    pub cells: Geometries,
}

/// Round to two decimal places, in the given direction, so cell edges do not leave gaps at the bounds.
#[inline] fn floor2(value: f64) -> f64 { (value * 100.0).floor() / 100.0 }
#[inline] fn ceil2(value: f64) -> f64 { (value * 100.0).ceil() / 100.0 }

/// Number of `size` steps needed to cover `[start, end)`.
#[inline]
fn steps(start: f64, end: f64, size: f64) -> usize {
    if end <= start { 0 } else { ((end - start) / size).ceil() as usize }
}

impl Geometries {
    /// Tessellate the bounds of these shapes into squares of `size` metres.
    ///
    /// The bounds are taken in the metric CRS chosen by `metric_crs`, with the minimum corner
    /// rounded down and the maximum corner rounded up to two decimals. Columns run left to right
    /// from the left edge, rows run top to bottom from the top edge, and cells are emitted column
    /// by column. Each cell has corners `(x, y), (x+size, y), (x+size, y-size), (x, y-size)`.
    ///
    /// With `filter`, only cells intersecting at least one reference shape are kept, which is the
    /// same as intersecting the dissolved reference region. Cells are returned in this collection's CRS.
    pub fn square_grid(&self, size: f64, filter: bool) -> Result<Grid> {
        if !size.is_finite() || size <= 0.0 {
            return Err(SitingError::invalid("size_m", format!("cell size must be positive, got {size}")));
        }

        let empty = || Grid { ids: Vec::new(), cells: Geometries::empty(self.crs().clone()) };
        if self.is_empty() { return Ok(empty()) }

        let metric = self.to_metric()?;
        let Some(bounds) = metric.bounds() else { return Ok(empty()) };

        let (min_x, min_y) = (floor2(bounds.min().x), floor2(bounds.min().y));
        let (max_x, max_y) = (ceil2(bounds.max().x), ceil2(bounds.max().y));
        let num_cols = steps(min_x, max_x, size);
        let num_rows = steps(min_y, max_y, size);

        let mut ids = Vec::with_capacity(num_cols * num_rows);
        let mut cells = Vec::with_capacity(num_cols * num_rows);

        for col in 0..num_cols {
            let x = min_x + col as f64 * size;
            for row in 0..num_rows {
                let y = max_y - row as f64 * size;
                let cell = Polygon::new(
                    vec![(x, y), (x + size, y), (x + size, y - size), (x, y - size), (x, y)].into(),
                    vec![],
                );
                let id = (col * num_rows + row) as u32;

                if filter && !intersects_any(&metric, &cell) { continue }

                ids.push(id);
                cells.push(MultiPolygon::new(vec![cell]));
            }
        }

        let cells = Geometries::new(cells, metric.crs().clone()).reproject(self.crs())?;
        Ok(Grid { ids, cells })
    }
}

/// Whether `cell` intersects any shape of `reference`.
fn intersects_any(reference: &Geometries, cell: &Polygon<f64>) -> bool {
    let Some(rect) = cell.bounding_rect() else { return false };
    reference.query(rect).any(|i| reference.shapes()[i].intersects(cell))
}
