use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};

use crate::{error::Result, geom::{algorithm::proj::{metric_crs_for, Transformer}, Geometries}};

/// A piece of one destination shape produced by a union-mode overlay with a source layer.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Index of the destination shape this fragment lies in.
    pub dst: usize,
    /// Index of the overlapping source shape, or `None` for the part of the destination no source covers.
    pub src: Option<usize>,
    /// Fragment geometry, in the destination CRS.
    pub shape: MultiPolygon<f64>,
    /// Fragment area in square metres.
    pub area_m2: f64,
    /// Share of the destination's total area covered by this fragment.
    /// `None` when the destination has zero area.
    pub area_pct: Option<f64>,
}

impl Geometries {
    /// Overlay `src` onto these (destination) shapes in union mode, keeping every fragment that
    /// belongs to a destination: each non-empty `dst ∩ src` piece, plus the remainder of each
    /// destination left uncovered by sources. Source area outside every destination is not returned.
    ///
    /// `src` is reprojected into the destination CRS first; fragment areas are measured in the
    /// destination's metric CRS. Sources are assumed not to overlap one another.
    pub fn overlay_fragments(&self, src: &Geometries) -> Result<Vec<Fragment>> {
        if self.is_empty() { return Ok(Vec::new()) }

        let src = src.reproject(self.crs())?;
        let metric = metric_crs_for(self.crs(), self.bounds().map(|rect| rect.center()))?;
        let to_metric = Transformer::new(self.crs(), &metric)?;
        let area_of = |shape: &MultiPolygon<f64>| -> Result<f64> {
            Ok(if self.crs() == &metric { shape.unsigned_area() } else { to_metric.apply_shape(shape)?.unsigned_area() })
        };

        let mut fragments = Vec::new();
        for (dst, shape) in self.shapes().iter().enumerate() {
            let Some(rect) = shape.bounding_rect() else { continue };
            let first = fragments.len();

            let mut candidates = src.query(rect).collect::<Vec<_>>();
            candidates.sort_unstable();

            let mut covered: Option<MultiPolygon<f64>> = None;
            for j in candidates {
                let piece = shape.intersection(&src.shapes()[j]);
                if piece.0.is_empty() { continue }

                covered = Some(match covered {
                    Some(acc) => acc.union(&src.shapes()[j]),
                    None => src.shapes()[j].clone(),
                });
                fragments.push(Fragment { dst, src: Some(j), area_m2: area_of(&piece)?, shape: piece, area_pct: None });
            }

            let remainder = match &covered {
                Some(covered) => shape.difference(covered),
                None => shape.clone(),
            };
            if !remainder.0.is_empty() {
                fragments.push(Fragment { dst, src: None, area_m2: area_of(&remainder)?, shape: remainder, area_pct: None });
            }

            // Weight each fragment by its share of the destination's total area.
            let dst_unit_area = fragments[first..].iter().map(|f| f.area_m2).sum::<f64>();
            if dst_unit_area > 0.0 {
                for fragment in &mut fragments[first..] {
                    fragment.area_pct = Some(fragment.area_m2 / dst_unit_area);
                }
            }
        }

        Ok(fragments)
    }
}
