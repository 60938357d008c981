use polars::prelude::*;
use tracing::{debug, warn};

use crate::{
    error::Result,
    layer::{ensure_unique, PolygonLayer},
};

/// How a fragment's share of a source value is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Weighting {
    /// Weight by the fragment's share of its destination's area. Suited to rates and densities:
    /// a destination fully inside one source takes that source's value.
    #[default]
    Destination,
    /// Weight by the fragment's share of its source's area. Suited to counts: each source total
    /// is split across destinations, so totals are conserved up to clipping at the region edge.
    Source,
}

/// Transfer `attributes` from `src` polygons onto `dst` polygons by destination area weighting.
///
/// Each destination receives, per attribute, the sum over its fragments of the overlapping
/// source value times the fragment's share of the destination's area. Destinations with no
/// valued overlap, or with zero area, receive null. Source values are assumed to be spatially
/// uniform within each source polygon.
///
/// The result is `dst` with one Float64 column per attribute, replacing any column of the same name.
pub fn reaggregate(src: &PolygonLayer, dst: &PolygonLayer, dst_id: &str, attributes: &[String]) -> Result<PolygonLayer> {
    reaggregate_with(src, dst, dst_id, attributes, Weighting::Destination)
}

/// Like [`reaggregate`], with an explicit choice of fragment weighting.
pub fn reaggregate_with(
    src: &PolygonLayer,
    dst: &PolygonLayer,
    dst_id: &str,
    attributes: &[String],
    weighting: Weighting,
) -> Result<PolygonLayer> {
    ensure_unique(&dst.string_column(dst_id)?, dst_id)?;

    let values = attributes.iter()
        .map(|attribute| src.float_column(attribute))
        .collect::<Result<Vec<_>>>()?;

    let fragments = dst.geoms().overlay_fragments(src.geoms())?;
    debug!("[reaggregate] {} -> {}: {} fragments ({weighting:?} weighting)", src.name(), dst.name(), fragments.len());

    let degenerate = fragments.iter()
        .filter(|f| f.area_pct.is_none())
        .map(|f| f.dst)
        .collect::<ahash::AHashSet<_>>();
    if !degenerate.is_empty() {
        warn!("[reaggregate] {} destination polygons in {} have zero area; their values are null", degenerate.len(), dst.name());
    }

    let src_areas = match weighting {
        Weighting::Destination => Vec::new(),
        Weighting::Source if dst.is_empty() => Vec::new(),
        Weighting::Source => src.geoms().areas_in(&dst.geoms().metric_crs()?)?,
    };

    // Weight of each fragment, or None if it carries no source or has an undefined share.
    let weights = fragments.iter()
        .map(|fragment| {
            let (Some(j), Some(pct)) = (fragment.src, fragment.area_pct) else { return None };
            match weighting {
                Weighting::Destination => Some(pct),
                Weighting::Source => (src_areas[j] > 0.0).then(|| fragment.area_m2 / src_areas[j]),
            }
        })
        .collect::<Vec<_>>();

    let mut result = dst.clone();
    for (attribute, values) in attributes.iter().zip(&values) {
        let mut sums: Vec<Option<f64>> = vec![None; dst.len()];
        for (fragment, weight) in fragments.iter().zip(&weights) {
            let (Some(j), Some(weight)) = (fragment.src, weight) else { continue };
            let Some(value) = values[j] else { continue };
            *sums[fragment.dst].get_or_insert(0.0) += value * weight;
        }
        result = result.with_column(Column::new(attribute.as_str().into(), sums))?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon};

    use super::*;
    use crate::{error::SitingError, geom::{Crs, Geometries}};

    fn utm() -> Crs { Crs::from_epsg(32617).unwrap() }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]])
    }

    fn layer(name: &str, shapes: Vec<MultiPolygon<f64>>, columns: Vec<Column>) -> PolygonLayer {
        PolygonLayer::new(name, Geometries::new(shapes, utm()), DataFrame::new(columns).unwrap()).unwrap()
    }

    fn cells() -> PolygonLayer {
        layer("grid", vec![rect(0.0, 0.0, 1000.0, 1000.0), rect(1000.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("cell_id".into(), &[0u32, 1]),
        ])
    }

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn covering_tract_value_is_carried_to_each_cell() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("pct_renters".into(), &[40.0]),
        ]);

        let grid = reaggregate(&tracts, &cells(), "cell_id", &attrs(&["pct_renters"])).unwrap();
        let values = grid.float_column("pct_renters").unwrap();
        assert_relative_eq!(values[0].unwrap(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(values[1].unwrap(), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn split_cell_takes_area_weighted_mean() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 1500.0, 1000.0), rect(1500.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("rent".into(), &[10.0, 20.0]),
        ]);

        let grid = reaggregate(&tracts, &cells(), "cell_id", &attrs(&["rent"])).unwrap();
        let values = grid.float_column("rent").unwrap();
        assert_relative_eq!(values[0].unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(values[1].unwrap(), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn partial_coverage_scales_down() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 250.0, 1000.0)], vec![
            Column::new("rent".into(), &[8.0]),
        ]);

        let grid = reaggregate(&tracts, &cells(), "cell_id", &attrs(&["rent"])).unwrap();
        let values = grid.float_column("rent").unwrap();
        assert_relative_eq!(values[0].unwrap(), 2.0, epsilon = 1e-9);
        assert_eq!(values[1], None);
    }

    #[test]
    fn null_source_values_contribute_nothing() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 1000.0, 1000.0), rect(1000.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("rent".into(), &[Some(5.0), None]),
        ]);

        let grid = reaggregate(&tracts, &cells(), "cell_id", &attrs(&["rent"])).unwrap();
        let values = grid.float_column("rent").unwrap();
        assert_relative_eq!(values[0].unwrap(), 5.0, epsilon = 1e-9);
        assert_eq!(values[1], None);
    }

    #[test]
    fn existing_column_is_replaced() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("rent".into(), &[3.0]),
        ]);
        let dst = cells().with_column(Column::new("rent".into(), &[99.0, 99.0])).unwrap();

        let grid = reaggregate(&tracts, &dst, "cell_id", &attrs(&["rent"])).unwrap();
        assert_eq!(grid.data().width(), 2);
        for value in grid.float_column("rent").unwrap() {
            assert_relative_eq!(value.unwrap(), 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn source_weighting_splits_counts() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("pop".into(), &[100.0]),
        ]);

        let grid = reaggregate_with(&tracts, &cells(), "cell_id", &attrs(&["pop"]), Weighting::Source).unwrap();
        let values = grid.float_column("pop").unwrap();
        assert_relative_eq!(values[0].unwrap(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(values[1].unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn source_weighting_conserves_totals() {
        let tracts = layer("tracts", vec![
            rect(0.0, 0.0, 700.0, 1000.0),
            rect(700.0, 0.0, 1300.0, 1000.0),
            rect(1300.0, 0.0, 2000.0, 1000.0),
        ], vec![
            Column::new("pop".into(), &[120.0, 45.0, 300.0]),
        ]);

        let grid = reaggregate_with(&tracts, &cells(), "cell_id", &attrs(&["pop"]), Weighting::Source).unwrap();
        let total = grid.float_column("pop").unwrap().into_iter().flatten().sum::<f64>();
        assert_relative_eq!(total, 465.0, epsilon = 1e-6);
    }

    #[test]
    fn source_weighting_drops_mass_outside_destinations() {
        let tracts = layer("tracts", vec![rect(1500.0, 0.0, 2500.0, 1000.0)], vec![
            Column::new("pop".into(), &[10.0]),
        ]);

        let grid = reaggregate_with(&tracts, &cells(), "cell_id", &attrs(&["pop"]), Weighting::Source).unwrap();
        let values = grid.float_column("pop").unwrap();
        assert_eq!(values[0], None);
        assert_relative_eq!(values[1].unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("rent".into(), &[3.0]),
        ]);
        let err = reaggregate(&tracts, &cells(), "cell_id", &attrs(&["poverty"])).unwrap_err();
        assert!(matches!(err, SitingError::MissingColumn { ref column, .. } if column == "poverty"));
    }

    #[test]
    fn duplicate_destination_ids_are_rejected() {
        let tracts = layer("tracts", vec![rect(0.0, 0.0, 2000.0, 1000.0)], vec![
            Column::new("rent".into(), &[3.0]),
        ]);
        let dst = cells().with_column(Column::new("cell_id".into(), &[7u32, 7])).unwrap();
        let err = reaggregate(&tracts, &dst, "cell_id", &attrs(&["rent"])).unwrap_err();
        assert!(matches!(err, SitingError::DuplicateId { .. }));
    }
}
