use std::cmp::Ordering;

use ahash::AHashMap;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SitingError},
    geom::Crs,
    layer::{ensure_unique, require_column, take_rows, GridOptions, PointLayer, PolygonLayer},
    reaggregate::reaggregate,
    score::{check_indicators, index_score, ScoreOptions, StdMethod},
    siting::{merge_indicators, OutlierStrategy},
};

/// Name of the score column added to the grid, the potential cells, and the ranked POIs.
pub const SCORE_COLUMN: &str = "event_score";

/// POI attribute holding a display name.
pub const POI_NAME_COLUMN: &str = "name";

/// Value given to POIs with no name.
pub const NAME_PLACEHOLDER: &str = "NAME UNKNOWN";

/// Column names and thresholds for one siting run.
#[derive(Debug, Clone)]
pub struct SitingParams {
    /// Key column on the tract layer.
    pub tract_id: String,
    /// Key column on the indicator table.
    pub indicator_id: String,
    /// Indicator used to pick outlier tracts.
    pub outlier_indicator: String,
    pub poi_type_column: String,
    pub poi_types: Vec<String>,
    /// Buffer radius around the outlier tracts, in metres.
    pub radius_m: f64,
    /// Indicators that raise the score.
    pub pos_vars: Vec<String>,
    /// Indicators that lower the score.
    pub neg_vars: Vec<String>,
    pub min_mean_ratio: Option<f64>,
    pub min_zscore: Option<f64>,
    pub std_method: StdMethod,
    /// Grid id column, and the cell size used when no grid is supplied.
    pub grid: GridOptions,
    /// CRS every layer is brought into before analysis.
    pub target_crs: Crs,
    /// Skip score indicators absent from the indicator table instead of failing.
    pub allow_missing_columns: bool,
}

/// Raw inputs to a run, each in its own CRS.
#[derive(Debug, Clone)]
pub struct SitingInputs {
    pub tracts: PolygonLayer,
    pub indicators: DataFrame,
    pub pois: PointLayer,
    /// Pre-built grid; built from the tracts when absent.
    pub grid: Option<PolygonLayer>,
}

/// Inputs after reprojection into the target CRS, indicator merge, and POI type filtering.
#[derive(Debug, Clone)]
pub struct NormalizedInputs {
    pub tracts: PolygonLayer,
    pub pois: PointLayer,
    pub grid: PolygonLayer,
}

/// Every layer produced by a run, all in the target CRS.
#[derive(Debug, Clone)]
pub struct SitingOutputs {
    /// Tracts with merged indicators.
    pub tracts: PolygonLayer,
    pub outliers: PolygonLayer,
    /// Dissolved buffer around the outliers (one record, or none).
    pub buffer: PolygonLayer,
    /// Grid cells inside the buffer holding at least one POI.
    pub potential_cells: PolygonLayer,
    /// The full grid with scores.
    pub scored_grid: PolygonLayer,
    /// Potential cells with scores.
    pub scored_cells: PolygonLayer,
    /// POIs in potential cells, best score first.
    pub ranked_pois: PointLayer,
}

/// Linear siting pipeline. Each stage reads the previous stage's output and returns a new value.
#[derive(Debug, Clone)]
pub struct SitingPipeline {
    params: SitingParams,
}

impl SitingPipeline {
    pub fn new(params: SitingParams) -> Self { Self { params } }

    #[inline] pub fn params(&self) -> &SitingParams { &self.params }

    /// Run every stage in order.
    pub fn run(&self, inputs: &SitingInputs) -> Result<SitingOutputs> {
        let strategy = self.validate(inputs)?;

        info!("[siting] normalizing inputs to {}", self.params.target_crs);
        let NormalizedInputs { tracts, pois, grid } = self.normalize_crs(inputs)?;

        info!("[siting] selecting outlier tracts ({strategy:?})");
        let outliers = self.select_outliers(&tracts, strategy)?;

        info!("[siting] building {}m buffer around {} outlier tracts", self.params.radius_m, outliers.len());
        let buffer = self.build_buffer(&outliers)?;

        info!("[siting] identifying potential grid cells");
        let potential_cells = self.filter_grid(&grid, &buffer, &pois)?;

        info!("[siting] scoring {} grid cells", grid.len());
        let indicators = self.reaggregate_indicators(&tracts, &grid)?;
        let scored_grid = self.score_grid(&grid, &indicators)?;
        let scored_cells = self.join_scores(&potential_cells, &scored_grid)?;

        info!("[siting] ranking points of interest in {} potential cells", scored_cells.len());
        let ranked_pois = self.rank_pois(&pois, &scored_cells)?;

        info!("[siting] run complete: {} ranked sites", ranked_pois.len());
        Ok(SitingOutputs { tracts, outliers, buffer, potential_cells, scored_grid, scored_cells, ranked_pois })
    }

    /// Check the configuration against the inputs before any spatial work.
    pub fn validate(&self, inputs: &SitingInputs) -> Result<OutlierStrategy> {
        let params = &self.params;
        let strategy = OutlierStrategy::from_thresholds(params.min_mean_ratio, params.min_zscore)?;
        check_indicators(&params.pos_vars, &params.neg_vars)?;

        if !params.radius_m.is_finite() || params.radius_m < 0.0 {
            return Err(SitingError::invalid("radius_m", format!("buffer radius must be non-negative, got {}", params.radius_m)));
        }

        inputs.tracts.require_column(&params.tract_id)?;
        inputs.pois.require_column(&params.poi_type_column)?;

        let table = "tract indicators";
        require_column(&inputs.indicators, &params.indicator_id, table)?;
        require_column(&inputs.indicators, &params.outlier_indicator, table)?;
        for name in params.pos_vars.iter().chain(&params.neg_vars) {
            if params.allow_missing_columns && inputs.indicators.get_column_index(name).is_none() { continue }
            require_column(&inputs.indicators, name, table)?;
        }

        match &inputs.grid {
            Some(grid) => ensure_unique(&grid.string_column(&params.grid.id_column)?, &params.grid.id_column)?,
            None if !(params.grid.size_m.is_finite() && params.grid.size_m > 0.0) => {
                return Err(SitingError::invalid("size_m", format!("grid cell size must be positive, got {}", params.grid.size_m)));
            }
            None => {}
        }

        Ok(strategy)
    }

    /// Bring every layer into the target CRS, merge indicators onto the tracts, keep only POIs of
    /// the requested types, and build the grid if none was supplied.
    pub fn normalize_crs(&self, inputs: &SitingInputs) -> Result<NormalizedInputs> {
        let params = &self.params;

        let tracts = self.to_target(&inputs.tracts)?;
        let tracts = merge_indicators(&tracts, &params.tract_id, &inputs.indicators, &params.indicator_id)?;

        let pois = if inputs.pois.crs() != &params.target_crs {
            info!("[siting] reprojecting {} from {} to {}", inputs.pois.name(), inputs.pois.crs(), params.target_crs);
            inputs.pois.reproject(&params.target_crs)?
        } else {
            inputs.pois.clone()
        };
        let pois = pois.filter_values(&params.poi_type_column, &params.poi_types)?;
        debug!("[siting] {} of {} POIs have an allowed type", pois.len(), inputs.pois.len());

        let grid = match &inputs.grid {
            Some(grid) => self.to_target(grid)?,
            None => tracts.build_grid(&params.grid)?,
        };

        Ok(NormalizedInputs { tracts, pois, grid })
    }

    fn to_target(&self, layer: &PolygonLayer) -> Result<PolygonLayer> {
        if layer.crs() == &self.params.target_crs { return Ok(layer.clone()) }
        info!("[siting] reprojecting {} from {} to {}", layer.name(), layer.crs(), self.params.target_crs);
        layer.reproject(&self.params.target_crs)
    }

    /// Tracts picked by `strategy` on the outlier indicator.
    pub fn select_outliers(&self, tracts: &PolygonLayer, strategy: OutlierStrategy) -> Result<PolygonLayer> {
        let values = tracts.float_column(&self.params.outlier_indicator)?;
        let rows = strategy.select(&values);
        if rows.is_empty() {
            warn!("[siting] no tracts selected as outliers; no sites will be found");
        }
        debug!("[siting] {} of {} tracts selected", rows.len(), tracts.len());
        Ok(tracts.take(&rows)?.with_name("outlier tracts"))
    }

    /// Dissolved buffer around the outlier tracts.
    pub fn build_buffer(&self, outliers: &PolygonLayer) -> Result<PolygonLayer> {
        Ok(outliers.buffer(self.params.radius_m)?.with_name("tract buffer"))
    }

    /// Grid cells that intersect the buffer and hold at least one POI, in grid order.
    pub fn filter_grid(&self, grid: &PolygonLayer, buffer: &PolygonLayer, pois: &PointLayer) -> Result<PolygonLayer> {
        let in_buffer = grid.rows_intersecting(buffer.geoms())?;
        let with_pois = grid.rows_with_points(pois)?;

        let rows = in_buffer.into_iter()
            .filter(|row| with_pois.binary_search(row).is_ok())
            .collect::<Vec<_>>();
        debug!("[siting] {} potential cells ({} cells hold POIs)", rows.len(), with_pois.len());

        Ok(grid.take(&rows)?.with_name("potential cells"))
    }

    /// Area-weight every score indicator from the tracts onto the grid.
    pub fn reaggregate_indicators(&self, tracts: &PolygonLayer, grid: &PolygonLayer) -> Result<PolygonLayer> {
        let attributes = self.score_vars(tracts.data());
        reaggregate(tracts, grid, &self.params.grid.id_column, &attributes)
    }

    /// The grid with one `event_score` per cell, computed from the reaggregated indicators.
    pub fn score_grid(&self, grid: &PolygonLayer, indicators: &PolygonLayer) -> Result<PolygonLayer> {
        let options = ScoreOptions { allow_missing_columns: self.params.allow_missing_columns };
        let scores = index_score(indicators.data(), &self.params.pos_vars, &self.params.neg_vars, self.params.std_method, options)?;

        let missing = scores.iter().filter(|score| score.is_none()).count();
        if missing > 0 {
            warn!("[siting] {missing} of {} grid cells have no indicator data and no score", scores.len());
        }

        Ok(grid.clone()
            .with_column(Column::new(SCORE_COLUMN.into(), scores))?
            .with_name("scored grid"))
    }

    /// Attach grid scores to the potential cells by grid id.
    pub fn join_scores(&self, potential_cells: &PolygonLayer, scored_grid: &PolygonLayer) -> Result<PolygonLayer> {
        let id = &self.params.grid.id_column;
        let scores = scored_grid.string_column(id)?.into_iter()
            .zip(scored_grid.float_column(SCORE_COLUMN)?)
            .filter_map(|(key, score)| Some((key?, score)))
            .collect::<AHashMap<_, _>>();

        let joined = potential_cells.string_column(id)?.into_iter()
            .map(|key| key.and_then(|key| scores.get(&key).copied().flatten()))
            .collect::<Vec<_>>();

        Ok(potential_cells.clone()
            .with_column(Column::new(SCORE_COLUMN.into(), joined))?
            .with_name("scored cells"))
    }

    /// POIs inside scored cells, tagged with the cell id and score and sorted best first.
    /// Each POI takes the first cell (grid order) it touches; unnamed POIs get a placeholder name.
    pub fn rank_pois(&self, pois: &PointLayer, scored_cells: &PolygonLayer) -> Result<PointLayer> {
        let id = self.params.grid.id_column.as_str();
        let (poi_rows, cell_rows): (Vec<usize>, Vec<usize>) = scored_cells.locate_points(pois)?
            .into_iter()
            .enumerate()
            .filter_map(|(poi, cell)| Some((poi, cell?)))
            .unzip();

        let cells = scored_cells.data().select([id, SCORE_COLUMN])?;
        let cells = take_rows(&cells, &cell_rows)?;

        let mut ranked = pois.take(&poi_rows)?;
        for column in cells.get_columns() {
            ranked = ranked.with_column(column.clone())?;
        }

        let names = if ranked.has_column(POI_NAME_COLUMN) {
            ranked.string_column(POI_NAME_COLUMN)?.into_iter()
                .map(|name| name.unwrap_or_else(|| NAME_PLACEHOLDER.to_string()))
                .collect::<Vec<_>>()
        } else {
            vec![NAME_PLACEHOLDER.to_string(); ranked.len()]
        };
        let ranked = ranked.with_column(Column::new(POI_NAME_COLUMN.into(), names))?;

        let scores = ranked.float_column(SCORE_COLUMN)?;
        let mut order = (0..ranked.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| match (scores[a], scores[b]) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        Ok(ranked.take(&order)?)
    }

    /// Score indicators to carry onto the grid. Absent ones are dropped only when allowed.
    fn score_vars(&self, df: &DataFrame) -> Vec<String> {
        self.params.pos_vars.iter().chain(&self.params.neg_vars)
            .filter(|name| !self.params.allow_missing_columns || df.get_column_index(name).is_some())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon, Point};

    use super::*;
    use crate::{error::ErrorKind, geom::Geometries, layer::DEFAULT_GRID_ID};

    fn utm() -> Crs { Crs::from_epsg(32617).unwrap() }

    fn square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y), (x: x + 1000.0, y: y), (x: x + 1000.0, y: y + 1000.0), (x: x, y: y + 1000.0),
        ]])
    }

    fn params() -> SitingParams {
        SitingParams {
            tract_id: "GEOID".into(),
            indicator_id: "GEOID".into(),
            outlier_indicator: "hloss".into(),
            poi_type_column: "type".into(),
            poi_types: vec!["library".into()],
            radius_m: 600.0,
            pos_vars: vec!["renters".into()],
            neg_vars: vec!["income".into()],
            min_mean_ratio: Some(2.0),
            min_zscore: None,
            std_method: StdMethod::Standardize,
            grid: GridOptions::default(),
            target_crs: utm(),
            allow_missing_columns: false,
        }
    }

    fn cells(ids: &[u32], scores: &[Option<f64>]) -> PolygonLayer {
        let shapes = ids.iter().map(|&id| square(f64::from(id) * 1000.0, 0.0)).collect();
        let data = DataFrame::new(vec![
            Column::new(DEFAULT_GRID_ID.into(), ids),
            Column::new(SCORE_COLUMN.into(), scores),
        ]).unwrap();
        PolygonLayer::new("cells", Geometries::new(shapes, utm()), data).unwrap()
    }

    fn pois() -> PointLayer {
        let points = vec![
            Point::new(3500.0, 500.0),
            Point::new(2500.0, 500.0),
            Point::new(3600.0, 600.0),
            Point::new(9000.0, 500.0),
        ];
        let data = DataFrame::new(vec![
            Column::new("name".into(), &[Some("A"), None, Some("C"), Some("Far")]),
            Column::new("type".into(), &["library", "library", "library", "library"]),
        ]).unwrap();
        PointLayer::new("pois", points, utm(), data).unwrap()
    }

    fn inputs() -> SitingInputs {
        let shapes = (0..4).map(|i| square(f64::from(i) * 1000.0, 0.0)).collect();
        let tracts = PolygonLayer::new(
            "tracts",
            Geometries::new(shapes, utm()),
            DataFrame::new(vec![Column::new("GEOID".into(), &["01", "02", "03", "04"])]).unwrap(),
        ).unwrap();
        let indicators = DataFrame::new(vec![
            Column::new("GEOID".into(), &["01", "02", "03", "04"]),
            Column::new("hloss".into(), &[1.0, 1.0, 1.0, 10.0]),
            Column::new("renters".into(), &[10.0, 20.0, 30.0, 40.0]),
            Column::new("income".into(), &[40.0, 30.0, 20.0, 10.0]),
        ]).unwrap();
        SitingInputs { tracts, indicators, pois: pois(), grid: None }
    }

    #[test]
    fn ranked_best_first_with_placeholder_names() {
        let pipeline = SitingPipeline::new(params());
        let ranked = pipeline.rank_pois(&pois(), &cells(&[2, 3], &[Some(0.5), Some(1.5)])).unwrap();

        let names = ranked.string_column(POI_NAME_COLUMN).unwrap();
        assert_eq!(names, vec![Some("A".to_string()), Some("C".to_string()), Some(NAME_PLACEHOLDER.to_string())]);
        assert_eq!(ranked.float_column(SCORE_COLUMN).unwrap(), vec![Some(1.5), Some(1.5), Some(0.5)]);
        assert_eq!(ranked.float_column(DEFAULT_GRID_ID).unwrap(), vec![Some(3.0), Some(3.0), Some(2.0)]);
    }

    #[test]
    fn null_scores_rank_last() {
        let pipeline = SitingPipeline::new(params());
        let ranked = pipeline.rank_pois(&pois(), &cells(&[2, 3], &[Some(-1.0), None])).unwrap();
        assert_eq!(ranked.float_column(SCORE_COLUMN).unwrap(), vec![Some(-1.0), None, None]);
    }

    #[test]
    fn missing_name_column_uses_placeholder() {
        let pipeline = SitingPipeline::new(params());
        let unnamed = PointLayer::new(
            "pois",
            vec![Point::new(2500.0, 500.0)],
            utm(),
            DataFrame::new(vec![Column::new("type".into(), &["library"])]).unwrap(),
        ).unwrap();

        let ranked = pipeline.rank_pois(&unnamed, &cells(&[2], &[Some(0.0)])).unwrap();
        assert_eq!(ranked.string_column(POI_NAME_COLUMN).unwrap(), vec![Some(NAME_PLACEHOLDER.to_string())]);
    }

    #[test]
    fn scores_joined_by_cell_id() {
        let pipeline = SitingPipeline::new(params());
        let grid = cells(&[0, 1, 2, 3], &[Some(0.0), Some(0.1), None, Some(0.3)]);
        let potential = grid.take(&[3, 1, 2]).unwrap()
            .with_column(Column::new(SCORE_COLUMN.into(), &[None::<f64>, None, None])).unwrap();

        let joined = pipeline.join_scores(&potential, &grid).unwrap();
        assert_eq!(joined.float_column(SCORE_COLUMN).unwrap(), vec![Some(0.3), Some(0.1), None]);
    }

    #[test]
    fn potential_cells_need_buffer_and_poi() {
        let pipeline = SitingPipeline::new(params());
        let grid = cells(&[0, 1, 2, 3], &[None, None, None, None]);
        let buffer = PolygonLayer::from_shapes("buffer", vec![square(2000.0, 0.0)], utm());

        let potential = pipeline.filter_grid(&grid, &buffer, &pois()).unwrap();
        // Cell 1 touches the buffer edge but holds no POI.
        assert_eq!(potential.float_column(DEFAULT_GRID_ID).unwrap(), vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn validation_rejects_bad_configuration() {
        let mut both = params();
        both.min_zscore = Some(1.0);
        let err = SitingPipeline::new(both).validate(&inputs()).unwrap_err();
        assert!(matches!(err, SitingError::OutlierStrategy));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let mut conflict = params();
        conflict.neg_vars.push("renters".into());
        assert!(matches!(SitingPipeline::new(conflict).validate(&inputs()), Err(SitingError::ConflictingIndicator(_))));

        let mut missing = params();
        missing.pos_vars.push("poverty".into());
        assert!(matches!(SitingPipeline::new(missing).validate(&inputs()), Err(SitingError::MissingColumn { .. })));

        let mut negative = params();
        negative.radius_m = -1.0;
        assert!(matches!(SitingPipeline::new(negative).validate(&inputs()), Err(SitingError::InvalidParameter { .. })));
    }

    #[test]
    fn missing_indicators_skipped_when_allowed() {
        let mut allowed = params();
        allowed.pos_vars.push("poverty".into());
        allowed.allow_missing_columns = true;
        assert!(SitingPipeline::new(allowed).validate(&inputs()).is_ok());
    }

    #[test]
    fn outliers_by_mean_ratio() {
        let pipeline = SitingPipeline::new(params());
        let strategy = pipeline.validate(&inputs()).unwrap();
        let normalized = pipeline.normalize_crs(&inputs()).unwrap();

        let outliers = pipeline.select_outliers(&normalized.tracts, strategy).unwrap();
        assert_eq!(outliers.string_column("GEOID").unwrap(), vec![Some("04".to_string())]);
        assert_eq!(normalized.pois.len(), 4);
    }
}
