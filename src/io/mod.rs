//! File formats for siting inputs and outputs.
//!
//! - Shapefiles (`.shp` with sibling `.dbf` and `.prj`) and GeoJSON FeatureCollections for layers
//! - CSV for the indicator table and the ranked site list
//!
//! Readers return the library's layer types; every function here reports failures with `anyhow`
//! context naming the file involved.

mod csv;
mod geojson;
mod prj;
mod shp;
mod table;
mod write;

use std::{fs, path::{Path, PathBuf}};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::{
    geom::{Crs, Geometries},
    layer::{PointLayer, PolygonLayer},
    siting::{SitingConfig, SitingInputs, SitingOutputs},
};

pub use self::csv::read_indicators;
use self::geojson::{read_features, GeometryKind};

/// File names written by [`write_outputs`].
pub const RANKED_SITES_GEOJSON: &str = "potential_event_sites.geojson";
pub const RANKED_SITES_CSV: &str = "potential_event_sites.csv";
pub const SCORED_GRID_GEOJSON: &str = "scored_grid.geojson";
pub const POTENTIAL_CELLS_GEOJSON: &str = "potential_cells.geojson";
pub const OUTLIER_TRACTS_GEOJSON: &str = "outlier_tracts.geojson";
pub const TRACT_BUFFER_GEOJSON: &str = "tract_buffer.geojson";

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// CRS for a shapefile: the explicit override, else its `.prj`.
fn shapefile_crs(path: &Path, crs: Option<&Crs>) -> Result<Crs> {
    if let Some(crs) = crs { return Ok(crs.clone()) }
    match prj::read_prj(path)? {
        Some(crs) => Ok(crs),
        None => bail!("[io] {} has no .prj file; set an EPSG code for it in the config", path.display()),
    }
}

/// Read a polygon layer from a shapefile or GeoJSON file. `crs`, when given, overrides the CRS
/// recorded in the file.
pub fn read_polygon_layer(path: &Path, name: &str, crs: Option<&Crs>) -> Result<PolygonLayer> {
    let layer = match extension(path).as_str() {
        "shp" => {
            let (shapes, data) = shp::read_polygons(path)?;
            PolygonLayer::new(name, Geometries::new(shapes, shapefile_crs(path, crs)?), data)?
        }
        "geojson" | "json" => {
            let bytes = fs::read(path)
                .with_context(|| format!("[io] Failed to read {}", path.display()))?;
            let features = read_features(&bytes, GeometryKind::Polygon)
                .with_context(|| format!("[io] Invalid GeoJSON in {}", path.display()))?;
            let crs = crs.cloned().unwrap_or(features.crs);
            PolygonLayer::new(name, Geometries::new(features.polygons, crs), features.data)?
        }
        other => bail!("[io] Unsupported polygon file type `{other}`: {}", path.display()),
    };

    debug!("[io] read {} {name} records from {} ({})", layer.len(), path.display(), layer.crs());
    Ok(layer)
}

/// Read a point layer from a shapefile or GeoJSON file. `crs`, when given, overrides the CRS
/// recorded in the file.
pub fn read_point_layer(path: &Path, name: &str, crs: Option<&Crs>) -> Result<PointLayer> {
    let layer = match extension(path).as_str() {
        "shp" => {
            let (points, data) = shp::read_points(path)?;
            PointLayer::new(name, points, shapefile_crs(path, crs)?, data)?
        }
        "geojson" | "json" => {
            let bytes = fs::read(path)
                .with_context(|| format!("[io] Failed to read {}", path.display()))?;
            let features = read_features(&bytes, GeometryKind::Point)
                .with_context(|| format!("[io] Invalid GeoJSON in {}", path.display()))?;
            let crs = crs.cloned().unwrap_or(features.crs);
            PointLayer::new(name, features.points, crs, features.data)?
        }
        other => bail!("[io] Unsupported point file type `{other}`: {}", path.display()),
    };

    debug!("[io] read {} {name} records from {} ({})", layer.len(), path.display(), layer.crs());
    Ok(layer)
}

/// Load every input named by a run configuration.
pub fn read_inputs(config: &SitingConfig) -> Result<SitingInputs> {
    let epsg = |code: Option<u32>| code.map(Crs::from_epsg).transpose();

    let tracts = read_polygon_layer(&config.tract_path, "census tracts", epsg(config.tract_epsg)?.as_ref())?;
    let indicators = read_indicators(&config.tract_data_path, &config.tract_data_geoid_varname)?;
    let pois = read_point_layer(&config.poi_path, "pois", epsg(config.poi_epsg)?.as_ref())?;
    let grid = config.grid_path.as_deref()
        .map(|path| read_polygon_layer(path, "grid", epsg(config.grid_epsg)?.as_ref()))
        .transpose()?;

    Ok(SitingInputs { tracts, indicators, pois, grid })
}

/// Write a polygon layer as GeoJSON.
pub fn write_polygon_geojson(layer: &PolygonLayer, path: &Path) -> Result<()> {
    let value = geojson::polygon_layer_to_geojson(layer)?;
    let bytes = serde_json::to_vec(&value).context("[io] Failed to serialize GeoJSON")?;
    write::write_atomic(path, &bytes)
}

/// Write a point layer as GeoJSON.
pub fn write_point_geojson(layer: &PointLayer, path: &Path) -> Result<()> {
    let value = geojson::point_layer_to_geojson(layer)?;
    let bytes = serde_json::to_vec(&value).context("[io] Failed to serialize GeoJSON")?;
    write::write_atomic(path, &bytes)
}

/// Write a point layer as CSV with `longitude` and `latitude` columns.
pub fn write_point_csv(layer: &PointLayer, path: &Path) -> Result<()> {
    write::write_atomic(path, &csv::points_to_csv(layer)?)
}

/// Write the ranked sites and the intermediate layers of a run into `dir`.
pub fn write_outputs(outputs: &SitingOutputs, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("[io] Failed to create output directory {}", dir.display()))?;

    let paths = [
        RANKED_SITES_GEOJSON, RANKED_SITES_CSV, SCORED_GRID_GEOJSON,
        POTENTIAL_CELLS_GEOJSON, OUTLIER_TRACTS_GEOJSON, TRACT_BUFFER_GEOJSON,
    ].map(|name| dir.join(name));

    write_point_geojson(&outputs.ranked_pois, &paths[0])?;
    write_point_csv(&outputs.ranked_pois, &paths[1])?;
    write_polygon_geojson(&outputs.scored_grid, &paths[2])?;
    write_polygon_geojson(&outputs.scored_cells, &paths[3])?;
    write_polygon_geojson(&outputs.outliers, &paths[4])?;
    write_polygon_geojson(&outputs.buffer, &paths[5])?;

    info!("[io] wrote {} files to {}", paths.len(), dir.display());
    Ok(paths.to_vec())
}
