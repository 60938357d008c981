use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    geom::{Crs, WGS84},
    layer::{GridOptions, DEFAULT_CELL_SIZE_M, DEFAULT_GRID_ID},
    score::StdMethod,
    siting::SitingParams,
};

fn default_grid_id() -> String { DEFAULT_GRID_ID.to_string() }

fn default_grid_size() -> f64 { DEFAULT_CELL_SIZE_M }

fn default_target_epsg() -> u32 { WGS84 }

fn default_output_path() -> PathBuf { PathBuf::from("./event-siting-outputs") }

/// Run configuration, as read from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SitingConfig {
    pub county_name: String,

    pub tract_path: PathBuf,
    pub tract_geoid_varname: String,
    pub tract_data_path: PathBuf,
    pub tract_data_geoid_varname: String,
    pub housing_loss_varname: String,

    pub poi_path: PathBuf,
    pub poi_type_varname: String,
    pub poi_types: Vec<String>,

    pub distance_radius_m: f64,
    #[serde(default)]
    pub pos_corr_vars: Vec<String>,
    #[serde(default)]
    pub neg_corr_vars: Vec<String>,

    pub grid_path: Option<PathBuf>,
    #[serde(default = "default_grid_id")]
    pub grid_id_varname: String,
    #[serde(default = "default_grid_size")]
    pub grid_size_m: f64,

    pub min_mean_ratio: Option<f64>,
    pub min_zscore: Option<f64>,
    #[serde(default)]
    pub std_method: StdMethod,

    /// CRS every layer is brought into before analysis.
    #[serde(default = "default_target_epsg")]
    pub target_epsg: u32,
    /// Overrides for input layers whose files carry no usable CRS.
    pub tract_epsg: Option<u32>,
    pub poi_epsg: Option<u32>,
    pub grid_epsg: Option<u32>,

    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

impl SitingConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("[siting::config] Failed to parse run configuration")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("[siting::config] Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&yaml)
            .with_context(|| format!("[siting::config] Invalid config file: {}", path.display()))
    }

    /// Analysis parameters for the pipeline.
    pub fn params(&self) -> crate::Result<SitingParams> {
        Ok(SitingParams {
            tract_id: self.tract_geoid_varname.clone(),
            indicator_id: self.tract_data_geoid_varname.clone(),
            outlier_indicator: self.housing_loss_varname.clone(),
            poi_type_column: self.poi_type_varname.clone(),
            poi_types: self.poi_types.clone(),
            radius_m: self.distance_radius_m,
            pos_vars: self.pos_corr_vars.clone(),
            neg_vars: self.neg_corr_vars.clone(),
            min_mean_ratio: self.min_mean_ratio,
            min_zscore: self.min_zscore,
            std_method: self.std_method,
            grid: GridOptions { size_m: self.grid_size_m, filter: true, id_column: self.grid_id_varname.clone() },
            target_crs: Crs::from_epsg(self.target_epsg)?,
            allow_missing_columns: false,
        })
    }

    /// Directory the outputs of run `run_id` are written to.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.output_path.join(format!("{run_id}-{}", self.county_name))
    }
}
