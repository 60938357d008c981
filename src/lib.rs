#![doc = "Event site selection from census-tract indicators over a spatial grid"]
mod error;
mod geom;
mod layer;
mod reaggregate;
mod score;
mod siting;

pub mod geocode;
pub mod io;

#[doc(inline)]
pub use error::{ErrorKind, Result, SitingError};

#[doc(inline)]
pub use geom::{Crs, Fragment, Geometries, Grid, NAD83, WGS84};

#[doc(inline)]
pub use layer::{GridOptions, PointLayer, PolygonLayer, DEFAULT_CELL_SIZE_M, DEFAULT_GRID_ID};

#[doc(inline)]
pub use reaggregate::{reaggregate, reaggregate_with, Weighting};

#[doc(inline)]
pub use score::{check_indicators, index_score, normalize, standardize, ScoreOptions, StdMethod};

#[doc(inline)]
pub use siting::{
    merge_indicators, NormalizedInputs, OutlierStrategy, SitingConfig, SitingInputs, SitingOutputs,
    SitingParams, SitingPipeline, NAME_PLACEHOLDER, POI_NAME_COLUMN, SCORE_COLUMN,
};
