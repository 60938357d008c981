mod config;
mod merge;
mod outliers;
mod pipeline;

pub use config::SitingConfig;
pub use merge::merge_indicators;
pub use outliers::OutlierStrategy;
pub use pipeline::{
    NormalizedInputs, SitingInputs, SitingOutputs, SitingParams, SitingPipeline,
    NAME_PLACEHOLDER, POI_NAME_COLUMN, SCORE_COLUMN,
};
