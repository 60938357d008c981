use polars::error::PolarsError;
use thiserror::Error;

/// Result type for core siting operations.
pub type Result<T> = std::result::Result<T, SitingError>;

/// Broad classes of failure, used by callers to decide how to report an aborted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid run configuration, raised before any spatial work starts.
    Configuration,
    /// Projection failure or unusable geometry.
    Geometry,
    /// Malformed attribute data that cannot be recovered locally.
    Data,
}

/// Errors raised by the siting core.
#[derive(Error, Debug)]
pub enum SitingError {
    /// Both or neither outlier thresholds were supplied.
    #[error("exactly one outlier strategy must be given (min_mean_ratio or min_zscore)")]
    OutlierStrategy,

    /// A referenced column does not exist on a layer or table.
    #[error("column `{column}` not found in {table}")]
    MissingColumn { column: String, table: String },

    /// An indicator is listed as both positively and negatively correlated.
    #[error("indicator `{0}` is listed as both positively and negatively correlated")]
    ConflictingIndicator(String),

    /// An identifier column that must be unique contains a repeated value.
    #[error("duplicate identifier `{value}` in column `{column}`")]
    DuplicateId { column: String, value: String },

    /// A scalar parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A CRS definition that cannot be resolved.
    #[error("unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// No metric projection exists for the region (e.g. polar latitudes).
    #[error("no metric projection defined for region centered at lon={lon:.4}, lat={lat:.4}")]
    UndefinedMetricProjection { lon: f64, lat: f64 },

    /// Coordinate transformation failed.
    #[error("projection from `{from}` to `{to}` failed: {reason}")]
    Projection { from: String, to: String, reason: String },

    /// Layer geometry and attribute table do not line up.
    #[error("layer has {shapes} shapes but {rows} attribute rows")]
    LayerShape { shapes: usize, rows: usize },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl SitingError {
    /// Classify this error into the configuration / geometry / data taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutlierStrategy
            | Self::MissingColumn { .. }
            | Self::ConflictingIndicator(_)
            | Self::InvalidParameter { .. }
            | Self::UnsupportedCrs(_) => ErrorKind::Configuration,
            Self::UndefinedMetricProjection { .. }
            | Self::Projection { .. } => ErrorKind::Geometry,
            Self::DuplicateId { .. }
            | Self::LayerShape { .. }
            | Self::Polars(_) => ErrorKind::Data,
        }
    }

    pub(crate) fn missing_column(column: &str, table: &str) -> Self {
        Self::MissingColumn { column: column.to_string(), table: table.to_string() }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { name, reason: reason.into() }
    }
}
