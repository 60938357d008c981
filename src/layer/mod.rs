mod data;
mod point;
mod polygon;
mod spatial;

pub(crate) use data::{ensure_unique, float_values, require_column, string_values, take_rows};
pub use point::PointLayer;
pub use polygon::PolygonLayer;
pub use spatial::{GridOptions, DEFAULT_CELL_SIZE_M, DEFAULT_GRID_ID};
