mod algorithm;
mod bbox;
mod crs;
mod geom;

use bbox::BoundingBox;
pub(crate) use algorithm::proj::Transformer;
pub use algorithm::{Fragment, Grid};
pub use crs::{Crs, NAD83, WGS84};
pub use geom::Geometries;
