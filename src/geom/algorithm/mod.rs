mod buffer;
mod grid;
mod overlay;
pub(crate) mod proj;

pub use grid::Grid;
pub use overlay::Fragment;
