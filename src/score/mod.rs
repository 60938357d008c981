mod index;
mod method;

pub use index::{check_indicators, index_score, ScoreOptions};
pub(crate) use method::mean_sd;
pub use method::{normalize, standardize, StdMethod};
