#[cfg(feature = "geocode")]
pub mod geocode;
pub mod grid;
pub mod site;
