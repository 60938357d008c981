use std::path::PathBuf;

/// Event siting CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "eventsite", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Rank candidate event sites for one county run configuration
    Site(SiteArgs),

    /// Build a square grid over a polygon layer
    Grid(GridArgs),

    /// Geocode a CSV of addresses with the US Census batch geocoder
    #[cfg(feature = "geocode")]
    Geocode(GeocodeArgs),
}

#[derive(clap::Args, Debug)]
pub struct SiteArgs {
    /// YAML run configuration
    #[arg(short = 'f', long = "config", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Output directory, overrides OUTPUT_PATH from the configuration
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct GridArgs {
    /// Reference polygons (.shp or .geojson)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub reference: PathBuf,

    /// Cell edge length in metres
    #[arg(short, long, default_value_t = eventsite::DEFAULT_CELL_SIZE_M)]
    pub size: f64,

    /// Keep every cell of the bounding box, not only those touching the reference polygons
    #[arg(long)]
    pub no_filter: bool,

    /// Name of the cell identifier column
    #[arg(long, default_value = eventsite::DEFAULT_GRID_ID)]
    pub id_column: String,

    /// EPSG code of the reference layer, when it has no .prj
    #[arg(long)]
    pub epsg: Option<u32>,

    /// Output GeoJSON file, defaults to "./grid.geojson"
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[cfg(feature = "geocode")]
#[derive(clap::Args, Debug)]
pub struct GeocodeArgs {
    /// Input CSV of addresses with a header row
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub addresses: PathBuf,

    /// Output CSV of geocoded addresses
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// Id, street, city, state and zip column names, in that order
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,

    /// Number of parallel requests, defaults to one less than the CPU count
    #[arg(short, long)]
    pub workers: Option<usize>,
}
