use anyhow::Result;
use eventsite::{io, Crs, GridOptions};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::GridArgs) -> Result<()> {
    let out_path = &args.output.clone().unwrap_or("./grid.geojson".into());
    let crs = args.epsg.map(Crs::from_epsg).transpose()?;

    let reference = io::read_polygon_layer(&args.reference, "reference", crs.as_ref())?;
    let options = GridOptions { size_m: args.size, filter: !args.no_filter, id_column: args.id_column.clone() };

    println!("[grid] building {}m grid over {} polygons", options.size_m, reference.len());
    let grid = reference.build_grid(&options)?;

    println!("[grid] writing {} cells to {}", grid.len(), out_path.display());
    io::write_polygon_geojson(&grid, out_path)?;

    Ok(())
}
