use anyhow::{bail, Result};
use eventsite::geocode::{self, CensusGeocoder, ADDRESS_COLUMNS};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::GeocodeArgs) -> Result<()> {
    let columns: [String; 5] = match &args.columns {
        Some(columns) => match columns.clone().try_into() {
            Ok(columns) => columns,
            Err(columns) => bail!("[geocode] expected 5 column names, got {}", columns.len()),
        },
        None => ADDRESS_COLUMNS.map(String::from),
    };
    let workers = args.workers.unwrap_or_else(geocode::default_workers);

    let records = geocode::read_addresses_from_path(&args.addresses, &columns)?;
    println!("[geocode] geocoding {} addresses with {} workers", records.len(), workers);

    let matches = geocode::geocode_parallel(&records, &CensusGeocoder::new()?, workers)?;
    let matched = matches.iter().filter(|m| m.is_matched()).count();

    println!("[geocode] {matched} of {} addresses matched; writing {}", matches.len(), args.output.display());
    std::fs::write(&args.output, geocode::matches_to_csv(&matches)?)?;

    Ok(())
}
