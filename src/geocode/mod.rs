//! Batch geocoding of street addresses.
//!
//! Addresses are split into contiguous chunks, each chunk is sent to a [`BatchGeocoder`] on its own
//! worker thread, and the per-chunk results are concatenated. A failed chunk fails the whole batch.

#[cfg(feature = "geocode")]
mod census;

use std::{io::Read, path::Path, thread};

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "geocode")]
pub use self::census::{CensusGeocoder, CENSUS_BATCH_URL};

/// Conventional address column names, in request order.
pub const ADDRESS_COLUMNS: [&str; 5] = ["Unique ID", "Street address", "City", "State", "ZIP"];

/// One address to geocode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// One row of a batch geocoding response. Unmatched addresses carry empty strings and no
/// coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub id: String,
    pub geocoded_address: String,
    pub is_match: String,
    pub is_exact: String,
    pub returned_address: String,
    pub coordinates: String,
    pub tiger_line: String,
    pub side: String,
    pub state_fips: String,
    pub county_fips: String,
    pub tract: String,
    pub block: String,
    #[serde(rename = "long")]
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl GeocodeMatch {
    #[inline] pub fn is_matched(&self) -> bool { self.is_match.eq_ignore_ascii_case("match") }
}

/// A service that geocodes one chunk of addresses per call.
pub trait BatchGeocoder: Sync {
    fn geocode_chunk(&self, chunk: &[AddressRecord]) -> Result<Vec<GeocodeMatch>>;
}

/// Default worker count: one less than the available CPUs, at least one.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Split `len` items into `parts` contiguous ranges whose sizes differ by at most one.
fn chunk_bounds(len: usize, parts: usize) -> Vec<(usize, usize)> {
    let (base, extra) = (len / parts, len % parts);
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let end = start + base + usize::from(i < extra);
            let bounds = (start, end);
            start = end;
            bounds
        })
        .collect()
}

/// Geocode `records` on up to `workers` threads, one contiguous chunk per worker.
/// Results come back chunk by chunk in input order.
pub fn geocode_parallel<G: BatchGeocoder>(records: &[AddressRecord], geocoder: &G, workers: usize) -> Result<Vec<GeocodeMatch>> {
    if records.is_empty() { return Ok(Vec::new()) }

    let workers = workers.max(1).min(records.len());
    let chunks = chunk_bounds(records.len(), workers);
    info!("[geocode] geocoding {} addresses in {} chunks", records.len(), chunks.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("[geocode] Failed to start worker pool")?;

    let results = pool.install(|| {
        chunks.par_iter()
            .enumerate()
            .map(|(i, &(start, end))| {
                let matches = geocoder.geocode_chunk(&records[start..end])
                    .with_context(|| format!("[geocode] chunk {i} (records {start}..{end}) failed"))?;
                debug!("[geocode] chunk {i}: {} results", matches.len());
                Ok(matches)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    Ok(results.into_iter().flatten().collect())
}

/// Render a chunk as the header-less CSV the census batch endpoint expects.
pub fn addresses_to_csv(records: &[AddressRecord]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    for record in records {
        writer.write_record([&record.id, &record.street, &record.city, &record.state, &record.zip])?;
    }
    let bytes = writer.into_inner().context("[geocode] Failed to flush address CSV")?;
    Ok(String::from_utf8(bytes)?)
}

/// Parse a census batch response. Rows are header-less; unmatched rows are shorter than matched
/// ones and are padded with empty fields.
pub fn parse_census_response(text: &str) -> Result<Vec<GeocodeMatch>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut matches = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("[geocode] Malformed response row {i}"))?;
        let field = |j: usize| row.get(j).unwrap_or_default().trim().to_string();

        let coordinates = field(5);
        let (lon, lat) = parse_coordinates(&coordinates);
        matches.push(GeocodeMatch {
            id: field(0),
            geocoded_address: field(1),
            is_match: field(2),
            is_exact: field(3),
            returned_address: field(4),
            coordinates,
            tiger_line: field(6),
            side: field(7),
            state_fips: field(8),
            county_fips: field(9),
            tract: field(10),
            block: field(11),
            lon,
            lat,
        });
    }
    Ok(matches)
}

fn parse_coordinates(text: &str) -> (Option<f64>, Option<f64>) {
    let mut parts = text.split(',').map(|part| part.trim().parse::<f64>().ok());
    match (parts.next().flatten(), parts.next().flatten()) {
        (Some(lon), Some(lat)) => (Some(lon), Some(lat)),
        _ => (None, None),
    }
}

/// Read addresses from a CSV with a header row. `columns` names the id, street, city, state and
/// zip columns, in that order.
pub fn read_addresses<R: Read>(reader: R, columns: &[String; 5]) -> Result<Vec<AddressRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let index = columns.iter()
        .map(|name| headers.iter().position(|h| h == name)
            .ok_or_else(|| anyhow!("[geocode] address file has no column `{name}`")))
        .collect::<Result<Vec<_>>>()?;

    reader.records()
        .map(|row| {
            let row = row?;
            let field = |j: usize| row.get(index[j]).unwrap_or_default().to_string();
            Ok(AddressRecord { id: field(0), street: field(1), city: field(2), state: field(3), zip: field(4) })
        })
        .collect()
}

/// Read addresses from a CSV file; see [`read_addresses`].
pub fn read_addresses_from_path(path: &Path, columns: &[String; 5]) -> Result<Vec<AddressRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("[geocode] Failed to open address file: {}", path.display()))?;
    read_addresses(file, columns)
        .with_context(|| format!("[geocode] Failed to read addresses from {}", path.display()))
}

/// Render geocoding results as CSV with a header row (`long` and `lat` last).
pub fn matches_to_csv(matches: &[GeocodeMatch]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for m in matches {
        writer.serialize(m)?;
    }
    writer.into_inner().context("[geocode] Failed to flush results CSV")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn addresses(n: usize) -> Vec<AddressRecord> {
        (0..n).map(|i| AddressRecord {
            id: i.to_string(),
            street: format!("{i} Main St"),
            city: "Tampa".into(),
            state: "FL".into(),
            zip: "33602".into(),
        }).collect()
    }

    /// Echoes each address back as a match.
    struct Echo { calls: AtomicUsize }

    impl BatchGeocoder for Echo {
        fn geocode_chunk(&self, chunk: &[AddressRecord]) -> Result<Vec<GeocodeMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(chunk.iter().map(|r| GeocodeMatch { id: r.id.clone(), is_match: "Match".into(), ..Default::default() }).collect())
        }
    }

    struct FailOn(String);

    impl BatchGeocoder for FailOn {
        fn geocode_chunk(&self, chunk: &[AddressRecord]) -> Result<Vec<GeocodeMatch>> {
            if chunk.iter().any(|r| r.id == self.0) { anyhow::bail!("service unavailable") }
            Ok(Vec::new())
        }
    }

    #[test]
    fn chunks_are_contiguous_and_balanced() {
        assert_eq!(chunk_bounds(10, 3), vec![(0, 4), (4, 7), (7, 10)]);
        assert_eq!(chunk_bounds(2, 2), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn parallel_results_cover_every_record() {
        let geocoder = Echo { calls: AtomicUsize::new(0) };
        let matches = geocode_parallel(&addresses(10), &geocoder, 4).unwrap();

        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 4);
        let ids = matches.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
        assert!(matches.iter().all(GeocodeMatch::is_matched));
    }

    #[test]
    fn workers_capped_by_record_count() {
        let geocoder = Echo { calls: AtomicUsize::new(0) };
        geocode_parallel(&addresses(2), &geocoder, 8).unwrap();
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn chunk_failure_is_surfaced() {
        let err = geocode_parallel(&addresses(6), &FailOn("4".into()), 3).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("chunk 2"), "{message}");
        assert!(message.contains("service unavailable"), "{message}");
    }

    #[test]
    fn response_rows_are_padded() {
        let text = "\"1\",\"100 N Tampa St, Tampa, FL, 33602\",\"Match\",\"Exact\",\"100 N TAMPA ST, TAMPA, FL, 33602\",\"-82.45867,27.94612\",\"638413418\",\"L\",\"12\",\"057\",\"005300\",\"1011\"\n\
                    \"2\",\"1 Nowhere Rd, Tampa, FL, 33602\",\"No_Match\"\n";
        let matches = parse_census_response(text).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].lon, Some(-82.45867));
        assert_eq!(matches[0].lat, Some(27.94612));
        assert_eq!(matches[0].tract, "005300");
        assert!(!matches[1].is_matched());
        assert_eq!(matches[1].coordinates, "");
        assert_eq!(matches[1].lon, None);
    }

    #[test]
    fn request_csv_has_no_header() {
        let text = addresses_to_csv(&addresses(1)).unwrap();
        assert_eq!(text, "0,0 Main St,Tampa,FL,33602\n");
    }

    #[test]
    fn addresses_by_column_name() {
        let text = "org_ein,addr,city,state,zip,extra\n591234567,\"1 Main St, Ste 2\",Tampa,FL,33602,x\n";
        let columns = ["org_ein", "addr", "city", "state", "zip"].map(String::from);
        let records = read_addresses(text.as_bytes(), &columns).unwrap();
        assert_eq!(records, vec![AddressRecord {
            id: "591234567".into(), street: "1 Main St, Ste 2".into(), city: "Tampa".into(), state: "FL".into(), zip: "33602".into(),
        }]);

        let bad = ["id", "addr", "city", "state", "zip"].map(String::from);
        assert!(read_addresses(text.as_bytes(), &bad).is_err());
    }

    #[test]
    fn results_csv_has_lonlat_last() {
        let text = String::from_utf8(matches_to_csv(&[GeocodeMatch { id: "1".into(), lon: Some(-82.5), lat: Some(28.0), ..Default::default() }]).unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.ends_with("tract,block,long,lat"), "{header}");
        assert!(text.lines().nth(1).unwrap().ends_with(",-82.5,28.0"));
    }
}
