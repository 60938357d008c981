use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client};

use super::{addresses_to_csv, parse_census_response, AddressRecord, BatchGeocoder, GeocodeMatch};

/// US Census batch geocoder endpoint (addresses with census geographies).
pub const CENSUS_BATCH_URL: &str = "https://geocoding.geo.census.gov/geocoder/geographies/addressbatch";

/// Client for the US Census batch geocoder.
#[derive(Debug, Clone)]
pub struct CensusGeocoder {
    client: Client,
    url: String,
    benchmark: String,
    vintage: String,
}

impl CensusGeocoder {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("eventsite/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            url: CENSUS_BATCH_URL.to_string(),
            benchmark: "Public_AR_Current".to_string(),
            vintage: "Current_Current".to_string(),
        })
    }

    /// Point the client at another batch endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl BatchGeocoder for CensusGeocoder {
    fn geocode_chunk(&self, chunk: &[AddressRecord]) -> Result<Vec<GeocodeMatch>> {
        let body = addresses_to_csv(chunk)?;
        let file = multipart::Part::text(body)
            .file_name("chunk.csv")
            .mime_str("text/csv")?;
        let form = multipart::Form::new()
            .part("addressFile", file)
            .text("benchmark", self.benchmark.clone())
            .text("vintage", self.vintage.clone())
            .text("response", "json");

        let text = self.client.post(&self.url)
            .multipart(form)
            .send()
            .with_context(|| format!("POST {}", self.url))?
            .error_for_status()
            .with_context(|| format!("POST {} returned error status", self.url))?
            .text()
            .context("[geocode] Failed to read response body")?;

        parse_census_response(&text)
    }
}
