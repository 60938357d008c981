use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

use crate::geom::{Crs, NAD83, WGS84};

/// Read the CRS of a shapefile from its sibling `.prj` file, if there is one.
pub(crate) fn read_prj(shp_path: &Path) -> Result<Option<Crs>> {
    let path = shp_path.with_extension("prj");
    if !path.exists() { return Ok(None) }

    let wkt = fs::read_to_string(&path)
        .with_context(|| format!("[io::prj] Failed to read projection file: {}", path.display()))?;
    wkt_to_crs(&wkt)
        .with_context(|| format!("[io::prj] Unsupported projection in {}", path.display()))
        .map(Some)
}

/// Resolve an ESRI or OGC WKT definition to one of the supported CRSs.
pub(crate) fn wkt_to_crs(wkt: &str) -> Result<Crs> {
    // The top-level AUTHORITY, when present, is the last one in the string.
    if let Some(code) = last_epsg_authority(wkt) {
        if let Ok(crs) = Crs::from_epsg(code) { return Ok(crs) }
    }

    let upper = wkt.trim().to_ascii_uppercase();
    let nad83 = ["NORTH_AMERICAN_1983", "NORTH_AMERICAN_DATUM_1983", "NAD83", "NAD_1983"].iter().any(|name| upper.contains(name));

    if !upper.starts_with("PROJCS") && !upper.starts_with("PROJCRS") {
        return Ok(Crs::from_epsg(if nad83 { NAD83 } else { WGS84 })?);
    }

    if let Some((zone, south)) = utm_zone(&upper) {
        let code = match (nad83, south) {
            (true, false) if zone <= 23 => 26900 + zone,
            (_, false) => 32600 + zone,
            (_, true) => 32700 + zone,
        };
        return Ok(Crs::from_epsg(code)?);
    }
    if upper.contains("PSEUDO-MERCATOR") || upper.contains("PSEUDO_MERCATOR") || upper.contains("WEB_MERCATOR") {
        return Ok(Crs::from_epsg(3857)?);
    }
    if upper.contains("ALBERS") && (upper.contains("CONTIGUOUS") || upper.contains("CONUS")) {
        return Ok(Crs::from_epsg(5070)?);
    }

    bail!("cannot resolve projected CRS: {}", wkt.chars().take(80).collect::<String>())
}

fn last_epsg_authority(wkt: &str) -> Option<u32> {
    let start = wkt.rfind("AUTHORITY[\"EPSG\"")?;
    wkt[start..].split('"').nth(3)?.trim().parse().ok()
}

/// Parse "UTM zone 17N" / "UTM_Zone_17N" / "UTM_Zone_17S".
fn utm_zone(upper: &str) -> Option<(u32, bool)> {
    let start = upper.find("UTM ZONE ").map(|i| i + 9)
        .or_else(|| upper.find("UTM_ZONE_").map(|i| i + 9))?;
    let rest = &upper[start..];
    let digits = rest.chars().take_while(char::is_ascii_digit).collect::<String>();
    let zone = digits.parse::<u32>().ok().filter(|zone| (1..=60).contains(zone))?;
    let south = rest[digits.len()..].starts_with('S');
    Some((zone, south))
}
