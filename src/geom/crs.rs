use std::{fmt, sync::Arc};

use proj4rs::proj::Proj;

use crate::error::{Result, SitingError};

/// WGS84 longitude/latitude.
pub const WGS84: u32 = 4326;

/// NAD83 longitude/latitude, the datum of TIGER/Line census shapefiles.
pub const NAD83: u32 = 4269;

/// A coordinate reference system, stored as a PROJ.4 definition with its EPSG code when known.
#[derive(Debug, Clone)]
pub struct Crs {
    epsg: Option<u32>,
    proj4: Arc<str>,
}

impl Crs {
    /// Resolve one of the built-in EPSG codes.
    pub fn from_epsg(code: u32) -> Result<Self> {
        let proj4 = match code {
            4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            4269 => "+proj=longlat +datum=NAD83 +no_defs".to_string(),
            3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs".to_string(),
            5070 => "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs".to_string(),
            32601..=32660 => utm_proj4(code - 32600, false, "WGS84"),
            32701..=32760 => utm_proj4(code - 32700, true, "WGS84"),
            26901..=26923 => utm_proj4(code - 26900, false, "NAD83"),
            _ => return Err(SitingError::UnsupportedCrs(format!("EPSG:{code}"))),
        };
        Ok(Self { epsg: Some(code), proj4: proj4.into() })
    }

    /// Build a CRS from an arbitrary PROJ.4 definition, validating it with proj4rs.
    pub fn from_proj4(definition: &str) -> Result<Self> {
        Proj::from_proj_string(definition)
            .map_err(|e| SitingError::UnsupportedCrs(format!("{definition}: {e}")))?;
        Ok(Self { epsg: None, proj4: definition.trim().into() })
    }

    /// The UTM zone containing the given lon/lat position.
    /// NAD83 zones only exist in the northern hemisphere; elsewhere WGS84 is used.
    pub fn utm_for(lon: f64, lat: f64, nad83: bool) -> Result<Self> {
        if !lon.is_finite() || !(-80.0..=84.0).contains(&lat) {
            return Err(SitingError::UndefinedMetricProjection { lon, lat });
        }

        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u32;
        let north = lat >= 0.0;

        let code = match (north, nad83 && zone <= 23) {
            (true, true) => 26900 + zone,
            (true, false) => 32600 + zone,
            (false, _) => 32700 + zone,
        };
        Self::from_epsg(code)
    }

    #[inline] pub fn epsg(&self) -> Option<u32> { self.epsg }

    #[inline] pub fn proj4(&self) -> &str { &self.proj4 }

    /// Whether coordinates are lon/lat degrees.
    pub fn is_geographic(&self) -> bool {
        self.param("proj").is_some_and(|p| p == "longlat" || p == "latlong" || p == "lonlat" || p == "latlon")
    }

    /// Whether this is a projected CRS measured in metres (PROJ.4 defaults to metres).
    pub fn is_metric(&self) -> bool {
        !self.is_geographic() && self.param("units").is_none_or(|u| u == "m")
    }

    /// Whether the definition uses the NAD83 datum.
    pub(crate) fn is_nad83(&self) -> bool {
        self.param("datum").is_some_and(|d| d.eq_ignore_ascii_case("NAD83"))
    }

    /// Look up a `+key=value` parameter in the PROJ.4 definition.
    fn param(&self, key: &str) -> Option<&str> {
        self.proj4.split_whitespace()
            .filter_map(|token| token.strip_prefix('+'))
            .find_map(|token| match token.split_once('=') {
                Some((k, v)) if k == key => Some(v),
                _ => None,
            })
    }

    /// Build the proj4rs projection for this CRS.
    pub(crate) fn to_proj(&self) -> Result<Proj> {
        Proj::from_proj_string(&self.proj4)
            .map_err(|e| SitingError::UnsupportedCrs(format!("{}: {e}", self.proj4)))
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => self.proj4 == other.proj4,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(code) => write!(f, "EPSG:{code}"),
            None => f.write_str(&self.proj4),
        }
    }
}

fn utm_proj4(zone: u32, south: bool, datum: &str) -> String {
    let south = if south { " +south" } else { "" };
    format!("+proj=utm +zone={zone}{south} +datum={datum} +units=m +no_defs")
}
