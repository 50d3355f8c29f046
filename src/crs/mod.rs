//! Coordinate reference systems understood by the clustering pipeline.
//!
//! Only the handful of systems a road/curb dataset actually arrives in are
//! supported: geographic WGS84, Web Mercator, and the 120 WGS84 UTM zones.
//! Every transform goes through geographic longitude/latitude.

pub mod utm;

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};

pub use utm::UtmZone;

pub const WGS84_EPSG: u32 = 4326;
pub const WEB_MERCATOR_EPSG: u32 = 3857;

// Spherical radius used by EPSG:3857
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Geographic WGS84, x = longitude, y = latitude (degrees).
    Wgs84,
    /// Pseudo-Mercator on the WGS84 sphere.
    WebMercator,
    Utm(UtmZone),
}

impl Crs {
    /// Parse an identifier such as `"EPSG:4326"`, `"epsg:32633"`, `"4326"` or `"OGC:CRS84"`.
    pub fn parse(identifier: &str) -> Result<Self> {
        let raw = identifier.trim();
        let upper = raw.to_ascii_uppercase();

        if matches!(upper.as_str(), "OGC:CRS84" | "CRS:84" | "CRS84" | "WGS84") {
            return Ok(Crs::Wgs84);
        }

        let code = upper.strip_prefix("EPSG:").unwrap_or(&upper).trim();
        match code.parse::<u32>() {
            Ok(code) => Self::from_epsg(code),
            Err(_) => Err(Error::unknown_crs(format!("cannot parse CRS identifier '{}'", raw))),
        }
    }

    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            WGS84_EPSG => Ok(Crs::Wgs84),
            WEB_MERCATOR_EPSG | 900913 => Ok(Crs::WebMercator),
            _ => UtmZone::from_epsg(code)
                .map(Crs::Utm)
                .ok_or_else(|| Error::unknown_crs(format!("unsupported EPSG code {}", code))),
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => WGS84_EPSG,
            Crs::WebMercator => WEB_MERCATOR_EPSG,
            Crs::Utm(zone) => zone.epsg(),
        }
    }

    /// True when planar distances in this CRS approximate ground meters.
    pub fn is_metric(&self) -> bool {
        matches!(self, Crs::Utm(_))
    }

    /// Convert a coordinate in this CRS to geographic (lon, lat) degrees.
    pub fn to_lon_lat(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Crs::Wgs84 => (x, y),
            Crs::WebMercator => {
                let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
                let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan()
                    - std::f64::consts::FRAC_PI_2)
                    .to_degrees();
                (lon, lat)
            },
            Crs::Utm(zone) => zone.inverse(x, y),
        }
    }

    /// Convert geographic (lon, lat) degrees to a coordinate in this CRS.
    pub fn from_lon_lat(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Crs::Wgs84 => (lon, lat),
            Crs::WebMercator => {
                let x = WEB_MERCATOR_RADIUS * lon.to_radians();
                let y = WEB_MERCATOR_RADIUS
                    * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
                (x, y)
            },
            Crs::Utm(zone) => zone.forward(lon, lat),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Crs::parse(s)
    }
}
