//! Geometry decoding, validation and reprojection.
//!
//! Shapes are `geo_types::Geometry<f64>`; the capability set the clustering
//! code relies on lives in [`shape::Shape`].

pub mod shape;

use std::str::FromStr;
use geo::{CoordsIter, MapCoords};
use geo_types::{Coord, Geometry};
use crate::crs::Crs;
use crate::error::{Error, Result};

pub use shape::{Buffered, Shape};

/// Parse a WKT string into a geometry.
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    wkt::Wkt::from_str(wkt)
        .map_err(|e| Error::invalid_geometry(format!("WKT parse error: {:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| {
                    Error::invalid_geometry(format!("WKT conversion error: {:?}", e))
                })
        })
}

/// Reject shapes the resolver cannot work with: no coordinates at all, or
/// any non-finite coordinate.
pub fn validate(geometry: &Geometry<f64>) -> Result<()> {
    if geometry.coords_iter().next().is_none() {
        return Err(Error::invalid_geometry("geometry is empty"));
    }
    if geometry.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(Error::invalid_geometry("geometry has non-finite coordinates"));
    }
    Ok(())
}

/// Transform every vertex from `from` into `to`.
///
/// Only vertices move; segments stay straight in the target plane, which is
/// the usual GIS behaviour for short road segments.
pub fn reproject(geometry: &Geometry<f64>, from: Crs, to: Crs) -> Result<Geometry<f64>> {
    if from == to {
        return Ok(geometry.clone());
    }

    let projected = geometry.map_coords(|c| {
        let (lon, lat) = from.to_lon_lat(c.x, c.y);
        let (x, y) = to.from_lon_lat(lon, lat);
        Coord { x, y }
    });

    if projected.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(Error::invalid_geometry(format!(
            "reprojection from {} to {} produced non-finite coordinates", from, to
        )));
    }
    Ok(projected)
}
