// src/projector/resolver.rs

use geo_types::Geometry;
use log::trace;
use crate::crs::{Crs, UtmZone};
use crate::error::{Error, Result};
use crate::geometry::{self, Shape};

/// Locally optimal metric CRS for one geometry and its length in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricResolution {
    pub metric_crs: u32,
    pub length_m: f64,
}

/// Pick the UTM zone under the geometry's envelope center and measure the
/// geometry there. Geometries straddling a zone meridian are not split;
/// the center alone decides.
pub fn resolve(geometry: &Geometry<f64>, source_crs: &str) -> Result<MetricResolution> {
    let crs = Crs::parse(source_crs)?;
    resolve_with_crs(geometry, crs)
}

pub fn resolve_with_crs(geometry: &Geometry<f64>, source_crs: Crs) -> Result<MetricResolution> {
    geometry::validate(geometry)?;

    let center = geometry.envelope_center()
        .ok_or_else(|| Error::invalid_geometry("geometry has no envelope"))?;
    let zone = utm_zone_for(center.x(), center.y(), source_crs)?;
    let metric = Crs::Utm(zone);

    let projected = geometry::reproject(geometry, source_crs, metric)?;
    let length_m = projected.planar_length();
    if !length_m.is_finite() {
        return Err(Error::invalid_geometry(format!("length in {} is not finite", metric)));
    }

    trace!("Resolved geometry centered at ({:.6}, {:.6}) in {} to {} ({:.3} m)",
        center.x(), center.y(), source_crs, metric, length_m);

    Ok(MetricResolution {
        metric_crs: zone.epsg(),
        length_m,
    })
}

/// UTM zone for a point given in `crs` coordinates.
pub fn utm_zone_for(x: f64, y: f64, crs: Crs) -> Result<UtmZone> {
    let (lon, lat) = crs.to_lon_lat(x, y);
    if !lon.is_finite() || !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::invalid_geometry(format!(
            "representative point ({}, {}) is outside the valid {} domain", x, y, crs
        )));
    }
    Ok(UtmZone::for_lon_lat(lon, lat))
}
