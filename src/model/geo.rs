//! Geographic primitives: validated points and great-circle distance.
//!
//! Distances use the haversine formula on a spherical Earth. The
//! intermediate `asin` argument is clamped to `[0, 1]` so that rounding near
//! antipodal points or the poles can never produce `NaN`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
///
/// Always holds a latitude in `[-90, 90]` and a longitude in `[-180, 180]`.
/// The fields are private so an out-of-range point cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint", into = "RawPoint")]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Deserialize)]
struct RawPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    /// Build a point from degrees, rejecting anything out of range or `NaN`.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(Error::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Build a point, wrapping the longitude into `[-180, 180]`.
    ///
    /// Latitude is not wrapped: a latitude past a pole is still rejected.
    pub fn normalized(lat: f64, lon: f64) -> Result<Self> {
        if !lon.is_finite() {
            return Err(Error::InvalidCoordinate { lat, lon });
        }
        Self::new(lat, normalize_lon(lon))
    }

    pub fn lat(&self) -> f64 { self.lat }
    pub fn lon(&self) -> f64 { self.lon }

    /// Great-circle distance to `other` on the mean Earth radius.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        distance_km(*self, *other)
    }
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = Error;

    fn try_from(raw: RawPoint) -> Result<Self> {
        GeoPoint::new(raw.lat, raw.lon)
    }
}

impl From<GeoPoint> for RawPoint {
    fn from(p: GeoPoint) -> Self {
        RawPoint { lat: p.lat, lon: p.lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// Wrap a longitude in degrees into `[-180, 180]`.
pub fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps +180 to -180; keep the sign the caller asked for
    if wrapped == -180.0 && lon > 0.0 { 180.0 } else { wrapped }
}

/// Haversine distance in kilometres on the mean Earth radius.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    distance_km_with_radius(a, b, EARTH_RADIUS_KM)
}

/// Haversine distance in kilometres on a sphere of `radius_km`.
pub fn distance_km_with_radius(a: GeoPoint, b: GeoPoint, radius_km: f64) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().clamp(0.0, 1.0).asin();

    radius_km * c
}

/// Distance between raw coordinates, validating them first.
pub fn distance_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64> {
    Ok(distance_km(GeoPoint::new(lat1, lon1)?, GeoPoint::new(lat2, lon2)?))
}
