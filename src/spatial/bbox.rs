//! Latitude/longitude bounding boxes around a spherical cap.
//!
//! The box is the cheap prefilter handed to the index service. It must
//! never exclude a point that the exact distance test would accept, so it
//! is computed from the tangent meridians of the cap and then padded.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::model::GeoPoint;

/// Padding in degrees added on every side to absorb rounding.
const PAD_DEG: f64 = 1e-7;

/// An axis-aligned box in degrees.
///
/// When `min_lon > max_lon` the box crosses the antimeridian and covers
/// `[min_lon, 180] ∪ [-180, max_lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// The whole globe.
    pub const WORLD: BoundingBox = BoundingBox {
        min_lat: -90.0,
        max_lat: 90.0,
        min_lon: -180.0,
        max_lon: 180.0,
    };

    /// Smallest padded box containing every point within `radius_km` of
    /// `center` on a sphere of `earth_radius_km`.
    pub fn around(center: GeoPoint, radius_km: f64, earth_radius_km: f64) -> Self {
        let angular = radius_km / earth_radius_km;
        if angular >= PI {
            return Self::WORLD;
        }

        let lat = center.lat().to_radians();
        let lon = center.lon().to_radians();
        let mut min_lat = lat - angular;
        let mut max_lat = lat + angular;

        let (min_lon, max_lon) = if min_lat > -FRAC_PI_2 && max_lat < FRAC_PI_2 {
            let cos_lat = lat.cos();
            let ratio = if cos_lat > f64::EPSILON { angular.sin() / cos_lat } else { f64::INFINITY };
            if ratio >= 1.0 {
                (-PI, PI)
            } else {
                let delta = ratio.asin();
                (lon - delta, lon + delta)
            }
        } else {
            // a pole lies inside the cap: every meridian is touched
            min_lat = min_lat.max(-FRAC_PI_2);
            max_lat = max_lat.min(FRAC_PI_2);
            (-PI, PI)
        };

        Self::from_radians(min_lat, max_lat, min_lon, max_lon)
    }

    fn from_radians(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        let min_lat = (min_lat.to_degrees() - PAD_DEG).max(-90.0);
        let max_lat = (max_lat.to_degrees() + PAD_DEG).min(90.0);
        let mut min_lon = min_lon.to_degrees() - PAD_DEG;
        let mut max_lon = max_lon.to_degrees() + PAD_DEG;

        if max_lon - min_lon >= 360.0 {
            return Self { min_lat, max_lat, min_lon: -180.0, max_lon: 180.0 };
        }
        if min_lon < -180.0 {
            min_lon += 360.0;
        }
        if max_lon > 180.0 {
            max_lon -= 360.0;
        }
        Self { min_lat, max_lat, min_lon, max_lon }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    pub fn spans_all_longitudes(&self) -> bool {
        self.min_lon <= -180.0 && self.max_lon >= 180.0
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        let (lat, lon) = (point.lat(), point.lon());
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.min_lon || lon <= self.max_lon
        } else {
            lon >= self.min_lon && lon <= self.max_lon
        }
    }
}
