//! Geographic distance and centroid math for place clustering.
//!
//! Pure functions over (lat, lon) degree pairs. Distance is the haversine
//! great-circle formula on a spherical Earth; the centroid is the planar
//! mean of coordinates, which is accurate at clustering radii.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

/// Great-circle distance between two points in meters (haversine)
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Center of mass of a set of points (arithmetic mean of coordinates).
/// Returns None for an empty slice.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.lon).sum::<f64>() / n;
    Some(GeoPoint { lat, lon })
}

/// Coordinate range that contains every point within some radius of a center.
/// Used as a cheap SQL prefilter before the exact haversine check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat
            && p.lat <= self.max_lat
            && p.lon >= self.min_lon
            && p.lon <= self.max_lon
    }
}

/// Bounding box around `center` guaranteed to contain every point within
/// `radius_m`. Longitude bounds widen toward the poles; a box that would
/// cross a pole or the antimeridian falls back to the full longitude range.
pub fn bounding_box(center: GeoPoint, radius_m: f64) -> BoundingBox {
    let lat_delta = (radius_m / EARTH_RADIUS_M).to_degrees();
    let min_lat = (center.lat - lat_delta).max(-90.0);
    let max_lat = (center.lat + lat_delta).min(90.0);

    // Longitude degrees shrink with cos(lat); size the box for the widest
    // latitude it spans so no in-radius point falls outside it.
    let widest_lat = min_lat.abs().max(max_lat.abs()).to_radians();
    let cos_lat = widest_lat.cos();

    let crosses_pole = max_lat >= 90.0 || min_lat <= -90.0;
    let lon_delta = if cos_lat > 1e-9 { lat_delta / cos_lat } else { 360.0 };

    let (min_lon, max_lon) = if crosses_pole
        || lon_delta >= 180.0
        || center.lon - lon_delta < -180.0
        || center.lon + lon_delta > 180.0
    {
        (-180.0, 180.0)
    } else {
        (center.lon - lon_delta, center.lon + lon_delta)
    };

    BoundingBox { min_lat, max_lat, min_lon, max_lon }
}
