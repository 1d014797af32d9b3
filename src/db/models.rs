use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// A point record awaiting clustering. One nullable assignment column per
/// configured zoom level lives alongside these fields in the places table;
/// assignments are write-once and read back per level, not loaded here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl Place {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// A place to ingest (id and timestamp assigned by the database)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlace {
    #[serde(default)]
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// One cluster at a given zoom level. `classify` is reserved for a
/// downstream classification pass and stays NULL here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub cluster: i64,
    #[serde(rename = "ptCount")]
    pub pt_count: i64,
    #[serde(rename = "centroidLat")]
    pub centroid_lat: f64,
    #[serde(rename = "centroidLon")]
    pub centroid_lon: f64,
    pub classify: Option<i64>,
}

impl ClusterRecord {
    pub fn centroid(&self) -> GeoPoint {
        GeoPoint::new(self.centroid_lat, self.centroid_lon)
    }
}
