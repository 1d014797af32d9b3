//! Zoom level → clustering radius table.
//!
//! Each map zoom level clusters with its own merge radius; radii shrink as
//! zoom increases (finer tiles cluster tighter). The built-in table covers
//! zoom 2–16 and can be replaced wholesale through the config file.

use std::collections::BTreeMap;

/// Predefined clustering radius for each zoom level (in meters)
pub const ZOOM_LEVEL_RADIUS: &[(u8, f64)] = &[
    (2, 700_000.0),
    (3, 400_000.0),
    (4, 200_000.0),
    (5, 100_000.0),
    (6, 50_000.0),
    (7, 25_000.0),
    (8, 15_000.0),
    (9, 7_000.0),
    (10, 4_000.0),
    (11, 3_000.0),
    (12, 2_000.0),
    (13, 1_000.0),
    (14, 500.0),
    (15, 200.0),
    (16, 100.0),
];

/// One zoom level and its merge radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLevel {
    pub zoom: u8,
    pub radius_m: f64,
}

/// Validated set of zoom levels to cluster, ordered by zoom ascending
#[derive(Debug, Clone)]
pub struct ZoomTable {
    levels: Vec<ZoomLevel>,
}

impl ZoomTable {
    /// The built-in zoom 2–16 table
    pub fn default_levels() -> Self {
        ZoomTable {
            levels: ZOOM_LEVEL_RADIUS
                .iter()
                .map(|&(zoom, radius_m)| ZoomLevel { zoom, radius_m })
                .collect(),
        }
    }

    /// Build a table from a custom zoom → radius mapping.
    /// Rejects empty maps, non-positive radii, and radii that grow as zoom
    /// increases (coarser zoom must never cluster tighter than a finer one).
    pub fn from_map(map: &BTreeMap<u8, f64>) -> Result<Self, String> {
        if map.is_empty() {
            return Err("zoom table is empty".to_string());
        }

        let mut levels = Vec::with_capacity(map.len());
        let mut prev: Option<ZoomLevel> = None;
        for (&zoom, &radius_m) in map {
            if radius_m <= 0.0 || !radius_m.is_finite() {
                return Err(format!("zoom {}: radius must be positive, got {}", zoom, radius_m));
            }
            if let Some(p) = prev {
                if radius_m > p.radius_m {
                    return Err(format!(
                        "zoom {}: radius {} exceeds zoom {}'s radius {}",
                        zoom, radius_m, p.zoom, p.radius_m
                    ));
                }
            }
            let level = ZoomLevel { zoom, radius_m };
            levels.push(level);
            prev = Some(level);
        }

        Ok(ZoomTable { levels })
    }

    pub fn levels(&self) -> &[ZoomLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Radius in meters for a zoom level, if configured
    pub fn radius_for(&self, zoom: u8) -> Option<f64> {
        self.levels.iter().find(|l| l.zoom == zoom).map(|l| l.radius_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_2_through_16() {
        let table = ZoomTable::default_levels();
        assert_eq!(table.len(), 15);
        assert_eq!(table.levels().first().map(|l| l.zoom), Some(2));
        assert_eq!(table.levels().last().map(|l| l.zoom), Some(16));
        assert_eq!(table.radius_for(16), Some(100.0));
        assert_eq!(table.radius_for(2), Some(700_000.0));
        assert_eq!(table.radius_for(1), None);
    }

    #[test]
    fn test_default_table_radii_never_increase_with_zoom() {
        let table = ZoomTable::default_levels();
        for pair in table.levels().windows(2) {
            assert!(
                pair[1].radius_m <= pair[0].radius_m,
                "zoom {} radius {} > zoom {} radius {}",
                pair[1].zoom, pair[1].radius_m, pair[0].zoom, pair[0].radius_m
            );
        }
    }

    #[test]
    fn test_from_map_accepts_valid_custom_table() {
        let mut map = BTreeMap::new();
        map.insert(10, 5000.0);
        map.insert(12, 1000.0);
        map.insert(17, 50.0);
        let table = ZoomTable::from_map(&map).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.radius_for(17), Some(50.0));
    }

    #[test]
    fn test_from_map_rejects_empty() {
        assert!(ZoomTable::from_map(&BTreeMap::new()).is_err());
    }

    #[test]
    fn test_from_map_rejects_increasing_radius() {
        let mut map = BTreeMap::new();
        map.insert(10, 1000.0);
        map.insert(11, 2000.0);
        let err = ZoomTable::from_map(&map).unwrap_err();
        assert!(err.contains("zoom 11"), "unexpected error: {}", err);
    }

    #[test]
    fn test_from_map_rejects_non_positive_radius() {
        let mut map = BTreeMap::new();
        map.insert(10, 0.0);
        assert!(ZoomTable::from_map(&map).is_err());

        let mut map = BTreeMap::new();
        map.insert(10, -5.0);
        assert!(ZoomTable::from_map(&map).is_err());
    }
}
