//! Run configuration.
//!
//! A plain serde document: where the database lives, an optional bound on
//! the whole run, and an optional replacement zoom → radius table. Every
//! field except the connection string has a default, so a config file can
//! be as small as `{"connection_string": "places.db"}`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::zoom::ZoomTable;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database path (the storage connection descriptor)
    pub connection_string: String,

    /// Abort the run with an error report if it exceeds this many seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Replacement zoom → radius table in meters; the built-in 2–16 table
    /// applies when absent
    #[serde(default)]
    pub zoom_radius: Option<BTreeMap<u8, f64>>,
}

impl Config {
    pub fn from_connection_string(connection_string: &str) -> Self {
        Config {
            connection_string: connection_string.to_string(),
            run_timeout_secs: None,
            zoom_radius: None,
        }
    }

    /// Load a config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let text = fs::read_to_string(&path)
            .map_err(|e| format!("reading {}: {}", path.as_ref().display(), e))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("parsing {}: {}", path.as_ref().display(), e))
    }

    /// Resolve and validate the zoom table this run clusters with
    pub fn zoom_table(&self) -> Result<ZoomTable, String> {
        match &self.zoom_radius {
            Some(map) => ZoomTable::from_map(map),
            None => Ok(ZoomTable::default_levels()),
        }
    }
}
