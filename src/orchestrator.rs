//! Run orchestration: schema setup, one driver per zoom level, a join
//! barrier, and exactly one final status report.
//!
//! Levels run as independent blocking tasks over the shared database
//! handle; a failing level never stops its siblings, but any failure makes
//! the aggregate outcome an error. The report is emitted once per run,
//! success or not.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::clusterer;
use crate::db::Database;
use crate::error::ClusterError;
use crate::zoom::ZoomTable;

/// Final run outcome, serialized once to the status channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum StatusReport {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error { message: String },
}

impl StatusReport {
    pub fn error(message: impl Into<String>) -> Self {
        StatusReport::Error { message: message.into() }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StatusReport::Ok)
    }
}

/// Run the full clustering pass: ensure the output schema, drive every
/// configured zoom level to completion concurrently, and fold the results
/// into one status report.
pub async fn run(
    db: Arc<Database>,
    zooms: &ZoomTable,
    run_timeout_secs: Option<u64>,
) -> StatusReport {
    println!("[Orchestrator] Ensuring cluster tables for {} zoom levels", zooms.len());
    if let Err(e) = db.ensure_cluster_tables(zooms) {
        eprintln!("[Orchestrator] Schema setup failed: {}", e);
        return StatusReport::error(e.to_string());
    }

    let mut handles = Vec::with_capacity(zooms.len());
    for level in zooms.levels().iter().copied() {
        let db = Arc::clone(&db);
        handles.push(tokio::task::spawn_blocking(move || clusterer::run_level(&db, level)));
    }

    let joined = match run_timeout_secs {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), join_all(handles)).await {
                Ok(results) => results,
                Err(_) => {
                    let e = ClusterError::Timeout(secs);
                    eprintln!("[Orchestrator] {}", e);
                    return StatusReport::error(e.to_string());
                }
            }
        }
        None => join_all(handles).await,
    };

    let mut first_error: Option<String> = None;
    for result in joined {
        match result {
            Ok(Ok(summary)) => {
                println!(
                    "[Orchestrator] zoom {}: {} clusters over {} places",
                    summary.zoom, summary.clusters_created, summary.places_clustered
                );
            }
            Ok(Err(e)) => {
                eprintln!("[Orchestrator] {}", e);
                first_error.get_or_insert(e.to_string());
            }
            Err(e) => {
                let e = ClusterError::Join(e.to_string());
                eprintln!("[Orchestrator] {}", e);
                first_error.get_or_insert(e.to_string());
            }
        }
    }

    match first_error {
        Some(message) => StatusReport::Error { message },
        None => StatusReport::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewPlace;
    use serde_json::json;
    use std::collections::BTreeMap;

    const LAT_DEGREE_M: f64 = 111_195.0;

    fn two_level_table() -> ZoomTable {
        let mut map = BTreeMap::new();
        map.insert(2, 700_000.0);
        map.insert(16, 100.0);
        ZoomTable::from_map(&map).unwrap()
    }

    fn seed_places(db: &Database) {
        let places: Vec<NewPlace> = [
            (0.0, 0.0),
            (50.0 / LAT_DEGREE_M, 0.0),
            (10_000.0 / LAT_DEGREE_M, 0.0),
        ]
        .iter()
        .map(|&(lat, lon)| NewPlace { name: None, lat, lon })
        .collect();
        db.insert_places(&places).unwrap();
    }

    #[test]
    fn test_status_report_wire_shape() {
        assert_eq!(serde_json::to_value(StatusReport::Ok).unwrap(), json!({"status": "OK"}));
        assert_eq!(
            serde_json::to_value(StatusReport::error("boom")).unwrap(),
            json!({"status": "ERROR", "message": "boom"})
        );

        let parsed: StatusReport = serde_json::from_value(json!({"status": "OK"})).unwrap();
        assert!(parsed.is_ok());
    }

    #[tokio::test]
    async fn test_full_run_reports_ok_and_clusters_every_level() {
        let db = Arc::new(Database::in_memory().unwrap());
        let zooms = two_level_table();
        seed_places(&db);

        let report = run(Arc::clone(&db), &zooms, None).await;
        assert!(report.is_ok(), "got {:?}", report);

        for l in zooms.levels() {
            assert_eq!(db.count_unclustered(l.zoom).unwrap(), 0);
        }
        assert_eq!(db.count_clusters(16).unwrap(), 2);
        assert_eq!(db.count_clusters(2).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_is_idempotent_on_already_clustered_data() {
        let db = Arc::new(Database::in_memory().unwrap());
        let zooms = two_level_table();
        seed_places(&db);

        assert!(run(Arc::clone(&db), &zooms, None).await.is_ok());
        let clusters_before = db.count_clusters(16).unwrap();

        // Second run: schema setup is a no-op and every level is exhausted
        assert!(run(Arc::clone(&db), &zooms, None).await.is_ok());
        assert_eq!(db.count_clusters(16).unwrap(), clusters_before);
    }

    #[tokio::test]
    async fn test_failing_level_surfaces_error_without_stopping_siblings() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let db = Arc::new(Database::new(file.path()).unwrap());
        let zooms = two_level_table();
        seed_places(&db);

        // Sabotage zoom 16's output table: the schema manager's
        // IF NOT EXISTS leaves it in place, and the level's first insert
        // then fails mid-run
        {
            let conn = rusqlite::Connection::open(file.path()).unwrap();
            conn.execute_batch("CREATE TABLE clusters_zoom_16 (wrong TEXT);").unwrap();
        }

        let report = run(Arc::clone(&db), &zooms, None).await;
        match &report {
            StatusReport::Error { message } => {
                assert!(message.contains("zoom 16"), "unexpected message: {}", message);
            }
            StatusReport::Ok => panic!("expected an error report"),
        }

        // The healthy sibling still ran to completion
        assert_eq!(db.count_unclustered(2).unwrap(), 0);
        assert_eq!(db.count_clusters(2).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_dataset_reports_ok() {
        let db = Arc::new(Database::in_memory().unwrap());
        let zooms = two_level_table();

        let report = run(Arc::clone(&db), &zooms, None).await;
        assert!(report.is_ok());
        assert_eq!(db.count_clusters(16).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_honors_timeout_config() {
        let db = Arc::new(Database::in_memory().unwrap());
        let zooms = two_level_table();
        seed_places(&db);

        // A generous bound on a tiny dataset: the run finishes well inside it
        let report = run(Arc::clone(&db), &zooms, Some(60)).await;
        assert!(report.is_ok());
    }
}
