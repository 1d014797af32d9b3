use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::Mutex;

use super::models::{ClusterRecord, NewPlace, Place};
use crate::error::ClusterError;
use crate::geo::{BoundingBox, GeoPoint};
use crate::zoom::ZoomTable;

pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn = Connection::open(&path)?;
        let db = Database { conn: Mutex::new(conn), path: path_str };
        db.init()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn: Mutex::new(conn), path: ":memory:".to_string() };
        db.init()?;
        Ok(db)
    }

    pub fn get_path(&self) -> String {
        self.path.clone()
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS places (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_places_lat ON places(lat);
            CREATE INDEX IF NOT EXISTS idx_places_lon ON places(lon);
            ",
        )
    }

    const PLACE_COLUMNS: &'static str = "id, name, lat, lon, created_at";

    fn row_to_place(row: &rusqlite::Row) -> Result<Place> {
        Ok(Place {
            id: row.get(0)?,
            name: row.get(1)?,
            lat: row.get(2)?,
            lon: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    // ==================== Schema Manager ====================

    /// Ensure one cluster table and one assignment column per zoom level.
    /// The whole batch runs in a single transaction: either every level's
    /// objects exist afterwards or none of the changes stick. Re-running
    /// against an existing store is a no-op.
    pub fn ensure_cluster_tables(&self, zooms: &ZoomTable) -> std::result::Result<(), ClusterError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(ClusterError::Schema)?;

        for level in zooms.levels() {
            let zoom = level.zoom;

            tx.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS clusters_zoom_{z} (
                    cluster INTEGER PRIMARY KEY AUTOINCREMENT,
                    pt_count INTEGER NOT NULL,
                    centroid_lat REAL NOT NULL,
                    centroid_lon REAL NOT NULL,
                    classify INTEGER
                );",
                z = zoom
            ))
            .map_err(ClusterError::Schema)?;

            let has_column: bool = tx
                .query_row(
                    &format!(
                        "SELECT COUNT(*) > 0 FROM pragma_table_info('places') WHERE name = 'cluster_{}'",
                        zoom
                    ),
                    [],
                    |row| row.get(0),
                )
                .map_err(ClusterError::Schema)?;

            if !has_column {
                tx.execute(&format!("ALTER TABLE places ADD COLUMN cluster_{} INTEGER", zoom), [])
                    .map_err(ClusterError::Schema)?;
            }

            tx.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS idx_places_cluster_{z} ON places(cluster_{z});",
                z = zoom
            ))
            .map_err(ClusterError::Schema)?;
        }

        tx.commit().map_err(ClusterError::Schema)
    }

    // ==================== Place ingestion & queries ====================

    pub fn insert_place(&self, place: &NewPlace) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO places (name, lat, lon, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![place.name, place.lat, place.lon, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Batch ingestion in one transaction
    pub fn insert_places(&self, places: &[NewPlace]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().timestamp_millis();
        {
            let mut stmt =
                tx.prepare("INSERT INTO places (name, lat, lon, created_at) VALUES (?1, ?2, ?3, ?4)")?;
            for place in places {
                stmt.execute(params![place.name, place.lat, place.lon, now])?;
            }
        }
        tx.commit()?;
        Ok(places.len())
    }

    pub fn count_places(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))
    }

    pub fn count_unclustered(&self, zoom: u8) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM places WHERE cluster_{} IS NULL", zoom),
            [],
            |row| row.get(0),
        )
    }

    /// The next clustering seed: the lowest-id unclustered place at this
    /// level, if any. Lowest-id keeps cluster output reproducible.
    pub fn get_seed_place(&self, zoom: u8) -> Result<Option<Place>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {} FROM places WHERE cluster_{} IS NULL ORDER BY id LIMIT 1",
                Self::PLACE_COLUMNS,
                zoom
            ),
            [],
            Self::row_to_place,
        )
        .optional()
    }

    /// Unclustered places inside a coordinate box, id-ordered. The box is a
    /// prefilter: callers still apply the exact distance check.
    pub fn get_unclustered_in_bbox(&self, zoom: u8, bbox: &BoundingBox) -> Result<Vec<Place>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM places WHERE cluster_{} IS NULL \
             AND lat BETWEEN ?1 AND ?2 AND lon BETWEEN ?3 AND ?4 ORDER BY id",
            Self::PLACE_COLUMNS,
            zoom
        ))?;

        let places = stmt
            .query_map(
                params![bbox.min_lat, bbox.max_lat, bbox.min_lon, bbox.max_lon],
                Self::row_to_place,
            )?
            .collect::<Result<Vec<_>>>()?;
        Ok(places)
    }

    /// A place's assigned cluster id at a zoom level (None while unclustered
    /// or if the place does not exist)
    pub fn get_assignment(&self, zoom: u8, place_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let assignment: Option<Option<i64>> = conn
            .query_row(
                &format!("SELECT cluster_{} FROM places WHERE id = ?1", zoom),
                params![place_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(assignment.flatten())
    }

    // ==================== Clustering step mutation ====================

    /// Materialize one cluster: insert its record and claim every member,
    /// as a single transaction. The `IS NULL` guard keeps assignments
    /// write-once; a shortfall in claimed rows rolls the whole step back.
    pub fn create_cluster_with_members(
        &self,
        zoom: u8,
        centroid: GeoPoint,
        member_ids: &[i64],
    ) -> std::result::Result<i64, ClusterError> {
        let step = |e: rusqlite::Error| ClusterError::Step { zoom, source: e };

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(step)?;

        tx.execute(
            &format!(
                "INSERT INTO clusters_zoom_{} (pt_count, centroid_lat, centroid_lon) VALUES (?1, ?2, ?3)",
                zoom
            ),
            params![member_ids.len() as i64, centroid.lat, centroid.lon],
        )
        .map_err(step)?;
        let cluster_id = tx.last_insert_rowid();

        let mut claimed = 0;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "UPDATE places SET cluster_{z} = ?1 WHERE id = ?2 AND cluster_{z} IS NULL",
                    z = zoom
                ))
                .map_err(step)?;
            for id in member_ids {
                claimed += stmt.execute(params![cluster_id, id]).map_err(step)?;
            }
        }

        if claimed != member_ids.len() {
            // dropping the uncommitted transaction rolls the step back
            return Err(ClusterError::Assign { zoom, expected: member_ids.len(), updated: claimed });
        }

        tx.commit().map_err(step)?;
        Ok(cluster_id)
    }

    // ==================== Cluster output queries ====================

    pub fn get_clusters(&self, zoom: u8) -> Result<Vec<ClusterRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT cluster, pt_count, centroid_lat, centroid_lon, classify \
             FROM clusters_zoom_{} ORDER BY cluster",
            zoom
        ))?;

        let clusters = stmt
            .query_map([], |row| {
                Ok(ClusterRecord {
                    cluster: row.get(0)?,
                    pt_count: row.get(1)?,
                    centroid_lat: row.get(2)?,
                    centroid_lon: row.get(3)?,
                    classify: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(clusters)
    }

    pub fn count_clusters(&self, zoom: u8) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM clusters_zoom_{}", zoom), [], |row| {
            row.get(0)
        })
    }

    /// Clear every assignment and drop all cluster tables so a fresh run
    /// can recluster from scratch. Place rows are untouched.
    pub fn reset_clusters(&self, zooms: &ZoomTable) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for level in zooms.levels() {
            let zoom = level.zoom;
            let has_column: bool = tx.query_row(
                &format!(
                    "SELECT COUNT(*) > 0 FROM pragma_table_info('places') WHERE name = 'cluster_{}'",
                    zoom
                ),
                [],
                |row| row.get(0),
            )?;
            if has_column {
                tx.execute(&format!("UPDATE places SET cluster_{} = NULL", zoom), [])?;
            }
            tx.execute_batch(&format!("DROP TABLE IF EXISTS clusters_zoom_{};", zoom))?;
        }

        tx.commit()
    }
}
