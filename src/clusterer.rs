//! Greedy per-level clustering.
//!
//! One step picks the lowest-id unclustered place as the seed, gathers
//! every unclustered place within the level radius, and materializes a
//! cluster with their count and centroid. The driver repeats steps until
//! the level reports no unclustered place left. Each step claims at least
//! the seed, so a level finishes in at most one step per place.

use serde::Serialize;

use crate::db::Database;
use crate::error::ClusterError;
use crate::geo::{self, GeoPoint};
use crate::zoom::ZoomLevel;

/// Outcome of a single clustering step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// A new cluster was materialized
    Created { cluster: i64, size: usize },
    /// No unclustered place remains at this level
    Exhausted,
}

/// Totals for one zoom level driven to completion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
    pub zoom: u8,
    pub clusters_created: usize,
    pub places_clustered: usize,
}

/// Run one greedy clustering step for a zoom level.
///
/// The member set is gathered with a bounding-box prefilter in SQL and an
/// exact haversine check here; the insert-and-claim mutation is a single
/// transaction, so a concurrent step at the same level can never observe
/// or steal a member mid-step.
pub fn cluster_step(db: &Database, level: ZoomLevel) -> Result<StepOutcome, ClusterError> {
    let step = |e: rusqlite::Error| ClusterError::Step { zoom: level.zoom, source: e };

    let seed = match db.get_seed_place(level.zoom).map_err(step)? {
        Some(place) => place,
        None => return Ok(StepOutcome::Exhausted),
    };

    let bbox = geo::bounding_box(seed.location(), level.radius_m);
    let members: Vec<_> = db
        .get_unclustered_in_bbox(level.zoom, &bbox)
        .map_err(step)?
        .into_iter()
        .filter(|p| geo::haversine_distance(seed.location(), p.location()) <= level.radius_m)
        .collect();

    // The seed is unclustered and zero meters from itself, so the member
    // set always contains it.
    let locations: Vec<GeoPoint> = members.iter().map(|p| p.location()).collect();
    let centroid = geo::centroid(&locations).unwrap_or_else(|| seed.location());
    let member_ids: Vec<i64> = members.iter().map(|p| p.id).collect();

    let cluster = db.create_cluster_with_members(level.zoom, centroid, &member_ids)?;
    Ok(StepOutcome::Created { cluster, size: member_ids.len() })
}

/// Drive one zoom level to exhaustion.
///
/// Strictly sequential: each step works on the assignments left by the
/// previous one. Any step error is terminal for this level and is not
/// retried; sibling levels are unaffected.
pub fn run_level(db: &Database, level: ZoomLevel) -> Result<LevelSummary, ClusterError> {
    let mut summary =
        LevelSummary { zoom: level.zoom, clusters_created: 0, places_clustered: 0 };

    loop {
        match cluster_step(db, level)? {
            StepOutcome::Created { size, .. } => {
                summary.clusters_created += 1;
                summary.places_clustered += size;
            }
            StepOutcome::Exhausted => break,
        }
    }

    println!(
        "[Cluster z{}] done: {} clusters over {} places",
        summary.zoom, summary.clusters_created, summary.places_clustered
    );
    Ok(summary)
}
