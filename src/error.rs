//! Error kinds for a clustering run.
//!
//! A `Schema` error is fatal to the whole run (no level starts); a `Step`
//! or `Assign` error is fatal to its zoom level only. The orchestrator
//! folds whatever it collects into the single final status report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// Creating the per-zoom cluster tables or assignment columns failed
    #[error("creating cluster tables failed: {0}")]
    Schema(#[source] rusqlite::Error),

    /// One member-set-and-assign step failed at a zoom level
    #[error("clustering step failed at zoom {zoom}: {source}")]
    Step {
        zoom: u8,
        #[source]
        source: rusqlite::Error,
    },

    /// The write-once guard tripped: fewer rows claimed than selected
    #[error("assignment at zoom {zoom} claimed {updated} of {expected} places")]
    Assign {
        zoom: u8,
        expected: usize,
        updated: usize,
    },

    /// A level driver task died before reporting a result
    #[error("level task failed: {0}")]
    Join(String),

    /// The whole run exceeded its configured bound
    #[error("clustering run exceeded {0}s timeout")]
    Timeout(u64),
}
