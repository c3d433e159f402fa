//! Error types for the planner.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for catalog loading and solver pipeline failures.
///
/// Infeasible or unbounded plans are *not* errors; they are reported through
/// [`SolveStatus`](crate::decode::SolveStatus). Likewise a problem the LP
/// engine rejects is turned into a failed result at the solve boundary.
/// What remains here are broken inputs (catalog files, JSON) and broken
/// internal invariants.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A catalog or request file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A catalog CSV file could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A request or settings document is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The catalog tables reference each other inconsistently.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// The problem was formulated before an objective was composed.
    #[error("cannot formulate a problem without an objective")]
    MissingObjective,

    /// The solver graph violates an invariant established by the builder.
    #[error("internal consistency error: {0}")]
    Inconsistent(String),
}

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;
