use thiserror::Error;

/// Engine-level errors.
///
/// Per-file parse, IO, and store write failures inside a refresh are
/// isolated and aggregated into the refresh summary; no distinction is
/// made between a store being unreachable and a single bad write. The
/// variants here surface conditions that are fatal for a whole
/// operation. A lookup miss is an `Option`, never an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{metric} exceeded budget: measured {measured:.1}, ceiling {ceiling:.1}")]
    BudgetExceeded {
        metric: String,
        measured: f64,
        ceiling: f64,
    },

    #[error("a refresh is already in progress")]
    RefreshInProgress,

    #[error("operation cancelled")]
    Cancelled,
}
