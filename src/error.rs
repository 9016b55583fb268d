//! Layered error taxonomy. One enum per subsystem rather than a single
//! catch-all, mirroring the split between transport-level and domain-level
//! failures used throughout the store and collector layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Matches §7's collector failure taxonomy: transient (retry), auth
/// (stop and surface to the queue), parse (drop the artifact, log it).
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("transient error from {source}: {message}")]
    Transient { source: &'static str, message: String },

    #[error("auth error from {source}: {message}")]
    Auth { source: &'static str, message: String },

    #[error("parse error from {source}: {message}")]
    Parse { source: &'static str, message: String },
}

impl CollectorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollectorError::Transient { .. })
    }

    /// Auth failures mean the collector cannot make progress on any
    /// subsequent poll until credentials are fixed; the caller should
    /// stop scheduling it rather than retry on the normal interval.
    pub fn stops_collector(&self) -> bool {
        matches!(self, CollectorError::Auth { .. })
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            CollectorError::Transient { source, .. }
            | CollectorError::Auth { source, .. }
            | CollectorError::Parse { source, .. } => source,
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("store error during normalization: {0}")]
    Store(#[from] StoreError),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("store error during gate evaluation: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("store error during snapshot generation: {0}")]
    Store(#[from] StoreError),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum MovesError {
    #[error("store error during moves evaluation: {0}")]
    Store(#[from] StoreError),
}

/// Top-level error for the HTTP boundary and `main()`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Moves(#[from] MovesError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable_auth_is_not() {
        let transient = CollectorError::Transient {
            source: "gmail",
            message: "timeout".into(),
        };
        let auth = CollectorError::Auth {
            source: "gmail",
            message: "token expired".into(),
        };
        assert!(transient.is_retryable());
        assert!(!transient.stops_collector());
        assert!(!auth.is_retryable());
        assert!(auth.stops_collector());
    }
}
