//! Error types for nestbench core operations

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Kind of ground-truth asset, used in lookups and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Chair,
    Estate,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Chair => write!(f, "chair"),
            AssetKind::Estate => write!(f, "estate"),
        }
    }
}

/// Errors raised by the benchmarker itself (fixtures, oracle lookups)
#[derive(Error, Debug)]
pub enum BenchError {
    // === Initialization ===
    /// A catalog was read before its loader completed
    #[error("{0} search condition has not been loaded")]
    NotLoaded(AssetKind),

    /// Fixture content is malformed
    #[error("Invalid fixture {path}: {reason}")]
    Fixture { path: String, reason: String },

    /// Loading was cancelled before completion
    #[error("Loading cancelled")]
    Cancelled,

    // === Oracle ===
    /// Requested record is absent from the ground-truth store
    #[error("Requested {kind} not found: {id}")]
    NotFound { kind: AssetKind, id: i64 },

    // === IO ===
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Build a fixture error for `path`
    pub fn fixture(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        Self::Fixture {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BenchError::NotFound {
            kind: AssetKind::Chair,
            id: 42,
        };
        assert_eq!(err.to_string(), "Requested chair not found: 42");

        let err = BenchError::NotLoaded(AssetKind::Estate);
        assert!(err.to_string().contains("estate"));
    }

    #[test]
    fn test_fixture_error_carries_path() {
        let err = BenchError::fixture("/tmp/chair_condition.json", "empty feature list");
        let msg = err.to_string();
        assert!(msg.contains("chair_condition.json"));
        assert!(msg.contains("empty feature list"));
    }
}
