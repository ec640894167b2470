use std::path::PathBuf;

use pgcharm_admin::AdminError;
use pgcharm_config::ConfigError;

/// Errors surfaced to the host as a failed handler.
///
/// Precondition failures, leader skips and incomplete relation data are not
/// errors; see [`HandlerOutcome`](crate::HandlerOutcome).
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Administrator call failed: {0}")]
    Admin(#[from] AdminError),

    #[error("State file {path}: {source}")]
    StateFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ReconcileError {
    pub fn state_format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::StateFormat {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
