//! Error types for resource administration.

use pgcharm_config::ConfigError;

/// Errors raised by administrator, service and port operations.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// The program could not be started at all.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", exit_label(.status))]
    CommandFailed {
        program: String,
        /// Exit code, `None` when terminated by a signal.
        status: Option<i32>,
        stderr: String,
    },

    /// A SQL statement failed. The statement is redacted of secrets.
    #[error("Query failed: {query}")]
    Query {
        query: String,
        #[source]
        source: Box<AdminError>,
    },

    /// The server version could not be determined.
    #[error("PostgreSQL version unavailable: {0}")]
    VersionUnavailable(String),

    /// Patching the server configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AdminError {
    #[must_use]
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    #[must_use]
    pub fn command_failed(
        program: impl Into<String>,
        status: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            program: program.into(),
            status,
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn query(query: impl Into<String>, source: AdminError) -> Self {
        Self::Query {
            query: query.into(),
            source: Box::new(source),
        }
    }
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

/// Result type alias for administration operations.
pub type Result<T> = std::result::Result<T, AdminError>;
