//! External command execution.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AdminError, Result};

/// Runs an external program and returns its stdout.
///
/// Implementations must fail with [`AdminError::CommandFailed`] on a
/// non-zero exit so callers never act on partial output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>>;
}

/// Runs programs on the local system via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>> {
        debug!(program, argc = args.len(), "Running command");

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| AdminError::spawn(program, e))?;

        if !output.status.success() {
            return Err(AdminError::command_failed(
                program,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(output.stdout)
    }
}
