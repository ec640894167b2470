//! Port management through the unit agent's `open-port`/`close-port` tools.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::runner::CommandRunner;
use crate::traits::PortController;

pub struct HookToolPorts {
    runner: Arc<dyn CommandRunner>,
}

impl HookToolPorts {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PortController for HookToolPorts {
    async fn open_port(&self, port: u16) -> Result<()> {
        self.runner.run("open-port", &[format!("{port}/tcp")]).await?;
        info!(port, "Opened port");
        Ok(())
    }

    async fn close_port(&self, port: u16) -> Result<()> {
        self.runner.run("close-port", &[format!("{port}/tcp")]).await?;
        info!(port, "Closed port");
        Ok(())
    }
}
