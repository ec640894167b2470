//! Agent state persisted between invocations.

use std::path::Path;

use anyhow::{Context, Result};
use pgcharm_reconcile::{
    Dispatcher, InMemoryHost, Notification, ReconciliationStore, load_json, save_json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub store: ReconciliationStore,
    #[serde(default)]
    pub host: InMemoryHost,
    #[serde(default)]
    pub deferred: Dispatcher,
    #[serde(default)]
    pub leader: bool,
}

impl AgentState {
    /// Loads the state file, or fresh state listening on `initial_port`.
    pub fn load(path: &Path, initial_port: u16) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                store: ReconciliationStore::with_listen_port(initial_port),
                ..Self::default()
            });
        }
        load_json(path).with_context(|| format!("Failed to load state from {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, self).with_context(|| format!("Failed to save state to {}", path.display()))
    }

    /// Mirrors relation membership carried by a notification into the host.
    pub fn observe(&mut self, notification: &Notification) {
        match notification {
            Notification::SubscriptionChanged {
                relation_id, unit, ..
            } => self.host.join(*relation_id, unit),
            Notification::SubscriptionRemoved {
                relation_id, unit, ..
            } => self.host.depart(*relation_id, unit),
            _ => {}
        }
    }
}
