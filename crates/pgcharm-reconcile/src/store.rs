//! Durable reconciliation state.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use pgcharm_config::{ConfigError, write_atomic};
use pgcharm_core::{DEFAULT_PORT, RelationId, Resource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReconcileError, Result};

/// Everything the reconciler remembers between notifications.
///
/// Only the reconciler mutates it. Every `relation_to_resource` value names a
/// key of `resources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationStore {
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub started: bool,
    /// Provisioned databases keyed by name
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
    #[serde(default)]
    pub relation_to_resource: BTreeMap<RelationId, String>,
    /// Unit name to comma-joined address ranges
    #[serde(default)]
    pub unit_addresses: BTreeMap<String, String>,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_open_ports")]
    pub open_ports: BTreeSet<u16>,
}

fn default_listen_port() -> u16 {
    DEFAULT_PORT
}

fn default_open_ports() -> BTreeSet<u16> {
    BTreeSet::from([DEFAULT_PORT])
}

impl Default for ReconciliationStore {
    fn default() -> Self {
        Self {
            installed: false,
            configured: false,
            started: false,
            resources: BTreeMap::new(),
            relation_to_resource: BTreeMap::new(),
            unit_addresses: BTreeMap::new(),
            listen_port: default_listen_port(),
            open_ports: default_open_ports(),
        }
    }
}

impl ReconciliationStore {
    /// Fresh state for a server initially listening on `port`.
    pub fn with_listen_port(port: u16) -> Self {
        Self {
            listen_port: port,
            open_ports: BTreeSet::from([port]),
            ..Self::default()
        }
    }

    /// Resource name recorded for a relation.
    pub fn resource_name(&self, relation_id: RelationId) -> Option<&str> {
        self.relation_to_resource.get(&relation_id).map(String::as_str)
    }

    /// Relations other than `excluding` that map to `name`.
    pub fn references(&self, name: &str, excluding: RelationId) -> usize {
        self.relation_to_resource
            .iter()
            .filter(|(id, resource)| **id != excluding && resource.as_str() == name)
            .count()
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(path, self)
    }
}

/// Reads a JSON document, yielding `T::default()` when the file is missing.
pub fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file, starting fresh");
            return Ok(T::default());
        }
        Err(e) => return Err(ConfigError::file(path, e).into()),
    };
    serde_json::from_slice(&bytes).map_err(|e| ReconcileError::state_format(path, e))
}

/// Writes a JSON document atomically, creating the parent directory.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| ConfigError::file(dir, e))?;
    }
    let json = serde_json::to_vec_pretty(value).map_err(|e| ReconcileError::state_format(path, e))?;
    write_atomic(path, &json)?;
    debug!(path = %path.display(), bytes = json.len(), "Saved state");
    Ok(())
}
