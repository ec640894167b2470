//! The unit agent as seen by the reconciler.

use std::collections::BTreeMap;
use std::fmt;

use pgcharm_core::{PublishedData, Relation, RelationId};
use serde::{Deserialize, Serialize};

/// Workload status reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    Maintenance(String),
    Active(String),
    Waiting(String),
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maintenance(msg) => write!(f, "maintenance: {msg}"),
            Self::Active(msg) => write!(f, "active: {msg}"),
            Self::Waiting(msg) => write!(f, "waiting: {msg}"),
        }
    }
}

/// Relations and outward data owned by the host.
///
/// Membership is maintained by the host; the reconciler only reads it. Unit
/// order is attachment order.
pub trait UnitHost: Send {
    fn relations(&self) -> Vec<Relation>;

    fn relation(&self, id: RelationId) -> Option<Relation> {
        self.relations().into_iter().find(|r| r.id == id)
    }

    /// This unit's outward data on a relation.
    fn local_data(&self, id: RelationId) -> PublishedData;

    fn set_local_data(&mut self, id: RelationId, data: PublishedData);

    fn set_status(&mut self, status: UnitStatus);
}

/// Host kept entirely in memory. Serializable so a snapshot can be persisted
/// between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryHost {
    #[serde(default)]
    relations: BTreeMap<RelationId, Vec<String>>,
    #[serde(default)]
    published: BTreeMap<RelationId, PublishedData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<UnitStatus>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `unit` to a relation, creating the relation if needed.
    /// Re-joining keeps the original position.
    pub fn join(&mut self, id: RelationId, unit: &str) {
        let units = self.relations.entry(id).or_default();
        if !units.iter().any(|u| u == unit) {
            units.push(unit.to_string());
        }
    }

    /// Detaches `unit`. The relation itself stays until [`Self::break_relation`].
    pub fn depart(&mut self, id: RelationId, unit: &str) {
        if let Some(units) = self.relations.get_mut(&id) {
            units.retain(|u| u != unit);
        }
    }

    /// Removes a relation and its outward data.
    pub fn break_relation(&mut self, id: RelationId) {
        self.relations.remove(&id);
        self.published.remove(&id);
    }

    pub fn published(&self, id: RelationId) -> Option<&PublishedData> {
        self.published.get(&id)
    }

    pub fn status(&self) -> Option<&UnitStatus> {
        self.status.as_ref()
    }
}

impl UnitHost for InMemoryHost {
    fn relations(&self) -> Vec<Relation> {
        self.relations
            .iter()
            .map(|(id, units)| Relation::new(*id, units.iter().cloned()))
            .collect()
    }

    fn relation(&self, id: RelationId) -> Option<Relation> {
        self.relations
            .get(&id)
            .map(|units| Relation::new(id, units.iter().cloned()))
    }

    fn local_data(&self, id: RelationId) -> PublishedData {
        self.published.get(&id).cloned().unwrap_or_default()
    }

    fn set_local_data(&mut self, id: RelationId, data: PublishedData) {
        self.published.insert(id, data);
    }

    fn set_status(&mut self, status: UnitStatus) {
        self.status = Some(status);
    }
}
