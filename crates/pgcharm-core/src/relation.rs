//! Typed relation data.
//!
//! The host exchanges relation data as untyped string maps. Inbound unit data
//! and the outward data this unit publishes are modelled as records with
//! optional fields instead, and converted at the boundary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// Host-assigned relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub u32);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RelationId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A relationship and its member units, in attachment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    #[serde(default)]
    pub units: Vec<String>,
}

impl Relation {
    pub fn new(id: impl Into<RelationId>, units: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            units: units.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_unit(&self, unit: &str) -> bool {
        self.units.iter().any(|u| u == unit)
    }
}

/// Data a subscriber unit publishes on the relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitData {
    /// Requested database name; provisioning waits until this is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_subnets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<String>,
}

impl UnitData {
    /// Builds unit data from a raw key/value bag. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut data = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "database" => &mut data.database,
                "egress-subnets" => &mut data.egress_subnets,
                "ingress-address" => &mut data.ingress_address,
                "private-address" => &mut data.private_address,
                "roles" => &mut data.roles,
                "extensions" => &mut data.extensions,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        data
    }

    /// The requested database name, if a non-empty one was given.
    pub fn requested_database(&self) -> Option<&str> {
        self.database.as_deref().filter(|db| !db.is_empty())
    }
}

/// Data this unit publishes on a relation for its subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PublishedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// libpq `key=value` connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_subnets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<String>,
}

impl PublishedData {
    /// Copies a resource's connection fields.
    pub fn set_resource(&mut self, resource: &Resource) {
        self.host = Some(resource.host.clone());
        self.port = Some(resource.port.to_string());
        self.database = Some(resource.name.clone());
        self.user = Some(resource.username.clone());
        self.password = Some(resource.password.clone());
        self.master = Some(resource.connection_string());
    }

    pub fn is_empty(&self) -> bool {
        self.to_pairs().is_empty()
    }

    /// Flattens into the string map the host publishes.
    pub fn to_pairs(&self) -> BTreeMap<String, String> {
        let fields = [
            ("host", &self.host),
            ("port", &self.port),
            ("database", &self.database),
            ("user", &self.user),
            ("password", &self.password),
            ("master", &self.master),
            ("allowed-units", &self.allowed_units),
            ("allowed-subnets", &self.allowed_subnets),
            ("roles", &self.roles),
            ("extensions", &self.extensions),
        ];
        fields
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone())))
            .collect()
    }
}
