//! Relation-driven provisioning of databases and credentials.
//!
//! Each handler runs to completion for one notification. Administrator calls
//! happen before any state is written, so a failed call leaves the store as it
//! was. Resources are keyed by database name: relations asking for the same
//! name share one set of credentials, and the resource is dropped when the
//! last of them goes away.

use std::collections::BTreeSet;

use pgcharm_admin::{DynAdministrator, DynPortController};
use pgcharm_core::{
    NotificationKind, PublishedData, Relation, RelationId, UnitData, incoming_addresses,
    join_ranges, should_defer,
};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::host::{UnitHost, UnitStatus};
use crate::store::ReconciliationStore;

/// What a handler did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Completed,
    /// Redeliver the notification later.
    Deferred,
    /// Precondition still unmet after the retry; dropped.
    Abandoned,
    /// Nothing to do: not the leader, or no database requested.
    Skipped,
}

pub struct RelationReconciler {
    admin: DynAdministrator,
    ports: DynPortController,
    store: ReconciliationStore,
    leader: bool,
}

impl RelationReconciler {
    pub fn new(admin: DynAdministrator, ports: DynPortController, store: ReconciliationStore) -> Self {
        Self {
            admin,
            ports,
            store,
            leader: false,
        }
    }

    #[must_use]
    pub fn with_leader(mut self, leader: bool) -> Self {
        self.leader = leader;
        self
    }

    pub fn set_leader(&mut self, leader: bool) {
        if self.leader != leader {
            info!(leader, "Leadership changed");
        }
        self.leader = leader;
    }

    pub fn is_leader(&self) -> bool {
        self.leader
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn into_store(self) -> ReconciliationStore {
        self.store
    }

    pub fn on_install_complete(&mut self, host: &mut dyn UnitHost) -> HandlerOutcome {
        self.store.installed = true;
        host.set_status(UnitStatus::Maintenance("Install complete".into()));
        info!("Install complete");
        HandlerOutcome::Completed
    }

    /// Moves the server to `requested_port` once installation has finished.
    ///
    /// `pending` is the number of equivalent notices already queued.
    #[instrument(skip(self, host))]
    pub async fn on_config_changed(
        &mut self,
        host: &mut dyn UnitHost,
        requested_port: u16,
        pending: u32,
    ) -> Result<HandlerOutcome> {
        if !self.store.installed {
            warn!("Configuration changed before install completed");
            return Ok(defer_once(host, NotificationKind::ConfigChanged, pending, "install"));
        }

        if requested_port != self.store.listen_port {
            let previous = self.store.listen_port;
            host.set_status(UnitStatus::Maintenance(format!(
                "Moving to port {requested_port}"
            )));

            self.admin.reconfigure_listen_port(requested_port).await?;
            self.admin.restart_service().await?;
            for port in &self.store.open_ports {
                self.ports.close_port(*port).await?;
            }
            self.ports.open_port(requested_port).await?;

            self.store.listen_port = requested_port;
            self.store.open_ports = BTreeSet::from([requested_port]);
            info!(previous, port = requested_port, "Listen port changed");

            if self.leader {
                for resource in self.store.resources.values_mut() {
                    resource.port = requested_port;
                }
                for relation in host.relations() {
                    self.republish(host, &relation, None);
                }
            }
        }

        self.store.configured = true;
        Ok(HandlerOutcome::Completed)
    }

    #[instrument(skip(self, host))]
    pub async fn on_start(&mut self, host: &mut dyn UnitHost, pending: u32) -> Result<HandlerOutcome> {
        if !self.store.configured {
            warn!("Start called before configuration completed");
            return Ok(defer_once(host, NotificationKind::Start, pending, "configuration"));
        }

        host.set_status(UnitStatus::Maintenance("Starting".into()));
        let version = self.admin.get_version().await?;

        self.store.started = true;
        host.set_status(UnitStatus::Active(format!("PostgreSQL {version} running")));
        info!(%version, "Started");
        Ok(HandlerOutcome::Completed)
    }

    /// Provisions or reuses the requested database and publishes its
    /// credentials and allow-lists to the relation.
    #[instrument(skip(self, host, data, relation_id), fields(relation_id = %relation_id))]
    pub async fn on_subscription_changed(
        &mut self,
        host: &mut dyn UnitHost,
        relation_id: RelationId,
        unit: &str,
        data: &UnitData,
    ) -> Result<HandlerOutcome> {
        if !self.leader {
            debug!("Not the leader, ignoring subscription change");
            return Ok(HandlerOutcome::Skipped);
        }
        let Some(database) = data.requested_database() else {
            debug!("No database requested yet");
            return Ok(HandlerOutcome::Skipped);
        };

        if !self.store.resources.contains_key(database) {
            let resource = self.admin.create_database_and_user(database).await?;
            info!(database, user = %resource.username, "Provisioned resource");
            self.store.resources.insert(database.to_string(), resource);
        } else {
            debug!(database, "Reusing existing resource");
        }

        let ranges = incoming_addresses(data);
        self.store
            .unit_addresses
            .insert(unit.to_string(), join_ranges(&ranges));
        self.store
            .relation_to_resource
            .insert(relation_id, database.to_string());

        let relation = host
            .relation(relation_id)
            .unwrap_or_else(|| Relation::new(relation_id, [unit]));
        self.republish(host, &relation, Some(data));
        Ok(HandlerOutcome::Completed)
    }

    /// Releases the relation's claim on its database, dropping the database
    /// and its user when no relation or unit still needs them.
    #[instrument(skip(self, host, data, relation_id), fields(relation_id = %relation_id))]
    pub async fn on_subscription_removed(
        &mut self,
        host: &mut dyn UnitHost,
        relation_id: RelationId,
        unit: &str,
        data: &UnitData,
    ) -> Result<HandlerOutcome> {
        if !self.leader {
            debug!("Not the leader, ignoring subscription removal");
            return Ok(HandlerOutcome::Skipped);
        }
        debug!(unit, requested = ?data.requested_database(), "Unit departed");

        let remaining = host
            .relation(relation_id)
            .map(|r| r.units)
            .unwrap_or_default();
        let name = self
            .store
            .resource_name(relation_id)
            .map(str::to_string)
            .or_else(|| host.local_data(relation_id).database);

        if let Some(name) = name.filter(|n| self.store.resources.contains_key(n)) {
            let shared = self.store.references(&name, relation_id) > 0;
            if remaining.is_empty() {
                if !shared {
                    if let Some(resource) = self.store.resources.get(&name) {
                        self.admin.drop_user(&resource.username).await?;
                        self.admin.drop_database(&name).await?;
                    }
                    self.store.resources.remove(&name);
                    info!(database = %name, "Dropped resource");
                } else {
                    debug!(database = %name, "Resource still referenced by another relation");
                }
                self.store.relation_to_resource.remove(&relation_id);
            }
        }

        self.store.unit_addresses.remove(unit);

        if !remaining.is_empty() && self.store.resource_name(relation_id).is_some() {
            self.republish(host, &Relation::new(relation_id, remaining), None);
        }
        Ok(HandlerOutcome::Completed)
    }

    /// Writes credentials and allow-lists for one relation.
    ///
    /// Pass-through hints come from `data` when given, otherwise the
    /// previously published values are kept.
    fn republish(&self, host: &mut dyn UnitHost, relation: &Relation, data: Option<&UnitData>) {
        let Some(resource) = self
            .store
            .resource_name(relation.id)
            .and_then(|name| self.store.resources.get(name))
        else {
            return;
        };

        let mut published = host.local_data(relation.id);
        published.set_resource(resource);
        self.set_allow_lists(&mut published, relation);
        if let Some(data) = data {
            published.roles = Some(data.roles.clone().unwrap_or_default());
            published.extensions = Some(data.extensions.clone().unwrap_or_default());
        }
        host.set_local_data(relation.id, published);
    }

    fn set_allow_lists(&self, published: &mut PublishedData, relation: &Relation) {
        let subnets: Vec<&str> = relation
            .units
            .iter()
            .filter_map(|unit| self.store.unit_addresses.get(unit))
            .map(String::as_str)
            .filter(|ranges| !ranges.is_empty())
            .collect();
        published.allowed_units = Some(relation.units.join(","));
        published.allowed_subnets = Some(subnets.join(","));
    }
}

fn defer_once(
    host: &mut dyn UnitHost,
    kind: NotificationKind,
    pending: u32,
    waiting_for: &str,
) -> HandlerOutcome {
    if should_defer(kind, pending) {
        host.set_status(UnitStatus::Waiting(format!("Waiting for {waiting_for}")));
        HandlerOutcome::Deferred
    } else {
        warn!(%kind, pending, "Precondition still unmet after retry, abandoning");
        HandlerOutcome::Abandoned
    }
}
