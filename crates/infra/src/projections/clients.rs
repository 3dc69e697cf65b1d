use serde::Serialize;
use serde_json::Value as JsonValue;

use cargoflow_clients::{ClientEvent, ClientStatus, ContactInfo};
use cargoflow_core::{ClientId, TenantId};
use cargoflow_events::EventEnvelope;

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::TenantStore;

const AGGREGATE_TYPE: &str = "clients.client";

/// Queryable client directory entry.
///
/// Clients are not an own-scoped kind; access is `clients:read`/`clients:write`
/// only, so the accessors take no scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientReadModel {
    pub client_id: ClientId,
    pub name: String,
    pub contact: ContactInfo,
    pub status: ClientStatus,
}

#[derive(Debug)]
pub struct ClientsProjection<S>
where
    S: TenantStore<ClientId, ClientReadModel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> ClientsProjection<S>
where
    S: TenantStore<ClientId, ClientReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: ProjectionCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, client_id: &ClientId) -> Option<ClientReadModel> {
        self.store.get(tenant_id, client_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ClientReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: ClientEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, client_id) = match &ev {
            ClientEvent::ClientRegistered(e) => (e.tenant_id, e.client_id),
            ClientEvent::ClientUpdated(e) => (e.tenant_id, e.client_id),
            ClientEvent::ClientArchived(e) => (e.tenant_id, e.client_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if cargoflow_core::AggregateId::from(client_id) != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event client_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ClientEvent::ClientRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.client_id,
                    ClientReadModel {
                        client_id: e.client_id,
                        name: e.name,
                        contact: e.contact,
                        status: ClientStatus::Active,
                    },
                );
            }
            ClientEvent::ClientUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.client_id) {
                    if let Some(name) = e.name {
                        rm.name = name;
                    }
                    if let Some(contact) = e.contact {
                        rm.contact = contact;
                    }
                    self.store.upsert(tenant_id, e.client_id, rm);
                }
            }
            ClientEvent::ClientArchived(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.client_id) {
                    rm.status = ClientStatus::Archived;
                    self.store.upsert(tenant_id, e.client_id, rm);
                }
            }
        }

        self.cursors.commit(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
