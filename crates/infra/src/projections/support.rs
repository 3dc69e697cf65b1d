use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use cargoflow_auth::Scope;
use cargoflow_core::{ClientId, TenantId};
use cargoflow_events::EventEnvelope;
use cargoflow_support::{TicketEvent, TicketId, TicketStatus};

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::TenantStore;

const AGGREGATE_TYPE: &str = "support.ticket";

/// Queryable support ticket read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportTicketReadModel {
    pub ticket_id: TicketId,
    pub client_id: ClientId,
    pub subject: String,
    pub status: TicketStatus,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SupportTicketsProjection<S>
where
    S: TenantStore<TicketId, SupportTicketReadModel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> SupportTicketsProjection<S>
where
    S: TenantStore<TicketId, SupportTicketReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: ProjectionCursors::new(),
        }
    }

    /// Detail read, scope applied (scope-hidden reads as absent).
    pub fn get(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
        scope: &Scope,
    ) -> Option<SupportTicketReadModel> {
        self.store
            .get(tenant_id, ticket_id)
            .filter(|rm| scope.permits(Some(rm.client_id)))
    }

    /// List read, scope applied as an additional filter predicate.
    pub fn list(&self, tenant_id: TenantId, scope: &Scope) -> Vec<SupportTicketReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| scope.permits(Some(rm.client_id)))
            .collect()
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

        let ev: TicketEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, ticket_id) = match &ev {
            TicketEvent::TicketOpened(e) => (e.tenant_id, e.ticket_id),
            TicketEvent::TicketReplied(e) => (e.tenant_id, e.ticket_id),
            TicketEvent::TicketClosed(e) => (e.tenant_id, e.ticket_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if ticket_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event ticket_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            TicketEvent::TicketOpened(e) => {
                self.store.upsert(
                    tenant_id,
                    e.ticket_id,
                    SupportTicketReadModel {
                        ticket_id: e.ticket_id,
                        client_id: e.client_id,
                        subject: e.subject,
                        status: TicketStatus::Open,
                        last_activity_at: e.occurred_at,
                    },
                );
            }
            TicketEvent::TicketReplied(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.ticket_id) {
                    rm.status = TicketStatus::Answered;
                    rm.last_activity_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.ticket_id, rm);
                }
            }
            TicketEvent::TicketClosed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.ticket_id) {
                    rm.status = TicketStatus::Closed;
                    rm.last_activity_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.ticket_id, rm);
                }
            }
        }

        self.cursors.commit(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
