use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use cargoflow_auth::Scope;
use cargoflow_core::{ClientId, TenantId};
use cargoflow_events::EventEnvelope;
use cargoflow_invoicing::{ChargeLine, InvoiceEvent, InvoiceId, InvoiceStatus};
use cargoflow_shipments::ShipmentId;

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::TenantStore;

const AGGREGATE_TYPE: &str = "invoicing.invoice";

/// Queryable invoice read model (header + charge lines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub shipment_id: ShipmentId,
    pub due_date: Option<DateTime<Utc>>,
    pub status: InvoiceStatus,
    pub total_amount: u64,
    pub total_paid: u64,
    pub lines: Vec<ChargeLine>,
}

#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
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
        invoice_id: &InvoiceId,
        scope: &Scope,
    ) -> Option<InvoiceReadModel> {
        self.store
            .get(tenant_id, invoice_id)
            .filter(|rm| scope.permits(Some(rm.client_id)))
    }

    /// List read, scope applied as an additional filter predicate.
    pub fn list(&self, tenant_id: TenantId, scope: &Scope) -> Vec<InvoiceReadModel> {
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

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, invoice_id) = match &ev {
            InvoiceEvent::InvoiceIssued(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::PaymentRegistered(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::InvoiceVoided(e) => (e.tenant_id, e.invoice_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if invoice_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event invoice_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    tenant_id,
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        client_id: e.client_id,
                        shipment_id: e.shipment_id,
                        due_date: Some(e.due_date),
                        status: InvoiceStatus::Open,
                        total_amount: e.total_amount,
                        total_paid: 0,
                        lines: e.lines,
                    },
                );
            }
            InvoiceEvent::PaymentRegistered(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.total_paid = e.new_total_paid;
                    if rm.total_paid >= rm.total_amount {
                        rm.status = InvoiceStatus::Paid;
                    }
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
            InvoiceEvent::InvoiceVoided(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.invoice_id) {
                    rm.status = InvoiceStatus::Void;
                    self.store.upsert(tenant_id, e.invoice_id, rm);
                }
            }
        }

        self.cursors.commit(tenant_id, aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cargoflow_core::AggregateId;
    use cargoflow_invoicing::invoice::{InvoiceIssued, PaymentRegistered};
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    fn projection() -> InvoicesProjection<Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>> {
        InvoicesProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn envelope(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        event: &InvoiceEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            AGGREGATE_TYPE,
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn issue_and_pay_reach_paid_status() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let invoice_id = InvoiceId::new(aggregate_id);
        let client_id = ClientId::new();

        p.apply_envelope(&envelope(
            tenant_id,
            aggregate_id,
            1,
            &InvoiceEvent::InvoiceIssued(InvoiceIssued {
                tenant_id,
                invoice_id,
                client_id,
                shipment_id: ShipmentId::new(AggregateId::new()),
                lines: vec![ChargeLine {
                    line_no: 1,
                    description: "ocean freight".to_string(),
                    amount: 120_000,
                }],
                total_amount: 120_000,
                due_date: Utc::now(),
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        p.apply_envelope(&envelope(
            tenant_id,
            aggregate_id,
            2,
            &InvoiceEvent::PaymentRegistered(PaymentRegistered {
                tenant_id,
                invoice_id,
                amount: 120_000,
                new_total_paid: 120_000,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        let rm = p.get(tenant_id, &invoice_id, &Scope::Unrestricted).unwrap();
        assert_eq!(rm.status, InvoiceStatus::Paid);

        // Own-scope filtering applies to invoices like any scoped kind.
        assert!(p.get(tenant_id, &invoice_id, &Scope::OwnedBy(client_id)).is_some());
        assert!(p
            .get(tenant_id, &invoice_id, &Scope::OwnedBy(ClientId::new()))
            .is_none());
    }
}
