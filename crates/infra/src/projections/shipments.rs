use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use cargoflow_auth::Scope;
use cargoflow_core::{ClientId, TenantId};
use cargoflow_events::EventEnvelope;
use cargoflow_shipments::{ShipmentEvent, ShipmentId, ShipmentStatus, TrackingEventCode, TrackingEventId};

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::TenantStore;

const AGGREGATE_TYPE: &str = "shipments.shipment";

/// One recorded tracking event, as shown in shipment detail/tracking reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingEntry {
    pub tracking_event_id: TrackingEventId,
    pub code: TrackingEventCode,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Queryable shipment read model (header + tracking history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentReadModel {
    pub shipment_id: ShipmentId,
    pub client_id: ClientId,
    pub reference: String,
    pub origin: String,
    pub destination: String,
    pub status: ShipmentStatus,
    pub tracking: Vec<TrackingEntry>,
}

#[derive(Debug)]
pub struct ShipmentsProjection<S>
where
    S: TenantStore<ShipmentId, ShipmentReadModel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> ShipmentsProjection<S>
where
    S: TenantStore<ShipmentId, ShipmentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: ProjectionCursors::new(),
        }
    }

    /// Detail read, scope applied. A record hidden by scope reads as absent,
    /// so callers answer 404 and existence is not leaked.
    pub fn get(
        &self,
        tenant_id: TenantId,
        shipment_id: &ShipmentId,
        scope: &Scope,
    ) -> Option<ShipmentReadModel> {
        self.store
            .get(tenant_id, shipment_id)
            .filter(|rm| scope.permits(Some(rm.client_id)))
    }

    /// List read, scope applied as an additional filter predicate.
    pub fn list(&self, tenant_id: TenantId, scope: &Scope) -> Vec<ShipmentReadModel> {
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

        let ev: ShipmentEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, event_shipment) = match &ev {
            ShipmentEvent::ShipmentBooked(e) => (e.tenant_id, e.shipment_id),
            ShipmentEvent::TrackingEventRecorded(e) => (e.tenant_id, e.shipment_id),
            ShipmentEvent::StatusAdvanced(e) => (e.tenant_id, e.shipment_id),
            ShipmentEvent::StatusOverridden(e) => (e.tenant_id, e.shipment_id),
            ShipmentEvent::ShipmentCancelled(e) => (e.tenant_id, e.shipment_id),
        };
        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if event_shipment.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event shipment_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ShipmentEvent::ShipmentBooked(e) => {
                self.store.upsert(
                    tenant_id,
                    e.shipment_id,
                    ShipmentReadModel {
                        shipment_id: e.shipment_id,
                        client_id: e.client_id,
                        reference: e.reference,
                        origin: e.origin,
                        destination: e.destination,
                        status: ShipmentStatus::Booked,
                        tracking: Vec::new(),
                    },
                );
            }
            ShipmentEvent::TrackingEventRecorded(e) => {
                let Some(mut rm) = self.store.get(tenant_id, &e.shipment_id) else {
                    tracing::warn!(shipment_id = %e.shipment_id, "tracking event for unknown shipment; skipping");
                    self.cursors.commit(tenant_id, aggregate_id, seq);
                    return Ok(());
                };
                rm.tracking.push(TrackingEntry {
                    tracking_event_id: e.tracking_event_id,
                    code: e.code,
                    note: e.note,
                    occurred_at: e.occurred_at,
                });
                self.store.upsert(tenant_id, e.shipment_id, rm);
            }
            ShipmentEvent::StatusAdvanced(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.shipment_id) {
                    rm.status = e.to;
                    self.store.upsert(tenant_id, e.shipment_id, rm);
                }
            }
            ShipmentEvent::StatusOverridden(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.shipment_id) {
                    rm.status = e.to;
                    self.store.upsert(tenant_id, e.shipment_id, rm);
                }
            }
            ShipmentEvent::ShipmentCancelled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.shipment_id) {
                    rm.status = ShipmentStatus::Cancelled;
                    self.store.upsert(tenant_id, e.shipment_id, rm);
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
    use cargoflow_shipments::shipment::{ShipmentBooked, StatusAdvanced, TrackingEventRecorded};
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    fn projection() -> ShipmentsProjection<Arc<InMemoryTenantStore<ShipmentId, ShipmentReadModel>>> {
        ShipmentsProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn envelope(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        event: &ShipmentEvent,
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

    fn booked_event(tenant_id: TenantId, shipment_id: ShipmentId, client_id: ClientId) -> ShipmentEvent {
        ShipmentEvent::ShipmentBooked(ShipmentBooked {
            tenant_id,
            shipment_id,
            client_id,
            reference: "SHP-5001".to_string(),
            origin: "Karachi".to_string(),
            destination: "Rotterdam".to_string(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn booked_then_tracked_builds_read_model() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let shipment_id = ShipmentId::new(aggregate_id);
        let client_id = ClientId::new();

        p.apply_envelope(&envelope(
            tenant_id,
            aggregate_id,
            1,
            &booked_event(tenant_id, shipment_id, client_id),
        ))
        .unwrap();

        let tracking_event_id = TrackingEventId::new();
        p.apply_envelope(&envelope(
            tenant_id,
            aggregate_id,
            2,
            &ShipmentEvent::TrackingEventRecorded(TrackingEventRecorded {
                tenant_id,
                shipment_id,
                tracking_event_id,
                code: TrackingEventCode::PickedUp,
                note: None,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        p.apply_envelope(&envelope(
            tenant_id,
            aggregate_id,
            3,
            &ShipmentEvent::StatusAdvanced(StatusAdvanced {
                tenant_id,
                shipment_id,
                from: ShipmentStatus::Booked,
                to: ShipmentStatus::InTransit,
                caused_by: tracking_event_id,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        let rm = p
            .get(tenant_id, &shipment_id, &Scope::Unrestricted)
            .unwrap();
        assert_eq!(rm.status, ShipmentStatus::InTransit);
        assert_eq!(rm.tracking.len(), 1);
        assert_eq!(rm.tracking[0].tracking_event_id, tracking_event_id);
    }

    #[test]
    fn scope_hides_foreign_records() {
        let p = projection();
        let tenant_id = TenantId::new();
        let own_client = ClientId::new();
        let other_client = ClientId::new();

        let own_agg = AggregateId::new();
        let own_id = ShipmentId::new(own_agg);
        p.apply_envelope(&envelope(
            tenant_id,
            own_agg,
            1,
            &booked_event(tenant_id, own_id, own_client),
        ))
        .unwrap();

        let other_agg = AggregateId::new();
        let other_id = ShipmentId::new(other_agg);
        p.apply_envelope(&envelope(
            tenant_id,
            other_agg,
            1,
            &booked_event(tenant_id, other_id, other_client),
        ))
        .unwrap();

        let scope = Scope::OwnedBy(own_client);
        let listed = p.list(tenant_id, &scope);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].client_id, own_client);

        assert!(p.get(tenant_id, &own_id, &scope).is_some());
        // Foreign detail read is indistinguishable from a missing record.
        assert!(p.get(tenant_id, &other_id, &scope).is_none());

        assert_eq!(p.list(tenant_id, &Scope::Unrestricted).len(), 2);
    }

    #[test]
    fn duplicate_envelope_is_idempotent() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let shipment_id = ShipmentId::new(aggregate_id);

        let booked = booked_event(tenant_id, shipment_id, ClientId::new());
        let env = envelope(tenant_id, aggregate_id, 1, &booked);
        p.apply_envelope(&env).unwrap();
        p.apply_envelope(&env).unwrap();

        assert_eq!(p.list(tenant_id, &Scope::Unrestricted).len(), 1);
    }
}
