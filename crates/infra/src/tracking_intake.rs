//! Tracking event intake.
//!
//! Recording a tracking event and projecting the shipment status are one
//! write: the `Shipment` aggregate decides both events and the store appends
//! them atomically under an exact expected version. Two events racing on the
//! same shipment therefore cannot both project against the same stale
//! status: the loser's append fails with a concurrency error, and this
//! service retries it against freshly loaded state a bounded number of
//! times before surfacing the conflict as transient.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use cargoflow_core::TenantId;
use cargoflow_events::{EventBus, EventEnvelope};
use cargoflow_shipments::{
    RecordTrackingEvent, Shipment, ShipmentCommand, ShipmentId, TrackingEventCode, TrackingEventId,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Intake service for carrier tracking events.
pub struct TrackingIntake<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    max_attempts: u32,
}

impl<S, B> TrackingIntake<S, B> {
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self {
            dispatcher,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

impl<S, B> TrackingIntake<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Record a tracking event against a shipment, projecting its status as
    /// part of the same write.
    ///
    /// The tracking event id is fixed up front, so retried attempts commit
    /// the same identity and the status/trigger pairing in history stays
    /// stable. A terminal shipment fails the whole write; the event is not
    /// recorded.
    pub fn record(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
        code: TrackingEventCode,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let tracking_event_id = TrackingEventId::new();

        let mut attempt = 0;
        loop {
            attempt += 1;

            let command = ShipmentCommand::RecordTrackingEvent(RecordTrackingEvent {
                tenant_id,
                shipment_id,
                tracking_event_id,
                code,
                note: note.clone(),
                occurred_at,
            });

            match self.dispatcher.dispatch::<Shipment>(
                tenant_id,
                shipment_id.0,
                "shipments.shipment",
                command,
                |_tenant, id| Shipment::empty(ShipmentId::new(id)),
            ) {
                Err(DispatchError::Concurrency(msg)) if attempt < self.max_attempts => {
                    tracing::debug!(
                        %shipment_id,
                        attempt,
                        "concurrent status update, re-projecting against fresh state: {msg}"
                    );
                }
                Err(DispatchError::Concurrency(msg)) => {
                    tracing::warn!(
                        %shipment_id,
                        attempts = attempt,
                        "status projection conflict not resolved within retry limit"
                    );
                    return Err(DispatchError::Concurrency(msg));
                }
                other => return other,
            }
        }
    }
}
