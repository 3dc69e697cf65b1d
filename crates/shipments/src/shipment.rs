use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, TenantId};
use cargoflow_events::Event;

use crate::status::ShipmentStatus;
use crate::tracking::{TrackingEventCode, TrackingEventId, status_effect};

/// Shipment identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub AggregateId);

impl ShipmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Shipment.
///
/// Status is mutated in exactly two ways: a direct administrative override
/// while non-terminal, or the tracking projection emitted alongside a
/// recorded tracking event. Both paths go through `handle`/`apply`, so the
/// new status and the triggering event are jointly recoverable from the
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    id: ShipmentId,
    tenant_id: Option<TenantId>,
    client_id: Option<ClientId>,
    reference: String,
    origin: String,
    destination: String,
    status: ShipmentStatus,
    version: u64,
    created: bool,
}

impl Shipment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ShipmentId) -> Self {
        Self {
            id,
            tenant_id: None,
            client_id: None,
            reference: String::new(),
            origin: String::new(),
            destination: String::new(),
            status: ShipmentStatus::Booked,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: BookShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookShipment {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub client_id: ClientId,
    pub reference: String,
    pub origin: String,
    pub destination: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordTrackingEvent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTrackingEvent {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub tracking_event_id: TrackingEventId,
    pub code: TrackingEventCode,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: OverrideStatus (direct administrative update, non-terminal only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideStatus {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub status: ShipmentStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelShipment {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentCommand {
    BookShipment(BookShipment),
    RecordTrackingEvent(RecordTrackingEvent),
    OverrideStatus(OverrideStatus),
    CancelShipment(CancelShipment),
}

/// Event: ShipmentBooked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentBooked {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub client_id: ClientId,
    pub reference: String,
    pub origin: String,
    pub destination: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TrackingEventRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEventRecorded {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub tracking_event_id: TrackingEventId,
    pub code: TrackingEventCode,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusAdvanced. The tracking projection's status effect.
///
/// `caused_by` carries the triggering tracking event id for auditability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAdvanced {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub from: ShipmentStatus,
    pub to: ShipmentStatus,
    pub caused_by: TrackingEventId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusOverridden. Direct administrative status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOverridden {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub from: ShipmentStatus,
    pub to: ShipmentStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCancelled {
    pub tenant_id: TenantId,
    pub shipment_id: ShipmentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentEvent {
    ShipmentBooked(ShipmentBooked),
    TrackingEventRecorded(TrackingEventRecorded),
    StatusAdvanced(StatusAdvanced),
    StatusOverridden(StatusOverridden),
    ShipmentCancelled(ShipmentCancelled),
}

impl Event for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentBooked(_) => "shipments.shipment.booked",
            ShipmentEvent::TrackingEventRecorded(_) => "shipments.shipment.tracking_event_recorded",
            ShipmentEvent::StatusAdvanced(_) => "shipments.shipment.status_advanced",
            ShipmentEvent::StatusOverridden(_) => "shipments.shipment.status_overridden",
            ShipmentEvent::ShipmentCancelled(_) => "shipments.shipment.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ShipmentEvent::ShipmentBooked(e) => e.occurred_at,
            ShipmentEvent::TrackingEventRecorded(e) => e.occurred_at,
            ShipmentEvent::StatusAdvanced(e) => e.occurred_at,
            ShipmentEvent::StatusOverridden(e) => e.occurred_at,
            ShipmentEvent::ShipmentCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Shipment {
    type Command = ShipmentCommand;
    type Event = ShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ShipmentEvent::ShipmentBooked(e) => {
                self.id = e.shipment_id;
                self.tenant_id = Some(e.tenant_id);
                self.client_id = Some(e.client_id);
                self.reference = e.reference.clone();
                self.origin = e.origin.clone();
                self.destination = e.destination.clone();
                self.status = ShipmentStatus::Booked;
                self.created = true;
            }
            ShipmentEvent::TrackingEventRecorded(_) => {
                // The event itself does not move status; a paired
                // StatusAdvanced does, when the code has an effect.
            }
            ShipmentEvent::StatusAdvanced(e) => {
                self.status = e.to;
            }
            ShipmentEvent::StatusOverridden(e) => {
                self.status = e.to;
            }
            ShipmentEvent::ShipmentCancelled(_) => {
                self.status = ShipmentStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ShipmentCommand::BookShipment(cmd) => self.handle_book(cmd),
            ShipmentCommand::RecordTrackingEvent(cmd) => self.handle_record_tracking(cmd),
            ShipmentCommand::OverrideStatus(cmd) => self.handle_override_status(cmd),
            ShipmentCommand::CancelShipment(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Shipment {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_shipment_id(&self, shipment_id: ShipmentId) -> Result<(), DomainError> {
        if self.id != shipment_id {
            return Err(DomainError::invariant("shipment_id mismatch"));
        }
        Ok(())
    }

    fn handle_book(&self, cmd: &BookShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("shipment already exists"));
        }

        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }

        if cmd.origin.trim().is_empty() || cmd.destination.trim().is_empty() {
            return Err(DomainError::validation(
                "origin and destination cannot be empty",
            ));
        }

        Ok(vec![ShipmentEvent::ShipmentBooked(ShipmentBooked {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            client_id: cmd.client_id,
            reference: cmd.reference.trim().to_string(),
            origin: cmd.origin.trim().to_string(),
            destination: cmd.destination.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_tracking(
        &self,
        cmd: &RecordTrackingEvent,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        // The whole write fails on a terminal shipment; the event is never
        // recorded, and the caller gets a domain error rather than a silent
        // no-op.
        if self.status.is_terminal() {
            return Err(DomainError::terminal(format!(
                "cannot record tracking event on {} shipment",
                self.status
            )));
        }

        let mut events = vec![ShipmentEvent::TrackingEventRecorded(TrackingEventRecorded {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            tracking_event_id: cmd.tracking_event_id,
            code: cmd.code,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })];

        if let Some(to) = status_effect(cmd.code) {
            if to != self.status {
                events.push(ShipmentEvent::StatusAdvanced(StatusAdvanced {
                    tenant_id: cmd.tenant_id,
                    shipment_id: cmd.shipment_id,
                    from: self.status,
                    to,
                    caused_by: cmd.tracking_event_id,
                    occurred_at: cmd.occurred_at,
                }));
            }
        }

        Ok(events)
    }

    fn handle_override_status(
        &self,
        cmd: &OverrideStatus,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::terminal(format!(
                "cannot override status of {} shipment",
                self.status
            )));
        }

        if cmd.status == ShipmentStatus::Cancelled {
            return Err(DomainError::validation(
                "use cancellation, not a status override",
            ));
        }

        if cmd.status == self.status {
            return Err(DomainError::invariant("status unchanged"));
        }

        Ok(vec![ShipmentEvent::StatusOverridden(StatusOverridden {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelShipment) -> Result<Vec<ShipmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::terminal(format!(
                "cannot cancel {} shipment",
                self.status
            )));
        }

        Ok(vec![ShipmentEvent::ShipmentCancelled(ShipmentCancelled {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargoflow_core::AggregateId;
    use proptest::prelude::*;

    use crate::tracking::ALL_CODES;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_shipment_id() -> ShipmentId {
        ShipmentId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn booked_shipment(tenant_id: TenantId, shipment_id: ShipmentId) -> Shipment {
        let mut shipment = Shipment::empty(shipment_id);
        let cmd = ShipmentCommand::BookShipment(BookShipment {
            tenant_id,
            shipment_id,
            client_id: ClientId::new(),
            reference: "SHP-1001".to_string(),
            origin: "Karachi".to_string(),
            destination: "Rotterdam".to_string(),
            occurred_at: test_time(),
        });
        for event in shipment.handle(&cmd).unwrap() {
            shipment.apply(&event);
        }
        shipment
    }

    fn record(
        shipment: &mut Shipment,
        tenant_id: TenantId,
        code: TrackingEventCode,
    ) -> Result<Vec<ShipmentEvent>, DomainError> {
        let cmd = ShipmentCommand::RecordTrackingEvent(RecordTrackingEvent {
            tenant_id,
            shipment_id: shipment.id_typed(),
            tracking_event_id: TrackingEventId::new(),
            code,
            note: None,
            occurred_at: test_time(),
        });
        let events = shipment.handle(&cmd)?;
        for event in &events {
            shipment.apply(event);
        }
        Ok(events)
    }

    #[test]
    fn book_shipment_emits_booked_event() {
        let shipment = Shipment::empty(test_shipment_id());
        let tenant_id = test_tenant_id();
        let shipment_id = test_shipment_id();
        let client_id = ClientId::new();

        let cmd = ShipmentCommand::BookShipment(BookShipment {
            tenant_id,
            shipment_id,
            client_id,
            reference: "SHP-2001".to_string(),
            origin: "Shanghai".to_string(),
            destination: "Hamburg".to_string(),
            occurred_at: test_time(),
        });

        let events = shipment.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ShipmentEvent::ShipmentBooked(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.shipment_id, shipment_id);
                assert_eq!(e.client_id, client_id);
            }
            _ => panic!("Expected ShipmentBooked event"),
        }
    }

    #[test]
    fn tracking_event_with_effect_pairs_status_advance_with_trigger() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());

        let events = record(&mut shipment, tenant_id, TrackingEventCode::PickedUp).unwrap();
        assert_eq!(events.len(), 2);

        let ShipmentEvent::TrackingEventRecorded(recorded) = &events[0] else {
            panic!("Expected TrackingEventRecorded event");
        };
        let ShipmentEvent::StatusAdvanced(advanced) = &events[1] else {
            panic!("Expected StatusAdvanced event");
        };

        assert_eq!(advanced.caused_by, recorded.tracking_event_id);
        assert_eq!(advanced.from, ShipmentStatus::Booked);
        assert_eq!(advanced.to, ShipmentStatus::InTransit);
        assert_eq!(shipment.status(), ShipmentStatus::InTransit);
    }

    #[test]
    fn informational_event_leaves_status_unchanged() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());

        let events = record(&mut shipment, tenant_id, TrackingEventCode::Delayed).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ShipmentEvent::TrackingEventRecorded(_)));
        assert_eq!(shipment.status(), ShipmentStatus::Booked);
    }

    #[test]
    fn event_matching_current_status_does_not_re_advance() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());

        record(&mut shipment, tenant_id, TrackingEventCode::PickedUp).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::InTransit);

        // A second in-transit milestone records the event but not a transition.
        let events = record(&mut shipment, tenant_id, TrackingEventCode::VesselDeparted).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(shipment.status(), ShipmentStatus::InTransit);
    }

    #[test]
    fn projection_is_deterministic_for_fixed_prestate_and_code() {
        let tenant_id = test_tenant_id();
        let shipment = booked_shipment(tenant_id, test_shipment_id());

        let cmd = ShipmentCommand::RecordTrackingEvent(RecordTrackingEvent {
            tenant_id,
            shipment_id: shipment.id_typed(),
            tracking_event_id: TrackingEventId::new(),
            code: TrackingEventCode::OrderConfirmed,
            note: None,
            occurred_at: test_time(),
        });

        let first = shipment.handle(&cmd).unwrap();
        let second = shipment.handle(&cmd).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn full_journey_ends_delivered_and_rejects_further_events() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());

        record(&mut shipment, tenant_id, TrackingEventCode::OrderConfirmed).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Confirmed);

        record(&mut shipment, tenant_id, TrackingEventCode::PickedUp).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::InTransit);

        record(&mut shipment, tenant_id, TrackingEventCode::Delivered).unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Delivered);

        let err = record(&mut shipment, tenant_id, TrackingEventCode::Delayed).unwrap_err();
        match err {
            DomainError::TerminalState(msg) => assert!(msg.contains("delivered")),
            _ => panic!("Expected TerminalState error"),
        }
    }

    #[test]
    fn cancelled_shipment_rejects_tracking_and_override() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());

        let cancel = ShipmentCommand::CancelShipment(CancelShipment {
            tenant_id,
            shipment_id: shipment.id_typed(),
            reason: "client request".to_string(),
            occurred_at: test_time(),
        });
        for event in shipment.handle(&cancel).unwrap() {
            shipment.apply(&event);
        }
        assert_eq!(shipment.status(), ShipmentStatus::Cancelled);

        let err = record(&mut shipment, tenant_id, TrackingEventCode::PickedUp).unwrap_err();
        assert!(matches!(err, DomainError::TerminalState(_)));

        let override_cmd = ShipmentCommand::OverrideStatus(OverrideStatus {
            tenant_id,
            shipment_id: shipment.id_typed(),
            status: ShipmentStatus::InTransit,
            occurred_at: test_time(),
        });
        let err = shipment.handle(&override_cmd).unwrap_err();
        assert!(matches!(err, DomainError::TerminalState(_)));
    }

    #[test]
    fn override_status_while_non_terminal() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());

        let cmd = ShipmentCommand::OverrideStatus(OverrideStatus {
            tenant_id,
            shipment_id: shipment.id_typed(),
            status: ShipmentStatus::OnHold,
            occurred_at: test_time(),
        });
        for event in shipment.handle(&cmd).unwrap() {
            shipment.apply(&event);
        }
        assert_eq!(shipment.status(), ShipmentStatus::OnHold);
    }

    #[test]
    fn override_to_cancelled_is_rejected() {
        let tenant_id = test_tenant_id();
        let shipment = booked_shipment(tenant_id, test_shipment_id());

        let cmd = ShipmentCommand::OverrideStatus(OverrideStatus {
            tenant_id,
            shipment_id: shipment.id_typed(),
            status: ShipmentStatus::Cancelled,
            occurred_at: test_time(),
        });
        assert!(matches!(
            shipment.handle(&cmd).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn tenant_mismatch_is_rejected() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());

        let err = record(&mut shipment, test_tenant_id(), TrackingEventCode::PickedUp).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn version_increments_per_applied_event() {
        let tenant_id = test_tenant_id();
        let mut shipment = booked_shipment(tenant_id, test_shipment_id());
        assert_eq!(shipment.version(), 1);

        // PickedUp emits two events (recorded + advanced).
        record(&mut shipment, tenant_id, TrackingEventCode::PickedUp).unwrap();
        assert_eq!(shipment.version(), 3);
    }

    proptest! {
        /// Any sequence of tracking events either keeps the shipment live or
        /// parks it in `delivered`; once terminal, every further record
        /// attempt errors instead of mutating state.
        #[test]
        fn terminal_state_is_absorbing(codes in prop::collection::vec(0..ALL_CODES.len(), 1..25)) {
            let tenant_id = test_tenant_id();
            let mut shipment = booked_shipment(tenant_id, test_shipment_id());
            let mut terminal_seen = false;

            for idx in codes {
                let code = ALL_CODES[idx];
                let result = record(&mut shipment, tenant_id, code);

                if terminal_seen {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(shipment.status(), ShipmentStatus::Delivered);
                } else if shipment.status().is_terminal() {
                    terminal_seen = true;
                    prop_assert_eq!(shipment.status(), ShipmentStatus::Delivered);
                }
            }
        }
    }
}
