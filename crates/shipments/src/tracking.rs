//! Tracking event vocabulary and its projection onto the shipment lifecycle.
//!
//! Carriers report far more detail than the lifecycle needs. `status_effect`
//! is the single, fixed table folding the fine-grained vocabulary onto
//! [`ShipmentStatus`]; codes with no listed effect are informational and
//! leave the status unchanged. The table is consulted by the `Shipment`
//! aggregate when a tracking event is recorded, never by a save hook or a
//! background recomputation.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::ShipmentStatus;

/// Identifier of a recorded tracking event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingEventId(Uuid);

impl TrackingEventId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TrackingEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for TrackingEventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TrackingEventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Fine-grained tracking event vocabulary (what carriers report).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingEventCode {
    OrderConfirmed,
    PickedUp,
    AtOriginPort,
    VesselDeparted,
    VesselArrived,
    AtDestinationPort,
    OutForDelivery,
    CustomsHold,
    CustomsInspection,
    Delivered,
    DeliveryFailed,
    ShipmentDamaged,
    Delayed,
    ScheduleChanged,
}

/// Every known tracking event code (listing order).
pub const ALL_CODES: &[TrackingEventCode] = &[
    TrackingEventCode::OrderConfirmed,
    TrackingEventCode::PickedUp,
    TrackingEventCode::AtOriginPort,
    TrackingEventCode::VesselDeparted,
    TrackingEventCode::VesselArrived,
    TrackingEventCode::AtDestinationPort,
    TrackingEventCode::OutForDelivery,
    TrackingEventCode::CustomsHold,
    TrackingEventCode::CustomsInspection,
    TrackingEventCode::Delivered,
    TrackingEventCode::DeliveryFailed,
    TrackingEventCode::ShipmentDamaged,
    TrackingEventCode::Delayed,
    TrackingEventCode::ScheduleChanged,
];

impl TrackingEventCode {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingEventCode::OrderConfirmed => "order_confirmed",
            TrackingEventCode::PickedUp => "picked_up",
            TrackingEventCode::AtOriginPort => "at_origin_port",
            TrackingEventCode::VesselDeparted => "vessel_departed",
            TrackingEventCode::VesselArrived => "vessel_arrived",
            TrackingEventCode::AtDestinationPort => "at_destination_port",
            TrackingEventCode::OutForDelivery => "out_for_delivery",
            TrackingEventCode::CustomsHold => "customs_hold",
            TrackingEventCode::CustomsInspection => "customs_inspection",
            TrackingEventCode::Delivered => "delivered",
            TrackingEventCode::DeliveryFailed => "delivery_failed",
            TrackingEventCode::ShipmentDamaged => "shipment_damaged",
            TrackingEventCode::Delayed => "delayed",
            TrackingEventCode::ScheduleChanged => "schedule_changed",
        }
    }
}

impl core::fmt::Display for TrackingEventCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed status projection table.
///
/// Total over the vocabulary: `None` means the code is informational and the
/// shipment status stays as it is. Deterministic: the same (pre-state, code)
/// pair always yields the same target, so retried projections converge.
pub fn status_effect(code: TrackingEventCode) -> Option<ShipmentStatus> {
    use TrackingEventCode::*;

    match code {
        OrderConfirmed => Some(ShipmentStatus::Confirmed),
        PickedUp | AtOriginPort | VesselDeparted | VesselArrived | AtDestinationPort
        | OutForDelivery => Some(ShipmentStatus::InTransit),
        CustomsHold | CustomsInspection => Some(ShipmentStatus::Customs),
        Delivered => Some(ShipmentStatus::Delivered),
        DeliveryFailed | ShipmentDamaged => Some(ShipmentStatus::OnHold),
        Delayed | ScheduleChanged => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_milestones_map_to_confirmed_or_in_transit() {
        assert_eq!(
            status_effect(TrackingEventCode::OrderConfirmed),
            Some(ShipmentStatus::Confirmed)
        );
        assert_eq!(
            status_effect(TrackingEventCode::PickedUp),
            Some(ShipmentStatus::InTransit)
        );
        assert_eq!(
            status_effect(TrackingEventCode::AtDestinationPort),
            Some(ShipmentStatus::InTransit)
        );
    }

    #[test]
    fn customs_events_map_to_customs() {
        assert_eq!(
            status_effect(TrackingEventCode::CustomsHold),
            Some(ShipmentStatus::Customs)
        );
        assert_eq!(
            status_effect(TrackingEventCode::CustomsInspection),
            Some(ShipmentStatus::Customs)
        );
    }

    #[test]
    fn exceptions_map_to_on_hold_and_delivery_is_final() {
        assert_eq!(
            status_effect(TrackingEventCode::DeliveryFailed),
            Some(ShipmentStatus::OnHold)
        );
        assert_eq!(
            status_effect(TrackingEventCode::ShipmentDamaged),
            Some(ShipmentStatus::OnHold)
        );
        assert_eq!(
            status_effect(TrackingEventCode::Delivered),
            Some(ShipmentStatus::Delivered)
        );
    }

    #[test]
    fn delay_events_are_informational_only() {
        assert_eq!(status_effect(TrackingEventCode::Delayed), None);
        assert_eq!(status_effect(TrackingEventCode::ScheduleChanged), None);
    }

    #[test]
    fn effect_table_never_targets_cancelled() {
        // Cancellation is an administrative decision, not a carrier report.
        for &code in ALL_CODES {
            assert_ne!(status_effect(code), Some(ShipmentStatus::Cancelled));
        }
    }

    #[test]
    fn code_serde_uses_snake_case() {
        let json = serde_json::to_string(&TrackingEventCode::AtOriginPort).unwrap();
        assert_eq!(json, "\"at_origin_port\"");
    }
}
