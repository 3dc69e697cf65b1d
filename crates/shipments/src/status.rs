use serde::{Deserialize, Serialize};

/// Shipment status lifecycle.
///
/// A deliberately coarse set of states: the tracking event vocabulary is much
/// larger, and `tracking::status_effect` folds it onto these. `Delivered` and
/// `Cancelled` are terminal: no further mutation or tracking-driven
/// transition is permitted once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Booked,
    Confirmed,
    InTransit,
    Customs,
    OnHold,
    Delivered,
    Cancelled,
}

impl ShipmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Booked => "booked",
            ShipmentStatus::Confirmed => "confirmed",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Customs => "customs",
            ShipmentStatus::OnHold => "on_hold",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
