//! `cargoflow-shipments` — shipment lifecycle and tracking status projection.

pub mod shipment;
pub mod status;
pub mod tracking;

pub use shipment::{
    BookShipment, CancelShipment, OverrideStatus, RecordTrackingEvent, Shipment, ShipmentCommand,
    ShipmentEvent, ShipmentId,
};
pub use status::ShipmentStatus;
pub use tracking::{TrackingEventCode, TrackingEventId, status_effect};
