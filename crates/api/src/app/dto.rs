//! Request DTOs and JSON mapping helpers.
//!
//! Read models serialize straight to JSON; only mutation payloads need
//! dedicated shapes here.

use serde::Deserialize;

use cargoflow_auth::{Permission, RoleName, UserType};
use cargoflow_shipments::{ShipmentStatus, TrackingEventCode};

#[derive(Debug, Deserialize)]
pub struct BookShipmentRequest {
    pub client_id: String,
    pub reference: String,
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordTrackingEventRequest {
    pub code: TrackingEventCode,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideStatusRequest {
    pub status: ShipmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelShipmentRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ChargeLineRequest {
    pub description: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceRequest {
    pub client_id: String,
    pub shipment_id: String,
    pub due_date: String,
    pub lines: Vec<ChargeLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPaymentRequest {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct OpenTicketRequest {
    /// Required for staff callers; ignored for client principals, whose own
    /// client is used.
    pub client_id: Option<String>,
    pub subject: String,
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyTicketRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub owned_client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub permission: Permission,
}

#[derive(Debug, Deserialize)]
pub struct SuspendUserRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DefineRoleRequest {
    pub name: String,
    pub user_type: UserType,
    pub permissions: Vec<Permission>,
}

impl DefineRoleRequest {
    pub fn role_name(&self) -> RoleName {
        RoleName::new(self.name.clone())
    }
}
