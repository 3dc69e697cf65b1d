//! Read-model projections over the event bus.
//!
//! One projection per queryable surface. Each applies its aggregate type's
//! envelopes idempotently (duplicate deliveries are skipped via per-stream
//! cursors) and exposes `get`/`list` accessors. Accessors for the scoped
//! resource kinds (shipments, tracking, invoices, support) take a
//! [`cargoflow_auth::Scope`]; ownership filtering lives here and nowhere
//! else.

pub mod clients;
pub mod invoices;
pub mod shipments;
pub mod support;
pub mod users;

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use cargoflow_core::{AggregateId, TenantId};

pub use clients::{ClientReadModel, ClientsProjection};
pub use invoices::{InvoiceReadModel, InvoicesProjection};
pub use shipments::{ShipmentReadModel, ShipmentsProjection, TrackingEntry};
pub use support::{SupportTicketReadModel, SupportTicketsProjection};
pub use users::{UserReadModel, UsersProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-stream cursor bookkeeping shared by all projections.
///
/// The bus is at-least-once; `check` returns `Ok(false)` for duplicate
/// deliveries so appliers can skip them, and rejects gaps and zero sequence
/// numbers outright.
#[derive(Debug, Default)]
pub(crate) struct ProjectionCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl ProjectionCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<bool, ProjectionError> {
        let last = match self.inner.read() {
            Ok(cursors) => *cursors.get(&(tenant_id, aggregate_id)).unwrap_or(&0),
            Err(_) => 0,
        };

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub(crate) fn commit(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert((tenant_id, aggregate_id), seq);
        }
    }
}
