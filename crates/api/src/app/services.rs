//! Infrastructure wiring for the HTTP app (in-memory store/bus/projections).

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use cargoflow_auth::{RoleCatalog, RoleName, User, UserCommand, user::CreateUser};
use cargoflow_core::{AggregateId, ClientId, DomainError, TenantId, UserId};
use cargoflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
use cargoflow_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{EventStore, InMemoryEventStore, StoredEvent},
    projections::{
        ClientReadModel, ClientsProjection, InvoiceReadModel, InvoicesProjection,
        ShipmentReadModel, ShipmentsProjection, SupportTicketReadModel, SupportTicketsProjection,
        UserReadModel, UsersProjection,
    },
    read_model::InMemoryTenantStore,
    tracking_intake::TrackingIntake,
};
use cargoflow_invoicing::InvoiceId;
use cargoflow_shipments::{ShipmentId, TrackingEventCode};
use cargoflow_support::TicketId;

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;

pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    event_store: Arc<InMemoryEventStore>,
    tracking: TrackingIntake<Arc<InMemoryEventStore>, Arc<Bus>>,
    shipments: Arc<ShipmentsProjection<Arc<InMemoryTenantStore<ShipmentId, ShipmentReadModel>>>>,
    invoices: Arc<InvoicesProjection<Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>>>,
    support: Arc<SupportTicketsProjection<Arc<InMemoryTenantStore<TicketId, SupportTicketReadModel>>>>,
    clients: Arc<ClientsProjection<Arc<InMemoryTenantStore<ClientId, ClientReadModel>>>>,
    users: Arc<UsersProjection<Arc<InMemoryTenantStore<UserId, UserReadModel>>>>,
    catalog: Arc<RwLock<RoleCatalog>>,
}

pub fn build_services() -> AppServices {
    // In-memory infra wiring (dev/test): store + bus + projections.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());

    let shipments_store: Arc<InMemoryTenantStore<ShipmentId, ShipmentReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let shipments: Arc<ShipmentsProjection<_>> = Arc::new(ShipmentsProjection::new(shipments_store));

    let invoices_store: Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let invoices: Arc<InvoicesProjection<_>> = Arc::new(InvoicesProjection::new(invoices_store));

    let support_store: Arc<InMemoryTenantStore<TicketId, SupportTicketReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let support: Arc<SupportTicketsProjection<_>> =
        Arc::new(SupportTicketsProjection::new(support_store));

    let clients_store: Arc<InMemoryTenantStore<ClientId, ClientReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let clients: Arc<ClientsProjection<_>> = Arc::new(ClientsProjection::new(clients_store));

    let users_store: Arc<InMemoryTenantStore<UserId, UserReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let users: Arc<UsersProjection<_>> = Arc::new(UsersProjection::new(users_store));

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let shipments = shipments.clone();
        let invoices = invoices.clone();
        let support = support.clone();
        let clients = clients.clone();
        let users = users.clone();
        tokio::task::spawn_blocking(move || loop {
            match sub.recv() {
                Ok(env) => {
                    let apply_ok = match env.aggregate_type() {
                        "shipments.shipment" => shipments.apply_envelope(&env).map_err(|e| e.to_string()),
                        "invoicing.invoice" => invoices.apply_envelope(&env).map_err(|e| e.to_string()),
                        "support.ticket" => support.apply_envelope(&env).map_err(|e| e.to_string()),
                        "clients.client" => clients.apply_envelope(&env).map_err(|e| e.to_string()),
                        "auth.user" => users.apply_envelope(&env).map_err(|e| e.to_string()),
                        _ => Ok(()),
                    };

                    if let Err(e) = apply_ok {
                        tracing::warn!("projection apply failed: {e}");
                    }
                }
                Err(_) => break,
            }
        });
    }

    let dispatcher: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(store.clone(), bus));
    let tracking = TrackingIntake::new(dispatcher.clone());

    AppServices {
        dispatcher,
        event_store: store,
        tracking,
        shipments,
        invoices,
        support,
        clients,
        users,
        catalog: Arc::new(RwLock::new(RoleCatalog::builtin())),
    }
}

impl AppServices {
    pub fn role_catalog(&self) -> &Arc<RwLock<RoleCatalog>> {
        &self.catalog
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: cargoflow_core::Aggregate<Error = DomainError>,
        A::Event: cargoflow_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    /// Record a tracking event (status projection + bounded conflict retry).
    pub fn record_tracking_event(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
        code: TrackingEventCode,
        note: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.tracking
            .record(tenant_id, shipment_id, code, note, occurred_at)
    }

    /// Raw stored stream for a shipment (audit/history reads).
    pub fn shipment_history(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<Vec<StoredEvent>, cargoflow_infra::event_store::EventStoreError> {
        self.event_store.load_stream(tenant_id, shipment_id.0)
    }

    pub fn shipments_get(
        &self,
        tenant_id: TenantId,
        shipment_id: &ShipmentId,
        scope: &cargoflow_auth::Scope,
    ) -> Option<ShipmentReadModel> {
        self.shipments.get(tenant_id, shipment_id, scope)
    }

    pub fn shipments_list(
        &self,
        tenant_id: TenantId,
        scope: &cargoflow_auth::Scope,
    ) -> Vec<ShipmentReadModel> {
        self.shipments.list(tenant_id, scope)
    }

    pub fn invoices_get(
        &self,
        tenant_id: TenantId,
        invoice_id: &InvoiceId,
        scope: &cargoflow_auth::Scope,
    ) -> Option<InvoiceReadModel> {
        self.invoices.get(tenant_id, invoice_id, scope)
    }

    pub fn invoices_list(
        &self,
        tenant_id: TenantId,
        scope: &cargoflow_auth::Scope,
    ) -> Vec<InvoiceReadModel> {
        self.invoices.list(tenant_id, scope)
    }

    pub fn support_get(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
        scope: &cargoflow_auth::Scope,
    ) -> Option<SupportTicketReadModel> {
        self.support.get(tenant_id, ticket_id, scope)
    }

    pub fn support_list(
        &self,
        tenant_id: TenantId,
        scope: &cargoflow_auth::Scope,
    ) -> Vec<SupportTicketReadModel> {
        self.support.list(tenant_id, scope)
    }

    pub fn clients_get(&self, tenant_id: TenantId, client_id: &ClientId) -> Option<ClientReadModel> {
        self.clients.get(tenant_id, client_id)
    }

    pub fn clients_list(&self, tenant_id: TenantId) -> Vec<ClientReadModel> {
        self.clients.list(tenant_id)
    }

    pub fn users_get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.users.get(tenant_id, user_id)
    }

    pub fn users_list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        self.users.list(tenant_id)
    }

    /// Seed the first admin user for a tenant (dev bootstrap and tests).
    ///
    /// Everything else is provisioned through the HTTP surface by that admin.
    pub fn bootstrap_admin(
        &self,
        tenant_id: TenantId,
        email: &str,
        display_name: &str,
    ) -> Result<UserId, DispatchError> {
        let user_id = UserId::new();
        let cmd = UserCommand::Create(CreateUser {
            tenant_id,
            user_id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            role: RoleName::new("admin"),
            owned_client_id: None,
            occurred_at: Utc::now(),
        });

        self.dispatch::<User>(
            tenant_id,
            AggregateId::from(user_id),
            "auth.user",
            cmd,
            |_t, id| User::empty(id.into()),
        )?;

        Ok(user_id)
    }
}
