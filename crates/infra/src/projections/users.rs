use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value as JsonValue;

use cargoflow_auth::{Permission, RoleName, UserEvent, UserStatus};
use cargoflow_core::{ClientId, TenantId, UserId};
use cargoflow_events::EventEnvelope;

use crate::projections::{ProjectionCursors, ProjectionError};
use crate::read_model::TenantStore;

const AGGREGATE_TYPE: &str = "auth.user";

/// Queryable user record: the per-request principal directory.
///
/// The API middleware reads this once per request and resolves it against
/// the role catalog into an immutable `Principal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
    pub override_grants: BTreeSet<Permission>,
    pub blocked_grants: BTreeSet<Permission>,
    pub owned_client_id: Option<ClientId>,
    pub status: UserStatus,
}

#[derive(Debug)]
pub struct UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    store: S,
    cursors: ProjectionCursors,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: ProjectionCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        self.store.list(tenant_id)
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

        let ev: UserEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, user_id) = match &ev {
            UserEvent::Created(e) => (e.tenant_id, e.user_id),
            UserEvent::RoleChanged(e) => (e.tenant_id, e.user_id),
            UserEvent::OverrideGranted(e) => (e.tenant_id, e.user_id),
            UserEvent::OverrideRevoked(e) => (e.tenant_id, e.user_id),
            UserEvent::GrantBlocked(e) => (e.tenant_id, e.user_id),
            UserEvent::GrantUnblocked(e) => (e.tenant_id, e.user_id),
            UserEvent::Suspended(e) => (e.tenant_id, e.user_id),
            UserEvent::Activated(e) => (e.tenant_id, e.user_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if cargoflow_core::AggregateId::from(user_id) != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event user_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            UserEvent::Created(e) => {
                self.store.upsert(
                    tenant_id,
                    e.user_id,
                    UserReadModel {
                        user_id: e.user_id,
                        email: e.email,
                        display_name: e.display_name,
                        role: e.role,
                        override_grants: BTreeSet::new(),
                        blocked_grants: BTreeSet::new(),
                        owned_client_id: e.owned_client_id,
                        status: UserStatus::Active,
                    },
                );
            }
            UserEvent::RoleChanged(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.role = e.role;
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::OverrideGranted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.override_grants.insert(e.permission);
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::OverrideRevoked(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.override_grants.remove(&e.permission);
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::GrantBlocked(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.blocked_grants.insert(e.permission);
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::GrantUnblocked(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.blocked_grants.remove(&e.permission);
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::Suspended(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.status = UserStatus::Suspended;
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::Activated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.status = UserStatus::Active;
                    self.store.upsert(tenant_id, e.user_id, rm);
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

    use cargoflow_auth::user::{GrantBlocked, UserCreated};
    use cargoflow_core::AggregateId;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    #[test]
    fn created_then_blocked_builds_principal_record() {
        let p = UsersProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let aggregate_id = AggregateId::from(user_id);

        let created = UserEvent::Created(UserCreated {
            tenant_id,
            user_id,
            email: "maria@forwarder.example".to_string(),
            display_name: "Maria".to_string(),
            role: RoleName::new("client"),
            owned_client_id: Some(ClientId::new()),
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            AGGREGATE_TYPE,
            1,
            serde_json::to_value(&created).unwrap(),
        ))
        .unwrap();

        let blocked = UserEvent::GrantBlocked(GrantBlocked {
            tenant_id,
            user_id,
            permission: Permission::TrackingReadOwn,
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            AGGREGATE_TYPE,
            2,
            serde_json::to_value(&blocked).unwrap(),
        ))
        .unwrap();

        let rm = p.get(tenant_id, &user_id).unwrap();
        assert_eq!(rm.role, RoleName::new("client"));
        assert!(rm.blocked_grants.contains(&Permission::TrackingReadOwn));
        assert!(rm.owned_client_id.is_some());
    }
}
