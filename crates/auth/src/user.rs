//! User aggregate: the durable record behind principal loading.
//!
//! A user names a role, carries explicit override/blocked grant lists and
//! (for client-type principals) the client it belongs to. The principal
//! loader reads this record once per request and resolves it against the
//! role catalog into an immutable [`crate::Principal`].
//!
//! # Invariants
//! - A user belongs to exactly one tenant (tenant_id is immutable after creation).
//! - Suspended users cannot receive role or grant edits.
//! - Users cannot edit their own role or grants (no self-service escalation).
//! - An override grant can only be handed out by an actor who holds that
//!   permission themselves (wildcard counts).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateRoot, ClientId, DomainError, TenantId, UserId};
use cargoflow_events::Event;

use crate::{Permission, RoleName};

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UserStatus {
    /// User is active and can authenticate/transact.
    #[default]
    Active,
    /// User is suspended and cannot authenticate.
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Aggregate root: User.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub role: Option<RoleName>,
    pub override_grants: BTreeSet<Permission>,
    pub blocked_grants: BTreeSet<Permission>,
    pub owned_client_id: Option<ClientId>,
    pub status: UserStatus,
    pub version: u64,
    pub created: bool,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: UserId::new(),
            tenant_id: None,
            email: String::new(),
            display_name: String::new(),
            role: None,
            override_grants: BTreeSet::new(),
            blocked_grants: BTreeSet::new(),
            owned_client_id: None,
            status: UserStatus::Active,
            version: 0,
            created: false,
        }
    }
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_not_suspended(&self) -> Result<(), DomainError> {
        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user is suspended"));
        }
        Ok(())
    }

    fn ensure_not_self(&self, actor_id: UserId) -> Result<(), DomainError> {
        if actor_id == self.id {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
    pub owned_client_id: Option<ClientId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to change a user's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: RoleName,
    /// The user performing this operation (self-edits are rejected).
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to add an explicit override grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantOverride {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub actor_id: UserId,
    /// Effective permissions of the actor (escalation check: you can only
    /// hand out what you hold yourself).
    pub actor_grants: Vec<Permission>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to remove an override grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeOverride {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to explicitly block a permission for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockGrant {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

/// Command to lift an explicit block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnblockGrant {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

/// Command to suspend a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to activate a suspended user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// All user commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Create(CreateUser),
    ChangeRole(ChangeRole),
    GrantOverride(GrantOverride),
    RevokeOverride(RevokeOverride),
    BlockGrant(BlockGrant),
    UnblockGrant(UnblockGrant),
    Suspend(SuspendUser),
    Activate(ActivateUser),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
    pub owned_client_id: Option<ClientId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChanged {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: RoleName,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideGranted {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRevoked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantBlocked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantUnblocked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub permission: Permission,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSuspended {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// All user events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserEvent {
    Created(UserCreated),
    RoleChanged(RoleChanged),
    OverrideGranted(OverrideGranted),
    OverrideRevoked(OverrideRevoked),
    GrantBlocked(GrantBlocked),
    GrantUnblocked(GrantUnblocked),
    Suspended(UserSuspended),
    Activated(UserActivated),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "auth.user.created",
            UserEvent::RoleChanged(_) => "auth.user.role_changed",
            UserEvent::OverrideGranted(_) => "auth.user.override_granted",
            UserEvent::OverrideRevoked(_) => "auth.user.override_revoked",
            UserEvent::GrantBlocked(_) => "auth.user.grant_blocked",
            UserEvent::GrantUnblocked(_) => "auth.user.grant_unblocked",
            UserEvent::Suspended(_) => "auth.user.suspended",
            UserEvent::Activated(_) => "auth.user.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Created(e) => e.occurred_at,
            UserEvent::RoleChanged(e) => e.occurred_at,
            UserEvent::OverrideGranted(e) => e.occurred_at,
            UserEvent::OverrideRevoked(e) => e.occurred_at,
            UserEvent::GrantBlocked(e) => e.occurred_at,
            UserEvent::GrantUnblocked(e) => e.occurred_at,
            UserEvent::Suspended(e) => e.occurred_at,
            UserEvent::Activated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Created(e) => self.apply_created(e),
            UserEvent::RoleChanged(e) => self.role = Some(e.role.clone()),
            UserEvent::OverrideGranted(e) => {
                self.override_grants.insert(e.permission);
            }
            UserEvent::OverrideRevoked(e) => {
                self.override_grants.remove(&e.permission);
            }
            UserEvent::GrantBlocked(e) => {
                self.blocked_grants.insert(e.permission);
            }
            UserEvent::GrantUnblocked(e) => {
                self.blocked_grants.remove(&e.permission);
            }
            UserEvent::Suspended(_) => self.status = UserStatus::Suspended,
            UserEvent::Activated(_) => self.status = UserStatus::Active,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Create(cmd) => self.handle_create(cmd),
            UserCommand::ChangeRole(cmd) => self.handle_change_role(cmd),
            UserCommand::GrantOverride(cmd) => self.handle_grant_override(cmd),
            UserCommand::RevokeOverride(cmd) => self.handle_revoke_override(cmd),
            UserCommand::BlockGrant(cmd) => self.handle_block_grant(cmd),
            UserCommand::UnblockGrant(cmd) => self.handle_unblock_grant(cmd),
            UserCommand::Suspend(cmd) => self.handle_suspend(cmd),
            UserCommand::Activate(cmd) => self.handle_activate(cmd),
        }
    }
}

impl User {
    fn handle_create(&self, cmd: &CreateUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invariant("user already exists"));
        }

        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        if cmd.role.as_str().trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }

        Ok(vec![UserEvent::Created(UserCreated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            email: cmd.email.trim().to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            role: cmd.role.clone(),
            owned_client_id: cmd.owned_client_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_role(&self, cmd: &ChangeRole) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_not_suspended()?;
        self.ensure_not_self(cmd.actor_id)?;

        if self.role.as_ref() == Some(&cmd.role) {
            return Err(DomainError::invariant("role already assigned"));
        }

        Ok(vec![UserEvent::RoleChanged(RoleChanged {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_grant_override(&self, cmd: &GrantOverride) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_not_suspended()?;
        self.ensure_not_self(cmd.actor_id)?;

        if self.override_grants.contains(&cmd.permission) {
            return Err(DomainError::invariant("permission already overridden"));
        }

        // Escalation check: the actor must hold the permission being handed out.
        let actor_holds = cmd
            .actor_grants
            .iter()
            .any(|p| p.is_wildcard() || *p == cmd.permission);
        if !actor_holds {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![UserEvent::OverrideGranted(OverrideGranted {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            permission: cmd.permission,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke_override(&self, cmd: &RevokeOverride) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_not_self(cmd.actor_id)?;

        if !self.override_grants.contains(&cmd.permission) {
            return Err(DomainError::invariant("permission not overridden"));
        }

        Ok(vec![UserEvent::OverrideRevoked(OverrideRevoked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            permission: cmd.permission,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_block_grant(&self, cmd: &BlockGrant) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if self.blocked_grants.contains(&cmd.permission) {
            return Err(DomainError::invariant("permission already blocked"));
        }

        Ok(vec![UserEvent::GrantBlocked(GrantBlocked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            permission: cmd.permission,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_unblock_grant(&self, cmd: &UnblockGrant) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if !self.blocked_grants.contains(&cmd.permission) {
            return Err(DomainError::invariant("permission not blocked"));
        }

        Ok(vec![UserEvent::GrantUnblocked(GrantUnblocked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            permission: cmd.permission,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user already suspended"));
        }

        Ok(vec![UserEvent::Suspended(UserSuspended {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == UserStatus::Active {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Activated(UserActivated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn apply_created(&mut self, e: &UserCreated) {
        self.id = e.user_id;
        self.tenant_id = Some(e.tenant_id);
        self.email = e.email.clone();
        self.display_name = e.display_name.clone();
        self.role = Some(e.role.clone());
        self.owned_client_id = e.owned_client_id;
        self.status = UserStatus::Active;
        self.created = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_user(tenant_id: TenantId, user_id: UserId, role: &str) -> User {
        let mut user = User::empty(user_id);
        let cmd = UserCommand::Create(CreateUser {
            tenant_id,
            user_id,
            email: "alice@example.com".to_string(),
            display_name: "Alice Smith".to_string(),
            role: RoleName::new(role.to_string()),
            owned_client_id: None,
            occurred_at: now(),
        });
        for event in user.handle(&cmd).unwrap() {
            user.apply(&event);
        }
        user
    }

    #[test]
    fn create_user_success() {
        let user = created_user(TenantId::new(), UserId::new(), "operations");
        assert!(user.created);
        assert_eq!(user.role, Some(RoleName::new("operations")));
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.status, UserStatus::Active);
    }

    #[test]
    fn create_user_invalid_email() {
        let user = User::empty(UserId::new());
        let cmd = UserCommand::Create(CreateUser {
            tenant_id: TenantId::new(),
            user_id: user.id,
            email: "invalid-email".to_string(),
            display_name: "Alice".to_string(),
            role: RoleName::new("client"),
            owned_client_id: None,
            occurred_at: now(),
        });
        assert!(user.handle(&cmd).is_err());
    }

    #[test]
    fn change_role_by_other_actor() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = created_user(tenant_id, user_id, "client");

        let cmd = UserCommand::ChangeRole(ChangeRole {
            tenant_id,
            user_id,
            role: RoleName::new("operations"),
            actor_id: UserId::new(),
            occurred_at: now(),
        });
        for event in user.handle(&cmd).unwrap() {
            user.apply(&event);
        }

        assert_eq!(user.role, Some(RoleName::new("operations")));
    }

    #[test]
    fn self_role_change_is_rejected() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let user = created_user(tenant_id, user_id, "client");

        let cmd = UserCommand::ChangeRole(ChangeRole {
            tenant_id,
            user_id,
            role: RoleName::new("admin"),
            actor_id: user_id,
            occurred_at: now(),
        });
        assert!(matches!(
            user.handle(&cmd).unwrap_err(),
            DomainError::Unauthorized
        ));
    }

    #[test]
    fn override_grant_requires_actor_to_hold_the_permission() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let user = created_user(tenant_id, user_id, "client");

        let denied = UserCommand::GrantOverride(GrantOverride {
            tenant_id,
            user_id,
            permission: Permission::InvoicesWrite,
            actor_id: UserId::new(),
            actor_grants: vec![Permission::InvoicesRead],
            occurred_at: now(),
        });
        assert!(matches!(
            user.handle(&denied).unwrap_err(),
            DomainError::Unauthorized
        ));

        let allowed = UserCommand::GrantOverride(GrantOverride {
            tenant_id,
            user_id,
            permission: Permission::InvoicesWrite,
            actor_id: UserId::new(),
            actor_grants: vec![Permission::Wildcard],
            occurred_at: now(),
        });
        let events = user.handle(&allowed).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn block_and_unblock_grant() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = created_user(tenant_id, user_id, "client");

        let block = UserCommand::BlockGrant(BlockGrant {
            tenant_id,
            user_id,
            permission: Permission::TrackingReadOwn,
            occurred_at: now(),
        });
        for event in user.handle(&block).unwrap() {
            user.apply(&event);
        }
        assert!(user.blocked_grants.contains(&Permission::TrackingReadOwn));

        // Blocking twice is an invariant violation.
        assert!(user.handle(&block).is_err());

        let unblock = UserCommand::UnblockGrant(UnblockGrant {
            tenant_id,
            user_id,
            permission: Permission::TrackingReadOwn,
            occurred_at: now(),
        });
        for event in user.handle(&unblock).unwrap() {
            user.apply(&event);
        }
        assert!(user.blocked_grants.is_empty());
    }

    #[test]
    fn suspended_user_rejects_grant_edits() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = created_user(tenant_id, user_id, "client");

        let suspend = UserCommand::Suspend(SuspendUser {
            tenant_id,
            user_id,
            reason: "policy violation".to_string(),
            occurred_at: now(),
        });
        for event in user.handle(&suspend).unwrap() {
            user.apply(&event);
        }
        assert_eq!(user.status, UserStatus::Suspended);

        let grant = UserCommand::GrantOverride(GrantOverride {
            tenant_id,
            user_id,
            permission: Permission::SupportWrite,
            actor_id: UserId::new(),
            actor_grants: vec![Permission::Wildcard],
            occurred_at: now(),
        });
        let err = user.handle(&grant).unwrap_err();
        assert!(err.to_string().contains("suspended"));
    }

    #[test]
    fn tenant_isolation_enforced() {
        let tenant_a = TenantId::new();
        let user_id = UserId::new();
        let user = created_user(tenant_a, user_id, "client");

        let cmd = UserCommand::BlockGrant(BlockGrant {
            tenant_id: TenantId::new(),
            user_id,
            permission: Permission::SupportWrite,
            occurred_at: now(),
        });
        let err = user.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn activate_suspended_user() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = created_user(tenant_id, user_id, "operations");

        let suspend = UserCommand::Suspend(SuspendUser {
            tenant_id,
            user_id,
            reason: "test".to_string(),
            occurred_at: now(),
        });
        for event in user.handle(&suspend).unwrap() {
            user.apply(&event);
        }

        let activate = UserCommand::Activate(ActivateUser {
            tenant_id,
            user_id,
            occurred_at: now(),
        });
        for event in user.handle(&activate).unwrap() {
            user.apply(&event);
        }

        assert_eq!(user.status, UserStatus::Active);
    }
}
