use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateRoot, ClientId, DomainError, TenantId};
use cargoflow_events::Event;

/// Client status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Archived,
}

/// Contact information for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Client (a shipper the tenant forwards freight for).
///
/// Clients are the owned entity behind own-scoped permissions: shipments,
/// invoices and support tickets belong to exactly one client, and client
/// principals are scoped to their own client's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    id: ClientId,
    tenant_id: Option<TenantId>,
    name: String,
    contact: ContactInfo,
    status: ClientStatus,
    version: u64,
    created: bool,
}

impl Client {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ClientId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            contact: ContactInfo::default(),
            status: ClientStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ClientId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }
}

impl AggregateRoot for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterClient {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateClientDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateClientDetails {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new contact info (if None, keep existing).
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveClient {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    RegisterClient(RegisterClient),
    UpdateClientDetails(UpdateClientDetails),
    ArchiveClient(ArchiveClient),
}

/// Event: ClientRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistered {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUpdated {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientArchived {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    ClientRegistered(ClientRegistered),
    ClientUpdated(ClientUpdated),
    ClientArchived(ClientArchived),
}

impl Event for ClientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ClientRegistered(_) => "clients.client.registered",
            ClientEvent::ClientUpdated(_) => "clients.client.updated",
            ClientEvent::ClientArchived(_) => "clients.client.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::ClientRegistered(e) => e.occurred_at,
            ClientEvent::ClientUpdated(e) => e.occurred_at,
            ClientEvent::ClientArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Client {
    type Command = ClientCommand;
    type Event = ClientEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClientEvent::ClientRegistered(e) => {
                self.id = e.client_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.status = ClientStatus::Active;
                self.created = true;
            }
            ClientEvent::ClientUpdated(e) => {
                if let Some(name) = &e.name {
                    self.name = name.clone();
                }
                if let Some(contact) = &e.contact {
                    self.contact = contact.clone();
                }
            }
            ClientEvent::ClientArchived(_) => {
                self.status = ClientStatus::Archived;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ClientCommand::RegisterClient(cmd) => self.handle_register(cmd),
            ClientCommand::UpdateClientDetails(cmd) => self.handle_update(cmd),
            ClientCommand::ArchiveClient(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Client {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterClient) -> Result<Vec<ClientEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("client already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("client name cannot be empty"));
        }

        Ok(vec![ClientEvent::ClientRegistered(ClientRegistered {
            tenant_id: cmd.tenant_id,
            client_id: cmd.client_id,
            name: cmd.name.trim().to_string(),
            contact: cmd.contact.clone().unwrap_or_default(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateClientDetails) -> Result<Vec<ClientEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == ClientStatus::Archived {
            return Err(DomainError::invariant("cannot update an archived client"));
        }

        if cmd.name.is_none() && cmd.contact.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }

        if let Some(name) = &cmd.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("client name cannot be empty"));
            }
        }

        Ok(vec![ClientEvent::ClientUpdated(ClientUpdated {
            tenant_id: cmd.tenant_id,
            client_id: cmd.client_id,
            name: cmd.name.as_ref().map(|n| n.trim().to_string()),
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveClient) -> Result<Vec<ClientEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == ClientStatus::Archived {
            return Err(DomainError::invariant("client already archived"));
        }

        Ok(vec![ClientEvent::ClientArchived(ClientArchived {
            tenant_id: cmd.tenant_id,
            client_id: cmd.client_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered_client(tenant_id: TenantId) -> Client {
        let client_id = ClientId::new();
        let mut client = Client::empty(client_id);
        let cmd = ClientCommand::RegisterClient(RegisterClient {
            tenant_id,
            client_id,
            name: "Indus Textiles Ltd".to_string(),
            contact: None,
            occurred_at: Utc::now(),
        });
        for event in client.handle(&cmd).unwrap() {
            client.apply(&event);
        }
        client
    }

    #[test]
    fn register_and_update_client() {
        let tenant_id = TenantId::new();
        let mut client = registered_client(tenant_id);
        assert_eq!(client.name(), "Indus Textiles Ltd");

        let cmd = ClientCommand::UpdateClientDetails(UpdateClientDetails {
            tenant_id,
            client_id: client.id_typed(),
            name: None,
            contact: Some(ContactInfo {
                email: Some("ops@industextiles.example".to_string()),
                phone: None,
                address: None,
            }),
            occurred_at: Utc::now(),
        });
        for event in client.handle(&cmd).unwrap() {
            client.apply(&event);
        }

        assert_eq!(
            client.contact().email.as_deref(),
            Some("ops@industextiles.example")
        );
        assert_eq!(client.name(), "Indus Textiles Ltd");
    }

    #[test]
    fn archived_client_rejects_updates() {
        let tenant_id = TenantId::new();
        let mut client = registered_client(tenant_id);

        let archive = ClientCommand::ArchiveClient(ArchiveClient {
            tenant_id,
            client_id: client.id_typed(),
            occurred_at: Utc::now(),
        });
        for event in client.handle(&archive).unwrap() {
            client.apply(&event);
        }
        assert_eq!(client.status(), ClientStatus::Archived);

        let update = ClientCommand::UpdateClientDetails(UpdateClientDetails {
            tenant_id,
            client_id: client.id_typed(),
            name: Some("New Name".to_string()),
            contact: None,
            occurred_at: Utc::now(),
        });
        assert!(client.handle(&update).is_err());
    }

    #[test]
    fn empty_update_is_rejected() {
        let tenant_id = TenantId::new();
        let client = registered_client(tenant_id);

        let cmd = ClientCommand::UpdateClientDetails(UpdateClientDetails {
            tenant_id,
            client_id: client.id_typed(),
            name: None,
            contact: None,
            occurred_at: Utc::now(),
        });
        assert!(client.handle(&cmd).is_err());
    }
}
