use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, TenantId};
use cargoflow_events::Event;

/// Support ticket identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub AggregateId);

impl TicketId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TicketId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Ticket status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Answered,
    Closed,
}

/// Aggregate root: SupportTicket (client-owned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportTicket {
    id: TicketId,
    tenant_id: Option<TenantId>,
    client_id: Option<ClientId>,
    subject: String,
    status: TicketStatus,
    version: u64,
    created: bool,
}

impl SupportTicket {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TicketId) -> Self {
        Self {
            id,
            tenant_id: None,
            client_id: None,
            subject: String::new(),
            status: TicketStatus::Open,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TicketId {
        self.id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }
}

impl AggregateRoot for SupportTicket {
    type Id = TicketId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenTicket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTicket {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub client_id: ClientId,
    pub subject: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReplyToTicket (staff answer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyToTicket {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseTicket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTicket {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCommand {
    OpenTicket(OpenTicket),
    ReplyToTicket(ReplyToTicket),
    CloseTicket(CloseTicket),
}

/// Event: TicketOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketOpened {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub client_id: ClientId,
    pub subject: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TicketReplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReplied {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TicketClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketClosed {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    TicketOpened(TicketOpened),
    TicketReplied(TicketReplied),
    TicketClosed(TicketClosed),
}

impl Event for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::TicketOpened(_) => "support.ticket.opened",
            TicketEvent::TicketReplied(_) => "support.ticket.replied",
            TicketEvent::TicketClosed(_) => "support.ticket.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TicketEvent::TicketOpened(e) => e.occurred_at,
            TicketEvent::TicketReplied(e) => e.occurred_at,
            TicketEvent::TicketClosed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SupportTicket {
    type Command = TicketCommand;
    type Event = TicketEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TicketEvent::TicketOpened(e) => {
                self.id = e.ticket_id;
                self.tenant_id = Some(e.tenant_id);
                self.client_id = Some(e.client_id);
                self.subject = e.subject.clone();
                self.status = TicketStatus::Open;
                self.created = true;
            }
            TicketEvent::TicketReplied(_) => {
                self.status = TicketStatus::Answered;
            }
            TicketEvent::TicketClosed(_) => {
                self.status = TicketStatus::Closed;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TicketCommand::OpenTicket(cmd) => self.handle_open(cmd),
            TicketCommand::ReplyToTicket(cmd) => self.handle_reply(cmd),
            TicketCommand::CloseTicket(cmd) => self.handle_close(cmd),
        }
    }
}

impl SupportTicket {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ticket already exists"));
        }

        if cmd.subject.trim().is_empty() {
            return Err(DomainError::validation("subject cannot be empty"));
        }

        Ok(vec![TicketEvent::TicketOpened(TicketOpened {
            tenant_id: cmd.tenant_id,
            ticket_id: cmd.ticket_id,
            client_id: cmd.client_id,
            subject: cmd.subject.trim().to_string(),
            body: cmd.body.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reply(&self, cmd: &ReplyToTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == TicketStatus::Closed {
            return Err(DomainError::invariant("cannot reply to a closed ticket"));
        }

        if cmd.message.trim().is_empty() {
            return Err(DomainError::validation("reply cannot be empty"));
        }

        Ok(vec![TicketEvent::TicketReplied(TicketReplied {
            tenant_id: cmd.tenant_id,
            ticket_id: cmd.ticket_id,
            message: cmd.message.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == TicketStatus::Closed {
            return Err(DomainError::invariant("ticket already closed"));
        }

        Ok(vec![TicketEvent::TicketClosed(TicketClosed {
            tenant_id: cmd.tenant_id,
            ticket_id: cmd.ticket_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened_ticket(tenant_id: TenantId) -> SupportTicket {
        let ticket_id = TicketId::new(AggregateId::new());
        let mut ticket = SupportTicket::empty(ticket_id);
        let cmd = TicketCommand::OpenTicket(OpenTicket {
            tenant_id,
            ticket_id,
            client_id: ClientId::new(),
            subject: "Container arrival delay".to_string(),
            body: "Our container was due last Friday.".to_string(),
            occurred_at: Utc::now(),
        });
        for event in ticket.handle(&cmd).unwrap() {
            ticket.apply(&event);
        }
        ticket
    }

    #[test]
    fn open_reply_close_lifecycle() {
        let tenant_id = TenantId::new();
        let mut ticket = opened_ticket(tenant_id);
        assert_eq!(ticket.status(), TicketStatus::Open);

        let reply = TicketCommand::ReplyToTicket(ReplyToTicket {
            tenant_id,
            ticket_id: ticket.id_typed(),
            message: "Vessel berths tomorrow.".to_string(),
            occurred_at: Utc::now(),
        });
        for event in ticket.handle(&reply).unwrap() {
            ticket.apply(&event);
        }
        assert_eq!(ticket.status(), TicketStatus::Answered);

        let close = TicketCommand::CloseTicket(CloseTicket {
            tenant_id,
            ticket_id: ticket.id_typed(),
            occurred_at: Utc::now(),
        });
        for event in ticket.handle(&close).unwrap() {
            ticket.apply(&event);
        }
        assert_eq!(ticket.status(), TicketStatus::Closed);
    }

    #[test]
    fn closed_ticket_rejects_replies() {
        let tenant_id = TenantId::new();
        let mut ticket = opened_ticket(tenant_id);

        let close = TicketCommand::CloseTicket(CloseTicket {
            tenant_id,
            ticket_id: ticket.id_typed(),
            occurred_at: Utc::now(),
        });
        for event in ticket.handle(&close).unwrap() {
            ticket.apply(&event);
        }

        let reply = TicketCommand::ReplyToTicket(ReplyToTicket {
            tenant_id,
            ticket_id: ticket.id_typed(),
            message: "too late".to_string(),
            occurred_at: Utc::now(),
        });
        assert!(ticket.handle(&reply).is_err());
    }

    #[test]
    fn empty_subject_is_rejected() {
        let ticket = SupportTicket::empty(TicketId::new(AggregateId::new()));
        let cmd = TicketCommand::OpenTicket(OpenTicket {
            tenant_id: TenantId::new(),
            ticket_id: ticket.id_typed(),
            client_id: ClientId::new(),
            subject: "   ".to_string(),
            body: String::new(),
            occurred_at: Utc::now(),
        });
        assert!(ticket.handle(&cmd).is_err());
    }
}
