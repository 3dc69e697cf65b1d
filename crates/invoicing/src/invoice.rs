use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, TenantId};
use cargoflow_events::Event;
use cargoflow_shipments::ShipmentId;

/// Invoice identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
    Paid,
    Void,
}

/// Freight charge line (ocean freight, handling, customs brokerage, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeLine {
    pub line_no: u32,
    pub description: String,
    /// Amount in smallest currency unit (e.g., cents).
    pub amount: u64,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    client_id: Option<ClientId>,
    shipment_id: Option<ShipmentId>,
    status: InvoiceStatus,
    lines: Vec<ChargeLine>,
    due_date: Option<DateTime<Utc>>,
    total_amount: u64,
    total_paid: u64,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            client_id: None,
            shipment_id: None,
            status: InvoiceStatus::Open,
            lines: Vec::new(),
            due_date: None,
            total_amount: 0,
            total_paid: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn shipment_id(&self) -> Option<ShipmentId> {
        self.shipment_id
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn lines(&self) -> &[ChargeLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn total_paid(&self) -> u64 {
        self.total_paid
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub shipment_id: ShipmentId,
    pub lines: Vec<ChargeLine>,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayment {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    RegisterPayment(RegisterPayment),
    VoidInvoice(VoidInvoice),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub client_id: ClientId,
    pub shipment_id: ShipmentId,
    pub lines: Vec<ChargeLine>,
    pub total_amount: u64,
    pub due_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRegistered {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: u64,
    pub new_total_paid: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceVoided {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    PaymentRegistered(PaymentRegistered),
    InvoiceVoided(InvoiceVoided),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::PaymentRegistered(_) => "invoicing.invoice.payment_registered",
            InvoiceEvent::InvoiceVoided(_) => "invoicing.invoice.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::PaymentRegistered(e) => e.occurred_at,
            InvoiceEvent::InvoiceVoided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.client_id = Some(e.client_id);
                self.shipment_id = Some(e.shipment_id);
                self.lines = e.lines.clone();
                self.total_amount = e.total_amount;
                self.total_paid = 0;
                self.due_date = Some(e.due_date);
                self.status = InvoiceStatus::Open;
                self.created = true;
            }
            InvoiceEvent::PaymentRegistered(e) => {
                self.total_paid = e.new_total_paid;
                if self.total_paid >= self.total_amount {
                    self.status = InvoiceStatus::Paid;
                }
            }
            InvoiceEvent::InvoiceVoided(_) => {
                self.status = InvoiceStatus::Void;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::RegisterPayment(cmd) => self.handle_register_payment(cmd),
            InvoiceCommand::VoidInvoice(cmd) => self.handle_void(cmd),
        }
    }
}

impl Invoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot issue invoice without lines"));
        }

        let mut total: u64 = 0;
        for line in &cmd.lines {
            if line.description.trim().is_empty() {
                return Err(DomainError::validation("charge description cannot be empty"));
            }
            if line.amount == 0 {
                return Err(DomainError::validation("charge amount must be positive"));
            }
            total = total
                .checked_add(line.amount)
                .ok_or_else(|| DomainError::validation("invoice total overflows"))?;
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            client_id: cmd.client_id,
            shipment_id: cmd.shipment_id,
            lines: cmd.lines.clone(),
            total_amount: total,
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_payment(
        &self,
        cmd: &RegisterPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status != InvoiceStatus::Open {
            return Err(DomainError::invariant(
                "payments can only be registered against open invoices",
            ));
        }

        if cmd.amount == 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        let new_total_paid = self
            .total_paid
            .checked_add(cmd.amount)
            .ok_or_else(|| DomainError::validation("total paid overflows"))?;

        if new_total_paid > self.total_amount {
            return Err(DomainError::validation("payment exceeds outstanding amount"));
        }

        Ok(vec![InvoiceEvent::PaymentRegistered(PaymentRegistered {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            amount: cmd.amount,
            new_total_paid,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if self.status != InvoiceStatus::Open {
            return Err(DomainError::invariant("only open invoices can be voided"));
        }

        Ok(vec![InvoiceEvent::InvoiceVoided(InvoiceVoided {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargoflow_core::AggregateId;
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn test_shipment_id() -> ShipmentId {
        ShipmentId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(no: u32, amount: u64) -> ChargeLine {
        ChargeLine {
            line_no: no,
            description: "ocean freight".to_string(),
            amount,
        }
    }

    fn issued_invoice(tenant_id: TenantId, amounts: &[u64]) -> Invoice {
        let invoice_id = test_invoice_id();
        let mut invoice = Invoice::empty(invoice_id);
        let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
            tenant_id,
            invoice_id,
            client_id: ClientId::new(),
            shipment_id: test_shipment_id(),
            lines: amounts
                .iter()
                .enumerate()
                .map(|(i, &a)| line(i as u32 + 1, a))
                .collect(),
            due_date: test_time(),
            occurred_at: test_time(),
        });
        for event in invoice.handle(&cmd).unwrap() {
            invoice.apply(&event);
        }
        invoice
    }

    #[test]
    fn issue_invoice_totals_lines() {
        let invoice = issued_invoice(test_tenant_id(), &[1500, 300, 200]);
        assert_eq!(invoice.status(), InvoiceStatus::Open);
        assert_eq!(invoice.total_amount(), 2000);
        assert_eq!(invoice.lines().len(), 3);
    }

    #[test]
    fn issue_without_lines_is_rejected() {
        let invoice = Invoice::empty(test_invoice_id());
        let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
            tenant_id: test_tenant_id(),
            invoice_id: invoice.id_typed(),
            client_id: ClientId::new(),
            shipment_id: test_shipment_id(),
            lines: vec![],
            due_date: test_time(),
            occurred_at: test_time(),
        });
        assert!(invoice.handle(&cmd).is_err());
    }

    #[test]
    fn full_payment_marks_invoice_paid() {
        let tenant_id = test_tenant_id();
        let mut invoice = issued_invoice(tenant_id, &[1000]);

        let cmd = InvoiceCommand::RegisterPayment(RegisterPayment {
            tenant_id,
            invoice_id: invoice.id_typed(),
            amount: 1000,
            occurred_at: test_time(),
        });
        for event in invoice.handle(&cmd).unwrap() {
            invoice.apply(&event);
        }

        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.total_paid(), 1000);
    }

    #[test]
    fn overpayment_is_rejected() {
        let tenant_id = test_tenant_id();
        let invoice = issued_invoice(tenant_id, &[500]);

        let cmd = InvoiceCommand::RegisterPayment(RegisterPayment {
            tenant_id,
            invoice_id: invoice.id_typed(),
            amount: 600,
            occurred_at: test_time(),
        });
        assert!(invoice.handle(&cmd).is_err());
    }

    #[test]
    fn paid_invoice_rejects_further_payments() {
        let tenant_id = test_tenant_id();
        let mut invoice = issued_invoice(tenant_id, &[100]);

        let pay = InvoiceCommand::RegisterPayment(RegisterPayment {
            tenant_id,
            invoice_id: invoice.id_typed(),
            amount: 100,
            occurred_at: test_time(),
        });
        for event in invoice.handle(&pay).unwrap() {
            invoice.apply(&event);
        }
        assert_eq!(invoice.status(), InvoiceStatus::Paid);

        assert!(invoice.handle(&pay).is_err());
    }

    #[test]
    fn void_open_invoice() {
        let tenant_id = test_tenant_id();
        let mut invoice = issued_invoice(tenant_id, &[100]);

        let cmd = InvoiceCommand::VoidInvoice(VoidInvoice {
            tenant_id,
            invoice_id: invoice.id_typed(),
            occurred_at: test_time(),
        });
        for event in invoice.handle(&cmd).unwrap() {
            invoice.apply(&event);
        }
        assert_eq!(invoice.status(), InvoiceStatus::Void);
    }

    proptest! {
        /// Partial payments accumulate and the invoice flips to Paid exactly
        /// when the total is covered.
        #[test]
        fn payments_accumulate(amounts in prop::collection::vec(1u64..10_000, 1..8)) {
            let tenant_id = test_tenant_id();
            let total: u64 = amounts.iter().sum();
            let mut invoice = issued_invoice(tenant_id, &[total]);

            for amount in &amounts {
                let cmd = InvoiceCommand::RegisterPayment(RegisterPayment {
                    tenant_id,
                    invoice_id: invoice.id_typed(),
                    amount: *amount,
                    occurred_at: test_time(),
                });
                for event in invoice.handle(&cmd).unwrap() {
                    invoice.apply(&event);
                }
            }

            prop_assert_eq!(invoice.total_paid(), total);
            prop_assert_eq!(invoice.status(), InvoiceStatus::Paid);
        }
    }
}
