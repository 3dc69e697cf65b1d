//! `cargoflow-support` — client support tickets.

pub mod ticket;

pub use ticket::{
    CloseTicket, OpenTicket, ReplyToTicket, SupportTicket, TicketCommand, TicketEvent, TicketId,
    TicketStatus,
};
