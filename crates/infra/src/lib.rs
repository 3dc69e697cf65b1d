//! `cargoflow-infra` — infrastructure composition for the domain crates.
//!
//! Event store (append-only, optimistic concurrency), command dispatcher,
//! tracking intake (bounded conflict retry), and scope-aware read-model
//! projections. No HTTP in here; the API crate wires these together.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod tracking_intake;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use tracking_intake::TrackingIntake;
