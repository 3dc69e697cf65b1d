//! `cargoflow-events` — domain event primitives and distribution mechanics.

pub mod bus;
pub mod envelope;
pub mod event;

pub use bus::{EventBus, InMemoryEventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
