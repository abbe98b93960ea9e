//! Domain events emitted by the authorization back office.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
