// ============================================================================
// Eventing Core - Generic Aggregate Abstractions
// ============================================================================
//
// No domain-specific code lives here (no Order, Service, ...).
// Domain aggregates are in src/domain/
//
// ============================================================================

pub mod aggregate;
pub mod event;

pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope, serialize_event, deserialize_event};
