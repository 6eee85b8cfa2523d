// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// - Value objects (OrderStatus, DroneParameters, OrderItem, patches)
// - Events (OrderFormed, OrderCompleted, etc.)
// - Commands (AddItem, Form, Complete, etc.)
// - Errors (OrderError enum)
// - Aggregate (OrderAggregate, the state machine)
// - Command Handler (OrderCommandHandler, transactions and audit log)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
