// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - catalog/    - Service definitions (flight modes) and their images
// - order/      - Order aggregate, state machine and command handler
// - estimator   - Pure flight-time formula
//
// Persistence lives in src/store/ behind traits.
//
// ============================================================================

pub mod catalog;
pub mod order;
pub mod estimator;
mod error_kind;
mod requester;

pub use error_kind::ErrorKind;
pub use requester::Requester;
