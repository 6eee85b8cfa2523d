// ============================================================================
// Catalog Domain - Drone flight modes
// ============================================================================
//
// Read-mostly list of services. Entries are soft-deleted so that historical
// order items keep their reference.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod images;
pub mod service_catalog;

pub use value_objects::*;
pub use errors::*;
pub use images::{ImageStore, InMemoryImageStore};
pub use service_catalog::Catalog;
