use uuid::Uuid;

use crate::domain::ErrorKind;
use crate::store::StoreError;

// ============================================================================
// Catalog Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Service not found: {0}")]
    NotFound(Uuid),

    #[error("Only staff may {0}")]
    Forbidden(&'static str),

    #[error("Service name cannot be empty")]
    EmptyName,

    #[error("Power multiplier must be a positive number, got {0}")]
    InvalidPowerMultiplier(f64),

    #[error("Image upload is empty")]
    EmptyImage,

    #[error("Image storage error: {0}")]
    ImageStorage(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Forbidden(_) => ErrorKind::Forbidden,
            CatalogError::EmptyName
            | CatalogError::InvalidPowerMultiplier(_)
            | CatalogError::EmptyImage => ErrorKind::BadRequest,
            CatalogError::ImageStorage(_) | CatalogError::Storage(_) => ErrorKind::Internal,
        }
    }
}
