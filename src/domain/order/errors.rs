use uuid::Uuid;

use crate::domain::ErrorKind;
use crate::store::StoreError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("Order item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Not allowed to {action} this order")]
    Forbidden { action: &'static str },

    #[error("Cannot {action} an order in status {status}")]
    InvalidTransition { action: &'static str, status: OrderStatus },

    #[error("Drone parameter not set: {0}")]
    IncompleteParameters(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidParameter { field: &'static str, value: f64 },

    #[error("Aggregate not initialized")]
    NotInitialized,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::OrderNotFound(_)
            | OrderError::ServiceNotFound(_)
            | OrderError::ItemNotFound(_) => ErrorKind::NotFound,
            OrderError::Forbidden { .. } => ErrorKind::Forbidden,
            OrderError::InvalidTransition { .. }
            | OrderError::IncompleteParameters(_)
            | OrderError::InvalidParameter { .. } => ErrorKind::BadRequest,
            OrderError::NotInitialized | OrderError::Storage(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(OrderError::OrderNotFound(id).kind().status_code(), 404);
        assert_eq!(OrderError::Forbidden { action: "form" }.kind().status_code(), 403);
        assert_eq!(
            OrderError::InvalidTransition { action: "complete", status: OrderStatus::Draft }
                .kind()
                .status_code(),
            400
        );
        assert_eq!(OrderError::IncompleteParameters("efficiency").kind().status_code(), 400);
        assert_eq!(
            OrderError::Storage(StoreError::Conflict("x".into())).kind().status_code(),
            500
        );
    }

    #[test]
    fn test_invalid_transition_message_includes_status() {
        let err = OrderError::InvalidTransition { action: "complete", status: OrderStatus::Draft };
        assert_eq!(err.to_string(), "Cannot complete an order in status DRAFT");
    }
}
