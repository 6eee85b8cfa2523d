use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The caller of an operation, as resolved by the identity provider.
///
/// Passed explicitly into every operation; nothing caches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: Uuid,
    pub is_staff: bool,
}

impl Requester {
    pub fn user(user_id: Uuid) -> Self {
        Self { user_id, is_staff: false }
    }

    pub fn staff(user_id: Uuid) -> Self {
        Self { user_id, is_staff: true }
    }
}
